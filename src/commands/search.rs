//! # search 命令实现
//!
//! 在参考数据库中按名称或 id 检索物相并以表格列出。
//!
//! ## 依赖关系
//! - 使用 `cli/search.rs` 定义的参数
//! - 使用 `reference/database.rs`

use crate::cli::search::SearchArgs;
use crate::error::Result;
use crate::models::ReferencePattern;
use crate::reference::ReferenceDatabase;
use crate::utils::output;

use tabled::{Table, Tabled};

/// `--peaks` 时每个结果列出的最强峰数
const STRONGEST_PEAKS: usize = 5;

#[derive(Tabled)]
struct HitRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Phase")]
    name: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Peaks")]
    peaks: usize,
    #[tabled(rename = "λ (Å)")]
    wavelength: String,
}

/// 执行 search 命令
pub fn execute(args: SearchArgs) -> Result<()> {
    let (db, report) = ReferenceDatabase::load(&args.database);
    for failure in &report.failures {
        output::print_warning(&format!(
            "Skipped '{}': {}",
            failure.path.display(),
            failure.reason
        ));
    }

    let hits = ranked_hits(&db, &args.query);
    if hits.is_empty() {
        output::print_warning(&format!(
            "No reference patterns match '{}' ({} searched)",
            args.query,
            db.len()
        ));
        return Ok(());
    }

    output::print_header(&format!("{} matches for '{}'", hits.len(), args.query));
    let rows: Vec<HitRow> = hits.iter().map(|p| hit_row(p)).collect();
    println!("{}", Table::new(rows));

    if args.peaks {
        for pattern in &hits {
            print_strongest(pattern);
        }
    }

    Ok(())
}

/// 子串检索结果；id 完全相同的记录排在最前
fn ranked_hits<'a>(db: &'a ReferenceDatabase, query: &str) -> Vec<&'a ReferencePattern> {
    let mut hits = db.search(query);
    if let Some(exact) = db.get(query.trim()) {
        hits.retain(|p| !std::ptr::eq(*p, exact));
        hits.insert(0, exact);
    }
    hits
}

fn hit_row(pattern: &ReferencePattern) -> HitRow {
    HitRow {
        id: pattern.id.clone(),
        name: pattern.name.clone(),
        source: pattern.source.to_string(),
        peaks: pattern.peaks.len(),
        wavelength: pattern
            .wavelength
            .map(|w| format!("{:.5}", w))
            .unwrap_or_else(|| "-".to_string()),
    }
}

fn print_strongest(pattern: &ReferencePattern) {
    let mut peaks: Vec<_> = pattern.peaks.iter().collect();
    peaks.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));

    let listed: Vec<String> = peaks
        .iter()
        .take(STRONGEST_PEAKS)
        .map(|p| match &p.hkl {
            Some(hkl) => format!("{:.2}° ({:.0}, {})", p.two_theta, p.intensity, hkl),
            None => format!("{:.2}° ({:.0})", p.two_theta, p.intensity),
        })
        .collect();

    output::print_field(&pattern.id, listed.join(", "));
}
