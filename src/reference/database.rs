//! # 参考图谱数据库
//!
//! 从文件或目录（递归查找 `*.json`）加载参考图谱，并按名称/id 检索。
//!
//! ## 加载策略
//! - 各文件互不依赖，使用 rayon 并行解析，结果在调用线程按文件顺序合并
//! - 单个文件失败只记录警告并跳过，不中断整体加载
//! - 一个文件都没加载成功时给出警告，仍返回空数据库
//!
//! ## 依赖关系
//! - 被 `pipeline.rs`, `commands/` 使用
//! - 使用 `reference/record.rs` 解析记录
//! - 使用 `walkdir` 遍历目录，`rayon` 并行解析

use super::record::parse_records;
use crate::error::{Result, XrdError};
use crate::models::ReferencePattern;

use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 加载失败的文件
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// 加载统计
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub files_loaded: usize,
    pub patterns_loaded: usize,
    pub failures: Vec<LoadFailure>,
}

/// 参考图谱数据库
#[derive(Debug, Clone, Default)]
pub struct ReferenceDatabase {
    patterns: Vec<ReferencePattern>,
}

impl ReferenceDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从多个路径加载
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> (Self, LoadReport) {
        let mut db = Self::new();
        let report = db.extend_from_paths(paths);
        (db, report)
    }

    /// 追加加载多个路径中的图谱
    pub fn extend_from_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> LoadReport {
        let mut report = LoadReport::default();
        let mut files = Vec::new();

        for path in paths {
            let path = path.as_ref();
            if path.is_file() {
                files.push(path.to_path_buf());
            } else if path.is_dir() {
                files.extend(json_files(path, &mut report.failures));
            } else {
                tracing::warn!(path = %path.display(), "reference path not found");
                report.failures.push(LoadFailure {
                    path: path.to_path_buf(),
                    reason: "path not found".to_string(),
                });
            }
        }

        let parsed: Vec<(PathBuf, Result<Vec<ReferencePattern>>)> = files
            .into_par_iter()
            .map(|file| {
                let result = load_file(&file);
                (file, result)
            })
            .collect();

        for (file, result) in parsed {
            match result {
                Ok(patterns) => {
                    report.files_loaded += 1;
                    report.patterns_loaded += patterns.len();
                    for pattern in patterns {
                        self.add_pattern(pattern);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %file.display(), error = %e, "could not load reference file");
                    report.failures.push(LoadFailure {
                        path: file,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if report.files_loaded == 0 {
            tracing::warn!("no reference files were loaded");
        } else {
            tracing::debug!(
                files = report.files_loaded,
                patterns = report.patterns_loaded,
                "reference database loaded"
            );
        }

        report
    }

    pub fn add_pattern(&mut self, pattern: ReferencePattern) {
        self.patterns.push(pattern);
    }

    /// 按 id 精确查找
    pub fn get(&self, id: &str) -> Option<&ReferencePattern> {
        self.patterns.iter().find(|p| p.id == id)
    }

    pub fn all(&self) -> &[ReferencePattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// 不区分大小写检索：查询串是名称或 id 的子串即命中
    pub fn search(&self, query: &str) -> Vec<&ReferencePattern> {
        let query = query.trim().to_lowercase();
        self.patterns
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&query) || p.id.to_lowercase().contains(&query)
            })
            .collect()
    }
}

/// 目录下递归收集 `.json` 文件（排序以保证加载顺序稳定）
///
/// 无法访问的目录项记为失败，遍历继续。
fn json_files(dir: &Path, failures: &mut Vec<LoadFailure>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(dir).to_path_buf();
                tracing::warn!(path = %path.display(), error = %e, "could not traverse reference directory");
                failures.push(LoadFailure {
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let is_json = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if entry.file_type().is_file() && is_json {
            files.push(entry.into_path());
        }
    }

    files.sort();
    files
}

fn load_file(path: &Path) -> Result<Vec<ReferencePattern>> {
    let content = fs::read_to_string(path).map_err(|e| XrdError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    parse_records(&content, &path.display().to_string(), stem)
}
