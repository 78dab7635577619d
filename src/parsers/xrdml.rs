//! # XRDML 格式解析器
//!
//! 解析 PANalytical/Malvern XRDML 测量文件（XML，带命名空间）。
//!
//! ## 数据位置
//! 1. 波长: `usedWavelength/kAlpha1`
//! 2. 主路径: `scan/dataPoints/positions/listPositions` + `scan/dataPoints/counts`
//! 3. 备用路径: 任意位置的 `positions/listPositions` + `counts`
//! 4. 无 `listPositions` 时: `positions[@axis="2Theta"]` 的 `startPosition`/`endPosition`
//!    按计数长度展开为等间距序列（计数可来自 `counts` 或 `intensities`）
//!
//! 所有匹配元素中的数值依次拼接，两数组截断到较短长度。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 调用
//! - 使用 `roxmltree` 读取 XML

use crate::error::{Result, XrdError};
use crate::models::{linspace, Spectrum};

use roxmltree::{Document, Node};
use std::fs;
use std::path::Path;

/// XRDML 命名空间前缀（各版本 1.x 共用）
const XRDML_NS_PREFIX: &str = "http://www.xrdml.com/XRDMeasurement/";

const FORMAT: &str = "XRDML";

/// 解析 XRDML 文件
pub fn parse_xrdml_file(path: &Path) -> Result<Spectrum> {
    let content = fs::read_to_string(path).map_err(|e| XrdError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_xrdml_content(&content, &path.display().to_string())
}

/// 从字符串内容解析 XRDML
pub fn parse_xrdml_content(content: &str, source: &str) -> Result<Spectrum> {
    let doc = Document::parse(content).map_err(|e| XrdError::XmlError {
        path: source.to_string(),
        source: e,
    })?;
    let root = doc.root_element();

    let wavelength = find_path(root, &["usedWavelength", "kAlpha1"])
        .first()
        .and_then(|n| n.text())
        .and_then(|t| t.trim().parse::<f64>().ok());

    let mut two_theta = Vec::new();
    let mut counts = Vec::new();

    let positions = find_path(root, &["scan", "dataPoints", "positions", "listPositions"]);
    let count_nodes = find_path(root, &["scan", "dataPoints", "counts"]);
    if !positions.is_empty() && !count_nodes.is_empty() {
        two_theta = collect_numbers(&positions, source)?;
        counts = collect_numbers(&count_nodes, source)?;
    }

    if two_theta.is_empty() {
        let positions = find_path(root, &["positions", "listPositions"]);
        let count_nodes = find_path(root, &["counts"]);
        if !positions.is_empty() && !count_nodes.is_empty() {
            two_theta = collect_numbers(&positions, source)?;
            counts = collect_numbers(&count_nodes, source)?;
        }
    }

    if two_theta.is_empty() {
        if let Some((start, end)) = two_theta_bounds(root) {
            counts = collect_numbers(&find_path(root, &["dataPoints", "counts"]), source)?;
            if counts.is_empty() {
                counts = collect_numbers(&find_path(root, &["dataPoints", "intensities"]), source)?;
            }
            two_theta = linspace(start, end, counts.len());
        }
    }

    if two_theta.is_empty() || counts.is_empty() {
        return Err(XrdError::format(
            FORMAT,
            source,
            "Could not extract positions and counts",
        ));
    }

    let n = two_theta.len().min(counts.len());
    two_theta.truncate(n);
    counts.truncate(n);

    let mut spectrum = Spectrum::new(two_theta, counts)?.with_wavelength(wavelength);
    spectrum.insert_meta("file_type", FORMAT);
    spectrum.insert_meta("file_path", source);
    Ok(spectrum)
}

/// 是否为 XRDML 命名空间下的指定元素
fn is_xrdml(node: &Node, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node
            .tag_name()
            .namespace()
            .is_some_and(|ns| ns.starts_with(XRDML_NS_PREFIX))
}

/// 查找 `.//a/b/c` 形式的路径：末级元素的祖先链依次为 b, a
fn find_path<'a, 'input>(root: Node<'a, 'input>, path: &[&str]) -> Vec<Node<'a, 'input>> {
    let Some((last, parents)) = path.split_last() else {
        return Vec::new();
    };

    root.descendants()
        .filter(|node| is_xrdml(node, last))
        .filter(|node| {
            let mut current = *node;
            for name in parents.iter().rev() {
                match current.parent_element() {
                    Some(parent) if is_xrdml(&parent, name) => current = parent,
                    _ => return false,
                }
            }
            true
        })
        .collect()
}

/// 拼接各元素文本中的数值；出现非数值记号即为格式错误
fn collect_numbers(nodes: &[Node], source: &str) -> Result<Vec<f64>> {
    nodes
        .iter()
        .filter_map(|n| n.text())
        .flat_map(|t| t.split_whitespace())
        .map(|tok| {
            tok.parse::<f64>().map_err(|_| {
                tracing::warn!(token = tok, path = source, "non-numeric XRDML data token");
                XrdError::format(
                    FORMAT,
                    source,
                    format!("non-numeric value '{}' in <{}>", tok, element_name(nodes)),
                )
            })
        })
        .collect()
}

fn element_name(nodes: &[Node]) -> String {
    nodes
        .first()
        .map(|n| n.tag_name().name().to_string())
        .unwrap_or_default()
}

/// 2Theta 轴的起止角
fn two_theta_bounds(root: Node) -> Option<(f64, f64)> {
    let axis = find_path(root, &["dataPoints", "positions"])
        .into_iter()
        .find(|n| n.attribute("axis") == Some("2Theta"))?;

    let value_of = |name: &str| {
        axis.children()
            .find(|c| is_xrdml(c, name))
            .and_then(|c| c.text())
            .and_then(|t| t.trim().parse::<f64>().ok())
    };

    Some((value_of("startPosition")?, value_of("endPosition")?))
}
