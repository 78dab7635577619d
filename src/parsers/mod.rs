//! # 解析器模块
//!
//! 将各种 XRD 仪器输出格式转换为统一的 `Spectrum`。
//!
//! ## 依赖关系
//! - 被 `commands/` 和 `pipeline.rs` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: text (DAT/ASC/TXT), xrdml, raw

pub mod raw;
pub mod text;
pub mod xrdml;

pub use raw::RawLayoutConfig;
pub use text::TextVariant;

use crate::error::{Result, XrdError};
use crate::models::Spectrum;

use std::fs;
use std::path::Path;
use std::str::FromStr;

/// 输入文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    /// 按扩展名/内容自动识别
    #[default]
    Auto,
    Xrdml,
    Dat,
    Asc,
    Txt,
    Raw,
}

impl FileFormat {
    pub const NAMES: [&'static str; 6] = ["auto", "xrdml", "dat", "asc", "txt", "raw"];

    /// 由扩展名推断（未知扩展名返回 None）
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())?;

        match ext.as_str() {
            "xrdml" => Some(FileFormat::Xrdml),
            "dat" => Some(FileFormat::Dat),
            "asc" => Some(FileFormat::Asc),
            "txt" => Some(FileFormat::Txt),
            "raw" => Some(FileFormat::Raw),
            _ => None,
        }
    }
}

impl FromStr for FileFormat {
    type Err = XrdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(FileFormat::Auto),
            "xrdml" => Ok(FileFormat::Xrdml),
            "dat" => Ok(FileFormat::Dat),
            "asc" => Ok(FileFormat::Asc),
            "txt" => Ok(FileFormat::Txt),
            "raw" => Ok(FileFormat::Raw),
            _ => Err(XrdError::unknown_method("file format", s, &Self::NAMES)),
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FileFormat::Auto => "auto",
            FileFormat::Xrdml => "xrdml",
            FileFormat::Dat => "dat",
            FileFormat::Asc => "asc",
            FileFormat::Txt => "txt",
            FileFormat::Raw => "raw",
        };
        write!(f, "{}", name)
    }
}

/// 以默认 RAW 配置解析扫描文件
pub fn parse_scan_file(path: &Path, format: FileFormat) -> Result<Spectrum> {
    parse_scan_file_with(path, format, &RawLayoutConfig::default())
}

/// 解析扫描文件
///
/// `FileFormat::Auto` 时先看扩展名；未知扩展名则嗅探首行：
/// 含 `xrdml` 或 `<?xml` 走 XRDML，其余文本走 TXT，无法按文本解码则走 RAW。
pub fn parse_scan_file_with(
    path: &Path,
    format: FileFormat,
    raw_config: &RawLayoutConfig,
) -> Result<Spectrum> {
    if !path.is_file() {
        return Err(XrdError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let format = match format {
        FileFormat::Auto => match FileFormat::from_extension(path) {
            Some(f) => f,
            None => sniff_format(path)?,
        },
        explicit => explicit,
    };

    tracing::debug!(path = %path.display(), %format, "parsing scan file");

    match format {
        FileFormat::Xrdml => xrdml::parse_xrdml_file(path),
        FileFormat::Dat => text::parse_text_file(path, TextVariant::Dat),
        FileFormat::Asc => text::parse_text_file(path, TextVariant::Asc),
        FileFormat::Txt | FileFormat::Auto => text::parse_text_file(path, TextVariant::Txt),
        FileFormat::Raw => raw::parse_raw_file(path, raw_config),
    }
}

/// 根据内容判断格式
fn sniff_format(path: &Path) -> Result<FileFormat> {
    let bytes = fs::read(path).map_err(|e| XrdError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    let Ok(text) = std::str::from_utf8(&bytes) else {
        return Ok(FileFormat::Raw);
    };

    let first_line = text.lines().next().unwrap_or("");
    if first_line.to_lowercase().contains("xrdml") || first_line.contains("<?xml") {
        Ok(FileFormat::Xrdml)
    } else {
        Ok(FileFormat::Txt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_dispatch_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "scan.asc", b"10.0;1\n10.1;2\n");
        let spectrum = parse_scan_file(&path, FileFormat::Auto).unwrap();
        assert_eq!(spectrum.len(), 2);
        assert_eq!(
            spectrum.metadata().get("file_type").map(|v| v.to_string()),
            Some("ASC".to_string())
        );
    }

    #[test]
    fn test_sniff_text_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "scan", b"Header line\n10.0 1\n10.1 2\n");
        let spectrum = parse_scan_file(&path, FileFormat::Auto).unwrap();
        assert_eq!(spectrum.two_theta(), &[10.0, 10.1]);
    }

    #[test]
    fn test_sniff_binary_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = Vec::new();
        buf.extend_from_slice(&200u32.to_le_bytes());
        // 计数字节 0xC8 后接 0x00，不是合法 UTF-8
        for i in 0..200 {
            buf.extend_from_slice(&(100.0 + i as f32).to_le_bytes());
        }
        let path = write_file(dir.path(), "scan.bin", &buf);
        let spectrum = parse_scan_file(&path, FileFormat::Auto).unwrap();
        assert_eq!(spectrum.len(), 200);
    }

    #[test]
    fn test_explicit_format_overrides_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "scan.xy", b"# c\n10.0,1\n");
        let spectrum = parse_scan_file(&path, FileFormat::Dat).unwrap();
        assert_eq!(spectrum.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let err = parse_scan_file(Path::new("/nonexistent/scan.dat"), FileFormat::Auto);
        assert!(matches!(err, Err(XrdError::FileNotFound { .. })));
    }

    #[test]
    fn test_unknown_format_name() {
        let err = "cif".parse::<FileFormat>().unwrap_err();
        assert!(matches!(err, XrdError::UnknownMethod { .. }));
    }
}
