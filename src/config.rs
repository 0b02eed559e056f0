//! # 解析配置
//!
//! 解析器变体选择与宿主传入的设置项。
//!
//! ## 依赖关系
//! - 被 `parsers/main_log.rs`, `engine/` 和 `commands/` 使用
//! - 使用 `serde_json` 读取设置文件

use crate::error::{IngestError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 解析器变体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParserVariant {
    /// Energies, bands, eigenvalues, PDOS and cube files
    #[default]
    Standard,
    /// Mulliken and Hirshfeld partial charges
    PartialCharges,
    /// Per-step summaries of geometry optimisations and MD runs
    Trajectory,
}

impl std::fmt::Display for ParserVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParserVariant::Standard => write!(f, "standard"),
            ParserVariant::PartialCharges => write!(f, "partial-charges"),
            ParserVariant::Trajectory => write!(f, "trajectory"),
        }
    }
}

/// 宿主设置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseSettings {
    /// SCF 未收敛时跳过附加输出（PDOS、cube）的解析
    #[serde(rename = "output_check_scf_conv", default)]
    pub check_scf_convergence: bool,
}

impl ParseSettings {
    /// 从 JSON 设置文件读取，未知键被忽略
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| IngestError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_host_json() {
        let settings: ParseSettings =
            serde_json::from_str(r#"{"output_check_scf_conv": true, "additional_retrieve": []}"#)
                .unwrap();
        assert!(settings.check_scf_convergence);

        let defaults: ParseSettings = serde_json::from_str("{}").unwrap();
        assert!(!defaults.check_scf_convergence);
    }

    #[test]
    fn test_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"output_check_scf_conv": true}"#).unwrap();

        let settings = ParseSettings::from_file(&path).unwrap();
        assert!(settings.check_scf_convergence);

        let missing = ParseSettings::from_file(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(IngestError::FileReadError { .. })));
    }
}
