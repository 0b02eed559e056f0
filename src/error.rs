//! # 统一错误处理模块
//!
//! 定义解析引擎的所有硬失败类型，使用 `thiserror` 派生。
//!
//! 硬失败表示引擎无法产出可分类的结果，与 `engine::outcome::Outcome`
//! 中的诊断结果严格区分，二者不会互相转换。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// 解析引擎统一错误类型
#[derive(Error, Debug)]
pub enum IngestError {
    // ─────────────────────────────────────────────────────────────
    // 主输出文件
    // ─────────────────────────────────────────────────────────────
    #[error("CP2K output file was not retrieved: {path}")]
    PrimaryLogMissing { path: String },

    #[error("Failed to read CP2K output file: {path}")]
    PrimaryLogUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CP2K version is not supported: {found}")]
    VersionUnsupported { found: String },

    // ─────────────────────────────────────────────────────────────
    // 重启文件
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read restart file: {path}")]
    RestartUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse restart file\nReason: {reason}")]
    RestartUnparseable { reason: String },

    #[error("Multiple force-evaluations not yet supported (found {count})")]
    MultipleGeometriesUnsupported { count: usize },

    // ─────────────────────────────────────────────────────────────
    // 附加输出片段 (PDOS / cube)
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read output fragment: {path}")]
    FragmentUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    FragmentUnparseable {
        format: String,
        path: String,
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────
    // CLI / 输出
    // ─────────────────────────────────────────────────────────────
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl IngestError {
    /// 错误种类名，供宿主生成可操作的提示
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::PrimaryLogMissing { .. } => "PrimaryLogMissing",
            IngestError::PrimaryLogUnreadable { .. } => "PrimaryLogUnreadable",
            IngestError::VersionUnsupported { .. } => "VersionUnsupported",
            IngestError::RestartUnreadable { .. } => "RestartUnreadable",
            IngestError::RestartUnparseable { .. } => "RestartUnparseable",
            IngestError::MultipleGeometriesUnsupported { .. } => "MultipleGeometriesUnsupported",
            IngestError::FragmentUnreadable { .. } => "FragmentUnreadable",
            IngestError::FragmentUnparseable { .. } => "FragmentUnparseable",
            IngestError::DirectoryNotFound { .. } => "DirectoryNotFound",
            IngestError::FileReadError { .. } => "FileReadError",
            IngestError::FileWriteError { .. } => "FileWriteError",
            IngestError::InvalidArgument(_) => "InvalidArgument",
            IngestError::CsvError(_) => "CsvError",
            IngestError::JsonError(_) => "JsonError",
        }
    }

    /// 进程退出码，与诊断结果的退出码区间不重叠
    pub fn exit_code(&self) -> i32 {
        match self {
            IngestError::PrimaryLogMissing { .. } => 301,
            IngestError::PrimaryLogUnreadable { .. } => 302,
            IngestError::VersionUnsupported { .. } => 310,
            IngestError::RestartUnreadable { .. } => 311,
            IngestError::RestartUnparseable { .. } => 312,
            IngestError::MultipleGeometriesUnsupported { .. } => 313,
            IngestError::FragmentUnreadable { .. } => 314,
            IngestError::FragmentUnparseable { .. } => 315,
            _ => 1,
        }
    }

    /// 命令行进程的退出状态，3xx 映射到 21..=35，不与结果类别的状态重叠
    pub fn process_status(&self) -> i32 {
        match self.exit_code() {
            code if code > 300 => code - 280,
            code => code,
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_failures_are_distinguishable() {
        let errors = [
            IngestError::PrimaryLogMissing { path: "aiida.out".into() },
            IngestError::VersionUnsupported { found: "7.1".into() },
            IngestError::RestartUnparseable { reason: "empty".into() },
            IngestError::MultipleGeometriesUnsupported { count: 2 },
        ];
        let kinds: std::collections::BTreeSet<_> = errors.iter().map(|e| e.kind()).collect();
        let codes: std::collections::BTreeSet<_> = errors.iter().map(|e| e.exit_code()).collect();
        assert_eq!(kinds.len(), errors.len());
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_process_status_fits_in_a_byte() {
        let missing = IngestError::PrimaryLogMissing { path: "aiida.out".into() };
        let version = IngestError::VersionUnsupported { found: "7.1".into() };
        let argument = IngestError::InvalidArgument("jobs".into());

        assert_eq!(missing.exit_code(), 301);
        assert_eq!(missing.process_status(), 21);
        assert_eq!(version.process_status(), 30);
        assert_eq!(argument.process_status(), 1);
    }
}
