//! # collect 子命令 CLI 定义
//!
//! 并行解析多个 CP2K 运行目录并汇总结果
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/collect.rs`

use clap::Args;
use cp2k_ingest::engine::dispatcher::{DEFAULT_OUTPUT_FILE, DEFAULT_PROJECT};
use cp2k_ingest::ParserVariant;
use std::path::PathBuf;

/// collect 子命令参数
#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Root directory containing CP2K run folders
    pub root: PathBuf,

    /// Recurse into subdirectories
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Which result variant to extract
    #[arg(long, value_enum, default_value_t = ParserVariant::Standard)]
    pub variant: ParserVariant,

    /// Name of the main CP2K output file in each run folder
    #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
    pub output_file: String,

    /// CP2K project name
    #[arg(long, default_value = DEFAULT_PROJECT)]
    pub project: String,

    /// Skip PDOS and cube parsing when the SCF did not converge
    #[arg(long, default_value_t = false)]
    pub check_scf_conv: bool,

    /// Filename for the CSV summary
    #[arg(long, default_value = "summary.csv")]
    pub output: PathBuf,
}
