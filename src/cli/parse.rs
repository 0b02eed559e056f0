//! # parse 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/parse.rs`

use clap::Args;
use cp2k_ingest::engine::dispatcher::{DEFAULT_OUTPUT_FILE, DEFAULT_PROJECT};
use cp2k_ingest::ParserVariant;
use std::path::PathBuf;

/// parse 子命令参数
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Directory holding the retrieved output files
    pub retrieved_dir: PathBuf,

    /// Temporary directory holding PDOS and cube fragments
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// Which result variant to extract
    #[arg(long, value_enum, default_value_t = ParserVariant::Standard)]
    pub variant: ParserVariant,

    /// Name of the main CP2K output file
    #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
    pub output_file: String,

    /// CP2K project name (restart file is <project>-1.restart)
    #[arg(long, default_value = DEFAULT_PROJECT)]
    pub project: String,

    /// Skip PDOS and cube parsing when the SCF did not converge
    #[arg(long, default_value_t = false)]
    pub check_scf_conv: bool,

    /// JSON settings file (host key: output_check_scf_conv)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Write all output channels to this JSON file
    #[arg(long)]
    pub json: Option<PathBuf>,
}
