//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `engine/`, `parsers/`, `utils/`
//! - 子模块: parse, scan, collect

pub mod collect;
pub mod parse;
pub mod scan;

use crate::cli::Commands;
use cp2k_ingest::Result;

/// 执行命令，返回进程退出状态
pub fn run(cmd: Commands) -> Result<i32> {
    match cmd {
        Commands::Parse(args) => parse::execute(args),
        Commands::Scan(args) => scan::execute(args),
        Commands::Collect(args) => collect::execute(args),
    }
}
