//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `parse`: 解析单次运行并分发结果
//! - `scan`: 列出目录中可识别的 PDOS / cube 片段
//! - `collect`: 并行解析多个运行并汇总为 CSV
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: parse, scan, collect

pub mod collect;
pub mod parse;
pub mod scan;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// cp2k-ingest - CP2K 输出解析与结果分类
#[derive(Parser)]
#[command(name = "cp2k-ingest")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Parse CP2K run outputs and classify their outcome", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Silence all log output
    #[arg(short, long, global = true, default_value_t = false)]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Parse one retrieved CP2K run and dispatch its results
    Parse(parse::ParseArgs),

    /// List PDOS and cube fragments recognised in a directory
    Scan(scan::ScanArgs),

    /// Parse many runs in parallel and write a CSV summary
    Collect(collect::CollectArgs),
}
