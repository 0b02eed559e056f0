//! # cp2k-ingest - CP2K 输出解析与结果分类
//!
//! 读取 CP2K 运行取回的文件，提取结构化结果并给出运行结果类别。
//!
//! ## 子命令
//! - `parse`   - 解析单次运行并分发结果
//! - `scan`    - 列出可识别的 PDOS / cube 片段
//! - `collect` - 并行解析多个运行并汇总
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── batch/     (批量并行处理)
//!   │     └── cp2k_ingest (解析引擎库)
//!   └── utils/      (工具函数)
//! ```

mod batch;
mod cli;
mod commands;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = cp2k_ingest::logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(e.process_status());
    }

    match commands::run(cli.command) {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            utils::output::print_error(&format!("{}: {}", e.kind(), e));
            std::process::exit(e.process_status());
        }
    }
}
