//! # scan 命令实现
//!
//! 列出目录中可被识别的 PDOS 片段和 cube 文件及其解码后的标签。
//!
//! ## 依赖关系
//! - 使用 `cli/scan.rs` 定义的参数
//! - 使用 `parsers/pdos.rs`, `parsers/cube.rs`
//! - 使用 `utils/output.rs`

use crate::cli::scan::ScanArgs;
use crate::utils::output;
use cp2k_ingest::parsers::{discover_cube_files, discover_pdos_files};
use cp2k_ingest::{IngestError, Result};

use std::path::Path;
use tabled::{Table, Tabled};

/// 片段行
#[derive(Debug, Clone, Tabled)]
struct FragmentRow {
    #[tabled(rename = "Type")]
    kind: &'static str,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "File")]
    file: String,
}

/// 执行 scan 命令
pub fn execute(args: ScanArgs) -> Result<i32> {
    output::print_header("Scanning Output Fragments");

    if !args.dir.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: args.dir.display().to_string(),
        });
    }

    let mut rows = Vec::new();
    for (kind_index, spins) in discover_pdos_files(&args.dir)? {
        for (spin, path) in spins {
            let label = if spin.is_empty() {
                format!("kind {}", kind_index)
            } else {
                format!("kind {} ({})", kind_index, spin.to_lowercase())
            };
            rows.push(FragmentRow {
                kind: "pdos",
                label,
                file: file_name(&path),
            });
        }
    }
    for (label, path) in discover_cube_files(&args.dir)? {
        rows.push(FragmentRow {
            kind: "cube",
            label,
            file: file_name(&path),
        });
    }

    if rows.is_empty() {
        output::print_warning("No PDOS or cube files found.");
        return Ok(0);
    }

    println!("{}", Table::new(&rows));
    output::print_done(&format!("Found {} fragments", rows.len()));
    Ok(0)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
