//! # collect 命令实现
//!
//! 并行解析多个 CP2K 运行并汇总为 CSV。
//!
//! ## 功能
//! - 扫描含主输出文件的运行目录
//! - 并行调用分发器
//! - 生成 CSV 汇总与非成功运行表格
//!
//! ## 依赖关系
//! - 使用 `cli/collect.rs` 定义的参数
//! - 使用 `batch/`, `engine/dispatcher.rs`
//! - 使用 `utils/output.rs`

use crate::batch::{BatchResult, BatchRunner, ProcessResult, RunCollector};
use crate::cli::collect::CollectArgs;
use crate::utils::output;
use cp2k_ingest::{dispatch, Dispatch, IngestError, ParseSettings, Result, RunFiles};

use serde::Serialize;
use std::path::Path;
use tabled::{Table, Tabled};
use tracing::warn;

/// CSV 汇总行
#[derive(Debug, Clone, Serialize, Tabled)]
struct RunSummary {
    #[tabled(rename = "Run")]
    run: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Code")]
    exit_code: i32,
    #[tabled(skip)]
    energy: Option<f64>,
    #[tabled(skip)]
    natoms: Option<u64>,
    #[tabled(skip)]
    scf_converged: Option<bool>,
    #[tabled(rename = "Error", display_with = "display_error")]
    error: Option<String>,
}

fn display_error(error: &Option<String>) -> String {
    error.clone().unwrap_or_default()
}

impl RunSummary {
    fn from_dispatch(run: &Path, dispatch: &Dispatch) -> Self {
        let params = &dispatch.channels.output_parameters;
        RunSummary {
            run: run.display().to_string(),
            outcome: dispatch.outcome.name().to_string(),
            exit_code: dispatch.exit_code,
            energy: params.get("energy").and_then(|v| v.as_f64()),
            natoms: params.get("natoms").and_then(|v| v.as_u64()),
            scf_converged: params.get("scf_converged").and_then(|v| v.as_bool()),
            error: None,
        }
    }

    fn from_error(run: &Path, error: &IngestError) -> Self {
        RunSummary {
            run: run.display().to_string(),
            outcome: error.kind().to_string(),
            exit_code: error.exit_code(),
            energy: None,
            natoms: None,
            scf_converged: None,
            error: Some(error.to_string()),
        }
    }
}

/// 执行 collect 命令
pub fn execute(args: CollectArgs) -> Result<i32> {
    output::print_header("Collecting CP2K Results");

    if !args.root.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: args.root.display().to_string(),
        });
    }

    let runs = RunCollector::new(args.root.clone(), &args.output_file)
        .recursive(args.recursive)
        .collect();
    if runs.is_empty() {
        output::print_warning(&format!(
            "No run folders containing '{}' found.",
            args.output_file
        ));
        return Ok(0);
    }

    let runner = BatchRunner::new(args.jobs);
    output::print_info(&format!(
        "Parsing {} runs with {} jobs...",
        runs.len(),
        runner.jobs()
    ));

    let settings = ParseSettings {
        check_scf_convergence: args.check_scf_conv,
    };
    // 批量模式下片段与主输出位于同一目录
    let summaries = runner.run(&runs, |dir| {
        let files = RunFiles::new(dir)
            .with_output_file(args.output_file.as_str())
            .with_project(args.project.as_str())
            .with_temp_dir(Some(dir.to_path_buf()));
        match dispatch(&files, args.variant, &settings) {
            Ok(result) => {
                let status = if result.outcome.is_success() {
                    ProcessResult::Success
                } else {
                    ProcessResult::Diagnosed
                };
                (RunSummary::from_dispatch(dir, &result), status)
            }
            Err(e) => {
                warn!(run = %dir.display(), kind = e.kind(), "Run could not be parsed: {}", e);
                (RunSummary::from_error(dir, &e), ProcessResult::Failed)
            }
        }
    })?;

    let mut stats = BatchResult::default();
    let mut writer = csv::Writer::from_path(&args.output)?;
    for (summary, status) in &summaries {
        writer.serialize(summary)?;
        stats.merge(*status);
    }
    writer.flush().map_err(|e| IngestError::FileWriteError {
        path: args.output.display().to_string(),
        source: e,
    })?;

    let unsuccessful: Vec<&RunSummary> = summaries
        .iter()
        .filter(|(_, status)| *status != ProcessResult::Success)
        .map(|(summary, _)| summary)
        .collect();
    if !unsuccessful.is_empty() {
        output::print_header("Runs Needing Attention");
        println!("{}", Table::new(unsuccessful));
    }

    output::print_done(&format!(
        "{} runs: {} successful, {} with diagnostics, {} failed. Summary written to '{}'",
        stats.total(),
        stats.success,
        stats.diagnosed,
        stats.failed,
        args.output.display()
    ));

    Ok(0)
}
