//! # parse 命令实现
//!
//! 解析单次 CP2K 运行，打印各输出通道摘要和结果类别。
//!
//! ## 功能
//! - 合并设置文件与命令行开关
//! - 调用分发器完成解析
//! - 生成终端表格和可选 JSON 输出
//!
//! ## 依赖关系
//! - 使用 `cli/parse.rs` 定义的参数
//! - 使用 `engine/dispatcher.rs`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::cli::parse::ParseArgs;
use crate::utils::{output, progress};
use cp2k_ingest::{dispatch, Channels, IngestError, ParseSettings, Result, RunFiles};

use std::fs;
use tabled::{Table, Tabled};

/// 通道摘要行
#[derive(Debug, Clone, Tabled)]
struct ChannelRow {
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "Content")]
    content: String,
}

/// 执行 parse 命令，返回结果类别对应的进程退出状态
pub fn execute(args: ParseArgs) -> Result<i32> {
    output::print_header("Parsing CP2K Run");

    if !args.retrieved_dir.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: args.retrieved_dir.display().to_string(),
        });
    }

    let mut settings = match &args.settings {
        Some(path) => ParseSettings::from_file(path)?,
        None => ParseSettings::default(),
    };
    if args.check_scf_conv {
        settings.check_scf_convergence = true;
    }

    let files = RunFiles::new(&args.retrieved_dir)
        .with_output_file(args.output_file.as_str())
        .with_project(args.project.as_str())
        .with_temp_dir(args.temp_dir.clone());

    output::print_info(&format!(
        "Parsing '{}' ({} variant)",
        files.log_path().display(),
        args.variant
    ));

    let spinner = progress::create_spinner("Reading output files");
    let result = dispatch(&files, args.variant, &settings);
    spinner.finish_and_clear();
    let result = result?;

    let table = Table::new(channel_rows(&result.channels));
    println!("{}", table);

    output::print_outcome(result.outcome);

    if let Some(path) = &args.json {
        let json = serde_json::to_string_pretty(&result)?;
        fs::write(path, json).map_err(|e| IngestError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })?;
        output::print_success(&format!("Channels written to '{}'", path.display()));
    }

    Ok(result.outcome.process_status())
}

/// 生成通道摘要
fn channel_rows(channels: &Channels) -> Vec<ChannelRow> {
    let mut rows = vec![ChannelRow {
        channel: "output_parameters".to_string(),
        content: format!("{} keys", channels.output_parameters.len()),
    }];
    let mut push = |channel: &str, content: String| {
        rows.push(ChannelRow {
            channel: channel.to_string(),
            content,
        })
    };

    if let Some(structure) = &channels.output_structure {
        push(
            "output_structure",
            format!("{} ({} atoms)", structure.formula(), structure.len()),
        );
    }
    if let Some(pdos) = &channels.output_pdos {
        push(
            "output_pdos",
            format!(
                "{} series, {} points, E(Fermi) = {:.6} {}",
                pdos.series.len(),
                pdos.energy.len(),
                pdos.e_fermi,
                pdos.energy_unit
            ),
        );
    }
    if let Some(bands) = &channels.output_bands {
        push("output_bands", format!("{} k-points", bands.kpoints.len()));
    }
    if let Some(eigen) = &channels.output_eigenvalues {
        push(
            "output_eigenvalues",
            format!("{} spin channel(s) [{}]", eigen.eigenvalues.len(), eigen.unit),
        );
    }
    if let Some(charges) = &channels.output_mulliken_populations {
        push("output_mulliken_populations", format!("{} atoms", charges.len()));
    }
    if let Some(charges) = &channels.output_hirshfeld_populations {
        push("output_hirshfeld_populations", format!("{} atoms", charges.len()));
    }
    if let Some(steps) = &channels.output_motion_step_info {
        push("output_motion_step_info", format!("{} steps", steps.len()));
    }
    if let Some(kinds) = &channels.output_kind_info {
        push("output_kind_info", format!("{} kinds", kinds.len()));
    }
    for (label, grid) in &channels.output_cubes {
        let [nx, ny, nz] = grid.shape;
        push(
            &format!("output_cubes.{}", label),
            format!("{}x{}x{} grid", nx, ny, nz),
        );
    }

    rows
}
