//! # 结果分发器
//!
//! 单次运行的完整解析流程：
//! 1. 读取主输出并解析为 `RunResult`
//! 2. 按 `ExtractionPlan` 并行读取重启文件、PDOS 和 cube 片段
//! 3. 分类结果并将各子记录分发到命名输出通道
//!
//! 被分发到专用通道的子记录不再出现在参数通道中。
//!
//! ## 依赖关系
//! - 被 `commands/parse.rs` 和 `commands/collect.rs` 使用
//! - 使用 `parsers/`, `engine/plan.rs`, `engine/outcome.rs`

use crate::config::{ParseSettings, ParserVariant};
use crate::engine::outcome::{classify, Outcome};
use crate::engine::plan::ExtractionPlan;
use crate::error::{IngestError, Result};
use crate::models::{
    CubeGrid, EigenvaluesInfo, KindInfo, KpointData, MotionStep, PartialCharge, PdosDataset,
    StructureRecord,
};
use crate::parsers::{cube, main_log, pdos, restart};

use rayon::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 默认主输出文件名
pub const DEFAULT_OUTPUT_FILE: &str = "aiida.out";
/// 默认项目名
pub const DEFAULT_PROJECT: &str = "aiida";

/// 单次运行的输入文件位置
#[derive(Debug, Clone)]
pub struct RunFiles {
    /// 已取回的输出目录
    pub retrieved: PathBuf,
    /// 主输出文件名
    pub output_file: String,
    /// 项目名，决定重启文件名
    pub project: String,
    /// 存放 PDOS / cube 片段的临时目录
    pub temp_dir: Option<PathBuf>,
}

impl RunFiles {
    pub fn new(retrieved: impl Into<PathBuf>) -> Self {
        RunFiles {
            retrieved: retrieved.into(),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            project: DEFAULT_PROJECT.to_string(),
            temp_dir: None,
        }
    }

    pub fn with_output_file(mut self, name: impl Into<String>) -> Self {
        self.output_file = name.into();
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    pub fn log_path(&self) -> PathBuf {
        self.retrieved.join(&self.output_file)
    }

    pub fn restart_path(&self) -> PathBuf {
        self.retrieved.join(restart::restart_file_name(&self.project))
    }
}

/// 命名输出通道
#[derive(Debug, Clone, Default, Serialize)]
pub struct Channels {
    pub output_parameters: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_structure: Option<StructureRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_pdos: Option<PdosDataset>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub output_cubes: BTreeMap<String, CubeGrid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_bands: Option<KpointData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_eigenvalues: Option<EigenvaluesInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_mulliken_populations: Option<Vec<PartialCharge>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_hirshfeld_populations: Option<Vec<PartialCharge>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_motion_step_info: Option<Vec<MotionStep>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_kind_info: Option<Vec<KindInfo>>,
}

impl Channels {
    /// 已填充的通道名，cube 通道为 `output_cubes.<label>`
    pub fn names(&self) -> Vec<String> {
        let mut names = vec!["output_parameters".to_string()];
        let optional = [
            ("output_structure", self.output_structure.is_some()),
            ("output_pdos", self.output_pdos.is_some()),
            ("output_bands", self.output_bands.is_some()),
            ("output_eigenvalues", self.output_eigenvalues.is_some()),
            ("output_mulliken_populations", self.output_mulliken_populations.is_some()),
            ("output_hirshfeld_populations", self.output_hirshfeld_populations.is_some()),
            ("output_motion_step_info", self.output_motion_step_info.is_some()),
            ("output_kind_info", self.output_kind_info.is_some()),
        ];
        names.extend(
            optional
                .iter()
                .filter(|(_, present)| *present)
                .map(|(name, _)| name.to_string()),
        );
        names.extend(self.output_cubes.keys().map(|label| format!("output_cubes.{}", label)));
        names
    }
}

/// 分发结果
#[derive(Debug, Clone, Serialize)]
pub struct Dispatch {
    pub outcome: Outcome,
    pub exit_code: i32,
    pub channels: Channels,
}

/// 解析一次运行并分发结果
///
/// 主输出缺失或不可读时直接失败，不产出任何部分结果。
pub fn dispatch(files: &RunFiles, variant: ParserVariant, settings: &ParseSettings) -> Result<Dispatch> {
    let log_path = files.log_path();
    if !log_path.is_file() {
        return Err(IngestError::PrimaryLogMissing {
            path: log_path.display().to_string(),
        });
    }
    let content = fs::read_to_string(&log_path).map_err(|e| IngestError::PrimaryLogUnreadable {
        path: log_path.display().to_string(),
        source: e,
    })?;

    let mut result = main_log::parse_main_log(&content, variant)?;
    let plan = ExtractionPlan::decide(variant, &result, settings);
    debug!(?plan, %variant, "Extraction plan decided");

    let temp_dir = files.temp_dir.as_deref();
    let restart_path = files.restart_path();
    let (structure, (pdos_data, cubes)) = rayon::join(
        || restart::parse_restart_file(&restart_path),
        || {
            rayon::join(
                || match temp_dir {
                    Some(dir) if plan.pdos => extract_pdos(dir),
                    _ => Ok(None),
                },
                || match temp_dir {
                    Some(dir) if plan.cubes => extract_cubes(dir),
                    _ => Ok(BTreeMap::new()),
                },
            )
        },
    );
    let structure = structure?;
    let pdos_data = pdos_data?;
    let cubes = cubes?;

    if let Some(dataset) = &pdos_data {
        result.e_fermi = Some(dataset.e_fermi);
    }
    let outcome = classify(&result);

    let mut channels = Channels {
        output_structure: structure,
        output_pdos: pdos_data,
        output_cubes: cubes,
        output_kind_info: result.kind_info.take(),
        ..Channels::default()
    };
    match variant {
        ParserVariant::Standard => {
            channels.output_bands = result.kpoint_data.take();
            channels.output_eigenvalues = result.eigenvalues_info.take();
        }
        ParserVariant::PartialCharges => {
            channels.output_mulliken_populations = result.mulliken.take();
            channels.output_hirshfeld_populations = result.hirshfeld.take();
        }
        ParserVariant::Trajectory => {
            channels.output_motion_step_info = result.motion_step_info.take();
        }
    }
    channels.output_parameters = result.to_parameters()?;

    info!(
        outcome = %outcome,
        channels = channels.names().len(),
        "Dispatched run {}",
        files.retrieved.display()
    );
    Ok(Dispatch {
        outcome,
        exit_code: outcome.exit_code(),
        channels,
    })
}

fn extract_pdos(dir: &Path) -> Result<Option<PdosDataset>> {
    let files = pdos::discover_pdos_files(dir)?;
    if files.is_empty() {
        return Ok(None);
    }
    pdos::parse_pdos_files(&files)
}

fn extract_cubes(dir: &Path) -> Result<BTreeMap<String, CubeGrid>> {
    cube::discover_cube_files(dir)?
        .into_par_iter()
        .map(|(label, path)| cube::read_cube_file(&path).map(|grid| (label, grid)))
        .collect()
}
