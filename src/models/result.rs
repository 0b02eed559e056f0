//! # 运行结果数据模型
//!
//! 存储从 CP2K 主输出文件中提取的标量、结构化子记录和诊断标志。
//!
//! 诊断标志使用单独的有序集合 `DiagnosticFlags` 表示，
//! 枚举声明顺序即结果分类的优先级。
//!
//! ## 依赖关系
//! - 被 `parsers/main_log.rs` 填充
//! - 被 `engine/outcome.rs`, `engine/dispatcher.rs` 使用

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// 诊断标志（声明顺序 = 优先级，越靠前越优先）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticFlag {
    GeoNotConverged,
    OddNrElectrons,
    NeedAddedMos,
    CholeskyDecomposeFailed,
    BadConditionNumber,
    ExceededWalltime,
    Interrupted,
    Aborted,
    IncompatibleCode,
    Incomplete,
}

impl DiagnosticFlag {
    pub const ALL: [DiagnosticFlag; 10] = [
        DiagnosticFlag::GeoNotConverged,
        DiagnosticFlag::OddNrElectrons,
        DiagnosticFlag::NeedAddedMos,
        DiagnosticFlag::CholeskyDecomposeFailed,
        DiagnosticFlag::BadConditionNumber,
        DiagnosticFlag::ExceededWalltime,
        DiagnosticFlag::Interrupted,
        DiagnosticFlag::Aborted,
        DiagnosticFlag::IncompatibleCode,
        DiagnosticFlag::Incomplete,
    ];

    /// 参数通道中使用的键名
    pub fn key(&self) -> &'static str {
        match self {
            DiagnosticFlag::GeoNotConverged => "geo_not_converged",
            DiagnosticFlag::OddNrElectrons => "odd_nr_electrons",
            DiagnosticFlag::NeedAddedMos => "need_added_mos",
            DiagnosticFlag::CholeskyDecomposeFailed => "cholesky_decompose_failed",
            DiagnosticFlag::BadConditionNumber => "bad_condition_number",
            DiagnosticFlag::ExceededWalltime => "exceeded_walltime",
            DiagnosticFlag::Interrupted => "interrupted",
            DiagnosticFlag::Aborted => "aborted",
            DiagnosticFlag::IncompatibleCode => "incompatible_code",
            DiagnosticFlag::Incomplete => "incomplete",
        }
    }
}

impl std::fmt::Display for DiagnosticFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// 诊断标志有序集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticFlags(BTreeSet<DiagnosticFlag>);

impl DiagnosticFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, flag: DiagnosticFlag) -> bool {
        self.0.insert(flag)
    }

    pub fn contains(&self, flag: DiagnosticFlag) -> bool {
        self.0.contains(&flag)
    }

    /// 优先级最高的已设置标志
    pub fn highest_priority(&self) -> Option<DiagnosticFlag> {
        self.0.iter().next().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = DiagnosticFlag> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<DiagnosticFlag> for DiagnosticFlags {
    fn from_iter<I: IntoIterator<Item = DiagnosticFlag>>(iter: I) -> Self {
        DiagnosticFlags(iter.into_iter().collect())
    }
}

/// k 点能带数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpointData {
    /// k 点坐标
    pub kpoints: Vec<[f64; 3]>,

    /// 高对称点标签 (k 点序号, 标签)
    pub labels: Vec<(usize, String)>,

    /// 能带能量 [自旋][k 点][能带]
    pub bands: Vec<Vec<Vec<f64>>>,

    /// 能带能量单位
    pub bands_unit: String,

    /// 占据数 [自旋][k 点][能带]；旧格式不输出时为空
    pub occupations: Vec<Vec<Vec<f64>>>,
}

/// 原子 kind 元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindInfo {
    pub kind: String,
    pub element: String,
    pub nr_atoms: usize,
    pub basis_set: Option<String>,
    pub pseudopotential: Option<String>,
    /// 价电子数（由电子组态求和）
    pub valence_electrons: Option<u32>,
}

/// 单原子部分电荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialCharge {
    pub element: String,
    pub kind: usize,
    /// 参考电荷（仅 Hirshfeld）
    pub reference_charge: Option<f64>,
    /// 总布居
    pub population: f64,
    /// 自旋极化计算的 (alpha, beta) 布居
    pub spin_populations: Option<(f64, f64)>,
    pub charge: f64,
    pub spin_moment: Option<f64>,
}

/// 本征值摘要
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EigenvaluesInfo {
    pub unit: String,
    /// [自旋][轨道]
    pub eigenvalues: Vec<Vec<f64>>,
    /// [自旋][轨道]；旧格式不输出时为空
    pub occupations: Vec<Vec<f64>>,
    pub fermi_energy: Option<f64>,
    pub homo: Option<f64>,
    pub lumo: Option<f64>,
}

/// 几何优化 / 分子动力学单步摘要
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionStep {
    pub step: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_change: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_step: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rms_step: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_gradient: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rms_gradient: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converged: Option<bool>,
}

/// 单次运行的解析结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cp2k_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_units: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scf_converged: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nr_scf_steps: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_converged: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natoms: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nkinds: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nelectrons: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spin_polarized: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homo_lumo_gap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fermi_energy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nwarnings: Option<usize>,
    /// PDOS 片段中的费米能（由附加提取器合并）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e_fermi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kpoint_data: Option<KpointData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind_info: Option<Vec<KindInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mulliken: Option<Vec<PartialCharge>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hirshfeld: Option<Vec<PartialCharge>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eigenvalues_info: Option<EigenvaluesInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion_step_info: Option<Vec<MotionStep>>,

    #[serde(skip)]
    pub flags: DiagnosticFlags,
}

impl RunResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否超过计算时限（始终有定义）
    pub fn exceeded_walltime(&self) -> bool {
        self.flags.contains(DiagnosticFlag::ExceededWalltime)
    }

    /// 转换为参数通道的键值映射
    ///
    /// 已设置的诊断标志写为 `<key>: true`；`exceeded_walltime` 总是写出。
    pub fn to_parameters(&self) -> Result<Map<String, Value>> {
        let mut map = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for flag in self.flags.iter() {
            map.insert(flag.key().to_string(), Value::Bool(true));
        }
        map.insert(
            DiagnosticFlag::ExceededWalltime.key().to_string(),
            Value::Bool(self.exceeded_walltime()),
        );
        Ok(map)
    }
}
