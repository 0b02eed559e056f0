//! # 投影态密度 (PDOS) 数据模型
//!
//! ## 依赖关系
//! - 被 `parsers/pdos.rs` 构建
//! - 被 `engine/dispatcher.rs` 输出

use serde::{Deserialize, Serialize};

/// 单条 PDOS 序列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdosSeries {
    /// `<kind>_<orbital>` 标签
    pub label: String,
    pub unit: String,
    pub values: Vec<f64>,
}

/// 合并后的 PDOS 数据集
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdosDataset {
    /// 公共能量轴
    pub energy: Vec<f64>,
    pub energy_unit: String,
    pub e_fermi: f64,
    pub occupation: Vec<f64>,
    /// 按 kind 位点序号排列的各轨道态密度
    pub series: Vec<PdosSeries>,
}

impl PdosDataset {
    /// 全部 y 序列标签，占据数在前
    pub fn labels(&self) -> Vec<&str> {
        std::iter::once("occupation")
            .chain(self.series.iter().map(|s| s.label.as_str()))
            .collect()
    }

    pub fn series(&self, label: &str) -> Option<&PdosSeries> {
        self.series.iter().find(|s| s.label == label)
    }
}
