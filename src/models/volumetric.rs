//! # 体数据 (Gaussian cube) 数据模型
//!
//! ## 依赖关系
//! - 被 `parsers/cube.rs` 构建
//! - 被 `engine/dispatcher.rs` 输出

use serde::{Deserialize, Serialize};

/// cube 文件中的原子
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeAtom {
    pub atomic_number: i32,
    pub charge: f64,
    /// 位置，单位见 `CubeGrid::length_unit`
    pub position: [f64; 3],
}

/// 三维标量场网格
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeGrid {
    pub comments: [String; 2],
    /// 长度单位：`bohr`，格点数为负时为 `angstrom`
    pub length_unit: String,
    pub origin: [f64; 3],
    /// 各轴格点数
    pub shape: [usize; 3],
    /// 各轴体素向量
    pub voxel: [[f64; 3]; 3],
    pub atoms: Vec<CubeAtom>,
    /// 按 x 最慢、z 最快的顺序展开
    pub values: Vec<f64>,
}

impl CubeGrid {
    /// 取格点值
    pub fn value(&self, i: usize, j: usize, k: usize) -> Option<f64> {
        let [nx, ny, nz] = self.shape;
        if i >= nx || j >= ny || k >= nz {
            return None;
        }
        self.values.get((i * ny + j) * nz + k).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
