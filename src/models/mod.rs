//! # 数据模型模块
//!
//! 定义运行结果、最终结构、PDOS 和体数据的数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/` 和 `engine/` 使用
//! - 子模块: result, structure, spectral, volumetric

pub mod result;
pub mod spectral;
pub mod structure;
pub mod volumetric;

pub use result::{
    DiagnosticFlag, DiagnosticFlags, EigenvaluesInfo, KindInfo, KpointData, MotionStep,
    PartialCharge, RunResult,
};
pub use spectral::{PdosDataset, PdosSeries};
pub use structure::{Atom, Lattice, StructureRecord};
pub use volumetric::{CubeAtom, CubeGrid};
