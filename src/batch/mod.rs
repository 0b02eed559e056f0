//! # 批量处理模块
//!
//! 提供多个运行目录的批量解析能力。
//!
//! ## 功能
//! - 收集运行目录列表
//! - 并行处理
//! - 进度反馈与统计
//!
//! ## 依赖关系
//! - 被 `commands/collect.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::RunCollector;
pub use runner::{BatchResult, BatchRunner, ProcessResult};
