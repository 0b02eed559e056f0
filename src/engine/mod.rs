//! # 解析引擎
//!
//! 组合各解析器完成一次运行的解析、分类和分发。
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `parsers/`, `models/`, `config.rs`
//! - 子模块: dispatcher, outcome, plan

pub mod dispatcher;
pub mod outcome;
pub mod plan;

pub use dispatcher::{dispatch, Channels, Dispatch, RunFiles};
pub use outcome::{classify, Outcome};
pub use plan::ExtractionPlan;
