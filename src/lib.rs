//! # cp2k-ingest - CP2K 输出解析与结果分类
//!
//! 读取一次 CP2K 运行取回的文件，提取结构化结果，按固定优先级分类运行结果，
//! 并将各部分分发到命名输出通道。
//!
//! ## 依赖关系
//! ```text
//! engine/        (分发、分类、提取计划)
//!   ├── parsers/ (主输出、重启文件、PDOS、cube)
//!   │     └── models/
//!   └── config.rs
//! error.rs       (错误处理)
//! logging.rs     (tracing 初始化)
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod parsers;

pub use config::{ParseSettings, ParserVariant};
pub use engine::{classify, dispatch, Channels, Dispatch, ExtractionPlan, Outcome, RunFiles};
pub use error::{IngestError, Result};
