//! # 解析器模块
//!
//! 提供 CP2K 主输出、重启文件、PDOS 片段和 cube 文件的解析器。
//!
//! ## 依赖关系
//! - 被 `engine/` 和 `commands/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: scanner, main_log, restart, pdos, cube

pub mod cube;
pub mod main_log;
pub mod pdos;
pub mod restart;
pub mod scanner;

pub use cube::{discover_cube_files, read_cube_file, CubeLabel};
pub use main_log::{detect_version, parse_main_log};
pub use pdos::{discover_pdos_files, parse_pdos_files, PdosFiles};
pub use restart::{parse_restart_file, restart_file_name};
