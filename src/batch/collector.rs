//! # 运行目录收集器
//!
//! 在根目录下查找含有 CP2K 主输出文件的运行目录。
//!
//! ## 功能
//! - 根目录本身也可以是运行目录
//! - 可选递归搜索
//! - 结果按路径排序
//!
//! ## 依赖关系
//! - 被 `commands/collect.rs` 调用
//! - 使用 `walkdir` 遍历目录

use std::path::PathBuf;
use walkdir::WalkDir;

/// 运行目录收集器
pub struct RunCollector {
    /// 根目录
    root: PathBuf,
    /// 主输出文件名
    output_file: String,
    /// 是否递归
    recursive: bool,
}

impl RunCollector {
    pub fn new(root: PathBuf, output_file: &str) -> Self {
        Self {
            root,
            output_file: output_file.to_string(),
            recursive: false,
        }
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 收集所有运行目录
    pub fn collect(&self) -> Vec<PathBuf> {
        if !self.root.is_dir() {
            return vec![];
        }

        // 根目录下一层运行目录中的输出文件位于深度 2
        let max_depth = if self.recursive { usize::MAX } else { 2 };

        let mut dirs: Vec<PathBuf> = WalkDir::new(&self.root)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_str() == Some(self.output_file.as_str()))
            .filter_map(|e| e.path().parent().map(|p| p.to_path_buf()))
            .collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }
}
