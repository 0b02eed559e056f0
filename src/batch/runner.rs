//! # 批量执行器
//!
//! 并行执行批量解析任务。
//!
//! ## 功能
//! - 基于 rayon 的并行迭代，结果保持输入顺序
//! - 进度条显示
//! - 成功 / 诊断 / 失败统计
//!
//! ## 依赖关系
//! - 被 `commands/collect.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条
//! - 使用 `rayon` 进行并行计算

use crate::utils::progress;
use cp2k_ingest::{IngestError, Result};

use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// 单个运行的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    /// 解析成功且运行成功
    Success,
    /// 解析成功但运行带有诊断结果
    Diagnosed,
    /// 解析失败
    Failed,
}

/// 批量处理结果统计
#[derive(Debug, Default)]
pub struct BatchResult {
    pub success: usize,
    pub diagnosed: usize,
    pub failed: usize,
}

impl BatchResult {
    /// 合并处理结果
    pub fn merge(&mut self, result: ProcessResult) {
        match result {
            ProcessResult::Success => self.success += 1,
            ProcessResult::Diagnosed => self.diagnosed += 1,
            ProcessResult::Failed => self.failed += 1,
        }
    }

    /// 总处理数量
    pub fn total(&self) -> usize {
        self.success + self.diagnosed + self.failed
    }
}

/// 批量执行器
pub struct BatchRunner {
    /// 并行作业数
    jobs: usize,
}

impl BatchRunner {
    /// 创建新的批量执行器，`jobs == 0` 时使用全部 CPU
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self { jobs }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// 并行处理运行目录列表
    pub fn run<T, F>(&self, dirs: &[PathBuf], processor: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&Path) -> T + Sync + Send,
    {
        let pb = progress::create_progress_bar(dirs.len() as u64, "Parsing runs");

        // 配置 rayon 线程池
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| IngestError::InvalidArgument(format!("Cannot build thread pool: {}", e)))?;

        let results: Vec<T> = pool.install(|| {
            dirs.par_iter()
                .map(|dir| {
                    let result = processor(dir.as_path());
                    pb.inc(1);
                    result
                })
                .collect()
        });

        pb.finish_and_clear();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_result_counts() {
        let mut batch = BatchResult::default();
        batch.merge(ProcessResult::Success);
        batch.merge(ProcessResult::Diagnosed);
        batch.merge(ProcessResult::Diagnosed);
        batch.merge(ProcessResult::Failed);

        assert_eq!(batch.total(), 4);
        assert_eq!((batch.success, batch.diagnosed, batch.failed), (1, 2, 1));
    }

    #[test]
    fn test_runner_keeps_input_order() {
        let dirs: Vec<PathBuf> = (0..20).map(|i| PathBuf::from(format!("run_{}", i))).collect();
        let runner = BatchRunner::new(4);

        let names = runner
            .run(&dirs, |dir| dir.display().to_string())
            .unwrap();

        assert_eq!(runner.jobs(), 4);
        assert_eq!(names[0], "run_0");
        assert_eq!(names[19], "run_19");
    }
}
