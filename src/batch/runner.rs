//! # 批量执行器
//!
//! 在独立的 rayon 线程池中并行处理扫描文件。每个文件的处理互不依赖，
//! 单个文件失败只记录在结果中，不会中断批处理。
//!
//! ## 依赖关系
//! - 被 `commands/batch.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条
//! - 使用 `rayon` 进行并行计算

use crate::error::{Result, XrdError};
use crate::utils::progress;

use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// 单个文件处理结果
#[derive(Debug, Clone)]
pub enum ProcessResult {
    /// 处理成功，附检测到的峰数
    Success { file: PathBuf, peaks: usize },
    /// 跳过（输出已存在）
    Skipped { file: PathBuf },
    Failed { file: PathBuf, error: String },
}

/// 批量处理结果统计
#[derive(Debug, Default)]
pub struct BatchResult {
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
    /// 所有成功文件的峰数之和
    pub total_peaks: usize,
    /// 成功文件及其峰数（按输入顺序）
    pub analyzed: Vec<(PathBuf, usize)>,
    pub skipped_files: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, String)>,
}

impl BatchResult {
    pub fn merge(&mut self, result: ProcessResult) {
        match result {
            ProcessResult::Success { file, peaks } => {
                self.success += 1;
                self.total_peaks += peaks;
                self.analyzed.push((file, peaks));
            }
            ProcessResult::Skipped { file } => {
                self.skipped += 1;
                self.skipped_files.push(file);
            }
            ProcessResult::Failed { file, error } => {
                self.failed += 1;
                self.failures.push((file, error));
            }
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.skipped + self.failed
    }
}

/// 批量执行器
pub struct BatchRunner {
    jobs: usize,
}

impl BatchRunner {
    /// `jobs == 0` 时使用全部 CPU 核心
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self { jobs }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// 并行处理文件列表，结果按输入顺序合并
    pub fn run<F>(&self, files: &[PathBuf], processor: F) -> Result<BatchResult>
    where
        F: Fn(&Path) -> ProcessResult + Sync + Send,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| XrdError::Other(format!("failed to build thread pool: {}", e)))?;

        let pb = progress::create_progress_bar(files.len() as u64, "Analyzing");

        let results: Vec<ProcessResult> = pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    let result = processor(file);
                    pb.inc(1);
                    result
                })
                .collect()
        });

        pb.finish_and_clear();

        let mut batch = BatchResult::default();
        for result in results {
            batch.merge(result);
        }
        Ok(batch)
    }
}
