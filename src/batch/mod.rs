// src/batch/mod.rs

mod sink;
mod task_runner;

pub use sink::{JsonlSink, open_output};
pub use task_runner::{BatchOptions, execute_batch, run_ordered};

use crate::{
    models::Outcome,
    ui::{self, symbols},
};
use colored::*;
use indicatif::ProgressBar;
use log::info;
use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub skipped: usize,
    /// 已完成的记录数 (按完成顺序计数，用于进度)
    pub completed: usize,
    pub success: usize,
    pub failed: usize,
    pub buckets: BTreeMap<String, usize>,
}

/// 一次批处理的最终结果，`run_from_cli` 据此决定退出码。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub buckets: BTreeMap<String, usize>,
    pub interrupted: bool,
}

/// 按完成顺序累计的进度状态，用于周期性的进度行。
#[derive(Debug, Default)]
struct IntervalState {
    success_since_report: usize,
    buckets: BTreeMap<String, usize>,
}

/// 批处理的统计与进度报告。调度器和写出逻辑共用同一个实例。
pub struct ProgressTracker {
    stats: Mutex<BatchStats>,
    interval: Mutex<IntervalState>,
    progress_every: usize,
    pbar: ProgressBar,
}

impl ProgressTracker {
    pub fn new(progress_every: usize) -> Self {
        Self {
            stats: Mutex::new(BatchStats::default()),
            interval: Mutex::new(IntervalState::default()),
            progress_every,
            pbar: ProgressBar::hidden(),
        }
    }

    /// 开始新一批任务。`skipped` 是续跑时已跳过的记录数，计入进度分母。
    pub fn start_batch(&mut self, total: usize, skipped: usize) {
        info!("开始处理 {} 条记录 (已跳过 {} 条)", total, skipped);
        *self.stats.get_mut().unwrap_or_else(PoisonError::into_inner) = BatchStats {
            total,
            skipped,
            ..Default::default()
        };
        *self.interval.get_mut().unwrap_or_else(PoisonError::into_inner) = IntervalState::default();
        if total > 0 {
            self.pbar = ui::new_tasks_progress_bar(total as u64, "处理中");
        }
    }

    /// 一条记录在某个 worker 中完成 (完成顺序，而非写出顺序)。
    /// 每完成 `progress_every` 条向 stderr 输出一行进度，返回是否输出了进度行。
    pub fn record_completion(&self, outcome: &Outcome, bucket: &str) -> bool {
        self.pbar.inc(1);
        let mut interval = self.interval.lock().unwrap_or_else(PoisonError::into_inner);
        if outcome.is_success() {
            interval.success_since_report += 1;
        } else {
            *interval.buckets.entry(bucket.to_string()).or_default() += 1;
        }
        let (completed, skipped, total) = {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            stats.completed += 1;
            (stats.completed, stats.skipped, stats.total)
        };
        if self.progress_every == 0 || completed % self.progress_every != 0 {
            return false;
        }
        ui::progress_line(
            &self.pbar,
            &format!(
                "{} 进度: {}/{} 本批成功: {} 失败分类: {{{}}}",
                *symbols::STAT,
                completed + skipped,
                total + skipped,
                interval.success_since_report,
                format_buckets(&interval.buckets)
            ),
        );
        interval.success_since_report = 0;
        true
    }

    /// 一条记录已按输入顺序写出。`bucket` 为失败分类，成功时忽略。
    pub fn record_written(&self, outcome: &Outcome, bucket: &str) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        if outcome.is_success() {
            stats.success += 1;
        } else {
            stats.failed += 1;
            *stats.buckets.entry(bucket.to_string()).or_default() += 1;
        }
    }

    pub fn get_stats(&self) -> BatchStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn summary(&self, interrupted: bool) -> BatchSummary {
        let stats = self.get_stats();
        BatchSummary {
            total: stats.total,
            processed: stats.success + stats.failed,
            success: stats.success,
            failed: stats.failed,
            skipped: stats.skipped,
            buckets: stats.buckets,
            interrupted,
        }
    }

    pub fn finish(&self) {
        self.pbar.finish_and_clear();
    }
}

impl BatchSummary {
    pub fn print_report(&self) {
        info!(
            "统计: processed={}, success={}, failed={}, skipped={}, buckets={{{}}}",
            self.processed,
            self.success,
            self.failed,
            self.skipped,
            format_buckets(&self.buckets)
        );

        ui::print_sub_header("任务总结");
        if !self.buckets.is_empty() {
            ui::plain(&format!("{} 失败分类:", *symbols::ERROR));
            for (name, count) in &self.buckets {
                ui::plain(&format!("  - {}: {}", name.red(), count));
            }
        }
        if self.failed == 0 && !self.interrupted {
            ui::plain(&format!(
                "{} 全部 {} 条记录均已成功 ({} 条已跳过)。",
                *symbols::OK,
                self.processed,
                self.skipped
            ));
        } else {
            ui::plain(&format!(
                "{} {} | {} | {} | {}",
                *symbols::STAT,
                format!("已处理: {}", self.processed).cyan(),
                format!("成功: {}", self.success).green(),
                format!("失败: {}", self.failed).red(),
                format!("跳过: {}", self.skipped).yellow()
            ));
        }
    }
}

fn format_buckets(buckets: &BTreeMap<String, usize>) -> String {
    buckets
        .iter()
        .map(|(name, count)| format!("{}={}", name, count))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts_and_buckets() {
        let mut tracker = ProgressTracker::new(0);
        tracker.start_batch(3, 2);
        tracker.record_completion(&Outcome::success("x"), "unknown");
        tracker.record_completion(&Outcome::failure("live url"), "live_url");
        tracker.record_completion(&Outcome::interrupted(), "interrupted");
        tracker.record_written(&Outcome::success("x"), "other");
        tracker.record_written(&Outcome::failure("live url"), "live_url");
        tracker.record_written(&Outcome::interrupted(), "interrupted");

        let summary = tracker.summary(true);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.success, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.buckets.get("live_url"), Some(&1));
        assert_eq!(summary.buckets.get("interrupted"), Some(&1));
        assert_eq!(tracker.get_stats().completed, 3);
    }

    #[test]
    fn test_progress_reported_every_interval() {
        let mut tracker = ProgressTracker::new(2);
        tracker.start_batch(5, 0);
        let reported: Vec<bool> = (0..5)
            .map(|i| tracker.record_completion(&Outcome::failure("cdn url not found"), if i % 2 == 0 { "a" } else { "b" }))
            .collect();
        assert_eq!(reported, vec![false, true, false, true, false]);
        let interval = tracker.interval.lock().unwrap();
        assert_eq!(format_buckets(&interval.buckets), "a=3, b=2");

        let mut silent = ProgressTracker::new(0);
        silent.start_batch(3, 0);
        assert!((0..3).all(|_| !silent.record_completion(&Outcome::success("x"), "unknown")));
    }
}
