// src/lib.rs

pub mod batch;
pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod input;
pub mod models;
pub mod resolver;
pub mod resume;
pub mod ui;
pub mod utils;

use crate::{
    batch::{BatchOptions, BatchSummary, ProgressTracker},
    cli::Cli,
    config::AppConfig,
    error::{AppError, AppResult},
    models::Record,
    resolver::{KuaishouResolver, Transform},
    resume::ResumeFilter,
    ui::symbols,
};
use log::{debug, info};
use std::{path::Path, sync::Arc};
use tokio_util::sync::CancellationToken;

/// 库的公共入口点，由 `main.rs` 调用。
///
/// 读取输入、按需续跑、解析全部记录并写出 JSONL。被中断时返回 `UserInterrupt`，
/// 开启 `--fail-on-error` 且存在失败记录时返回 `BatchFailed`。
pub async fn run_from_cli(args: Arc<Cli>, cancel: CancellationToken) -> AppResult<BatchSummary> {
    debug!("CLI 参数: {:?}", args);
    let mut config = AppConfig::new(&args)?;

    if args.resume && args.writes_to_stdout() {
        return Err(AppError::UsageError(
            "--resume 需要通过 -o/--output 指定输出文件".to_string(),
        ));
    }

    let loaded = input::load_records(&args.input, args.format, &config.fields)?;
    config.fields.key = loaded.key_field;
    debug!("加载的应用配置: {:?}", config);

    let mut records = loaded.records;
    let mut skipped = 0;
    if args.resume {
        let filter = ResumeFilter::new(config.fields.clone());
        let (kept, removed) = filter.clean(&args.output)?;
        if removed > 0 {
            ui::info(&format!("续跑: 已从输出文件移除 {} 条失败或损坏的记录 (保留 {} 条)", removed, kept));
        }
        let done = filter.load_success_keys(&args.output)?;
        let (remaining, done_count) = filter.filter(records, &done);
        records = remaining;
        skipped = done_count;
        if skipped > 0 {
            ui::info(&format!("续跑: 跳过 {} 条已成功的记录", skipped));
        }
        if records.is_empty() {
            ui::info("续跑: 所有记录均已完成，无需处理");
            return Ok(BatchSummary { skipped, ..Default::default() });
        }
    }

    ui::print_header(&format!(
        "解析 {} 条记录 (并发 {}, 按 {} 可随时中断)",
        records.len(),
        config.workers,
        *symbols::CTRL_C
    ));

    let transform: Arc<dyn Transform> = Arc::new(KuaishouResolver::from_config(&config)?);
    let summary = run_batch(records, transform, &config, &args.output, args.resume, skipped, &cancel).await?;
    summary.print_report();

    if summary.interrupted {
        return Err(AppError::UserInterrupt);
    }
    if config.fail_on_error && summary.failed > 0 {
        return Err(AppError::BatchFailed(summary.failed));
    }
    Ok(summary)
}

/// 用任意转换执行一批记录并写出到 `output`。`append` 为真时追加到已有文件末尾。
pub async fn run_batch(
    records: Vec<Record>,
    transform: Arc<dyn Transform>,
    config: &AppConfig,
    output: &Path,
    append: bool,
    skipped: usize,
    cancel: &CancellationToken,
) -> AppResult<BatchSummary> {
    let mut sink = batch::open_output(output, append, config.fields.clone())?;
    let mut tracker = ProgressTracker::new(config.progress_every);
    tracker.start_batch(records.len(), skipped);

    let options = BatchOptions {
        workers: config.workers,
        sleep: config.sleep,
    };
    let summary = batch::execute_batch(records, transform, &options, cancel, &mut sink, &tracker).await?;
    info!(
        "批处理结束: 成功 {}, 失败 {}, 跳过 {}, 中断: {}",
        summary.success, summary.failed, summary.skipped, summary.interrupted
    );
    Ok(summary)
}
