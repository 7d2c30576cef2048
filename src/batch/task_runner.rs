// src/batch/task_runner.rs

use super::{BatchSummary, JsonlSink, ProgressTracker};
use crate::{
    constants::errors,
    error::AppResult,
    models::{Outcome, Record},
    resolver::Transform,
    utils,
};
use futures::{FutureExt, StreamExt, stream};
use log::{debug, error, warn};
use std::{
    any::Any,
    collections::BTreeMap,
    future::Future,
    io::Write,
    panic::AssertUnwindSafe,
    pin::pin,
    sync::Arc,
    time::Duration,
};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub workers: usize,
    /// 顺序模式下两条记录之间的固定间隔
    pub sleep: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { workers: 1, sleep: Duration::ZERO }
    }
}

/// 有界并发、保持输入顺序的映射。
///
/// 对 `0..total` 的每个下标调用 `work`，同时在途的任务不超过 `workers` 个。
/// `on_settled` 按完成顺序回调，`emit` 严格按下标升序回调，每个下标恰好一次。
/// 任务内的 panic 会被转换成该条记录的失败结果。
///
/// `cancel` 触发后不再启动新任务，尚未完成的下标一律以 `interrupted` 结果输出，
/// 已完成的保留原结果。返回值表示是否被取消。`emit` 出错时立即返回该错误。
pub async fn run_ordered<F, Fut, S, E>(
    total: usize,
    workers: usize,
    sleep: Duration,
    cancel: &CancellationToken,
    work: F,
    mut on_settled: S,
    mut emit: E,
) -> AppResult<bool>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Outcome> + Send + 'static,
    S: FnMut(usize, &Outcome),
    E: FnMut(usize, Outcome) -> AppResult<()>,
{
    if workers <= 1 {
        return run_sequential(total, sleep, cancel, work, on_settled, emit).await;
    }

    let mut pending = pin!(
        stream::iter(0..total)
            .map(|idx| {
                let token = cancel.clone();
                let fut = work(idx);
                let handle = tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => Outcome::interrupted(),
                        outcome = fut => outcome,
                    }
                });
                async move { (idx, join_outcome(idx, handle.await)) }
            })
            .buffer_unordered(workers)
    );

    let mut ready: BTreeMap<usize, Outcome> = BTreeMap::new();
    let mut next = 0;
    let interrupted = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break true,
            item = pending.next() => match item {
                Some((idx, outcome)) => {
                    on_settled(idx, &outcome);
                    ready.insert(idx, outcome);
                    while let Some(outcome) = ready.remove(&next) {
                        emit(next, outcome)?;
                        next += 1;
                    }
                }
                None => break false,
            },
        }
    };

    if interrupted {
        debug!("批处理被取消，已按序写出 {} 条，补写剩余 {} 条", next, total - next);
        for idx in next..total {
            let outcome = ready.remove(&idx).unwrap_or_else(Outcome::interrupted);
            emit(idx, outcome)?;
        }
    }
    Ok(interrupted)
}

/// `workers == 1` 时在当前任务上逐条执行，不启动任何后台任务。
async fn run_sequential<F, Fut, S, E>(
    total: usize,
    sleep: Duration,
    cancel: &CancellationToken,
    work: F,
    mut on_settled: S,
    mut emit: E,
) -> AppResult<bool>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Outcome>,
    S: FnMut(usize, &Outcome),
    E: FnMut(usize, Outcome) -> AppResult<()>,
{
    for idx in 0..total {
        if cancel.is_cancelled() {
            for rest in idx..total {
                emit(rest, Outcome::interrupted())?;
            }
            return Ok(true);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Outcome::interrupted(),
            res = AssertUnwindSafe(work(idx)).catch_unwind() => {
                res.unwrap_or_else(|payload| panic_outcome(idx, payload.as_ref()))
            }
        };
        on_settled(idx, &outcome);
        emit(idx, outcome)?;

        if !sleep.is_zero() && idx + 1 < total {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(sleep) => {}
            }
        }
    }
    Ok(cancel.is_cancelled())
}

fn join_outcome(idx: usize, joined: Result<Outcome, JoinError>) -> Outcome {
    match joined {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => panic_outcome(idx, e.into_panic().as_ref()),
        Err(e) => {
            warn!("第 {} 条记录的任务被取消: {}", idx, e);
            Outcome::interrupted()
        }
    }
}

fn panic_outcome(idx: usize, payload: &(dyn Any + Send)) -> Outcome {
    let msg = utils::panic_message(payload)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| errors::TRANSFORM_PANICKED.to_string());
    error!("第 {} 条记录处理时发生 panic: {}", idx, msg);
    Outcome::failure(msg)
}

/// 对一批记录执行转换并按输入顺序写出结果，返回统计摘要。
pub async fn execute_batch<W: Write>(
    records: Vec<Record>,
    transform: Arc<dyn Transform>,
    options: &BatchOptions,
    cancel: &CancellationToken,
    sink: &mut JsonlSink<W>,
    tracker: &ProgressTracker,
) -> AppResult<BatchSummary> {
    let records = Arc::new(records);
    let work = |idx: usize| {
        let records = Arc::clone(&records);
        let transform = Arc::clone(&transform);
        async move { transform.transform(&records[idx]).await }
    };

    let interrupted = run_ordered(
        records.len(),
        options.workers,
        options.sleep,
        cancel,
        work,
        |_, outcome| {
            tracker.record_completion(outcome, transform.classify(&outcome.error));
        },
        |idx, outcome| {
            let bucket = transform.classify(&outcome.error);
            tracker.record_written(&outcome, bucket);
            sink.write(records[idx].clone(), &outcome)
        },
    )
    .await?;

    tracker.finish();
    Ok(tracker.summary(interrupted))
}
