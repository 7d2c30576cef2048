// src/resolver/mod.rs

pub mod kuaishou;

use crate::models::{Outcome, Record};
use async_trait::async_trait;

pub use kuaishou::KuaishouResolver;

/// 单条记录的转换操作，由批处理调度器并发调用。
///
/// 实现必须可以被多个 worker 同时调用: 除只读配置和自身线程安全的客户端外，
/// 不应在调用之间共享可变状态。失败通过 `Outcome::failure` 表达，不要 panic。
#[async_trait]
pub trait Transform: Send + Sync {
    async fn transform(&self, record: &Record) -> Outcome;

    /// 把错误信息归入一个失败类别，用于进度报告中的分类统计。
    fn classify(&self, _error: &str) -> &'static str {
        "other"
    }
}
