// src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("网络请求失败: {0}")]
    Network(#[from] reqwest::Error),
    #[error("网络中间件错误: {0}")]
    NetworkMiddleware(#[from] reqwest_middleware::Error),
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("临时文件持久化失败: {0}")]
    TempFilePersist(#[from] tempfile::PersistError),
    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV 解析错误: {0}")]
    Csv(#[from] csv::Error),
    #[error("输入中缺少 URL 列 '{column}'。可用列: {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },
    #[error("{0}")] // 只打印内部信息，不加任何前缀
    UsageError(String),
    #[error("用户中断")]
    UserInterrupt,
    #[error("{0} 条记录处理失败")]
    BatchFailed(usize),
    #[error("未知错误: {0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// 进程退出码: 用法错误为 2，用户中断为 130，其余为 1。
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::UsageError(_) | AppError::MissingColumn { .. } => 2,
            AppError::UserInterrupt => 130,
            _ => 1,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
