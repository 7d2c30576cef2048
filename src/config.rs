// src/config.rs

pub mod cookie;

use crate::{
    cli::Cli,
    constants,
    error::{AppError, AppResult},
    models::FieldNames,
    ui, utils,
};
use anyhow::{Context, anyhow};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkConfig {
    pub endpoints: Option<Vec<String>>,
    pub connect_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub user_agent: Option<String>,
}

/// `~/.ks-cdn/config.json` 中的可选配置。命令行参数优先于这里的值。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExternalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    #[serde(default)]
    pub network: NetworkConfig,
}

pub(crate) fn get_config_path() -> AppResult<PathBuf> {
    let path = dirs::home_dir()
        .ok_or_else(|| AppError::Other(anyhow!("无法获取用户主目录")))?
        .join(constants::CONFIG_DIR_NAME)
        .join(constants::CONFIG_FILE_NAME);
    Ok(path)
}

/// 读取外部配置文件。文件不存在时使用内置默认值，不会自动创建。
pub fn load_external_config() -> AppResult<ExternalConfig> {
    let Ok(config_path) = get_config_path() else {
        debug!("无法定位主目录，使用默认配置");
        return Ok(ExternalConfig::default());
    };
    if !config_path.is_file() {
        debug!("配置文件 {:?} 不存在，使用默认配置", config_path);
        return Ok(ExternalConfig::default());
    }
    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("读取配置文件 '{}' 失败", config_path.display()))?;
    let config = serde_json::from_str(&content)
        .with_context(|| format!("解析配置文件 '{}' 失败", config_path.display()))?;
    info!("已加载配置文件 {}", config_path.display());
    Ok(config)
}

/// 一次运行的最终配置，创建后只读，通过 `Arc` 在各任务间共享。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub workers: usize,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: u32,
    pub user_agent: String,
    pub endpoints: Vec<String>,
    pub proxy: Option<String>,
    pub cookie: Option<String>,
    pub jitter: (f64, f64),
    pub sleep: Duration,
    pub progress_every: usize,
    pub fields: FieldNames,
    pub fail_on_error: bool,
}

impl AppConfig {
    pub fn new(args: &Cli) -> AppResult<Self> {
        Self::from_sources(args, load_external_config()?)
    }

    pub fn from_sources(args: &Cli, external: ExternalConfig) -> AppResult<Self> {
        if args.workers == 0 {
            return Err(AppError::UsageError("--workers 必须大于等于 1".to_string()));
        }
        if !args.sleep.is_finite() || args.sleep < 0.0 {
            return Err(AppError::UsageError(format!("--sleep 取值无效: {}", args.sleep)));
        }
        if args.url_col.trim().is_empty() || args.cdn_col.trim().is_empty() {
            return Err(AppError::UsageError("--url-col 与 --cdn-col 不能为空".to_string()));
        }

        let jitter = utils::parse_jitter(&args.jitter).unwrap_or_else(|| {
            ui::warn(&format!("--jitter '{}' 格式无效，已改为 0,0", args.jitter));
            (0.0, 0.0)
        });

        let (cookie, source) = cookie::resolve_cookie(
            args.cookie.as_deref(),
            args.cookie_file.as_deref(),
            external.cookie.as_deref(),
        )?;
        if cookie.is_some() {
            info!("从 {} 加载 Cookie", source);
        }

        let endpoints = if !args.endpoints.is_empty() {
            args.endpoints.clone()
        } else {
            external
                .network
                .endpoints
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| constants::api::DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect())
        };

        Ok(Self {
            workers: args.workers,
            timeout: Duration::from_secs(args.timeout),
            connect_timeout: Duration::from_secs(
                external
                    .network
                    .connect_timeout_secs
                    .unwrap_or(constants::DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
            max_retries: external.network.max_retries.unwrap_or(constants::DEFAULT_MAX_RETRIES),
            user_agent: external
                .network
                .user_agent
                .unwrap_or_else(|| constants::USER_AGENT.to_string()),
            endpoints,
            proxy: args.proxy.clone().filter(|p| !p.is_empty()),
            cookie,
            jitter,
            sleep: Duration::from_secs_f64(args.sleep),
            progress_every: args.progress_every,
            fields: FieldNames::new(&args.url_col, &args.cdn_col, Some(&args.error_col)),
            fail_on_error: args.fail_on_error,
        })
    }
}

#[cfg(feature = "testing")]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            max_retries: 0,
            user_agent: "test-agent/1.0".to_string(),
            endpoints: constants::api::DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            proxy: None,
            cookie: None,
            jitter: (0.0, 0.0),
            sleep: Duration::ZERO,
            progress_every: 0,
            fields: FieldNames::default(),
            fail_on_error: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("ks-cdn").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_overrides_external_config() {
        let args = parse(&["in.csv", "--endpoint", "http://e1", "--endpoint", "http://e2", "--error-col", ""]);
        let external = ExternalConfig {
            cookie: Some("a=1".to_string()),
            network: NetworkConfig {
                endpoints: Some(vec!["http://file".to_string()]),
                connect_timeout_secs: Some(3),
                max_retries: Some(5),
                user_agent: None,
            },
        };
        let config = AppConfig::from_sources(&args, external).unwrap();
        assert_eq!(config.endpoints, vec!["http://e1".to_string(), "http://e2".to_string()]);
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.cookie.as_deref(), Some("a=1"));
        assert_eq!(config.fields.error, None);
        assert_eq!(config.user_agent, constants::USER_AGENT);
    }

    #[test]
    fn test_defaults_and_bad_jitter() {
        let args = parse(&["in.txt", "--jitter", "oops"]);
        let config = AppConfig::from_sources(&args, ExternalConfig::default()).unwrap();
        assert_eq!(config.jitter, (0.0, 0.0));
        assert_eq!(config.workers, 1);
        assert_eq!(config.endpoints.len(), constants::api::DEFAULT_ENDPOINTS.len());
        assert_eq!(config.fields, FieldNames::default());
    }

    #[test]
    fn test_zero_workers_is_usage_error() {
        let args = parse(&["in.txt", "--workers", "0"]);
        let err = AppConfig::from_sources(&args, ExternalConfig::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
