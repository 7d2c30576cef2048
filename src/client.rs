// src/client.rs

use crate::{config::AppConfig, constants, error::*};
use log::debug;
use reqwest::{
    IntoUrl, Proxy,
    header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue, REFERER},
};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde_json::Value;

/// 所有 worker 共享的 HTTP 客户端。reqwest 客户端本身可安全并发使用。
#[derive(Clone)]
pub struct RobustClient {
    pub client: ClientWithMiddleware,
}

impl RobustClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static(constants::REFERER));
        if let Some(cookie) = &config.cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| AppError::UsageError(format!("Cookie 含有非法字符: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.workers * 2);
        if let Some(proxy) = &config.proxy {
            debug!("使用代理: {}", proxy);
            builder = builder.proxy(Proxy::all(proxy.as_str())?);
        }

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(builder.build()?)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client })
    }

    /// 跟随重定向，返回最终落地的 URL。
    pub async fn resolve_redirect<T: IntoUrl>(&self, url: T) -> AppResult<String> {
        let res = self.client.get(url).send().await?;
        Ok(res.url().to_string())
    }

    /// POST 一个 JSON 请求体并解析 JSON 响应。非 2xx 状态视为错误。
    pub async fn post_json<T: IntoUrl>(&self, url: T, body: &Value) -> AppResult<Value> {
        let res = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;
        Ok(res.error_for_status()?.json().await?)
    }
}
