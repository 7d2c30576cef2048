// src/resolver/kuaishou.rs

use super::Transform;
use crate::{
    client::RobustClient,
    config::AppConfig,
    constants::{
        INTERRUPTED_MSG, URL_TRUNCATE_LENGTH,
        api::{self, CDN_DOMAIN_HINTS, URL_FIELD_HINTS},
        errors,
    },
    error::AppResult,
    models::{Outcome, Record},
    utils,
};
use async_trait::async_trait;
use log::{debug, warn};
use rand::Rng;
use regex::Regex;
use serde_json::{Value, json};
use std::{sync::LazyLock, time::Duration};
use url::Url;

static PHOTO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:photo|short-video)/([^/?#]+)").unwrap());

/// 通过 GraphQL 接口把快手分享链接解析为 CDN 视频地址。
pub struct KuaishouResolver {
    client: RobustClient,
    endpoints: Vec<String>,
    jitter: (f64, f64),
    key_field: String,
}

impl KuaishouResolver {
    pub fn new(client: RobustClient, config: &AppConfig) -> Self {
        Self {
            client,
            endpoints: config.endpoints.clone(),
            jitter: config.jitter,
            key_field: config.fields.key.clone(),
        }
    }

    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        Ok(Self::new(RobustClient::new(config)?, config))
    }

    async fn apply_jitter(&self) {
        let (min, max) = self.jitter;
        if max <= 0.0 {
            return;
        }
        let secs = rand::thread_rng().gen_range(min..=max);
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }

    /// 依次请求各个 GraphQL 接口，返回第一个能提取出链接的结果。
    async fn query_endpoints(&self, photo_id: &str) -> Option<String> {
        let payload = json!({
            "operationName": api::VISION_VIDEO_DETAIL_OPERATION,
            "query": api::VISION_VIDEO_DETAIL_QUERY,
            "variables": { "photoId": photo_id },
        });
        for endpoint in &self.endpoints {
            match self.client.post_json(endpoint.as_str(), &payload).await {
                Ok(body) => {
                    if let Some(url) = extract_from_graphql_payload(&body) {
                        debug!("接口 {} 返回 photoId={} 的链接", endpoint, photo_id);
                        return Some(url);
                    }
                    debug!("接口 {} 的响应中没有可用链接", endpoint);
                }
                Err(e) => warn!("接口 {} 请求失败: {}", endpoint, e),
            }
        }
        None
    }
}

#[async_trait]
impl Transform for KuaishouResolver {
    async fn transform(&self, record: &Record) -> Outcome {
        let text = record
            .get(&self.key_field)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if text.is_empty() {
            return Outcome::failure(errors::EMPTY_URL);
        }
        let Some(raw_url) = utils::extract_first_url(text) else {
            debug!("未找到链接: {}", utils::truncate_text(text, URL_TRUNCATE_LENGTH));
            return Outcome::failure(errors::NO_HTTP_URL);
        };

        self.apply_jitter().await;

        let resolved = match self.client.resolve_redirect(raw_url.as_str()).await {
            Ok(resolved) => resolved,
            Err(e) => {
                debug!("跟随重定向失败，使用原始链接 {}: {}", raw_url, e);
                raw_url.clone()
            }
        };
        let Some(photo_id) = extract_photo_id(&resolved).or_else(|| extract_photo_id(&raw_url)) else {
            return Outcome::failure(errors::PHOTO_ID_NOT_FOUND);
        };

        match self.query_endpoints(&photo_id).await {
            Some(url) => normalize_cdn_url(url),
            None => Outcome::failure(errors::CDN_NOT_FOUND),
        }
    }

    fn classify(&self, error: &str) -> &'static str {
        classify_failure(error)
    }
}

/// 从链接中提取作品 ID: 先看路径 (/photo/、/short-video/、/video/)，再看查询参数。
pub fn extract_photo_id(url: &str) -> Option<String> {
    if let Some(caps) = PHOTO_ID_RE.captures(url) {
        return Some(caps[1].to_string());
    }
    let parsed = Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    if let [.., kind, id] = segments.as_slice()
        && id.len() >= 6
        && matches!(*kind, "short-video" | "photo" | "video")
    {
        return Some(id.to_string());
    }
    api::PHOTO_ID_QUERY_KEYS.iter().find_map(|key| {
        parsed
            .query_pairs()
            .find(|(k, v)| k == *key && !v.is_empty())
            .map(|(_, v)| v.into_owned())
    })
}

/// 从 GraphQL 响应中挑出最可能的 CDN 链接。
pub fn extract_from_graphql_payload(payload: &Value) -> Option<String> {
    let data = payload.get("data")?;
    let photo = ["visionVideoDetail", "VisionVideoDetail"]
        .iter()
        .find_map(|k| data.get(*k))
        .and_then(|detail| ["photo", "Photo"].iter().find_map(|k| detail.get(*k)));

    let mut urls = Vec::new();
    if let Some(photo) = photo {
        for field in URL_FIELD_HINTS {
            match photo.get(*field) {
                Some(Value::String(s)) => urls.push(s.clone()),
                Some(Value::Array(items)) => {
                    urls.extend(items.iter().filter_map(Value::as_str).map(str::to_string))
                }
                _ => {}
            }
        }
    }
    if urls.is_empty() {
        collect_urls(payload, &mut urls);
    }
    pick_best_url(&urls)
}

fn collect_urls(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if s.starts_with("http") => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|v| collect_urls(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_urls(v, out)),
        _ => {}
    }
}

fn rank_url(url: &str) -> (u32, usize) {
    let mut score = 0;
    if CDN_DOMAIN_HINTS.iter().any(|h| url.contains(h)) {
        score += 10;
    }
    if url.ends_with(".mp4") {
        score += 5;
    }
    (score, url.len())
}

/// 按 (域名命中 +10, .mp4 +5, 长度) 排序取最高者；同分时保留先出现的。
pub fn pick_best_url(urls: &[String]) -> Option<String> {
    let mut best: Option<(&String, (u32, usize))> = None;
    for url in urls.iter().filter(|u| u.starts_with("http")) {
        let rank = rank_url(url);
        if best.is_none_or(|(_, best_rank)| rank > best_rank) {
            best = Some((url, rank));
        }
    }
    best.map(|(url, _)| url.clone())
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url.trim()).ok()?.host_str().map(str::to_lowercase)
}

/// 直播页和验证码页不是 CDN 地址，转为失败。
pub fn normalize_cdn_url(url: String) -> Outcome {
    match host_of(&url).as_deref() {
        Some(api::LIVE_HOST) => Outcome::failure(errors::LIVE_URL),
        Some(api::CAPTCHA_HOST) => Outcome::failure(format!("{}: {}", errors::CAPTCHA_URL_PREFIX, url)),
        _ => Outcome::success(url),
    }
}

pub fn classify_failure(error: &str) -> &'static str {
    if error.is_empty() {
        return "unknown";
    }
    if error == INTERRUPTED_MSG {
        return "interrupted";
    }
    let lower = error.to_lowercase();
    if lower.contains(&errors::CAPTCHA_URL_PREFIX.to_lowercase()) {
        "captcha_url"
    } else if lower.contains(&errors::LIVE_URL.to_lowercase()) {
        "live_url"
    } else if lower.contains(&errors::PHOTO_ID_NOT_FOUND.to_lowercase()) {
        "photo_id_missing"
    } else if lower.contains(errors::CDN_NOT_FOUND) {
        "cdn_not_found"
    } else if lower.contains(errors::EMPTY_URL) {
        "empty_url"
    } else if lower.contains(errors::NO_HTTP_URL) {
        "no_url"
    } else {
        "other"
    }
}
