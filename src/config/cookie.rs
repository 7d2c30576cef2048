// src/config/cookie.rs

use crate::{constants, error::AppResult};
use anyhow::Context;
use log::debug;
use serde_json::Value;
use std::{fs, path::Path};

/// 解析 Cookie 文件内容。
///
/// 支持三种格式: 原始请求头文本、`[{"name":..,"value":..}]` 数组、
/// 以及带 `cookies` 数组的浏览器导出对象。数组中没有可用项时返回 None。
pub fn parse_cookie_text(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let data = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(mut obj)) if obj.contains_key("cookies") => obj.remove("cookies"),
        Ok(value @ Value::Array(_)) => Some(value),
        _ => None,
    };
    let Some(Value::Array(items)) = data else {
        return Some(text.to_string());
    };
    let pairs: Vec<String> = items
        .iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?;
            let value = item.get("value")?.as_str()?;
            (!name.is_empty()).then(|| format!("{}={}", name, value))
        })
        .collect();
    (!pairs.is_empty()).then(|| pairs.join("; "))
}

pub fn load_cookie_file(path: &Path) -> AppResult<Option<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("读取 Cookie 文件 '{}' 失败", path.display()))?;
    Ok(parse_cookie_text(&text))
}

/// 按优先级确定 Cookie: 命令行 > Cookie 文件 > 环境变量 > 配置文件。
/// 返回 (Cookie, 来源描述)。
pub fn resolve_cookie(
    cli_cookie: Option<&str>,
    cookie_file: Option<&Path>,
    config_cookie: Option<&str>,
) -> AppResult<(Option<String>, String)> {
    if let Some(cookie) = cli_cookie && !cookie.trim().is_empty() {
        debug!("使用来自命令行参数的 Cookie");
        return Ok((Some(cookie.trim().to_string()), "命令行参数".to_string()));
    }
    if let Some(path) = cookie_file {
        debug!("使用来自文件 {} 的 Cookie", path.display());
        return Ok((load_cookie_file(path)?, format!("文件 {}", path.display())));
    }
    if let Ok(cookie) = std::env::var(constants::COOKIE_ENV_VAR) && !cookie.trim().is_empty() {
        debug!("使用来自环境变量 {} 的 Cookie", constants::COOKIE_ENV_VAR);
        return Ok((
            Some(cookie.trim().to_string()),
            format!("环境变量 ({})", constants::COOKIE_ENV_VAR),
        ));
    }
    if let Some(cookie) = config_cookie && !cookie.trim().is_empty() {
        debug!("使用来自本地配置文件的 Cookie");
        return Ok((Some(cookie.trim().to_string()), "本地配置文件".to_string()));
    }
    Ok((None, "未找到".to_string()))
}
