// src/utils.rs

use regex::Regex;
use std::{any::Any, sync::LazyLock};

static HTTP_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>]+"#).unwrap());

/// 分享文案里 URL 末尾常带的中英文标点
const URL_TRAILING_PUNCT: &[char] = &[
    ')', '(', '.', ',', ';', ']', '[', '}', '{', '"', '\'', '<', '>', ':', '!', '?', '，', '。', '；',
];

/// 从分享文案中提取第一个 http(s) 链接。
pub fn extract_first_url(text: &str) -> Option<String> {
    HTTP_URL_RE
        .find(text)
        .map(|m| m.as_str().trim_end_matches(URL_TRAILING_PUNCT).to_string())
        .filter(|url| !url.is_empty())
}

/// 解析 "min,max" 形式的随机延迟区间 (秒)。格式不合法时返回 None。
pub fn parse_jitter(range: &str) -> Option<(f64, f64)> {
    let (min, max) = range.split_once(',')?;
    let min = min.trim().parse::<f64>().ok()?;
    let max = max.trim().parse::<f64>().ok()?;
    if !min.is_finite() || !max.is_finite() || min < 0.0 || max < 0.0 {
        return None;
    }
    Some((min.min(max), min.max(max)))
}

pub fn truncate_text(text: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut end_pos = 0;
    for (i, c) in text.char_indices() {
        width += if c.is_ascii() { 1 } else { 2 };
        if width > max_width.saturating_sub(3) {
            end_pos = i;
            break;
        }
    }
    if end_pos == 0 { text.to_string() } else { format!("{}...", &text[..end_pos]) }
}

/// 把 panic 负载转换成可写入 error 字段的文本。
pub fn panic_message(payload: &(dyn Any + Send)) -> Option<String> {
    if let Some(s) = payload.downcast_ref::<&str>() {
        Some((*s).to_string())
    } else {
        payload.downcast_ref::<String>().cloned()
    }
}
