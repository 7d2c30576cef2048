// src/models/mod.rs

use crate::constants::{self, INTERRUPTED_MSG};
use serde_json::{Map, Value};

/// 一条输入记录: 保持字段顺序的 JSON 对象 (例如 CSV 的一行)。
pub type Record = Map<String, Value>;

/// 读取旧输出文件时，key 字段缺失后依次尝试的字段名
const KEY_FALLBACK_FIELDS: &[&str] = &["URL", "url"];
const RESULT_FALLBACK_FIELDS: &[&str] = &["CDNURL", "cdn_url", "cdnUrl"];

/// 输入与输出共用的字段名配置，保证输出文件可以直接作为续跑的输入。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNames {
    /// 自然键字段 (通常是分享链接)
    pub key: String,
    /// 结果字段 (CDN 链接)
    pub result: String,
    /// 错误字段，None 表示不输出错误列
    pub error: Option<String>,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            key: constants::DEFAULT_URL_FIELD.to_string(),
            result: constants::DEFAULT_CDN_FIELD.to_string(),
            error: Some(constants::DEFAULT_ERROR_FIELD.to_string()),
        }
    }
}

impl FieldNames {
    pub fn new(key: &str, result: &str, error: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            result: result.to_string(),
            error: error.filter(|e| !e.is_empty()).map(str::to_string),
        }
    }

    /// 记录的自然键: 去掉首尾空白后的非空字符串。
    pub fn key_of(&self, record: &Record) -> Option<String> {
        std::iter::once(self.key.as_str())
            .chain(KEY_FALLBACK_FIELDS.iter().copied())
            .find_map(|field| non_empty_str(record.get(field)))
    }

    /// 记录是否为成功结果: 结果非空，且错误字段为空或不存在。
    pub fn is_success(&self, record: &Record) -> bool {
        let has_result = std::iter::once(self.result.as_str())
            .chain(RESULT_FALLBACK_FIELDS.iter().copied())
            .any(|field| non_empty_str(record.get(field)).is_some());
        let error_field = self.error.as_deref().unwrap_or(constants::DEFAULT_ERROR_FIELD);
        has_result && !is_error_value(record.get(error_field))
    }

    /// 把处理结果写回记录。
    pub fn apply(&self, record: &mut Record, outcome: &Outcome) {
        record.insert(self.result.clone(), Value::String(outcome.result.clone()));
        if let Some(error_field) = &self.error {
            record.insert(error_field.clone(), Value::String(outcome.error.clone()));
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn is_error_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// 单条记录的处理结果。已定型的结果中 `result` 与 `error` 恰有一个非空。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Outcome {
    pub result: String,
    pub error: String,
}

impl Outcome {
    pub fn success(result: impl Into<String>) -> Self {
        Self { result: result.into(), error: String::new() }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { result: String::new(), error: error.into() }
    }

    pub fn interrupted() -> Self {
        Self::failure(INTERRUPTED_MSG)
    }

    pub fn is_success(&self) -> bool {
        !self.result.is_empty() && self.error.is_empty()
    }

    pub fn is_interrupted(&self) -> bool {
        self.result.is_empty() && self.error == INTERRUPTED_MSG
    }
}
