// src/input.rs

use crate::{
    cli::InputFormat,
    constants,
    error::*,
    models::{FieldNames, Record},
};
use log::{debug, info, warn};
use serde_json::Value;
use std::{
    io::{self, Read},
    path::Path,
};

/// 读取后的输入批次。`key_field` 是实际使用的 key 列名 (CSV 表头可能大小写不同)。
#[derive(Debug, Clone)]
pub struct LoadedInput {
    pub records: Vec<Record>,
    pub key_field: String,
}

/// 根据扩展名推断输入格式。标准输入默认按行读取。
pub fn detect_format(path: &Path) -> InputFormat {
    if path.as_os_str() == constants::STDIO_PATH {
        return InputFormat::Lines;
    }
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("csv") => InputFormat::Csv,
        Some("jsonl") | Some("ndjson") => InputFormat::Jsonl,
        _ => InputFormat::Lines,
    }
}

pub fn read_source(path: &Path) -> AppResult<String> {
    let mut content = String::new();
    if path.as_os_str() == constants::STDIO_PATH {
        io::stdin().read_to_string(&mut content)?;
    } else {
        content = std::fs::read_to_string(path).map_err(|e| {
            log::error!("读取输入文件 '{}' 失败: {}", path.display(), e);
            AppError::from(e)
        })?;
    }
    Ok(content)
}

/// 读取输入源并解析为有序记录。
pub fn load_records(path: &Path, format: InputFormat, fields: &FieldNames) -> AppResult<LoadedInput> {
    let format = match format {
        InputFormat::Auto => detect_format(path),
        other => other,
    };
    debug!("输入 '{}' 按 {:?} 格式解析", path.display(), format);
    let content = read_source(path)?;
    let loaded = parse_records(&content, format, fields)?;
    info!("从 '{}' 读取到 {} 条记录", path.display(), loaded.records.len());
    Ok(loaded)
}

pub fn parse_records(content: &str, format: InputFormat, fields: &FieldNames) -> AppResult<LoadedInput> {
    let content = content.trim_start_matches('\u{feff}');
    match format {
        InputFormat::Csv => parse_csv(content, &fields.key),
        InputFormat::Jsonl => Ok(LoadedInput {
            records: parse_jsonl(content, &fields.key),
            key_field: fields.key.clone(),
        }),
        InputFormat::Lines | InputFormat::Auto => Ok(LoadedInput {
            records: parse_lines(content, &fields.key),
            key_field: fields.key.clone(),
        }),
    }
}

fn parse_csv(content: &str, key_field: &str) -> AppResult<LoadedInput> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());

    let header: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    // 空表头的列直接丢弃
    let kept: Vec<(usize, String)> = header
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.is_empty())
        .map(|(idx, name)| (idx, name.clone()))
        .collect();
    let available: Vec<String> = kept.iter().map(|(_, name)| name.clone()).collect();

    let resolved_key = if available.iter().any(|name| name == key_field) {
        key_field.to_string()
    } else if let Some(name) = available.iter().find(|name| name.eq_ignore_ascii_case(key_field)) {
        debug!("URL 列 '{}' 按大小写不敏感匹配到 '{}'", key_field, name);
        name.clone()
    } else {
        return Err(AppError::MissingColumn {
            column: key_field.to_string(),
            available,
        });
    };

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let record: Record = kept
            .iter()
            .map(|(idx, name)| {
                let cell = row.get(*idx).map(str::trim).unwrap_or_default();
                (name.clone(), Value::String(cell.to_string()))
            })
            .collect();
        records.push(record);
    }
    Ok(LoadedInput { records, key_field: resolved_key })
}

fn parse_jsonl(content: &str, key_field: &str) -> Vec<Record> {
    content
        .lines()
        .enumerate()
        .map(|(no, line)| (no, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(no, line)| match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(record)) => record,
            _ => {
                // 非对象行按普通分享文本处理，不丢弃
                warn!("第 {} 行不是 JSON 对象，按分享文本处理", no + 1);
                text_record(key_field, line)
            }
        })
        .collect()
}

fn parse_lines(content: &str, key_field: &str) -> Vec<Record> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| text_record(key_field, line))
        .collect()
}

fn text_record(key_field: &str, text: &str) -> Record {
    let mut record = Record::new();
    record.insert(key_field.to_string(), Value::String(text.to_string()));
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(&PathBuf::from("a.csv")), InputFormat::Csv);
        assert_eq!(detect_format(&PathBuf::from("a.CSV")), InputFormat::Csv);
        assert_eq!(detect_format(&PathBuf::from("a.jsonl")), InputFormat::Jsonl);
        assert_eq!(detect_format(&PathBuf::from("a.ndjson")), InputFormat::Jsonl);
        assert_eq!(detect_format(&PathBuf::from("links.txt")), InputFormat::Lines);
        assert_eq!(detect_format(&PathBuf::from("-")), InputFormat::Lines);
    }

    #[test]
    fn test_parse_csv_keeps_column_order_and_skips_blank_rows() {
        let content = "\u{feff}Name, url ,\nfoo,https://a/1,x\n,,\nbar,https://a/2\n";
        let loaded = parse_records(content, InputFormat::Csv, &FieldNames::default()).unwrap();

        // URL 列按大小写不敏感匹配
        assert_eq!(loaded.key_field, "url");
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(
            serde_json::to_string(&loaded.records[0]).unwrap(),
            r#"{"Name":"foo","url":"https://a/1"}"#
        );
        // 短行缺失的列补空字符串
        assert_eq!(Value::Object(loaded.records[1].clone()), json!({"Name": "bar", "url": "https://a/2"}));
    }

    #[test]
    fn test_parse_csv_missing_column() {
        let err = parse_records("Name,Other\nfoo,bar\n", InputFormat::Csv, &FieldNames::default()).unwrap_err();
        match err {
            AppError::MissingColumn { column, available } => {
                assert_eq!(column, "URL");
                assert_eq!(available, vec!["Name".to_string(), "Other".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_jsonl_and_lines() {
        let fields = FieldNames::default();
        let content = "{\"URL\":\"https://a/1\",\"id\":7}\n\nnot json https://a/2\n[1,2]\n";
        let loaded = parse_records(content, InputFormat::Jsonl, &fields).unwrap();
        assert_eq!(loaded.records.len(), 3);
        assert_eq!(Value::Object(loaded.records[0].clone()), json!({"URL": "https://a/1", "id": 7}));
        assert_eq!(Value::Object(loaded.records[1].clone()), json!({"URL": "not json https://a/2"}));
        assert_eq!(Value::Object(loaded.records[2].clone()), json!({"URL": "[1,2]"}));

        let loaded = parse_records("  a  \n\nb\n", InputFormat::Lines, &fields).unwrap();
        let keys: Vec<_> = loaded.records.iter().filter_map(|r| fields.key_of(r)).collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }
}
