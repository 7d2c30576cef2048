// src/resume.rs

use crate::{
    error::*,
    models::{FieldNames, Record},
    ui,
};
use log::{debug, info, warn};
use serde_json::Value;
use std::{
    collections::HashSet,
    fs,
    io::{self, BufWriter, Write},
    path::Path,
};
use tempfile::NamedTempFile;

/// 续跑过滤器: 清理旧输出文件中的失败记录，并给出已成功的 key 集合。
#[derive(Debug, Clone)]
pub struct ResumeFilter {
    fields: FieldNames,
}

/// 旧输出文件中一行的分类结果
enum LineKind {
    Blank,
    Malformed,
    Failed,
    Success(Record),
}

impl ResumeFilter {
    pub fn new(fields: FieldNames) -> Self {
        Self { fields }
    }

    /// 按字节处理，非 UTF-8 的残缺行 (例如写到一半的多字节字符) 归为损坏行。
    fn classify(&self, line: &[u8]) -> LineKind {
        let Ok(text) = std::str::from_utf8(line) else {
            return LineKind::Malformed;
        };
        let raw = text.trim();
        if raw.is_empty() {
            return LineKind::Blank;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(record)) if self.fields.is_success(&record) => LineKind::Success(record),
            Ok(Value::Object(_)) => LineKind::Failed,
            _ => LineKind::Malformed,
        }
    }

    /// 原地重写输出文件，只保留成功记录。返回 (保留数, 删除数)。
    ///
    /// 先写入同目录下的临时文件，再整体替换原文件，中途崩溃不会损坏原文件。
    /// 文件不存在或无法读取时什么也不做。
    pub fn clean(&self, path: &Path) -> AppResult<(usize, usize)> {
        let Some(content) = read_prior_output(path) else {
            return Ok((0, 0));
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        let (mut kept, mut removed, mut malformed) = (0, 0, 0);
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            for line in content.split(|&b| b == b'\n') {
                match self.classify(line) {
                    LineKind::Blank => {}
                    LineKind::Malformed => {
                        malformed += 1;
                        removed += 1;
                    }
                    LineKind::Failed => removed += 1,
                    LineKind::Success(record) => {
                        serde_json::to_writer(&mut writer, &record)?;
                        writer.write_all(b"\n")?;
                        kept += 1;
                    }
                }
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path)?;

        if malformed > 0 {
            warn!("续跑文件 '{}' 中有 {} 行无法解析，已丢弃", path.display(), malformed);
        }
        info!("清理续跑文件 '{}': 保留 {}，删除 {}", path.display(), kept, removed);
        Ok((kept, removed))
    }

    /// 读取输出文件中所有成功记录的 key。文件不存在或无法读取时返回空集合。
    pub fn load_success_keys(&self, path: &Path) -> AppResult<HashSet<String>> {
        let Some(content) = read_prior_output(path) else {
            return Ok(HashSet::new());
        };
        let mut keys = HashSet::new();
        for line in content.split(|&b| b == b'\n') {
            if let LineKind::Success(record) = self.classify(line)
                && let Some(key) = self.fields.key_of(&record)
            {
                keys.insert(key);
            }
        }
        debug!("续跑文件 '{}' 中已有 {} 个成功 key", path.display(), keys.len());
        Ok(keys)
    }

    /// 去掉 key 已成功的输入记录，保持原有顺序。返回 (剩余记录, 跳过数)。
    pub fn filter(&self, records: Vec<Record>, done: &HashSet<String>) -> (Vec<Record>, usize) {
        if done.is_empty() {
            return (records, 0);
        }
        let total = records.len();
        let remaining: Vec<Record> = records
            .into_iter()
            .filter(|record| {
                self.fields
                    .key_of(record)
                    .is_none_or(|key| !done.contains(&key))
            })
            .collect();
        let skipped = total - remaining.len();
        (remaining, skipped)
    }
}

/// 读取旧输出文件的全部内容。不存在或无法读取都视为没有历史记录，
/// 真正的写入问题会在随后打开输出文件时暴露。
fn read_prior_output(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("续跑文件 '{}' 不存在，按无历史记录处理", path.display());
            None
        }
        Err(e) => {
            warn!("无法读取续跑文件 '{}': {}", path.display(), e);
            ui::warn(&format!("无法读取续跑文件 '{}'，按无历史记录处理: {}", path.display(), e));
            None
        }
    }
}
