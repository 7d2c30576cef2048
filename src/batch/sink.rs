// src/batch/sink.rs

use crate::{
    constants::STDIO_PATH,
    error::AppResult,
    models::{FieldNames, Outcome, Record},
};
use anyhow::Context;
use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::Path,
};

/// JSON Lines 输出。每写一行立即 flush，中断时已写出的行都是完整的。
pub struct JsonlSink<W: Write> {
    writer: W,
    fields: FieldNames,
}

impl<W: Write> JsonlSink<W> {
    pub fn new(writer: W, fields: FieldNames) -> Self {
        Self { writer, fields }
    }

    /// 把处理结果合并进记录并写出一行。
    pub fn write(&mut self, mut record: Record, outcome: &Outcome) -> AppResult<()> {
        self.fields.apply(&mut record, outcome);
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// 打开输出目标: `-` 为 stdout；续跑时追加到文件末尾，否则截断重写。
pub fn open_output(
    path: &Path,
    append: bool,
    fields: FieldNames,
) -> AppResult<JsonlSink<Box<dyn Write + Send>>> {
    let writer: Box<dyn Write + Send> = if path.as_os_str() == STDIO_PATH {
        Box::new(io::stdout())
    } else {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .with_context(|| format!("无法打开输出文件 '{}'", path.display()))?;
        Box::new(file)
    };
    Ok(JsonlSink::new(writer, fields))
}
