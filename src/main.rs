// src/main.rs

use clap::{CommandFactory, FromArgMatches};
use ks_cdn::{
    cli::{Cli, LogLevel},
    constants,
    error::AppError,
    run_from_cli,
    ui::{self, symbols},
};
use log::warn;
use std::{env, path::Path, sync::Arc};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    // 为 Windows 终端启用 ANSI 颜色支持
    #[cfg(windows)]
    {
        colored::control::set_virtual_terminal(true).ok();
    }

    let bin_name = env::var("CARGO_BIN_NAME").unwrap_or_else(|_| clap::crate_name!().to_string());
    let after_help = format!(
        "示例:\n  # 解析 CSV 中的分享链接，结果写到标准输出\n  {bin} links.csv\n\n  # 4 个并发，写入文件并支持断点续跑\n  {bin} links.csv -o out.jsonl --resume -w 4\n\n  # 从标准输入按行读取\n  cat share.txt | {bin} - -o out.jsonl",
        bin = bin_name
    );
    let cmd = Cli::command().after_help(after_help);
    let args = match Cli::from_arg_matches(&cmd.get_matches()) {
        Ok(args) => Arc::new(args),
        Err(e) => e.exit(),
    };

    init_logger(args.log_level, args.log_file.as_deref());

    let cancel = CancellationToken::new();
    spawn_interrupt_listener(cancel.clone());

    if let Err(e) = run_from_cli(args, cancel).await {
        log::error!("程序执行出错: {}", e);
        match &e {
            AppError::UserInterrupt => ui::warn("已中断，已完成的结果均已写出。"),
            other => ui::error(&format!("程序执行出错: {}", other)),
        }
        std::process::exit(e.exit_code());
    }
}

/// 第一次 Ctrl+C 触发取消，之后的按键只记录日志，等待在途记录收尾。
fn spawn_interrupt_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut presses = 0usize;
        while tokio::signal::ctrl_c().await.is_ok() {
            presses += 1;
            if presses == 1 {
                ui::warn(&format!("收到 {}，停止派发新记录，正在写出剩余结果...", *symbols::CTRL_C));
                cancel.cancel();
            } else {
                warn!("忽略第 {} 次中断信号，正在收尾", presses);
            }
        }
    });
}

fn init_logger(level: LogLevel, custom_path: Option<&Path>) {
    let filter = match level {
        LogLevel::Off => return,
        LogLevel::Error => log::LevelFilter::Error,
        LogLevel::Warn => log::LevelFilter::Warn,
        LogLevel::Info => log::LevelFilter::Info,
        LogLevel::Debug => log::LevelFilter::Debug,
        LogLevel::Trace => log::LevelFilter::Trace,
    };
    let app_name = clap::crate_name!();

    let log_file_path = match (custom_path, dirs::home_dir()) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(home)) => home.join(constants::CONFIG_DIR_NAME).join(constants::LOG_FILE_NAME),
        (None, None) => {
            ui::warn("无法获取用户主目录，日志将写入临时目录。");
            env::temp_dir().join(app_name).join(constants::LOG_FILE_NAME)
        }
    };

    if let Some(dir) = log_file_path.parent()
        && !dir.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        ui::warn(&format!("无法创建日志目录 {:?}: {}", dir, e));
    }

    let file_appender = match fern::log_file(&log_file_path) {
        Ok(file) => file,
        Err(e) => {
            ui::warn(&format!("无法打开日志文件 {:?}: {}，改用备用日志文件。", log_file_path, e));
            let fallback_path =
                env::temp_dir().join(format!("{}-{}", app_name, constants::LOG_FALLBACK_FILE_NAME));
            match fern::log_file(&fallback_path) {
                Ok(file) => file,
                Err(e) => {
                    ui::error(&format!("无法创建备用日志文件 {:?}: {}，日志将不会被记录。", fallback_path, e));
                    return;
                }
            }
        }
    };

    let result = fern::Dispatch::new()
        .level(filter)
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] [{:<5}] [{}:{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.line().unwrap_or(0),
                message
            ))
        })
        .chain(file_appender)
        .apply();
    if let Err(e) = result {
        ui::warn(&format!("日志系统初始化失败: {}", e));
    }
}
