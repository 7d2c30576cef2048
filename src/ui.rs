// src/ui.rs
//
// 所有面向用户的诊断信息都写到 stderr，stdout 可能是 JSONL 输出本身。

use crate::constants;
use colored::*;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::{sync::LazyLock, time::Duration};

pub mod symbols {
    use super::*;

    pub static OK: LazyLock<ColoredString> = LazyLock::new(|| "[OK]".green());
    pub static ERROR: LazyLock<ColoredString> = LazyLock::new(|| "[X]".red());
    pub static INFO: LazyLock<ColoredString> = LazyLock::new(|| "[i]".cyan());
    pub static WARN: LazyLock<ColoredString> = LazyLock::new(|| "[!]".yellow());
    pub static STAT: LazyLock<ColoredString> = LazyLock::new(|| "[#]".blue());
    pub static CTRL_C: LazyLock<ColoredString> = LazyLock::new(|| "Ctrl+C".yellow());
}

pub fn print_header(title: &str) {
    eprintln!("\n{}", "═".repeat(constants::UI_WIDTH));
    eprintln!(" {}", title.cyan().bold());
    eprintln!("{}", "═".repeat(constants::UI_WIDTH));
}

pub fn print_sub_header(title: &str) {
    eprintln!("\n--- {} ---", title.bold());
}

pub fn plain(msg: &str) {
    eprintln!("{}", msg);
}

pub fn info(msg: &str) {
    eprintln!("{} {}", *symbols::INFO, msg);
}

pub fn warn(msg: &str) {
    eprintln!("{} {}", *symbols::WARN, msg.yellow());
}

pub fn error(msg: &str) {
    eprintln!("{} {}", *symbols::ERROR, msg.red());
}

/// 按记录数显示进度的进度条。stderr 不是终端时 indicatif 会自动隐藏它。
pub fn new_tasks_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pbar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
    let style = ProgressStyle::with_template(
        "{prefix:.bold} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    pbar.set_style(style);
    pbar.set_prefix(prefix.to_string());
    pbar.enable_steady_tick(Duration::from_millis(200));
    pbar
}

/// 在进度条上方打印一行。进度条隐藏时 `println` 会被丢弃，所以这里用 `suspend`。
pub fn progress_line(pbar: &ProgressBar, msg: &str) {
    pbar.suspend(|| eprintln!("{}", msg));
}
