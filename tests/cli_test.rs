// tests/cli_test.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::{fs, path::Path};
use tempfile::tempdir;

// 辅助函数: 隔离主目录与 Cookie 环境变量，避免读到本机配置
fn main_command(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("HOME", home).env_remove("KS_COOKIE");
    cmd
}

// --- 测试基本 CLI 行为 ---

#[test]
fn test_help_flag() {
    let dir = tempdir().unwrap();
    main_command(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("显示此帮助信息并退出"))
        .stdout(predicate::str::contains("--resume"));
}

#[test]
fn test_missing_input_shows_help() {
    let dir = tempdir().unwrap();
    main_command(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_nonexistent_input_file_fails() {
    let dir = tempdir().unwrap();
    main_command(dir.path())
        .arg(dir.path().join("nope.csv"))
        .assert()
        .code(1);
}

// --- 测试用法错误 (退出码 2) ---

#[test]
fn test_missing_url_column_is_usage_error() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("links.csv");
    fs::write(&input, "title,link\nfoo,https://v.kuaishou.com/abc\n").unwrap();

    main_command(dir.path())
        .arg(&input)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("缺少 URL 列 'URL'"))
        .stderr(predicate::str::contains("link"));
}

#[test]
fn test_resume_requires_output_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("links.txt");
    fs::write(&input, "https://v.kuaishou.com/abc\n").unwrap();

    main_command(dir.path())
        .arg(&input)
        .arg("--resume")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--resume"));
}

#[test]
fn test_zero_workers_is_usage_error() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("links.txt");
    fs::write(&input, "x\n").unwrap();

    main_command(dir.path()).arg(&input).args(["-w", "0"]).assert().code(2);
}

// --- 不需要网络的端到端流程 ---

#[test]
fn test_text_without_links_writes_failures_to_stdout() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("share.txt");
    fs::write(&input, "hello world\n\n  no link here  \n").unwrap();

    let output = main_command(dir.path()).arg(&input).output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<serde_json::Value> = stdout.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        serde_json::json!({"URL": "hello world", "CDNURL": "", "error_msg": "no http/https url found"})
    );
    assert_eq!(lines[1]["URL"], "no link here");
}

#[test]
fn test_fail_on_error_and_output_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("rows.jsonl");
    let out = dir.path().join("out.jsonl");
    fs::write(&input, "{\"URL\":\"\",\"id\":1}\n{\"URL\":\"plain text\",\"id\":2}\n").unwrap();

    main_command(dir.path())
        .arg(&input)
        .arg("-o")
        .arg(&out)
        .args(["--workers", "2", "--fail-on-error"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());

    let content = fs::read_to_string(&out).unwrap();
    assert_eq!(
        content,
        "{\"URL\":\"\",\"id\":1,\"CDNURL\":\"\",\"error_msg\":\"empty url\"}\n\
         {\"URL\":\"plain text\",\"id\":2,\"CDNURL\":\"\",\"error_msg\":\"no http/https url found\"}\n"
    );
}

#[test]
fn test_resume_with_everything_done_is_noop() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("links.txt");
    let out = dir.path().join("out.jsonl");
    fs::write(&input, "https://v.kuaishou.com/abc\n").unwrap();
    let done = "{\"URL\":\"https://v.kuaishou.com/abc\",\"CDNURL\":\"https://v2.kwaicdn.com/a.mp4\",\"error_msg\":\"\"}\n";
    fs::write(&out, done).unwrap();

    main_command(dir.path())
        .arg(&input)
        .arg("-o")
        .arg(&out)
        .arg("--resume")
        .assert()
        .success()
        .stderr(predicate::str::contains("所有记录均已完成"));
    assert_eq!(fs::read_to_string(&out).unwrap(), done);
}

#[test]
fn test_progress_lines_follow_interval_and_stay_off_stdout() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("share.txt");
    let texts: Vec<String> = (1..=5).map(|i| format!("plain text {}", i)).collect();
    fs::write(&input, texts.join("\n")).unwrap();

    for (every, expected) in [("2", 2), ("0", 0)] {
        let output = main_command(dir.path())
            .arg(&input)
            .args(["--progress-every", every])
            .output()
            .unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8(output.stdout).unwrap();
        let lines: Vec<serde_json::Value> = stdout.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 5, "--progress-every {}", every);
        assert!(lines.iter().all(|v| v["error_msg"] == "no http/https url found"));

        let stderr = String::from_utf8(output.stderr).unwrap();
        let progress: Vec<&str> = stderr.lines().filter(|l| l.contains("进度:")).collect();
        assert_eq!(progress.len(), expected, "--progress-every {}: {:?}", every, progress);
        if expected > 0 {
            assert!(progress[0].contains("2/5"));
            assert!(progress[1].contains("4/5"));
            assert!(progress.iter().all(|l| l.contains("失败分类:")));
        }
    }
}
