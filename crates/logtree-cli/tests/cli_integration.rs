//! CLI Integration Tests
//!
//! These tests verify the CLI commands work correctly end-to-end.
//! They test the "wiring" between the CLI and the core library.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

// ============================================================================
// Test Utilities
// ============================================================================

/// Create a CLI command for the logtree binary
fn cli_cmd() -> Command {
    Command::cargo_bin("logtree").expect("Failed to find logtree binary")
}

// ============================================================================
// Raw Input Tests
// ============================================================================

#[test]
fn test_cat_raw_lines() {
    cli_cmd()
        .args(["cat", "--dn", "app"])
        .write_stdin("hello\nworld\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("app R hello"))
        .stdout(predicate::str::contains("app R world"));
}

#[test]
fn test_cat_final_line_without_newline() {
    cli_cmd()
        .args(["cat", "--dn", "app"])
        .write_stdin("first\nlast")
        .assert()
        .success()
        .stdout(predicate::str::contains("app R last"));
}

#[test]
fn test_quota_keeps_newest() {
    cli_cmd()
        .args(["--quota", "2", "cat", "--dn", "app"])
        .write_stdin("line1\nline2\nline3\nline4\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("line1").not())
        .stdout(predicate::str::contains("line2").not())
        .stdout(predicate::str::contains("line3"))
        .stdout(predicate::str::contains("line4"));
}

#[test]
fn test_line_length_truncates() {
    cli_cmd()
        .args(["--line-length", "4", "cat", "--dn", "app"])
        .write_stdin("abcdefgh\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("R abcd..."));
}

#[test]
fn test_config_file() {
    let mut config = NamedTempFile::new().unwrap();
    writeln!(config, r#"{{"default_quota": 1}}"#).unwrap();

    cli_cmd()
        .arg("--config")
        .arg(config.path())
        .args(["cat", "--dn", "app"])
        .write_stdin("old\nnew\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("old").not())
        .stdout(predicate::str::contains("R new"));
}

#[test]
fn test_last_limits_backlog() {
    cli_cmd()
        .args(["cat", "--dn", "app", "--last", "1"])
        .write_stdin("one\ntwo\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("one").not())
        .stdout(predicate::str::contains("R two"));
}

// ============================================================================
// Query Tests
// ============================================================================

#[test]
fn test_read_other_dn_is_empty() {
    cli_cmd()
        .args(["cat", "--dn", "app", "--read", "other"])
        .write_stdin("hello\n")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_read_parent_includes_subtree() {
    cli_cmd()
        .args(["cat", "--dn", "svc.web", "--read", "svc"])
        .write_stdin("hello\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("R hello"));

    cli_cmd()
        .args(["cat", "--dn", "svc.web", "--read", "svc", "--exact"])
        .write_stdin("hello\n")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_incompatible_filters_rejected() {
    cli_cmd()
        .args(["cat", "--only-raw", "--only-leveled"])
        .write_stdin("hello\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Incompatible filters"));
}

#[test]
fn test_invalid_dn_rejected() {
    cli_cmd()
        .args(["cat", "--dn", "bad..dn"])
        .write_stdin("hello\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid DN"));
}

#[test]
fn test_zero_quota_rejected() {
    cli_cmd()
        .args(["--quota", "0", "cat"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Quota must be at least 1"));
}

// ============================================================================
// Klog Input Tests
// ============================================================================

const KLOG: &str = "I0101 00:00:01.000000    1 main.go:10] all good\n\
                    E0101 00:00:02.000000    1 main.go:20] something broke\n";

#[test]
fn test_cat_klog() {
    cli_cmd()
        .args(["cat", "--dn", "kube", "--format", "klog"])
        .write_stdin(KLOG)
        .assert()
        .success()
        .stdout(predicate::str::contains("kube I all good"))
        .stdout(predicate::str::contains("kube E something broke"));
}

#[test]
fn test_klog_min_severity() {
    cli_cmd()
        .args(["cat", "--dn", "kube", "--format", "klog", "--min-severity", "E"])
        .write_stdin(KLOG)
        .assert()
        .success()
        .stdout(predicate::str::contains("all good").not())
        .stdout(predicate::str::contains("something broke"));
}

#[test]
fn test_klog_full_output_keeps_location() {
    cli_cmd()
        .args(["cat", "--dn", "kube", "--format", "klog", "--output", "full"])
        .write_stdin(KLOG)
        .assert()
        .success()
        .stdout(predicate::str::contains("main.go:20] something broke"));
}

#[test]
fn test_klog_invalid_lines() {
    cli_cmd()
        .args(["cat", "--dn", "kube", "--format", "klog"])
        .write_stdin("garbage\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("E Invalid klog line: garbage"));

    cli_cmd()
        .args(["cat", "--dn", "kube", "--format", "klog", "--invalid", "raw"])
        .write_stdin("garbage\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("kube R garbage"));

    cli_cmd()
        .args(["cat", "--dn", "kube", "--format", "klog", "--invalid", "drop"])
        .write_stdin("garbage\n")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

// ============================================================================
// Kmsg Input Tests
// ============================================================================

#[cfg(target_os = "linux")]
#[test]
fn test_cat_kmsg_records() {
    cli_cmd()
        .args(["cat", "--dn", "kernel", "--format", "kmsg"])
        .write_stdin("4,1,1000,-;disk is slow\n6,2,2000,-;link up\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("kernel W disk is slow"))
        .stdout(predicate::str::contains("kernel I link up"));
}

// ============================================================================
// Output Tests
// ============================================================================

#[test]
fn test_json_output() {
    cli_cmd()
        .args(["cat", "--dn", "app", "--output", "json"])
        .write_stdin("hello\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""dn":"app""#))
        .stdout(predicate::str::contains(r#""data":"hello""#));
}

#[test]
fn test_follow_prints_everything() {
    cli_cmd()
        .args(["follow", "--dn", "app"])
        .write_stdin("one\ntwo\nthree\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("R one"))
        .stdout(predicate::str::contains("R two"))
        .stdout(predicate::str::contains("R three"));
}
