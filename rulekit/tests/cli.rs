//! CLI tests for `rulekit`.
//!
//! Spawns the rulekit binary inside a temp directory (so no `rulekit.toml` is
//! picked up) and checks exit codes and output.

use std::fs;
use std::process::{Command, Output};

use rulekit::exit_codes;
use rulekit::test_support::write_file;
use serde_json::Value;

fn rulekit(dir: &std::path::Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rulekit"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("run rulekit")
}

#[test]
fn eval_exit_code_follows_verdict() {
    let temp = tempfile::tempdir().expect("tempdir");

    let hit = rulekit(temp.path(), &["eval", "streq", "abc", "abc"]);
    assert_eq!(hit.status.code(), Some(exit_codes::OK));
    assert_eq!(String::from_utf8_lossy(&hit.stdout).trim(), "match");

    let miss = rulekit(temp.path(), &["eval", "@streq", "abc", "abd"]);
    assert_eq!(miss.status.code(), Some(exit_codes::NO_MATCH));
    assert_eq!(String::from_utf8_lossy(&miss.stdout).trim(), "no match");
}

#[test]
fn unknown_operator_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = rulekit(temp.path(), &["eval", "nope", "x", "y"]);
    assert_eq!(out.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown operator: nope"));
}

#[test]
fn check_missing_target_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = rulekit(temp.path(), &["check", "/nonexistent/scan.sh"]);
    assert_eq!(out.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Resource not found: /nonexistent/scan.sh"));
}

#[test]
fn check_reports_script_mode() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_file(temp.path(), "scan.insp", "#inspect-script\nmatch contains x\n").expect("write");

    let out = rulekit(temp.path(), &["check", "scan.insp"]);
    assert_eq!(out.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("mode: script\n"), "{stdout}");
}

#[test]
fn eval_json_report_includes_debug_log() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_file(temp.path(), "scan.insp", "#inspect-script\nmatch contains x\n").expect("write");

    let out = rulekit(
        temp.path(),
        &["eval", "inspectFile", "scan.insp", "xyz", "--debug-level", "9", "--json"],
    );
    assert_eq!(out.status.code(), Some(exit_codes::OK));

    let report: Value = serde_json::from_slice(&out.stdout).expect("json report");
    assert_eq!(report["operator"], "inspectFile");
    assert_eq!(report["matched"], true);
    assert_eq!(
        report["debug_log"][0]["message"],
        "Script directive at line 2 decided: match."
    );
}

#[test]
fn config_search_roots_are_honored() {
    let temp = tempfile::tempdir().expect("tempdir");
    let rules = temp.path().join("rules");
    fs::create_dir(&rules).expect("mkdir");
    write_file(&rules, "scan.insp", "#inspect-script\ndefault match\n").expect("write");
    fs::write(
        temp.path().join("rulekit.toml"),
        "search_roots = [\"rules\"]\n\n[inspect]\ntimeout_ms = 2000\n",
    )
    .expect("write config");

    let out = rulekit(temp.path(), &["eval", "inspectFile", "scan.insp", "v"]);
    assert_eq!(out.status.code(), Some(exit_codes::OK));
}

#[test]
fn invalid_config_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("bad.toml"), "debug_log_level = 42\n").expect("write config");

    let out = rulekit(temp.path(), &["--config", "bad.toml", "eval", "streq", "a", "a"]);
    assert_eq!(out.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn var_prints_time_minute() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = rulekit(temp.path(), &["var", "TIME_MIN"]);
    assert_eq!(out.status.code(), Some(exit_codes::OK));

    let stdout = String::from_utf8_lossy(&out.stdout);
    let minute = stdout
        .trim()
        .strip_prefix("TIME_MIN: ")
        .expect("TIME_MIN line");
    assert_eq!(minute.len(), 2);
    assert!(minute.parse::<u32>().expect("decimal") < 60);
}
