//! Tests for the `xpathstax` binary.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn catalog() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("catalog.xml")
}

fn xpathstax() -> Command {
    Command::cargo_bin("xpathstax").unwrap()
}

#[test]
fn test_match_json_lines() {
    xpathstax()
        .arg("match")
        .arg(catalog())
        .args(["-x", "/catalog/book[@lang='nl']/title", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            r#""path":"/catalog/book/title","attributes":[],"text":"De Avonden""#,
        ))
        .stdout(predicate::str::contains("Dune").not());
}

#[test]
fn test_match_text_output() {
    xpathstax()
        .arg("match")
        .arg(catalog())
        .args(["--xpath", "/catalog/magazine/issue"])
        .env("NO_COLOR", "1")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"number="1""#))
        .stdout(predicate::str::contains(r#"number="2""#));
}

#[test]
fn test_count() {
    xpathstax()
        .arg("count")
        .arg(catalog())
        .args(["-x", "/catalog/book", "-x", "//title", "-x", "/catalog/*"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"3(\x1b\[0m)?\t/catalog/book").unwrap())
        .stdout(predicate::str::is_match(r"6(\x1b\[0m)?\t//title").unwrap())
        .stdout(predicate::str::is_match(r"5(\x1b\[0m)?\t/catalog/\*").unwrap());
}

#[test]
fn test_count_duplicate_expression_reported_once() {
    xpathstax()
        .arg("count")
        .arg(catalog())
        .args(["-x", "/catalog/book", "-x", "/catalog/book"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^(\x1b\[1m)?3(\x1b\[0m)?\t/catalog/book\n$").unwrap());
}

#[test]
fn test_check_valid_expressions() {
    xpathstax()
        .args(["check", "/a/b[@x='1']", "//c"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/a/b[@x='1']"))
        .stdout(predicate::str::contains("//c"));
}

#[test]
fn test_check_invalid_expression_fails() {
    xpathstax()
        .args(["check", "relative/path"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_missing_file_fails() {
    xpathstax()
        .args(["count", "/nonexistent/catalog.xml", "-x", "/catalog"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_truncated_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.xml");
    std::fs::write(&path, r#"<root><a x="1">hi</a><a x="2">by"#).unwrap();

    xpathstax()
        .arg("match")
        .arg(&path)
        .args(["-x", "/root/a"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"hi\""))
        .stderr(predicate::str::contains("Error:"));
}
