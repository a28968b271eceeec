//! End-to-end tests of the `sisp` binary, driven through `assert_cmd`
//! the way the teacher drives its own CLI tests.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn sisp() -> Command {
    Command::cargo_bin("sisp").unwrap()
}

fn jit_source(source: &str) -> Command {
    let mut cmd = sisp();
    cmd.arg("--jit").arg("1").write_stdin(source);
    cmd
}

#[test]
fn help_lists_the_jit_and_out_flags() {
    sisp()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--jit"))
        .stdout(predicate::str::contains("--out"));
}

#[test]
fn version_prints_something() {
    sisp().arg("--version").assert().success().stdout(predicate::str::contains("sisp"));
}

#[test]
fn arithmetic_precedence_yields_an_int() {
    jit_source("1 + 2 * 3").assert().success().stdout("7\n");
}

#[test]
fn calling_a_float_function_yields_a_float() {
    jit_source("def sq(x: float) -> float { x * x } sq(4.0)")
        .assert()
        .success()
        .stdout("16.0\n");
}

#[test]
fn for_loop_accumulates_into_a_scoped_variable() {
    jit_source("{ var n: int = 0 for i: int = 0, i < 5, 1 in { n = n + i } n }")
        .assert()
        .success()
        .stdout("10\n");
}

#[test]
fn if_expression_selects_the_true_branch() {
    jit_source("if 1 < 2 then 42 else 0").assert().success().stdout("42\n");
}

#[test]
fn custom_binary_operator_lowers_and_evaluates() {
    jit_source("def binary ^ 60 (a: int, b: int) -> int { a*a + b*b } 3 ^ 4")
        .assert()
        .success()
        .stdout("25\n");
}

#[test]
fn extern_call_prints_through_the_host_runtime_and_returns_void() {
    jit_source("extern printd(x: float) -> void; printd(2.5)")
        .assert()
        .success()
        .stdout("2.5000000\n");
}

#[test]
fn unknown_name_reports_a_diagnostic_and_fails() {
    jit_source("undeclared_thing")
        .assert()
        .failure()
        .stderr(predicate::str::contains("UnknownName"));
}

#[test]
fn object_mode_writes_a_valid_elf_object_file() {
    let out = NamedTempFile::new().unwrap();
    let mut input = NamedTempFile::new().unwrap();
    write!(input, "def sq(x: int) -> int {{ x * x }}").unwrap();

    sisp()
        .arg(input.path())
        .arg("--out")
        .arg(out.path())
        .assert()
        .success();

    let bytes = std::fs::read(out.path()).unwrap();
    assert_eq!(&bytes[..4], b"\x7fELF");
}

#[test]
fn multiple_top_level_expressions_each_get_a_distinct_anon_name_in_object_mode() {
    let out = NamedTempFile::new().unwrap();
    let mut input = NamedTempFile::new().unwrap();
    write!(input, "1 + 1; 2 + 2;").unwrap();

    sisp()
        .arg(input.path())
        .arg("--out")
        .arg(out.path())
        .assert()
        .success();
}
