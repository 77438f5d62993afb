//! Process-level end-to-end tests: write a bayak source file to a temp
//! directory, run the real compiled `bayak` binary against it, and check
//! stdout/stderr/exit code.
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn bayak_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_bayak"))
}

fn write_source(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("failed to write fixture source");
    path
}

fn run_source(contents: &str) -> assert_cmd::assert::Assert {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = write_source(&dir, "program.bk", contents);
    Command::new(bayak_bin()).arg(&path).assert()
}

#[test]
fn addition() {
    run_source("print(1 + 1)\n").success().stdout("2\n");
}

#[test]
fn precedence_mult_binds_tighter_than_plus() {
    run_source("print(8 + 6 * 3)\n").success().stdout("26\n");
}

#[test]
fn parenthesized_subexpressions() {
    run_source("print((8 - 4) + (8 * 4))\n")
        .success()
        .stdout("36\n");
}

#[test]
fn function_call_with_mixed_precedence_body() {
    let src = "def f(a,b,c):\n    return a + b * c\nprint(f(1,2,3))\n";
    run_source(src).success().stdout("7\n");
}

#[test]
fn truthy_if_without_else() {
    let src = "if 1:\n    print('y')\n";
    run_source(src).success().stdout("y\n");
}

#[test]
fn if_else_inside_function_selects_branch_by_argument() {
    let src = "def g(a,r,l):\n    if a == 1:\n        return r - l\n    else:\n        return r + l\nprint(g(0,1,1))\nprint(g(1,1,1))\n";
    run_source(src).success().stdout("2\n0\n");
}

#[test]
fn unterminated_string_is_reported_as_a_lex_error() {
    run_source("print('unterminated)\n")
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("Lex error:"));
}

#[test]
fn mixed_indentation_is_reported_as_a_parse_error() {
    let src = "if 1:\n    print('a')\n\tprint('b')\n";
    run_source(src)
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("Parse error:"));
}

#[test]
fn unknown_variable_is_reported_as_a_codegen_error() {
    run_source("print(nope)\n")
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("Codegen error:"));
}

#[test]
fn tokens_flag_stops_after_lexing() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = write_source(&dir, "program.bk", "print(1)\n");
    Command::new(bayak_bin())
        .arg(&path)
        .arg("--tokens")
        .assert()
        .success()
        .stdout(predicate::str::contains("Name"));
}

#[test]
fn ast_flag_stops_after_parsing() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = write_source(&dir, "program.bk", "print(1)\n");
    Command::new(bayak_bin())
        .arg(&path)
        .arg("--ast")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fcall"));
}

#[test]
fn asm_flag_stops_after_codegen() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = write_source(&dir, "program.bk", "print(1 + 1)\n");
    Command::new(bayak_bin())
        .arg(&path)
        .arg("--asm")
        .assert()
        .success()
        .stdout(predicate::str::contains("CALL_BUILTIN"));
}

#[test]
fn emit_flag_writes_a_binary_image_without_running_it() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = write_source(&dir, "program.bk", "print(1)\n");
    let image_path = dir.path().join("program.byak");

    Command::new(bayak_bin())
        .arg(&path)
        .arg("--emit")
        .arg(&image_path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let bytes = std::fs::read(&image_path).expect("emitted image should exist");
    assert_eq!(&bytes[..4], b"BYAK");
}
