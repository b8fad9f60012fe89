use std::fs;

use cppmono::{run_main, CppmonoOptions};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn write_fixture(source: &str) -> (tempfile::TempDir, String) {
    let dir = tempdir().expect("tempdir");
    let file_path = dir.path().join("fixture.cpp");
    fs::write(&file_path, source).expect("write fixture");
    (dir, file_path.display().to_string())
}

fn base_options(file: String) -> CppmonoOptions {
    CppmonoOptions {
        files: vec![file],
        settings_file: None,
        debug_warnings: false,
        check_syntax: false,
        print_stream: true,
    }
}

#[test]
fn simplifies_a_function_template() {
    let (_dir, file) = write_fixture(
        "template <class T> T f(T x) { return x; }\nint a = f<int>(3);\n",
    );
    let output = run_main(&base_options(file))
        .expect("run")
        .expect("output");
    assert_eq!(
        output,
        "int a = f<int> ( 3 ) ; int f<int> ( int x ) { return x ; }"
    );
}

#[test]
fn simplifies_a_class_template_with_defaults() {
    let (_dir, file) = write_fixture(
        "template <class T, class U = int> struct P { };\nP<char> p;\n",
    );
    let output = run_main(&base_options(file))
        .expect("run")
        .expect("output");
    assert_eq!(output, "P<char,int> p ; struct P<char,int> { } ;");
}

#[test]
fn folds_constants_in_plain_code() {
    let (_dir, file) = write_fixture("int x = 1 + 2 * 3;\n");
    let output = run_main(&base_options(file))
        .expect("run")
        .expect("output");
    assert_eq!(output, "int x = 7 ;");
}

#[test]
fn check_syntax_flags_unbalanced_angles() {
    let (_dir, file) = write_fixture("; A < int b ;\n");
    let mut opts = base_options(file);
    opts.check_syntax = true;
    let err = run_main(&opts).expect_err("should report unbalanced brackets");
    assert!(err.to_string().contains("unbalanced angle brackets"));
}

#[test]
fn check_syntax_accepts_balanced_angles() {
    let (_dir, file) = write_fixture("std :: vector < int > v ;\n");
    let mut opts = base_options(file);
    opts.check_syntax = true;
    assert!(run_main(&opts).expect("run").is_none());
}

#[test]
fn missing_input_is_an_error() {
    let opts = base_options(String::new());
    let err = run_main(&CppmonoOptions { files: vec![], ..opts })
        .expect_err("no inputs should fail");
    assert!(err.to_string().contains("No input files"));
}

#[test]
fn settings_file_is_honored() {
    let (dir, file) = write_fixture("int x = 2 + 2;\n");
    let settings_path = dir.path().join("settings.toml");
    fs::write(&settings_path, "debug_warnings = true\n").expect("write settings");
    let mut opts = base_options(file);
    opts.settings_file = Some(settings_path.display().to_string());
    let output = run_main(&opts).expect("run").expect("output");
    assert_eq!(output, "int x = 4 ;");
}
