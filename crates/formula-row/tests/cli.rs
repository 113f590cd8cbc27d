use std::process::{Command, Output, Stdio};

fn formula_row(args: &[&str]) -> Output {
    Command::new(assert_cmd::cargo::cargo_bin!("formula-row"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run formula-row")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn evaluates_a_literal_formula() {
    let output = formula_row(&["OrderedAscending([4, 6, 8])"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "true\n");
}

#[test]
fn evaluates_against_a_json_row() {
    let output = formula_row(&[
        "--property",
        "scores=set<number>",
        "--row",
        r#"{"scores": [10, 70, 55]}"#,
        "--format",
        "json",
        "Filter(scores, s => OrderedAscending([50, s]))",
    ]);
    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["type"], "set<number>");
    assert_eq!(report["value"], serde_json::json!([70.0, 55.0]));
    assert_eq!(report["volatile"], false);
}

#[test]
fn pinned_clock_makes_now_reproducible() {
    let output = formula_row(&["--now", "2024-02-29T12:00:00Z", "Now()"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "2024-02-29T12:00:00Z\n");
}

#[test]
fn disassembly_shows_the_inlined_loop() {
    let output = formula_row(&["--disassemble", "Filter([1, 2], x => All([true]))"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("iter_begin"), "{text}");
    assert!(text.contains("jump_back"), "{text}");
    assert!(text.ends_with("[1, 2]\n"), "{text}");
}

#[test]
fn lists_intrinsics() {
    let output = formula_row(&["--functions"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Diff(date, date) -> number"), "{text}");
    assert!(text.contains("Now() -> date  [volatile]"), "{text}");
}

#[test]
fn compile_errors_fail_the_process() {
    let output = formula_row(&["[1, 'a']"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to compile formula"), "{stderr}");
    assert!(stderr.contains("set elements must share one type"), "{stderr}");
}

#[test]
fn tokens_are_printed_even_when_compilation_fails() {
    let output = formula_row(&["--tokens", "Sum([1, nope])"]);
    assert!(!output.status.success());
    let text = stdout(&output);
    assert!(text.contains("identifier"), "{text}");
    assert!(text.contains("\"nope\""), "{text}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to compile formula"), "{stderr}");
}

#[test]
fn cli_does_not_panic_on_broken_pipe() {
    let mut child = Command::new(assert_cmd::cargo::cargo_bin!("formula-row"))
        .args(["--functions", "--format", "json"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn formula-row");

    // Closing the read end forces stdout writes to return EPIPE / BrokenPipe.
    drop(child.stdout.take());

    let output = child
        .wait_with_output()
        .expect("wait for formula-row to finish");

    assert!(
        output.status.success(),
        "expected success even when stdout is closed\nstderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
}
