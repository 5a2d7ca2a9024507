use std::path::Path;
use std::process::{Command, Output};

use zonzai_test_engine::TestEngine;

fn host() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_zonzai-host"));
    cmd.env_remove("RUST_LOG").env_remove("ZONZAI_LOG_LEVEL");
    cmd
}

fn write_engine(dir: &Path, engine: &TestEngine) -> std::path::PathBuf {
    let path = dir.join("engine.wasm");
    std::fs::write(&path, engine.build()).expect("failed to write engine module");
    path
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "zonzai-host failed: {}\nstdout:\n{}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn assert_png_written(path: &Path) {
    let png = std::fs::read(path).expect("expected frame.png to be written");
    assert!(
        png.starts_with(b"\x89PNG\r\n\x1a\n"),
        "frame.png did not look like a PNG (first bytes = {:?})",
        &png.get(..8)
    );
}

#[test]
fn runs_tree_engine_and_dumps_png() {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let engine = write_engine(tmp.path(), &TestEngine::tree());
    let png = tmp.path().join("frame.png");

    let output = host()
        .arg("--engine")
        .arg(&engine)
        .args(["--frames", "3", "--width", "16", "--height", "8", "--seed", "7"])
        .arg("--png")
        .arg(&png)
        .output()
        .expect("failed to run zonzai-host");

    assert_success(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("frames: 3"), "stdout:\n{stdout}");
    assert!(stdout.contains("copied: 3"), "stdout:\n{stdout}");
    assert!(stdout.contains("skipped: 0"), "stdout:\n{stdout}");
    assert_png_written(&png);
}

#[test]
fn replays_a_script_against_the_life_engine() {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let engine = write_engine(tmp.path(), &TestEngine::life());
    let script = tmp.path().join("script.json");
    std::fs::write(
        &script,
        r#"[
            {"at_ms": 0, "action": "pattern", "name": "Glider"},
            {"at_ms": 0, "action": "pointer", "event": {"kind": "down", "x": 3, "y": 3}},
            {"at_ms": 0, "action": "pointer", "event": {"kind": "up", "x": 3, "y": 3}},
            {"at_ms": 0, "action": "pattern", "name": "does-not-exist"}
        ]"#,
    )
    .expect("failed to write script");

    let output = host()
        .arg("--engine")
        .arg(&engine)
        .args(["--preset", "life", "--frames", "2", "--width", "8", "--height", "8"])
        .arg("--script")
        .arg(&script)
        .output()
        .expect("failed to run zonzai-host");

    assert_success(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("frames: 2"), "stdout:\n{stdout}");
}

#[test]
fn unfinished_script_is_reported() {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let engine = write_engine(tmp.path(), &TestEngine::tree());
    let script = tmp.path().join("script.json");
    std::fs::write(&script, r#"[{"at_ms": 600000, "action": "clear"}]"#)
        .expect("failed to write script");

    let output = host()
        .arg("--engine")
        .arg(&engine)
        .args(["--frames", "1", "--width", "4", "--height", "4"])
        .arg("--script")
        .arg(&script)
        .output()
        .expect("failed to run zonzai-host");

    assert_success(&output);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("run stopped before the input script finished"),
        "stderr:\n{stderr}"
    );
}

#[test]
fn malformed_engine_fails_with_context() {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let engine = tmp.path().join("engine.wasm");
    std::fs::write(&engine, b"not a wasm module").expect("failed to write engine module");

    let output = host()
        .arg("--engine")
        .arg(&engine)
        .args(["--frames", "1"])
        .output()
        .expect("failed to run zonzai-host");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to instantiate engine"),
        "stderr:\n{stderr}"
    );
}

#[test]
fn a_stop_condition_is_required() {
    let output = host()
        .args(["--engine", "unused.wasm"])
        .output()
        .expect("failed to run zonzai-host");
    assert!(!output.status.success());
}
