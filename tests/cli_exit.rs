//! Exit behavior of the ds-mapper binary.

use std::process::Command;

#[test]
fn missing_config_exits_with_failure_and_context() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let output = Command::new(env!("CARGO_BIN_EXE_ds-mapper"))
        .arg("--config")
        .arg(&path)
        .env("RUST_LOG", "error")
        .env("NO_COLOR", "1")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let log = String::from_utf8_lossy(&output.stdout);
    assert!(log.contains("loading config"), "{log}");
    assert!(log.contains("absent.toml"), "{log}");
}
