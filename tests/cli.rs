//! CLI-level tests for the `colo` binary.
//!
//! Exercises command wiring through the real binary: schema init and the
//! operation commands that must work without object-store credentials.

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn colo_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("colo");
    path
}

fn write_config(dir: &Path) -> PathBuf {
    let config_path = dir.join("colo.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[db]
path = "{}"

[vector_index]
endpoint = "http://localhost:1"

[fulltext_index]
endpoint = "http://localhost:1"

[object_store]
bucket = "colo-test"
"#,
            dir.join("colo.sqlite").display()
        ),
    )
    .unwrap();
    config_path
}

/// Run `colo` with every object-store credential variable stripped.
fn colo_without_credentials(config: &Path, args: &[&str]) -> std::process::Output {
    Command::new(colo_binary())
        .args(args)
        .arg("--config")
        .arg(config)
        .env_remove("AWS_ACCESS_KEY_ID")
        .env_remove("AWS_SECRET_ACCESS_KEY")
        .env_remove("AWS_SESSION_TOKEN")
        .output()
        .unwrap()
}

#[test]
fn commands_off_the_object_store_path_run_without_credentials() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());

    let out = colo_without_credentials(&config, &["init"]);
    assert!(
        out.status.success(),
        "init failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    // initialize / delete / status on a missing collection must report
    // NotFound, never a missing-credentials error
    for command in ["initialize", "delete", "status"] {
        let out = colo_without_credentials(&config, &[command, "ghost"]);
        assert!(!out.status.success(), "{} on a missing id must fail", command);
        let stdout = String::from_utf8_lossy(&out.stdout);
        let stderr = String::from_utf8_lossy(&out.stderr);
        assert!(
            stdout.contains("not found"),
            "{} output: {}",
            command,
            stdout
        );
        assert!(
            !stdout.contains("AWS_ACCESS_KEY_ID") && !stderr.contains("AWS_ACCESS_KEY_ID"),
            "{} must not demand credentials: {}{}",
            command,
            stdout,
            stderr
        );
    }
}
