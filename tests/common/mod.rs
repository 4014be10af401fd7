//! Shared test helpers for integration tests

#![allow(dead_code)]

use std::fs;

use assert_cmd::cargo;
use assert_cmd::Command;
use tempfile::TempDir;

/// Two cameras, one switch, two brackets
pub const VIDEO_TEMPLATE: &str = "\
number;name;quantity;part number
1;Dome camera 4MP;2;CAM-D4
2;PoE switch 8 port;1;SW-8P
3;Mounting bracket;2;BRK-1
";

/// Helper to get a sysprov command
pub fn sysprov() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("sysprov"));
    cmd.env("SYSPROV_AUTHOR", "tester").env_remove("SYSPROV_DATABASE");
    cmd
}

/// Helper to create a test project in a temp directory
pub fn setup_test_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    sysprov().current_dir(tmp.path()).arg("init").assert().success();
    tmp
}

/// Run a command in the project and require success
pub fn run_ok(tmp: &TempDir, args: &[&str]) -> String {
    let output = sysprov().current_dir(tmp.path()).args(args).output().unwrap();
    assert!(
        output.status.success(),
        "sysprov {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Contract C-1 with video subsystem S-1 and the video template imported
pub fn setup_registered(tmp: &TempDir) {
    run_ok(tmp, &["contract", "new", "C-1", "--name", "Harbour"]);
    run_ok(
        tmp,
        &["sub", "new", "S-1", "--contract", "C-1", "--name", "Gate video", "--type", "video"],
    );
    let csv = tmp.path().join("video.csv");
    fs::write(&csv, VIDEO_TEMPLATE).unwrap();
    run_ok(
        tmp,
        &[
            "bom", "import", "video.csv", "--code", "VID", "--name", "Video kit", "--type",
            "video",
        ],
    );
}

/// S-1 with a generated BOM and an allocated network out of 10.10.0.0/16
pub fn setup_allocated(tmp: &TempDir) {
    setup_registered(tmp);
    run_ok(tmp, &["bom", "generate", "S-1"]);
    run_ok(tmp, &["net", "pool-new", "main", "10.10.0.0/16", "--priority", "1"]);
    run_ok(tmp, &["net", "allocate", "S-1"]);
}

/// S-1 picked completely, order CO-S-1 closed
pub fn setup_picked(tmp: &TempDir) {
    setup_allocated(tmp);
    run_ok(tmp, &["pick", "new", "S-1"]);
    run_ok(tmp, &["pick", "scan", "CO-S-1", "CAM-D4", "-q", "2"]);
    run_ok(tmp, &["pick", "scan", "CO-S-1", "SW-8P"]);
    run_ok(tmp, &["pick", "scan", "CO-S-1", "BRK-1", "-q", "2"]);
    run_ok(tmp, &["pick", "complete", "CO-S-1"]);
}
