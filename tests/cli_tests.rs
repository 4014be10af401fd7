//! CLI and basic command tests

mod common;

use std::fs;

use common::{run_ok, setup_registered, setup_test_project, sysprov};
use predicates::prelude::*;
use tempfile::TempDir;

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    sysprov()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("provisioning"));
}

#[test]
fn test_version_displays() {
    sysprov()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sysprov"));
}

#[test]
fn test_unknown_command_fails() {
    sysprov()
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_completions_bash() {
    sysprov()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sysprov"));
}

// ============================================================================
// Init Command Tests
// ============================================================================

#[test]
fn test_init_creates_project_structure() {
    let tmp = TempDir::new().unwrap();

    sysprov()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized"));

    assert!(tmp.path().join(".sysprov").is_dir());
    assert!(tmp.path().join(".sysprov/config.yaml").exists());
    assert!(tmp.path().join(".sysprov/provisioning.db").exists());
}

#[test]
fn test_init_twice_fails() {
    let tmp = setup_test_project();
    sysprov()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn test_command_outside_project_fails() {
    let tmp = TempDir::new().unwrap();
    sysprov()
        .current_dir(tmp.path())
        .args(["contract", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sysprov init"));
}

#[test]
fn test_commands_work_from_subdirectory() {
    let tmp = setup_test_project();
    let nested = tmp.path().join("site/plans");
    fs::create_dir_all(&nested).unwrap();

    sysprov()
        .current_dir(&nested)
        .args(["contract", "new", "C-9", "--name", "Nested"])
        .assert()
        .success();
    let out = run_ok(&tmp, &["contract", "list", "-o", "tsv"]);
    assert!(out.contains("C-9\tNested"));
}

// ============================================================================
// Contract / Subsystem Tests
// ============================================================================

#[test]
fn test_contract_new_and_list() {
    let tmp = setup_test_project();
    sysprov()
        .current_dir(tmp.path())
        .args(["contract", "new", "C-1", "--name", "Harbour", "--pm", "Alex"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created contract C-1"));

    let json = run_ok(&tmp, &["contract", "list", "-o", "json"]);
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value[0]["contract_number"], "C-1");
    assert_eq!(value[0]["project_manager"], "Alex");
}

#[test]
fn test_duplicate_contract_is_conflict() {
    let tmp = setup_test_project();
    run_ok(&tmp, &["contract", "new", "C-1", "--name", "Harbour"]);
    sysprov()
        .current_dir(tmp.path())
        .args(["contract", "new", "C-1", "--name", "Again"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Conflict"));
}

#[test]
fn test_subsystem_needs_existing_contract() {
    let tmp = setup_test_project();
    sysprov()
        .current_dir(tmp.path())
        .args(["sub", "new", "S-1", "-c", "NOPE", "-n", "x", "-t", "video"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_subsystem_zero_quantity_rejected() {
    let tmp = setup_test_project();
    run_ok(&tmp, &["contract", "new", "C-1", "--name", "Harbour"]);
    sysprov()
        .current_dir(tmp.path())
        .args(["sub", "new", "S-1", "-c", "C-1", "-n", "x", "-t", "video", "-q", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid input"));
}

#[test]
fn test_subsystem_list_filters_by_status() {
    let tmp = setup_test_project();
    setup_registered(&tmp);
    run_ok(&tmp, &["sub", "new", "S-2", "-c", "C-1", "-n", "Doors", "-t", "access"]);
    run_ok(&tmp, &["bom", "generate", "S-1"]);

    let ids = run_ok(&tmp, &["sub", "list", "--status", "created", "-o", "tsv"]);
    assert!(ids.contains("S-2"));
    assert!(!ids.contains("S-1\t"));

    let generated = run_ok(&tmp, &["sub", "list", "-s", "BOM_GENERATED", "-o", "tsv"]);
    assert!(generated.contains("S-1\tGate video\tvideo\t1\tBOM_GENERATED"));
}

#[test]
fn test_subsystem_show_lists_next_stage() {
    let tmp = setup_test_project();
    setup_registered(&tmp);
    sysprov()
        .current_dir(tmp.path())
        .args(["sub", "show", "S-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CREATED"))
        .stdout(predicate::str::contains("BOM_GENERATED | CANCELLED"));
}

#[test]
fn test_cancel_requires_confirmation_without_terminal() {
    let tmp = setup_test_project();
    setup_registered(&tmp);
    sysprov()
        .current_dir(tmp.path())
        .args(["sub", "cancel", "S-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));

    sysprov()
        .current_dir(tmp.path())
        .args(["sub", "cancel", "S-1", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cancelled"));
}

#[test]
fn test_cancel_after_bom_is_rejected() {
    let tmp = setup_test_project();
    setup_registered(&tmp);
    run_ok(&tmp, &["bom", "generate", "S-1"]);
    sysprov()
        .current_dir(tmp.path())
        .args(["sub", "cancel", "S-1", "-y"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not allowed in current state"));
}

// ============================================================================
// BOM Tests
// ============================================================================

#[test]
fn test_bom_import_reports_bad_line() {
    let tmp = setup_test_project();
    fs::write(
        tmp.path().join("bad.csv"),
        "n;name;q\n1;Dome camera;2\n2;Switch;lots\n",
    )
    .unwrap();
    sysprov()
        .current_dir(tmp.path())
        .args(["bom", "import", "bad.csv", "--code", "X", "-n", "Bad", "-t", "video"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 3"));

    let out = run_ok(&tmp, &["bom", "templates", "-o", "tsv"]);
    assert_eq!(out.lines().count(), 1, "only the header: {}", out);
}

#[test]
fn test_bom_template_show_classifies_items() {
    let tmp = setup_test_project();
    setup_registered(&tmp);
    let out = run_ok(&tmp, &["bom", "template", "VID", "-o", "json"]);
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    let items = value["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["category"], "camera");
    assert_eq!(items[0]["requires_ip"], true);
    assert_eq!(items[2]["category"], "accessory");
    assert_eq!(items[2]["requires_ip"], false);
}

#[test]
fn test_bom_generate_twice_is_conflict() {
    let tmp = setup_test_project();
    setup_registered(&tmp);
    run_ok(&tmp, &["bom", "generate", "S-1"]);
    sysprov()
        .current_dir(tmp.path())
        .args(["bom", "generate", "S-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Conflict"));
}

#[test]
fn test_deactivated_template_is_not_used() {
    let tmp = setup_test_project();
    setup_registered(&tmp);
    run_ok(&tmp, &["bom", "deactivate", "VID"]);
    sysprov()
        .current_dir(tmp.path())
        .args(["bom", "generate", "S-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));

    run_ok(&tmp, &["bom", "activate", "VID"]);
    run_ok(&tmp, &["bom", "generate", "S-1"]);
}

// ============================================================================
// Network Tests
// ============================================================================

#[test]
fn test_pool_rejects_bad_cidr() {
    let tmp = setup_test_project();
    sysprov()
        .current_dir(tmp.path())
        .args(["net", "pool-new", "tiny", "10.0.0.0/28"])
        .assert()
        .failure();
    sysprov()
        .current_dir(tmp.path())
        .args(["net", "pool-new", "junk", "10.0.0/16"])
        .assert()
        .failure();

    let out = run_ok(&tmp, &["net", "pools", "-o", "id"]);
    assert!(out.trim().is_empty());
}

#[test]
fn test_allocate_without_pool_fails() {
    let tmp = setup_test_project();
    setup_registered(&tmp);
    run_ok(&tmp, &["bom", "generate", "S-1"]);
    sysprov()
        .current_dir(tmp.path())
        .args(["net", "allocate", "S-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_allocate_before_bom_is_state_violation() {
    let tmp = setup_test_project();
    setup_registered(&tmp);
    run_ok(&tmp, &["net", "pool-new", "main", "10.10.0.0/16"]);
    sysprov()
        .current_dir(tmp.path())
        .args(["net", "allocate", "S-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("BOM_GENERATED"));
}
