//! End-to-end provisioning workflows through the CLI

mod common;

use common::{run_ok, setup_allocated, setup_picked, setup_test_project, sysprov};
use predicates::prelude::*;

fn status_of(tmp: &tempfile::TempDir, subsystem: &str) -> String {
    let out = run_ok(tmp, &["sub", "show", subsystem, "-o", "json"]);
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    value["status"].as_str().unwrap().to_string()
}

// ============================================================================
// Network allocation
// ============================================================================

#[test]
fn test_allocation_plans_one_address_per_device() {
    let tmp = setup_test_project();
    setup_allocated(&tmp);
    assert_eq!(status_of(&tmp, "S-1"), "IP_ALLOCATED");

    let tsv = run_ok(&tmp, &["net", "matrix", "S-1", "-o", "tsv"]);
    let rows: Vec<&str> = tsv.lines().skip(1).collect();
    assert_eq!(rows.len(), 3, "{}", tsv);
    assert!(rows[0].starts_with("S-1-cam-01\tcamera\tDome camera 4MP\t10.10.0.3\t255.255.255.0\t10.10.0.1\t10.10.0.1"));
    assert!(rows[1].starts_with("S-1-cam-02\tcamera"));
    assert!(rows[1].contains("10.10.0.4"));
    assert!(rows[2].starts_with("S-1-sw-01\tswitch"));
    assert!(rows[2].contains("10.10.0.5"));
    assert!(rows.iter().all(|r| r.ends_with("PLANNED")));
}

#[test]
fn test_second_subsystem_of_same_type_shares_network() {
    let tmp = setup_test_project();
    setup_allocated(&tmp);
    run_ok(&tmp, &["sub", "new", "S-2", "-c", "C-1", "-n", "Yard video", "-t", "video"]);
    run_ok(&tmp, &["bom", "generate", "S-2"]);
    sysprov()
        .current_dir(tmp.path())
        .args(["net", "allocate", "S-2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shared"));

    let tsv = run_ok(&tmp, &["net", "matrix", "S-2", "-o", "tsv"]);
    assert!(tsv.contains("10.10.0.6"));
    assert!(!tsv.contains("10.10.0.3\t"));
}

#[test]
fn test_other_system_type_gets_next_range() {
    let tmp = setup_test_project();
    setup_allocated(&tmp);
    std::fs::write(
        tmp.path().join("access.csv"),
        "n;name;q;pn\n1;Door controller;1;DC-2\n",
    )
    .unwrap();
    run_ok(&tmp, &["bom", "import", "access.csv", "--code", "ACC", "-n", "Doors", "-t", "access"]);
    run_ok(&tmp, &["sub", "new", "S-2", "-c", "C-1", "-n", "Doors", "-t", "access"]);
    run_ok(&tmp, &["bom", "generate", "S-2"]);
    run_ok(&tmp, &["net", "allocate", "S-2"]);

    let tsv = run_ok(&tmp, &["net", "matrix", "S-2", "-o", "tsv"]);
    assert!(tsv.contains("S-2-acc-01\taccess_controller\tDoor controller\t10.10.1.3"));
}

#[test]
fn test_assign_adhoc_device() {
    let tmp = setup_test_project();
    setup_allocated(&tmp);
    sysprov()
        .current_dir(tmp.path())
        .args(["net", "assign", "S-1", "-c", "camera", "-t", "PTZ camera"])
        .assert()
        .success()
        .stdout(predicate::str::contains("10.10.0.6"))
        .stdout(predicate::str::contains("S-1-cam-03"));
}

#[test]
fn test_device_id_from_other_subsystem_is_rejected() {
    let tmp = setup_test_project();
    setup_allocated(&tmp);
    run_ok(&tmp, &["sub", "new", "S-2", "-c", "C-1", "-n", "Yard video", "-t", "video"]);
    run_ok(&tmp, &["bom", "generate", "S-2"]);
    run_ok(&tmp, &["net", "allocate", "S-2"]);

    let ids = run_ok(&tmp, &["net", "matrix", "S-2", "-o", "id"]);
    let foreign = ids.lines().next().unwrap().trim().to_string();
    sysprov()
        .current_dir(tmp.path())
        .args(["net", "configure", "S-1", &foreign, "SN-900"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No device"));

    let own = run_ok(&tmp, &["net", "matrix", "S-1", "-o", "id"]);
    let own = own.lines().next().unwrap().trim().to_string();
    run_ok(&tmp, &["net", "configure", "S-1", &own, "SN-900"]);
    let tsv = run_ok(&tmp, &["net", "matrix", "S-2", "-o", "tsv"]);
    assert!(!tsv.contains("SN-900"));
}

// ============================================================================
// Pick reconciliation
// ============================================================================

#[test]
fn test_full_pick_moves_subsystem_to_prefabrication() {
    let tmp = setup_test_project();
    setup_picked(&tmp);
    assert_eq!(status_of(&tmp, "S-1"), "IN_PREFABRICATION");

    let out = run_ok(&tmp, &["pick", "show", "CO-S-1", "-o", "json"]);
    let order: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(order["status"], "COMPLETED");
    assert_eq!(order["partial"], false);
}

#[test]
fn test_over_scan_is_clamped() {
    let tmp = setup_test_project();
    setup_allocated(&tmp);
    run_ok(&tmp, &["pick", "new", "S-1"]);
    sysprov()
        .current_dir(tmp.path())
        .args(["pick", "scan", "CO-S-1", "CAM-D4", "-q", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2/2"))
        .stdout(predicate::str::contains("3 over expected"));

    sysprov()
        .current_dir(tmp.path())
        .args(["pick", "scan", "CO-S-1", "CAM-D4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_duplicate_serial_scan_rejected() {
    let tmp = setup_test_project();
    setup_allocated(&tmp);
    run_ok(&tmp, &["pick", "new", "S-1"]);
    run_ok(&tmp, &["pick", "scan", "CO-S-1", "CAM-D4", "-s", "SN-100"]);
    sysprov()
        .current_dir(tmp.path())
        .args(["pick", "scan", "CO-S-1", "CAM-D4", "-s", "SN-100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Conflict"));
}

#[test]
fn test_complete_with_open_items_fails() {
    let tmp = setup_test_project();
    setup_allocated(&tmp);
    run_ok(&tmp, &["pick", "new", "S-1"]);
    run_ok(&tmp, &["pick", "scan", "CO-S-1", "CAM-D4"]);
    sysprov()
        .current_dir(tmp.path())
        .args(["pick", "complete", "CO-S-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not allowed in current state"));
    assert_eq!(status_of(&tmp, "S-1"), "IN_COMPLETION");
}

#[test]
fn test_partial_approval_marks_rest_missing() {
    let tmp = setup_test_project();
    setup_allocated(&tmp);
    run_ok(&tmp, &["pick", "new", "S-1"]);
    run_ok(&tmp, &["pick", "scan", "CO-S-1", "CAM-D4", "-q", "2"]);
    run_ok(&tmp, &["pick", "missing", "CO-S-1", "SW-8P", "-n", "backorder"]);

    sysprov()
        .current_dir(tmp.path())
        .args([
            "pick", "approve", "CO-S-1", "--partial", "-d", "continue_partial",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("partially completed"));

    let out = run_ok(&tmp, &["pick", "show", "CO-S-1", "-o", "json"]);
    let order: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(order["partial"], true);
    let statuses: Vec<&str> = order["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["SCANNED", "MISSING", "MISSING"]);
    assert_eq!(status_of(&tmp, "S-1"), "IN_PREFABRICATION");
}

#[test]
fn test_wait_decision_reopens_missing_items() {
    let tmp = setup_test_project();
    setup_allocated(&tmp);
    run_ok(&tmp, &["pick", "new", "S-1"]);
    run_ok(&tmp, &["pick", "missing", "CO-S-1", "SW-8P"]);
    sysprov()
        .current_dir(tmp.path())
        .args(["pick", "decision", "CO-S-1", "WAIT_FOR_COMPLETE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("WAITING_DECISION"));

    run_ok(&tmp, &["pick", "scan", "CO-S-1", "SW-8P"]);
    run_ok(&tmp, &["pick", "scan", "CO-S-1", "CAM-D4", "-q", "2"]);
    run_ok(&tmp, &["pick", "scan", "CO-S-1", "BRK-1", "-q", "2"]);
    run_ok(&tmp, &["pick", "complete", "CO-S-1"]);
    assert_eq!(status_of(&tmp, "S-1"), "IN_PREFABRICATION");
}

#[test]
fn test_unknown_decision_is_validation_error() {
    let tmp = setup_test_project();
    setup_allocated(&tmp);
    run_ok(&tmp, &["pick", "new", "S-1"]);
    sysprov()
        .current_dir(tmp.path())
        .args(["pick", "decision", "CO-S-1", "SHIP_IT"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid input"));
}

#[test]
fn test_pallets_group_items() {
    let tmp = setup_test_project();
    setup_allocated(&tmp);
    run_ok(&tmp, &["pick", "new", "S-1"]);
    run_ok(&tmp, &["pick", "pallet", "CO-S-1", "P1", "CAM-D4", "BRK-1"]);
    run_ok(&tmp, &["pick", "pallet", "CO-S-1", "P2", "SW-8P"]);

    let tsv = run_ok(&tmp, &["pick", "pallets", "CO-S-1", "-o", "tsv"]);
    assert!(tsv.contains("P1\t2\t"));
    assert!(tsv.contains("P2\t1\t"));
}

// ============================================================================
// Prefabrication and deployment
// ============================================================================

#[test]
fn test_prefab_to_deployment() {
    let tmp = setup_test_project();
    setup_picked(&tmp);
    sysprov()
        .current_dir(tmp.path())
        .args(["pick", "prefab", "CO-S-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PF-S-1"));

    for (host, serial) in [("S-1-cam-01", "SN-1"), ("S-1-cam-02", "SN-2"), ("S-1-sw-01", "SN-3")] {
        run_ok(&tmp, &["prefab", "configure", "PF-S-1", host, serial]);
    }
    run_ok(&tmp, &["prefab", "verify", "PF-S-1", "S-1-cam-01"]);
    run_ok(&tmp, &["prefab", "verify", "PF-S-1", "S-1-cam-02"]);
    sysprov()
        .current_dir(tmp.path())
        .args(["prefab", "fail", "PF-S-1", "S-1-sw-01", "-n", "port 3 dead"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FAILED"))
        .stdout(predicate::str::contains("port 3 dead"));

    sysprov()
        .current_dir(tmp.path())
        .args(["prefab", "complete", "PF-S-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("S-1-sw-01"));

    run_ok(&tmp, &["prefab", "configure", "PF-S-1", "S-1-sw-01", "SN-4"]);
    run_ok(&tmp, &["prefab", "verify", "PF-S-1", "S-1-sw-01"]);
    run_ok(&tmp, &["prefab", "complete", "PF-S-1"]);
    assert_eq!(status_of(&tmp, "S-1"), "READY_FOR_DEPLOYMENT");

    run_ok(&tmp, &["sub", "deploy", "S-1"]);
    assert_eq!(status_of(&tmp, "S-1"), "DEPLOYED");
    let tsv = run_ok(&tmp, &["net", "matrix", "S-1", "-o", "tsv"]);
    assert!(tsv.lines().skip(1).all(|l| l.ends_with("DEPLOYED")), "{}", tsv);
}

#[test]
fn test_label_renders_device_data() {
    let tmp = setup_test_project();
    setup_picked(&tmp);
    run_ok(&tmp, &["pick", "prefab", "CO-S-1"]);
    run_ok(&tmp, &["prefab", "configure", "PF-S-1", "S-1-cam-02", "SN-77"]);

    sysprov()
        .current_dir(tmp.path())
        .args(["prefab", "label", "PF-S-1", "S-1-cam-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("C-1 / S-1"))
        .stdout(predicate::str::contains("S/N:     SN-77"))
        .stdout(predicate::str::contains("IP:      10.10.0.4"));

    sysprov()
        .current_dir(tmp.path())
        .args(["prefab", "label", "PF-S-1", "S-1-cam-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not configured"));
}

#[test]
fn test_prefab_before_pick_complete_fails() {
    let tmp = setup_test_project();
    setup_allocated(&tmp);
    run_ok(&tmp, &["pick", "new", "S-1"]);
    sysprov()
        .current_dir(tmp.path())
        .args(["pick", "prefab", "CO-S-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("COMPLETED"));
}
