use std::net::Ipv4Addr;

use tempfile::tempdir;

use super::*;
use crate::core::cidr::Ipv4Cidr;
use crate::core::error::ErrorKind;
use crate::entities::{
    AssignmentStatus, Contract, DeviceCategory, DeviceIpAssignment, NetworkAllocation,
    NetworkPool, Subsystem,
};

fn seeded() -> (Store, Contract, Subsystem) {
    let store = Store::open_in_memory().unwrap();
    let contract = Contract::new("C-1", "Harbour");
    contracts::insert(store.conn(), &contract).unwrap();
    let sub = Subsystem::new(contract.id, "C-1-VID-01", "Video north", "video", 1);
    subsystems::insert(store.conn(), &sub).unwrap();
    (store, contract, sub)
}

#[test]
fn test_open_creates_file_and_schema() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".sysprov").join("provisioning.db");
    let store = Store::open(&path).unwrap();
    assert!(path.exists());
    assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
    drop(store);

    // Reopening is idempotent
    let store = Store::open(&path).unwrap();
    assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
}

#[test]
fn test_duplicate_numbers_are_conflicts() {
    let (store, contract, _) = seeded();

    let again = Contract::new("C-1", "Other");
    let err = contracts::insert(store.conn(), &again).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let dup = Subsystem::new(contract.id, "C-1-VID-01", "Copy", "video", 1);
    let err = subsystems::insert(store.conn(), &dup).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn test_dropped_transaction_rolls_back() {
    let (store, contract, _) = seeded();
    {
        let tx = store.transaction().unwrap();
        let sub = Subsystem::new(contract.id, "C-1-VID-02", "Video south", "video", 1);
        subsystems::insert(&tx, &sub).unwrap();
    }
    assert!(subsystems::get_by_number(store.conn(), "C-1-VID-02")
        .unwrap()
        .is_none());
}

#[test]
fn test_segment_rejects_duplicate_address() {
    let (store, contract, sub) = seeded();
    let pool = NetworkPool::new("main", "10.0.0.0/16".parse().unwrap(), 10);
    pools::insert(store.conn(), &pool).unwrap();

    let cidr: Ipv4Cidr = "10.0.0.0/24".parse().unwrap();
    let first = NetworkAllocation::carve(sub.id, pool.id, cidr);
    allocations::insert(store.conn(), &first).unwrap();

    let sibling = Subsystem::new(contract.id, "C-1-VID-02", "Video south", "video", 1);
    subsystems::insert(store.conn(), &sibling).unwrap();
    let shared = NetworkAllocation::share(sibling.id, &first);
    allocations::insert(store.conn(), &shared).unwrap();

    let ip = Ipv4Addr::new(10, 0, 0, 3);
    let a = DeviceIpAssignment::new(
        first.id,
        ip,
        DeviceCategory::Camera,
        "Dome",
        "a",
        AssignmentStatus::Planned,
    );
    assignments::insert(store.conn(), &a, &first.id).unwrap();

    let b = DeviceIpAssignment::new(
        shared.id,
        ip,
        DeviceCategory::Camera,
        "Dome",
        "b",
        AssignmentStatus::Planned,
    );
    let err = assignments::insert(store.conn(), &b, &first.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let used = assignments::used_in_segment(store.conn(), &first.id).unwrap();
    assert!(used.contains(&ip));
    assert_eq!(allocations::carved_count(store.conn(), &pool.id).unwrap(), 1);
}

#[test]
fn test_serial_number_unique_across_assignments() {
    let (store, _, sub) = seeded();
    let pool = NetworkPool::new("main", "10.0.0.0/16".parse().unwrap(), 10);
    pools::insert(store.conn(), &pool).unwrap();
    let alloc = NetworkAllocation::carve(sub.id, pool.id, "10.0.0.0/24".parse().unwrap());
    allocations::insert(store.conn(), &alloc).unwrap();

    let mut first = DeviceIpAssignment::new(
        alloc.id,
        Ipv4Addr::new(10, 0, 0, 3),
        DeviceCategory::Camera,
        "Dome",
        "a",
        AssignmentStatus::Planned,
    );
    let mut second = DeviceIpAssignment::new(
        alloc.id,
        Ipv4Addr::new(10, 0, 0, 4),
        DeviceCategory::Camera,
        "Dome",
        "b",
        AssignmentStatus::Planned,
    );
    assignments::insert(store.conn(), &first, &alloc.id).unwrap();
    assignments::insert(store.conn(), &second, &alloc.id).unwrap();

    first.serial_number = Some("SN-1".to_string());
    assignments::update(store.conn(), &first).unwrap();
    second.serial_number = Some("SN-1".to_string());
    let err = assignments::update(store.conn(), &second).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}
