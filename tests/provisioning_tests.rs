//! Library-level provisioning workflows against an in-memory store

use sysprov::core::notify::RecordingNotifier;
use sysprov::core::{
    BomEngine, CategoryRuleSpec, CategoryRules, CompletionReconciler, ErrorKind, NetworkAllocator,
    NewSubsystem, NoopNotifier, PrefabConfigurator, Registry, Scan, Store, TemplateImport,
};
use sysprov::entities::{AssignmentStatus, DeviceCategory, SubsystemStatus};

const CAMERAS: &str = "n;name;q;pn\n1;Bullet camera;1;CAM-B\n2;Camera mount;1;MNT\n";

fn register(store: &Store, number: &str, system_type: &str, quantity: u32) {
    let registry = Registry::new(store);
    if registry.get_contract("C-1").is_err() {
        registry.create_contract("C-1", "Harbour", None).unwrap();
    }
    registry
        .create_subsystem(&NewSubsystem {
            contract: "C-1".into(),
            subsystem_number: number.into(),
            name: format!("{} subsystem", system_type),
            system_type: system_type.into(),
            quantity,
        })
        .unwrap();
}

#[test]
fn test_subsystem_quantity_multiplies_bom() {
    let store = Store::open_in_memory().unwrap();
    let rules = CategoryRules::builtin();
    let bom = BomEngine::new(&store, &rules);
    bom.import_csv(&TemplateImport::new("CAM", "Cameras", "video"), CAMERAS.as_bytes())
        .unwrap();
    register(&store, "S-1", "video", 3);

    let generated = bom.generate("S-1", None).unwrap();
    assert_eq!(generated.items[0].quantity, 3);
    assert_eq!(generated.items[1].quantity, 3);
    assert_eq!(bom.network_devices(&generated.id).unwrap().len(), 1);

    let net = NetworkAllocator::new(&store);
    net.create_pool("main", "10.0.0.0/16", 1, None).unwrap();
    let alloc = net.allocate_network("S-1").unwrap();
    assert_eq!(alloc.used_hosts, 3);
    assert_eq!(alloc.total_hosts, 252);
}

#[test]
fn test_custom_category_rule_wins() {
    let store = Store::open_in_memory().unwrap();
    let rules = CategoryRules::with_overrides(&[CategoryRuleSpec {
        pattern: r"\bmount\b".into(),
        category: DeviceCategory::Sensor,
        requires_ip: true,
    }])
    .unwrap();
    let bom = BomEngine::new(&store, &rules);
    let template = bom
        .import_csv(&TemplateImport::new("CAM", "Cameras", "video"), CAMERAS.as_bytes())
        .unwrap();
    assert_eq!(template.items[1].category, DeviceCategory::Sensor);
    assert!(template.items[1].requires_ip);
}

#[test]
fn test_range_exhaustion_rolls_back_allocation() {
    let store = Store::open_in_memory().unwrap();
    let rules = CategoryRules::builtin();
    let bom = BomEngine::new(&store, &rules);
    bom.import_csv(
        &TemplateImport::new("BIG", "Too many cameras", "video"),
        "n;name;q\n1;Dome camera;300\n".as_bytes(),
    )
    .unwrap();
    register(&store, "S-1", "video", 1);
    bom.generate("S-1", None).unwrap();

    let net = NetworkAllocator::new(&store);
    net.create_pool("main", "10.0.0.0/16", 1, None).unwrap();
    let err = net.allocate_network("S-1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capacity);
    assert_eq!(err.http_status(), 507);

    assert_eq!(
        Registry::new(&store).get_subsystem("S-1").unwrap().status,
        SubsystemStatus::BomGenerated
    );
    assert!(net.list_allocations(None).unwrap().is_empty());
}

#[test]
fn test_exhausted_pool_needs_another_active_pool() {
    let store = Store::open_in_memory().unwrap();
    let rules = CategoryRules::builtin();
    let bom = BomEngine::new(&store, &rules);
    bom.import_csv(&TemplateImport::new("CAM", "Cameras", "video"), CAMERAS.as_bytes())
        .unwrap();
    bom.import_csv(
        &TemplateImport::new("ACC", "Doors", "access"),
        "n;name;q\n1;Door controller;1\n".as_bytes(),
    )
    .unwrap();
    bom.import_csv(
        &TemplateImport::new("ICM", "Intercom", "intercom"),
        "n;name;q\n1;Intercom door station;1\n".as_bytes(),
    )
    .unwrap();

    let net = NetworkAllocator::new(&store);
    net.create_pool("small", "10.1.0.0/24", 1, None).unwrap();

    register(&store, "S-1", "video", 1);
    register(&store, "S-2", "access", 1);
    bom.generate("S-1", None).unwrap();
    bom.generate("S-2", None).unwrap();

    assert_eq!(net.allocate_network("S-1").unwrap().cidr.to_string(), "10.1.0.0/24");
    let err = net.allocate_network("S-2").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capacity);

    net.create_pool("spare", "10.2.0.0/23", 2, None).unwrap();
    net.set_pool_active("small", false).unwrap();
    assert_eq!(net.allocate_network("S-2").unwrap().cidr.to_string(), "10.2.0.0/24");

    register(&store, "S-3", "intercom", 1);
    bom.generate("S-3", None).unwrap();
    assert_eq!(net.allocate_network("S-3").unwrap().cidr.to_string(), "10.2.1.0/24");
}

#[test]
fn test_full_lifecycle_emits_events_in_order() {
    let store = Store::open_in_memory().unwrap();
    let rules = CategoryRules::builtin();
    let rec = RecordingNotifier::new();
    BomEngine::new(&store, &rules)
        .import_csv(&TemplateImport::new("CAM", "Cameras", "video"), CAMERAS.as_bytes())
        .unwrap();
    register(&store, "S-1", "video", 2);
    BomEngine::new(&store, &rules).generate("S-1", None).unwrap();
    let net = NetworkAllocator::new(&store);
    net.create_pool("main", "192.168.0.0/16", 1, None).unwrap();
    net.allocate_network("S-1").unwrap();

    let pick = CompletionReconciler::new(&store, &rec).with_operator("sam");
    pick.create_order("S-1").unwrap();
    pick.scan("CO-S-1", &Scan::new("CAM-B", 1).with_serial("A1")).unwrap();
    pick.report_missing("CO-S-1", &["MNT".to_string()], Some("late"))
        .unwrap();
    let order = pick
        .approve(
            "CO-S-1",
            true,
            Some(CompletionReconciler::parse_decision("CONTINUE_PARTIAL").unwrap()),
            None,
        )
        .unwrap();
    assert!(order.partial);

    let scans = pick.scans("CO-S-1").unwrap();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].scanned_by.as_deref(), Some("sam"));

    let prefab = PrefabConfigurator::new(&store, &rec);
    prefab.create_task("CO-S-1").unwrap();
    for row in net.ip_matrix("S-1").unwrap() {
        let serial = format!("SN-{}", row.hostname);
        prefab.configure_device("PF-S-1", &row.assignment_id, &serial).unwrap();
        prefab.verify_device("PF-S-1", &row.assignment_id, true, None).unwrap();
    }
    prefab.complete_task("PF-S-1").unwrap();
    Registry::new(&store).mark_deployed("S-1").unwrap();

    assert!(net
        .ip_matrix("S-1")
        .unwrap()
        .iter()
        .all(|r| r.status == AssignmentStatus::Deployed));
    assert_eq!(
        rec.names(),
        vec![
            "completion_task_created",
            "material_shortage",
            "completion_finished",
            "prefabrication_task_created",
            "prefabrication_completed",
        ]
    );
}

#[test]
fn test_stages_cannot_be_skipped() {
    let store = Store::open_in_memory().unwrap();
    register(&store, "S-1", "video", 1);

    let net = NetworkAllocator::new(&store);
    net.create_pool("main", "10.0.0.0/16", 1, None).unwrap();
    assert_eq!(
        net.allocate_network("S-1").unwrap_err().kind(),
        ErrorKind::StateViolation
    );
    let pick = CompletionReconciler::new(&store, &NoopNotifier);
    assert_eq!(pick.create_order("S-1").unwrap_err().kind(), ErrorKind::StateViolation);
    assert_eq!(
        Registry::new(&store).mark_deployed("S-1").unwrap_err().kind(),
        ErrorKind::StateViolation
    );
}

#[test]
fn test_two_connections_share_one_database() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("p.db");
    let first = Store::open(&path).unwrap();
    let second = Store::open(&path).unwrap();
    let rules = CategoryRules::builtin();

    BomEngine::new(&first, &rules)
        .import_csv(&TemplateImport::new("CAM", "Cameras", "video"), CAMERAS.as_bytes())
        .unwrap();
    BomEngine::new(&first, &rules)
        .import_csv(
            &TemplateImport::new("ACC", "Doors", "access"),
            "n;name;q\n1;Door controller;1\n".as_bytes(),
        )
        .unwrap();
    register(&first, "S-1", "video", 1);
    register(&first, "S-2", "access", 1);
    BomEngine::new(&first, &rules).generate("S-1", None).unwrap();
    BomEngine::new(&second, &rules).generate("S-2", None).unwrap();
    NetworkAllocator::new(&first)
        .create_pool("main", "10.0.0.0/16", 1, None)
        .unwrap();

    let a = NetworkAllocator::new(&first).allocate_network("S-1").unwrap();
    let b = NetworkAllocator::new(&second).allocate_network("S-2").unwrap();
    assert_ne!(a.cidr, b.cidr);
}
