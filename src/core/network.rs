//! Network allocator
//!
//! Ranges are carved as /24 blocks from the first active pool (bump
//! allocation, no reclaim). Subsystems of the same contract and system type
//! share one range. Device addresses are handed out linearly from the first
//! usable address, skipping anything already taken in the physical segment.

use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;

use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::core::cidr::Ipv4Cidr;
use crate::core::error::{ProvisionError, Result};
use crate::core::identity::EntityId;
use crate::core::lifecycle;
use crate::core::store::{self, Store};
use crate::entities::{
    AssignmentStatus, DeviceCategory, DeviceIpAssignment, IpMatrixRow, NetworkAllocation,
    NetworkPool, Subsystem, SubsystemStatus,
};

/// Prefix length of every carved allocation
pub const ALLOCATION_PREFIX: u8 = 24;

/// Input for [`NetworkAllocator::assign_device`]
#[derive(Debug, Clone)]
pub struct DeviceRequest {
    pub category: DeviceCategory,
    pub device_type: String,
    pub hostname: Option<String>,
    pub description: Option<String>,
}

pub struct NetworkAllocator<'a> {
    store: &'a Store,
}

impl<'a> NetworkAllocator<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn create_pool(
        &self,
        name: &str,
        cidr: &str,
        priority: i32,
        description: Option<&str>,
    ) -> Result<NetworkPool> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProvisionError::Validation("pool name is empty".into()));
        }
        let cidr: Ipv4Cidr = cidr.parse()?;
        if cidr.prefix() > ALLOCATION_PREFIX {
            return Err(ProvisionError::Validation(format!(
                "pool {} is smaller than one /{} allocation",
                cidr, ALLOCATION_PREFIX
            )));
        }

        let mut pool = NetworkPool::new(name, cidr, priority);
        pool.description = description.map(str::to_string);

        let tx = self.store.transaction()?;
        store::pools::insert(&tx, &pool)?;
        tx.commit()?;
        info!(pool = %pool.name, cidr = %pool.cidr, priority, "network pool created");
        Ok(pool)
    }

    pub fn list_pools(&self) -> Result<Vec<NetworkPool>> {
        store::pools::list(self.store.conn())
    }

    pub fn set_pool_active(&self, key: &str, active: bool) -> Result<NetworkPool> {
        let tx = self.store.transaction()?;
        let mut pool = store::pools::resolve(&tx, key)?
            .ok_or_else(|| ProvisionError::not_found("NetworkPool", key))?;
        store::pools::set_active(&tx, &pool.id, active)?;
        tx.commit()?;
        pool.is_active = active;
        Ok(pool)
    }

    pub fn list_allocations(&self, pool: Option<&str>) -> Result<Vec<NetworkAllocation>> {
        let conn = self.store.conn();
        let pool_id = match pool {
            Some(key) => Some(
                store::pools::resolve(conn, key)?
                    .ok_or_else(|| ProvisionError::not_found("NetworkPool", key))?
                    .id,
            ),
            None => None,
        };
        store::allocations::list(conn, pool_id.as_ref())
    }

    pub fn get_allocation(&self, subsystem: &str) -> Result<NetworkAllocation> {
        let conn = self.store.conn();
        let sub = resolve_subsystem(conn, subsystem)?;
        store::allocations::get_for_subsystem(conn, &sub.id)?
            .ok_or_else(|| ProvisionError::not_found("NetworkAllocation", &sub.subsystem_number))
    }

    /// Bind a network range to the subsystem and plan one address per device
    pub fn allocate_network(&self, subsystem: &str) -> Result<NetworkAllocation> {
        let tx = self.store.transaction()?;
        let sub = resolve_subsystem(&tx, subsystem)?;

        if store::allocations::get_for_subsystem(&tx, &sub.id)?.is_some() {
            return Err(ProvisionError::Conflict(format!(
                "subsystem {} already has a network allocation",
                sub.subsystem_number
            )));
        }
        lifecycle::require_status(&sub, SubsystemStatus::BomGenerated, "allocate a network for")?;
        let bom = store::boms::get_for_subsystem(&tx, &sub.id)?
            .ok_or_else(|| ProvisionError::not_found("GeneratedBom", &sub.subsystem_number))?;

        let mut alloc = match store::allocations::find_shareable(
            &tx,
            &sub.contract_id,
            &sub.system_type,
            &sub.id,
        )? {
            Some(existing) => {
                debug!(
                    subsystem = %sub.subsystem_number,
                    cidr = %existing.cidr,
                    "sharing existing range"
                );
                NetworkAllocation::share(sub.id, &existing)
            }
            None => {
                let pool = store::pools::first_active(&tx)?
                    .ok_or_else(|| ProvisionError::not_found("NetworkPool", "any active pool"))?;
                let offset = store::allocations::carved_count(&tx, &pool.id)?;
                let cidr = pool.cidr.subnet(offset, ALLOCATION_PREFIX).ok_or_else(|| {
                    warn!(pool = %pool.name, offset, "network pool exhausted");
                    ProvisionError::Capacity(format!(
                        "pool {} ({}) has no /{} left at offset {}",
                        pool.name, pool.cidr, ALLOCATION_PREFIX, offset
                    ))
                })?;
                NetworkAllocation::carve(sub.id, pool.id, cidr)
            }
        };
        store::allocations::insert(&tx, &alloc)?;

        let segment = segment_of(&alloc);
        let mut used = store::assignments::used_in_segment(&tx, &segment)?;
        let mut counters: HashMap<&'static str, u32> = HashMap::new();
        let mut planned = 0u32;

        for item in bom.items.iter().filter(|i| i.requires_ip) {
            for _ in 0..item.quantity {
                let ip = next_free(&alloc.cidr, &used)?;
                let hostname = next_hostname(&sub, item.category, &mut counters);
                let assignment = DeviceIpAssignment::new(
                    alloc.id,
                    ip,
                    item.category,
                    item.name.clone(),
                    hostname,
                    AssignmentStatus::Planned,
                );
                store::assignments::insert(&tx, &assignment, &segment)?;
                used.insert(ip);
                planned += 1;
            }
        }

        alloc.used_hosts = planned;
        store::allocations::set_used_hosts(&tx, &alloc.id, alloc.used_hosts)?;
        lifecycle::advance(
            &tx,
            &sub.id,
            SubsystemStatus::BomGenerated,
            SubsystemStatus::IpAllocated,
        )?;
        tx.commit()?;

        info!(
            subsystem = %sub.subsystem_number,
            cidr = %alloc.cidr,
            shared = alloc.shared_from.is_some(),
            devices = planned,
            "network allocated"
        );
        Ok(alloc)
    }

    /// Add one ad-hoc device to an existing allocation
    pub fn assign_device(&self, subsystem: &str, request: &DeviceRequest) -> Result<DeviceIpAssignment> {
        let tx = self.store.transaction()?;
        let sub = resolve_subsystem(&tx, subsystem)?;
        if sub.status.is_terminal() {
            return Err(ProvisionError::StateViolation(format!(
                "subsystem {} is {}",
                sub.subsystem_number, sub.status
            )));
        }
        let mut alloc = store::allocations::get_for_subsystem(&tx, &sub.id)?
            .ok_or_else(|| ProvisionError::not_found("NetworkAllocation", &sub.subsystem_number))?;

        let segment = segment_of(&alloc);
        let used = store::assignments::used_in_segment(&tx, &segment)?;
        let ip = next_free(&alloc.cidr, &used)?;

        let hostname = match request.hostname.as_deref().map(str::trim) {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => {
                let existing = store::assignments::list_for_allocation(&tx, &alloc.id)?;
                let mut counters = HashMap::new();
                counters.insert(
                    request.category.hostname_tag(),
                    existing
                        .iter()
                        .filter(|a| a.category == request.category)
                        .count() as u32,
                );
                next_hostname(&sub, request.category, &mut counters)
            }
        };

        let mut assignment = DeviceIpAssignment::new(
            alloc.id,
            ip,
            request.category,
            request.device_type.clone(),
            hostname,
            AssignmentStatus::Assigned,
        );
        assignment.description = request.description.clone();
        store::assignments::insert(&tx, &assignment, &segment)?;

        alloc.used_hosts += 1;
        store::allocations::set_used_hosts(&tx, &alloc.id, alloc.used_hosts)?;
        tx.commit()?;

        debug!(
            subsystem = %sub.subsystem_number,
            ip = %assignment.ip_address,
            hostname = %assignment.hostname,
            "device assigned"
        );
        Ok(assignment)
    }

    /// Addressing table of every device of a subsystem
    pub fn ip_matrix(&self, subsystem: &str) -> Result<Vec<IpMatrixRow>> {
        let conn = self.store.conn();
        let sub = resolve_subsystem(conn, subsystem)?;
        let alloc = store::allocations::get_for_subsystem(conn, &sub.id)?
            .ok_or_else(|| ProvisionError::not_found("NetworkAllocation", &sub.subsystem_number))?;

        Ok(store::assignments::list_for_allocation(conn, &alloc.id)?
            .into_iter()
            .map(|a| IpMatrixRow {
                assignment_id: a.id,
                hostname: a.hostname,
                category: a.category,
                device_type: a.device_type,
                ip_address: a.ip_address,
                subnet_mask: alloc.subnet_mask,
                gateway: alloc.gateway,
                ntp_server: alloc.gateway,
                serial_number: a.serial_number,
                status: a.status,
            })
            .collect())
    }

    pub fn configure_assignment(
        &self,
        assignment_id: &EntityId,
        serial: &str,
        operator: Option<&str>,
    ) -> Result<DeviceIpAssignment> {
        let tx = self.store.transaction()?;
        let assignment = configure_in(&tx, assignment_id, serial, operator)?;
        tx.commit()?;
        Ok(assignment)
    }

    /// Verify one device; an open prefabrication task tracking it follows along
    pub fn verify_assignment(&self, assignment_id: &EntityId) -> Result<DeviceIpAssignment> {
        let tx = self.store.transaction()?;
        let assignment = verify_in(&tx, assignment_id)?;
        store::prefab::mark_assignment_verified(&tx, assignment_id, Utc::now())?;
        tx.commit()?;
        Ok(assignment)
    }
}

fn resolve_subsystem(conn: &Connection, key: &str) -> Result<Subsystem> {
    store::subsystems::resolve(conn, key)?.ok_or_else(|| ProvisionError::not_found("Subsystem", key))
}

/// The allocation that carved the range; shared allocations point at it
pub(crate) fn segment_of(alloc: &NetworkAllocation) -> EntityId {
    alloc.shared_from.unwrap_or(alloc.id)
}

/// Lowest usable address of `cidr` not in `used`
pub(crate) fn next_free(cidr: &Ipv4Cidr, used: &BTreeSet<Ipv4Addr>) -> Result<Ipv4Addr> {
    cidr.usable_addresses()
        .find(|ip| !used.contains(ip))
        .ok_or_else(|| {
            warn!(cidr = %cidr, "address range exhausted");
            ProvisionError::Capacity(format!(
                "no free address left in {} ({} usable)",
                cidr,
                cidr.usable_hosts()
            ))
        })
}

fn next_hostname(
    sub: &Subsystem,
    category: DeviceCategory,
    counters: &mut HashMap<&'static str, u32>,
) -> String {
    let tag = category.hostname_tag();
    let n = counters.entry(tag).or_insert(0);
    *n += 1;
    format!("{}-{}-{:02}", sub.subsystem_number, tag, n)
}

/// Give an assignment its serial and mark it CONFIGURED
pub(crate) fn configure_in(
    conn: &Connection,
    assignment_id: &EntityId,
    serial: &str,
    operator: Option<&str>,
) -> Result<DeviceIpAssignment> {
    let serial = serial.trim();
    if serial.is_empty() {
        return Err(ProvisionError::Validation("serial number is empty".into()));
    }
    let mut assignment = store::assignments::get(conn, assignment_id)?
        .ok_or_else(|| ProvisionError::not_found("DeviceIpAssignment", assignment_id))?;
    if assignment.status == AssignmentStatus::Deployed {
        return Err(ProvisionError::StateViolation(format!(
            "device {} is already deployed",
            assignment.hostname
        )));
    }

    assignment.serial_number = Some(serial.to_string());
    assignment.status = AssignmentStatus::Configured;
    assignment.configured_by = operator.map(str::to_string);
    assignment.configured_at = Some(Utc::now());
    assignment.verified_at = None;
    store::assignments::update(conn, &assignment)?;

    debug!(hostname = %assignment.hostname, serial, "device configured");
    Ok(assignment)
}

/// CONFIGURED → VERIFIED; an already VERIFIED device is returned unchanged
pub(crate) fn verify_in(conn: &Connection, assignment_id: &EntityId) -> Result<DeviceIpAssignment> {
    let mut assignment = store::assignments::get(conn, assignment_id)?
        .ok_or_else(|| ProvisionError::not_found("DeviceIpAssignment", assignment_id))?;
    if assignment.status == AssignmentStatus::Verified {
        return Ok(assignment);
    }
    if assignment.status != AssignmentStatus::Configured {
        return Err(ProvisionError::StateViolation(format!(
            "device {} must be CONFIGURED before verification (is {})",
            assignment.hostname, assignment.status
        )));
    }
    assignment.status = AssignmentStatus::Verified;
    assignment.verified_at = Some(Utc::now());
    store::assignments::update(conn, &assignment)?;

    debug!(hostname = %assignment.hostname, "device verified");
    Ok(assignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bom_engine::{BomEngine, TemplateImport};
    use crate::core::category::CategoryRules;
    use crate::core::error::ErrorKind;
    use crate::core::registry::{NewSubsystem, Registry};

    fn subsystem(store: &Store, number: &str, system_type: &str) {
        Registry::new(store)
            .create_subsystem(&NewSubsystem {
                contract: "C-1".into(),
                subsystem_number: number.into(),
                name: number.into(),
                system_type: system_type.into(),
                quantity: 1,
            })
            .unwrap();
    }

    /// Contract C-1 with a video template of 2 cameras + 1 switch
    fn setup() -> Store {
        let store = Store::open_in_memory().unwrap();
        Registry::new(&store).create_contract("C-1", "Harbour", None).unwrap();
        let rules = CategoryRules::builtin();
        BomEngine::new(&store, &rules)
            .import_csv(
                &TemplateImport::new("VID", "Video", "video"),
                "n;name;q\n1;Dome camera;2\n2;PoE switch;1\n3;Mounting bracket;2\n".as_bytes(),
            )
            .unwrap();
        BomEngine::new(&store, &rules)
            .import_csv(
                &TemplateImport::new("ACC", "Access", "access"),
                "n;name;q\n1;Door controller;1\n".as_bytes(),
            )
            .unwrap();
        store
    }

    fn generate(store: &Store, number: &str) {
        let rules = CategoryRules::builtin();
        BomEngine::new(store, &rules).generate(number, None).unwrap();
    }

    #[test]
    fn test_pool_validation() {
        let store = Store::open_in_memory().unwrap();
        let net = NetworkAllocator::new(&store);
        assert_eq!(
            net.create_pool("tiny", "10.0.0.0/28", 1, None).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            net.create_pool("crooked", "10.0.0.7/16", 1, None).unwrap_err().kind(),
            ErrorKind::Validation
        );
        net.create_pool("main", "10.20.0.0/16", 1, None).unwrap();
        assert_eq!(
            net.create_pool("main", "10.30.0.0/16", 1, None).unwrap_err().kind(),
            ErrorKind::Conflict
        );
    }

    #[test]
    fn test_allocation_plans_devices_in_order() {
        let store = setup();
        subsystem(&store, "C-1-VID-01", "video");
        generate(&store, "C-1-VID-01");
        let net = NetworkAllocator::new(&store);
        net.create_pool("main", "10.20.0.0/16", 10, None).unwrap();

        let alloc = net.allocate_network("C-1-VID-01").unwrap();
        assert_eq!(alloc.cidr.to_string(), "10.20.0.0/24");
        assert_eq!(alloc.gateway, Ipv4Addr::new(10, 20, 0, 1));
        assert_eq!(alloc.ntp_server, alloc.gateway);
        assert_eq!(alloc.used_hosts, 3);

        let matrix = net.ip_matrix("C-1-VID-01").unwrap();
        let ips: Vec<String> = matrix.iter().map(|r| r.ip_address.to_string()).collect();
        assert_eq!(ips, vec!["10.20.0.3", "10.20.0.4", "10.20.0.5"]);
        assert_eq!(matrix[0].hostname, "C-1-VID-01-cam-01");
        assert_eq!(matrix[1].hostname, "C-1-VID-01-cam-02");
        assert_eq!(matrix[2].hostname, "C-1-VID-01-sw-01");
        assert!(matrix.iter().all(|r| r.ntp_server == r.gateway));
        assert!(matrix.iter().all(|r| r.status == AssignmentStatus::Planned));

        let sub = Registry::new(&store).get_subsystem("C-1-VID-01").unwrap();
        assert_eq!(sub.status, SubsystemStatus::IpAllocated);
    }

    #[test]
    fn test_same_type_shares_range_and_different_type_carves_next() {
        let store = setup();
        for (n, t) in [("V1", "video"), ("V2", "video"), ("A1", "access")] {
            subsystem(&store, n, t);
            generate(&store, n);
        }
        let net = NetworkAllocator::new(&store);
        net.create_pool("main", "10.20.0.0/16", 10, None).unwrap();

        let v1 = net.allocate_network("V1").unwrap();
        let v2 = net.allocate_network("V2").unwrap();
        let a1 = net.allocate_network("A1").unwrap();

        assert_eq!(v1.cidr, v2.cidr);
        assert_eq!(v1.gateway, v2.gateway);
        assert_eq!(v2.shared_from, Some(v1.id));
        assert_eq!(v2.used_hosts, 3);
        assert_eq!(a1.cidr.to_string(), "10.20.1.0/24");

        // Shared segment never hands out the same address twice
        let first: Vec<_> = net.ip_matrix("V1").unwrap().into_iter().map(|r| r.ip_address).collect();
        let second: Vec<_> = net.ip_matrix("V2").unwrap().into_iter().map(|r| r.ip_address).collect();
        assert!(first.iter().all(|ip| !second.contains(ip)));
        assert_eq!(second[0], Ipv4Addr::new(10, 20, 0, 6));
    }

    #[test]
    fn test_same_type_in_other_contract_carves_own_range() {
        let store = setup();
        let registry = Registry::new(&store);
        registry.create_contract("C-2", "Airport", None).unwrap();
        subsystem(&store, "V1", "video");
        registry
            .create_subsystem(&NewSubsystem {
                contract: "C-2".into(),
                subsystem_number: "V2".into(),
                name: "V2".into(),
                system_type: "video".into(),
                quantity: 1,
            })
            .unwrap();
        generate(&store, "V1");
        generate(&store, "V2");
        let net = NetworkAllocator::new(&store);
        net.create_pool("main", "10.20.0.0/16", 10, None).unwrap();

        let v1 = net.allocate_network("V1").unwrap();
        let v2 = net.allocate_network("V2").unwrap();
        assert_eq!(v1.cidr.to_string(), "10.20.0.0/24");
        assert_eq!(v2.cidr.to_string(), "10.20.1.0/24");
        assert_eq!(v2.shared_from, None);
        assert_eq!(net.ip_matrix("V2").unwrap()[0].ip_address, Ipv4Addr::new(10, 20, 1, 3));
    }

    #[test]
    fn test_pool_priority_and_missing_pool() {
        let store = setup();
        subsystem(&store, "V1", "video");
        generate(&store, "V1");
        let net = NetworkAllocator::new(&store);

        let err = net.allocate_network("V1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        net.create_pool("backup", "10.99.0.0/16", 50, None).unwrap();
        net.create_pool("primary", "10.20.0.0/16", 5, None).unwrap();
        net.set_pool_active("primary", false).unwrap();
        let alloc = net.allocate_network("V1").unwrap();
        assert_eq!(alloc.cidr.to_string(), "10.99.0.0/24");
    }

    #[test]
    fn test_exhausted_pool_is_capacity_error() {
        let store = setup();
        subsystem(&store, "V1", "video");
        subsystem(&store, "A1", "access");
        generate(&store, "V1");
        generate(&store, "A1");
        let net = NetworkAllocator::new(&store);
        net.create_pool("single", "192.168.5.0/24", 1, None).unwrap();

        net.allocate_network("V1").unwrap();
        let err = net.allocate_network("A1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capacity);
        assert_eq!(err.http_status(), 507);

        let sub = Registry::new(&store).get_subsystem("A1").unwrap();
        assert_eq!(sub.status, SubsystemStatus::BomGenerated);
    }

    #[test]
    fn test_allocation_preconditions() {
        let store = setup();
        subsystem(&store, "V1", "video");
        let net = NetworkAllocator::new(&store);
        net.create_pool("main", "10.20.0.0/16", 1, None).unwrap();

        let err = net.allocate_network("V1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateViolation);

        generate(&store, "V1");
        net.allocate_network("V1").unwrap();
        let err = net.allocate_network("V1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_next_free_skips_taken_and_exhausts() {
        let cidr: Ipv4Cidr = "10.0.0.0/30".parse().unwrap();
        // /30: .3 is broadcast, no usable host under the .3 convention
        assert_eq!(
            next_free(&cidr, &BTreeSet::new()).unwrap_err().kind(),
            ErrorKind::Capacity
        );

        let cidr: Ipv4Cidr = "10.0.0.0/24".parse().unwrap();
        let used: BTreeSet<_> = [Ipv4Addr::new(10, 0, 0, 3), Ipv4Addr::new(10, 0, 0, 5)]
            .into_iter()
            .collect();
        assert_eq!(next_free(&cidr, &used).unwrap(), Ipv4Addr::new(10, 0, 0, 4));

        let full: BTreeSet<_> = cidr.usable_addresses().collect();
        assert_eq!(full.len(), 252);
        assert!(next_free(&cidr, &full).is_err());
    }

    #[test]
    fn test_configure_and_verify_assignment() {
        let store = setup();
        subsystem(&store, "V1", "video");
        generate(&store, "V1");
        let net = NetworkAllocator::new(&store);
        net.create_pool("main", "10.20.0.0/16", 1, None).unwrap();
        net.allocate_network("V1").unwrap();
        let matrix = net.ip_matrix("V1").unwrap();
        let (a, b) = (matrix[0].assignment_id, matrix[1].assignment_id);

        let err = net.verify_assignment(&a).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateViolation);

        net.configure_assignment(&a, "SN-100", Some("kim")).unwrap();
        let verified = net.verify_assignment(&a).unwrap();
        assert_eq!(verified.status, AssignmentStatus::Verified);
        let again = net.verify_assignment(&a).unwrap();
        assert_eq!(again.verified_at, verified.verified_at);

        let err = net.configure_assignment(&b, "SN-100", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_assign_device_takes_next_address() {
        let store = setup();
        subsystem(&store, "V1", "video");
        generate(&store, "V1");
        let net = NetworkAllocator::new(&store);
        net.create_pool("main", "10.20.0.0/16", 1, None).unwrap();
        net.allocate_network("V1").unwrap();

        let device = net
            .assign_device(
                "V1",
                &DeviceRequest {
                    category: DeviceCategory::Camera,
                    device_type: "PTZ camera".into(),
                    hostname: None,
                    description: Some("gate".into()),
                },
            )
            .unwrap();
        assert_eq!(device.ip_address, Ipv4Addr::new(10, 20, 0, 6));
        assert_eq!(device.hostname, "V1-cam-03");
        assert_eq!(device.status, AssignmentStatus::Assigned);
        assert_eq!(net.get_allocation("V1").unwrap().used_hosts, 4);
    }
}
