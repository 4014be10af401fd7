//! Completion reconciler
//!
//! One pick order per subsystem, seeded from its generated BOM. Barcode scans
//! are matched to items by part number and clamped at the expected quantity.
//! Incomplete orders need a human decision before they can close.

use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::core::error::{ProvisionError, Result};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::lifecycle;
use crate::core::notify::{dispatch, Notifier, ProvisioningEvent};
use crate::core::store::{self, Store};
use crate::entities::{
    CompletionDecision, CompletionItem, CompletionOrder, ItemStatus, OrderStatus, Pallet,
    ScanRecord, Subsystem, SubsystemStatus,
};

/// A barcode read at the pick station
#[derive(Debug, Clone)]
pub struct Scan {
    pub barcode: String,
    pub quantity: u32,
    pub serial_number: Option<String>,
}

impl Scan {
    pub fn new(barcode: impl Into<String>, quantity: u32) -> Self {
        Self {
            barcode: barcode.into(),
            quantity,
            serial_number: None,
        }
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }
}

/// Result of one accepted scan
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub item: CompletionItem,
    /// Quantity counted after clamping
    pub accepted: u32,
    pub order_status: OrderStatus,
}

pub struct CompletionReconciler<'a> {
    store: &'a Store,
    notifier: &'a dyn Notifier,
    operator: Option<&'a str>,
}

impl<'a> CompletionReconciler<'a> {
    pub fn new(store: &'a Store, notifier: &'a dyn Notifier) -> Self {
        Self {
            store,
            notifier,
            operator: None,
        }
    }

    /// Name recorded on orders and scans
    pub fn with_operator(mut self, operator: &'a str) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn parse_decision(value: &str) -> Result<CompletionDecision> {
        value.parse().map_err(ProvisionError::Validation)
    }

    pub fn create_order(&self, subsystem: &str) -> Result<CompletionOrder> {
        let tx = self.store.transaction()?;
        let sub = store::subsystems::resolve(&tx, subsystem)?
            .ok_or_else(|| ProvisionError::not_found("Subsystem", subsystem))?;

        if let Some(existing) = store::orders::get_for_subsystem(&tx, &sub.id)? {
            return Err(ProvisionError::Conflict(format!(
                "subsystem {} already has completion order {}",
                sub.subsystem_number, existing.order_number
            )));
        }
        lifecycle::require_status(&sub, SubsystemStatus::IpAllocated, "start completion for")?;
        let bom = store::boms::get_for_subsystem(&tx, &sub.id)?
            .ok_or_else(|| ProvisionError::not_found("GeneratedBom", &sub.subsystem_number))?;

        let mut order = CompletionOrder::new(
            format!("{}-{}", EntityPrefix::Co, sub.subsystem_number),
            sub.id,
            bom.id,
        );
        order.created_by = self.operator.map(str::to_string);
        order.items = bom
            .items
            .iter()
            .map(|line| CompletionItem {
                id: EntityId::new(EntityPrefix::Ci),
                order_id: order.id,
                bom_item_id: line.id,
                sequence: line.sequence,
                name: line.name.clone(),
                part_number: line.part_number.clone(),
                category: line.category,
                expected_quantity: line.quantity,
                scanned_quantity: 0,
                missing_quantity: 0,
                // Nothing to pick for zero-quantity lines
                status: if line.quantity == 0 {
                    ItemStatus::Scanned
                } else {
                    ItemStatus::Pending
                },
                missing_note: None,
                pallet_id: None,
                serial_numbers: Vec::new(),
            })
            .collect();

        store::orders::insert(&tx, &order)?;
        lifecycle::advance(
            &tx,
            &sub.id,
            SubsystemStatus::IpAllocated,
            SubsystemStatus::InCompletion,
        )?;
        tx.commit()?;

        info!(order = %order.order_number, items = order.items.len(), "completion order created");
        dispatch(
            self.notifier,
            ProvisioningEvent::CompletionTaskCreated {
                order_number: order.order_number.clone(),
                subsystem_number: sub.subsystem_number,
                items: order.items.len(),
            },
        );
        Ok(order)
    }

    /// Order with items, by ID or order number
    pub fn get_order(&self, key: &str) -> Result<CompletionOrder> {
        store::orders::resolve(self.store.conn(), key)?
            .ok_or_else(|| ProvisionError::not_found("CompletionOrder", key))
    }

    pub fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<CompletionOrder>> {
        store::orders::list(self.store.conn(), status)
    }

    pub fn scans(&self, key: &str) -> Result<Vec<ScanRecord>> {
        let order = self.get_order(key)?;
        store::orders::scans(self.store.conn(), &order.id)
    }

    /// Count a scanned barcode against the first eligible item with that part number
    pub fn scan(&self, order_key: &str, scan: &Scan) -> Result<ScanOutcome> {
        if scan.quantity < 1 {
            return Err(ProvisionError::Validation("scan quantity must be at least 1".into()));
        }
        let barcode = scan.barcode.trim();
        if barcode.is_empty() {
            return Err(ProvisionError::Validation("barcode is empty".into()));
        }
        let serial = scan
            .serial_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let tx = self.store.transaction()?;
        let mut order = load_order(&tx, order_key)?;
        require_open(&order, "scan")?;

        let mut item = store::orders::find_eligible_item(&tx, &order.id, barcode)?
            .ok_or_else(|| {
                ProvisionError::not_found(
                    "CompletionItem",
                    format!("open item with part number {} in {}", barcode, order.order_number),
                )
            })?;

        let remaining = item.expected_quantity.saturating_sub(item.scanned_quantity);
        let accepted = scan.quantity.min(remaining);
        item.scanned_quantity += accepted;
        item.status = ItemStatus::from_progress(item.scanned_quantity, item.expected_quantity);

        let record = ScanRecord {
            id: EntityId::new(EntityPrefix::Scan),
            item_id: item.id,
            barcode: barcode.to_string(),
            quantity: scan.quantity,
            accepted,
            serial_number: serial.map(str::to_string),
            scanned_by: self.operator.map(str::to_string),
            scanned_at: Utc::now(),
        };
        store::orders::insert_scan(&tx, &record)?;
        store::orders::update_item(&tx, &item)?;
        store::boms::update_progress(&tx, &item.bom_item_id, item.scanned_quantity, item.missing_quantity)?;

        if order.status == OrderStatus::Created {
            order.status = OrderStatus::InProgress;
            order.started_at = Some(record.scanned_at);
            store::orders::update(&tx, &order)?;
        }
        tx.commit()?;

        debug!(
            order = %order.order_number,
            barcode,
            accepted,
            scanned = item.scanned_quantity,
            expected = item.expected_quantity,
            "scan accepted"
        );
        if let Some(serial) = record.serial_number {
            item.serial_numbers.push(serial);
        }
        Ok(ScanOutcome {
            item,
            accepted,
            order_status: order.status,
        })
    }

    /// Flag items MISSING; `items` are item IDs or part numbers of the order
    pub fn report_missing(
        &self,
        order_key: &str,
        items: &[String],
        note: Option<&str>,
    ) -> Result<CompletionOrder> {
        if items.is_empty() {
            return Err(ProvisionError::Validation("no items given".into()));
        }
        let tx = self.store.transaction()?;
        let mut order = load_order(&tx, order_key)?;
        require_open(&order, "report missing items on")?;

        let mut shortages = Vec::new();
        for key in items {
            let item = find_item(&mut order, key)?;
            if item.status == ItemStatus::Scanned {
                return Err(ProvisionError::StateViolation(format!(
                    "item {} is fully scanned and cannot be missing",
                    item.part_number
                )));
            }
            mark_missing(item, note);
            store::orders::update_item(&tx, item)?;
            store::boms::update_progress(&tx, &item.bom_item_id, item.scanned_quantity, item.missing_quantity)?;
            shortages.push((item.part_number.clone(), item.missing_quantity));
        }
        let sub = subsystem_of(&tx, &order)?;
        tx.commit()?;

        info!(order = %order.order_number, items = shortages.len(), "material shortage reported");
        dispatch(
            self.notifier,
            ProvisioningEvent::MaterialShortage {
                order_number: order.order_number.clone(),
                subsystem_number: sub.subsystem_number,
                shortages,
                note: note.map(str::to_string),
            },
        );
        Ok(order)
    }

    /// Record how to proceed with an incomplete order
    pub fn record_decision(
        &self,
        order_key: &str,
        decision: CompletionDecision,
        note: Option<&str>,
    ) -> Result<CompletionOrder> {
        let tx = self.store.transaction()?;
        let mut order = load_order(&tx, order_key)?;
        require_open(&order, "decide on")?;
        apply_decision(&tx, &mut order, decision, note)?;
        tx.commit()?;

        info!(order = %order.order_number, decision = %decision, "completion decision recorded");
        Ok(order)
    }

    /// Approve fully (every item scanned) or partially with a decision
    ///
    /// A partial CONTINUE_PARTIAL approval flags everything unresolved as
    /// missing and closes the order; WAIT_FOR_COMPLETE parks it instead.
    pub fn approve(
        &self,
        order_key: &str,
        partial: bool,
        decision: Option<CompletionDecision>,
        note: Option<&str>,
    ) -> Result<CompletionOrder> {
        let tx = self.store.transaction()?;
        let mut order = load_order(&tx, order_key)?;
        require_open(&order, "approve")?;

        if !partial {
            if !order.all_scanned() {
                return Err(unresolved_error(&order, "full approval requires every item scanned"));
            }
            let sub = finish(&tx, &mut order, false)?;
            tx.commit()?;
            self.finished(&order, sub);
            return Ok(order);
        }

        let decision = decision.ok_or_else(|| {
            ProvisionError::Validation("partial approval needs a decision".into())
        })?;
        match decision {
            CompletionDecision::WaitForComplete => {
                apply_decision(&tx, &mut order, decision, note)?;
                tx.commit()?;
                info!(order = %order.order_number, "order parked until stock arrives");
                Ok(order)
            }
            CompletionDecision::ContinuePartial => {
                apply_decision(&tx, &mut order, decision, note)?;
                for item in order.items.iter_mut().filter(|i| !i.status.is_resolved()) {
                    mark_missing(item, note);
                    store::orders::update_item(&tx, item)?;
                    store::boms::update_progress(
                        &tx,
                        &item.bom_item_id,
                        item.scanned_quantity,
                        item.missing_quantity,
                    )?;
                }
                let is_partial = !order.all_scanned();
                let sub = finish(&tx, &mut order, is_partial)?;
                tx.commit()?;
                self.finished(&order, sub);
                Ok(order)
            }
        }
    }

    /// Close an order whose items are all resolved
    pub fn complete(&self, order_key: &str) -> Result<CompletionOrder> {
        let tx = self.store.transaction()?;
        let mut order = load_order(&tx, order_key)?;
        require_open(&order, "complete")?;

        let partial = if order.all_scanned() {
            false
        } else if order.all_resolved()
            && order.decision == Some(CompletionDecision::ContinuePartial)
        {
            true
        } else {
            return Err(unresolved_error(
                &order,
                "every item must be scanned, or resolved with a CONTINUE_PARTIAL decision",
            ));
        };

        let sub = finish(&tx, &mut order, partial)?;
        tx.commit()?;
        self.finished(&order, sub);
        Ok(order)
    }

    /// Put items on a pallet, creating the pallet on first use
    pub fn assign_pallet(
        &self,
        order_key: &str,
        pallet_number: &str,
        items: &[String],
    ) -> Result<Pallet> {
        let pallet_number = pallet_number.trim();
        if pallet_number.is_empty() {
            return Err(ProvisionError::Validation("pallet number is empty".into()));
        }
        let tx = self.store.transaction()?;
        let mut order = load_order(&tx, order_key)?;

        let pallet = store::pallets::get_or_insert(
            &tx,
            &Pallet {
                id: EntityId::new(EntityPrefix::Pal),
                order_id: order.id,
                pallet_number: pallet_number.to_string(),
                created: Utc::now(),
                item_count: 0,
            },
        )?;
        for key in items {
            let item = find_item(&mut order, key)?;
            item.pallet_id = Some(pallet.id);
            store::orders::update_item(&tx, item)?;
        }
        let pallet = store::pallets::find(&tx, &order.id, pallet_number)?.unwrap_or(pallet);
        tx.commit()?;

        debug!(order = %order.order_number, pallet = pallet_number, items = items.len(), "items palletized");
        Ok(pallet)
    }

    pub fn list_pallets(&self, order_key: &str) -> Result<Vec<Pallet>> {
        let order = self.get_order(order_key)?;
        store::pallets::list(self.store.conn(), &order.id)
    }

    fn finished(&self, order: &CompletionOrder, sub: Subsystem) {
        info!(order = %order.order_number, partial = order.partial, "completion order finished");
        dispatch(
            self.notifier,
            ProvisioningEvent::CompletionFinished {
                order_number: order.order_number.clone(),
                subsystem_number: sub.subsystem_number,
                partial: order.partial,
            },
        );
    }
}

fn load_order(conn: &Connection, key: &str) -> Result<CompletionOrder> {
    store::orders::resolve(conn, key)?.ok_or_else(|| ProvisionError::not_found("CompletionOrder", key))
}

fn subsystem_of(conn: &Connection, order: &CompletionOrder) -> Result<Subsystem> {
    store::subsystems::get(conn, &order.subsystem_id)?
        .ok_or_else(|| ProvisionError::not_found("Subsystem", order.subsystem_id))
}

fn require_open(order: &CompletionOrder, action: &str) -> Result<()> {
    if !order.status.is_open() {
        return Err(ProvisionError::StateViolation(format!(
            "cannot {} order {}: it is {}",
            action, order.order_number, order.status
        )));
    }
    Ok(())
}

fn find_item<'o>(order: &'o mut CompletionOrder, key: &str) -> Result<&'o mut CompletionItem> {
    let number = order.order_number.clone();
    order
        .items
        .iter_mut()
        .find(|i| i.id.to_string() == key || i.part_number == key)
        .ok_or_else(|| ProvisionError::not_found("CompletionItem", format!("{} in {}", key, number)))
}

fn mark_missing(item: &mut CompletionItem, note: Option<&str>) {
    item.status = ItemStatus::Missing;
    item.missing_quantity = item.expected_quantity.saturating_sub(item.scanned_quantity);
    item.missing_note = note.map(str::to_string);
}

fn apply_decision(
    conn: &Connection,
    order: &mut CompletionOrder,
    decision: CompletionDecision,
    note: Option<&str>,
) -> Result<()> {
    order.decision = Some(decision);
    order.decision_note = note.map(str::to_string);

    if decision == CompletionDecision::WaitForComplete {
        order.status = OrderStatus::WaitingDecision;
        // Reopen shortages so arriving stock can be scanned
        for item in order.items.iter_mut().filter(|i| i.status == ItemStatus::Missing) {
            item.status = ItemStatus::from_progress(item.scanned_quantity, item.expected_quantity);
            item.missing_quantity = 0;
            store::orders::update_item(conn, item)?;
            store::boms::update_progress(conn, &item.bom_item_id, item.scanned_quantity, 0)?;
        }
    }
    store::orders::update(conn, order)
}

/// Stamp completion and move the subsystem on to prefabrication
fn finish(conn: &Connection, order: &mut CompletionOrder, partial: bool) -> Result<Subsystem> {
    order.status = OrderStatus::Completed;
    order.partial = partial;
    order.completed_at = Some(Utc::now());
    store::orders::update(conn, order)?;
    lifecycle::advance(
        conn,
        &order.subsystem_id,
        SubsystemStatus::InCompletion,
        SubsystemStatus::InPrefabrication,
    )
}

fn unresolved_error(order: &CompletionOrder, msg: &str) -> ProvisionError {
    let open: Vec<&str> = order
        .items
        .iter()
        .filter(|i| i.status != ItemStatus::Scanned)
        .map(|i| i.part_number.as_str())
        .collect();
    ProvisionError::StateViolation(format!(
        "order {}: {} (not scanned: {})",
        order.order_number,
        msg,
        open.join(", ")
    ))
}
