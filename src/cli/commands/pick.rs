//! `sysprov pick` - warehouse pick reconciliation

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{or_dash, truncate_str, Session};
use crate::cli::output::{field, print_record, render_table, rule, success, Listing};
use crate::cli::GlobalOpts;
use crate::core::completion::{CompletionReconciler, Scan};
use crate::entities::{CompletionItem, CompletionOrder, OrderStatus, Pallet, ScanRecord};

#[derive(Subcommand, Debug)]
pub enum PickCommands {
    /// Open the completion order of an allocated subsystem
    New(SubsystemKey),

    /// List completion orders
    List(ListArgs),

    /// Show an order with its items
    Show(ShowArgs),

    /// Record a barcode scan
    Scan(ScanArgs),

    /// Report items that cannot be picked
    Missing(MissingArgs),

    /// Put items on a pallet
    Pallet(PalletArgs),

    /// List the pallets of an order
    Pallets(OrderKey),

    /// Record how to proceed with an incomplete order
    Decision(DecisionArgs),

    /// Approve an order, optionally as partial
    Approve(ApproveArgs),

    /// Close an order whose items are all resolved
    Complete(OrderKey),

    /// Hand a completed order over to prefabrication
    Prefab(OrderKey),
}

#[derive(clap::Args, Debug)]
pub struct SubsystemKey {
    /// Subsystem number or ID
    pub subsystem: String,
}

#[derive(clap::Args, Debug)]
pub struct OrderKey {
    /// Order number (CO-...) or ID
    pub order: String,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only orders in this status
    #[arg(long, short = 's')]
    pub status: Option<OrderStatus>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Order number (CO-...) or ID
    pub order: String,

    /// Include the scan log
    #[arg(long)]
    pub scans: bool,
}

#[derive(clap::Args, Debug)]
pub struct ScanArgs {
    /// Order number (CO-...) or ID
    pub order: String,

    /// Scanned barcode (part number)
    pub barcode: String,

    /// Quantity on the scanned package
    #[arg(long, short = 'q', default_value_t = 1)]
    pub quantity: u32,

    /// Serial number of a serialized unit
    #[arg(long, short = 's')]
    pub serial: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct MissingArgs {
    /// Order number (CO-...) or ID
    pub order: String,

    /// Items (part number or item ID)
    #[arg(required = true)]
    pub items: Vec<String>,

    #[arg(long, short = 'n')]
    pub note: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct PalletArgs {
    /// Order number (CO-...) or ID
    pub order: String,

    /// Pallet number
    pub pallet: String,

    /// Items (part number or item ID)
    #[arg(required = true)]
    pub items: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct DecisionArgs {
    /// Order number (CO-...) or ID
    pub order: String,

    /// CONTINUE_PARTIAL or WAIT_FOR_COMPLETE
    pub decision: String,

    #[arg(long, short = 'n')]
    pub note: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ApproveArgs {
    /// Order number (CO-...) or ID
    pub order: String,

    /// Approve with missing items
    #[arg(long)]
    pub partial: bool,

    /// Decision for a partial approval (CONTINUE_PARTIAL or WAIT_FOR_COMPLETE)
    #[arg(long, short = 'd', requires = "partial")]
    pub decision: Option<String>,

    #[arg(long, short = 'n')]
    pub note: Option<String>,
}

const ORDERS: Listing<'static, CompletionOrder> = Listing {
    noun: "order",
    headers: &["NUMBER", "STATUS", "ITEMS", "DECISION", "PARTIAL", "CREATED"],
    row: |o| {
        vec![
            o.order_number.clone(),
            o.status.to_string(),
            o.items.len().to_string(),
            o.decision.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
            if o.partial { "yes" } else { "" }.to_string(),
            o.created.format("%Y-%m-%d").to_string(),
        ]
    },
    id: |o| o.id.to_string(),
};

const ITEM_HEADERS: &[&str] = &["#", "PART", "NAME", "EXPECTED", "SCANNED", "MISSING", "STATUS"];

fn item_row(item: &CompletionItem) -> Vec<String> {
    vec![
        item.sequence.to_string(),
        item.part_number.clone(),
        truncate_str(&item.name, 32),
        item.expected_quantity.to_string(),
        item.scanned_quantity.to_string(),
        item.missing_quantity.to_string(),
        item.status.to_string(),
    ]
}

const PALLETS: Listing<'static, Pallet> = Listing {
    noun: "pallet",
    headers: &["PALLET", "ITEMS", "CREATED"],
    row: |p| {
        vec![
            p.pallet_number.clone(),
            p.item_count.to_string(),
            p.created.format("%Y-%m-%d %H:%M").to_string(),
        ]
    },
    id: |p| p.id.to_string(),
};

const SCANS: Listing<'static, ScanRecord> = Listing {
    noun: "scan",
    headers: &["TIME", "BARCODE", "QTY", "ACCEPTED", "SERIAL", "BY"],
    row: |s| {
        vec![
            s.scanned_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            s.barcode.clone(),
            s.quantity.to_string(),
            s.accepted.to_string(),
            or_dash(s.serial_number.as_deref()),
            or_dash(s.scanned_by.as_deref()),
        ]
    },
    id: |s| s.id.to_string(),
};

pub fn run(cmd: PickCommands, global: &GlobalOpts) -> Result<()> {
    let session = Session::open()?;
    let pick = session.pick();
    match cmd {
        PickCommands::New(args) => {
            let order = pick.create_order(&args.subsystem)?;
            print_record(&order, global.output, &order.id.to_string(), |o| {
                success(format!(
                    "Opened order {} with {} item(s)",
                    style(&o.order_number).cyan(),
                    o.items.len()
                ));
            })
        }
        PickCommands::List(args) => ORDERS.print(&pick.list_orders(args.status)?, global.output),
        PickCommands::Show(args) => {
            let order = pick.get_order(&args.order)?;
            let scans = if args.scans { pick.scans(&args.order)? } else { Vec::new() };
            print_record(&order, global.output, &order.id.to_string(), |o| {
                print_order(o);
                if args.scans {
                    println!();
                    println!("{}", render_table(SCANS.headers, scans.iter().map(SCANS.row)));
                }
            })
        }
        PickCommands::Scan(args) => {
            let mut scan = Scan::new(&args.barcode, args.quantity);
            if let Some(serial) = &args.serial {
                scan = scan.with_serial(serial);
            }
            let outcome = pick.scan(&args.order, &scan)?;
            print_record(&outcome.item, global.output, &outcome.item.id.to_string(), |item| {
                let clamped = if outcome.accepted < args.quantity {
                    format!(" ({} over expected, ignored)", args.quantity - outcome.accepted)
                } else {
                    String::new()
                };
                success(format!(
                    "{} {}/{} {}{}",
                    style(&item.part_number).cyan(),
                    item.scanned_quantity,
                    item.expected_quantity,
                    item.status,
                    clamped
                ));
                println!("  order: {}", outcome.order_status);
            })
        }
        PickCommands::Missing(args) => {
            let order = pick.report_missing(&args.order, &args.items, args.note.as_deref())?;
            print_record(&order, global.output, &order.id.to_string(), |o| {
                success(format!(
                    "Reported {} item(s) missing on {}",
                    args.items.len(),
                    style(&o.order_number).cyan()
                ));
                println!("  order: {}", o.status);
            })
        }
        PickCommands::Pallet(args) => {
            let pallet = pick.assign_pallet(&args.order, &args.pallet, &args.items)?;
            print_record(&pallet, global.output, &pallet.id.to_string(), |p| {
                success(format!(
                    "Pallet {} now holds {} item(s)",
                    style(&p.pallet_number).cyan(),
                    p.item_count
                ));
            })
        }
        PickCommands::Pallets(args) => PALLETS.print(&pick.list_pallets(&args.order)?, global.output),
        PickCommands::Decision(args) => {
            let decision = CompletionReconciler::parse_decision(&args.decision)?;
            let order = pick.record_decision(&args.order, decision, args.note.as_deref())?;
            print_record(&order, global.output, &order.id.to_string(), |o| {
                success(format!(
                    "Recorded {} on {}",
                    decision,
                    style(&o.order_number).cyan()
                ));
                println!("  order: {}", o.status);
            })
        }
        PickCommands::Approve(args) => {
            let decision = args
                .decision
                .as_deref()
                .map(CompletionReconciler::parse_decision)
                .transpose()?;
            let order = pick.approve(&args.order, args.partial, decision, args.note.as_deref())?;
            print_record(&order, global.output, &order.id.to_string(), print_closed)
        }
        PickCommands::Complete(args) => {
            let order = pick.complete(&args.order)?;
            print_record(&order, global.output, &order.id.to_string(), print_closed)
        }
        PickCommands::Prefab(args) => {
            let task = session.prefab().create_task(&args.order)?;
            print_record(&task, global.output, &task.id.to_string(), |t| {
                success(format!(
                    "Opened prefabrication task {}",
                    style(&t.task_number).cyan()
                ));
            })
        }
    }
}

fn print_closed(order: &CompletionOrder) {
    match order.status {
        OrderStatus::Completed => {
            let how = if order.partial { "partially" } else { "fully" };
            success(format!(
                "Order {} {} completed",
                style(&order.order_number).cyan(),
                how
            ));
        }
        status => println!(
            "{} order {} is {}",
            style("!").yellow(),
            style(&order.order_number).cyan(),
            status
        ),
    }
}

fn print_order(order: &CompletionOrder) {
    rule();
    field("Order", style(&order.order_number).yellow());
    field("Status", order.status);
    if let Some(decision) = order.decision {
        field("Decision", decision);
    }
    if let Some(note) = &order.decision_note {
        field("Note", note);
    }
    if order.status == OrderStatus::Completed {
        field("Partial", order.partial);
    }
    rule();
    println!("{}", render_table(ITEM_HEADERS, order.items.iter().map(item_row)));
}
