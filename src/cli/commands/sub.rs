//! `sysprov sub` - subsystems and their lifecycle

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{confirm, Session};
use crate::cli::output::{field, print_record, rule, success, Listing};
use crate::cli::GlobalOpts;
use crate::core::registry::NewSubsystem;
use crate::entities::{Subsystem, SubsystemStatus};

#[derive(Subcommand, Debug)]
pub enum SubCommands {
    /// Register a subsystem under a contract
    New(NewArgs),

    /// List subsystems
    List(ListArgs),

    /// Show a subsystem with its provisioning progress
    Show(KeyArgs),

    /// Cancel a subsystem (only before its BOM is generated)
    Cancel(CancelArgs),

    /// Mark a prefabricated subsystem as deployed
    Deploy(KeyArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Subsystem number (unique)
    pub number: String,

    /// Owning contract (number or ID)
    #[arg(long, short = 'c')]
    pub contract: String,

    /// Display name
    #[arg(long, short = 'n')]
    pub name: String,

    /// System type, e.g. video, access, intercom
    #[arg(long = "type", short = 't')]
    pub system_type: String,

    /// Number of identical installations
    #[arg(long, short = 'q', default_value_t = 1)]
    pub quantity: u32,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only subsystems of this contract
    #[arg(long, short = 'c')]
    pub contract: Option<String>,

    /// Only subsystems in this status (e.g. IP_ALLOCATED)
    #[arg(long, short = 's')]
    pub status: Option<SubsystemStatus>,
}

#[derive(clap::Args, Debug)]
pub struct KeyArgs {
    /// Subsystem number or ID
    pub subsystem: String,
}

#[derive(clap::Args, Debug)]
pub struct CancelArgs {
    /// Subsystem number or ID
    pub subsystem: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

const LISTING: Listing<'static, Subsystem> = Listing {
    noun: "subsystem",
    headers: &["NUMBER", "NAME", "TYPE", "QTY", "STATUS"],
    row: |s| {
        vec![
            s.subsystem_number.clone(),
            s.name.clone(),
            s.system_type.clone(),
            s.quantity.to_string(),
            s.status.to_string(),
        ]
    },
    id: |s| s.id.to_string(),
};

pub fn run(cmd: SubCommands, global: &GlobalOpts) -> Result<()> {
    let session = Session::open()?;
    match cmd {
        SubCommands::New(args) => run_new(&session, args, global),
        SubCommands::List(args) => {
            let subs = session
                .registry()
                .list_subsystems(args.contract.as_deref(), args.status)?;
            LISTING.print(&subs, global.output)
        }
        SubCommands::Show(args) => run_show(&session, args, global),
        SubCommands::Cancel(args) => run_cancel(&session, args, global),
        SubCommands::Deploy(args) => {
            let sub = session.registry().mark_deployed(&args.subsystem)?;
            print_record(&sub, global.output, &sub.id.to_string(), |s| {
                success(format!("Subsystem {} deployed", style(&s.subsystem_number).cyan()));
            })
        }
    }
}

fn run_new(session: &Session, args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let sub = session.registry().create_subsystem(&NewSubsystem {
        contract: args.contract,
        subsystem_number: args.number,
        name: args.name,
        system_type: args.system_type,
        quantity: args.quantity,
    })?;
    print_record(&sub, global.output, &sub.id.to_string(), |s| {
        success(format!(
            "Created subsystem {} ({} x{})",
            style(&s.subsystem_number).cyan(),
            s.system_type,
            s.quantity
        ));
    })
}

fn run_show(session: &Session, args: KeyArgs, global: &GlobalOpts) -> Result<()> {
    let sub = session.registry().get_subsystem(&args.subsystem)?;
    let contract = session.registry().get_contract(&sub.contract_id.to_string())?;

    print_record(&sub, global.output, &sub.id.to_string(), |s| {
        rule();
        field("ID", style(&s.id).cyan());
        field("Number", style(&s.subsystem_number).yellow());
        field("Name", &s.name);
        field("Contract", &contract.contract_number);
        field("Type", &s.system_type);
        field("Quantity", s.quantity);
        field("Status", style(s.status).green());
        let next: Vec<String> = s
            .status
            .allowed_transitions()
            .iter()
            .map(|t| t.to_string())
            .collect();
        if !next.is_empty() {
            field("Next", next.join(" | "));
        }
        rule();
        println!(
            "{}: {} | {}: {}",
            style("Created").dim(),
            s.created.format("%Y-%m-%d %H:%M"),
            style("Updated").dim(),
            s.updated.format("%Y-%m-%d %H:%M")
        );
    })
}

fn run_cancel(session: &Session, args: CancelArgs, global: &GlobalOpts) -> Result<()> {
    let registry = session.registry();
    let sub = registry.get_subsystem(&args.subsystem)?;
    let prompt = format!("Cancel subsystem {}? This cannot be undone", sub.subsystem_number);
    if !confirm(&prompt, args.yes)? {
        println!("{}", style("Aborted.").dim());
        return Ok(());
    }
    let sub = registry.cancel_subsystem(&args.subsystem)?;
    print_record(&sub, global.output, &sub.id.to_string(), |s| {
        success(format!("Subsystem {} cancelled", style(&s.subsystem_number).cyan()));
    })
}
