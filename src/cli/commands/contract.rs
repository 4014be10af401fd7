//! `sysprov contract` - contract management

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{or_dash, Session};
use crate::cli::output::{field, print_record, rule, success, Listing};
use crate::cli::GlobalOpts;
use crate::entities::Contract;

#[derive(Subcommand, Debug)]
pub enum ContractCommands {
    /// Register a contract
    New(NewArgs),

    /// List contracts
    List,

    /// Show a contract and its subsystems
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Contract number (unique)
    pub number: String,

    /// Contract name
    #[arg(long, short = 'n')]
    pub name: String,

    /// Responsible project manager
    #[arg(long)]
    pub pm: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Contract number or ID
    pub contract: String,
}

const LISTING: Listing<'static, Contract> = Listing {
    noun: "contract",
    headers: &["NUMBER", "NAME", "PM", "CREATED"],
    row: |c| {
        vec![
            c.contract_number.clone(),
            c.name.clone(),
            or_dash(c.project_manager.as_deref()),
            c.created.format("%Y-%m-%d").to_string(),
        ]
    },
    id: |c| c.id.to_string(),
};

pub fn run(cmd: ContractCommands, global: &GlobalOpts) -> Result<()> {
    let session = Session::open()?;
    match cmd {
        ContractCommands::New(args) => run_new(&session, args, global),
        ContractCommands::List => LISTING.print(&session.registry().list_contracts()?, global.output),
        ContractCommands::Show(args) => run_show(&session, args, global),
    }
}

fn run_new(session: &Session, args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let contract = session
        .registry()
        .create_contract(&args.number, &args.name, args.pm.as_deref())?;
    print_record(&contract, global.output, &contract.id.to_string(), |c| {
        success(format!(
            "Created contract {} {}",
            style(&c.contract_number).cyan(),
            style(&c.name).yellow()
        ));
    })
}

fn run_show(session: &Session, args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let registry = session.registry();
    let contract = registry.get_contract(&args.contract)?;
    let subsystems = registry.list_subsystems(Some(&args.contract), None)?;

    print_record(&contract, global.output, &contract.id.to_string(), |c| {
        rule();
        field("ID", style(&c.id).cyan());
        field("Number", style(&c.contract_number).yellow());
        field("Name", &c.name);
        field("PM", or_dash(c.project_manager.as_deref()));
        field("Created", c.created.format("%Y-%m-%d %H:%M"));
        rule();
        if subsystems.is_empty() {
            println!("{}", style("No subsystems yet.").dim());
        }
        for sub in &subsystems {
            println!(
                "  • {} {} [{}] x{} {}",
                style(&sub.subsystem_number).cyan(),
                sub.name,
                sub.system_type,
                sub.quantity,
                style(sub.status).dim()
            );
        }
    })
}
