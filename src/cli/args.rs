//! Top-level argument definitions

use clap::{Parser, Subcommand, ValueEnum};

use crate::cli::commands::{
    bom::BomCommands, completions::CompletionsArgs, contract::ContractCommands, init::InitArgs,
    net::NetCommands, pick::PickCommands, prefab::PrefabCommands, sub::SubCommands,
};

#[derive(Parser, Debug)]
#[command(name = "sysprov")]
#[command(author, version, about = "Subsystem provisioning toolkit")]
#[command(
    long_about = "Takes a security/telecom subsystem from contract intake to deployment: \
BOM generation, IP allocation, warehouse pick reconciliation and device prefabrication."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "auto")]
    pub output: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Table for lists, a summary for single records
    #[default]
    Auto,
    /// Bordered table
    Table,
    /// Tab-separated values
    Tsv,
    Json,
    Yaml,
    /// IDs only, one per line
    Id,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a sysprov project in the current directory
    Init(InitArgs),

    /// Contracts
    #[command(subcommand)]
    Contract(ContractCommands),

    /// Subsystems and their lifecycle
    #[command(subcommand)]
    Sub(SubCommands),

    /// BOM templates and generated BOMs
    #[command(subcommand)]
    Bom(BomCommands),

    /// Network pools, allocations and device addresses
    #[command(subcommand)]
    Net(NetCommands),

    /// Warehouse pick reconciliation (completion orders)
    #[command(subcommand)]
    Pick(PickCommands),

    /// Device prefabrication
    #[command(subcommand)]
    Prefab(PrefabCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}
