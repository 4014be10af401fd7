//! `sysprov bom` - BOM templates and generated BOMs

use std::fs::File;
use std::path::PathBuf;

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::Session;
use crate::cli::output::{field, print_record, render_table, rule, success, Listing};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::bom_engine::TemplateImport;
use crate::entities::{BomTemplate, BomTemplateItem, GeneratedBomItem};

#[derive(Subcommand, Debug)]
pub enum BomCommands {
    /// Import a template from a `;`-separated CSV (number;name;quantity[;part number])
    Import(ImportArgs),

    /// List templates
    Templates(TemplatesArgs),

    /// Show a template with its items
    Template(TemplateKey),

    /// Re-enable a template for generation
    Activate(TemplateKey),

    /// Exclude a template from generation
    Deactivate(TemplateKey),

    /// Generate the BOM of a subsystem
    Generate(GenerateArgs),

    /// Show the generated BOM of a subsystem
    Show(SubsystemKey),

    /// Items of a generated BOM that need an IP address
    NetworkDevices(SubsystemKey),
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// CSV file
    pub file: PathBuf,

    /// Template code (unique)
    #[arg(long)]
    pub code: String,

    /// Template name
    #[arg(long, short = 'n')]
    pub name: String,

    /// System type the template applies to
    #[arg(long = "type", short = 't')]
    pub system_type: String,

    /// Template version
    #[arg(long, default_value_t = 1)]
    pub version: u32,
}

#[derive(clap::Args, Debug)]
pub struct TemplatesArgs {
    /// Only templates for this system type
    #[arg(long = "type", short = 't')]
    pub system_type: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct TemplateKey {
    /// Template code or ID
    pub template: String,
}

#[derive(clap::Args, Debug)]
pub struct GenerateArgs {
    /// Subsystem number or ID
    pub subsystem: String,

    /// Use this template instead of the latest active one for the system type
    #[arg(long)]
    pub template: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct SubsystemKey {
    /// Subsystem number or ID
    pub subsystem: String,
}

const TEMPLATES: Listing<'static, BomTemplate> = Listing {
    noun: "template",
    headers: &["CODE", "NAME", "TYPE", "VERSION", "ACTIVE", "ITEMS"],
    row: |t| {
        vec![
            t.code.clone(),
            t.name.clone(),
            t.system_type.clone(),
            t.version.to_string(),
            if t.is_active { "yes" } else { "no" }.to_string(),
            t.items.len().to_string(),
        ]
    },
    id: |t| t.id.to_string(),
};

const TEMPLATE_ITEMS: Listing<'static, BomTemplateItem> = Listing {
    noun: "item",
    headers: &["#", "NAME", "PART", "QTY", "CATEGORY", "IP"],
    row: |i| {
        vec![
            i.sequence.to_string(),
            i.name.clone(),
            i.part_number.clone(),
            i.quantity.to_string(),
            i.category.to_string(),
            if i.requires_ip { "yes" } else { "" }.to_string(),
        ]
    },
    id: |i| i.id.to_string(),
};

const BOM_ITEMS: Listing<'static, GeneratedBomItem> = Listing {
    noun: "item",
    headers: &["#", "NAME", "PART", "QTY", "SCANNED", "MISSING", "CATEGORY", "IP"],
    row: |i| {
        vec![
            i.sequence.to_string(),
            i.name.clone(),
            i.part_number.clone(),
            i.quantity.to_string(),
            i.scanned_quantity.to_string(),
            i.missing_quantity.to_string(),
            i.category.to_string(),
            if i.requires_ip { "yes" } else { "" }.to_string(),
        ]
    },
    id: |i| i.id.to_string(),
};

pub fn run(cmd: BomCommands, global: &GlobalOpts) -> Result<()> {
    let session = Session::open()?;
    let engine = session.bom();
    match cmd {
        BomCommands::Import(args) => {
            let file = File::open(&args.file).into_diagnostic()?;
            let header = TemplateImport::new(args.code, args.name, args.system_type)
                .with_version(args.version);
            let template = engine.import_csv(&header, file)?;
            print_record(&template, global.output, &template.id.to_string(), |t| {
                success(format!(
                    "Imported template {} v{} with {} item(s)",
                    style(&t.code).cyan(),
                    t.version,
                    t.items.len()
                ));
            })
        }
        BomCommands::Templates(args) => {
            let templates = engine.list_templates(args.system_type.as_deref())?;
            TEMPLATES.print(&templates, global.output)
        }
        BomCommands::Template(args) => {
            let template = engine.get_template(&args.template)?;
            if matches!(global.output, OutputFormat::Auto | OutputFormat::Table) {
                rule();
                field("Code", style(&template.code).yellow());
                field("Name", &template.name);
                field("Type", &template.system_type);
                field("Version", template.version);
                field("Active", template.is_active);
                rule();
                return TEMPLATE_ITEMS.print(&template.items, global.output);
            }
            print_record(&template, global.output, &template.id.to_string(), |_| {})
        }
        BomCommands::Activate(args) => set_active(&session, &args.template, true, global),
        BomCommands::Deactivate(args) => set_active(&session, &args.template, false, global),
        BomCommands::Generate(args) => {
            let bom = engine.generate(&args.subsystem, args.template.as_deref())?;
            print_record(&bom, global.output, &bom.id.to_string(), |b| {
                let units: u32 = b.items.iter().map(|i| i.quantity).sum();
                success(format!(
                    "Generated BOM for {} from {} v{}: {} line(s), {} unit(s)",
                    style(&args.subsystem).cyan(),
                    b.template_code,
                    b.template_version,
                    b.items.len(),
                    units
                ));
            })
        }
        BomCommands::Show(args) => {
            let bom = engine.get_generated_bom(&args.subsystem)?;
            if matches!(global.output, OutputFormat::Auto | OutputFormat::Table) {
                println!(
                    "{} {} ({} v{})",
                    style("BOM").bold(),
                    style(&args.subsystem).cyan(),
                    bom.template_code,
                    bom.template_version
                );
                println!(
                    "{}",
                    render_table(BOM_ITEMS.headers, bom.items.iter().map(BOM_ITEMS.row))
                );
                return Ok(());
            }
            print_record(&bom, global.output, &bom.id.to_string(), |_| {})
        }
        BomCommands::NetworkDevices(args) => {
            let bom = engine.get_generated_bom(&args.subsystem)?;
            let devices = engine.network_devices(&bom.id)?;
            BOM_ITEMS.print(&devices, global.output)
        }
    }
}

fn set_active(session: &Session, key: &str, active: bool, global: &GlobalOpts) -> Result<()> {
    let template = session.bom().set_template_active(key, active)?;
    print_record(&template, global.output, &template.id.to_string(), |t| {
        let state = if t.is_active { "activated" } else { "deactivated" };
        success(format!("Template {} v{} {}", style(&t.code).cyan(), t.version, state));
    })
}
