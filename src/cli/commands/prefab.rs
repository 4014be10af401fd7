//! `sysprov prefab` - device prefabrication

use std::fs;
use std::path::PathBuf;

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{or_dash, Session};
use crate::cli::output::{field, print_record, rule, success, Listing};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::{DeviceRow, DeviceStatus, PrefabDevice};

#[derive(Subcommand, Debug)]
pub enum PrefabCommands {
    /// Show a prefabrication task
    Show(TaskKey),

    /// Per-device configuration sheet
    Devices(TaskKey),

    /// Record the serial number of a device
    Configure(ConfigureArgs),

    /// Mark a configured device as verified
    Verify(CheckArgs),

    /// Mark a configured device as failed
    Fail(CheckArgs),

    /// Close the task once every device is verified
    Complete(TaskKey),

    /// Render the label of a configured device
    Label(LabelArgs),
}

#[derive(clap::Args, Debug)]
pub struct TaskKey {
    /// Task number (PF-...) or ID
    pub task: String,
}

#[derive(clap::Args, Debug)]
pub struct ConfigureArgs {
    /// Task number (PF-...) or ID
    pub task: String,

    /// Assignment ID or hostname
    pub device: String,

    /// Device serial number
    pub serial: String,
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Task number (PF-...) or ID
    pub task: String,

    /// Assignment ID or hostname
    pub device: String,

    #[arg(long, short = 'n')]
    pub note: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct LabelArgs {
    /// Task number (PF-...) or ID
    pub task: String,

    /// Assignment ID or hostname
    pub device: String,

    /// Write the label to a file instead of stdout
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,
}

const DEVICES: Listing<'static, DeviceRow> = Listing {
    noun: "device",
    headers: &["HOSTNAME", "TYPE", "IP", "MASK", "GATEWAY", "NTP", "SERIAL", "STATUS"],
    row: |r| {
        vec![
            r.hostname.clone(),
            r.device_type.clone(),
            r.ip_address.to_string(),
            r.subnet_mask.to_string(),
            r.gateway.to_string(),
            r.ntp_server.to_string(),
            or_dash(r.serial_number.as_deref()),
            r.status.to_string(),
        ]
    },
    id: |r| r.assignment_id.to_string(),
};

pub fn run(cmd: PrefabCommands, global: &GlobalOpts) -> Result<()> {
    let session = Session::open()?;
    let prefab = session.prefab();
    match cmd {
        PrefabCommands::Show(args) => {
            let task = prefab.get_task(&args.task)?;
            let devices = prefab.device_table(&args.task)?;
            print_record(&task, global.output, &task.id.to_string(), |t| {
                let verified = devices
                    .iter()
                    .filter(|d| d.status == DeviceStatus::Verified)
                    .count();
                rule();
                field("Task", style(&t.task_number).yellow());
                field("Status", t.status);
                field("Devices", format!("{}/{} verified", verified, devices.len()));
                if let Some(started) = t.started_at {
                    field("Started", started.format("%Y-%m-%d %H:%M"));
                }
                if let Some(completed) = t.completed_at {
                    field("Completed", completed.format("%Y-%m-%d %H:%M"));
                }
                rule();
            })
        }
        PrefabCommands::Devices(args) => DEVICES.print(&prefab.device_table(&args.task)?, global.output),
        PrefabCommands::Configure(args) => {
            let id = session.resolve_task_device(&args.task, &args.device)?;
            let device = prefab.configure_device(&args.task, &id, &args.serial)?;
            print_device(&device, global.output, &args.device)
        }
        PrefabCommands::Verify(args) => {
            let id = session.resolve_task_device(&args.task, &args.device)?;
            let device = prefab.verify_device(&args.task, &id, true, args.note.as_deref())?;
            print_device(&device, global.output, &args.device)
        }
        PrefabCommands::Fail(args) => {
            let id = session.resolve_task_device(&args.task, &args.device)?;
            let device = prefab.verify_device(&args.task, &id, false, args.note.as_deref())?;
            print_device(&device, global.output, &args.device)
        }
        PrefabCommands::Complete(args) => {
            let task = prefab.complete_task(&args.task)?;
            print_record(&task, global.output, &task.id.to_string(), |t| {
                success(format!(
                    "Task {} completed, subsystem ready for deployment",
                    style(&t.task_number).cyan()
                ));
            })
        }
        PrefabCommands::Label(args) => {
            let id = session.resolve_task_device(&args.task, &args.device)?;
            let label = prefab.render_label(&args.task, &id)?;
            match args.file {
                Some(path) => {
                    fs::write(&path, &label).into_diagnostic()?;
                    success(format!("Label written to {}", path.display()));
                }
                None => print!("{}", label),
            }
            Ok(())
        }
    }
}

fn print_device(device: &PrefabDevice, format: OutputFormat, name: &str) -> Result<()> {
    print_record(device, format, &device.id.to_string(), |d| {
        let mut line = format!("{} {}", style(name).cyan(), d.status);
        if let Some(note) = &d.note {
            line.push_str(&format!(" ({})", note));
        }
        if d.status == DeviceStatus::Failed {
            println!("{} {}", style("✗").red(), line);
        } else {
            success(line);
        }
    })
}
