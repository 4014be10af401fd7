//! `sysprov net` - network pools, allocations and device addresses

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{or_dash, Session};
use crate::cli::output::{field, print_record, rule, success, Listing};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::network::DeviceRequest;
use crate::entities::{DeviceCategory, IpMatrixRow, NetworkAllocation, NetworkPool};

#[derive(Subcommand, Debug)]
pub enum NetCommands {
    /// Register an address pool
    PoolNew(PoolNewArgs),

    /// List pools in allocation order
    Pools,

    /// Make a pool available for new allocations
    PoolEnable(PoolKey),

    /// Stop carving new ranges from a pool
    PoolDisable(PoolKey),

    /// Allocate the network of a subsystem
    Allocate(SubsystemKey),

    /// List allocations
    Allocations(AllocationsArgs),

    /// Per-device address sheet of a subsystem
    Matrix(SubsystemKey),

    /// Add an ad-hoc device to an allocated subsystem
    Assign(AssignArgs),

    /// Record the serial number of a configured device
    Configure(ConfigureArgs),

    /// Mark a configured device as verified
    Verify(DeviceArgs),
}

#[derive(clap::Args, Debug)]
pub struct PoolNewArgs {
    /// Pool name (unique)
    pub name: String,

    /// Address range, e.g. 10.20.0.0/16 (prefix at most /24)
    pub cidr: String,

    /// Lower values are used first
    #[arg(long, short = 'p', default_value_t = 100)]
    pub priority: i32,

    #[arg(long, short = 'd')]
    pub description: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct PoolKey {
    /// Pool name or ID
    pub pool: String,
}

#[derive(clap::Args, Debug)]
pub struct SubsystemKey {
    /// Subsystem number or ID
    pub subsystem: String,
}

#[derive(clap::Args, Debug)]
pub struct AllocationsArgs {
    /// Only allocations carved from this pool
    #[arg(long, short = 'p')]
    pub pool: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct AssignArgs {
    /// Subsystem number or ID
    pub subsystem: String,

    /// Device category, e.g. camera, switch, access_controller
    #[arg(long, short = 'c')]
    pub category: DeviceCategory,

    /// Device type / model
    #[arg(long = "type", short = 't')]
    pub device_type: String,

    /// Hostname (derived from the category when omitted)
    #[arg(long)]
    pub hostname: Option<String>,

    #[arg(long, short = 'd')]
    pub description: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ConfigureArgs {
    /// Subsystem number or ID
    pub subsystem: String,

    /// Assignment ID or hostname
    pub device: String,

    /// Device serial number
    pub serial: String,
}

#[derive(clap::Args, Debug)]
pub struct DeviceArgs {
    /// Subsystem number or ID
    pub subsystem: String,

    /// Assignment ID or hostname
    pub device: String,
}

const POOLS: Listing<'static, NetworkPool> = Listing {
    noun: "pool",
    headers: &["NAME", "CIDR", "PRIORITY", "ACTIVE", "DESCRIPTION"],
    row: |p| {
        vec![
            p.name.clone(),
            p.cidr.to_string(),
            p.priority.to_string(),
            if p.is_active { "yes" } else { "no" }.to_string(),
            or_dash(p.description.as_deref()),
        ]
    },
    id: |p| p.id.to_string(),
};

const ALLOCATIONS: Listing<'static, NetworkAllocation> = Listing {
    noun: "allocation",
    headers: &["ID", "CIDR", "GATEWAY", "USED", "TOTAL", "SHARED"],
    row: |a| {
        vec![
            a.id.to_string(),
            a.cidr.to_string(),
            a.gateway.to_string(),
            a.used_hosts.to_string(),
            a.total_hosts.to_string(),
            if a.shared_from.is_some() { "yes" } else { "" }.to_string(),
        ]
    },
    id: |a| a.id.to_string(),
};

const MATRIX: Listing<'static, IpMatrixRow> = Listing {
    noun: "device",
    headers: &[
        "HOSTNAME", "CATEGORY", "TYPE", "IP", "MASK", "GATEWAY", "NTP", "SERIAL", "STATUS",
    ],
    row: |r| {
        vec![
            r.hostname.clone(),
            r.category.to_string(),
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

pub fn run(cmd: NetCommands, global: &GlobalOpts) -> Result<()> {
    let session = Session::open()?;
    let net = session.net();
    match cmd {
        NetCommands::PoolNew(args) => {
            let pool = net.create_pool(
                &args.name,
                &args.cidr,
                args.priority,
                args.description.as_deref(),
            )?;
            print_record(&pool, global.output, &pool.id.to_string(), |p| {
                success(format!(
                    "Created pool {} {} (priority {})",
                    style(&p.name).cyan(),
                    p.cidr,
                    p.priority
                ));
            })
        }
        NetCommands::Pools => POOLS.print(&net.list_pools()?, global.output),
        NetCommands::PoolEnable(args) => set_pool(&session, &args.pool, true, global),
        NetCommands::PoolDisable(args) => set_pool(&session, &args.pool, false, global),
        NetCommands::Allocate(args) => {
            let alloc = net.allocate_network(&args.subsystem)?;
            print_record(&alloc, global.output, &alloc.id.to_string(), |a| {
                let how = if a.shared_from.is_some() { "shared" } else { "carved" };
                success(format!(
                    "Allocated {} to {} ({}), {} device(s)",
                    style(a.cidr).cyan(),
                    style(&args.subsystem).yellow(),
                    how,
                    a.used_hosts
                ));
                field("Gateway", a.gateway);
                field("Mask", a.subnet_mask);
                field("NTP", a.ntp_server);
            })
        }
        NetCommands::Allocations(args) => {
            let allocations = net.list_allocations(args.pool.as_deref())?;
            ALLOCATIONS.print(&allocations, global.output)
        }
        NetCommands::Matrix(args) => {
            let rows = net.ip_matrix(&args.subsystem)?;
            if global.output == OutputFormat::Auto {
                let alloc = net.get_allocation(&args.subsystem)?;
                rule();
                field("Network", style(alloc.cidr).cyan());
                field("Hosts", format!("{}/{}", alloc.used_hosts, alloc.total_hosts));
                rule();
            }
            MATRIX.print(&rows, global.output)
        }
        NetCommands::Assign(args) => {
            let request = DeviceRequest {
                category: args.category,
                device_type: args.device_type,
                hostname: args.hostname,
                description: args.description,
            };
            let assignment = net.assign_device(&args.subsystem, &request)?;
            print_record(&assignment, global.output, &assignment.id.to_string(), |a| {
                success(format!(
                    "Assigned {} to {}",
                    style(a.ip_address).cyan(),
                    style(&a.hostname).yellow()
                ));
            })
        }
        NetCommands::Configure(args) => {
            let id = session.resolve_device(&args.subsystem, &args.device)?;
            let assignment = net.configure_assignment(&id, &args.serial, Some(session.author()))?;
            print_record(&assignment, global.output, &assignment.id.to_string(), |a| {
                success(format!(
                    "{} configured with S/N {}",
                    style(&a.hostname).cyan(),
                    args.serial
                ));
            })
        }
        NetCommands::Verify(args) => {
            let id = session.resolve_device(&args.subsystem, &args.device)?;
            let assignment = net.verify_assignment(&id)?;
            print_record(&assignment, global.output, &assignment.id.to_string(), |a| {
                success(format!("{} verified", style(&a.hostname).cyan()));
            })
        }
    }
}

fn set_pool(session: &Session, key: &str, active: bool, global: &GlobalOpts) -> Result<()> {
    let pool = session.net().set_pool_active(key, active)?;
    print_record(&pool, global.output, &pool.id.to_string(), |p| {
        let state = if p.is_active { "enabled" } else { "disabled" };
        success(format!("Pool {} {}", style(&p.name).cyan(), state));
    })
}
