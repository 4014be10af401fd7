use clap::Parser;
use miette::Result;
use sysprov::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Install miette's fancy error handler for beautiful diagnostics
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let global = &cli.global;
    match cli.command {
        Commands::Init(args) => sysprov::cli::commands::init::run(args),
        Commands::Contract(cmd) => sysprov::cli::commands::contract::run(cmd, global),
        Commands::Sub(cmd) => sysprov::cli::commands::sub::run(cmd, global),
        Commands::Bom(cmd) => sysprov::cli::commands::bom::run(cmd, global),
        Commands::Net(cmd) => sysprov::cli::commands::net::run(cmd, global),
        Commands::Pick(cmd) => sysprov::cli::commands::pick::run(cmd, global),
        Commands::Prefab(cmd) => sysprov::cli::commands::prefab::run(cmd, global),
        Commands::Completions(args) => sysprov::cli::commands::completions::run(args),
    }
}

/// `SYSPROV_LOG` wins; otherwise `-v` / `-vv` raise the default `warn`
fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("SYSPROV_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
