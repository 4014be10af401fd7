//! `sysprov init` - create a project

use std::path::PathBuf;

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::Session;
use crate::cli::output::success;
use crate::core::project::Project;
use crate::core::store::SCHEMA_VERSION;

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (defaults to the current directory)
    pub path: Option<PathBuf>,
}

pub fn run(args: InitArgs) -> Result<()> {
    let root = match args.path {
        Some(path) => path,
        None => std::env::current_dir().into_diagnostic()?,
    };

    let project = Project::init(&root).map_err(|e| miette::miette!("{}", e))?;
    let session = Session::for_project(project)?;

    success(format!(
        "Initialized sysprov project in {}",
        style(session.project.root().display()).cyan()
    ));
    println!(
        "  database: {} (schema v{})",
        session.config.database_path(&session.project).display(),
        SCHEMA_VERSION
    );
    println!("  config:   {}", session.project.config_path().display());
    Ok(())
}
