//! `sysprov completions` - shell completion scripts
//!
//! ```bash
//! eval "$(sysprov completions bash)"
//! sysprov completions fish > ~/.config/fish/completions/sysprov.fish
//! ```

use std::io;

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use miette::Result;

use crate::cli::Cli;

#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn run(args: CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "sysprov", &mut io::stdout());
    Ok(())
}
