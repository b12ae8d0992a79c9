//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`validate`], or [`health`]. Each
//! handler lives in its own submodule.

pub mod health;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::StratumError;

pub async fn dispatch(cli: Cli) -> Result<(), StratumError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Validate(ref args)) => validate::execute(args).await,
        Some(Commands::Health(args)) => health::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  stratum v{version}, read-only HTTP gateway over databases and APIs\n\n  \
         No command provided. To get started:\n\n    \
         stratum run -c stratum.yaml       Start with a config file\n    \
         stratum run                       Start from PROJECT_{{n}}_* env vars\n    \
         stratum validate -c stratum.yaml  Check a config without starting\n    \
         stratum --help                    See all commands and options\n"
    );
}
