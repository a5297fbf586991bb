//! CLI entry point.
//!
//! Loads `.env`, parses arguments, installs logging, and dispatches to the
//! command handlers. Errors are printed once here and mapped to exit codes.

use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser};

use parla_cli::{Cli, CliError, Commands, config, handlers, logging};

fn main() -> ExitCode {
    // Before parsing, so PARLA_CONFIG from .env reaches clap
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config_path();

    let Some(command) = cli.command else {
        // No command provided - show help
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Say {
            text,
            device,
            idle_ms,
            timeout_secs,
        } => {
            let config = config::load(&config_path)?;
            handlers::say::execute(
                config,
                &text.join(" "),
                device.as_deref(),
                Duration::from_millis(idle_ms),
                Duration::from_secs(timeout_secs),
            )?;
        }
        Commands::Repl { device } => {
            let config = config::load(&config_path)?;
            handlers::repl::execute(config, device.as_deref())?;
        }
        Commands::Render { text, output } => {
            let config = config::load(&config_path)?;
            handlers::render::execute(&config, &text.join(" "), &output)?;
        }
        Commands::CheckConfig { json } => {
            handlers::check_config::execute(&config_path, json)?;
        }
        Commands::Devices => {
            handlers::devices::execute()?;
        }
    }

    Ok(())
}
