//! bakctl CLI - directory backups with retention
//!
//! This is the main entry point for the bakctl command-line interface.

mod cli;
mod commands;
mod output;
mod utils;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    install_panic_hook();

    // Parse CLI args
    let cli = Cli::parse();

    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Initialize tracing
    init_tracing(cli.verbose, cli.quiet);

    // Run command
    let quiet = cli.quiet;
    let result = match cli.command {
        Commands::Add(args) => commands::add::run(args),
        Commands::Edit(args) => commands::edit::run(args),
        Commands::List(args) => commands::list::run(args),
        Commands::Log(args) => commands::log::run(args),
        Commands::Run(args) => commands::run::run(args, quiet).await,
        Commands::Delete(args) => commands::delete::run(args),
        Commands::Restore(args) => commands::restore::run(args, quiet),
        Commands::Export(args) => commands::export::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("error")
        } else {
            match verbose {
                // Command output goes to stdout; logs only when asked for
                0 => EnvFilter::new("warn"),
                1 => EnvFilter::new("info"),
                2 => EnvFilter::new("debug"),
                _ => EnvFilter::new("trace"),
            }
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Prints the panic message with a backtrace. Unwinding continues afterwards
/// so pending backup records are still written.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        let location = info
            .location()
            .map(|l| format!(" at {}:{}", l.file(), l.line()))
            .unwrap_or_default();

        output::error(&format!("bakctl panicked{}: {}", location, payload));
        eprintln!("{}", std::backtrace::Backtrace::force_capture());
    }));
}
