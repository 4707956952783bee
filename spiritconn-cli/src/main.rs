//! SpiritConn CLI - headless front end for the connection core
//!
//! Connects to a VNC server (directly, through an SSH tunnel, or by
//! listening for a reverse connection) and drives the session's poll loop,
//! printing server-side events as they arrive.

mod cli;
mod commands;
mod error;

use clap::Parser;

use spiritconn_core::tracing::{init_tracing, TracingConfig, TracingLevel};

use cli::Cli;

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        TracingLevel::Error
    } else {
        match cli.verbose {
            0 => TracingLevel::Warn,
            1 => TracingLevel::Info,
            2 => TracingLevel::Debug,
            _ => TracingLevel::Trace,
        }
    };
    if let Err(e) = init_tracing(&TracingConfig::new().with_level(level)) {
        eprintln!("Warning: {e}");
    }

    if let Err(e) = commands::dispatch(cli.command, cli.quiet) {
        if !cli.quiet {
            eprintln!("Error: {e}");
        }
        std::process::exit(e.exit_code());
    }
}
