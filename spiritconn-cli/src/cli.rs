//! CLI argument parsing types using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// SpiritConn command-line interface for headless VNC sessions
#[derive(Parser)]
#[command(name = "spiritconn-cli")]
#[command(author, version, about = "SpiritConn command-line interface")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Connect to a VNC server, directly or through an SSH tunnel
    #[command(about = "Connect to a VNC server and run the session")]
    Connect {
        /// Host address (hostname or IP)
        host: String,

        /// VNC port
        #[arg(short, long, default_value_t = 5900)]
        port: u16,

        /// Display name for the session (defaults to the host address)
        #[arg(short, long)]
        name: Option<String>,

        /// Prompt for the VNC password
        #[arg(long)]
        ask_password: bool,

        /// View-only mode (no input forwarding)
        #[arg(long)]
        view_only: bool,

        /// Request exclusive access instead of a shared session
        #[arg(long)]
        exclusive: bool,

        /// Connection setup timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,

        /// Disconnect after this many seconds without a server message
        #[arg(long)]
        inactivity_limit: Option<u32>,

        /// Tunnel the session through SSH to this host
        /// (defaults to the VNC host when the flag is given without a value)
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        ssh: Option<String>,

        /// SSH port
        #[arg(long, default_value_t = 22)]
        ssh_port: u16,

        /// SSH user name
        #[arg(long)]
        ssh_user: Option<String>,

        /// Path to the SSH private key file
        #[arg(long)]
        ssh_key: Option<PathBuf>,

        /// Prompt for the SSH password (or key passphrase)
        #[arg(long)]
        ask_ssh_password: bool,
    },

    /// Wait for a reverse VNC connection from a server
    #[command(about = "Listen for a reverse VNC connection")]
    Listen {
        /// Local port to listen on
        #[arg(short, long, default_value_t = 5500)]
        port: u16,

        /// Prompt for the VNC password
        #[arg(long)]
        ask_password: bool,

        /// How long to wait for the server, in seconds
        #[arg(long, default_value_t = 300)]
        timeout: u64,
    },
}
