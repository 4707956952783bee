//! Command dispatch: builds a host record from the arguments and drives the
//! orchestrator's poll loop until the session ends.

use std::time::{Duration, Instant};

use secrecy::SecretString;

use spiritconn_core::connect::SessionStatus;
use spiritconn_core::models::{ConnectKind, HostRecord, SshOptions};
use spiritconn_core::vnc::{VncProtocol, VncSessionEvent};
use spiritconn_core::SessionOrchestrator;

use crate::cli::Commands;
use crate::error::CliError;

/// One pass of the poll loop roughly every 5 ms, like an interactive
/// front end's idle timer
const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub fn dispatch(command: Commands, quiet: bool) -> Result<(), CliError> {
    match command {
        Commands::Connect {
            host,
            port,
            name,
            ask_password,
            view_only,
            exclusive,
            timeout,
            inactivity_limit,
            ssh,
            ssh_port,
            ssh_user,
            ssh_key,
            ask_ssh_password,
        } => {
            let name = name.unwrap_or_else(|| host.clone());
            let mut record = HostRecord::new(name, host)
                .with_vnc_port(port);
            record.vnc.view_only = view_only;
            record.vnc.shared = !exclusive;
            if ask_password {
                record.vnc.password = Some(prompt_password("VNC password: ")?);
            }

            if let Some(ssh_host) = ssh {
                let user = ssh_user
                    .ok_or_else(|| CliError::Config("--ssh requires --ssh-user".into()))?;
                let password = if ask_ssh_password {
                    Some(prompt_password("SSH password: ")?)
                } else {
                    None
                };
                record = record.with_ssh(SshOptions {
                    // An empty value means "same host as the VNC server"
                    host: (!ssh_host.is_empty()).then_some(ssh_host),
                    port: ssh_port,
                    user,
                    password: password.clone(),
                    key_path: ssh_key,
                    key_passphrase: password,
                });
            }

            run_session(record, Duration::from_secs(timeout), inactivity_limit, quiet)
        }
        Commands::Listen {
            port,
            ask_password,
            timeout,
        } => {
            let mut record = HostRecord::new(format!("listen:{port}"), "0.0.0.0")
                .with_vnc_port(port)
                .with_kind(ConnectKind::Listen);
            if ask_password {
                record.vnc.password = Some(prompt_password("VNC password: ")?);
            }
            run_session(record, Duration::from_secs(timeout), None, quiet)
        }
    }
}

fn prompt_password(prompt: &str) -> Result<SecretString, CliError> {
    let password = rpassword::prompt_password(prompt)?;
    Ok(SecretString::from(password))
}

/// Runs one session to completion on the calling thread
fn run_session(
    record: HostRecord,
    connect_timeout: Duration,
    inactivity_limit: Option<u32>,
    quiet: bool,
) -> Result<(), CliError> {
    let mut orch = SessionOrchestrator::new(VncProtocol);
    orch.set_connect_timeout(connect_timeout);
    orch.set_inactivity_limit(inactivity_limit);

    let id = orch.add_host(record);
    orch.connect(id)?;

    let mut announced = false;
    let mut last_tick = Instant::now();

    loop {
        orch.drain_completions();
        orch.poll_sessions();

        if let Some(session) = orch.session_mut(id) {
            for event in session.take_events() {
                if quiet {
                    continue;
                }
                match event {
                    VncSessionEvent::ResolutionChanged { width, height } => {
                        println!("Desktop size: {width}x{height}");
                    }
                    VncSessionEvent::Bell => println!("Bell"),
                    VncSessionEvent::ClipboardText(text) => {
                        println!("Server clipboard: {text}");
                    }
                    VncSessionEvent::FrameUpdate { .. }
                    | VncSessionEvent::CopyRect { .. }
                    | VncSessionEvent::CursorUpdate { .. }
                    | VncSessionEvent::Disconnected
                    | VncSessionEvent::Error(_) => {}
                }
            }
        }

        if last_tick.elapsed() >= Duration::from_secs(1) {
            orch.tick();
            last_tick = Instant::now();
        }

        match orch.status(id) {
            SessionStatus::Connected => {
                if !announced {
                    announced = true;
                    if !quiet {
                        println!("Connected");
                    }
                    orch.mark_shown(id);
                }
            }
            SessionStatus::Failed => {
                orch.end_all();
                return Err(CliError::Connection("session failed".into()));
            }
            SessionStatus::Ended => {
                if !quiet {
                    println!("Disconnected");
                }
                return Ok(());
            }
            SessionStatus::Idle | SessionStatus::Connecting => {}
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}
