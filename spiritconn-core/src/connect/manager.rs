//! Session orchestrator
//!
//! Single-threaded owner of the host registry, live session handles, and
//! tunnel handles. Every mutation of that state happens on the thread that
//! owns the orchestrator; worker threads only raise shared atomic flags and
//! post completion events.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::completion::{
    CompletionEvent, CompletionQueue, CompletionSender, ConnectOutcome, WakeCallback,
};
use crate::models::{ConnectKind, HostId, HostRecord, SessionFlags};
use crate::protocol::{
    Endpoint, PollOutcome, ProtocolConnector, ProtocolSession, SessionError, SessionOptions,
    SessionTarget,
};
use crate::registry::HostRegistry;
use crate::tunnel::{SshTunnel, TunnelConfig};

use super::{ConnectError, SessionStatus};

/// Hook invoked when a host's derived status changes
pub type StatusHook = Box<dyn Fn(HostId, SessionStatus)>;

/// Hook invoked with a user-facing notice about a host
pub type NoticeHook = Box<dyn Fn(HostId, &str)>;

/// Hook invoked when a session dispatched a message and its view is stale
pub type RedrawHook = Box<dyn Fn(HostId)>;

/// How often the handshake worker re-checks the tunnel-ready flag
const TUNNEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Owner of all connection state
pub struct SessionOrchestrator<C: ProtocolConnector> {
    connector: Arc<C>,
    registry: HostRegistry,
    completions: CompletionQueue<C::Session>,
    sessions: HashMap<HostId, C::Session>,
    tunnels: HashMap<HostId, SshTunnel>,
    connect_timeout: Duration,
    tunnel_ready_timeout: Duration,
    inactivity_limit: Option<u32>,
    status_hook: Option<StatusHook>,
    notice_hook: Option<NoticeHook>,
    redraw_hook: Option<RedrawHook>,
}

impl<C: ProtocolConnector> SessionOrchestrator<C> {
    /// Creates an orchestrator driving sessions through `connector`
    #[must_use]
    pub fn new(connector: C) -> Self {
        Self {
            connector: Arc::new(connector),
            registry: HostRegistry::new(),
            completions: CompletionQueue::new(),
            sessions: HashMap::new(),
            tunnels: HashMap::new(),
            connect_timeout: Duration::from_secs(30),
            tunnel_ready_timeout: Duration::from_secs(10),
            inactivity_limit: None,
            status_hook: None,
            notice_hook: None,
            redraw_hook: None,
        }
    }

    /// Sets the timeout for protocol connection setup
    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = timeout;
    }

    /// Sets how long a tunneled attempt waits for the tunnel listener
    pub fn set_tunnel_ready_timeout(&mut self, timeout: Duration) {
        self.tunnel_ready_timeout = timeout;
    }

    /// Enables the inactivity watchdog: a connected session with no server
    /// message for `seconds` supervisor ticks is torn down
    pub fn set_inactivity_limit(&mut self, seconds: Option<u32>) {
        self.inactivity_limit = seconds;
    }

    /// Sets the status-change hook
    pub fn set_status_hook(&mut self, hook: StatusHook) {
        self.status_hook = Some(hook);
    }

    /// Sets the user-facing notice hook
    pub fn set_notice_hook(&mut self, hook: NoticeHook) {
        self.notice_hook = Some(hook);
    }

    /// Sets the redraw hook raised whenever a session dispatched a message
    pub fn set_redraw_hook(&mut self, hook: RedrawHook) {
        self.redraw_hook = Some(hook);
    }

    /// Sets the wake callback invoked whenever a worker posts a completion
    pub fn set_wake_callback(&mut self, wake: WakeCallback) {
        self.completions.set_wake_callback(wake);
    }

    /// The host registry
    #[must_use]
    pub fn registry(&self) -> &HostRegistry {
        &self.registry
    }

    /// The host registry, mutably
    pub fn registry_mut(&mut self) -> &mut HostRegistry {
        &mut self.registry
    }

    /// Adds a host record
    pub fn add_host(&mut self, record: HostRecord) -> HostId {
        self.registry.add(record)
    }

    /// Derived status of one host
    #[must_use]
    pub fn status(&self, id: HostId) -> SessionStatus {
        let Some(record) = self.registry.get(id) else {
            return SessionStatus::Idle;
        };
        let flags = &record.flags;
        if flags.is_connected() {
            SessionStatus::Connected
        } else if flags.is_connecting() {
            SessionStatus::Connecting
        } else if flags.has_error.load(Ordering::SeqCst)
            || flags.couldnt_connect.load(Ordering::SeqCst)
        {
            SessionStatus::Failed
        } else if flags.is_ended() {
            SessionStatus::Ended
        } else {
            SessionStatus::Idle
        }
    }

    /// Number of hosts with a live session
    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.registry.iter().filter(|r| r.flags.is_connected()).count()
    }

    /// Number of hosts with a connection attempt in progress
    #[must_use]
    pub fn connecting_count(&self) -> usize {
        self.registry
            .iter()
            .filter(|r| r.flags.is_connecting())
            .count()
    }

    /// Starts a connection attempt for `id`.
    ///
    /// A no-op when an attempt is already underway or the session is live.
    /// For tunneled hosts this spawns the tunnel worker and a handshake
    /// worker that waits for the tunnel's loopback listener; for the other
    /// kinds only the handshake worker is spawned. The call never blocks on
    /// the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is unknown, a tunneled host lacks SSH
    /// options, or a worker thread cannot be spawned.
    pub fn connect(&mut self, id: HostId) -> Result<(), ConnectError> {
        let record = self
            .registry
            .get_mut(id)
            .ok_or(ConnectError::UnknownHost(id))?;
        if record.flags.is_connecting() || record.flags.is_connected() {
            debug!(host = %record.name, "connect ignored, attempt already underway");
            return Ok(());
        }

        // A configured key file that cannot be read aborts the attempt
        // before any worker is started
        if record.kind == ConnectKind::VncOverSsh {
            let key_path = record.ssh.as_ref().and_then(|s| s.key_path.as_ref());
            if let Some(path) = key_path {
                if std::fs::File::open(path).is_err() {
                    warn!(host = %record.name,
                        "Could not open the public or private SSH key file");
                    record.flags.couldnt_connect.store(true, Ordering::SeqCst);
                    record.flags.has_error.store(true, Ordering::SeqCst);
                    self.notify_status(id, SessionStatus::Failed);
                    self.notify_notice(id, "Could not open the public or private SSH key file");
                    return Ok(());
                }
            }
        }

        record.generation += 1;
        let generation = record.generation;
        record.flags.reset_for_connect();
        record.touch();

        let kind = record.kind;
        let label = record.name.clone();
        let flags = record.flags.clone();
        let options = SessionOptions {
            password: record.vnc.password.clone(),
            compress_level: record.vnc.compress_level,
            quality_level: record.vnc.quality_level,
            shared: record.vnc.shared,
            view_only: record.vnc.view_only,
            connect_timeout: self.connect_timeout,
        };
        let endpoint = match kind {
            ConnectKind::Listen => Endpoint::Listen {
                port: record.vnc_port,
            },
            ConnectKind::Vnc | ConnectKind::VncOverSsh => Endpoint::Tcp {
                host: record.address.clone(),
                port: record.vnc_port,
            },
        };
        let tunnel_wait = if kind == ConnectKind::VncOverSsh {
            let mut tunnel_config = TunnelConfig::from_record(record)
                .ok_or_else(|| ConnectError::MissingSshOptions(label.clone()))?;
            tunnel_config.connect_timeout = self.connect_timeout;
            let local_port = record.local_port.clone();
            let tunnel = SshTunnel::spawn(tunnel_config, flags.clone(), local_port.clone())?;
            self.tunnels.insert(id, tunnel);
            Some(TunnelWait {
                flags: flags.clone(),
                local_port,
                timeout: self.tunnel_ready_timeout,
            })
        } else {
            None
        };

        let target = SessionTarget { endpoint, options };
        spawn_handshake(
            &label,
            self.connector.clone(),
            target,
            tunnel_wait,
            flags,
            self.completions.sender(),
            id,
            generation,
        )?;

        self.notify_status(id, SessionStatus::Connecting);
        Ok(())
    }

    /// Drains pending worker completions.
    ///
    /// This is the only place connection-result flags are written, so a
    /// handshake that outlives its attempt can never mark a torn-down
    /// record. Completions whose generation no longer matches the record
    /// belong to such an attempt; their session handles are closed here and
    /// nothing else happens.
    pub fn drain_completions(&mut self) {
        while let Some(event) = self.completions.try_recv() {
            let stale = match self.registry.get(event.host) {
                None => true,
                Some(record) => {
                    record.generation != event.generation || record.flags.is_ended()
                }
            };
            if stale {
                debug!(host = %event.host, generation = event.generation,
                    "discarding stale completion");
                if let ConnectOutcome::Connected(mut session) = event.outcome {
                    session.close();
                }
                continue;
            }

            match event.outcome {
                ConnectOutcome::Connected(session) => {
                    self.sessions.insert(event.host, session);
                    if let Some(record) = self.registry.get(event.host) {
                        record.flags.mark_connected();
                        record.touch();
                        debug!(host = %record.name, "session connected");
                    }
                    self.notify_status(event.host, SessionStatus::Connected);
                }
                ConnectOutcome::Failed { reason, hard_error } => {
                    if let Some(record) = self.registry.get(event.host) {
                        record.flags.mark_couldnt_connect(hard_error);
                        if record.kind == ConnectKind::VncOverSsh {
                            record.flags.stop_ssh.store(true, Ordering::SeqCst);
                        }
                    }
                    if hard_error {
                        warn!(host = %event.host, %reason, "connection failed");
                    } else {
                        debug!(host = %event.host, %reason, "connection failed");
                    }
                    self.notify_status(event.host, SessionStatus::Failed);
                    self.notify_notice(event.host, &reason);
                }
            }
        }
    }

    /// Polls every live session once, dispatching at most one message per
    /// session per call. Sessions that report an orderly end or a fatal
    /// error are torn down.
    pub fn poll_sessions(&mut self) {
        let ids: Vec<HostId> = self.sessions.keys().copied().collect();
        let mut finished = Vec::new();
        for id in ids {
            let Some(session) = self.sessions.get_mut(&id) else {
                continue;
            };
            match session.poll() {
                PollOutcome::Idle => {}
                PollOutcome::Message => {
                    if let Some(record) = self.registry.get(id) {
                        record.touch();
                    }
                    if let Some(hook) = &self.redraw_hook {
                        hook(id);
                    }
                }
                PollOutcome::Ended => finished.push(id),
                PollOutcome::Error(msg) => {
                    warn!(host = %id, error = %msg, "session error");
                    if let Some(record) = self.registry.get(id) {
                        record.flags.has_error.store(true, Ordering::SeqCst);
                    }
                    self.notify_notice(id, &msg);
                    finished.push(id);
                }
            }
        }
        for id in finished {
            self.end_session(id);
        }
    }

    /// Marks the host's session as attached to a viewer
    pub fn mark_shown(&self, id: HostId) {
        if let Some(record) = self.registry.get(id) {
            record.flags.waiting_for_show.store(false, Ordering::SeqCst);
        }
    }

    /// Tears down the connection attempt for `id`. Idempotent: calling it
    /// again, or for a host that never connected, does nothing.
    ///
    /// Order matters: the tunnel stop flag goes up first so the relay stops
    /// accepting bytes, then the session handle is closed, then the record
    /// flags are settled and the generation is bumped so any in-flight
    /// worker completion is recognized as stale.
    pub fn end_session(&mut self, id: HostId) {
        let Some(record) = self.registry.get_mut(id) else {
            return;
        };
        let was_active = record.flags.is_connecting()
            || record.flags.is_connected()
            || self.sessions.contains_key(&id)
            || self.tunnels.contains_key(&id);
        if !was_active && record.flags.is_ended() {
            return;
        }

        record.flags.stop_ssh.store(true, Ordering::SeqCst);

        if let Some(mut session) = self.sessions.remove(&id) {
            session.close();
        }
        self.tunnels.remove(&id);

        record.generation += 1;
        record.flags.connected.store(false, Ordering::SeqCst);
        record.flags.connecting.store(false, Ordering::SeqCst);
        record.flags.waiting_for_show.store(false, Ordering::SeqCst);
        record.flags.ended.store(true, Ordering::SeqCst);
        record.inactive_seconds.store(0, Ordering::SeqCst);
        if ended_cleanly(&record.flags) {
            debug!(host = %record.name, "session ended");
        } else {
            warn!(host = %record.name, "session ended unexpectedly");
        }

        self.notify_status(id, SessionStatus::Ended);
    }

    /// User-requested disconnect: records the request, then tears down
    pub fn disconnect(&mut self, id: HostId) {
        if let Some(record) = self.registry.get(id) {
            record
                .flags
                .disconnect_requested
                .store(true, Ordering::SeqCst);
        }
        self.end_session(id);
    }

    /// Tears down every active attempt, for shutdown
    pub fn end_all(&mut self) {
        for id in self.registry.ids() {
            self.end_session(id);
        }
    }

    /// One supervisor tick, expected roughly once per second: reaps
    /// finished tunnel workers, advances inactivity counters, and tears
    /// down sessions past the inactivity limit.
    pub fn tick(&mut self) {
        self.tunnels.retain(|_, tunnel| !tunnel.is_finished());

        let mut inactive = Vec::new();
        for record in self.registry.iter() {
            if record.flags.is_connected() {
                let seconds = record.inactive_seconds.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(limit) = self.inactivity_limit {
                    if seconds >= limit {
                        inactive.push(record.id);
                    }
                }
            }
        }
        for id in inactive {
            warn!(host = %id, "session inactive past the limit, disconnecting");
            self.notify_notice(id, "connection inactive, disconnecting");
            self.end_session(id);
        }
    }

    /// Access to the live session handle for `id`, for input forwarding
    pub fn session_mut(&mut self, id: HostId) -> Option<&mut C::Session> {
        self.sessions.get_mut(&id)
    }

    fn notify_status(&self, id: HostId, status: SessionStatus) {
        if let Some(hook) = &self.status_hook {
            hook(id, status);
        }
    }

    fn notify_notice(&self, id: HostId, message: &str) {
        if let Some(hook) = &self.notice_hook {
            hook(id, message);
        }
    }
}

struct TunnelWait {
    flags: Arc<SessionFlags>,
    local_port: Arc<AtomicU16>,
    timeout: Duration,
}

/// Spawns the protocol handshake worker. For tunneled attempts the worker
/// first waits for the tunnel's loopback listener, then handshakes against
/// it instead of the original endpoint.
///
/// The worker never writes connection-state flags: it posts its outcome on
/// the completion channel and the owner settles the record while draining,
/// after checking the attempt is still current.
#[allow(clippy::too_many_arguments)]
fn spawn_handshake<C: ProtocolConnector>(
    label: &str,
    connector: Arc<C>,
    mut target: SessionTarget,
    tunnel: Option<TunnelWait>,
    flags: Arc<SessionFlags>,
    sender: CompletionSender<C::Session>,
    host: HostId,
    generation: u64,
) -> std::io::Result<()> {
    let name = format!("connect-{label}");
    std::thread::Builder::new().name(name).spawn(move || {
        flags.worker_running.store(true, Ordering::SeqCst);

        if let Some(wait) = &tunnel {
            match wait_for_tunnel(wait) {
                Ok(port) => {
                    target.endpoint = Endpoint::Tcp {
                        host: "127.0.0.1".into(),
                        port,
                    };
                }
                Err(reason) => {
                    flags.worker_running.store(false, Ordering::SeqCst);
                    sender.post(CompletionEvent {
                        host,
                        generation,
                        outcome: ConnectOutcome::Failed {
                            reason,
                            hard_error: false,
                        },
                    });
                    return;
                }
            }
        }

        let outcome = match connector.connect(&target) {
            Ok(session) => ConnectOutcome::Connected(session),
            Err(e) => {
                let hard_error =
                    matches!(e, SessionError::AuthenticationFailed(_) | SessionError::Io(_));
                ConnectOutcome::Failed {
                    reason: e.to_string(),
                    hard_error,
                }
            }
        };
        flags.worker_running.store(false, Ordering::SeqCst);
        sender.post(CompletionEvent {
            host,
            generation,
            outcome,
        });
    })?;
    Ok(())
}

/// Whether a teardown follows a user request or an orderly end rather than
/// an error
fn ended_cleanly(flags: &SessionFlags) -> bool {
    flags.disconnect_requested.load(Ordering::SeqCst)
        || !flags.has_error.load(Ordering::SeqCst)
}

/// Blocks until the tunnel listener is ready, returning the loopback port
fn wait_for_tunnel(wait: &TunnelWait) -> Result<u16, String> {
    let deadline = Instant::now() + wait.timeout;
    loop {
        if wait.flags.ssh_ready.load(Ordering::SeqCst) {
            let port = wait.local_port.load(Ordering::SeqCst);
            if port != 0 {
                return Ok(port);
            }
        }
        if wait.flags.has_error.load(Ordering::SeqCst) {
            return Err("SSH tunnel failed".into());
        }
        if wait.flags.stop_ssh.load(Ordering::SeqCst) {
            return Err("SSH tunnel stopped".into());
        }
        if Instant::now() >= deadline {
            return Err("timed out waiting for the SSH tunnel".into());
        }
        std::thread::sleep(TUNNEL_POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc::{Receiver, Sender, channel};

    /// Scripted session double: hands out canned poll outcomes, records close
    struct ScriptedSession {
        outcomes: Vec<PollOutcome>,
        closed: Arc<AtomicBool>,
    }

    impl ProtocolSession for ScriptedSession {
        fn poll(&mut self) -> PollOutcome {
            if self.outcomes.is_empty() {
                PollOutcome::Idle
            } else {
                self.outcomes.remove(0)
            }
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Connector double: each handshake blocks until the test releases it
    struct ScriptedConnector {
        results: Mutex<Receiver<Result<ScriptedSession, SessionError>>>,
    }

    impl ScriptedConnector {
        fn new() -> (Self, Sender<Result<ScriptedSession, SessionError>>) {
            let (tx, rx) = channel();
            (
                Self {
                    results: Mutex::new(rx),
                },
                tx,
            )
        }
    }

    impl ProtocolConnector for ScriptedConnector {
        type Session = ScriptedSession;

        fn connect(&self, _target: &SessionTarget) -> Result<Self::Session, SessionError> {
            let guard = match self.results.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard
                .recv()
                .unwrap_or_else(|_| Err(SessionError::ConnectionFailed("script ended".into())))
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn connect_unknown_host_errors() {
        let (connector, _script) = ScriptedConnector::new();
        let mut orch = SessionOrchestrator::new(connector);
        let result = orch.connect(uuid::Uuid::new_v4());
        assert!(matches!(result, Err(ConnectError::UnknownHost(_))));
    }

    #[test]
    fn successful_connect_lifecycle() {
        let (connector, script) = ScriptedConnector::new();
        let mut orch = SessionOrchestrator::new(connector);
        let id = orch.add_host(HostRecord::new("office", "192.0.2.10"));

        orch.connect(id).expect("connect");
        assert_eq!(orch.status(id), SessionStatus::Connecting);
        assert_eq!(orch.connecting_count(), 1);

        // Second connect while underway is a no-op
        orch.connect(id).expect("connect again");

        script
            .send(Ok(ScriptedSession {
                outcomes: vec![PollOutcome::Message],
                closed: Arc::new(AtomicBool::new(false)),
            }))
            .expect("script");

        wait_until(|| {
            orch.drain_completions();
            orch.status(id) == SessionStatus::Connected
        });
        assert_eq!(orch.connected_count(), 1);

        // Connected but not yet attached to a viewer
        let record = orch.registry().get(id).expect("record");
        assert!(record.flags.waiting_for_show.load(Ordering::SeqCst));
        orch.mark_shown(id);
        let record = orch.registry().get(id).expect("record");
        assert!(!record.flags.waiting_for_show.load(Ordering::SeqCst));

        orch.poll_sessions();
        orch.disconnect(id);
        assert_eq!(orch.status(id), SessionStatus::Ended);
        assert_eq!(orch.connected_count(), 0);
    }

    #[test]
    fn failed_connect_reports_failure() {
        let (connector, script) = ScriptedConnector::new();
        let mut orch = SessionOrchestrator::new(connector);
        let notices: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = notices.clone();
        orch.set_notice_hook(Box::new(move |_, msg| {
            sink.lock().expect("lock").push(msg.to_string());
        }));
        let id = orch.add_host(HostRecord::new("down", "192.0.2.11"));

        orch.connect(id).expect("connect");
        script
            .send(Err(SessionError::ConnectionFailed("no route".into())))
            .expect("script");

        wait_until(|| {
            orch.drain_completions();
            orch.status(id) == SessionStatus::Failed
        });
        assert!(notices.lock().expect("lock")[0].contains("no route"));
    }

    #[test]
    fn teardown_before_completion_discards_and_closes_stale_session() {
        let (connector, script) = ScriptedConnector::new();
        let mut orch = SessionOrchestrator::new(connector);
        let id = orch.add_host(HostRecord::new("slow", "192.0.2.12"));
        let closed = Arc::new(AtomicBool::new(false));

        orch.connect(id).expect("connect");
        // Owner gives up while the worker is still handshaking
        orch.end_session(id);

        script
            .send(Ok(ScriptedSession {
                outcomes: Vec::new(),
                closed: closed.clone(),
            }))
            .expect("script");
        wait_until(|| {
            orch.drain_completions();
            closed.load(Ordering::SeqCst)
        });
        assert_eq!(orch.connected_count(), 0);
        assert!(orch.session_mut(id).is_none());

        // The late handshake must leave the torn-down record untouched
        let record = orch.registry().get(id).expect("record");
        assert!(!record.flags.is_connected());
        assert!(!record.flags.waiting_for_show.load(Ordering::SeqCst));
        assert!(record.flags.is_ended());
        assert_eq!(orch.status(id), SessionStatus::Ended);
    }

    #[test]
    fn end_session_is_idempotent() {
        let (connector, script) = ScriptedConnector::new();
        let mut orch = SessionOrchestrator::new(connector);
        let id = orch.add_host(HostRecord::new("office", "192.0.2.10"));

        orch.connect(id).expect("connect");
        script
            .send(Ok(ScriptedSession {
                outcomes: Vec::new(),
                closed: Arc::new(AtomicBool::new(false)),
            }))
            .expect("script");
        wait_until(|| {
            orch.drain_completions();
            orch.status(id) == SessionStatus::Connected
        });

        orch.end_session(id);
        let generation_after_first = orch.registry().get(id).expect("record").generation;
        orch.end_session(id);
        orch.end_session(id);
        assert_eq!(
            orch.registry().get(id).expect("record").generation,
            generation_after_first
        );
        assert_eq!(orch.status(id), SessionStatus::Ended);
    }

    #[test]
    fn teardown_classification() {
        let flags = SessionFlags::default();
        // An orderly remote end carries no error
        assert!(ended_cleanly(&flags));

        flags.has_error.store(true, Ordering::SeqCst);
        assert!(!ended_cleanly(&flags));

        // A user-requested disconnect stays clean even when errors follow
        flags.disconnect_requested.store(true, Ordering::SeqCst);
        assert!(ended_cleanly(&flags));
    }

    #[test]
    fn session_error_tears_down() {
        let (connector, script) = ScriptedConnector::new();
        let mut orch = SessionOrchestrator::new(connector);
        let id = orch.add_host(HostRecord::new("flaky", "192.0.2.13"));

        orch.connect(id).expect("connect");
        script
            .send(Ok(ScriptedSession {
                outcomes: vec![PollOutcome::Error("connection reset".into())],
                closed: Arc::new(AtomicBool::new(false)),
            }))
            .expect("script");
        wait_until(|| {
            orch.drain_completions();
            orch.status(id) == SessionStatus::Connected
        });

        orch.poll_sessions();
        assert_eq!(orch.status(id), SessionStatus::Failed);
        assert!(orch.session_mut(id).is_none());
        let record = orch.registry().get(id).expect("record");
        assert!(record.flags.has_error.load(Ordering::SeqCst));
        assert!(record.flags.is_ended());
    }
}
