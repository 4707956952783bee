//! VNC session handle and protocol thread
//!
//! [`VncSession::connect`] performs the whole connection setup as one
//! blocking call: it spawns the protocol thread, waits for the handshake
//! verdict, and returns a live handle or an error. The protocol thread owns
//! its own current-thread Tokio runtime and keeps pumping server messages
//! into the event channel until disconnect.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError, channel};
use std::time::Duration;

use secrecy::ExposeSecret;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};
use vnc::{ClientKeyEvent, ClientMouseEvent, PixelFormat, VncConnector, VncEncoding, X11Event};

use super::{VncEncodingPref, VncError, VncInput, VncRect, VncSessionConfig, VncSessionEvent};
use crate::protocol::{Endpoint, PollOutcome, ProtocolConnector, ProtocolSession, SessionError,
    SessionTarget};

/// Extra slack past the configured connect timeout before the owner gives
/// up waiting for the protocol thread's handshake verdict
const HANDSHAKE_GRACE: Duration = Duration::from_secs(5);

/// A live VNC session
///
/// The handle is `Send`: it is created on a handshake worker thread and
/// crosses the completion channel to the owner, which then drives it with
/// [`VncSession::poll`] and input calls.
pub struct VncSession {
    command_tx: Option<Sender<VncInput>>,
    event_rx: Receiver<VncSessionEvent>,
    running: Arc<AtomicBool>,
    view_only: bool,
    inbox: Vec<VncSessionEvent>,
    closed: bool,
}

impl VncSession {
    /// Connects to the VNC server, blocking until the handshake succeeds or
    /// fails. The protocol thread keeps running after a successful return.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, handshake, or authentication
    /// fails, or if the handshake does not finish within the configured
    /// timeout.
    pub fn connect(config: VncSessionConfig) -> Result<Self, VncError> {
        let (ready_tx, ready_rx) = channel();
        let (event_tx, event_rx) = channel();
        let (command_tx, command_rx) = channel();

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();
        let view_only = config.view_only;
        let wait_budget = config.connect_timeout + HANDSHAKE_GRACE;

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = ready_tx.send(Err(VncError::Io(format!(
                        "failed to create Tokio runtime: {e}"
                    ))));
                    thread_running.store(false, Ordering::SeqCst);
                    return;
                }
            };

            rt.block_on(run_vnc_session(config, &ready_tx, &event_tx, &command_rx));
            thread_running.store(false, Ordering::SeqCst);
            let _ = event_tx.send(VncSessionEvent::Disconnected);
        });

        match ready_rx.recv_timeout(wait_budget) {
            Ok(Ok(())) => Ok(Self {
                command_tx: Some(command_tx),
                event_rx,
                running,
                view_only,
                inbox: Vec::new(),
                closed: false,
            }),
            Ok(Err(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) => {
                // Handshake thread is still wedged somewhere; tell it to
                // stop and report the timeout.
                let _ = command_tx.send(VncInput::Disconnect);
                Err(VncError::Timeout)
            }
            Err(RecvTimeoutError::Disconnected) => Err(VncError::ConnectionFailed(
                "protocol thread exited before the handshake finished".into(),
            )),
        }
    }

    /// Takes every event buffered by previous [`VncSession::poll`] calls
    pub fn take_events(&mut self) -> Vec<VncSessionEvent> {
        std::mem::take(&mut self.inbox)
    }

    /// Sends a keyboard event. Dropped silently in view-only mode.
    pub fn send_key(&self, keysym: u32, pressed: bool) {
        if self.view_only {
            return;
        }
        self.send(VncInput::KeyEvent { keysym, pressed });
    }

    /// Sends a pointer event. Dropped silently in view-only mode.
    pub fn send_pointer(&self, x: u16, y: u16, buttons: u8) {
        if self.view_only {
            return;
        }
        self.send(VncInput::PointerEvent { x, y, buttons });
    }

    /// Sends clipboard text to the server
    pub fn send_clipboard(&self, text: impl Into<String>) {
        self.send(VncInput::ClipboardText(text.into()));
    }

    /// Requests a full framebuffer refresh
    pub fn refresh(&self) {
        self.send(VncInput::RefreshScreen);
    }

    /// True while the protocol thread is running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn send(&self, input: VncInput) {
        if let Some(tx) = &self.command_tx {
            let _ = tx.send(input);
        }
    }
}

impl ProtocolSession for VncSession {
    fn poll(&mut self) -> PollOutcome {
        if self.closed {
            return PollOutcome::Ended;
        }
        match self.event_rx.try_recv() {
            Ok(VncSessionEvent::Disconnected) => PollOutcome::Ended,
            Ok(VncSessionEvent::Error(msg)) => PollOutcome::Error(msg),
            Ok(event) => {
                self.inbox.push(event);
                PollOutcome::Message
            }
            Err(TryRecvError::Empty) => {
                if self.running.load(Ordering::SeqCst) {
                    PollOutcome::Idle
                } else {
                    PollOutcome::Ended
                }
            }
            Err(TryRecvError::Disconnected) => PollOutcome::Ended,
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(VncInput::Disconnect);
        }
        self.inbox.clear();
    }
}

impl Drop for VncSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Runs the VNC protocol: handshake, then the message pump
async fn run_vnc_session(
    config: VncSessionConfig,
    ready_tx: &Sender<Result<(), VncError>>,
    event_tx: &Sender<VncSessionEvent>,
    command_rx: &Receiver<VncInput>,
) {
    let tcp = match open_transport(&config).await {
        Ok(tcp) => tcp,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let password = config
        .password
        .as_ref()
        .map(|p| p.expose_secret().to_string())
        .unwrap_or_default();

    let mut connector = VncConnector::new(tcp)
        .set_auth_method(async move { Ok(password) })
        .allow_shared(config.shared)
        .set_pixel_format(PixelFormat::bgra());

    for encoding in &config.encodings {
        connector = match encoding {
            VncEncodingPref::Tight => connector.add_encoding(VncEncoding::Tight),
            VncEncodingPref::Zrle => connector.add_encoding(VncEncoding::Zrle),
            VncEncodingPref::CopyRect => connector.add_encoding(VncEncoding::CopyRect),
            VncEncodingPref::Raw => connector.add_encoding(VncEncoding::Raw),
        };
    }

    // The connector's auth-future type parameter stays inferred through the
    // whole build/start/finish chain
    let client = match connector.build() {
        Ok(client) => client,
        Err(e) => {
            let _ = ready_tx.send(Err(VncError::ConnectionFailed(e.to_string())));
            return;
        }
    };
    let started = match client.try_start().await {
        Ok(started) => started,
        Err(e) => {
            let _ = ready_tx.send(Err(VncError::ConnectionFailed(e.to_string())));
            return;
        }
    };
    let vnc = match started.finish() {
        Ok(vnc) => vnc,
        Err(e) => {
            let _ = ready_tx.send(Err(VncError::AuthenticationFailed(e.to_string())));
            return;
        }
    };

    debug!(endpoint = %config.endpoint, "VNC handshake complete");
    let _ = ready_tx.send(Ok(()));

    // Message pump. Commands are drained first so a disconnect request is
    // honored even when the server floods updates.
    let refresh_interval = Duration::from_millis(16);
    let mut last_refresh = std::time::Instant::now();

    'pump: loop {
        loop {
            match command_rx.try_recv() {
                Ok(VncInput::Disconnect) | Err(TryRecvError::Disconnected) => break 'pump,
                Ok(VncInput::KeyEvent { keysym, pressed }) => {
                    let event = X11Event::KeyEvent(ClientKeyEvent {
                        keycode: keysym,
                        down: pressed,
                    });
                    let _ = vnc.input(event).await;
                }
                Ok(VncInput::PointerEvent { x, y, buttons }) => {
                    let event = X11Event::PointerEvent(ClientMouseEvent {
                        position_x: x,
                        position_y: y,
                        bottons: buttons, // field name typo lives in vnc-rs
                    });
                    let _ = vnc.input(event).await;
                }
                Ok(VncInput::ClipboardText(text)) => {
                    let _ = vnc.input(X11Event::CopyText(text)).await;
                }
                Ok(VncInput::RefreshScreen) => {
                    let _ = vnc.input(X11Event::Refresh).await;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        match vnc.poll_event().await {
            Ok(Some(event)) => {
                if event_tx.send(convert_vnc_event(event)).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(endpoint = %config.endpoint, error = %e, "VNC session error");
                let _ = event_tx.send(VncSessionEvent::Error(e.to_string()));
                break;
            }
        }

        if last_refresh.elapsed() >= refresh_interval {
            let _ = vnc.input(X11Event::Refresh).await;
            last_refresh = std::time::Instant::now();
        }

        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let _ = vnc.close().await;
    debug!(endpoint = %config.endpoint, "VNC session closed");
}

/// Opens the TCP transport: outbound connect, or a one-shot reverse listener
async fn open_transport(config: &VncSessionConfig) -> Result<TcpStream, VncError> {
    match &config.endpoint {
        Endpoint::Tcp { host, port } => {
            let connect = TcpStream::connect((host.as_str(), *port));
            match tokio::time::timeout(config.connect_timeout, connect).await {
                Ok(Ok(tcp)) => Ok(tcp),
                Ok(Err(e)) => Err(VncError::ConnectionFailed(e.to_string())),
                Err(_) => Err(VncError::Timeout),
            }
        }
        Endpoint::Listen { port } => {
            let listener = TcpListener::bind(("0.0.0.0", *port))
                .await
                .map_err(|e| VncError::Io(e.to_string()))?;
            debug!(port, "waiting for reverse VNC connection");
            match tokio::time::timeout(config.connect_timeout, listener.accept()).await {
                Ok(Ok((tcp, peer))) => {
                    debug!(%peer, "reverse VNC connection accepted");
                    Ok(tcp)
                }
                Ok(Err(e)) => Err(VncError::Io(e.to_string())),
                Err(_) => Err(VncError::Timeout),
            }
        }
    }
}

/// Converts vnc-rs events to session events
fn convert_vnc_event(event: vnc::VncEvent) -> VncSessionEvent {
    use vnc::VncEvent;
    match event {
        VncEvent::SetResolution(screen) => VncSessionEvent::ResolutionChanged {
            width: u32::from(screen.width),
            height: u32::from(screen.height),
        },
        VncEvent::RawImage(rect, data) | VncEvent::JpegImage(rect, data) => {
            VncSessionEvent::FrameUpdate {
                rect: VncRect::new(rect.x, rect.y, rect.width, rect.height),
                data,
            }
        }
        VncEvent::Copy(dst, src) => VncSessionEvent::CopyRect {
            dst: VncRect::new(dst.x, dst.y, dst.width, dst.height),
            src: VncRect::new(src.x, src.y, src.width, src.height),
        },
        VncEvent::SetCursor(rect, data) => VncSessionEvent::CursorUpdate {
            rect: VncRect::new(rect.x, rect.y, rect.width, rect.height),
            data,
        },
        VncEvent::Bell => VncSessionEvent::Bell,
        VncEvent::Text(text) => VncSessionEvent::ClipboardText(text),
        _ => VncSessionEvent::Error("unsupported VNC event".to_string()),
    }
}

/// The production [`ProtocolConnector`]: VNC over vnc-rs
#[derive(Debug, Clone, Copy, Default)]
pub struct VncProtocol;

impl ProtocolConnector for VncProtocol {
    type Session = VncSession;

    fn connect(&self, target: &SessionTarget) -> Result<Self::Session, SessionError> {
        let config = VncSessionConfig::from_target(target);
        VncSession::connect(config).map_err(SessionError::from)
    }
}
