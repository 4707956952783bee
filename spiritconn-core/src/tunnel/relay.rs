//! Byte relay between the loopback socket and the SSH channel
//!
//! Generic over both transports so the relay logic is testable with
//! in-memory pipes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Relay buffer size per direction
const BUFFER_SIZE: usize = 16 * 1024;

/// Consecutive transient channel-read errors tolerated before giving up
const ERROR_LIMIT: u32 = 100;

/// How often the relay re-checks the stop flag while both sides are quiet
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Why the relay stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEnd {
    /// The local side (viewer) closed its socket
    LocalClosed,
    /// The remote side (SSH channel) reached EOF
    RemoteClosed,
    /// The stop flag was raised
    Stopped,
    /// A transport error ended the relay
    Failed(String),
}

/// Shuttles bytes between `local` and `remote` until one side closes, the
/// stop flag is raised, or the error ceiling is hit.
///
/// Each direction forwards independently, so a write blocked on
/// backpressure in one direction stalls neither the opposite direction nor
/// the stop check.
pub async fn relay<L, R>(local: L, remote: R, stop: &AtomicBool) -> RelayEnd
where
    L: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + AsyncWrite + Unpin,
{
    let (local_rd, local_wr) = tokio::io::split(local);
    let (remote_rd, remote_wr) = tokio::io::split(remote);

    let upstream = pump_to_remote(local_rd, remote_wr);
    let downstream = pump_to_local(remote_rd, local_wr);
    tokio::pin!(upstream);
    tokio::pin!(downstream);

    loop {
        if stop.load(Ordering::SeqCst) {
            return RelayEnd::Stopped;
        }
        tokio::select! {
            end = &mut upstream => return end,
            end = &mut downstream => return end,
            () = tokio::time::sleep(STOP_POLL_INTERVAL) => {}
        }
    }
}

/// Viewer socket toward the SSH channel. Any error here is fatal.
async fn pump_to_remote<Rd, Wr>(mut rd: Rd, mut wr: Wr) -> RelayEnd
where
    Rd: AsyncRead + Unpin,
    Wr: AsyncWrite + Unpin,
{
    let mut buf = [0u8; BUFFER_SIZE];
    loop {
        match rd.read(&mut buf).await {
            Ok(0) => {
                debug!("viewer disconnected from the loopback socket");
                return RelayEnd::LocalClosed;
            }
            Ok(n) => {
                if let Err(e) = wr.write_all(&buf[..n]).await {
                    return RelayEnd::Failed(format!("channel write error: {e}"));
                }
                if let Err(e) = wr.flush().await {
                    return RelayEnd::Failed(format!("channel flush error: {e}"));
                }
            }
            Err(e) => {
                return RelayEnd::Failed(format!("socket receive error: {e}"));
            }
        }
    }
}

/// SSH channel toward the viewer socket. Channel reads tolerate a bounded
/// run of transient errors.
async fn pump_to_local<Rd, Wr>(mut rd: Rd, mut wr: Wr) -> RelayEnd
where
    Rd: AsyncRead + Unpin,
    Wr: AsyncWrite + Unpin,
{
    let mut buf = [0u8; BUFFER_SIZE];
    let mut errors: u32 = 0;
    loop {
        match rd.read(&mut buf).await {
            Ok(0) => {
                debug!("the server side disconnected");
                return RelayEnd::RemoteClosed;
            }
            Ok(n) => {
                errors = 0;
                if let Err(e) = wr.write_all(&buf[..n]).await {
                    return RelayEnd::Failed(format!("socket send error: {e}"));
                }
                if let Err(e) = wr.flush().await {
                    return RelayEnd::Failed(format!("socket flush error: {e}"));
                }
            }
            Err(e) => {
                errors += 1;
                if errors > ERROR_LIMIT {
                    return RelayEnd::Failed(format!("channel read error: {e}"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::timeout;

    const TEST_BUDGET: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn bytes_flow_both_directions() {
        let (local_near, local_far) = tokio::io::duplex(1024);
        let (remote_near, remote_far) = tokio::io::duplex(1024);
        let stop = Arc::new(AtomicBool::new(false));

        let relay_stop = stop.clone();
        let task =
            tokio::spawn(async move { relay(local_far, remote_far, &relay_stop).await });

        let (mut viewer_rd, mut viewer_wr) = tokio::io::split(local_near);
        let (mut server_rd, mut server_wr) = tokio::io::split(remote_near);

        viewer_wr.write_all(b"RFB 003.008\n").await.expect("write");
        let mut buf = [0u8; 12];
        timeout(TEST_BUDGET, server_rd.read_exact(&mut buf))
            .await
            .expect("deadline")
            .expect("read");
        assert_eq!(&buf, b"RFB 003.008\n");

        server_wr.write_all(b"ok").await.expect("write");
        let mut buf = [0u8; 2];
        timeout(TEST_BUDGET, viewer_rd.read_exact(&mut buf))
            .await
            .expect("deadline")
            .expect("read");
        assert_eq!(&buf, b"ok");

        // Closing the viewer side ends the relay
        drop(viewer_wr);
        drop(viewer_rd);
        let end = timeout(TEST_BUDGET, task)
            .await
            .expect("deadline")
            .expect("join");
        assert_eq!(end, RelayEnd::LocalClosed);
    }

    #[tokio::test]
    async fn remote_eof_ends_relay() {
        let (_local_near, local_far) = tokio::io::duplex(1024);
        let (remote_near, remote_far) = tokio::io::duplex(1024);
        let stop = AtomicBool::new(false);

        drop(remote_near);
        let end = timeout(TEST_BUDGET, relay(local_far, remote_far, &stop))
            .await
            .expect("deadline");
        assert_eq!(end, RelayEnd::RemoteClosed);
    }

    #[tokio::test]
    async fn stop_flag_ends_relay() {
        let (_local_near, local_far) = tokio::io::duplex(1024);
        let (_remote_near, remote_far) = tokio::io::duplex(1024);
        let stop = Arc::new(AtomicBool::new(false));

        let relay_stop = stop.clone();
        let task =
            tokio::spawn(async move { relay(local_far, remote_far, &relay_stop).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.store(true, Ordering::SeqCst);

        let end = timeout(TEST_BUDGET, task)
            .await
            .expect("deadline")
            .expect("join");
        assert_eq!(end, RelayEnd::Stopped);
    }

    #[tokio::test]
    async fn backpressure_on_one_direction_does_not_stall_the_relay() {
        let (local_near, local_far) = tokio::io::duplex(64);
        let (remote_near, remote_far) = tokio::io::duplex(64);
        let stop = Arc::new(AtomicBool::new(false));

        let relay_stop = stop.clone();
        let task =
            tokio::spawn(async move { relay(local_far, remote_far, &relay_stop).await });

        let (mut viewer_rd, mut viewer_wr) = tokio::io::split(local_near);
        let (_server_rd, mut server_wr) = tokio::io::split(remote_near);

        // The server never reads, so the viewer-to-server write backs up
        // well past the pipe capacity and stays blocked
        let flood = tokio::spawn(async move {
            let chunk = [0u8; 1024];
            let _ = viewer_wr.write_all(&chunk).await;
            viewer_wr
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!flood.is_finished());

        // The opposite direction must keep flowing
        server_wr.write_all(b"pong").await.expect("write");
        let mut buf = [0u8; 4];
        timeout(TEST_BUDGET, viewer_rd.read_exact(&mut buf))
            .await
            .expect("deadline")
            .expect("read");
        assert_eq!(&buf, b"pong");

        // And the stop flag must still be honored promptly
        stop.store(true, Ordering::SeqCst);
        let end = timeout(TEST_BUDGET, task)
            .await
            .expect("deadline")
            .expect("join");
        assert_eq!(end, RelayEnd::Stopped);
    }

    #[tokio::test]
    async fn large_transfer_survives_small_pipe() {
        let (local_near, local_far) = tokio::io::duplex(64);
        let (remote_near, remote_far) = tokio::io::duplex(64);
        let stop = AtomicBool::new(false);

        let relay_task = async { relay(local_far, remote_far, &stop).await };

        let payload: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let expected = payload.clone();

        let mut viewer = local_near;
        let mut server = remote_near;

        let writer = async move {
            viewer.write_all(&payload).await.expect("write");
            viewer.shutdown().await.expect("shutdown");
        };
        let reader = async move {
            let mut received = Vec::new();
            server.read_to_end(&mut received).await.expect("read side");
            received
        };

        let (end, (), received) =
            timeout(TEST_BUDGET, async { tokio::join!(relay_task, writer, reader) })
                .await
                .expect("deadline");
        assert_eq!(end, RelayEnd::LocalClosed);
        assert_eq!(received, expected);
    }
}
