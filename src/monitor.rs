//! Status responder: answers UDP datagrams with a JSON snapshot of playback.
//!
//! Any datagram sent to the monitor port gets one reply, for example:
//!
//! ```json
//! {"input mode":"I","current line":"ls -l","previous line":"None",
//!  "next line":"pwd","current line progress":"ls","current line number":1,
//!  "total number lines":2}
//! ```

use crate::error::SessionError;
use crate::state::{AutoPilotMode, InputMode, SessionState};
use serde::{Deserialize, Serialize};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long one receive waits before `shutdown` is checked again.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Placeholder for a line that does not exist.
pub const NO_LINE: &str = "None";

const MAX_DATAGRAM: usize = 1024;

/// The state of playback as reported to monitor clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// `I`, `C`, `P`, `FA` (full auto) or `SA` (semi auto).
    #[serde(rename = "input mode")]
    pub input_mode: String,
    #[serde(rename = "current line")]
    pub current_line: String,
    #[serde(rename = "previous line")]
    pub previous_line: String,
    #[serde(rename = "next line")]
    pub next_line: String,
    /// The part of the current line already sent to the shell.
    #[serde(rename = "current line progress")]
    pub progress: String,
    /// 1-based.
    #[serde(rename = "current line number")]
    pub line_number: usize,
    #[serde(rename = "total number lines")]
    pub total_lines: usize,
}

/// Short code for the current input mode.
pub fn mode_code(state: &SessionState) -> &'static str {
    match state.input_mode() {
        InputMode::Insert => "I",
        InputMode::Command => "C",
        InputMode::Passthrough => "P",
        InputMode::Auto => match state.auto_pilot() {
            AutoPilotMode::Full => "FA",
            AutoPilotMode::Semi => "SA",
        },
    }
}

/// Read the shared state without locking. Fields may come from slightly
/// different moments; cursors are clamped so the result is always valid.
pub fn snapshot(state: &SessionState) -> StatusSnapshot {
    let lines = state.script().map(|s| s.lines()).unwrap_or_default();
    let cursor = state.line_cursor();
    let line_or_none = |index: Option<usize>| {
        index
            .and_then(|i| lines.get(i))
            .map_or_else(|| NO_LINE.to_string(), Clone::clone)
    };

    let progress = lines
        .get(cursor)
        .map(|line| {
            let end = state.char_cursor().min(line.len());
            String::from_utf8_lossy(&line.as_bytes()[..end]).into_owned()
        })
        .unwrap_or_default();

    StatusSnapshot {
        input_mode: mode_code(state).to_string(),
        current_line: line_or_none(Some(cursor)),
        previous_line: line_or_none(cursor.checked_sub(1)),
        next_line: line_or_none(cursor.checked_add(1)),
        progress,
        line_number: (cursor + 1).min(lines.len()),
        total_lines: lines.len(),
    }
}

/// Bind the monitor socket on the loopback interface.
pub fn bind(port: u16) -> Result<UdpSocket, SessionError> {
    UdpSocket::bind(("127.0.0.1", port))
        .map_err(|e| SessionError::Socket(format!("cannot bind monitor port {port}: {e}")))
}

/// Spawn the `status-responder` thread serving `socket` until shutdown.
/// The socket is closed when the thread exits.
pub fn spawn_responder(state: Arc<SessionState>, socket: UdpSocket) -> io::Result<JoinHandle<()>> {
    socket.set_nonblocking(true)?;
    thread::Builder::new()
        .name("status-responder".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_io()
                .enable_time()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    tracing::error!("cannot start status responder runtime: {err}");
                    return;
                }
            };
            runtime.block_on(respond(state, socket));
        })
}

async fn respond(state: Arc<SessionState>, socket: UdpSocket) {
    let socket = match tokio::net::UdpSocket::from_std(socket) {
        Ok(socket) => socket,
        Err(err) => {
            tracing::error!("cannot register monitor socket: {err}");
            return;
        }
    };
    let mut buffer = [0u8; MAX_DATAGRAM];

    while !state.is_shutdown() {
        let (n, peer) =
            match tokio::time::timeout(POLL_INTERVAL, socket.recv_from(&mut buffer)).await {
                Err(_elapsed) => continue,
                Ok(Ok(received)) => received,
                Ok(Err(err)) => {
                    tracing::warn!("monitor receive failed: {err}");
                    continue;
                }
            };
        tracing::debug!(
            "status request from {peer}: {:?}",
            String::from_utf8_lossy(&buffer[..n])
        );

        let reply = match serde_json::to_vec(&snapshot(&state)) {
            Ok(reply) => reply,
            Err(err) => {
                tracing::error!("cannot encode status: {err}");
                continue;
            }
        };
        if let Err(err) = socket.send_to(&reply, peer).await {
            tracing::warn!("cannot answer {peer}: {err}");
        }
    }
    tracing::debug!("status responder stopped");
}

/// Ask the responder at `addr` for one snapshot.
pub fn query(addr: impl ToSocketAddrs, timeout: Duration) -> Result<StatusSnapshot, SessionError> {
    let socket_err = |e: io::Error| SessionError::Socket(e.to_string());
    let addr: SocketAddr = addr
        .to_socket_addrs()
        .map_err(socket_err)?
        .next()
        .ok_or_else(|| SessionError::Socket("no monitor address".to_string()))?;

    let socket = UdpSocket::bind(("127.0.0.1", 0)).map_err(socket_err)?;
    socket.set_read_timeout(Some(timeout)).map_err(socket_err)?;
    socket.send_to(b"status", addr).map_err(socket_err)?;

    let mut buffer = [0u8; 64 * 1024];
    let (n, _) = socket.recv_from(&mut buffer).map_err(socket_err)?;
    serde_json::from_slice(&buffer[..n])
        .map_err(|e| SessionError::Socket(format!("malformed status reply: {e}")))
}
