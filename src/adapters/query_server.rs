//! Local query server adapter.
//!
//! A minimal single-client HTTP/1.1 endpoint on the gate's own address.
//! The listener is non-blocking; [`QueryServer::poll`] accepts at most one
//! connection per detection-loop iteration, reads one request (≤1024 bytes,
//! 100 ms read timeout), routes it to an [`AppCommand`], and writes the
//! rendered [`AppReply`] before closing the socket.
//!
//! | Path contains | Command                       | Response                    |
//! |---------------|-------------------------------|-----------------------------|
//! | `/data`       | [`AppCommand::Snapshot`]      | `200` JSON snapshot         |
//! | `/reset`      | [`AppCommand::ResetCounters`] | `200 OK`                    |
//! | `/calibrate`  | [`AppCommand::Recalibrate`]   | `200 OK` / `500 FAILED`     |
//! | anything else | none                          | `404`                       |
//!
//! `std::net` runs on both targets (lwIP on ESP-IDF), so there is no
//! cfg split here.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use log::{debug, info, warn};

use crate::app::commands::{AppCommand, AppReply};

/// Largest request we read; anything beyond is ignored.
pub const MAX_REQUEST_LEN: usize = 1024;

const READ_TIMEOUT: Duration = Duration::from_millis(100);

pub struct QueryServer {
    listener: TcpListener,
    served: u32,
}

impl QueryServer {
    /// Bind to `0.0.0.0:<port>`.  Port `0` lets the OS pick one
    /// (see [`local_addr`](Self::local_addr)).
    pub fn bind(port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port)))?;
        listener.set_nonblocking(true)?;
        info!("query: listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            served: 0,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Requests answered since boot.
    pub fn served(&self) -> u32 {
        self.served
    }

    /// Serve at most one pending request.
    ///
    /// Returns `Ok(false)` when nobody was waiting and `Ok(true)` once a
    /// connection was taken, whether or not the client stayed for the
    /// answer.  A misbehaving client is logged and dropped; only listener
    /// failures come back as `Err`.  `dispatch` is called only for
    /// routable paths.
    pub fn poll<F>(&mut self, dispatch: F) -> io::Result<bool>
    where
        F: FnOnce(AppCommand) -> AppReply,
    {
        let (stream, peer) = match self.listener.accept() {
            Ok(conn) => conn,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(ref e) if is_client_error(e) => {
                warn!("query: accept dropped: {}", e);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        debug!("query: connection from {}", peer);
        match self.serve(stream, dispatch) {
            Ok(()) => self.served = self.served.wrapping_add(1),
            Err(e) => warn!("query: client {} dropped: {}", peer, e),
        }
        Ok(true)
    }

    fn serve<F>(&self, mut stream: TcpStream, dispatch: F) -> io::Result<()>
    where
        F: FnOnce(AppCommand) -> AppReply,
    {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;

        let mut buf = [0u8; MAX_REQUEST_LEN];
        let n = match stream.read(&mut buf) {
            Ok(n) => n,
            Err(ref e)
                if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
            {
                warn!("query: client sent nothing within {:?}", READ_TIMEOUT);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let request = String::from_utf8_lossy(&buf[..n]);

        let response = match route(&request) {
            Some(cmd) => {
                debug!("query: {:?}", cmd);
                render(&dispatch(cmd))
            }
            None => {
                debug!("query: no route for {:?}", request_path(&request));
                not_found()
            }
        };
        stream.write_all(response.as_bytes())?;
        stream.flush()
    }
}

/// Accept failures caused by one client rather than by the listener.
fn is_client_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
    )
}

// ───────────────────────────────────────────────────────────────
// Routing & rendering
// ───────────────────────────────────────────────────────────────

/// Target of the request line (`GET /data HTTP/1.1` → `/data`).
fn request_path(request: &str) -> &str {
    request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("")
}

/// Map a raw HTTP request to the command it asks for.
pub fn route(request: &str) -> Option<AppCommand> {
    let path = request_path(request);
    if path.contains("/data") {
        Some(AppCommand::Snapshot)
    } else if path.contains("/reset") {
        Some(AppCommand::ResetCounters)
    } else if path.contains("/calibrate") {
        Some(AppCommand::Recalibrate)
    } else {
        None
    }
}

fn response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn not_found() -> String {
    response("404 Not Found", "text/plain", "NOT FOUND")
}

/// Render a full HTTP response for a service reply.
pub fn render(reply: &AppReply) -> String {
    match reply {
        AppReply::Snapshot(snapshot) => match serde_json::to_string(snapshot) {
            Ok(body) => response("200 OK", "application/json", &body),
            Err(_) => response("500 Internal Server Error", "text/plain", "ERROR"),
        },
        AppReply::CountersReset | AppReply::Calibrated(_) => {
            response("200 OK", "text/plain", "OK")
        }
        AppReply::CalibrationFailed(_) => {
            response("500 Internal Server Error", "text/plain", "FAILED")
        }
    }
}
