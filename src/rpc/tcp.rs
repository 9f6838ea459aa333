//! Framed TCP transport
//!
//! A minimal [`Peer`] implementation over TCP, enough to run the server
//! binary and CLI against each other. Not a production transport: the
//! client serializes calls on one connection, and there are no retries or
//! reconnection.
//!
//! ## Frame Format
//!
//! ```text
//! ┌───────────┬──────────┬──────────┬─────────────────┐
//! │ "TK\0" (3)│ Type (1) │ Len (4)  │     Payload     │
//! └───────────┴──────────┴──────────┴─────────────────┘
//! ```
//!
//! Request payload (type 2):
//! `[u32 reqid][V mlen][mlen method][rest data]`
//!
//! Response payload (type 4):
//! `[u32 reqid][u16 code][V elen][elen error-data][rest body]`
//! where code 0 means success and `body` is the response payload; a
//! nonzero code means failure, `error-data` carries the offending key (if
//! any) and `body` the error message.

use std::collections::HashMap;
use std::io::{BufReader, BufWriter, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::error::{Result, TetherError};
use crate::protocol::wire::{bytes_field, put_bytes};

use super::{Handler, Peer};

/// Frame header size: 3 magic bytes + 1 type byte + 4 length bytes
const HEADER_SIZE: usize = 8;

/// Frame magic
const MAGIC: [u8; 3] = *b"TK\0";

/// Maximum frame payload size (16 MB)
const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Frame types
const FRAME_REQUEST: u8 = 2;
const FRAME_RESPONSE: u8 = 4;

/// Error code for a handler failure with no protocol code of its own.
pub const CODE_SERVICE_ERROR: u16 = 500;

/// Error code for a call to an unregistered method.
pub const CODE_UNKNOWN_METHOD: u16 = 501;

// =============================================================================
// Frame I/O
// =============================================================================

fn write_frame<W: Write>(writer: &mut W, frame_type: u8, payload: &[u8]) -> Result<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[frame_type])?;
    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

fn read_frame<R: Read>(reader: &mut R) -> Result<(u8, Vec<u8>)> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;
    if header[..3] != MAGIC {
        return Err(TetherError::Network("invalid frame header".to_string()));
    }
    let frame_type = header[3];
    let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    if len > MAX_FRAME_SIZE {
        return Err(TetherError::Network(format!(
            "frame too large: {} bytes (max {})",
            len, MAX_FRAME_SIZE
        )));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok((frame_type, payload))
}

// =============================================================================
// Server
// =============================================================================

/// TCP server end of the channel.
///
/// Registered handlers are shared by every accepted connection; each
/// connection is served by its own thread.
pub struct TcpServer {
    listener: TcpListener,
    handlers: Arc<RwLock<HashMap<String, Handler>>>,
    shutdown: Arc<AtomicBool>,
}

impl TcpServer {
    /// Bind a listener on `addr`.
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The bound listen address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections until [`Peer::stop`] is called.
    pub fn serve(&self) -> Result<()> {
        tracing::info!(addr = %self.local_addr()?, "serving");
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::info!("server stopped");
                return Ok(());
            }
            match self.listener.accept() {
                Ok((stream, _)) => {
                    let handlers = Arc::clone(&self.handlers);
                    let shutdown = Arc::clone(&self.shutdown);
                    std::thread::spawn(move || {
                        if let Err(e) = serve_connection(stream, handlers, shutdown) {
                            tracing::warn!("connection error: {}", e);
                        }
                    });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Peer for TcpServer {
    fn handle(&self, method: &str, handler: Handler) {
        self.handlers.write().insert(method.to_string(), handler);
    }

    fn call(&self, method: &str, _data: &[u8]) -> Result<Vec<u8>> {
        Err(TetherError::Network(format!(
            "server peer cannot originate calls (method {method:?})"
        )))
    }

    fn stop(&self) -> Result<()> {
        self.shutdown.store(true, Ordering::Release);
        Ok(())
    }
}

/// Serve one accepted connection until the client disconnects.
fn serve_connection(
    stream: TcpStream,
    handlers: Arc<RwLock<HashMap<String, Handler>>>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    stream.set_nodelay(true)?;
    // The listener is non-blocking for shutdown polling; the per-connection
    // stream must not be.
    stream.set_nonblocking(false)?;

    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);

    tracing::debug!("connection established from {}", peer_addr);

    loop {
        if shutdown.load(Ordering::Acquire) {
            return Ok(());
        }
        let (frame_type, payload) = match read_frame(&mut reader) {
            Ok(frame) => frame,
            Err(TetherError::Io(ref e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::UnexpectedEof
                        | std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::ConnectionAborted
                ) =>
            {
                tracing::debug!("client {} disconnected", peer_addr);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if frame_type != FRAME_REQUEST {
            return Err(TetherError::Network(format!(
                "unexpected frame type {frame_type}"
            )));
        }
        if payload.len() < 4 {
            return Err(TetherError::Network("short request frame".to_string()));
        }
        let req_id = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let (method, nb) = bytes_field(&payload[4..])
            .map_err(|e| TetherError::Network(format!("bad request frame: {e}")))?;
        let method = String::from_utf8_lossy(method).into_owned();
        let data = &payload[4 + nb..];

        tracing::trace!(req_id, method = %method, "request from {}", peer_addr);

        let handler = handlers.read().get(&method).cloned();
        let result = match handler {
            Some(handler) => handler(data),
            None => Err(TetherError::Call {
                code: CODE_UNKNOWN_METHOD,
                message: format!("unknown method {method:?}"),
                data: Vec::new(),
            }),
        };
        write_frame(&mut writer, FRAME_RESPONSE, &encode_response(req_id, result))?;
    }
}

fn encode_response(req_id: u32, result: Result<Vec<u8>>) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&req_id.to_be_bytes());
    match result {
        Ok(payload) => {
            buf.extend_from_slice(&0u16.to_be_bytes());
            put_bytes(&mut buf, &[]);
            buf.extend_from_slice(&payload);
        }
        Err(TetherError::Call {
            code,
            message,
            data,
        }) => {
            buf.extend_from_slice(&code.to_be_bytes());
            put_bytes(&mut buf, &data);
            buf.extend_from_slice(message.as_bytes());
        }
        Err(e) => {
            buf.extend_from_slice(&CODE_SERVICE_ERROR.to_be_bytes());
            put_bytes(&mut buf, &[]);
            buf.extend_from_slice(e.to_string().as_bytes());
        }
    }
    buf
}

// =============================================================================
// Client
// =============================================================================

/// TCP client end of the channel.
///
/// Calls are serialized on the single connection: one request in flight at
/// a time, correlated by request ID.
pub struct TcpClient {
    conn: Mutex<ClientConn>,
    next_id: AtomicU32,
}

struct ClientConn {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

/// Connect to a server at `addr`.
pub fn dial(addr: impl ToSocketAddrs) -> Result<Arc<TcpClient>> {
    let stream = TcpStream::connect(addr)?;
    stream.set_nodelay(true)?;
    Ok(Arc::new(TcpClient {
        conn: Mutex::new(ClientConn {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        }),
        next_id: AtomicU32::new(1),
    }))
}

impl Peer for TcpClient {
    fn handle(&self, method: &str, _handler: Handler) {
        // This transport carries no server-to-client calls.
        tracing::warn!(method, "handler registration ignored on TCP client peer");
    }

    fn call(&self, method: &str, data: &[u8]) -> Result<Vec<u8>> {
        let req_id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut request = Vec::with_capacity(data.len() + method.len() + 12);
        request.extend_from_slice(&req_id.to_be_bytes());
        put_bytes(&mut request, method.as_bytes());
        request.extend_from_slice(data);

        let mut conn = self.conn.lock();
        write_frame(&mut conn.writer, FRAME_REQUEST, &request)?;
        let (frame_type, payload) = read_frame(&mut conn.reader)?;
        drop(conn);

        if frame_type != FRAME_RESPONSE {
            return Err(TetherError::Network(format!(
                "unexpected frame type {frame_type}"
            )));
        }
        if payload.len() < 6 {
            return Err(TetherError::Network("short response frame".to_string()));
        }
        let rsp_id = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        if rsp_id != req_id {
            return Err(TetherError::Network(format!(
                "response ID mismatch: got {rsp_id}, want {req_id}"
            )));
        }
        let code = u16::from_be_bytes([payload[4], payload[5]]);
        let (err_data, nb) = bytes_field(&payload[6..])
            .map_err(|e| TetherError::Network(format!("bad response frame: {e}")))?;
        let err_data = err_data.to_vec();
        let body = payload[6 + nb..].to_vec();

        if code != 0 {
            return Err(TetherError::Call {
                code,
                message: String::from_utf8_lossy(&body).into_owned(),
                data: err_data,
            });
        }
        Ok(body)
    }

    fn stop(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.writer.get_ref().shutdown(Shutdown::Both)?;
        Ok(())
    }
}
