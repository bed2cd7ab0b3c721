//! Transport Engine: TCP connections that carry newline-delimited UTF-8 text.
//!
//! Every failure at an accept, connect, receive or send boundary is turned into
//! an error flag on a [`Connection`] instead of a distinct failure path. Callers
//! branch on [`Connection::has_error`] and never see a panic or an `Err` from a
//! background task.
//!
//! Reads are explicit: [`Connection::receive`] performs exactly one read and
//! appends the decoded text to the connection's buffer, so the caller decides
//! what phase it is in before the next byte arrives. Writes go through a
//! cloneable [`ConnectionHandle`] feeding a per-connection writer task, which
//! lets the simulation thread broadcast without touching the socket.

use crate::error::ConnectionError;
use crate::protocol::drain_lines;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{lookup_host, TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Size of the fixed scratch buffer each read lands in.
pub const RECEIVE_BUFFER_SIZE: usize = 4096;
/// How long [`connect`] waits for a connection to be established.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

#[derive(Debug)]
enum Outgoing {
    Data(String),
    DataThenClose(String),
    Close,
}

/// Write side of a connection.
///
/// Cheap to clone. Sends are queued to the connection's writer task; the
/// return value only says whether the write was initiated.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: u32,
    tx: mpsc::UnboundedSender<Outgoing>,
    closed: Arc<AtomicBool>,
}

impl ConnectionHandle {
    fn spawn<W>(id: u32, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        tokio::spawn(write_loop(id, writer, rx, Arc::clone(&closed)));
        Self { id, tx, closed }
    }

    /// A handle with no writer behind it; every send fails.
    fn detached(id: u32) -> Self {
        let (tx, _) = mpsc::unbounded_channel();
        Self {
            id,
            tx,
            closed: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Queues `text` for writing. Returns false, and closes the connection, if
    /// the write could not be initiated.
    pub fn send(&self, text: &str) -> bool {
        self.enqueue(Outgoing::Data(text.to_owned()))
    }

    /// Queues `text` and closes the connection once it has been written, or
    /// once writing it failed.
    pub fn send_and_close(&self, text: &str) -> bool {
        self.enqueue(Outgoing::DataThenClose(text.to_owned()))
    }

    pub fn close(&self) {
        if !self.is_closed() {
            let _ = self.tx.send(Outgoing::Close);
        }
        self.closed.store(true, Ordering::Release);
    }

    fn enqueue(&self, message: Outgoing) -> bool {
        if self.is_closed() {
            return false;
        }
        if self.tx.send(message).is_err() {
            self.closed.store(true, Ordering::Release);
            return false;
        }
        true
    }
}

async fn write_loop<W>(
    id: u32,
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
    closed: Arc<AtomicBool>,
) where
    W: AsyncWrite + Send + Unpin + 'static,
{
    while let Some(message) = rx.recv().await {
        let (text, close_after) = match message {
            Outgoing::Data(text) => (text, false),
            Outgoing::DataThenClose(text) => (text, true),
            Outgoing::Close => break,
        };

        if let Err(e) = writer.write_all(text.as_bytes()).await {
            debug!("Write to connection {} failed: {}", id, e);
            break;
        }
        if close_after {
            break;
        }
    }

    closed.store(true, Ordering::Release);
    rx.close();
    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown of connection {} failed: {}", id, e);
    }
}

/// One end of a text stream.
///
/// Holds the accumulated, not yet framed text and the error flag. Once the flag
/// is set the connection stops receiving for good.
pub struct Connection {
    id: u32,
    reader: Option<BoxedReader>,
    scratch: Vec<u8>,
    buffer: String,
    /// Trailing bytes of a multi-byte character split across reads.
    utf8_tail: Vec<u8>,
    error: Option<ConnectionError>,
    handle: ConnectionHandle,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("buffer", &self.buffer)
            .field("error", &self.error)
            .finish()
    }
}

impl Connection {
    /// Wraps a reader and writer pair. Must be called inside a tokio runtime,
    /// since it spawns the writer task.
    pub fn new<R, W>(id: u32, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id,
            reader: Some(Box::new(reader)),
            scratch: vec![0; RECEIVE_BUFFER_SIZE],
            buffer: String::new(),
            utf8_tail: Vec::new(),
            error: None,
            handle: ConnectionHandle::spawn(id, writer),
        }
    }

    pub fn from_stream(id: u32, stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self::new(id, reader, writer)
    }

    /// A placeholder carrying only an error, used for failed accepts and
    /// connects.
    pub fn failed(id: u32, error: ConnectionError) -> Self {
        Self {
            id,
            reader: None,
            scratch: Vec::new(),
            buffer: String::new(),
            utf8_tail: Vec::new(),
            error: Some(error),
            handle: ConnectionHandle::detached(id),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&ConnectionError> {
        self.error.as_ref()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Text received so far that has not been taken as lines.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Removes and returns every complete line in the buffer.
    pub fn take_lines(&mut self) -> Vec<String> {
        drain_lines(&mut self.buffer)
    }

    pub fn send(&self, text: &str) -> bool {
        self.handle.send(text)
    }

    pub fn send_and_close(&self, text: &str) -> bool {
        self.handle.send_and_close(text)
    }

    /// Performs one read and appends the decoded text to the buffer.
    ///
    /// Returns false once the connection is error-flagged: on a read error, on
    /// end of stream, or if it was already flagged. Nothing is read ahead.
    pub async fn receive(&mut self) -> bool {
        if self.error.is_some() {
            return false;
        }
        let Some(reader) = self.reader.as_mut() else {
            self.error = Some(ConnectionError::Closed);
            return false;
        };

        match reader.read(&mut self.scratch).await {
            Ok(0) => {
                self.fail(ConnectionError::Closed);
                false
            }
            Ok(n) => {
                self.utf8_tail.extend_from_slice(&self.scratch[..n]);
                self.decode_pending();
                true
            }
            Err(e) => {
                self.fail(ConnectionError::Io(e));
                false
            }
        }
    }

    fn fail(&mut self, error: ConnectionError) {
        debug!("Connection {} failed: {}", self.id, error);
        self.reader = None;
        self.error = Some(error);
    }

    fn decode_pending(&mut self) {
        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.utf8_tail[start..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.utf8_tail.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.utf8_tail[start..start + valid]) {
                        self.buffer.push_str(text);
                    }
                    match e.error_len() {
                        Some(bad) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            start += valid + bad;
                        }
                        None => {
                            // Incomplete character at the end; wait for the rest.
                            self.utf8_tail.drain(..start + valid);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Handles of every connection a [`Listener`] has accepted and that has not
/// been removed yet.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSet {
    inner: Arc<Mutex<HashMap<u32, ConnectionHandle>>>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u32, ConnectionHandle>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, handle: ConnectionHandle) {
        self.lock().insert(handle.id(), handle);
    }

    pub fn remove(&self, id: u32) -> Option<ConnectionHandle> {
        self.lock().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn handles(&self) -> Vec<ConnectionHandle> {
        self.lock().values().cloned().collect()
    }

    pub fn close_all(&self) {
        for (_, handle) in self.lock().drain() {
            handle.close();
        }
    }
}

/// A running accept loop.
pub struct Listener {
    local_addr: SocketAddr,
    connections: ConnectionSet,
    task: JoinHandle<()>,
}

impl Listener {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn connections(&self) -> &ConnectionSet {
        &self.connections
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops accepting and closes every tracked connection.
    pub fn shutdown(&self) {
        self.task.abort();
        self.connections.close_all();
    }
}

/// Binds `addr` and starts accepting.
///
/// Each accepted connection gets the next id, starting at 0, is tracked in the
/// listener's [`ConnectionSet`] and handed to `on_accept`. If accepting fails
/// the handler is called once with an error-flagged connection and the loop
/// stops.
pub async fn listen<F>(addr: &str, on_accept: F) -> Result<Listener, ConnectionError>
where
    F: Fn(Connection) + Send + Sync + 'static,
{
    listen_tracked(addr, ConnectionSet::new(), on_accept).await
}

/// Like [`listen`], tracking accepted connections in a set the caller already
/// holds, so handlers can remove entries when a connection ends.
pub async fn listen_tracked<F>(
    addr: &str,
    connections: ConnectionSet,
    on_accept: F,
) -> Result<Listener, ConnectionError>
where
    F: Fn(Connection) + Send + Sync + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("Listening on {}", local_addr);

    let tracked = connections.clone();
    let task = tokio::spawn(async move {
        let mut next_id: u32 = 0;
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!("Could not disable Nagle for {}: {}", peer, e);
                    }
                    let connection = Connection::from_stream(next_id, stream);
                    info!("Accepted connection {} from {}", next_id, peer);
                    next_id = next_id.wrapping_add(1);

                    tracked.insert(connection.handle());
                    on_accept(connection);
                }
                Err(e) => {
                    error!("Accept loop on {} stopped: {}", local_addr, e);
                    on_accept(Connection::failed(next_id, ConnectionError::Accept(e)));
                    break;
                }
            }
        }
    });

    Ok(Listener {
        local_addr,
        connections,
        task,
    })
}

/// Connects to `host:port` with the default [`CONNECT_TIMEOUT`].
pub async fn connect(host: &str, port: u16) -> Connection {
    connect_timeout(host, port, CONNECT_TIMEOUT).await
}

/// Connects to `host:port`, giving up after `timeout`.
///
/// Always yields exactly one connection; on failure it is error-flagged.
pub async fn connect_timeout(host: &str, port: u16, timeout: Duration) -> Connection {
    match tokio::time::timeout(timeout, open_stream(host, port)).await {
        Ok(Ok(stream)) => Connection::from_stream(0, stream),
        Ok(Err(e)) => {
            warn!("Could not connect to {}:{}: {}", host, port, e);
            Connection::failed(0, e)
        }
        Err(_) => {
            warn!("Connecting to {}:{} timed out", host, port);
            Connection::failed(
                0,
                ConnectionError::Timeout {
                    host: host.to_owned(),
                    port,
                    timeout,
                },
            )
        }
    }
}

async fn open_stream(host: &str, port: u16) -> Result<TcpStream, ConnectionError> {
    let addr = resolve(host, port).await?;
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Resolves through DNS, preferring IPv4, and falls back to parsing `host` as a
/// literal address.
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr, ConnectionError> {
    match lookup_host((host, port)).await {
        Ok(addrs) => {
            let addrs: Vec<SocketAddr> = addrs.collect();
            if let Some(addr) = addrs.iter().find(|a| a.is_ipv4()).or(addrs.first()) {
                return Ok(*addr);
            }
        }
        Err(e) => debug!("DNS lookup for {} failed: {}", host, e),
    }

    host.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .map_err(|_| ConnectionError::Resolve {
            host: host.to_owned(),
        })
}
