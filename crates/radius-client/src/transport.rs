//! Server targets, name resolution and the socket tasks
//!
//! Each connection to a server is served by one spawned task that owns the
//! socket. The task only moves bytes: outbound packets arrive over a
//! channel, and everything it receives (or the error that ended it) is
//! reported back as a [`TransportEvent`]. All protocol state stays with the
//! [`Remote`](crate::Remote) that spawned it.

use crate::error::ClientError;
use radius_proto::Packet;
use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tokio::net::{UdpSocket, lookup_host};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Standard RADIUS authentication port
pub const DEFAULT_PORT: u16 = 1812;

/// Identifies the [`Remote`](crate::Remote) a transport event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteId(pub u64);

/// Where a server listens
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// RADIUS over UDP
    Udp(SocketAddr),
    /// RADIUS over a local stream socket, framed by the length field
    Stream(PathBuf),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Udp(addr) => write!(f, "{}", addr),
            Target::Stream(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Resolve a server name to the targets to try, in order
///
/// Accepts `host`, `host:port`, `[v6addr]:port`, bare IP addresses, and
/// absolute paths (stream sockets). The port may also be a service name
/// (`radius`, `radacct`). Duplicate addresses are collapsed.
pub async fn resolve(server: &str) -> Result<Vec<Target>, ClientError> {
    if server.starts_with('/') {
        return Ok(vec![Target::Stream(PathBuf::from(server))]);
    }

    let resolve_error = |source: io::Error| ClientError::Resolve {
        server: server.to_string(),
        source,
    };

    let (host, service) = split_host_port(server);
    let port = match service {
        None => DEFAULT_PORT,
        Some(service) => service_port(service).ok_or_else(|| {
            resolve_error(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unknown service '{}'", service),
            ))
        })?,
    };

    let mut targets = Vec::new();
    for addr in lookup_host((host, port)).await.map_err(resolve_error)? {
        let target = Target::Udp(addr);
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    if targets.is_empty() {
        return Err(ClientError::NoAddresses(server.to_string()));
    }

    debug!(server = server, addresses = targets.len(), "Resolved RADIUS server");
    Ok(targets)
}

fn split_host_port(server: &str) -> (&str, Option<&str>) {
    if let Some(rest) = server.strip_prefix('[')
        && let Some((host, tail)) = rest.split_once(']')
    {
        return (host, tail.strip_prefix(':'));
    }

    match server.rsplit_once(':') {
        // More than one colon without brackets is a bare IPv6 address
        Some((host, port)) if !host.contains(':') => (host, Some(port)),
        _ => (server, None),
    }
}

fn service_port(service: &str) -> Option<u16> {
    match service {
        "radius" => Some(1812),
        "radacct" | "radius-acct" => Some(1813),
        _ => service.parse().ok(),
    }
}

/// What a socket task observed
#[derive(Debug)]
pub enum TransportEventKind {
    /// One complete packet (datagram, or frame cut from the stream)
    Packet(Vec<u8>),
    /// The socket failed or was closed by the peer; the task has exited
    Failed(io::Error),
}

/// Event sent from a socket task to the owner of its [`Remote`](crate::Remote)
#[derive(Debug)]
pub struct TransportEvent {
    pub remote: RemoteId,
    /// Connection the event came from; events from replaced connections are stale
    pub generation: u64,
    pub kind: TransportEventKind,
}

#[derive(Clone)]
struct Reporter {
    remote: RemoteId,
    generation: u64,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl Reporter {
    fn report(&self, kind: TransportEventKind) {
        // The receiver is gone only once the client itself is dropped
        let _ = self.events.send(TransportEvent {
            remote: self.remote,
            generation: self.generation,
            kind,
        });
    }

    fn packet(&self, bytes: Vec<u8>) {
        self.report(TransportEventKind::Packet(bytes));
    }

    fn failed(&self, error: io::Error) {
        self.report(TransportEventKind::Failed(error));
    }
}

/// Handle to a running socket task
///
/// Dropping the handle closes the socket.
pub(crate) struct Transport {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    task: JoinHandle<()>,
}

impl Transport {
    /// Open a connection to `target` and serve it on a new task
    ///
    /// The socket is opened before this returns, so an unreachable stream
    /// socket or a failed bind is reported here. Must be called from
    /// within a Tokio runtime.
    pub(crate) fn connect(
        target: &Target,
        remote: RemoteId,
        generation: u64,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> io::Result<Self> {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let reporter = Reporter {
            remote,
            generation,
            events,
        };

        let task = match target {
            Target::Udp(addr) => {
                let socket = connect_udp(*addr)?;
                tokio::spawn(run_udp(socket, *addr, outbound_rx, reporter))
            }
            Target::Stream(path) => spawn_stream(path, outbound_rx, reporter)?,
        };

        Ok(Transport { outbound, task })
    }

    /// Queue a packet for transmission
    ///
    /// Returns false if the task has already exited.
    pub(crate) fn send(&self, bytes: Vec<u8>) -> bool {
        self.outbound.send(bytes).is_ok()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn connect_udp(addr: SocketAddr) -> io::Result<UdpSocket> {
    let bind_addr: SocketAddr = if addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let socket = std::net::UdpSocket::bind(bind_addr)?;
    // Connected, so only datagrams from the server are delivered and
    // ICMP errors surface as ECONNREFUSED
    socket.connect(addr)?;
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket)
}

async fn run_udp(
    socket: UdpSocket,
    addr: SocketAddr,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    reporter: Reporter,
) {
    let mut buf = vec![0u8; Packet::MAX_PACKET_SIZE];
    loop {
        tokio::select! {
            outgoing = outbound.recv() => match outgoing {
                Some(bytes) => {
                    trace!(server = %addr, len = bytes.len(), "Sending datagram");
                    if let Err(e) = socket.send(&bytes).await {
                        return reporter.failed(e);
                    }
                }
                None => return,
            },
            received = socket.recv(&mut buf) => match received {
                Ok(len) => reporter.packet(buf[..len].to_vec()),
                Err(e) => return reporter.failed(e),
            },
        }
    }
}

#[cfg(unix)]
fn spawn_stream(
    path: &Path,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    reporter: Reporter,
) -> io::Result<JoinHandle<()>> {
    let stream = std::os::unix::net::UnixStream::connect(path)?;
    stream.set_nonblocking(true)?;
    let stream = tokio::net::UnixStream::from_std(stream)?;
    Ok(tokio::spawn(run_stream(stream, path.to_path_buf(), outbound, reporter)))
}

#[cfg(not(unix))]
fn spawn_stream(
    _path: &Path,
    _outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    _reporter: Reporter,
) -> io::Result<JoinHandle<()>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "stream sockets are only supported on Unix",
    ))
}

#[cfg(unix)]
async fn run_stream(
    stream: tokio::net::UnixStream,
    path: PathBuf,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    reporter: Reporter,
) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let (mut reader, mut writer) = stream.into_split();

    let mut buffer = Vec::new();
    let mut chunk = vec![0u8; Packet::MAX_PACKET_SIZE];
    loop {
        tokio::select! {
            outgoing = outbound.recv() => match outgoing {
                Some(bytes) => {
                    trace!(server = %path.display(), len = bytes.len(), "Writing packet");
                    if let Err(e) = writer.write_all(&bytes).await {
                        return reporter.failed(e);
                    }
                }
                None => return,
            },
            read = reader.read(&mut chunk) => match read {
                Ok(0) => return reporter.failed(io::ErrorKind::UnexpectedEof.into()),
                Ok(len) => {
                    buffer.extend_from_slice(&chunk[..len]);
                    loop {
                        match next_frame(&mut buffer) {
                            Ok(Some(frame)) => reporter.packet(frame),
                            Ok(None) => break,
                            Err(e) => return reporter.failed(e),
                        }
                    }
                }
                Err(e) => return reporter.failed(e),
            },
        }
    }
}

/// Cut the next complete packet off the front of `buffer`
///
/// Fails when the length field makes the stream impossible to resynchronise.
#[cfg_attr(not(unix), allow(dead_code))]
fn next_frame(buffer: &mut Vec<u8>) -> io::Result<Option<Vec<u8>>> {
    match Packet::bytes_needed(buffer) {
        Some(0) => {}
        Some(_) => return Ok(None),
        None => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "packet length exceeds protocol maximum",
            ));
        }
    }

    let length = u16::from_be_bytes([buffer[2], buffer[3]]) as usize;
    if length < Packet::MIN_PACKET_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("packet length {} below header size", length),
        ));
    }

    Ok(Some(buffer.drain(..length).collect()))
}
