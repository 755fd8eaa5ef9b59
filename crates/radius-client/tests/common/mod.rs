//! Test RADIUS servers
//!
//! The servers accept a request whose User-Password is "accept" and reject
//! everything else.

#![allow(dead_code)]

use radius_client::Target;
use radius_proto::{AttributeSet, AttributeType, Code, Packet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

pub const SECRET: &[u8] = b"foo";

/// How a test server treats requests
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Answer,
    /// Answer after the given delay
    Delay(Duration),
    /// Count requests, never answer
    Silent,
}

/// Build the answer to one request
pub fn answer(secret: &[u8], bytes: &[u8]) -> Option<Packet> {
    let none: [&Packet; 0] = [];
    let (request, _) = Packet::decode_request(secret, bytes, none).ok()?;

    let accepted = request.attribute(AttributeType::UserPassword.as_u8(), 0) == Some(&b"accept"[..]);
    let (code, message) = if accepted {
        (Code::ACCESS_ACCEPT, &b"welcome"[..])
    } else {
        (Code::ACCESS_REJECT, &b"denied"[..])
    };

    let mut reply = AttributeSet::new();
    reply.add(AttributeType::ReplyMessage.as_u8(), message).ok()?;
    Packet::new_response(secret, code, &reply, &request).ok()
}

pub struct TestServer {
    pub addr: SocketAddr,
    received: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(behavior: Behavior) -> Self {
        let socket = Arc::new(
            UdpSocket::bind("127.0.0.1:0")
                .await
                .expect("Failed to bind test server"),
        );
        let addr = socket.local_addr().expect("Failed to get server address");
        let received = Arc::new(AtomicUsize::new(0));

        let counter = received.clone();
        let task = tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            loop {
                let Ok((len, from)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);

                let Some(response) = answer(SECRET, &buf[..len]) else {
                    continue;
                };
                match behavior {
                    Behavior::Answer => {
                        let _ = socket.send_to(response.encode(), from).await;
                    }
                    Behavior::Delay(delay) => {
                        let socket = socket.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let _ = socket.send_to(response.encode(), from).await;
                        });
                    }
                    Behavior::Silent => {}
                }
            }
        });

        TestServer {
            addr,
            received,
            task,
        }
    }

    pub fn target(&self) -> Target {
        Target::Udp(self.addr)
    }

    /// Datagrams received so far
    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Address nothing listens on
pub async fn closed_port() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind probe socket");
    socket.local_addr().expect("Failed to get probe address")
}

/// User-Name testUser, the given password, and a 103 byte NAS-Identifier
pub fn request_attributes(password: &str) -> AttributeSet {
    let mut attrs = AttributeSet::new();
    attrs
        .add(AttributeType::UserName.as_u8(), b"testUser")
        .expect("Failed to add User-Name");
    attrs
        .add(AttributeType::UserPassword.as_u8(), password.as_bytes())
        .expect("Failed to add User-Password");
    attrs
        .add(AttributeType::NasIdentifier.as_u8(), &[b'x'; 103])
        .expect("Failed to add NAS-Identifier");
    attrs
}

#[cfg(unix)]
pub struct StreamServer {
    pub path: std::path::PathBuf,
    task: JoinHandle<()>,
}

#[cfg(unix)]
impl StreamServer {
    pub async fn start(name: &str) -> Self {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::UnixListener;

        let path = std::env::temp_dir().join(format!("{}-{}.sock", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).expect("Failed to bind stream server");

        let task = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buffer = Vec::new();
                    let mut chunk = [0u8; 4096];
                    loop {
                        match Packet::bytes_needed(&buffer) {
                            Some(0) => {
                                let length = u16::from_be_bytes([buffer[2], buffer[3]]) as usize;
                                if length < Packet::MIN_PACKET_SIZE {
                                    return;
                                }
                                let frame: Vec<u8> = buffer.drain(..length).collect();
                                if let Some(response) = answer(SECRET, &frame)
                                    && stream.write_all(response.encode()).await.is_err()
                                {
                                    return;
                                }
                            }
                            Some(_) => match stream.read(&mut chunk).await {
                                Ok(0) | Err(_) => return,
                                Ok(len) => buffer.extend_from_slice(&chunk[..len]),
                            },
                            None => return,
                        }
                    }
                });
            }
        });

        StreamServer { path, task }
    }
}

#[cfg(unix)]
impl Drop for StreamServer {
    fn drop(&mut self) {
        self.task.abort();
        let _ = std::fs::remove_file(&self.path);
    }
}
