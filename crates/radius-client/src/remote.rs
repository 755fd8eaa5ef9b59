//! Per-server request state machine
//!
//! A [`Remote`] tracks every request in flight to one (target, secret)
//! pair. Each attempt of a request gets `timeout / (retries + 1)`; when it
//! elapses the identical bytes are sent again until the retries are used
//! up. The remote performs no I/O itself: the owner feeds it transport
//! events and timer ticks through [`Remote::handle_event`] and
//! [`Remote::handle_timeout`], and asks [`Remote::poll_timeout`] when the
//! next tick is due.
//!
//! # Callback contract
//!
//! A request callback runs at most twice. When the last attempt times out
//! it receives [`RequestError::Timeout`] but the request keeps listening,
//! since a slow server may still answer. The second and final run delivers
//! either that response or [`RequestError::Canceled`]. Requests that are
//! answered or canceled before timing out see exactly one run.

use crate::error::{ClientError, RequestError};
use crate::transport::{RemoteId, Target, Transport, TransportEvent, TransportEventKind};
use radius_proto::{AttributeSet, Code, Packet};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Shortest per-attempt timeout; keeps retransmissions from spinning
const MIN_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(1);

/// Receives the response, or the reason there is none
pub type Callback = Box<dyn FnMut(Result<&Packet, RequestError>)>;

/// Identifies a request on the [`Remote`] that sent it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingId(u64);

struct PendingRequest {
    id: PendingId,
    request: Packet,
    callback: Callback,
    /// Per-attempt timeout
    timeout: Duration,
    retries_left: usize,
    /// None once every attempt has timed out
    deadline: Option<Instant>,
}

/// Connection state for one RADIUS server
pub struct Remote {
    id: RemoteId,
    target: Target,
    secret: Vec<u8>,
    events: mpsc::UnboundedSender<TransportEvent>,
    transport: Option<Transport>,
    generation: u64,
    next_pending: u64,
    pending: Vec<PendingRequest>,
}

impl Remote {
    /// Create a remote; the connection is opened on the first send
    ///
    /// Transport events for this remote are sent to `events` tagged with
    /// `id`.
    pub fn new(
        id: RemoteId,
        target: Target,
        secret: &[u8],
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Remote {
            id,
            target,
            secret: secret.to_vec(),
            events,
            transport: None,
            generation: 0,
            next_pending: 0,
            pending: Vec::new(),
        }
    }

    pub fn id(&self) -> RemoteId {
        self.id
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Whether this remote serves `target` with `secret`
    pub fn matches(&self, target: &Target, secret: &[u8]) -> bool {
        self.target == *target && self.secret == secret
    }

    /// Number of requests still tracked, including ones that timed out
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Build a request and send its first attempt
    ///
    /// The identifier avoids every request still tracked here. `timeout`
    /// is the budget for all `retries + 1` attempts together and must be
    /// non-zero. Opens the connection if there is none; a socket that
    /// cannot be opened fails the send and the callback is dropped
    /// without running. Must be called from within a Tokio runtime.
    pub fn send(
        &mut self,
        code: Code,
        attrs: &AttributeSet,
        callback: Callback,
        timeout: Duration,
        retries: usize,
    ) -> Result<PendingId, ClientError> {
        if timeout.is_zero() {
            return Err(ClientError::ZeroTimeout);
        }

        let request = Packet::new_request(
            &self.secret,
            code,
            attrs,
            self.pending.iter().map(|pending| &pending.request),
        )?;

        if self.transport.is_none() {
            self.connect()?;
        }

        let id = PendingId(self.next_pending);
        self.next_pending += 1;

        let attempts = u32::try_from(retries).unwrap_or(u32::MAX).saturating_add(1);
        let per_attempt = (timeout / attempts).max(MIN_ATTEMPT_TIMEOUT);

        debug!(
            server = %self.target,
            identifier = request.identifier(),
            code = %code,
            timeout_ms = per_attempt.as_millis() as u64,
            retries = retries,
            "Sending request"
        );
        self.transmit(request.encode().to_vec());

        self.pending.push(PendingRequest {
            id,
            request,
            callback,
            timeout: per_attempt,
            retries_left: retries,
            deadline: Some(Instant::now() + per_attempt),
        });

        Ok(id)
    }

    /// Cancel one request
    ///
    /// Its callback receives [`RequestError::Canceled`] before this
    /// returns. Returns false, doing nothing, if the request already
    /// completed.
    pub fn cancel(&mut self, id: PendingId) -> bool {
        let Some(position) = self.pending.iter().position(|pending| pending.id == id) else {
            return false;
        };

        let mut pending = self.pending.remove(position);
        debug!(
            server = %self.target,
            identifier = pending.request.identifier(),
            "Request canceled"
        );
        (pending.callback)(Err(RequestError::Canceled));
        true
    }

    /// Cancel every tracked request
    pub fn cancel_all(&mut self) {
        for mut pending in std::mem::take(&mut self.pending) {
            (pending.callback)(Err(RequestError::Canceled));
        }
    }

    /// Process an event from this remote's transport
    pub fn handle_event(&mut self, event: TransportEvent) {
        if event.remote != self.id || event.generation != self.generation {
            return;
        }

        match event.kind {
            TransportEventKind::Packet(bytes) => self.handle_packet(&bytes),
            TransportEventKind::Failed(error) => {
                // Requests stay tracked; the next retransmission reconnects
                warn!(server = %self.target, error = %error, "Connection to RADIUS server lost");
                self.transport = None;
            }
        }
    }

    fn handle_packet(&mut self, bytes: &[u8]) {
        let decoded = Packet::decode_response(
            &self.secret,
            bytes,
            self.pending.iter().map(|pending| &pending.request),
        );

        let (identifier, response) = match decoded {
            Ok((Some(request), response)) => (request.identifier(), response),
            Ok((None, response)) => {
                debug!(
                    server = %self.target,
                    identifier = response.identifier(),
                    code = %response.code(),
                    "Discarding response that matches no request"
                );
                return;
            }
            Err(e) => {
                debug!(server = %self.target, error = %e, "Discarding malformed packet");
                return;
            }
        };

        if let Some(position) = self
            .pending
            .iter()
            .position(|pending| pending.request.identifier() == identifier)
        {
            let mut pending = self.pending.remove(position);
            debug!(
                server = %self.target,
                identifier = identifier,
                code = %response.code(),
                "Received response"
            );
            (pending.callback)(Ok(&response));
        }
    }

    /// Retransmit or time out every request whose deadline is at or before `now`
    pub fn handle_timeout(&mut self, now: Instant) {
        for index in 0..self.pending.len() {
            let pending = &mut self.pending[index];
            if !pending.deadline.is_some_and(|deadline| deadline <= now) {
                continue;
            }

            if pending.retries_left > 0 {
                pending.retries_left -= 1;
                pending.deadline = Some(now + pending.timeout);
                let retries_left = pending.retries_left;
                let identifier = pending.request.identifier();
                let bytes = pending.request.encode().to_vec();

                debug!(
                    server = %self.target,
                    identifier = identifier,
                    retries_left = retries_left,
                    "Retransmitting request"
                );
                self.transmit(bytes);
            } else {
                pending.deadline = None;
                info!(
                    server = %self.target,
                    identifier = pending.request.identifier(),
                    "Request timed out"
                );
                (pending.callback)(Err(RequestError::Timeout));
            }
        }
    }

    /// Earliest deadline of any request still being retried
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.pending.iter().filter_map(|pending| pending.deadline).min()
    }

    /// Open a new connection generation
    fn connect(&mut self) -> Result<(), ClientError> {
        self.generation += 1;
        debug!(server = %self.target, generation = self.generation, "Connecting to RADIUS server");
        match Transport::connect(&self.target, self.id, self.generation, self.events.clone()) {
            Ok(transport) => {
                self.transport = Some(transport);
                Ok(())
            }
            Err(e) => {
                self.transport = None;
                Err(ClientError::Io(e))
            }
        }
    }

    /// Hand bytes to the transport, reconnecting if it is gone
    ///
    /// A failed reconnect leaves the request to its timer.
    fn transmit(&mut self, bytes: Vec<u8>) {
        if let Some(transport) = &self.transport
            && transport.send(bytes.clone())
        {
            return;
        }

        if let Err(e) = self.connect() {
            warn!(server = %self.target, error = %e, "Failed to reconnect to RADIUS server");
            return;
        }
        if let Some(transport) = &self.transport
            && !transport.send(bytes)
        {
            warn!(server = %self.target, "Transport exited before first send");
        }
    }
}

impl Drop for Remote {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_proto::{AttributeType, PacketError};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tokio::net::UdpSocket;

    const SECRET: &[u8] = b"testing123";

    type Outcomes = Rc<RefCell<Vec<Result<Code, RequestError>>>>;

    fn recorder() -> (Outcomes, Callback) {
        let outcomes: Outcomes = Rc::default();
        let sink = outcomes.clone();
        let callback: Callback = Box::new(move |result: Result<&Packet, RequestError>| {
            sink.borrow_mut().push(result.map(Packet::code));
        });
        (outcomes, callback)
    }

    fn attrs() -> AttributeSet {
        let mut attrs = AttributeSet::new();
        attrs.add(AttributeType::UserName.as_u8(), b"testUser").unwrap();
        attrs.add(AttributeType::UserPassword.as_u8(), b"accept").unwrap();
        attrs
    }

    async fn silent_server() -> (UdpSocket, Target) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = Target::Udp(socket.local_addr().unwrap());
        (socket, target)
    }

    #[tokio::test]
    async fn test_matches() {
        let (events, _rx) = mpsc::unbounded_channel();
        let target = Target::Udp("127.0.0.1:1812".parse().unwrap());
        let remote = Remote::new(RemoteId(1), target.clone(), SECRET, events);

        assert!(remote.matches(&target, SECRET));
        assert!(!remote.matches(&target, b"other"));
        assert!(!remote.matches(&Target::Udp("127.0.0.1:1813".parse().unwrap()), SECRET));
    }

    #[tokio::test]
    async fn test_response_completes_request() {
        let (server, target) = silent_server().await;
        let (events, mut rx) = mpsc::unbounded_channel();
        let mut remote = Remote::new(RemoteId(1), target, SECRET, events);

        let (outcomes, callback) = recorder();
        remote
            .send(Code::ACCESS_REQUEST, &attrs(), callback, Duration::from_secs(5), 0)
            .unwrap();

        let mut buf = [0u8; 4096];
        let (len, from) = server.recv_from(&mut buf).await.unwrap();
        let request = Packet::decode(SECRET, &buf[..len]).unwrap();
        let response = Packet::new_response(SECRET, Code::ACCESS_ACCEPT, &AttributeSet::new(), &request).unwrap();
        server.send_to(response.encode(), from).await.unwrap();

        let event = rx.recv().await.unwrap();
        remote.handle_event(event);

        assert_eq!(*outcomes.borrow(), vec![Ok(Code::ACCESS_ACCEPT)]);
        assert_eq!(remote.pending_count(), 0);
        assert!(remote.poll_timeout().is_none());
    }

    #[tokio::test]
    async fn test_forged_response_is_ignored() {
        let (server, target) = silent_server().await;
        let (events, mut rx) = mpsc::unbounded_channel();
        let mut remote = Remote::new(RemoteId(1), target, SECRET, events);

        let (outcomes, callback) = recorder();
        remote
            .send(Code::ACCESS_REQUEST, &attrs(), callback, Duration::from_secs(5), 0)
            .unwrap();

        let mut buf = [0u8; 4096];
        let (len, from) = server.recv_from(&mut buf).await.unwrap();
        let request = Packet::decode(SECRET, &buf[..len]).unwrap();
        let forged = Packet::new_response(b"guess", Code::ACCESS_ACCEPT, &AttributeSet::new(), &request).unwrap();
        server.send_to(forged.encode(), from).await.unwrap();

        let event = rx.recv().await.unwrap();
        remote.handle_event(event);

        assert!(outcomes.borrow().is_empty());
        assert_eq!(remote.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_retransmissions_are_identical() {
        let (server, target) = silent_server().await;
        let (events, _rx) = mpsc::unbounded_channel();
        let mut remote = Remote::new(RemoteId(1), target, SECRET, events);

        let (outcomes, callback) = recorder();
        remote
            .send(Code::ACCESS_REQUEST, &attrs(), callback, Duration::from_millis(300), 2)
            .unwrap();

        let mut first = [0u8; 4096];
        let (len, _) = server.recv_from(&mut first).await.unwrap();

        // Each attempt gets a third of the budget
        let deadline = remote.poll_timeout().unwrap();
        assert!(deadline <= Instant::now() + Duration::from_millis(100));

        for _ in 0..2 {
            remote.handle_timeout(remote.poll_timeout().unwrap());
            let mut again = [0u8; 4096];
            let (again_len, _) = server.recv_from(&mut again).await.unwrap();
            assert_eq!(&again[..again_len], &first[..len]);
        }
        assert!(outcomes.borrow().is_empty());

        remote.handle_timeout(remote.poll_timeout().unwrap());
        assert_eq!(*outcomes.borrow(), vec![Err(RequestError::Timeout)]);
        // Timed out but still listening
        assert_eq!(remote.pending_count(), 1);
        assert!(remote.poll_timeout().is_none());
    }

    #[tokio::test]
    async fn test_cancel_fires_once() {
        let (_server, target) = silent_server().await;
        let (events, _rx) = mpsc::unbounded_channel();
        let mut remote = Remote::new(RemoteId(1), target, SECRET, events);

        let (outcomes, callback) = recorder();
        let id = remote
            .send(Code::ACCESS_REQUEST, &attrs(), callback, Duration::from_secs(5), 3)
            .unwrap();

        assert!(remote.cancel(id));
        assert!(!remote.cancel(id));
        assert_eq!(*outcomes.borrow(), vec![Err(RequestError::Canceled)]);
        assert_eq!(remote.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_cancels_timed_out_requests() {
        let (_server, target) = silent_server().await;
        let (events, _rx) = mpsc::unbounded_channel();
        let mut remote = Remote::new(RemoteId(1), target, SECRET, events);

        let (outcomes, callback) = recorder();
        remote
            .send(Code::ACCESS_REQUEST, &attrs(), callback, Duration::from_millis(10), 0)
            .unwrap();
        remote.handle_timeout(Instant::now() + Duration::from_secs(1));
        drop(remote);

        assert_eq!(
            *outcomes.borrow(),
            vec![Err(RequestError::Timeout), Err(RequestError::Canceled)]
        );
    }

    #[tokio::test]
    async fn test_identifiers_are_unique_per_remote() {
        let (_server, target) = silent_server().await;
        let (events, _rx) = mpsc::unbounded_channel();
        let mut remote = Remote::new(RemoteId(1), target, SECRET, events);

        for _ in 0..256 {
            let (_, callback) = recorder();
            remote
                .send(Code::ACCESS_REQUEST, &attrs(), callback, Duration::from_secs(30), 0)
                .unwrap();
        }

        let (_, callback) = recorder();
        assert!(matches!(
            remote
                .send(Code::ACCESS_REQUEST, &attrs(), callback, Duration::from_secs(30), 0)
                .unwrap_err(),
            ClientError::Packet(PacketError::RangeExhausted)
        ));
        assert_eq!(remote.pending_count(), 256);
    }

    #[tokio::test]
    async fn test_stale_generation_is_ignored() {
        let (_server, target) = silent_server().await;
        let (events, _rx) = mpsc::unbounded_channel();
        let mut remote = Remote::new(RemoteId(1), target, SECRET, events);

        let (_, callback) = recorder();
        remote
            .send(Code::ACCESS_REQUEST, &attrs(), callback, Duration::from_secs(5), 0)
            .unwrap();

        remote.handle_event(TransportEvent {
            remote: RemoteId(1),
            generation: 0,
            kind: TransportEventKind::Failed(std::io::ErrorKind::ConnectionRefused.into()),
        });
        assert!(remote.transport.is_some());

        remote.handle_event(TransportEvent {
            remote: RemoteId(1),
            generation: 1,
            kind: TransportEventKind::Failed(std::io::ErrorKind::ConnectionRefused.into()),
        });
        assert!(remote.transport.is_none());
        assert_eq!(remote.pending_count(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreachable_stream_fails_send() {
        let (events, _rx) = mpsc::unbounded_channel();
        let target = Target::Stream("/nonexistent/radius.sock".into());
        let mut remote = Remote::new(RemoteId(1), target, b"", events);

        let (outcomes, callback) = recorder();
        let result = remote.send(Code::ACCESS_REQUEST, &attrs(), callback, Duration::from_secs(5), 2);

        assert!(matches!(result, Err(ClientError::Io(_))));
        assert!(outcomes.borrow().is_empty());
        assert_eq!(remote.pending_count(), 0);
        assert!(remote.poll_timeout().is_none());
    }

    #[tokio::test]
    async fn test_zero_timeout_is_rejected() {
        let (_server, target) = silent_server().await;
        let (events, _rx) = mpsc::unbounded_channel();
        let mut remote = Remote::new(RemoteId(1), target, SECRET, events);

        let (_, callback) = recorder();
        let result = remote.send(Code::ACCESS_REQUEST, &attrs(), callback, Duration::ZERO, 100);
        assert!(matches!(result, Err(ClientError::ZeroTimeout)));
        assert_eq!(remote.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_tiny_timeout_still_waits_between_attempts() {
        let (_server, target) = silent_server().await;
        let (events, _rx) = mpsc::unbounded_channel();
        let mut remote = Remote::new(RemoteId(1), target, SECRET, events);

        let (_, callback) = recorder();
        remote
            .send(Code::ACCESS_REQUEST, &attrs(), callback, Duration::from_nanos(1), 1000)
            .unwrap();

        let now = Instant::now();
        remote.handle_timeout(now + Duration::from_secs(1));
        let next = remote.poll_timeout().unwrap();
        assert!(next >= now + Duration::from_secs(1) + MIN_ATTEMPT_TIMEOUT);
    }
}
