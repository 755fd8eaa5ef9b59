//! Multi-address client session
//!
//! A [`Client`] owns one [`Remote`] per distinct (target, secret) pair and
//! fans each logical request out across the addresses of its server. The
//! caller's timeout is split evenly across the addresses, and each
//! remote splits its share again across its retries. When one address
//! times out the next one is tried; the handler given to
//! [`Client::send`] runs exactly once with the first definitive outcome.

use crate::error::{ClientError, RequestError};
use crate::remote::{Callback, PendingId, Remote};
use crate::transport::{RemoteId, Target, TransportEvent, resolve};
use radius_proto::{AttributeSet, Code, Packet};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

/// Receives the outcome of a logical request, exactly once
pub type ResponseHandler = Box<dyn FnOnce(Result<Packet, RequestError>)>;

/// Identifies a logical request issued by a [`Client`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

/// Result of one per-address attempt, queued until the client is free to act on it
struct Notice {
    request: RequestId,
    attempt: usize,
    outcome: Result<Packet, RequestError>,
}

struct MultiAddressRequest {
    code: Code,
    attrs: AttributeSet,
    /// Index into `Client::remotes` for each candidate address
    remotes: Vec<usize>,
    /// Attempts started so far; attempt `n` went to `remotes[n]`
    attempts: Vec<PendingId>,
    /// Budget for each address
    timeout: Duration,
    retries: usize,
    handler: ResponseHandler,
}

/// RADIUS client session
///
/// All state lives in the task that drives the client; socket I/O happens
/// on tasks spawned per connection, so the client must be used from
/// within a Tokio runtime.
pub struct Client {
    remotes: Vec<Remote>,
    requests: HashMap<RequestId, MultiAddressRequest>,
    notices: Rc<RefCell<VecDeque<Notice>>>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    next_request: u64,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Client {
            remotes: Vec::new(),
            requests: HashMap::new(),
            notices: Rc::default(),
            events_tx,
            events_rx,
            next_request: 0,
        }
    }

    /// Send a request to `server`
    ///
    /// `server` is resolved with [`resolve`]; every resolved address is a
    /// candidate, tried in order. `handler` runs exactly once, from
    /// [`Client::dispatch`], [`Client::cancel`] or [`Client::close`].
    #[allow(clippy::too_many_arguments)]
    pub async fn send<F>(
        &mut self,
        code: Code,
        attrs: &AttributeSet,
        server: &str,
        secret: &[u8],
        timeout: Duration,
        retries: usize,
        handler: F,
    ) -> Result<RequestId, ClientError>
    where
        F: FnOnce(Result<Packet, RequestError>) + 'static,
    {
        let targets = resolve(server).await?;
        self.send_to(code, attrs, &targets, secret, timeout, retries, handler)
    }

    /// Send a request to an explicit, ordered list of targets
    ///
    /// The first target is contacted before this returns; if its socket
    /// cannot be opened the request fails with [`ClientError::Io`] and
    /// `handler` never runs. When a later target cannot be opened during
    /// failover, `handler` receives [`RequestError::Io`].
    #[allow(clippy::too_many_arguments)]
    pub fn send_to<F>(
        &mut self,
        code: Code,
        attrs: &AttributeSet,
        targets: &[Target],
        secret: &[u8],
        timeout: Duration,
        retries: usize,
        handler: F,
    ) -> Result<RequestId, ClientError>
    where
        F: FnOnce(Result<Packet, RequestError>) + 'static,
    {
        if targets.is_empty() {
            return Err(ClientError::NoAddresses("empty target list".to_string()));
        }

        let remotes = targets
            .iter()
            .map(|target| self.remote_for(target, secret))
            .collect();
        let addresses = u32::try_from(targets.len()).unwrap_or(u32::MAX);

        let id = RequestId(self.next_request);
        self.next_request += 1;

        let mut request = MultiAddressRequest {
            code,
            attrs: attrs.clone(),
            remotes,
            attempts: Vec::with_capacity(targets.len()),
            timeout: timeout / addresses,
            retries,
            handler: Box::new(handler),
        };
        self.start_attempt(id, &mut request)?;
        self.requests.insert(id, request);

        Ok(id)
    }

    /// Cancel a logical request
    ///
    /// Its handler receives [`RequestError::Canceled`] before this returns.
    /// Returns false if the request already completed.
    pub fn cancel(&mut self, id: RequestId) -> bool {
        let Some(request) = self.requests.remove(&id) else {
            return false;
        };

        self.complete(request, Err(RequestError::Canceled));
        self.process_notices();
        true
    }

    /// Wait for the next transport event or timer deadline and process it
    ///
    /// Never returns while the client is idle with nothing to wait for.
    pub async fn dispatch(&mut self) {
        let deadline = self.poll_timeout();
        let timer = async move {
            match deadline {
                Some(deadline) => time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        let event = tokio::select! {
            event = self.events_rx.recv() => event,
            () = timer => None,
        };

        if let Some(event) = event {
            self.handle_event(event);
        }
        self.handle_timeout(Instant::now());
    }

    /// Dispatch until every logical request has completed
    pub async fn run_until_idle(&mut self) {
        while !self.is_idle() {
            self.dispatch().await;
        }
    }

    /// Route a transport event to its remote
    pub fn handle_event(&mut self, event: TransportEvent) {
        let index = event.remote.0 as usize;
        if let Some(remote) = self.remotes.get_mut(index) {
            remote.handle_event(event);
        }
        self.process_notices();
    }

    /// Advance every remote's timers to `now`
    pub fn handle_timeout(&mut self, now: Instant) {
        for remote in &mut self.remotes {
            remote.handle_timeout(now);
        }
        self.process_notices();
    }

    /// Earliest deadline across all remotes
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.remotes
            .iter()
            .filter_map(Remote::poll_timeout)
            .min()
    }

    /// Whether no logical request is outstanding
    pub fn is_idle(&self) -> bool {
        self.requests.is_empty()
    }

    /// Number of logical requests outstanding
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    /// Number of distinct (target, secret) connections
    pub fn remote_count(&self) -> usize {
        self.remotes.len()
    }

    /// Cancel everything
    ///
    /// Every remote is canceled before any handler runs, so a request with
    /// attempts on several remotes completes once, with
    /// [`RequestError::Canceled`].
    pub fn close(&mut self) {
        for remote in &mut self.remotes {
            remote.cancel_all();
        }
        self.process_notices();

        let leftover: Vec<MultiAddressRequest> =
            self.requests.drain().map(|(_, request)| request).collect();
        for request in leftover {
            (request.handler)(Err(RequestError::Canceled));
        }
    }

    fn remote_for(&mut self, target: &Target, secret: &[u8]) -> usize {
        if let Some(index) = self
            .remotes
            .iter()
            .position(|remote| remote.matches(target, secret))
        {
            return index;
        }

        let index = self.remotes.len();
        info!(server = %target, "Adding RADIUS server");
        self.remotes.push(Remote::new(
            RemoteId(index as u64),
            target.clone(),
            secret,
            self.events_tx.clone(),
        ));
        index
    }

    /// Send the next attempt of `request` through its next address
    fn start_attempt(
        &mut self,
        id: RequestId,
        request: &mut MultiAddressRequest,
    ) -> Result<(), ClientError> {
        let attempt = request.attempts.len();
        let remote = &mut self.remotes[request.remotes[attempt]];

        let notices = Rc::clone(&self.notices);
        let callback: Callback = Box::new(move |result: Result<&Packet, RequestError>| {
            notices.borrow_mut().push_back(Notice {
                request: id,
                attempt,
                outcome: result.cloned(),
            });
        });

        if attempt > 0 {
            debug!(server = %remote.target(), attempt = attempt, "Trying next address");
        }
        let pending = remote.send(
            request.code,
            &request.attrs,
            callback,
            request.timeout,
            request.retries,
        )?;
        request.attempts.push(pending);
        Ok(())
    }

    fn process_notices(&mut self) {
        loop {
            let notice = self.notices.borrow_mut().pop_front();
            let Some(notice) = notice else {
                break;
            };
            self.handle_notice(notice);
        }
    }

    fn handle_notice(&mut self, notice: Notice) {
        let Some(mut request) = self.requests.remove(&notice.request) else {
            // Already completed; this is a canceled sibling attempt
            return;
        };

        let latest = notice.attempt + 1 == request.attempts.len();
        let outcome = match notice.outcome {
            Err(RequestError::Timeout) if !latest => {
                self.requests.insert(notice.request, request);
                return;
            }
            Err(RequestError::Timeout) if request.attempts.len() < request.remotes.len() => {
                match self.start_attempt(notice.request, &mut request) {
                    Ok(()) => {
                        self.requests.insert(notice.request, request);
                        return;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to start attempt on next address");
                        Err(RequestError::from(e))
                    }
                }
            }
            outcome => outcome,
        };

        self.complete(request, outcome);
    }

    /// Run the handler, then cancel every other attempt still listening
    fn complete(&mut self, request: MultiAddressRequest, outcome: Result<Packet, RequestError>) {
        let MultiAddressRequest {
            remotes,
            attempts,
            handler,
            ..
        } = request;

        handler(outcome);

        for (attempt, pending) in attempts.into_iter().enumerate() {
            self.remotes[remotes[attempt]].cancel(pending);
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_proto::AttributeType;
    use std::cell::Cell;

    fn attrs() -> AttributeSet {
        let mut attrs = AttributeSet::new();
        attrs.add(AttributeType::UserName.as_u8(), b"testUser").unwrap();
        attrs
    }

    fn udp(addr: &str) -> Target {
        Target::Udp(addr.parse().unwrap())
    }

    #[tokio::test]
    async fn test_remotes_are_shared_per_target_and_secret() {
        let mut client = Client::new();
        let timeout = Duration::from_secs(30);

        for _ in 0..3 {
            client
                .send_to(Code::ACCESS_REQUEST, &attrs(), &[udp("127.0.0.1:9")], b"a", timeout, 0, |_| {})
                .unwrap();
        }
        assert_eq!(client.remote_count(), 1);

        client
            .send_to(Code::ACCESS_REQUEST, &attrs(), &[udp("127.0.0.1:9")], b"b", timeout, 0, |_| {})
            .unwrap();
        client
            .send_to(Code::ACCESS_REQUEST, &attrs(), &[udp("127.0.0.1:10")], b"a", timeout, 0, |_| {})
            .unwrap();
        assert_eq!(client.remote_count(), 3);
        assert_eq!(client.pending_requests(), 5);
    }

    #[tokio::test]
    async fn test_empty_target_list() {
        let mut client = Client::new();
        let result = client.send_to(
            Code::ACCESS_REQUEST,
            &attrs(),
            &[],
            b"secret",
            Duration::from_secs(1),
            0,
            |_| {},
        );
        assert!(matches!(result, Err(ClientError::NoAddresses(_))));
        assert!(client.is_idle());
    }

    #[tokio::test]
    async fn test_cancel_runs_handler_once() {
        let mut client = Client::new();
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();

        let id = client
            .send_to(
                Code::ACCESS_REQUEST,
                &attrs(),
                &[udp("127.0.0.1:9"), udp("127.0.0.1:10")],
                b"secret",
                Duration::from_secs(30),
                1,
                move |result| {
                    assert_eq!(result.unwrap_err(), RequestError::Canceled);
                    seen.set(seen.get() + 1);
                },
            )
            .unwrap();

        assert!(client.cancel(id));
        assert!(!client.cancel(id));
        assert_eq!(calls.get(), 1);
        assert!(client.is_idle());

        drop(client);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_drop_cancels_outstanding_requests() {
        let mut client = Client::new();
        let outcome = Rc::new(RefCell::new(None));
        let slot = outcome.clone();

        client
            .send_to(
                Code::ACCESS_REQUEST,
                &attrs(),
                &[udp("127.0.0.1:9")],
                b"secret",
                Duration::from_secs(30),
                0,
                move |result| *slot.borrow_mut() = Some(result),
            )
            .unwrap();
        drop(client);

        assert_eq!(*outcome.borrow(), Some(Err(RequestError::Canceled)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failover_to_unreachable_stream_reports_io_error() {
        let silent = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut client = Client::new();
        let outcome = Rc::new(RefCell::new(None));
        let slot = outcome.clone();

        client
            .send_to(
                Code::ACCESS_REQUEST,
                &attrs(),
                &[
                    Target::Udp(silent.local_addr().unwrap()),
                    Target::Stream("/nonexistent/radius.sock".into()),
                ],
                b"",
                Duration::from_millis(100),
                0,
                move |result| *slot.borrow_mut() = Some(result),
            )
            .unwrap();

        client.handle_timeout(Instant::now() + Duration::from_secs(1));

        assert_eq!(
            *outcome.borrow(),
            Some(Err(RequestError::Io(std::io::ErrorKind::NotFound)))
        );
        assert!(client.is_idle());
    }
}
