//! The listening side of the bridge.

use super::{BridgeError, BridgeResult, BridgeState, InboundHandler};
use crate::config::Settings;
use crate::envelope::{MessageEnvelope, SharedClock};
use std::mem;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};

/// Number of poll intervals `send_message` waits for queue space.
const ENQUEUE_POLLS: u32 = 10;

/// Number of poll intervals `stop` waits for each loop to finish.
const JOIN_POLLS: u32 = 10;

/// Longest inbound frame accepted from a client.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Listening address and queue settings for a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Address the listener binds to.
    pub bind_address: IpAddr,
    /// Upper bound on how long any bridge loop waits before re-checking
    /// the running flag.
    pub poll_interval: Duration,
    /// Capacity of the inbound and outbound queues.
    pub queue_capacity: usize,
    /// Idle time after a client's end of input before its connection is
    /// closed.
    pub linger: Duration,
}

impl BridgeConfig {
    /// Extracts bridge settings from the application settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            bind_address: settings.ports.bind_address,
            poll_interval: settings.bridge.poll_interval(),
            queue_capacity: settings.bridge.queue_capacity.max(1),
            linger: settings.bridge.linger(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            poll_interval: Duration::from_millis(200),
            queue_capacity: 256,
            linger: Duration::from_secs(5),
        }
    }
}

struct Shared {
    instance_key: String,
    config: BridgeConfig,
    clock: SharedClock,
    running: AtomicBool,
    state: Mutex<BridgeState>,
    outbound: tokio::sync::Mutex<mpsc::Receiver<MessageEnvelope>>,
    carry_over: Mutex<Option<MessageEnvelope>>,
    handler: RwLock<Option<Arc<dyn InboundHandler>>>,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: BridgeState) {
        *lock(&self.state) = state;
    }

    fn handler(&self) -> Option<Arc<dyn InboundHandler>> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn take_carry_over(&self) -> Option<MessageEnvelope> {
        lock(&self.carry_over).take()
    }

    fn keep_carry_over(&self, envelope: MessageEnvelope) {
        *lock(&self.carry_over) = Some(envelope);
    }
}

/// Exposes one tool instance on a TCP port.
///
/// At most one client is served at a time; further connections wait in the
/// listen backlog until the current client disconnects. A client that only
/// closes its write side keeps receiving replies for the configured linger.
/// An outbound message whose write fails is kept and delivered first to the
/// next client. Frames longer than [`MAX_FRAME_BYTES`] drop the connection.
pub struct SocketBridge {
    shared: Arc<Shared>,
    outbound: mpsc::Sender<MessageEnvelope>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    port: Mutex<Option<u16>>,
}

impl SocketBridge {
    /// Creates a stopped bridge for `instance_key`.
    #[must_use]
    pub fn new(instance_key: impl Into<String>, config: BridgeConfig, clock: SharedClock) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.queue_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                instance_key: instance_key.into(),
                config,
                clock,
                running: AtomicBool::new(false),
                state: Mutex::new(BridgeState::Stopped),
                outbound: tokio::sync::Mutex::new(outbound_rx),
                carry_over: Mutex::new(None),
                handler: RwLock::new(None),
            }),
            outbound: outbound_tx,
            tasks: tokio::sync::Mutex::new(Vec::new()),
            port: Mutex::new(None),
        }
    }

    /// Returns the instance key frames are tagged with.
    #[must_use]
    pub fn instance_key(&self) -> &str {
        &self.shared.instance_key
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BridgeState {
        *lock(&self.shared.state)
    }

    /// Returns `true` between a successful `start` and `stop`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Returns the bound port while running.
    #[must_use]
    pub fn local_port(&self) -> Option<u16> {
        *lock(&self.port)
    }

    /// Installs the consumer of inbound envelopes, replacing any previous
    /// one. Envelopes dequeued while no handler is installed are dropped.
    pub fn set_handler(&self, handler: Arc<dyn InboundHandler>) {
        *self
            .shared
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Binds `port` and starts the accept and dispatch loops.
    ///
    /// Port `0` binds an ephemeral port. Returns the bound port.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::AlreadyRunning`] or [`BridgeError::Bind`].
    pub async fn start(&self, port: u16) -> BridgeResult<u16> {
        let mut tasks = self.tasks.lock().await;
        if self.shared.is_running() {
            return Err(BridgeError::AlreadyRunning);
        }

        let address = SocketAddr::new(self.shared.config.bind_address, port);
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| BridgeError::Bind { port, source })?;
        let bound = listener
            .local_addr()
            .map_err(|source| BridgeError::Bind { port, source })?
            .port();

        self.shared.running.store(true, Ordering::SeqCst);
        self.shared.set_state(BridgeState::Listening);
        *lock(&self.port) = Some(bound);

        let (inbound_tx, inbound_rx) = mpsc::channel(self.shared.config.queue_capacity.max(1));
        tasks.push(tokio::spawn(accept_loop(
            Arc::clone(&self.shared),
            listener,
            inbound_tx,
        )));
        tasks.push(tokio::spawn(dispatch_loop(
            Arc::clone(&self.shared),
            inbound_rx,
        )));
        tracing::info!(instance = %self.shared.instance_key, port = bound, "bridge listening");
        Ok(bound)
    }

    /// Stops every loop, closes the socket and discards queued messages.
    ///
    /// Safe to call on a stopped bridge.
    pub async fn stop(&self) {
        let mut tasks = self.tasks.lock().await;
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);

        let join_limit = self.shared.config.poll_interval.saturating_mul(JOIN_POLLS);
        for mut task in mem::take(&mut *tasks) {
            match timeout(join_limit, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::warn!(error = %err, "bridge task failed"),
                Err(_) => {
                    tracing::debug!(instance = %self.shared.instance_key, "aborting bridge task");
                    task.abort();
                }
            }
        }

        let mut discarded = 0_usize;
        {
            let mut outbound = self.shared.outbound.lock().await;
            while outbound.try_recv().is_ok() {
                discarded = discarded.saturating_add(1);
            }
        }
        if self.shared.take_carry_over().is_some() {
            discarded = discarded.saturating_add(1);
        }

        self.shared.set_state(BridgeState::Stopped);
        *lock(&self.port) = None;
        if was_running {
            tracing::info!(
                instance = %self.shared.instance_key,
                discarded,
                "bridge stopped"
            );
        }
    }

    /// Queues an envelope for the connected client.
    ///
    /// Messages queued while no client is connected are delivered to the
    /// next client.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotRunning`] when the bridge is stopped and
    /// [`BridgeError::QueueFull`] when the queue stays full.
    pub async fn send_message(&self, envelope: MessageEnvelope) -> BridgeResult<()> {
        if !self.shared.is_running() {
            return Err(BridgeError::NotRunning);
        }
        let poll = self.shared.config.poll_interval;
        let mut pending = envelope;
        for _ in 0..ENQUEUE_POLLS {
            match self.outbound.send_timeout(pending, poll).await {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => {
                    if !self.shared.is_running() {
                        return Err(BridgeError::NotRunning);
                    }
                    pending = returned;
                }
                Err(SendTimeoutError::Closed(_)) => return Err(BridgeError::NotRunning),
            }
        }
        Err(BridgeError::QueueFull)
    }
}

async fn accept_loop(
    shared: Arc<Shared>,
    listener: TcpListener,
    inbound: mpsc::Sender<MessageEnvelope>,
) {
    let poll = shared.config.poll_interval;
    let mut waiting = None;
    while shared.is_running() {
        let (stream, peer) = match waiting.take() {
            Some(accepted) => accepted,
            None => match timeout(poll, listener.accept()).await {
                Err(_) => continue,
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "accept failed");
                    tokio::time::sleep(poll).await;
                    continue;
                }
                Ok(Ok(accepted)) => accepted,
            },
        };

        shared.set_state(BridgeState::Connected);
        tracing::info!(instance = %shared.instance_key, %peer, "client connected");
        waiting = serve_connection(&shared, &listener, stream, &inbound).await;
        tracing::info!(instance = %shared.instance_key, %peer, "client disconnected");
        if shared.is_running() {
            shared.set_state(BridgeState::Listening);
        }
    }
}

/// Serves one client until it disconnects.
///
/// After the client closes its write side, replies keep flowing until the
/// linger expires or another client connects; that client is returned so
/// it is served next.
async fn serve_connection(
    shared: &Arc<Shared>,
    listener: &TcpListener,
    stream: TcpStream,
    inbound: &mpsc::Sender<MessageEnvelope>,
) -> Option<(TcpStream, SocketAddr)> {
    if let Err(err) = stream.set_nodelay(true) {
        tracing::debug!(error = %err, "failed to set TCP_NODELAY");
    }
    let (read_half, write_half) = stream.into_split();
    let flags = ConnectionFlags::default();

    let receiver = tokio::spawn(receive_loop(
        Arc::clone(shared),
        read_half,
        inbound.clone(),
        flags.clone(),
    ));
    let mut sender = tokio::spawn(send_loop(Arc::clone(shared), write_half, flags.clone()));

    report_task(receiver.await);
    let mut successor = None;
    if flags.input_closed() && flags.is_open() {
        tokio::select! {
            outcome = &mut sender => {
                report_task(outcome);
                return None;
            }
            accepted = listener.accept() => match accepted {
                Ok(next) => {
                    tracing::debug!(instance = %shared.instance_key, "client waiting; ending linger");
                    flags.close();
                    successor = Some(next);
                }
                Err(err) => tracing::warn!(error = %err, "accept failed"),
            },
        }
    }
    report_task(sender.await);
    successor
}

fn report_task(outcome: Result<(), tokio::task::JoinError>) {
    if let Err(err) = outcome {
        tracing::warn!(error = %err, "connection task failed");
    }
}

/// State shared by the two halves of one connection.
#[derive(Clone)]
struct ConnectionFlags {
    open: Arc<AtomicBool>,
    input_closed: Arc<AtomicBool>,
}

impl Default for ConnectionFlags {
    fn default() -> Self {
        Self {
            open: Arc::new(AtomicBool::new(true)),
            input_closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl ConnectionFlags {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn input_closed(&self) -> bool {
        self.input_closed.load(Ordering::SeqCst)
    }

    fn close_input(&self) {
        self.input_closed.store(true, Ordering::SeqCst);
    }
}

async fn receive_loop(
    shared: Arc<Shared>,
    read_half: OwnedReadHalf,
    inbound: mpsc::Sender<MessageEnvelope>,
    flags: ConnectionFlags,
) {
    let poll = shared.config.poll_interval;
    let mut reader = BufReader::new(read_half);
    let mut buffer = Vec::new();

    while shared.is_running() && flags.is_open() {
        let room = u64::try_from(MAX_FRAME_BYTES.saturating_sub(buffer.len())).unwrap_or(u64::MAX);
        match timeout(poll, (&mut reader).take(room).read_until(b'\n', &mut buffer)).await {
            // Partial bytes stay in `buffer` until the rest of the frame arrives.
            Err(_) => continue,
            Ok(Ok(0)) => {
                tracing::debug!(instance = %shared.instance_key, "client finished sending");
                flags.close_input();
                return;
            }
            Ok(Ok(_)) => {
                if buffer.len() >= MAX_FRAME_BYTES && !buffer.ends_with(b"\n") {
                    tracing::warn!(
                        instance = %shared.instance_key,
                        limit = MAX_FRAME_BYTES,
                        "client frame exceeds the size limit; dropping connection"
                    );
                    break;
                }
                let frame = mem::take(&mut buffer);
                accept_frame(&shared, &frame, &inbound).await;
            }
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "client read failed");
                break;
            }
        }
    }
    flags.close();
}

async fn accept_frame(shared: &Shared, frame: &[u8], inbound: &mpsc::Sender<MessageEnvelope>) {
    let text = String::from_utf8_lossy(frame);
    let line = text.trim();
    if line.is_empty() {
        return;
    }

    let decoded = match MessageEnvelope::decode(line, shared.clock.utc()) {
        Ok(envelope) => Some(envelope),
        Err(err) => {
            tracing::debug!(error = %err, "frame is not an envelope; trying adapter decoding");
            shared
                .handler()
                .and_then(|handler| handler.decode_fallback(line))
        }
    };
    let Some(mut envelope) = decoded else {
        tracing::warn!(instance = %shared.instance_key, "dropping undecodable client frame");
        return;
    };
    envelope.tag_source(&shared.instance_key);

    let mut pending = envelope;
    loop {
        match inbound
            .send_timeout(pending, shared.config.poll_interval)
            .await
        {
            Ok(()) => return,
            Err(SendTimeoutError::Timeout(returned)) => {
                if !shared.is_running() {
                    return;
                }
                pending = returned;
            }
            Err(SendTimeoutError::Closed(_)) => return,
        }
    }
}

async fn send_loop(shared: Arc<Shared>, mut writer: OwnedWriteHalf, flags: ConnectionFlags) {
    let poll = shared.config.poll_interval;
    let linger = shared.config.linger;
    let mut outbound = shared.outbound.lock().await;
    let mut linger_until = None;

    while shared.is_running() && flags.is_open() {
        if flags.input_closed() {
            let until = *linger_until.get_or_insert_with(|| deadline_after(linger));
            if Instant::now() >= until {
                tracing::debug!(instance = %shared.instance_key, "linger expired; closing connection");
                break;
            }
        }

        let envelope = match shared.take_carry_over() {
            Some(envelope) => envelope,
            None => match timeout(poll, outbound.recv()).await {
                Err(_) => continue,
                Ok(None) => break,
                Ok(Some(envelope)) => envelope,
            },
        };
        if !flags.is_open() {
            shared.keep_carry_over(envelope);
            break;
        }

        let mut frame = match envelope.to_json_line() {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(error = %err, "dropping unencodable envelope");
                continue;
            }
        };
        frame.push('\n');

        let written = match writer.write_all(frame.as_bytes()).await {
            Ok(()) => writer.flush().await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            tracing::debug!(error = %err, "client write failed; keeping message for next client");
            shared.keep_carry_over(envelope);
            break;
        }
        if linger_until.is_some() {
            linger_until = Some(deadline_after(linger));
        }
    }
    flags.close();
}

fn deadline_after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait).unwrap_or(now)
}

async fn dispatch_loop(shared: Arc<Shared>, mut inbound: mpsc::Receiver<MessageEnvelope>) {
    let poll = shared.config.poll_interval;
    while shared.is_running() {
        let envelope = match timeout(poll, inbound.recv()).await {
            Err(_) => continue,
            Ok(None) => break,
            Ok(Some(envelope)) => envelope,
        };
        match shared.handler() {
            Some(handler) => {
                if let Err(err) = handler.handle(envelope).await {
                    tracing::warn!(instance = %shared.instance_key, error = %err, "inbound handler failed");
                }
            }
            None => {
                tracing::warn!(instance = %shared.instance_key, "no inbound handler; dropping message");
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::{BridgeConfig, MAX_FRAME_BYTES, SocketBridge};
    use crate::bridge::{BridgeClient, BridgeError, BridgeState, InboundError, InboundHandler};
    use crate::envelope::{MessageEnvelope, SOURCE_INSTANCE_KEY, message_type};
    use async_trait::async_trait;
    use chrono::Utc;
    use mockable::DefaultClock;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use std::net::{Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const RECEIVE_LIMIT: Duration = Duration::from_secs(5);

    struct Collector {
        seen: mpsc::UnboundedSender<MessageEnvelope>,
    }

    #[async_trait]
    impl InboundHandler for Collector {
        async fn handle(&self, envelope: MessageEnvelope) -> Result<(), InboundError> {
            // The receiving side may already be gone at teardown.
            self.seen.send(envelope).ok();
            Ok(())
        }

        fn decode_fallback(&self, line: &str) -> Option<MessageEnvelope> {
            Some(MessageEnvelope::text(line, Utc::now()))
        }
    }

    #[fixture]
    fn bridge() -> SocketBridge {
        let config = BridgeConfig {
            poll_interval: Duration::from_millis(20),
            ..BridgeConfig::default()
        };
        SocketBridge::new("cat", config, Arc::new(DefaultClock))
    }

    fn address(port: u16) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, port))
    }

    #[rstest]
    #[tokio::test]
    async fn inbound_frames_reach_handler_tagged_with_instance(bridge: SocketBridge) {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        bridge.set_handler(Arc::new(Collector { seen: seen_tx }));
        let port = bridge.start(0).await.expect("bridge starts");

        let mut client = BridgeClient::connect(address(port)).await.expect("connects");
        client
            .send_line(r#"{"type":"user","content":"hello"}"#)
            .await
            .expect("sends");
        client.send_line("plain words").await.expect("sends");

        let first = tokio::time::timeout(RECEIVE_LIMIT, seen_rx.recv())
            .await
            .expect("delivered in time")
            .expect("channel open");
        let second = tokio::time::timeout(RECEIVE_LIMIT, seen_rx.recv())
            .await
            .expect("delivered in time")
            .expect("channel open");

        assert_eq!(first.content(), "hello");
        assert_eq!(first.metadata().get(SOURCE_INSTANCE_KEY), Some(&json!("cat")));
        assert_eq!(second.content(), "plain words");
        assert_eq!(bridge.state(), BridgeState::Connected);

        bridge.stop().await;
        assert_eq!(bridge.state(), BridgeState::Stopped);
    }

    #[rstest]
    #[tokio::test]
    async fn messages_queued_before_connect_are_delivered_in_order(bridge: SocketBridge) {
        let port = bridge.start(0).await.expect("bridge starts");
        for content in ["one", "two", "three"] {
            bridge
                .send_message(MessageEnvelope::new(message_type::RESPONSE, content, Utc::now()))
                .await
                .expect("queued");
        }

        let mut client = BridgeClient::connect(address(port)).await.expect("connects");
        let mut received = Vec::new();
        for _ in 0..3 {
            let envelope = client
                .receive(RECEIVE_LIMIT)
                .await
                .expect("frame decodes")
                .expect("frame arrives");
            received.push(envelope.content().to_owned());
        }

        assert_eq!(received, ["one", "two", "three"]);
        bridge.stop().await;
    }

    #[rstest]
    #[tokio::test]
    async fn send_after_stop_is_rejected(bridge: SocketBridge) {
        bridge.start(0).await.expect("bridge starts");
        bridge.stop().await;

        let error = bridge
            .send_message(MessageEnvelope::new(message_type::RESPONSE, "late", Utc::now()))
            .await
            .expect_err("bridge stopped");

        assert!(matches!(error, BridgeError::NotRunning));
        assert_eq!(bridge.local_port(), None);
    }

    #[rstest]
    #[tokio::test]
    async fn double_start_is_rejected_and_stop_releases_port(bridge: SocketBridge) {
        let port = bridge.start(0).await.expect("bridge starts");
        assert!(matches!(bridge.start(port).await, Err(BridgeError::AlreadyRunning)));

        bridge.stop().await;
        bridge.stop().await;

        let listener = std::net::TcpListener::bind(address(port)).expect("port released");
        drop(listener);
    }

    #[rstest]
    #[tokio::test]
    async fn second_client_is_served_after_first_disconnects(bridge: SocketBridge) {
        let port = bridge.start(0).await.expect("bridge starts");
        let first = BridgeClient::connect(address(port)).await.expect("connects");
        drop(first);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut second = BridgeClient::connect(address(port)).await.expect("connects");
        bridge
            .send_message(MessageEnvelope::new(message_type::RESPONSE, "for second", Utc::now()))
            .await
            .expect("queued");

        let envelope = second
            .receive(RECEIVE_LIMIT)
            .await
            .expect("frame decodes")
            .expect("frame arrives");
        assert_eq!(envelope.content(), "for second");
        bridge.stop().await;
    }

    async fn next_inbound(seen: &mut mpsc::UnboundedReceiver<MessageEnvelope>) -> MessageEnvelope {
        tokio::time::timeout(RECEIVE_LIMIT, seen.recv())
            .await
            .expect("delivered in time")
            .expect("channel open")
    }

    #[rstest]
    #[tokio::test]
    async fn half_closed_client_still_receives_replies(bridge: SocketBridge) {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        bridge.set_handler(Arc::new(Collector { seen: seen_tx }));
        let port = bridge.start(0).await.expect("bridge starts");

        let mut client = BridgeClient::connect(address(port)).await.expect("connects");
        client
            .send(&MessageEnvelope::new(message_type::USER, "question", Utc::now()))
            .await
            .expect("sends");
        client.finish().await.expect("write side closes");
        let question = next_inbound(&mut seen_rx).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        bridge
            .send_message(MessageEnvelope::new(message_type::RESPONSE, "answer", Utc::now()))
            .await
            .expect("queued");
        let reply = client
            .receive(RECEIVE_LIMIT)
            .await
            .expect("connection still open")
            .expect("reply arrives");

        assert_eq!(question.content(), "question");
        assert_eq!(reply.content(), "answer");
        bridge.stop().await;
    }

    #[rstest]
    #[tokio::test]
    async fn waiting_client_takes_over_from_half_closed_one(bridge: SocketBridge) {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        bridge.set_handler(Arc::new(Collector { seen: seen_tx }));
        let port = bridge.start(0).await.expect("bridge starts");

        let mut first = BridgeClient::connect(address(port)).await.expect("connects");
        first.send_line("first words").await.expect("sends");
        first.finish().await.expect("write side closes");
        next_inbound(&mut seen_rx).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut second = BridgeClient::connect(address(port)).await.expect("connects");
        tokio::time::sleep(Duration::from_millis(200)).await;
        bridge
            .send_message(MessageEnvelope::new(message_type::RESPONSE, "for second", Utc::now()))
            .await
            .expect("queued");

        let envelope = second
            .receive(RECEIVE_LIMIT)
            .await
            .expect("frame decodes")
            .expect("frame arrives");
        let closed = first.receive(RECEIVE_LIMIT).await;

        assert_eq!(envelope.content(), "for second");
        assert!(matches!(closed, Err(BridgeError::Disconnected)));
        bridge.stop().await;
    }

    #[rstest]
    #[tokio::test]
    async fn oversized_frame_drops_the_connection(bridge: SocketBridge) {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        bridge.set_handler(Arc::new(Collector { seen: seen_tx }));
        let port = bridge.start(0).await.expect("bridge starts");

        let mut client = BridgeClient::connect(address(port)).await.expect("connects");
        let huge = "x".repeat(MAX_FRAME_BYTES.saturating_add(16));
        // The bridge may reset the connection before the write completes.
        client.send_line(&huge).await.ok();
        let outcome = client.receive(RECEIVE_LIMIT).await;

        assert!(matches!(
            outcome,
            Err(BridgeError::Disconnected | BridgeError::Io(_))
        ));
        assert!(seen_rx.try_recv().is_err());

        let mut next = BridgeClient::connect(address(port)).await.expect("connects");
        next.send_line("small").await.expect("sends");
        assert_eq!(next_inbound(&mut seen_rx).await.content(), "small");
        bridge.stop().await;
    }
}
