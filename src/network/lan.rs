//! LAN Transport
//!
//! One host, one client at a time. The host listens on TCP and advertises
//! itself over UDP broadcast while in the lobby; the client listens for
//! advertisements and connects. When the client leaves, the host returns to
//! the lobby and accepts the next one. Background tasks run on a tokio runtime owned by the
//! manager and never touch match state: they push decoded-later payloads and
//! connection events onto shared queues that the game loop drains with
//! [`LanManager::poll`].

use std::collections::{BTreeSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{interval, timeout};
use tracing::{debug, info, instrument, warn};

use crate::config::LanConfig;
use crate::network::frame::{read_frame, write_frame};
use crate::network::protocol::{Discovery, NetMessage, ProtocolError};

/// Largest discovery datagram we read.
const DATAGRAM_LEN: usize = 2048;

/// Transport errors.
#[derive(Debug, Error)]
pub enum LanError {
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport already active as {0}")]
    AlreadyActive(&'static str),

    #[error("no peer connected")]
    NotConnected,

    #[error("outbound queue full")]
    QueueFull,

    #[error("encode failed: {0}")]
    Protocol(#[from] ProtocolError),
}

/// A host seen on the discovery port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostInfo {
    /// TCP address to connect to
    pub addr: SocketAddr,
    pub host_name: String,
}

/// Connection-level notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LanEvent {
    PeerConnected { addr: SocketAddr },
    Disconnected { reason: String },
    HostFound(HostInfo),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LanRole {
    Idle,
    Host,
    Client,
}

impl LanRole {
    pub fn as_str(self) -> &'static str {
        match self {
            LanRole::Idle => "idle",
            LanRole::Host => "host",
            LanRole::Client => "client",
        }
    }
}

/// Everything drained by one [`LanManager::poll`].
#[derive(Debug, Default)]
pub struct Inbound {
    pub events: Vec<LanEvent>,
    pub messages: Vec<NetMessage>,
}

// =============================================================================
// SHARED STATE
// =============================================================================

/// State shared between the game loop and the background tasks.
#[derive(Default)]
struct Shared {
    messages: Mutex<VecDeque<String>>,
    events: Mutex<VecDeque<LanEvent>>,
    /// Sender for the current peer's writer task
    outbound: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    /// Reader and writer tasks spawned from inside other tasks
    peer_tasks: Mutex<Vec<AbortHandle>>,
    connected: AtomicBool,
    in_lobby: AtomicBool,
    peer_taken: AtomicBool,
    /// Set by `stop`; no new connection tasks start after this
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn push_event(&self, event: LanEvent) {
        lock(&self.events).push_back(event);
    }

    fn push_message(&self, payload: String) {
        lock(&self.messages).push_back(payload);
    }
}

// =============================================================================
// MANAGER
// =============================================================================

/// Owns the transport tasks for one hosting or joining session.
pub struct LanManager {
    config: LanConfig,
    runtime: Option<Runtime>,
    handle: Handle,
    shared: Arc<Shared>,
    role: LanRole,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
    discovery_task: Option<JoinHandle<()>>,
    listen_addr: Option<SocketAddr>,
    discovery_addr: Option<SocketAddr>,
    remote_player_name: Option<String>,
}

impl LanManager {
    /// Create a manager with its own multi-thread runtime.
    pub fn new(config: LanConfig) -> Result<Self, LanError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("gold-mine-lan")
            .enable_all()
            .build()
            .map_err(LanError::Runtime)?;
        let handle = runtime.handle().clone();
        Ok(Self::build(config, Some(runtime), handle))
    }

    /// Create a manager that spawns onto an existing runtime.
    pub fn with_handle(config: LanConfig, handle: Handle) -> Self {
        Self::build(config, None, handle)
    }

    fn build(config: LanConfig, runtime: Option<Runtime>, handle: Handle) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            runtime,
            handle,
            shared: Arc::new(Shared::default()),
            role: LanRole::Idle,
            shutdown_tx,
            tasks: Vec::new(),
            discovery_task: None,
            listen_addr: None,
            discovery_addr: None,
            remote_player_name: None,
        }
    }

    pub fn config(&self) -> &LanConfig {
        &self.config
    }

    pub fn role(&self) -> LanRole {
        self.role
    }

    pub fn is_host(&self) -> bool {
        self.role == LanRole::Host
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn in_lobby(&self) -> bool {
        self.shared.in_lobby.load(Ordering::SeqCst)
    }

    /// Leaving the lobby stops discovery broadcasts.
    pub fn set_in_lobby(&self, in_lobby: bool) {
        self.shared.in_lobby.store(in_lobby, Ordering::SeqCst);
    }

    /// Bound TCP address while hosting.
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.listen_addr
    }

    /// Bound UDP address while listening for hosts.
    pub fn discovery_addr(&self) -> Option<SocketAddr> {
        self.discovery_addr
    }

    /// Name the client sent in `lobby_ready`.
    pub fn remote_player_name(&self) -> Option<&str> {
        self.remote_player_name.as_deref()
    }

    pub fn set_remote_player_name(&mut self, name: impl Into<String>) {
        self.remote_player_name = Some(name.into());
    }

    pub fn clear_remote_player_name(&mut self) {
        self.remote_player_name = None;
    }

    // =========================================================================
    // Host
    // =========================================================================

    /// Listen for a peer and start advertising. Returns the bound address.
    #[instrument(skip(self))]
    pub fn start_host(&mut self) -> Result<SocketAddr, LanError> {
        if self.role != LanRole::Idle {
            return Err(LanError::AlreadyActive(self.role.as_str()));
        }
        let _guard = self.handle.enter();

        let listener = bind_tcp(&format!("{}:{}", self.config.bind_addr, self.config.game_port))?;
        let local = listener.local_addr().map_err(|source| LanError::Bind {
            addr: self.config.bind_addr.clone(),
            source,
        })?;

        let announcer = bind_udp(&format!("{}:0", self.config.bind_addr))?;
        if let Err(e) = announcer.set_broadcast(true) {
            warn!(error = %e, "Could not enable broadcast");
        }
        let target = parse_addr(&format!(
            "{}:{}",
            self.config.broadcast_addr, self.config.discovery_port
        ))?;
        let announcement = NetMessage::Discovery(Discovery {
            game_id: self.config.game_id.clone(),
            host_name: self.config.host_name.clone(),
            port: local.port(),
        })
        .to_bytes()?;

        self.shared.in_lobby.store(true, Ordering::SeqCst);

        self.tasks.push(self.handle.spawn(accept_loop(
            listener,
            self.shared.clone(),
            self.config.outbound_capacity,
            self.config.max_frame_len,
            self.shutdown_tx.clone(),
            self.shutdown_tx.subscribe(),
        )));
        self.tasks.push(self.handle.spawn(announce_loop(
            announcer,
            target,
            announcement,
            self.config.broadcast_interval,
            self.shared.clone(),
            self.shutdown_tx.subscribe(),
        )));

        self.listen_addr = Some(local);
        self.role = LanRole::Host;

        info!(addr = %local, game_id = %self.config.game_id, "Hosting");
        Ok(local)
    }

    // =========================================================================
    // Client
    // =========================================================================

    /// Listen for host advertisements. Returns the bound UDP address.
    #[instrument(skip(self))]
    pub fn start_discovery(&mut self) -> Result<SocketAddr, LanError> {
        if self.role == LanRole::Host {
            return Err(LanError::AlreadyActive(self.role.as_str()));
        }
        self.stop_discovery();
        let _guard = self.handle.enter();

        let socket = bind_udp(&format!(
            "{}:{}",
            self.config.bind_addr, self.config.discovery_port
        ))?;
        if let Err(e) = socket.set_broadcast(true) {
            warn!(error = %e, "Could not enable broadcast");
        }
        let local = socket.local_addr().map_err(|source| LanError::Bind {
            addr: self.config.bind_addr.clone(),
            source,
        })?;

        self.discovery_task = Some(self.handle.spawn(discovery_loop(
            socket,
            self.config.game_id.clone(),
            self.shared.clone(),
            self.shutdown_tx.subscribe(),
        )));
        self.discovery_addr = Some(local);

        info!(addr = %local, "Listening for hosts");
        Ok(local)
    }

    pub fn stop_discovery(&mut self) {
        if let Some(task) = self.discovery_task.take() {
            task.abort();
            debug!("Discovery stopped");
        }
        self.discovery_addr = None;
    }

    /// Connect to a host in the background. Success shows up as
    /// `PeerConnected`, failure or timeout as `Disconnected`.
    #[instrument(skip(self))]
    pub fn connect(&mut self, addr: SocketAddr) -> Result<(), LanError> {
        if self.role != LanRole::Idle {
            return Err(LanError::AlreadyActive(self.role.as_str()));
        }

        let shared = self.shared.clone();
        let capacity = self.config.outbound_capacity;
        let limit = self.config.connect_timeout;
        let max_frame = self.config.max_frame_len;
        let shutdown_tx = self.shutdown_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        self.tasks.push(self.handle.spawn(async move {
            let attempt = tokio::select! {
                result = timeout(limit, TcpStream::connect(addr)) => result,
                _ = shutdown_rx.recv() => return,
            };
            match attempt {
                Ok(Ok(stream)) => {
                    spawn_connection(stream, addr, shared, capacity, max_frame, &shutdown_tx);
                }
                Ok(Err(e)) => {
                    warn!(%addr, error = %e, "Connect failed");
                    shared.push_event(LanEvent::Disconnected {
                        reason: format!("connect failed: {}", e),
                    });
                }
                Err(_) => {
                    warn!(%addr, ?limit, "Connect timed out");
                    shared.push_event(LanEvent::Disconnected {
                        reason: "connect timed out".to_string(),
                    });
                }
            }
        }));

        self.role = LanRole::Client;
        Ok(())
    }

    // =========================================================================
    // Traffic
    // =========================================================================

    /// Queue a message for the peer.
    pub fn send(&self, msg: &NetMessage) -> Result<(), LanError> {
        if !self.is_connected() {
            return Err(LanError::NotConnected);
        }
        let payload = msg.to_bytes()?;
        let guard = lock(&self.shared.outbound);
        let Some(outbound) = guard.as_ref() else {
            return Err(LanError::NotConnected);
        };
        outbound.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => LanError::QueueFull,
            TrySendError::Closed(_) => LanError::NotConnected,
        })
    }

    /// Drain queued events and messages. Undecodable payloads are dropped.
    pub fn poll(&self) -> Inbound {
        let events: Vec<LanEvent> = lock(&self.shared.events).drain(..).collect();
        let payloads: Vec<String> = lock(&self.shared.messages).drain(..).collect();

        let messages = payloads
            .iter()
            .filter_map(|payload| match NetMessage::from_json(payload) {
                Ok(msg) => Some(msg),
                Err(e) => {
                    debug!(error = %e, len = payload.len(), "Dropping undecodable message");
                    None
                }
            })
            .collect();

        Inbound { events, messages }
    }

    /// Tear down every task and return to idle.
    #[instrument(skip(self))]
    pub fn stop(&mut self) {
        let _ = self.shutdown_tx.send(());
        for task in self.tasks.drain(..) {
            task.abort();
        }
        {
            let mut peer_tasks = lock(&self.shared.peer_tasks);
            self.shared.closed.store(true, Ordering::SeqCst);
            for task in peer_tasks.drain(..) {
                task.abort();
            }
        }
        self.stop_discovery();

        let (shutdown_tx, _) = broadcast::channel(1);
        self.shutdown_tx = shutdown_tx;
        self.shared = Arc::new(Shared::default());
        self.listen_addr = None;
        self.remote_player_name = None;

        if self.role != LanRole::Idle {
            info!(role = self.role.as_str(), "Transport stopped");
        }
        self.role = LanRole::Idle;
    }
}

impl Drop for LanManager {
    fn drop(&mut self) {
        self.stop();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

// =============================================================================
// SOCKETS
// =============================================================================

fn parse_addr(addr: &str) -> Result<SocketAddr, LanError> {
    addr.parse()
        .map_err(|_| LanError::InvalidAddress(addr.to_string()))
}

/// Bind a listener. Must run inside the runtime context.
fn bind_tcp(addr: &str) -> Result<TcpListener, LanError> {
    let bind_err = |source| LanError::Bind { addr: addr.to_string(), source };
    let listener = std::net::TcpListener::bind(parse_addr(addr)?).map_err(bind_err)?;
    listener.set_nonblocking(true).map_err(bind_err)?;
    TcpListener::from_std(listener).map_err(bind_err)
}

/// Bind a datagram socket. Must run inside the runtime context.
fn bind_udp(addr: &str) -> Result<UdpSocket, LanError> {
    let bind_err = |source| LanError::Bind { addr: addr.to_string(), source };
    let socket = std::net::UdpSocket::bind(parse_addr(addr)?).map_err(bind_err)?;
    socket.set_nonblocking(true).map_err(bind_err)?;
    UdpSocket::from_std(socket).map_err(bind_err)
}

// =============================================================================
// TASKS
// =============================================================================

/// Keep one peer at a time; close everyone else while it is connected.
async fn accept_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    capacity: usize,
    max_frame: usize,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, addr)) => {
                    if shared.peer_taken.swap(true, Ordering::SeqCst) {
                        info!(%addr, "Rejecting extra peer");
                        drop(stream);
                        continue;
                    }
                    spawn_connection(stream, addr, shared.clone(), capacity, max_frame, &shutdown_tx);
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                }
            },
            _ = shutdown_rx.recv() => break,
        }
    }
}

/// Split the stream, open the peer's outbound channel and start its reader
/// and writer. Does nothing once the manager has stopped.
fn spawn_connection(
    stream: TcpStream,
    addr: SocketAddr,
    shared: Arc<Shared>,
    capacity: usize,
    max_frame: usize,
    shutdown_tx: &broadcast::Sender<()>,
) {
    let mut peer_tasks = lock(&shared.peer_tasks);
    if shared.closed.load(Ordering::SeqCst) {
        debug!(%addr, "Transport stopped, dropping connection");
        return;
    }
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%addr, error = %e, "Could not disable Nagle");
    }
    let (reader, writer) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
    *lock(&shared.outbound) = Some(outbound_tx);
    peer_tasks.retain(|task| !task.is_finished());

    shared.connected.store(true, Ordering::SeqCst);
    shared.push_event(LanEvent::PeerConnected { addr });
    info!(%addr, "Peer connected");

    let writer_task = tokio::spawn(write_loop(writer, outbound_rx, max_frame, shutdown_tx.subscribe()));
    peer_tasks.push(writer_task.abort_handle());
    let reader_task = tokio::spawn(read_loop(
        reader,
        addr,
        Arc::clone(&shared),
        max_frame,
        shutdown_tx.subscribe(),
        writer_task,
    ));
    peer_tasks.push(reader_task.abort_handle());
}

/// Read frames until the stream fails, then report the disconnect.
async fn read_loop<R>(
    mut reader: R,
    addr: SocketAddr,
    shared: Arc<Shared>,
    max_frame: usize,
    mut shutdown_rx: broadcast::Receiver<()>,
    writer_task: JoinHandle<()>,
) where
    R: AsyncRead + Unpin,
{
    let reason = loop {
        tokio::select! {
            frame = read_frame(&mut reader, max_frame) => match frame {
                Ok(payload) => match String::from_utf8(payload) {
                    Ok(text) => shared.push_message(text),
                    Err(_) => debug!(%addr, "Dropping non UTF-8 frame"),
                },
                Err(e) => break Some(e.to_string()),
            },
            _ = shutdown_rx.recv() => break None,
        }
    };

    writer_task.abort();
    shared.connected.store(false, Ordering::SeqCst);
    lock(&shared.outbound).take();

    if let Some(reason) = reason {
        // A host whose peer left goes back to the lobby and takes the next one
        if shared.peer_taken.swap(false, Ordering::SeqCst) {
            shared.in_lobby.store(true, Ordering::SeqCst);
        }
        info!(%addr, %reason, "Peer disconnected");
        shared.push_event(LanEvent::Disconnected { reason });
    }
}

/// Drain the outbound channel onto the stream.
async fn write_loop<W>(
    mut writer: W,
    mut outbound_rx: mpsc::Receiver<Vec<u8>>,
    max_frame: usize,
    mut shutdown_rx: broadcast::Receiver<()>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            payload = outbound_rx.recv() => {
                let Some(payload) = payload else {
                    break;
                };
                if let Err(e) = write_frame(&mut writer, &payload, max_frame).await {
                    debug!(error = %e, "Write failed");
                    break;
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }
}

/// Advertise the host while it sits in the lobby without a peer.
async fn announce_loop(
    socket: UdpSocket,
    target: SocketAddr,
    announcement: Vec<u8>,
    every: Duration,
    shared: Arc<Shared>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = interval(every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !shared.in_lobby.load(Ordering::SeqCst) || shared.peer_taken.load(Ordering::SeqCst) {
                    continue;
                }
                if let Err(e) = socket.send_to(&announcement, target).await {
                    debug!(%target, error = %e, "Discovery broadcast failed");
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }
}

/// Report each advertising host once.
async fn discovery_loop(
    socket: UdpSocket,
    game_id: String,
    shared: Arc<Shared>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut seen = BTreeSet::new();
    let mut buf = vec![0u8; DATAGRAM_LEN];
    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => match result {
                Ok((len, from)) => match NetMessage::from_bytes(&buf[..len]) {
                    Ok(NetMessage::Discovery(found)) if found.game_id == game_id => {
                        let addr = SocketAddr::new(from.ip(), found.port);
                        if seen.insert(addr) {
                            info!(%addr, host = %found.host_name, "Host found");
                            shared.push_event(LanEvent::HostFound(HostInfo {
                                addr,
                                host_name: found.host_name,
                            }));
                        }
                    }
                    Ok(other) => debug!(%from, kind = other.type_name(), "Ignoring datagram"),
                    Err(e) => debug!(%from, error = %e, "Undecodable datagram"),
                },
                Err(e) => debug!(error = %e, "Discovery receive failed"),
            },
            _ = shutdown_rx.recv() => break,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
