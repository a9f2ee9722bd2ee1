//! Connection lifecycle
//!
//! `ConnectionLifecycle` owns one driver handle at a time. It never caches
//! the connection state: [`ConnectionLifecycle::state`] maps the handle's
//! live readiness code on every call. Driver signals are republished to
//! observers as typed [`LifecycleEvent`]s:
//!
//! - `Debug(message)`: before a connection request and after teardown
//! - `Error(err)`: every transport error, carrying the driver's error
//! - `Ready`: at most once per connection, after `ready_at` is recorded
//!
//! Once a handle has been destroyed or replaced, nothing it signals is
//! republished.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::ConnectOptions;
use crate::driver::{
    DriverHandle, DriverSignal, StoreDriver, READY_CONNECTED, READY_CONNECTING,
    READY_DISCONNECTING,
};
use crate::error::StateError;
use crate::Result;

/// Buffered events per subscriber before slow receivers start lagging.
pub const EVENT_CAPACITY: usize = 64;

const MSG_CONNECTING: &str = "Creating database connection...";
const MSG_REPLACING: &str = "Closing previous database connection.";
const MSG_ENDED: &str = "Database connection ended.";

/// Connection state derived from the driver's readiness code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    /// Map a readiness code. Missing or unknown codes are `Disconnected`.
    pub fn from_ready_code(code: Option<u8>) -> Self {
        match code {
            Some(READY_CONNECTED) => ConnectionState::Connected,
            Some(READY_CONNECTING) => ConnectionState::Connecting,
            Some(READY_DISCONNECTING) => ConnectionState::Disconnecting,
            _ => ConnectionState::Disconnected,
        }
    }

    /// Wire name, e.g. `"CONNECTED"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Disconnecting => "DISCONNECTING",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one handle from `connect` until it is destroyed or replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Fresh random id.
    pub fn new() -> Self {
        ConnectionId(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Topic of a [`LifecycleEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    Debug,
    Error,
    Ready,
}

/// Event republished to lifecycle observers.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    Debug(String),
    Error(Arc<StateError>),
    Ready,
}

impl LifecycleEvent {
    /// Topic this event is published under.
    pub fn topic(&self) -> EventTopic {
        match self {
            LifecycleEvent::Debug(_) => EventTopic::Debug,
            LifecycleEvent::Error(_) => EventTopic::Error,
            LifecycleEvent::Ready => EventTopic::Ready,
        }
    }
}

struct Active<H> {
    id: ConnectionId,
    handle: H,
    forwarder: Option<JoinHandle<()>>,
}

impl<H: DriverHandle> Active<H> {
    fn close(self) {
        self.handle.force_close();
        if let Some(forwarder) = self.forwarder {
            forwarder.abort();
        }
    }
}

struct Shared<H> {
    url: String,
    ready_at: Option<DateTime<Utc>>,
    active: Option<Active<H>>,
}

impl<H> Shared<H> {
    fn is_current(&self, id: ConnectionId) -> bool {
        self.active.as_ref().map(|active| active.id) == Some(id)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the store handle and republishes its events.
///
/// Callers must not race `connect` against `destroy` on the same instance.
/// A second `connect` closes the live handle before opening a new one.
pub struct ConnectionLifecycle<D: StoreDriver> {
    driver: D,
    shared: Arc<Mutex<Shared<D::Handle>>>,
    events: broadcast::Sender<LifecycleEvent>,
}

impl<D: StoreDriver> ConnectionLifecycle<D> {
    /// Lifecycle with no connection yet.
    pub fn new(driver: D) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            driver,
            shared: Arc::new(Mutex::new(Shared {
                url: String::new(),
                ready_at: None,
                active: None,
            })),
            events,
        }
    }

    /// Create a lifecycle and immediately request a connection.
    ///
    /// Events emitted before the first [`subscribe`](Self::subscribe) call
    /// are not buffered; observe readiness through [`state`](Self::state)
    /// or subscribe before calling [`connect`](Self::connect) instead.
    pub fn open(driver: D, url: &str, options: &ConnectOptions) -> Result<Self> {
        let lifecycle = Self::new(driver);
        lifecycle.connect(url, options)?;
        Ok(lifecycle)
    }

    /// Observe `debug`, `error` and `ready` events.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: LifecycleEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn emit_debug(&self, message: &str) {
        debug!("{}", message);
        self.emit(LifecycleEvent::Debug(message.to_string()));
    }

    /// Request a connection from the driver.
    ///
    /// Options are resolved (deprecated flags stripped, baseline merged)
    /// before the driver sees them. Returns as soon as the request is
    /// issued; `ready` or `error` follows asynchronously. Must be called
    /// from within a tokio runtime.
    #[instrument(skip(self, url, options), fields(url = %url))]
    pub fn connect(&self, url: &str, options: &ConnectOptions) -> Result<ConnectionId> {
        self.emit_debug(MSG_CONNECTING);

        let resolved = options.resolve()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| StateError::Connection(format!("No async runtime: {}", e)))?;

        let mut shared = lock(&self.shared);
        if let Some(previous) = shared.active.take() {
            debug!(connection_id = %previous.id, "{}", MSG_REPLACING);
            previous.close();
            shared.ready_at = None;
            shared.url.clear();
            self.emit(LifecycleEvent::Debug(MSG_REPLACING.to_string()));
        }

        let handle = self.driver.connect(url, &resolved)?;
        let id = ConnectionId::new();
        let forwarder = handle.take_signals().map(|signals| {
            runtime.spawn(forward_signals(
                id,
                signals,
                Arc::clone(&self.shared),
                self.events.clone(),
            ))
        });

        shared.active = Some(Active {
            id,
            handle,
            forwarder,
        });
        shared.url = url.to_string();

        info!(connection_id = %id, collection = %resolved.collection, "Connection requested");
        Ok(id)
    }

    /// Force-close the handle and forget the URL and readiness timestamp.
    #[instrument(skip(self))]
    pub fn destroy(&self) {
        let mut shared = lock(&self.shared);
        if let Some(active) = shared.active.take() {
            active.close();
        }
        shared.ready_at = None;
        shared.url.clear();
        drop(shared);

        self.emit_debug(MSG_ENDED);
    }

    /// Live connection state.
    pub fn state(&self) -> ConnectionState {
        let shared = lock(&self.shared);
        let code = shared
            .active
            .as_ref()
            .and_then(|active| active.handle.ready_code());
        ConnectionState::from_ready_code(code)
    }

    /// Current URL; empty before the first connect and after destroy.
    pub fn url(&self) -> String {
        lock(&self.shared).url.clone()
    }

    /// When the current connection became ready.
    pub fn ready_at(&self) -> Option<DateTime<Utc>> {
        lock(&self.shared).ready_at
    }

    /// Time since the current connection became ready.
    pub fn uptime(&self) -> Option<Duration> {
        self.ready_at().map(|ready_at| Utc::now() - ready_at)
    }

    /// Id of the live handle.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        lock(&self.shared).active.as_ref().map(|active| active.id)
    }

    /// The live handle, for document access.
    pub fn handle(&self) -> Option<D::Handle> {
        lock(&self.shared)
            .active
            .as_ref()
            .map(|active| active.handle.clone())
    }
}

impl<D: StoreDriver> Drop for ConnectionLifecycle<D> {
    fn drop(&mut self) {
        if let Some(active) = lock(&self.shared).active.take() {
            active.close();
        }
    }
}

async fn forward_signals<H: DriverHandle>(
    id: ConnectionId,
    mut signals: mpsc::UnboundedReceiver<DriverSignal>,
    shared: Arc<Mutex<Shared<H>>>,
    events: broadcast::Sender<LifecycleEvent>,
) {
    let mut announced = false;

    while let Some(signal) = signals.recv().await {
        let mut state = lock(&shared);
        if !state.is_current(id) {
            debug!(connection_id = %id, "Dropping signal from stale connection");
            break;
        }

        match signal {
            DriverSignal::Open if announced => {
                debug!(connection_id = %id, "Ignoring repeated open signal");
            }
            DriverSignal::Open => {
                announced = true;
                state.ready_at = Some(Utc::now());
                info!(connection_id = %id, "Database ready");
                let _ = events.send(LifecycleEvent::Ready);
            }
            DriverSignal::Error(err) => {
                warn!(connection_id = %id, error = %err, "Database error");
                let _ = events.send(LifecycleEvent::Error(Arc::new(err)));
            }
        }
    }
}
