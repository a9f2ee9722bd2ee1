//! Store driver abstractions
//!
//! These traits describe the external document-store driver:
//! - `StoreDriver`: opens a connection handle without waiting for the network
//! - `DriverHandle`: readiness code, one-shot signal stream, force-close
//! - `DocumentStore`: fetch/store-by-ID primitive used by the client layer
//!
//! `SurrealDriver` is the production implementation; `fakes::MemoryDriver`
//! is an in-memory one for tests.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::DriverOptions;
use crate::error::StateError;
use crate::schema::Record;
use crate::Result;

/// Readiness code: no connection.
pub const READY_DISCONNECTED: u8 = 0;
/// Readiness code: connection established.
pub const READY_CONNECTED: u8 = 1;
/// Readiness code: connection being established.
pub const READY_CONNECTING: u8 = 2;
/// Readiness code: connection being torn down.
pub const READY_DISCONNECTING: u8 = 3;

/// Transport-level signal emitted by a driver handle.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverSignal {
    /// The connection is open and usable
    Open,
    /// The transport failed
    Error(StateError),
}

/// A live connection owned by a `ConnectionLifecycle`.
pub trait DriverHandle: Send + Sync + 'static {
    /// Current readiness code, `None` when the handle cannot report one.
    fn ready_code(&self) -> Option<u8>;

    /// Take the signal stream. Only the first call returns `Some`.
    fn take_signals(&self) -> Option<mpsc::UnboundedReceiver<DriverSignal>>;

    /// Close immediately, abandoning in-flight work.
    fn force_close(&self);
}

/// Opens driver handles.
pub trait StoreDriver: Send + Sync + 'static {
    type Handle: DriverHandle + Clone;

    /// Request a connection. Must return without awaiting network I/O;
    /// readiness is reported through the handle's signals.
    fn connect(&self, url: &str, options: &DriverOptions) -> Result<Self::Handle>;
}

/// Whole-document access by record ID.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Document stored under `id`, if any.
    async fn fetch(&self, id: &str) -> Result<Option<Value>>;

    /// Create or overwrite the record `id`.
    async fn store(&self, id: &str, data: Value) -> Result<()>;

    /// Delete the record `id`. Returns whether it existed.
    async fn remove(&self, id: &str) -> Result<bool>;

    /// Every record in the collection.
    async fn all(&self) -> Result<Vec<Record>>;
}
