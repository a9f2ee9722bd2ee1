//! In-memory driver (testing only)
//!
//! `MemoryDriver` hands out `MemoryConnection`s that do nothing on their own:
//! tests drive them by firing `open`/`error` signals and setting readiness
//! codes by hand. All connections from one driver share a document table,
//! like clients of the same server.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::DriverOptions;
use crate::driver::*;
use crate::error::StateError;
use crate::schema::Record;
use crate::Result;

// ---------------------------------------------------------------------------
// MemoryConnection
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct HandleState {
    ready_code: Option<u8>,
    closed: bool,
}

#[derive(Debug)]
struct ConnectionInner {
    url: String,
    options: DriverOptions,
    state: Mutex<HandleState>,
    signals_tx: mpsc::UnboundedSender<DriverSignal>,
    signals_rx: Mutex<Option<mpsc::UnboundedReceiver<DriverSignal>>>,
    records: Arc<Mutex<Vec<Record>>>,
}

/// Hand-driven connection. Starts in the connecting state.
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    inner: Arc<ConnectionInner>,
}

impl MemoryConnection {
    /// URL the connection was requested with.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Options the driver received.
    pub fn options(&self) -> &DriverOptions {
        &self.inner.options
    }

    /// Mark the connection established and fire `open`.
    pub fn open(&self) {
        self.set_ready_code(Some(READY_CONNECTED));
        let _ = self.inner.signals_tx.send(DriverSignal::Open);
    }

    /// Fire `error` without touching the readiness code.
    pub fn fail(&self, err: StateError) {
        let _ = self.inner.signals_tx.send(DriverSignal::Error(err));
    }

    /// Override the readiness code; `None` simulates a handle without one.
    pub fn set_ready_code(&self, code: Option<u8>) {
        self.inner.state.lock().unwrap().ready_code = code;
    }

    /// Whether `force_close` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().unwrap().closed
    }

    fn ensure_connected(&self) -> Result<()> {
        match self.ready_code() {
            Some(READY_CONNECTED) => Ok(()),
            _ => Err(StateError::NotConnected),
        }
    }
}

impl DriverHandle for MemoryConnection {
    fn ready_code(&self) -> Option<u8> {
        self.inner.state.lock().unwrap().ready_code
    }

    fn take_signals(&self) -> Option<mpsc::UnboundedReceiver<DriverSignal>> {
        self.inner.signals_rx.lock().unwrap().take()
    }

    fn force_close(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.closed = true;
        state.ready_code = Some(READY_DISCONNECTED);
    }
}

#[async_trait]
impl DocumentStore for MemoryConnection {
    async fn fetch(&self, id: &str) -> Result<Option<Value>> {
        self.ensure_connected()?;
        let records = self.inner.records.lock().unwrap();
        Ok(records
            .iter()
            .find(|record| record.id == id)
            .map(|record| record.data.clone()))
    }

    async fn store(&self, id: &str, data: Value) -> Result<()> {
        self.ensure_connected()?;
        let mut records = self.inner.records.lock().unwrap();
        match records.iter_mut().find(|record| record.id == id) {
            Some(record) => record.data = data,
            None => records.push(Record::new(id, data)),
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        self.ensure_connected()?;
        let mut records = self.inner.records.lock().unwrap();
        let before = records.len();
        records.retain(|record| record.id != id);
        Ok(records.len() != before)
    }

    async fn all(&self) -> Result<Vec<Record>> {
        self.ensure_connected()?;
        Ok(self.inner.records.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// MemoryDriver
// ---------------------------------------------------------------------------

/// Driver that records every connection it hands out.
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    connections: Arc<Mutex<Vec<MemoryConnection>>>,
    records: Arc<Mutex<Vec<Record>>>,
    refuse: Arc<Mutex<Option<String>>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `connect` calls fail with `reason`.
    pub fn refuse_connections(&self, reason: impl Into<String>) {
        *self.refuse.lock().unwrap() = Some(reason.into());
    }

    /// Every connection handed out, oldest first.
    pub fn connections(&self) -> Vec<MemoryConnection> {
        self.connections.lock().unwrap().clone()
    }

    /// Most recent connection.
    pub fn last_connection(&self) -> Option<MemoryConnection> {
        self.connections.lock().unwrap().last().cloned()
    }
}

impl StoreDriver for MemoryDriver {
    type Handle = MemoryConnection;

    fn connect(&self, url: &str, options: &DriverOptions) -> Result<MemoryConnection> {
        if let Some(reason) = self.refuse.lock().unwrap().clone() {
            return Err(StateError::Connection(reason));
        }

        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let connection = MemoryConnection {
            inner: Arc::new(ConnectionInner {
                url: url.to_string(),
                options: options.clone(),
                state: Mutex::new(HandleState {
                    ready_code: Some(READY_CONNECTING),
                    closed: false,
                }),
                signals_tx,
                signals_rx: Mutex::new(Some(signals_rx)),
                records: Arc::clone(&self.records),
            }),
        };

        self.connections.lock().unwrap().push(connection.clone());
        Ok(connection)
    }
}
