//! SurrealDB driver
//!
//! `SurrealDriver::connect` returns a `SurrealConnection` right away and
//! establishes the session in a background task:
//! - connect through `surrealdb::engine::any` (`mem://`, `ws://`, `wss://`, `surrealkv://`)
//! - sign in when credentials are configured (root or database user)
//! - select namespace and database
//! - define the collection table and its key index (`ensureSchema`, `uniqueIndex`)
//!
//! Each record is stored as `{ ID, data }` under the record id
//! `<collection>:<ID>`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::{DriverOptions, FLAG_ENSURE_SCHEMA, FLAG_UNIQUE_INDEX};
use crate::driver::*;
use crate::error::StateError;
use crate::schema::Record;
use crate::Result;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Inner {
    collection: String,
    ready: AtomicU8,
    db: RwLock<Option<Surreal<Any>>>,
    signals: Mutex<Option<mpsc::UnboundedReceiver<DriverSignal>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn database(&self) -> Result<Surreal<Any>> {
        self.db
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StateError::NotConnected)
    }
}

/// Connection handle produced by [`SurrealDriver`].
#[derive(Clone)]
pub struct SurrealConnection {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SurrealConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealConnection")
            .field("collection", &self.inner.collection)
            .field("ready", &self.inner.ready.load(Ordering::SeqCst))
            .finish()
    }
}

impl SurrealConnection {
    /// Table holding this connection's records.
    pub fn collection(&self) -> &str {
        &self.inner.collection
    }
}

/// Driver that opens SurrealDB sessions.
#[derive(Debug, Clone, Default)]
pub struct SurrealDriver;

impl SurrealDriver {
    pub fn new() -> Self {
        Self
    }
}

impl StoreDriver for SurrealDriver {
    type Handle = SurrealConnection;

    #[instrument(skip(self, options), fields(collection = %options.collection))]
    fn connect(&self, url: &str, options: &DriverOptions) -> Result<SurrealConnection> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| StateError::Connection(format!("No async runtime: {}", e)))?;

        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            collection: options.collection.clone(),
            ready: AtomicU8::new(READY_CONNECTING),
            db: RwLock::new(None),
            signals: Mutex::new(Some(signals_rx)),
            task: Mutex::new(None),
        });

        let task = runtime.spawn(establish(
            Arc::clone(&inner),
            url.to_string(),
            options.clone(),
            signals_tx,
        ));
        *lock(&inner.task) = Some(task);

        Ok(SurrealConnection { inner })
    }
}

async fn establish(
    inner: Arc<Inner>,
    url: String,
    options: DriverOptions,
    signals: mpsc::UnboundedSender<DriverSignal>,
) {
    match open_database(&url, &options).await {
        Ok(db) => {
            let mut slot = inner.db.write().unwrap_or_else(PoisonError::into_inner);
            let opened = inner
                .ready
                .compare_exchange(
                    READY_CONNECTING,
                    READY_CONNECTED,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok();
            if !opened {
                debug!("Connection closed before it was established");
                return;
            }
            *slot = Some(db);
            drop(slot);

            info!(url = %url, "SurrealDB connected");
            let _ = signals.send(DriverSignal::Open);
        }
        Err(err) => {
            let _ = inner.ready.compare_exchange(
                READY_CONNECTING,
                READY_DISCONNECTED,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            warn!(url = %url, error = %err, "SurrealDB connection failed");
            let _ = signals.send(DriverSignal::Error(err));
        }
    }
}

async fn open_database(url: &str, options: &DriverOptions) -> Result<Surreal<Any>> {
    let db = surrealdb::engine::any::connect(url)
        .await
        .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

    if let Some(credentials) = &options.credentials {
        if credentials.root {
            db.signin(Root {
                username: &credentials.username,
                password: &credentials.password,
            })
            .await
            .map_err(|e| StateError::Connection(format!("Root authentication failed: {}", e)))?;
        } else {
            db.signin(Database {
                namespace: &options.namespace,
                database: &options.database,
                username: &credentials.username,
                password: &credentials.password,
            })
            .await
            .map_err(|e| {
                StateError::Connection(format!("Database authentication failed: {}", e))
            })?;
        }
    }

    db.use_ns(&options.namespace)
        .use_db(&options.database)
        .await
        .map_err(|e| {
            StateError::Connection(format!("Failed to select namespace/database: {}", e))
        })?;

    if options.flag(FLAG_ENSURE_SCHEMA) {
        define_collection(&db, &options.collection, options.flag(FLAG_UNIQUE_INDEX)).await?;
    }

    Ok(db)
}

/// Table names cannot be bound as parameters in DEFINE statements; the
/// collection name was validated as an identifier when options were resolved.
async fn define_collection(db: &Surreal<Any>, collection: &str, unique: bool) -> Result<()> {
    debug!(collection = %collection, "Defining collection");

    let schema = format!(
        "DEFINE TABLE IF NOT EXISTS {table} SCHEMALESS;\n\
         DEFINE INDEX IF NOT EXISTS idx_{table}_id ON TABLE {table} FIELDS ID{unique};",
        table = collection,
        unique = if unique { " UNIQUE" } else { "" },
    );

    db.query(schema)
        .await
        .and_then(|response| response.check())
        .map_err(|e| StateError::Connection(format!("Schema setup failed: {}", e)))?;

    Ok(())
}

impl DriverHandle for SurrealConnection {
    fn ready_code(&self) -> Option<u8> {
        Some(self.inner.ready.load(Ordering::SeqCst))
    }

    fn take_signals(&self) -> Option<mpsc::UnboundedReceiver<DriverSignal>> {
        lock(&self.inner.signals).take()
    }

    fn force_close(&self) {
        self.inner.ready.store(READY_DISCONNECTING, Ordering::SeqCst);
        if let Some(task) = lock(&self.inner.task).take() {
            task.abort();
        }
        // Dropping the last client clone closes the session.
        self.inner
            .db
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.inner.ready.store(READY_DISCONNECTED, Ordering::SeqCst);
        debug!(collection = %self.inner.collection, "SurrealDB connection closed");
    }
}

#[async_trait]
impl DocumentStore for SurrealConnection {
    #[instrument(skip(self))]
    async fn fetch(&self, id: &str) -> Result<Option<Value>> {
        let db = self.inner.database()?;

        let mut result = db
            .query("SELECT ID, data FROM type::thing($table, $key)")
            .bind(("table", self.inner.collection.clone()))
            .bind(("key", id.to_string()))
            .await?;

        let rows: Vec<Record> = result.take(0)?;
        Ok(rows.into_iter().next().map(|row| row.data))
    }

    #[instrument(skip(self, data))]
    async fn store(&self, id: &str, data: Value) -> Result<()> {
        let db = self.inner.database()?;

        let row = Record::new(id, data);
        let mut result = db
            .query("UPSERT type::thing($table, $key) CONTENT $row RETURN ID, data")
            .bind(("table", self.inner.collection.clone()))
            .bind(("key", id.to_string()))
            .bind(("row", row))
            .await?;

        let stored: Vec<Record> = result.take(0)?;
        if stored.is_empty() {
            return Err(StateError::Query(format!("Failed to store record {}", id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: &str) -> Result<bool> {
        let db = self.inner.database()?;

        let mut result = db
            .query("DELETE type::thing($table, $key) RETURN BEFORE")
            .bind(("table", self.inner.collection.clone()))
            .bind(("key", id.to_string()))
            .await?;

        let removed: Vec<Record> = result.take(0)?;
        Ok(!removed.is_empty())
    }

    #[instrument(skip(self))]
    async fn all(&self) -> Result<Vec<Record>> {
        let db = self.inner.database()?;

        let mut result = db
            .query("SELECT ID, data FROM type::table($table)")
            .bind(("table", self.inner.collection.clone()))
            .await?;

        let rows: Vec<Record> = result.take(0)?;
        Ok(rows)
    }
}
