//! dotted-state: addressing and lifecycle layer over a document store
//!
//! The store holds a single flat collection of records. Each record has an
//! opaque string ID and an arbitrary nested JSON document. Callers address
//! both whole records and locations inside them with dotted keys such as
//! `"user.profile.age"`.
//!
//! ## Key Components
//!
//! - [`key`] / [`resolver`]: pure functions that parse dotted keys and
//!   get/set/unset/sort values inside in-memory documents
//! - [`ConnectionLifecycle`]: owns one driver handle, derives the connection
//!   state from its readiness code and republishes driver events
//! - [`SurrealDriver`]: SurrealDB-backed [`StoreDriver`]
//! - [`fakes`]: in-memory driver for tests

pub mod config;
pub mod driver;
mod error;
pub mod fakes;
pub mod key;
pub mod lifecycle;
pub mod resolver;
mod schema;
pub mod surreal;
pub mod telemetry;

pub use config::{ConnectOptions, DriverOptions, StoreConfig};
pub use driver::{DocumentStore, DriverHandle, DriverSignal, StoreDriver};
pub use error::StateError;
pub use key::{finite_number, is_key, is_value, parse_key, DottedKey};
pub use lifecycle::{
    ConnectionId, ConnectionLifecycle, ConnectionState, EventTopic, LifecycleEvent,
};
pub use resolver::{get_data, set_data, sort, unset_data, SortOptions};
pub use schema::{Record, DEFAULT_COLLECTION};
pub use surreal::{SurrealConnection, SurrealDriver};

/// Result type for dotted-state operations
pub type Result<T> = std::result::Result<T, StateError>;
