//! Connection configuration
//!
//! Callers hand a [`ConnectOptions`] to the lifecycle. Before it reaches a
//! driver it is resolved into [`DriverOptions`]:
//!
//! 1. deprecated flag keys ([`DEPRECATED_FLAGS`]) are stripped, so stale
//!    configuration cannot break the connection request;
//! 2. the baseline flags ([`BASELINE_FLAGS`]) are merged over what remains,
//!    baseline winning on conflict;
//! 3. defaults are filled in and the collection name is validated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StateError;
use crate::schema::DEFAULT_COLLECTION;
use crate::Result;

/// Flag keys older driver contracts accepted and the current one rejects.
pub const DEPRECATED_FLAGS: &[&str] = &[
    "useUnique",
    "useNewUrlParser",
    "useUnifiedTopology",
    "useCreateIndex",
    "useFindAndModify",
];

/// Make sure the collection table exists before reporting ready.
pub const FLAG_ENSURE_SCHEMA: &str = "ensureSchema";
/// Enforce ID uniqueness with a unique index.
pub const FLAG_UNIQUE_INDEX: &str = "uniqueIndex";

/// Flags forced on every connection request.
pub const BASELINE_FLAGS: &[(&str, bool)] =
    &[(FLAG_ENSURE_SCHEMA, true), (FLAG_UNIQUE_INDEX, true)];

pub const DEFAULT_NAMESPACE: &str = "dotted";
pub const DEFAULT_DATABASE: &str = "main";
pub const DEFAULT_URL: &str = "mem://";

/// Caller-facing connection options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    /// Namespace (default: "dotted")
    pub namespace: Option<String>,
    /// Database name (default: "main")
    pub database: Option<String>,
    /// Collection holding the records (default: "json")
    pub collection: Option<String>,
    /// Sign-in user; no sign-in when absent
    pub username: Option<String>,
    pub password: Option<String>,
    /// Whether the user is a root user (true) or database user (false)
    pub root: bool,
    /// Driver passthrough flags
    pub flags: BTreeMap<String, Value>,
}

/// Credentials handed to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub root: bool,
}

/// Options as the driver sees them, after strip-then-merge.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverOptions {
    pub namespace: String,
    pub database: String,
    pub collection: String,
    pub credentials: Option<Credentials>,
    pub flags: BTreeMap<String, Value>,
}

impl DriverOptions {
    /// Boolean flag value; absent or non-boolean flags read as `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).and_then(Value::as_bool).unwrap_or(false)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = Some(ns.into());
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = Some(db.into());
        self
    }

    /// Set custom collection
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Sign in as a database user
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set whether this is a root user
    pub fn with_root(mut self, root: bool) -> Self {
        self.root = root;
        self
    }

    /// Add a driver passthrough flag
    pub fn with_flag(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }

    /// Strip deprecated flags, merge the baseline over the rest, fill defaults.
    pub fn resolve(&self) -> Result<DriverOptions> {
        let mut flags: BTreeMap<String, Value> = self
            .flags
            .iter()
            .filter(|(name, _)| !DEPRECATED_FLAGS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        for (name, value) in BASELINE_FLAGS {
            flags.insert((*name).to_string(), Value::Bool(*value));
        }

        let collection = self
            .collection
            .clone()
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string());
        if !is_identifier(&collection) {
            return Err(StateError::InvalidCollection(collection));
        }

        let credentials = match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
                root: self.root,
            }),
            _ => None,
        };

        Ok(DriverOptions {
            namespace: self
                .namespace
                .clone()
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            database: self
                .database
                .clone()
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            collection,
            credentials,
            flags,
        })
    }
}

/// URL plus options, typically loaded from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub url: String,
    pub options: ConnectOptions,
}

impl StoreConfig {
    /// Create from environment variables
    ///
    /// Reads:
    /// - DOTTED_STATE_URL (optional, default: "mem://")
    /// - DOTTED_STATE_NAMESPACE (optional, default: "dotted")
    /// - DOTTED_STATE_DATABASE (optional, default: "main")
    /// - DOTTED_STATE_COLLECTION (optional, default: "json")
    /// - DOTTED_STATE_USERNAME / DOTTED_STATE_PASSWORD (optional, both needed to sign in)
    /// - DOTTED_STATE_ROOT (optional, default: "false") - set to "true" for root users
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`StoreConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let options = ConnectOptions {
            namespace: lookup("DOTTED_STATE_NAMESPACE"),
            database: lookup("DOTTED_STATE_DATABASE"),
            collection: lookup("DOTTED_STATE_COLLECTION"),
            username: lookup("DOTTED_STATE_USERNAME"),
            password: lookup("DOTTED_STATE_PASSWORD"),
            root: lookup("DOTTED_STATE_ROOT")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
            flags: BTreeMap::new(),
        };

        Self {
            url: lookup("DOTTED_STATE_URL").unwrap_or_else(|| DEFAULT_URL.to_string()),
            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_resolve_defaults() {
        let resolved = ConnectOptions::new().resolve().unwrap();
        assert_eq!(resolved.namespace, "dotted");
        assert_eq!(resolved.database, "main");
        assert_eq!(resolved.collection, "json");
        assert_eq!(resolved.credentials, None);
        assert!(resolved.flag(FLAG_ENSURE_SCHEMA));
        assert!(resolved.flag(FLAG_UNIQUE_INDEX));
    }

    #[test]
    fn test_deprecated_flags_are_stripped() {
        let resolved = ConnectOptions::new()
            .with_flag("useUnique", true)
            .with_flag("useFindAndModify", false)
            .with_flag("poolSize", 4)
            .resolve()
            .unwrap();

        assert!(!resolved.flags.contains_key("useUnique"));
        assert!(!resolved.flags.contains_key("useFindAndModify"));
        assert_eq!(resolved.flags.get("poolSize"), Some(&json!(4)));
    }

    #[test]
    fn test_baseline_wins_over_caller_flags() {
        let resolved = ConnectOptions::new()
            .with_flag(FLAG_UNIQUE_INDEX, false)
            .with_flag(FLAG_ENSURE_SCHEMA, "no")
            .resolve()
            .unwrap();

        assert_eq!(resolved.flags.get(FLAG_UNIQUE_INDEX), Some(&json!(true)));
        assert_eq!(resolved.flags.get(FLAG_ENSURE_SCHEMA), Some(&json!(true)));
    }

    #[test]
    fn test_caller_options_are_not_mutated() {
        let options = ConnectOptions::new().with_flag("useUnique", true);
        let _ = options.resolve().unwrap();
        assert!(options.flags.contains_key("useUnique"));
    }

    #[test]
    fn test_invalid_collection_rejected() {
        for bad in ["", "1abc", "users; DELETE json", "a-b"] {
            let err = ConnectOptions::new().with_collection(bad).resolve().unwrap_err();
            assert!(matches!(err, StateError::InvalidCollection(ref name) if name == bad));
        }
        assert!(ConnectOptions::new().with_collection("_users2").resolve().is_ok());
    }

    #[test]
    fn test_credentials_need_both_parts() {
        let mut options = ConnectOptions::new();
        options.username = Some("alice".to_string());
        assert_eq!(options.resolve().unwrap().credentials, None);

        let resolved = ConnectOptions::new()
            .with_credentials("alice", "secret")
            .with_root(true)
            .resolve()
            .unwrap();
        assert_eq!(
            resolved.credentials,
            Some(Credentials {
                username: "alice".to_string(),
                password: "secret".to_string(),
                root: true,
            })
        );
    }

    #[test]
    fn test_options_deserialize_from_json() {
        let options: ConnectOptions = serde_json::from_value(json!({
            "namespace": "app",
            "flags": {"useNewUrlParser": true, "retry": 3}
        }))
        .unwrap();
        let resolved = options.resolve().unwrap();
        assert_eq!(resolved.namespace, "app");
        assert!(!resolved.flags.contains_key("useNewUrlParser"));
        assert_eq!(resolved.flags.get("retry"), Some(&json!(3)));
    }

    #[test]
    fn test_store_config_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DOTTED_STATE_URL", "ws://localhost:8000"),
            ("DOTTED_STATE_COLLECTION", "users"),
            ("DOTTED_STATE_USERNAME", "root"),
            ("DOTTED_STATE_PASSWORD", "root"),
            ("DOTTED_STATE_ROOT", "TRUE"),
        ]);
        let config = StoreConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.url, "ws://localhost:8000");
        assert_eq!(config.options.collection.as_deref(), Some("users"));
        assert_eq!(config.options.namespace, None);
        assert!(config.options.root);

        let empty = StoreConfig::from_lookup(|_| None);
        assert_eq!(empty.url, "mem://");
        assert!(!empty.options.root);
    }
}
