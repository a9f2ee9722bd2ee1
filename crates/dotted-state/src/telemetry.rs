//! Tracing setup for applications embedding dotted-state.
//!
//! The library only emits `tracing` events under the `dotted_state` target:
//! connection requests and teardown at `debug`, readiness at `info`, and
//! transport errors at `warn`. [`init_tracing`] installs a subscriber scoped
//! to that target so the host application's own logs are left alone.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Target prefix of every event this crate emits.
pub const LOG_TARGET: &str = "dotted_state";

/// Filter variable read before `RUST_LOG`.
pub const LOG_ENV: &str = "DOTTED_STATE_LOG";

/// Filter directives to install.
///
/// `DOTTED_STATE_LOG` wins over `RUST_LOG`; with neither set (or set to an
/// empty string) only this crate's events at `level` and above pass.
pub fn filter_directives<F>(lookup: F, level: Level) -> String
where
    F: Fn(&str) -> Option<String>,
{
    [LOG_ENV, EnvFilter::DEFAULT_ENV]
        .into_iter()
        .filter_map(|name| lookup(name))
        .find(|directives| !directives.trim().is_empty())
        .unwrap_or_else(|| format!("{}={}", LOG_TARGET, level.as_str().to_ascii_lowercase()))
}

/// Install the global subscriber, reading filters from the process environment.
///
/// `json` switches to newline-delimited JSON lines. Only the first call in a
/// process takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let directives = filter_directives(|name| std::env::var(name).ok(), level);
    let registry = tracing_subscriber::registry().with(EnvFilter::new(directives));

    let installed = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    if installed.is_ok() {
        tracing::debug!(target: LOG_TARGET, "tracing initialised");
    }
}
