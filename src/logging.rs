//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over the fallback filter passed in. Both initialisers use
//! `try_init`, so a second call (another test, an embedding application that
//! already installed a subscriber) leaves the existing one in place.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor the caller says otherwise.
pub const DEFAULT_FILTER: &str = "info,recordflow=debug";

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install a stderr fmt subscriber.
///
/// Returns `false` when a global subscriber was already set.
pub fn init_tracing(default_filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .try_init()
        .is_ok()
}

/// Install a stderr subscriber plus a daily rolling log file
/// `<dir>/<prefix>.YYYY-MM-DD`.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
pub fn init_file_tracing(dir: impl AsRef<Path>, prefix: &str, default_filter: &str) -> WorkerGuard {
    let appender = tracing_appender::rolling::daily(dir.as_ref(), prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let installed = tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_thread_names(true)
                .with_writer(writer),
        )
        .try_init()
        .is_ok();
    if !installed {
        tracing::debug!("Subscriber already installed; file log at {:?} not attached", dir.as_ref());
    }
    guard
}
