//! Logging and tracing infrastructure for tracefacts.
//!
//! The engine itself only emits `tracing` events; installing a subscriber is
//! left to the embedding program, which can use the helpers below.

use std::sync::Once;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::{Layered, SubscriberExt},
    registry::Registry,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

static INIT: Once = Once::new();

/// `RUST_LOG` if set, else `info`.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn install<L>(output: L, mode: &'static str)
where
    L: Layer<Layered<EnvFilter, Registry>> + Send + Sync + 'static,
{
    INIT.call_once(|| {
        // A host process may already own the global subscriber.
        let installed = tracing_subscriber::registry()
            .with(env_filter())
            .with(output)
            .try_init()
            .is_ok();
        info!(mode, installed, "tracefacts tracing initialized");
    });
}

/// Human-readable events on stderr, keeping stdout for rendered output.
///
/// Only the first call of this or [`init_tracing_json`] has any effect.
pub fn init_tracing() {
    install(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_line_number(true),
        "text",
    );
}

/// One JSON object per event on stderr.
pub fn init_tracing_json() {
    install(
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true),
        "json",
    );
}

/// Log an error at `error` level and evaluate to it, for use in `map_err`.
#[macro_export]
macro_rules! log_error {
    ($err:expr) => {{
        let err = $err;
        tracing::error!(error = %err, kind = ?err.kind(), "Analysis step failed");
        err
    }};
    ($err:expr, $context:expr) => {{
        let err = $err;
        tracing::error!(error = %err, kind = ?err.kind(), context = $context, "Analysis step failed");
        err
    }};
}
