//! Tracing-subscriber initialization for binaries embedding this crate.
//!
//! The library itself only emits `tracing` events; it never installs a
//! subscriber on its own (doing so from a library would fight whatever the
//! embedding binary wants). `init_tracing` is here for callers that want the
//! same env-filter/fmt-layer setup this crate's own integration tests and
//! examples use.

use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Install a `tracing_subscriber` registry with an `EnvFilter` and a
/// human-readable fmt layer. Idempotent: only the first call takes effect.
///
/// `filter` is an `EnvFilter` directive string (e.g. `"semem_core=debug,info"`);
/// `None` falls back to `"info"`.
pub fn init_tracing(filter: Option<&str>) {
    INIT.call_once(|| {
        let filter = filter.map_or_else(|| EnvFilter::new("info"), EnvFilter::new);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent_across_repeated_calls() {
        init_tracing(Some("debug"));
        init_tracing(Some("trace"));
        tracing::info!("still routed through the first installed subscriber");
    }
}
