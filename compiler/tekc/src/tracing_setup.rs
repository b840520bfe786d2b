//! Tracing subscriber setup for the `tekc` binary.
//!
//! - `TEK_LOG` (falling back to `RUST_LOG`): an `EnvFilter` directive,
//!   e.g. `TEK_LOG=tekc=debug,tek_arena=trace`. Nothing is installed when
//!   neither is set.
//! - `TEK_LOG_TREE`: render spans as an indented tree instead of flat
//!   lines.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tracing_tree::HierarchicalLayer;

static TRACING_INIT: Once = Once::new();

/// Installs the global subscriber once. Later calls do nothing.
pub fn init() {
    TRACING_INIT.call_once(|| {
        let Some(filter) = env_filter() else {
            return;
        };
        let registry = tracing_subscriber::registry().with(filter);
        // `try_init`: a test harness may already have installed one.
        let _ = if std::env::var_os("TEK_LOG_TREE").is_some() {
            registry
                .with(
                    HierarchicalLayer::new(2)
                        .with_targets(true)
                        .with_bracketed_fields(true)
                        .with_writer(std::io::stderr),
                )
                .try_init()
        } else {
            registry
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_level(true)
                        .with_thread_names(true)
                        .with_writer(std::io::stderr),
                )
                .try_init()
        };
    });
}

fn env_filter() -> Option<EnvFilter> {
    ["TEK_LOG", "RUST_LOG"]
        .into_iter()
        .find_map(|var| std::env::var(var).ok())
        .map(EnvFilter::new)
}
