use std::sync::Once;

use tracing_subscriber::util::TryInitError;

/// Filter directives for the tracing subscriber, e.g. `galena_exec=trace`.
pub const LOG_ENV: &str = "GALENA_LOG";

/// Set to `1` for indented span trees instead of flat lines.
pub const LOG_TREE_ENV: &str = "GALENA_LOG_TREE";

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Does nothing unless `GALENA_LOG` is set. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let Ok(directives) = std::env::var(LOG_ENV) else {
            return;
        };
        let tree = std::env::var(LOG_TREE_ENV).is_ok_and(|value| value == "1");
        // The host may already have installed a subscriber; keep theirs.
        if let Err(err) = install(&directives, tree) {
            tracing::debug!(%err, "tracing subscriber already installed");
        }
    });
}

fn install(directives: &str, tree: bool) -> Result<(), TryInitError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::new(directives);
    let registry = tracing_subscriber::registry();
    if tree {
        registry
            .with(
                tracing_tree::HierarchicalLayer::new(2)
                    .with_targets(true)
                    .with_bracketed_fields(true),
            )
            .with(filter)
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter)
            .try_init()
    }
}
