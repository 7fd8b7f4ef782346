//! Logging setup and the change-log toggle
//!
//! Every crate in the workspace logs through `tracing`. The toggle silences
//! events whose target starts with `armory` without touching anything else
//! the host process logs.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::Metadata;
use tracing_subscriber::filter::{filter_fn, FilterFn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use armory_core::{ArmoryError, ArmoryResult};

static LOG_ENABLED: AtomicBool = AtomicBool::new(true);

/// Target prefix covered by the toggle
pub const LOG_TARGET_PREFIX: &str = "armory";

/// Turn armory log output on or off process-wide
pub fn set_log_enabled(enabled: bool) {
    LOG_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn log_enabled() -> bool {
    LOG_ENABLED.load(Ordering::Relaxed)
}

/// Would an event with this target pass the toggle?
pub fn passes_toggle(target: &str) -> bool {
    log_enabled() || !target.starts_with(LOG_TARGET_PREFIX)
}

/// Per-layer filter that drops armory events while the toggle is off
pub fn toggle_filter() -> FilterFn<impl Fn(&Metadata<'_>) -> bool> {
    filter_fn(|meta| passes_toggle(meta.target()))
}

/// Subscriber settings
#[derive(Clone, Debug)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Install the global subscriber
///
/// Fails if the filter directive is invalid or a global subscriber is
/// already set.
pub fn init_logging(config: &LogConfig) -> ArmoryResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ArmoryError::Config(e.to_string()))?;

    if config.json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_filter(toggle_filter());
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| ArmoryError::Config(e.to_string()))?;
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_filter(toggle_filter());
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| ArmoryError::Config(e.to_string()))?;
    }

    tracing::debug!(level = %config.level, json = config.json, "Logging initialized");
    Ok(())
}
