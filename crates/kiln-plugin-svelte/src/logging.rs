//! Subscriber setup for binaries embedding the plugin
//!
//! Only available with the `logging` feature. Libraries should install their
//! own subscriber; the plugin itself only emits `tracing` events.

use std::sync::Once;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Verbosity of plugin output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Silent,
    Error,
    /// Compiler warnings surface here
    #[default]
    Warn,
    Info,
    /// Per-file load and cache events
    Debug,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Silent => "kiln_plugin_svelte=off",
            LogLevel::Error => "kiln_plugin_svelte=error",
            LogLevel::Warn => "kiln_plugin_svelte=warn",
            LogLevel::Info => "kiln_plugin_svelte=info",
            LogLevel::Debug => "kiln_plugin_svelte=debug",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "silent" | "off" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "trace" => Ok(LogLevel::Debug),
            other => Err(format!("Invalid log level: {other}")),
        }
    }
}

fn install(filter: EnvFilter) {
    INIT.call_once(|| {
        // Another subscriber may already be installed by the host; keep it
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false))
            .try_init();
    });
}

/// Installs a global subscriber for plugin events at `level`.
///
/// `RUST_LOG` directives still apply on top. Only the first call has an effect.
pub fn init_logging(level: LogLevel) {
    let filter = match level.directive().parse() {
        Ok(directive) => EnvFilter::builder()
            .with_default_directive(directive)
            .from_env_lossy(),
        Err(_) => EnvFilter::from_default_env(),
    };
    install(filter);
}

/// Installs a global subscriber configured only by `RUST_LOG`
pub fn init_logging_from_env() {
    install(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")));
}
