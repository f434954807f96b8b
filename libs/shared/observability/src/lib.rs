//! Structured logging initialization and panic capture: an `EnvFilter`
//! plus a choice between a compact human-readable formatter and a
//! flattened JSON formatter, and a global panic hook.

use std::panic;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// A panic report handed to the caller-supplied sink: a panic on any
/// non-real-time thread leaves a forensic trace as an action-journal
/// entry before the default hook runs.
#[derive(Debug, Clone)]
pub struct PanicReport {
    pub thread_name: String,
    pub location: String,
    pub message: String,
}

/// Initializes the global `tracing` subscriber. `service_name` seeds the
/// default env-filter directive when `RUST_LOG` is unset.
pub fn init_tracing(service_name: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{service_name}={level},libsql=warn",
            level = if cfg!(debug_assertions) { "debug" } else { "info" }
        ))
    });

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().flatten_event(true))
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_target(false))
                .init();
        }
    }
}

/// Installs a panic hook that forwards a `PanicReport` to `on_panic`
/// before running the process's previous hook. `on_panic` must not panic
/// or block — it's called on the panicking thread, inside the hook.
pub fn install_panic_hook<F>(on_panic: F)
where
    F: Fn(PanicReport) + Send + Sync + 'static,
{
    let previous_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let message = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("non-string panic payload")
            .to_string();
        let thread_name = std::thread::current().name().unwrap_or("unnamed").to_string();

        on_panic(PanicReport { thread_name, location, message });
        previous_hook(info);
    }));
}
