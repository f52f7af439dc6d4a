//! Logging setup for the provider process.
//!
//! All logs are written to **stderr**. Stdout is reserved for the handshake
//! line the host reads when it spawns the provider.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `hemmer_provider_veeam=debug`)
//!
//! ```bash
//! # Trace every REST call made to the Veeam servers
//! RUST_LOG=hemmer_provider_veeam::client=debug hemmer-provider-veeam
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Maximum length of an HTTP body echoed into the logs.
const MAX_LOG_BODY_LENGTH: usize = 200;

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Initialize the default logging subscriber at `info` level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level, used when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(build_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Useful in tests, where several cases may race to install the subscriber.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(build_filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

/// Truncate an HTTP body and strip control characters before logging it.
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.chars().count() > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", head, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("hemmer_provider_veeam=debug").is_ok());
        assert!(EnvFilter::try_new("warn,hemmer_provider_veeam::client=trace").is_ok());
    }

    #[test]
    fn test_sanitize_short_body() {
        assert_eq!(
            sanitize_for_log("{\"message\":\"Not found\"}\r\n"),
            "{\"message\":\"Not found\"}"
        );
    }

    #[test]
    fn test_sanitize_truncates_long_body() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.starts_with(&"x".repeat(MAX_LOG_BODY_LENGTH)));
        assert!(sanitized.ends_with("[truncated, 500 bytes total]"));
    }

    #[test]
    fn test_try_init_is_idempotent() {
        try_init_logging();
        assert!(!try_init_logging());
    }
}
