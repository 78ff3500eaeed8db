//!
//! src/logging.rs
//!
//! Initializes the tracing subscriber. Output goes through a non-blocking
//! stdout writer whose guard must outlive the server.
//!

use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use tracing_error::ErrorLayer;
use tracing_appender::non_blocking;

use crate::config::{LogFormat, LoggingConfig};

pub struct LoggingGuard(tracing_appender::non_blocking::WorkerGuard);

fn build_filter(cfg: &LoggingConfig) -> EnvFilter {
    std::env::var("RUST_LOG")
        .ok()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(cfg.filter_directives.clone()))
}

pub fn init_logging(cfg: &LoggingConfig) ->
    Result<LoggingGuard, crate::errors::ResolverError> {

    let (writer, guard) = non_blocking(std::io::stdout());
    let filter = build_filter(cfg);
    let time = fmt::time::UtcTime::rfc_3339();

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());

    let result = match cfg.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .with_writer(writer)
                .with_timer(time)
                .with_target(cfg.include_target)
                .with_file(cfg.include_file_line)
                .with_line_number(cfg.include_file_line)
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(true);
            registry.with(fmt_layer).try_init()
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .with_writer(writer)
                .with_timer(time)
                .with_ansi(cfg.with_ansi)
                .with_target(cfg.include_target)
                .with_file(cfg.include_file_line)
                .with_line_number(cfg.include_file_line)
                .pretty();
            registry.with(fmt_layer).try_init()
        }
    };

    result.map_err(|e| crate::errors::ResolverError::Config(
        format!("logging init: {e}")
    ))?;
    Ok( LoggingGuard(guard) )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_falls_back_to_config_directives() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let cfg = LoggingConfig::default();
        let filter = build_filter(&cfg);
        assert!(filter.to_string().contains("nowplaying_resolver=debug"));
    }
}
