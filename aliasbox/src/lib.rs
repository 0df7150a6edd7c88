use crate::config::Config;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod index;

pub fn init_logging(config: &Config) -> DefaultGuard {
    use tracing_rfc_5424::{
        rfc3164::Rfc3164, tracing::TrivialTracingFormatter, transport::UnixSocket,
    };
    use tracing_subscriber::{fmt, Registry};
    use tracing_subscriber::{
        layer::SubscriberExt, // Needed to get `with()`
    };

    let syslog = if config.syslog {
        match tracing_rfc_5424::layer::Layer::<
            tracing_subscriber::Registry,
            Rfc3164,
            TrivialTracingFormatter,
            UnixSocket,
        >::try_default()
        {
            Ok(layer) => Some(layer),
            Err(err) => {
                eprintln!("syslog unavailable, logging to stdout only: {err:?}");
                None
            }
        }
    } else {
        None
    };

    let filter = log_filter(config.log_filter.as_deref());

    // stdout is shared with the child once it starts
    let subscriber = Registry::default()
        .with(syslog)
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(false),
        );
    tracing::subscriber::set_default(subscriber)
}

/// Filter for `ALIASBOX_LOG` directives, `warn` when unset or invalid.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    match directives.map(EnvFilter::try_new) {
        Some(Ok(filter)) => filter,
        Some(Err(err)) => {
            eprintln!("ignoring invalid {}: {err}", config::LOG_VAR);
            EnvFilter::new("warn")
        }
        None => EnvFilter::new("warn"),
    }
}

#[test]
fn test_log_filter_falls_back_to_warn() {
    assert_eq!(log_filter(None).to_string(), "warn");
    assert_eq!(log_filter(Some("aliasbox=loud")).to_string(), "warn");
    assert_eq!(log_filter(Some("trace")).to_string(), "trace");
}
