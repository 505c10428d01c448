//! Process-wide structured logging for the server.
//!
//! Events go to standard error, filtered by the configured `EnvFilter`
//! directives and rendered as JSON or compact text. The subscriber is global,
//! so only the first successful [`initialise`] call in a process decides the
//! output; later calls report what is already installed.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::filter::{EnvFilter, ParseError};
use tracing_subscriber::fmt::{self, time::UtcTime};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

use crouton_config::{Config, LogFormat};

static INSTALLED_FORMAT: OnceCell<LogFormat> = OnceCell::new();

type Filtered = Layered<EnvFilter, Registry>;

/// Proof that logging is configured, carrying the format in effect.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
}

impl TelemetryHandle {
    /// Output format of the installed subscriber.
    #[must_use]
    pub const fn format(self) -> LogFormat {
        self.format
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured filter is not valid `EnvFilter` syntax.
    #[error("invalid log filter '{filter}': {source}")]
    Filter {
        /// The rejected directive string.
        filter: String,
        /// Parser diagnostic.
        #[source]
        source: ParseError,
    },
    /// Another subscriber was installed outside this module.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Installs the global subscriber on first use.
///
/// # Examples
///
/// ```rust
/// use crouton_config::Config;
/// use croutond::telemetry;
///
/// # fn main() -> Result<(), croutond::TelemetryError> {
/// let config = Config::default();
/// let first = telemetry::initialise(&config)?;
/// let second = telemetry::initialise(&config)?;
/// assert_eq!(first, second);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns a [`TelemetryError`] when the filter does not parse or a foreign
/// subscriber already owns the global slot. Nothing is installed then, and a
/// later call may try again.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED_FORMAT
        .get_or_try_init(|| install(config))
        .map(|format| TelemetryHandle { format: *format })
}

fn install(config: &Config) -> Result<LogFormat, TelemetryError> {
    let filter = parse_filter(config.log_filter())?;
    let format = config.log_format();
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer(format));
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(format)
}

fn parse_filter(directives: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(directives).map_err(|source| TelemetryError::Filter {
        filter: directives.to_owned(),
        source,
    })
}

fn stderr_layer(format: LogFormat) -> Box<dyn Layer<Filtered> + Send + Sync> {
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_thread_names(true)
        .with_timer(UtcTime::rfc_3339());
    match format {
        LogFormat::Json => Box::new(layer.json().flatten_event(true)),
        LogFormat::Compact => Box::new(layer.compact()),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::bad_level("croutond=notalevel")]
    #[case::unknown_level_in_list("info,croutond=verbose")]
    fn rejects_invalid_filter_expressions(#[case] directives: &str) {
        let error = parse_filter(directives).expect_err("invalid filter");
        assert!(
            matches!(&error, TelemetryError::Filter { filter, .. } if filter == directives),
            "{error}"
        );
    }

    #[rstest]
    fn accepts_per_module_directives() {
        parse_filter("info,croutond::dispatch=debug").expect("valid filter");
    }

    #[rstest]
    fn first_installation_decides_the_format() {
        let json = Config {
            log_format: LogFormat::Json,
            ..Config::default()
        };
        let compact = Config {
            log_format: LogFormat::Compact,
            ..Config::default()
        };
        let first = initialise(&json).expect("first initialise");
        let second = initialise(&compact).expect("second initialise");
        assert_eq!(first.format(), second.format());
    }
}
