//! Tracing subscriber setup for the catalog service.

use std::io;
use tracing_subscriber::{fmt, EnvFilter};

/// Default directives when `RUST_LOG` is unset. Store handler decisions
/// (`service::wms_store`) are only visible at debug.
const COMPACT_FILTER: &str = "info,tower_http=info,axum=info";
const JSON_FILTER: &str = "info,service::wms_store=debug";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// `json` (any case) selects JSON lines; anything else is compact.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }

    /// Read from `LOG_FORMAT`.
    pub fn from_env() -> Self {
        Self::parse(std::env::var("LOG_FORMAT").ok().as_deref())
    }

    fn default_filter(self) -> &'static str {
        match self {
            LogFormat::Compact => COMPACT_FILTER,
            LogFormat::Json => JSON_FILTER,
        }
    }
}

/// Install the global subscriber on stdout. `RUST_LOG` overrides the default
/// filter of the chosen format; a second call is a no-op.
pub fn init_logging(format: LogFormat) {
    // 可通过 RUST_LOG 覆盖，例如 RUST_LOG=info,service::wms_store=trace
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format.default_filter()));
    let builder = fmt().with_env_filter(env_filter).with_target(false).with_writer(io::stdout);
    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
