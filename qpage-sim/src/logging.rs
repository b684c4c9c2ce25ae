//! Tracing subscriber setup
//!
//! Library code only emits `tracing` events. Binaries, benches and tests
//! that want to see them call [`init_tracing`] once; later calls are no-ops.

use std::env;
use std::sync::OnceLock;
use thiserror::Error;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Registry};

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Output format for the formatter layer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TracingOutput {
    Compact,
    Pretty,
    Json,
}

impl TracingOutput {
    fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Filter directives such as `qpage_state=debug,info`. When absent,
    /// `RUST_LOG` is used and then [`TracingConfig::default_directive`].
    pub directives: Option<String>,
    pub default_directive: String,
    /// Show event targets (module paths)
    pub include_targets: bool,
    pub ansi: bool,
    /// Emit span close events, which carry the busy time of `page_swap`
    pub span_timings: bool,
    pub output: TracingOutput,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_local()
    }
}

impl TracingConfig {
    /// Compact, coloured output for interactive runs
    pub fn for_local() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: true,
            span_timings: false,
            output: TracingOutput::Compact,
        }
    }

    /// JSON lines without colour codes
    pub fn for_ci() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: false,
            span_timings: false,
            output: TracingOutput::Json,
        }
    }

    /// Debug output of the swap protocol with span timings
    pub fn for_swap_analysis() -> Self {
        Self {
            directives: Some("qpage_state=debug,qpage_sim=debug,info".to_string()),
            span_timings: true,
            ..Self::for_ci()
        }
    }

    /// Build a configuration from environment hints
    ///
    /// - `QPAGE_TRACING_PROFILE`: `local` (default), `ci` or `swap`
    /// - `QPAGE_TRACING_DIRECTIVES`: overrides the filter directives
    /// - `QPAGE_TRACING_FORMAT`: `compact`, `pretty` or `json`
    pub fn from_env() -> Self {
        let profile = env::var("QPAGE_TRACING_PROFILE")
            .unwrap_or_else(|_| "local".to_string())
            .to_ascii_lowercase();
        let mut config = match profile.as_str() {
            "ci" => Self::for_ci(),
            "swap" => Self::for_swap_analysis(),
            _ => Self::for_local(),
        };

        if let Ok(directives) = env::var("QPAGE_TRACING_DIRECTIVES") {
            if !directives.trim().is_empty() {
                config.directives = Some(directives);
            }
        }
        if let Some(output) = env::var("QPAGE_TRACING_FORMAT")
            .ok()
            .and_then(|value| TracingOutput::from_env_value(&value))
        {
            config.output = output;
            if output == TracingOutput::Json {
                config.ansi = false;
            }
        }
        config
    }

    fn resolve_filter(&self) -> Result<EnvFilter, LoggingError> {
        match &self.directives {
            Some(directives) => {
                EnvFilter::try_new(directives).map_err(|err| LoggingError::InvalidFilter(err.to_string()))
            }
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.default_directive.clone()))),
        }
    }
}

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("invalid tracing directive: {0}")]
    InvalidFilter(String),

    #[error("failed to install global tracing subscriber: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
}

fn format_layer(config: &TracingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let span_events = if config.span_timings {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    match config.output {
        TracingOutput::Compact => Box::new(
            tracing_fmt::layer()
                .compact()
                .with_target(config.include_targets)
                .with_ansi(config.ansi)
                .with_thread_names(true)
                .with_span_events(span_events),
        ),
        TracingOutput::Pretty => Box::new(
            tracing_fmt::layer()
                .pretty()
                .with_target(config.include_targets)
                .with_ansi(config.ansi)
                .with_thread_names(true)
                .with_span_events(span_events),
        ),
        TracingOutput::Json => Box::new(
            tracing_fmt::layer()
                .json()
                .with_target(config.include_targets)
                .with_thread_names(true)
                .with_span_events(span_events)
                .with_ansi(false),
        ),
    }
}

/// Install the configured subscriber as the process-wide default
///
/// Returns `Ok(false)` when this function already installed one.
///
/// # Errors
///
/// Fails on unparsable directives or when a subscriber from elsewhere is
/// already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<bool, LoggingError> {
    if INSTALLED.get().is_some() {
        return Ok(false);
    }
    let filter = config.resolve_filter()?;
    Registry::default()
        .with(format_layer(config))
        .with(filter)
        .try_init()?;
    let _ = INSTALLED.set(());
    Ok(true)
}
