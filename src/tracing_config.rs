//! Tracing configuration for the command-line shell
//!
//! The library only emits events; the binary decides where they go by
//! installing a subscriber built here.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable colored console output (default)
    Console,
    /// Plain compact output for CI logs
    Compact,
    /// JSON structured logging
    #[cfg(feature = "tracing-json")]
    Json,
}

impl TracingFormat {
    /// Format for the shell: machine-readable output asks for JSON logs when
    /// the `tracing-json` feature is built in, plain compact lines otherwise
    #[must_use]
    pub fn for_output(json: bool) -> Self {
        if !json {
            return Self::Console;
        }
        #[cfg(feature = "tracing-json")]
        {
            Self::Json
        }
        #[cfg(not(feature = "tracing-json"))]
        {
            Self::Compact
        }
    }
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    /// Output format
    pub format: TracingFormat,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
    /// Session ID for correlating one invocation's events
    pub session_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            env_filter: None,
            session_id: None,
        }
    }
}

impl TracingConfig {
    /// Create a new tracing configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-2+)
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set output format
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Set custom environment filter
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Set session ID
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Convert verbosity level to tracing filter string
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",  // Default: batch and download milestones
            1 => "debug", // -v: per-image stages
            _ => "trace", // -vv+: everything
        }
    }

    /// Resolve the filter directive in effect
    pub fn filter_directive(&self) -> String {
        self.env_filter
            .clone()
            .unwrap_or_else(|| self.verbosity_to_filter().to_string())
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// - the filter directive does not parse
    /// - a global subscriber is already installed
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let filter = EnvFilter::try_new(self.filter_directive())?;
        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => {
                let fmt_layer = fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            TracingFormat::Compact => {
                let fmt_layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr);
                registry.with(fmt_layer).try_init()?;
            },
        }

        if let Some(session_id) = &self.session_id {
            tracing::debug!(session_id = %session_id, "nobg session started");
        }

        Ok(())
    }
}

/// CLI tracing configuration tagged with the invocation's session id
#[must_use]
pub fn cli_tracing_config(verbosity: u8, json: bool, session_id: &str) -> TracingConfig {
    TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(TracingFormat::for_output(json))
        .with_session_id(session_id)
}

/// Initialize tracing with CLI defaults
///
/// `session_id` should be the same id the caller puts on its
/// [`spans::session`] span, so every event of one run correlates.
///
/// # Errors
/// - see [`TracingConfig::init`]
pub fn init_cli_tracing(verbosity: u8, json: bool, session_id: &str) -> anyhow::Result<()> {
    cli_tracing_config(verbosity, json, session_id).init()
}

/// Span creation helpers for shell-level operations
pub mod spans {
    use tracing::{Level, Span};

    /// Span for one CLI invocation
    pub fn session(session_id: &str, service: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "session",
            session_id = %session_id,
            service = %service
        )
    }

    /// Span for a model download
    pub fn download(remote_id: &str, destination: &std::path::Path) -> Span {
        tracing::span!(
            Level::INFO,
            "download",
            remote_id = %remote_id,
            destination = %destination.display()
        )
    }
}
