//! Logging utilities for the CBRI client.
//!
//! Diagnostics are emitted through `tracing`. The operator audit trail is a
//! separate channel, see [`crate::sink`].

/// Truncates a string to the maximum field length if needed.
///
/// Response bodies are passed through this before they reach a `tracing`
/// event so an HTML error page does not flood the log.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        value.to_string()
    } else {
        let mut end = max_length;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...(truncated)", &value[..end])
    }
}

/// Maximum length of a response body recorded in a `tracing` event.
pub const MAX_LOGGED_BODY: usize = 512;

/// Utilities for setting up structured logging.
pub mod setup {
    use tracing::Level;

    /// Configuration for the CBRI logging setup.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for the application
        pub level: Level,
        /// Log level for the CBRI crates specifically
        pub cbri_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                cbri_level: Level::INFO,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// Creates a configuration for production use.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                cbri_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        /// Creates a configuration for development use.
        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                cbri_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        /// Sets the log level for the application.
        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        /// Sets the log level for CBRI components.
        pub fn with_cbri_level(mut self, level: Level) -> Self {
            self.cbri_level = level;
            self
        }

        /// Sets whether to use JSON output format.
        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sets a custom environment filter.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                let cbri = self.cbri_level.as_str().to_lowercase();
                format!(
                    "{},cbri_core={cbri},cbri_step={cbri}",
                    self.level.as_str().to_lowercase(),
                )
            }
        }
    }

    /// Initializes logging to stderr.
    ///
    /// `RUST_LOG` takes precedence over the configured filter.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use cbri_core::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}
