//! Structured logging setup
//!
//! Logs go to stderr through a `tracing-subscriber` registry. The level comes
//! from, in order: an explicit `--log-level`, `-v` (debug), `-q` (error), or
//! `CLANG_BUILD_LOG_LEVEL`. `RUST_LOG` replaces the whole filter when set.
//!
//! ```no_run
//! use clang_build::util::logging;
//!
//! logging::init_from_env();
//! tracing::info!("Toolchain build starting");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the default level.
pub const LOG_LEVEL_VAR: &str = "CLANG_BUILD_LOG_LEVEL";

static INIT: Once = Once::new();

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level for this crate's own events. Other crates log at warn.
    pub level: Level,

    /// One JSON object per line instead of human-readable output
    pub use_json: bool,

    /// Include the module path of each event
    pub include_target: bool,

    /// Include file and line number
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn with_json(mut self, use_json: bool) -> Self {
        self.use_json = use_json;
        if use_json {
            self.include_location = true;
        }
        self
    }

    /// Filter directives used when `RUST_LOG` is unset.
    pub fn directives(&self) -> String {
        format!("warn,clang_build={}", self.level)
    }
}

/// Parses a level name, case-insensitively. Unknown names fall back to
/// INFO with a note on stderr.
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

/// Pick the level from command-line switches, falling back to
/// `CLANG_BUILD_LOG_LEVEL`.
pub fn resolve_level(explicit: Option<&str>, verbose: bool, quiet: bool) -> Level {
    if let Some(level_str) = explicit {
        parse_level(level_str)
    } else if verbose {
        Level::DEBUG
    } else if quiet {
        Level::ERROR
    } else {
        env::var(LOG_LEVEL_VAR)
            .map(|level_str| parse_level(&level_str))
            .unwrap_or(Level::INFO)
    }
}

/// Installs the global subscriber. Only the first call has any effect.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.directives()));

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location),
                )
                .init();
        }
    });
}

pub fn init_from_env() {
    init_logging(LoggingConfig::with_level(resolve_level(None, false, false)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("Debug"), Level::DEBUG);
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
    }

    #[test]
    fn test_parse_level_invalid() {
        assert_eq!(parse_level("loud"), Level::INFO);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    #[serial]
    fn test_switches_beat_environment() {
        env::set_var(LOG_LEVEL_VAR, "trace");
        assert_eq!(resolve_level(Some("warn"), true, false), Level::WARN);
        assert_eq!(resolve_level(None, true, false), Level::DEBUG);
        assert_eq!(resolve_level(None, false, true), Level::ERROR);
        assert_eq!(resolve_level(None, false, false), Level::TRACE);
        env::remove_var(LOG_LEVEL_VAR);
    }

    #[test]
    #[serial]
    fn test_default_level_without_environment() {
        env::remove_var(LOG_LEVEL_VAR);
        assert_eq!(resolve_level(None, false, false), Level::INFO);
    }

    #[test]
    fn test_directives() {
        let config = LoggingConfig::with_level(Level::DEBUG);
        assert_eq!(config.directives(), "warn,clang_build=DEBUG");
        assert!(!config.use_json);
        assert!(config.with_json(true).include_location);
    }
}
