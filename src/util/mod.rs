//! Process-wide helpers

pub mod logging;

pub use logging::{init_from_env, init_logging, LoggingConfig};
