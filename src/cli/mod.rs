pub mod commands;
pub mod handlers;

pub use commands::CliArgs;
pub use handlers::{exit_code, handle_build, load_config, pipeline_options};
