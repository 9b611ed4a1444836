use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

/// Every failure the pipeline can surface. None of them is recovered
/// locally: the run stops at the first one.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Command failed{}: {command}", exit_suffix(.code))]
    ExternalCommandFailure { command: String, code: Option<i32> },

    #[error("Missing {artifact}: {}", .path.display())]
    MissingArtifact { artifact: String, path: PathBuf },

    #[error("No raw profiles found in {}", .dir.display())]
    EmptyProfileSet { dir: PathBuf },

    #[error("Unsupported host: {0}. Valid hosts: linux-x86, darwin-x86, windows-x86")]
    UnsupportedHost(String),

    #[error("Invalid profile task: '{0}'. Expected none, instrument, generate or use=<path>")]
    InvalidProfileTask(String),

    #[error("Failed to {op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" (exit code {})", code),
        None => String::new(),
    }
}

impl BuildError {
    pub fn command_failed(command: impl Into<String>, code: Option<i32>) -> Self {
        BuildError::ExternalCommandFailure {
            command: command.into(),
            code,
        }
    }

    pub fn missing(artifact: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        BuildError::MissingArtifact {
            artifact: artifact.into(),
            path: path.into(),
        }
    }

    pub fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        BuildError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Process exit code for this error. A failing external command
    /// propagates its own code.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::ExternalCommandFailure {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}
