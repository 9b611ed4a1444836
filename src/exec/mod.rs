//! Side-effect executor: the only way the pipeline touches processes and
//! the filesystem

mod command;
mod dry_run;
mod memory;
mod real;
mod r#trait;

pub use command::{Action, CommandSpec};
pub use dry_run::DryRunExecutor;
pub use memory::{MemoryExecutor, MemoryNode};
pub use r#trait::{DirEntry, Executor, FileType};
pub use real::RealExecutor;

use crate::error::{BuildError, Result};
use std::path::Path;
use tracing::warn;

/// Whether `path` exists. A missing path is `MissingArtifact`, except in a
/// dry run: nothing was built, so the gap is only logged.
pub fn check_artifact(exec: &dyn Executor, artifact: &str, path: &Path) -> Result<bool> {
    if exec.exists(path) {
        return Ok(true);
    }
    if exec.is_dry_run() {
        warn!("Missing {} (dry run): {}", artifact, path.display());
        return Ok(false);
    }
    Err(BuildError::missing(artifact, path))
}
