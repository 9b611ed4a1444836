//! Merging raw execution profiles into the file stage2 optimizes with

use crate::error::{BuildError, Result};
use crate::exec::{CommandSpec, Executor};
use crate::stage::env::PROFILE_FILE_PATTERN;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A merged profile and the raw profiles it was made from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileArtifact {
    pub merged_path: PathBuf,
    /// Sorted and non-empty. A dry run lists the file pattern the
    /// generating stage writes to.
    pub source_raw_profiles: Vec<PathBuf>,
}

pub struct ProfileMerger<'a> {
    exec: &'a dyn Executor,
    llvm_profdata: PathBuf,
}

impl<'a> ProfileMerger<'a> {
    /// `llvm_profdata` is the merge tool, normally the one installed from
    /// stage1.
    pub fn new(exec: &'a dyn Executor, llvm_profdata: impl Into<PathBuf>) -> Self {
        Self {
            exec,
            llvm_profdata: llvm_profdata.into(),
        }
    }

    /// Raw profiles in `profiles_dir`, sorted.
    pub fn raw_profiles(&self, profiles_dir: &Path) -> Result<Vec<PathBuf>> {
        if !self.exec.is_dir(profiles_dir) {
            return Ok(Vec::new());
        }
        Ok(self
            .exec
            .read_dir(profiles_dir)?
            .into_iter()
            .filter(|entry| !entry.is_dir())
            .map(|entry| entry.path)
            .collect())
    }

    pub fn merge_command(&self, inputs: &[PathBuf], output: &Path) -> CommandSpec {
        CommandSpec::new(self.llvm_profdata.display().to_string())
            .args(["merge", "-j", "1"])
            .arg(format!("-output={}", output.display()))
            .args(inputs.iter().map(|p| p.display().to_string()))
    }

    /// Merge every raw profile in `profiles_dir` into `output`.
    ///
    /// An empty (or absent) directory is `EmptyProfileSet` and no command is
    /// run. A dry run never looks at the directory: the generating stage
    /// would have cleared it, so the merge is recorded over the profile file
    /// pattern instead.
    pub fn merge(&self, profiles_dir: &Path, output: &Path) -> Result<ProfileArtifact> {
        let inputs = if self.exec.is_dry_run() {
            warn!(
                "Dry run, nothing was profiled: merging {} as planned",
                profiles_dir.display()
            );
            vec![profiles_dir.join(PROFILE_FILE_PATTERN)]
        } else {
            self.raw_profiles(profiles_dir)?
        };

        if inputs.is_empty() {
            return Err(BuildError::EmptyProfileSet {
                dir: profiles_dir.to_path_buf(),
            });
        }

        info!(
            "Merging {} raw profile(s) into {}",
            inputs.len(),
            output.display()
        );
        self.exec.run(&self.merge_command(&inputs, output))?;

        Ok(ProfileArtifact {
            merged_path: output.to_path_buf(),
            source_raw_profiles: inputs,
        })
    }
}
