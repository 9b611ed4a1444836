//! Executor trait definition

use super::CommandSpec;
use crate::error::Result;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Type of file system entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
    Symlink,
}

/// A directory entry returned by read_dir
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub path: PathBuf,
    pub name: OsString,
    pub file_type: FileType,
}

impl DirEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &OsStr {
        &self.name
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

/// Every side effect of a pipeline run goes through this trait, so a run
/// can be performed for real, only logged, or simulated in memory.
///
/// Queries never mutate anything. Mutations are expected to fail if the
/// parent directory of their destination does not exist, like the
/// underlying OS calls.
pub trait Executor: Send + Sync {
    /// True when side effects are only recorded. Nothing was built, so
    /// callers relax checks on build outputs.
    fn is_dry_run(&self) -> bool {
        false
    }

    /// Check if a path exists (a dangling symlink exists)
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Check if path is a file
    fn is_file(&self, path: &Path) -> bool;

    /// List directory contents, sorted by name
    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Read file contents as string
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// All regular files below `root`, sorted
    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>>;

    /// Run a command to completion. Non-zero exit is `ExternalCommandFailure`.
    fn run(&self, command: &CommandSpec) -> Result<()>;

    fn create_dir_all(&self, path: &Path) -> Result<()>;

    fn copy_file(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Recursively copy `src` to the new directory `dst`, leaving out the
    /// entries whose path relative to `src` starts with one of `skip`.
    fn copy_dir(&self, src: &Path, dst: &Path, skip: &[PathBuf]) -> Result<()>;

    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    fn remove_file(&self, path: &Path) -> Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Create `link` pointing at `target` (stored verbatim, usually relative).
    fn symlink(&self, target: &Path, link: &Path) -> Result<()>;

    fn write_file(&self, path: &Path, contents: &str, executable: bool) -> Result<()>;

    /// Remove `path` if it is a directory, then recreate it empty.
    fn reset_dir(&self, path: &Path) -> Result<()> {
        if self.exists(path) {
            self.remove_dir_all(path)?;
        }
        self.create_dir_all(path)
    }
}
