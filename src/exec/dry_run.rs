use super::real::{read_dir_sorted, walk_files_sorted};
use super::{Action, CommandSpec, DirEntry, Executor};
use crate::error::{BuildError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Logs and records every side effect without performing it. Queries are
/// answered from the real filesystem.
#[derive(Default)]
pub struct DryRunExecutor {
    actions: Mutex<Vec<Action>>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything that would have been done, in order.
    pub fn actions(&self) -> Vec<Action> {
        self.actions
            .lock()
            .map(|actions| actions.clone())
            .unwrap_or_default()
    }

    fn record(&self, action: Action) -> Result<()> {
        action.log();
        if let Ok(mut actions) = self.actions.lock() {
            actions.push(action);
        }
        Ok(())
    }
}

impl Executor for DryRunExecutor {
    fn is_dry_run(&self) -> bool {
        true
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        if !path.is_dir() {
            return Ok(Vec::new());
        }
        read_dir_sorted(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| BuildError::io("read", path, e))
    }

    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        walk_files_sorted(root)
    }

    fn run(&self, command: &CommandSpec) -> Result<()> {
        self.record(Action::Run {
            command: command.clone(),
        })
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.record(Action::CreateDir {
            path: path.to_path_buf(),
        })
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> Result<()> {
        self.record(Action::CopyFile {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        })
    }

    fn copy_dir(&self, src: &Path, dst: &Path, _skip: &[PathBuf]) -> Result<()> {
        self.record(Action::CopyDir {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        })
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.record(Action::RemoveDir {
            path: path.to_path_buf(),
        })
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.record(Action::RemoveFile {
            path: path.to_path_buf(),
        })
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.record(Action::Rename {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        })
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        self.record(Action::Symlink {
            target: target.to_path_buf(),
            link: link.to_path_buf(),
        })
    }

    fn write_file(&self, path: &Path, _contents: &str, executable: bool) -> Result<()> {
        self.record(Action::WriteFile {
            path: path.to_path_buf(),
            executable,
        })
    }
}
