use super::{Action, CommandSpec, DirEntry, Executor, FileType};
use crate::error::{BuildError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use walkdir::WalkDir;

/// Performs every action on the local machine.
pub struct RealExecutor;

impl RealExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_type(path: &Path) -> FileType {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => FileType::Symlink,
        Ok(meta) if meta.is_dir() => FileType::Directory,
        _ => FileType::File,
    }
}

pub(super) fn read_dir_sorted(path: &Path) -> Result<Vec<DirEntry>> {
    let entries = fs::read_dir(path).map_err(|e| BuildError::io("read directory", path, e))?;

    let mut result = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| BuildError::io("read directory entry", path, e))?;
        let path = entry.path();
        let name = entry.file_name();
        let file_type = entry_type(&path);
        result.push(DirEntry {
            path,
            name,
            file_type,
        });
    }
    result.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(result)
}

pub(super) fn walk_files_sorted(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            BuildError::io("walk", &path, e.into())
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)
        .map_err(|e| BuildError::io("stat", path, e))?
        .permissions();
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(path, perms).map_err(|e| BuildError::io("chmod", path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

impl Executor for RealExecutor {
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
        read_dir_sorted(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| BuildError::io("read", path, e))
    }

    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        walk_files_sorted(root)
    }

    fn run(&self, command: &CommandSpec) -> Result<()> {
        Action::Run {
            command: command.clone(),
        }
        .log();

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args).envs(&command.env);
        if let Some(cwd) = &command.cwd {
            cmd.current_dir(cwd);
        }
        if let Some(stdout) = &command.stdout {
            let file = fs::File::create(stdout).map_err(|e| BuildError::io("create", stdout, e))?;
            cmd.stdout(Stdio::from(file));
        }

        let status = cmd.status().map_err(|e| {
            tracing::error!("Failed to spawn {}: {}", command.program, e);
            BuildError::command_failed(command.display(), None)
        })?;

        if !status.success() {
            return Err(BuildError::command_failed(command.display(), status.code()));
        }
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        Action::CreateDir {
            path: path.to_path_buf(),
        }
        .log();
        fs::create_dir_all(path).map_err(|e| BuildError::io("create directory", path, e))
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> Result<()> {
        Action::CopyFile {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        }
        .log();
        fs::copy(src, dst).map_err(|e| BuildError::io("copy", src, e))?;
        Ok(())
    }

    fn copy_dir(&self, src: &Path, dst: &Path, skip: &[PathBuf]) -> Result<()> {
        Action::CopyDir {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        }
        .log();

        let walker = WalkDir::new(src)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                let rel = e.path().strip_prefix(src).unwrap_or(e.path());
                !skip.iter().any(|s| rel.starts_with(s))
            });

        for entry in walker {
            let entry = entry.map_err(|e| BuildError::io("walk", src, e.into()))?;
            let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
            let target = dst.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)
                    .map_err(|e| BuildError::io("create directory", &target, e))?;
            } else {
                fs::copy(entry.path(), &target)
                    .map_err(|e| BuildError::io("copy", entry.path(), e))?;
            }
        }
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        Action::RemoveDir {
            path: path.to_path_buf(),
        }
        .log();
        fs::remove_dir_all(path).map_err(|e| BuildError::io("remove directory", path, e))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        Action::RemoveFile {
            path: path.to_path_buf(),
        }
        .log();
        fs::remove_file(path).map_err(|e| BuildError::io("remove", path, e))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        Action::Rename {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        }
        .log();
        fs::rename(from, to).map_err(|e| BuildError::io("rename", from, e))
    }

    #[cfg(unix)]
    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        Action::Symlink {
            target: target.to_path_buf(),
            link: link.to_path_buf(),
        }
        .log();
        std::os::unix::fs::symlink(target, link).map_err(|e| BuildError::io("symlink", link, e))
    }

    #[cfg(not(unix))]
    fn symlink(&self, _target: &Path, link: &Path) -> Result<()> {
        Err(BuildError::io(
            "symlink",
            link,
            std::io::Error::new(std::io::ErrorKind::Unsupported, "symlinks need a unix build machine"),
        ))
    }

    fn write_file(&self, path: &Path, contents: &str, executable: bool) -> Result<()> {
        Action::WriteFile {
            path: path.to_path_buf(),
            executable,
        }
        .log();
        fs::write(path, contents).map_err(|e| BuildError::io("write", path, e))?;
        if executable {
            make_executable(path)?;
        }
        Ok(())
    }
}
