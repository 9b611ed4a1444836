use super::{Action, CommandSpec, DirEntry, Executor, FileType};
use crate::error::{BuildError, Result};
use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryNode {
    File { contents: String, executable: bool },
    Dir,
    Symlink { target: PathBuf },
}

impl MemoryNode {
    fn file_type(&self) -> FileType {
        match self {
            MemoryNode::File { .. } => FileType::File,
            MemoryNode::Dir => FileType::Directory,
            MemoryNode::Symlink { .. } => FileType::Symlink,
        }
    }
}

type CommandMatcher = Box<dyn Fn(&CommandSpec) -> bool + Send + Sync>;
/// Simulated effect of a command; the returned text is its stdout.
type CommandEffect = Arc<dyn Fn(&CommandSpec, &MemoryExecutor) -> Result<String> + Send + Sync>;

const MAX_SYMLINK_DEPTH: usize = 16;

/// An in-memory filesystem plus scripted commands. Records every action
/// like the dry-run executor, but actually applies file operations to its
/// own tree so later steps observe them.
pub struct MemoryExecutor {
    nodes: RwLock<BTreeMap<PathBuf, MemoryNode>>,
    actions: Mutex<Vec<Action>>,
    hooks: RwLock<Vec<(CommandMatcher, CommandEffect)>>,
    root: PathBuf,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::with_root(PathBuf::from("/mock"))
    }

    /// Relative paths are taken relative to `root`.
    pub fn with_root(root: PathBuf) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::from("/"), MemoryNode::Dir);
        let exec = Self {
            nodes: RwLock::new(nodes),
            actions: Mutex::new(Vec::new()),
            hooks: RwLock::new(Vec::new()),
            root: root.clone(),
        };
        exec.add_dir(root);
        exec
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: &str) {
        let path = self.normalize_path(path.as_ref());
        let mut nodes = self.write_nodes();
        if let Some(parent) = path.parent() {
            ensure_parents(&mut nodes, parent);
        }
        nodes.insert(
            path,
            MemoryNode::File {
                contents: content.to_string(),
                executable: false,
            },
        );
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = self.normalize_path(path.as_ref());
        let mut nodes = self.write_nodes();
        ensure_parents(&mut nodes, &path);
    }

    pub fn add_symlink(&self, link: impl AsRef<Path>, target: impl Into<PathBuf>) {
        let link = self.normalize_path(link.as_ref());
        let mut nodes = self.write_nodes();
        if let Some(parent) = link.parent() {
            ensure_parents(&mut nodes, parent);
        }
        nodes.insert(
            link,
            MemoryNode::Symlink {
                target: target.into(),
            },
        );
    }

    /// Simulate commands matching `matcher` with `effect`. Hooks are tried
    /// in registration order; unmatched commands succeed with no output.
    pub fn on_command<M, E>(&self, matcher: M, effect: E)
    where
        M: Fn(&CommandSpec) -> bool + Send + Sync + 'static,
        E: Fn(&CommandSpec, &MemoryExecutor) -> Result<String> + Send + Sync + 'static,
    {
        if let Ok(mut hooks) = self.hooks.write() {
            hooks.push((Box::new(matcher), Arc::new(effect)));
        }
    }

    /// Make commands matching `matcher` exit with `code`.
    pub fn fail_command<M>(&self, matcher: M, code: i32)
    where
        M: Fn(&CommandSpec) -> bool + Send + Sync + 'static,
    {
        self.on_command(matcher, move |cmd, _| {
            Err(BuildError::command_failed(cmd.display(), Some(code)))
        });
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions
            .lock()
            .map(|actions| actions.clone())
            .unwrap_or_default()
    }

    /// Commands run so far, in order.
    pub fn commands(&self) -> Vec<CommandSpec> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Run { command } => Some(command),
                _ => None,
            })
            .collect()
    }

    /// The node stored at `path`, without following a final symlink.
    pub fn node(&self, path: impl AsRef<Path>) -> Option<MemoryNode> {
        let path = self.normalize_path(path.as_ref());
        self.read_nodes().get(&path).cloned()
    }

    /// Every node strictly below `root`, keyed by path relative to it.
    pub fn tree(&self, root: impl AsRef<Path>) -> BTreeMap<PathBuf, MemoryNode> {
        let root = self.normalize_path(root.as_ref());
        self.read_nodes()
            .iter()
            .filter(|(path, _)| **path != root)
            .filter_map(|(path, node)| {
                path.strip_prefix(&root)
                    .ok()
                    .map(|rel| (rel.to_path_buf(), node.clone()))
            })
            .collect()
    }

    fn normalize_path(&self, path: &Path) -> PathBuf {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let mut out = PathBuf::new();
        for component in joined.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    out.pop();
                }
                other => out.push(other),
            }
        }
        out
    }

    fn read_nodes(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<PathBuf, MemoryNode>> {
        self.nodes.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_nodes(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<PathBuf, MemoryNode>> {
        self.nodes.write().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, action: Action) {
        action.log();
        if let Ok(mut actions) = self.actions.lock() {
            actions.push(action);
        }
    }

    /// Follow symlinks in every component of `path`.
    fn resolve(&self, path: &Path) -> PathBuf {
        let nodes = self.read_nodes();
        let mut current = self.normalize_path(path);
        for _ in 0..MAX_SYMLINK_DEPTH {
            let mut resolved = PathBuf::new();
            let mut changed = false;
            let mut components = current.components();
            for component in components.by_ref() {
                resolved.push(component);
                if let Some(MemoryNode::Symlink { target }) = nodes.get(&resolved) {
                    let base = resolved.parent().map(Path::to_path_buf).unwrap_or_default();
                    resolved = self.normalize_path(&base.join(target));
                    changed = true;
                    break;
                }
            }
            if !changed {
                return resolved;
            }
            current = resolved.join(components.as_path());
        }
        current
    }

    fn require_parent_dir(&self, path: &Path, op: &'static str) -> Result<PathBuf> {
        let path = self.normalize_path(path);
        let parent = path.parent().map(|p| self.resolve(p)).unwrap_or_default();
        match self.read_nodes().get(&parent) {
            Some(MemoryNode::Dir) => Ok(path),
            _ => Err(not_found(op, &path, "parent directory does not exist")),
        }
    }
}

impl Default for MemoryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(op: &'static str, path: &Path, message: &str) -> BuildError {
    BuildError::io(op, path, io::Error::new(io::ErrorKind::NotFound, message.to_string()))
}

fn ensure_parents(nodes: &mut BTreeMap<PathBuf, MemoryNode>, path: &Path) {
    let mut current = PathBuf::new();
    for component in path.components() {
        current.push(component);
        nodes.entry(current.clone()).or_insert(MemoryNode::Dir);
    }
}

fn subtree_keys(nodes: &BTreeMap<PathBuf, MemoryNode>, root: &Path) -> Vec<PathBuf> {
    nodes
        .keys()
        .filter(|k| k.starts_with(root))
        .cloned()
        .collect()
}

impl Executor for MemoryExecutor {
    fn exists(&self, path: &Path) -> bool {
        let path = self.normalize_path(path);
        let resolved = self.resolve(&path);
        let nodes = self.read_nodes();
        nodes.contains_key(&path) || nodes.contains_key(&resolved)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let resolved = self.resolve(path);
        matches!(self.read_nodes().get(&resolved), Some(MemoryNode::Dir))
    }

    fn is_file(&self, path: &Path) -> bool {
        let resolved = self.resolve(path);
        matches!(
            self.read_nodes().get(&resolved),
            Some(MemoryNode::File { .. })
        )
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let shown = self.normalize_path(path);
        let resolved = self.resolve(path);
        let nodes = self.read_nodes();

        if !matches!(nodes.get(&resolved), Some(MemoryNode::Dir)) {
            return Err(not_found("read directory", &shown, "directory not found"));
        }

        // BTreeMap order keeps the listing sorted by name.
        Ok(nodes
            .iter()
            .filter(|(p, _)| p.parent() == Some(resolved.as_path()))
            .filter_map(|(p, node)| {
                let name = p.file_name()?;
                Some(DirEntry {
                    path: shown.join(name),
                    name: name.to_os_string(),
                    file_type: node.file_type(),
                })
            })
            .collect())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let resolved = self.resolve(path);
        match self.read_nodes().get(&resolved) {
            Some(MemoryNode::File { contents, .. }) => Ok(contents.clone()),
            _ => Err(not_found("read", path, "file not found")),
        }
    }

    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let shown = self.normalize_path(root);
        let resolved = self.resolve(root);
        let nodes = self.read_nodes();

        if !matches!(nodes.get(&resolved), Some(MemoryNode::Dir)) {
            return Err(not_found("walk", &shown, "directory not found"));
        }

        Ok(nodes
            .iter()
            .filter(|(_, node)| matches!(node, MemoryNode::File { .. }))
            .filter_map(|(p, _)| p.strip_prefix(&resolved).ok().map(|rel| shown.join(rel)))
            .collect())
    }

    fn run(&self, command: &CommandSpec) -> Result<()> {
        self.record(Action::Run {
            command: command.clone(),
        });

        // Release the hooks lock before the effect runs; effects may register
        // hooks.
        let effect = {
            let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
            hooks
                .iter()
                .find(|(matcher, _)| matcher(command))
                .map(|(_, effect)| Arc::clone(effect))
        };
        let stdout = match effect {
            Some(effect) => effect(command, self)?,
            None => String::new(),
        };

        if let Some(out) = &command.stdout {
            let out = self.require_parent_dir(out, "create")?;
            self.write_nodes().insert(
                out,
                MemoryNode::File {
                    contents: stdout,
                    executable: false,
                },
            );
        }
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.record(Action::CreateDir {
            path: path.to_path_buf(),
        });
        let path = self.normalize_path(path);
        let mut nodes = self.write_nodes();
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            match nodes.get(&current) {
                Some(MemoryNode::File { .. }) => {
                    return Err(BuildError::io(
                        "create directory",
                        &current,
                        io::Error::new(io::ErrorKind::AlreadyExists, "a file is in the way"),
                    ));
                }
                Some(_) => {}
                None => {
                    nodes.insert(current.clone(), MemoryNode::Dir);
                }
            }
        }
        Ok(())
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> Result<()> {
        self.record(Action::CopyFile {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        });
        let resolved = self.resolve(src);
        let node = match self.read_nodes().get(&resolved) {
            Some(node @ MemoryNode::File { .. }) => node.clone(),
            _ => return Err(not_found("copy", src, "source file not found")),
        };
        let dst = self.require_parent_dir(dst, "copy")?;
        self.write_nodes().insert(dst, node);
        Ok(())
    }

    fn copy_dir(&self, src: &Path, dst: &Path, skip: &[PathBuf]) -> Result<()> {
        self.record(Action::CopyDir {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        });
        let resolved = self.resolve(src);
        if !self.is_dir(&resolved) {
            return Err(not_found("copytree", src, "source directory not found"));
        }
        let dst = self.require_parent_dir(dst, "copytree")?;
        // Merges into an existing directory, overwriting files.
        if self.exists(&dst) && !self.is_dir(&dst) {
            return Err(BuildError::io(
                "copytree",
                &dst,
                io::Error::new(io::ErrorKind::AlreadyExists, "a file is in the way"),
            ));
        }

        let mut nodes = self.write_nodes();
        let copied: Vec<(PathBuf, MemoryNode)> = nodes
            .iter()
            .filter_map(|(p, node)| {
                let rel = p.strip_prefix(&resolved).ok()?;
                if skip.iter().any(|s| rel.starts_with(s)) {
                    return None;
                }
                Some((dst.join(rel), node.clone()))
            })
            .collect();
        nodes.extend(copied);
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.record(Action::RemoveDir {
            path: path.to_path_buf(),
        });
        let path = self.normalize_path(path);
        let mut nodes = self.write_nodes();
        if !matches!(nodes.get(&path), Some(MemoryNode::Dir)) {
            return Err(not_found("remove directory", &path, "directory not found"));
        }
        for key in subtree_keys(&nodes, &path) {
            nodes.remove(&key);
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.record(Action::RemoveFile {
            path: path.to_path_buf(),
        });
        let path = self.normalize_path(path);
        let mut nodes = self.write_nodes();
        if matches!(nodes.get(&path), Some(MemoryNode::Dir) | None) {
            return Err(not_found("remove", &path, "file not found"));
        }
        nodes.remove(&path);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.record(Action::Rename {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
        let from = self.normalize_path(from);
        let to = self.require_parent_dir(to, "rename")?;
        let mut nodes = self.write_nodes();
        if !nodes.contains_key(&from) {
            return Err(not_found("rename", &from, "source not found"));
        }
        for key in subtree_keys(&nodes, &from) {
            if let Some(node) = nodes.remove(&key) {
                let rel = key.strip_prefix(&from).unwrap_or(Path::new(""));
                let dest = if rel.as_os_str().is_empty() {
                    to.clone()
                } else {
                    to.join(rel)
                };
                nodes.insert(dest, node);
            }
        }
        Ok(())
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        self.record(Action::Symlink {
            target: target.to_path_buf(),
            link: link.to_path_buf(),
        });
        let link = self.require_parent_dir(link, "symlink")?;
        let mut nodes = self.write_nodes();
        if nodes.contains_key(&link) {
            return Err(BuildError::io(
                "symlink",
                &link,
                io::Error::new(io::ErrorKind::AlreadyExists, "link exists"),
            ));
        }
        nodes.insert(
            link,
            MemoryNode::Symlink {
                target: target.to_path_buf(),
            },
        );
        Ok(())
    }

    fn write_file(&self, path: &Path, contents: &str, executable: bool) -> Result<()> {
        self.record(Action::WriteFile {
            path: path.to_path_buf(),
            executable,
        });
        let path = self.require_parent_dir(path, "write")?;
        self.write_nodes().insert(
            path,
            MemoryNode::File {
                contents: contents.to_string(),
                executable,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_file_creates_parents() {
        let exec = MemoryExecutor::new();
        exec.add_file("/src/external/clang/NOTICE", "clang notice");

        assert!(exec.is_dir(Path::new("/src/external/clang")));
        assert!(exec.is_file(Path::new("/src/external/clang/NOTICE")));
        assert_eq!(
            exec.read_to_string(Path::new("/src/external/clang/NOTICE"))
                .unwrap(),
            "clang notice"
        );
    }

    #[test]
    fn test_relative_paths_use_root() {
        let exec = MemoryExecutor::with_root(PathBuf::from("/work"));
        exec.add_file("out/a.txt", "a");
        assert!(exec.exists(Path::new("/work/out/a.txt")));
    }

    #[test]
    fn test_copy_requires_parent() {
        let exec = MemoryExecutor::new();
        exec.add_file("/o/bin/clang", "elf");

        let err = exec
            .copy_file(Path::new("/o/bin/clang"), Path::new("/i/bin/clang"))
            .unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));

        exec.create_dir_all(Path::new("/i/bin")).unwrap();
        exec.copy_file(Path::new("/o/bin/clang"), Path::new("/i/bin/clang"))
            .unwrap();
        assert!(exec.is_file(Path::new("/i/bin/clang")));
    }

    #[test]
    fn test_symlink_resolution_through_directories() {
        let exec = MemoryExecutor::new();
        exec.add_file("/i/lib64/clang/5.0/include/stdatomic.h", "atomic");
        exec.symlink(Path::new("5.0"), Path::new("/i/lib64/clang/5.0.300080"))
            .unwrap();

        assert!(exec.is_dir(Path::new("/i/lib64/clang/5.0.300080")));
        assert!(exec.is_file(Path::new("/i/lib64/clang/5.0.300080/include/stdatomic.h")));
        assert_eq!(
            exec.node("/i/lib64/clang/5.0.300080"),
            Some(MemoryNode::Symlink {
                target: PathBuf::from("5.0")
            })
        );
    }

    #[test]
    fn test_dangling_symlink_exists_but_is_not_file() {
        let exec = MemoryExecutor::new();
        exec.add_dir("/i/bin");
        exec.symlink(Path::new("clang.real"), Path::new("/i/bin/clang++.real"))
            .unwrap();
        assert!(exec.exists(Path::new("/i/bin/clang++.real")));
        assert!(!exec.is_file(Path::new("/i/bin/clang++.real")));
    }

    #[test]
    fn test_copy_dir_with_skip() {
        let exec = MemoryExecutor::new();
        exec.add_file("/src/llvm/include/llvm/IR/Module.h", "m");
        exec.add_file("/src/llvm/include/llvm/Config/config.h", "c");
        exec.add_dir("/dst");

        exec.copy_dir(
            Path::new("/src/llvm/include"),
            Path::new("/dst/include"),
            &[PathBuf::from("llvm/Config")],
        )
        .unwrap();

        assert!(exec.is_file(Path::new("/dst/include/llvm/IR/Module.h")));
        assert!(!exec.exists(Path::new("/dst/include/llvm/Config")));
    }

    #[test]
    fn test_copy_dir_merges_into_existing() {
        let exec = MemoryExecutor::new();
        exec.add_file("/src/include/a.h", "new a");
        exec.add_file("/src/include/sub/b.h", "b");
        exec.add_file("/dst/include/a.h", "old a");
        exec.add_file("/dst/include/kept.h", "kept");

        exec.copy_dir(Path::new("/src/include"), Path::new("/dst/include"), &[])
            .unwrap();

        assert_eq!(
            exec.read_to_string(Path::new("/dst/include/a.h")).unwrap(),
            "new a"
        );
        assert!(exec.is_file(Path::new("/dst/include/sub/b.h")));
        assert!(exec.is_file(Path::new("/dst/include/kept.h")));
    }

    #[test]
    fn test_copy_dir_onto_file_fails() {
        let exec = MemoryExecutor::new();
        exec.add_file("/src/include/a.h", "a");
        exec.add_file("/dst/include", "not a directory");

        assert!(exec
            .copy_dir(Path::new("/src/include"), Path::new("/dst/include"), &[])
            .is_err());
    }

    #[test]
    fn test_rename_moves_subtree() {
        let exec = MemoryExecutor::new();
        exec.add_file("/a/dir/file", "x");
        exec.rename(Path::new("/a/dir"), Path::new("/a/moved")).unwrap();
        assert!(!exec.exists(Path::new("/a/dir")));
        assert!(exec.is_file(Path::new("/a/moved/file")));
    }

    #[test]
    fn test_remove_dir_all() {
        let exec = MemoryExecutor::new();
        exec.add_file("/out/install/linux-x86/clang-dev/bin/clang", "x");
        exec.remove_dir_all(Path::new("/out/install/linux-x86"))
            .unwrap();
        assert!(!exec.exists(Path::new("/out/install/linux-x86/clang-dev")));
        assert!(exec.is_dir(Path::new("/out/install")));
    }

    #[test]
    fn test_command_hooks_and_stdout() {
        let exec = MemoryExecutor::new();
        exec.add_dir("/i");
        exec.on_command(
            |cmd| cmd.program == "repo",
            |_, _| Ok("platform/external/llvm 1234\n".to_string()),
        );

        exec.run(&CommandSpec::new("repo").arg("forall").stdout_to("/i/repo.prop"))
            .unwrap();

        assert_eq!(
            exec.read_to_string(Path::new("/i/repo.prop")).unwrap(),
            "platform/external/llvm 1234\n"
        );
        assert_eq!(exec.commands().len(), 1);
    }

    #[test]
    fn test_effect_can_register_hooks() {
        let exec = MemoryExecutor::new();
        exec.add_dir("/i");
        exec.on_command(
            |cmd| cmd.program == "configure",
            |_, exec| {
                exec.on_command(|cmd| cmd.program == "make", |_, _| Ok("built\n".to_string()));
                Ok(String::new())
            },
        );

        exec.run(&CommandSpec::new("configure")).unwrap();
        exec.run(&CommandSpec::new("make").stdout_to("/i/log")).unwrap();

        assert_eq!(exec.read_to_string(Path::new("/i/log")).unwrap(), "built\n");
    }

    #[test]
    fn test_failing_command() {
        let exec = MemoryExecutor::new();
        exec.fail_command(|cmd| cmd.program == "make", 2);

        let err = exec.run(&CommandSpec::new("make").arg("-j4")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(exec.run(&CommandSpec::new("strip")).is_ok());
    }

    #[test]
    fn test_read_dir_sorted() {
        let exec = MemoryExecutor::new();
        exec.add_file("/p/b.profraw", "");
        exec.add_file("/p/a.profraw", "");
        exec.add_dir("/p/sub");

        let names: Vec<String> = exec
            .read_dir(Path::new("/p"))
            .unwrap()
            .into_iter()
            .map(|e| e.name.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.profraw", "b.profraw", "sub"]);
    }

    #[test]
    fn test_tree_is_relative() {
        let exec = MemoryExecutor::new();
        exec.add_file("/i/clang-dev/NOTICE", "n");
        let tree = exec.tree("/i");
        assert!(tree.contains_key(Path::new("clang-dev")));
        assert!(tree.contains_key(Path::new("clang-dev/NOTICE")));
    }
}
