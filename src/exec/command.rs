//! External command description and the recorded action log

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// An external command to run synchronously. The ambient process
/// environment is always inherited; `env` holds only the overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    /// Redirect stdout into this file.
    pub stdout: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            stdout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    /// Program plus arguments, space separated.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether any argument equals `arg`.
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

/// One side effect, as performed (or, in dry-run mode, as it would have
/// been performed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Run { command: CommandSpec },
    CreateDir { path: PathBuf },
    CopyFile { src: PathBuf, dst: PathBuf },
    CopyDir { src: PathBuf, dst: PathBuf },
    RemoveDir { path: PathBuf },
    RemoveFile { path: PathBuf },
    Rename { from: PathBuf, to: PathBuf },
    Symlink { target: PathBuf, link: PathBuf },
    WriteFile { path: PathBuf, executable: bool },
}

impl Action {
    /// Emit the action at info level, the way every executor reports it.
    pub fn log(&self) {
        match self {
            Action::Run { command } => {
                tracing::info!("check_call: {}", command.display());
                if !command.env.is_empty() {
                    tracing::debug!(env = ?command.env, "check_call additional env");
                }
            }
            Action::CreateDir { path } => tracing::info!("makedirs {}", path.display()),
            Action::CopyFile { src, dst } => {
                tracing::info!("copy {} {}", src.display(), dst.display())
            }
            Action::CopyDir { src, dst } => {
                tracing::info!("copytree {} {}", src.display(), dst.display())
            }
            Action::RemoveDir { path } => tracing::info!("rmtree {}", path.display()),
            Action::RemoveFile { path } => tracing::info!("remove {}", path.display()),
            Action::Rename { from, to } => {
                tracing::info!("rename {} {}", from.display(), to.display())
            }
            Action::Symlink { target, link } => {
                tracing::info!("symlink {} {}", target.display(), link.display())
            }
            Action::WriteFile { path, .. } => tracing::info!("write {}", path.display()),
        }
    }

    /// The command of a `Run` action.
    pub fn command(&self) -> Option<&CommandSpec> {
        match self {
            Action::Run { command } => Some(command),
            _ => None,
        }
    }

    /// The path this action creates or changes, if any.
    pub fn target(&self) -> Option<&Path> {
        match self {
            Action::Run { command } => command.stdout.as_deref(),
            Action::CreateDir { path }
            | Action::RemoveDir { path }
            | Action::RemoveFile { path }
            | Action::WriteFile { path, .. } => Some(path),
            Action::CopyFile { dst, .. } | Action::CopyDir { dst, .. } => Some(dst),
            Action::Rename { to, .. } => Some(to),
            Action::Symlink { link, .. } => Some(link),
        }
    }
}
