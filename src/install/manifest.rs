//! Typed description of an install tree, built before anything is copied

use crate::exec::CommandSpec;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArtifactKind {
    Binary,
    SharedLib,
    HeaderSet,
    RuntimeLib,
    Script,
    License,
    Provenance,
}

/// Where an entry's contents come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Source {
    File(PathBuf),
    /// A directory tree, leaving out `skip` (paths relative to the
    /// directory).
    Dir { path: PathBuf, skip: Vec<PathBuf> },
    Generated { contents: String, executable: bool },
    /// The captured stdout of a command.
    CommandOutput(CommandSpec),
    /// Nothing is copied; the transform alone produces the entry.
    None,
}

impl Source {
    /// The on-disk path that must exist before installing, if any.
    pub fn required_path(&self) -> Option<&Path> {
        match self {
            Source::File(path) | Source::Dir { path, .. } => Some(path),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Transform {
    None,
    /// Strip the installed file.
    Strip,
    /// Move the installed file to `<dest>.real` and put this wrapper at
    /// `dest`.
    RenameWithWrapper(PathBuf),
    /// Replace `dest` with a symlink to the given target.
    SymlinkTo(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallManifestEntry {
    pub artifact: ArtifactKind,
    pub source: Source,
    /// Relative to the install root.
    pub dest: PathBuf,
    pub transform: Transform,
}

impl InstallManifestEntry {
    pub fn file(artifact: ArtifactKind, src: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            artifact,
            source: Source::File(src.into()),
            dest: dest.into(),
            transform: Transform::None,
        }
    }

    pub fn dir(artifact: ArtifactKind, src: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            artifact,
            source: Source::Dir {
                path: src.into(),
                skip: Vec::new(),
            },
            dest: dest.into(),
            transform: Transform::None,
        }
    }

    pub fn generated(
        artifact: ArtifactKind,
        contents: impl Into<String>,
        executable: bool,
        dest: impl Into<PathBuf>,
    ) -> Self {
        Self {
            artifact,
            source: Source::Generated {
                contents: contents.into(),
                executable,
            },
            dest: dest.into(),
            transform: Transform::None,
        }
    }

    pub fn command_output(artifact: ArtifactKind, command: CommandSpec, dest: impl Into<PathBuf>) -> Self {
        Self {
            artifact,
            source: Source::CommandOutput(command),
            dest: dest.into(),
            transform: Transform::None,
        }
    }

    pub fn symlink(artifact: ArtifactKind, dest: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            artifact,
            source: Source::None,
            dest: dest.into(),
            transform: Transform::SymlinkTo(target.into()),
        }
    }

    pub fn wrap(dest: impl Into<PathBuf>, wrapper: impl Into<PathBuf>) -> Self {
        Self {
            artifact: ArtifactKind::Script,
            source: Source::None,
            dest: dest.into(),
            transform: Transform::RenameWithWrapper(wrapper.into()),
        }
    }

    pub fn skipping<I, P>(mut self, skip: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        if let Source::Dir { skip: ref mut s, .. } = self.source {
            s.extend(skip.into_iter().map(Into::into));
        }
        self
    }

    pub fn stripped(mut self, strip: bool) -> Self {
        if strip {
            self.transform = Transform::Strip;
        }
        self
    }
}

/// Ordered entries; executing them in order yields the install tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallManifest {
    entries: Vec<InstallManifestEntry>,
}

impl InstallManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: InstallManifestEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = InstallManifestEntry>) {
        self.entries.extend(entries);
    }

    pub fn entries(&self) -> &[InstallManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dests(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|e| e.dest.as_path())
    }

    /// Every source path the manifest reads from.
    pub fn source_paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().flat_map(|e| {
            let wrapper = match &e.transform {
                Transform::RenameWithWrapper(w) => Some(w.as_path()),
                _ => None,
            };
            e.source.required_path().into_iter().chain(wrapper)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipping_only_applies_to_dirs() {
        let dir = InstallManifestEntry::dir(ArtifactKind::HeaderSet, "/src/inc", "include")
            .skipping(["CMakeLists.txt"]);
        assert_eq!(
            dir.source,
            Source::Dir {
                path: PathBuf::from("/src/inc"),
                skip: vec![PathBuf::from("CMakeLists.txt")],
            }
        );

        let file = InstallManifestEntry::file(ArtifactKind::License, "/src/NOTICE", "NOTICE")
            .skipping(["x"]);
        assert_eq!(file.source, Source::File(PathBuf::from("/src/NOTICE")));
    }

    #[test]
    fn test_stripped() {
        let entry = InstallManifestEntry::file(ArtifactKind::Binary, "/b/clang", "bin/clang");
        assert_eq!(entry.clone().stripped(false).transform, Transform::None);
        assert_eq!(entry.stripped(true).transform, Transform::Strip);
    }

    #[test]
    fn test_source_paths_include_wrapper() {
        let mut manifest = InstallManifest::new();
        manifest.push(InstallManifestEntry::file(
            ArtifactKind::Binary,
            "/b/clang",
            "bin/clang",
        ));
        manifest.push(InstallManifestEntry::wrap(
            "bin/clang",
            "/src/external/clang/compiler_wrapper",
        ));
        manifest.push(InstallManifestEntry::symlink(
            ArtifactKind::HeaderSet,
            "lib64/clang/5.0.300080",
            "5.0",
        ));

        let sources: Vec<&Path> = manifest.source_paths().collect();
        assert_eq!(
            sources,
            vec![
                Path::new("/b/clang"),
                Path::new("/src/external/clang/compiler_wrapper")
            ]
        );
        assert_eq!(manifest.len(), 3);
    }
}
