//! Assembling build outputs into an install tree

pub mod components;
pub mod layout;
pub mod manifest;

pub use components::{ManifestBuilder, ToolchainFlavor};
pub use layout::{BuildTree, InstallLayout};
pub use manifest::{ArtifactKind, InstallManifest, InstallManifestEntry, Source, Transform};

use crate::config::ToolchainConfig;
use crate::error::Result;
use crate::exec::{check_artifact, CommandSpec, Executor};
use crate::host::HostPlatform;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct InstallationAssembler<'a> {
    exec: &'a dyn Executor,
    config: &'a ToolchainConfig,
}

impl<'a> InstallationAssembler<'a> {
    pub fn new(exec: &'a dyn Executor, config: &'a ToolchainConfig) -> Self {
        Self { exec, config }
    }

    /// Lay out `flavor` for `host` from `build_dir` into
    /// `install_host_dir/<package_name>`. Returns the install root.
    pub fn install_toolchain(
        &self,
        build_dir: &Path,
        install_host_dir: &Path,
        package_name: &str,
        host: HostPlatform,
        strip: bool,
        flavor: ToolchainFlavor,
    ) -> Result<PathBuf> {
        let manifest =
            ManifestBuilder::new(self.exec, self.config, build_dir, host, strip).build(flavor)?;
        self.install(&manifest, install_host_dir, package_name)
    }

    /// Every source the manifest reads from must exist.
    pub fn validate(&self, manifest: &InstallManifest) -> Result<()> {
        for path in manifest.source_paths() {
            check_artifact(self.exec, "install source", path)?;
        }
        Ok(())
    }

    /// Validate, clear `install_host_dir`, then execute the manifest in
    /// order under `install_host_dir/<package_name>`. Nothing is touched if
    /// validation fails.
    pub fn install(
        &self,
        manifest: &InstallManifest,
        install_host_dir: &Path,
        package_name: &str,
    ) -> Result<PathBuf> {
        self.validate(manifest)?;

        let root = install_host_dir.join(package_name);
        info!(
            "Installing {} entries into {}",
            manifest.len(),
            root.display()
        );

        self.exec.reset_dir(install_host_dir)?;
        self.exec.create_dir_all(&root)?;

        let mut created = BTreeSet::new();
        created.insert(root.clone());
        for entry in manifest.entries() {
            self.apply(entry, &root, &mut created)?;
        }
        Ok(root)
    }

    fn apply(
        &self,
        entry: &InstallManifestEntry,
        root: &Path,
        created: &mut BTreeSet<PathBuf>,
    ) -> Result<()> {
        let dest = root.join(&entry.dest);

        match &entry.transform {
            Transform::SymlinkTo(target) => {
                self.ensure_parent(&dest, created)?;
                if self.exec.exists(&dest) {
                    self.exec.remove_file(&dest)?;
                }
                return self.exec.symlink(target, &dest);
            }
            Transform::RenameWithWrapper(wrapper) => {
                self.exec.rename(&dest, &with_suffix(&dest, ".real"))?;
                return self.exec.copy_file(wrapper, &dest);
            }
            Transform::None | Transform::Strip => {}
        }

        self.ensure_parent(&dest, created)?;
        match &entry.source {
            Source::File(src) => self.exec.copy_file(src, &dest)?,
            Source::Dir { path, skip } => {
                self.exec.copy_dir(path, &dest, skip)?;
                created.insert(dest.clone());
            }
            Source::Generated {
                contents,
                executable,
            } => self.exec.write_file(&dest, contents, *executable)?,
            Source::CommandOutput(command) => {
                self.exec.run(&command.clone().stdout_to(&dest))?
            }
            Source::None => {}
        }

        if entry.transform == Transform::Strip {
            let strip = CommandSpec::new(&self.config.strip_tool).arg(dest.display().to_string());
            self.exec.run(&strip)?;
        }
        Ok(())
    }

    fn ensure_parent(&self, dest: &Path, created: &mut BTreeSet<PathBuf>) -> Result<()> {
        let Some(parent) = dest.parent() else {
            return Ok(());
        };
        if created.contains(parent) {
            return Ok(());
        }
        if !self.exec.is_dir(parent) {
            self.exec.create_dir_all(parent)?;
        }
        created.insert(parent.to_path_buf());
        Ok(())
    }
}

/// `bin/clang` -> `bin/clang.real`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
