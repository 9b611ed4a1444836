//! Archiving an install tree into a per-host tarball

use crate::error::Result;
use crate::exec::{check_artifact, CommandSpec, Executor};
use crate::host::HostPlatform;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// GNU tar options that make the archive independent of file order,
/// timestamps and ownership on the build machine.
const REPRODUCIBLE_TAR_FLAGS: [&str; 5] = [
    "--sort=name",
    "--mtime=@0",
    "--owner=0",
    "--group=0",
    "--numeric-owner",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageArtifact {
    pub package_name: String,
    pub host: HostPlatform,
    pub tarball_path: PathBuf,
    pub version: String,
}

/// `<package_name>-<host tag>.tar.bz2`
pub fn tarball_name(package_name: &str, host: HostPlatform) -> String {
    format!("{}-{}.tar.bz2", package_name, host.tag())
}

pub struct PackageEmitter<'a> {
    exec: &'a dyn Executor,
    reproducible: bool,
}

impl<'a> PackageEmitter<'a> {
    /// Reproducible archives need GNU tar, so they are only requested when
    /// running on Linux.
    pub fn new(exec: &'a dyn Executor) -> Self {
        Self {
            exec,
            reproducible: cfg!(target_os = "linux"),
        }
    }

    pub fn with_reproducible(mut self, reproducible: bool) -> Self {
        self.reproducible = reproducible;
        self
    }

    /// The archive's only top-level entry is `package_name`.
    pub fn archive_command(
        &self,
        install_host_dir: &Path,
        package_name: &str,
        tarball: &Path,
    ) -> CommandSpec {
        let mut command = CommandSpec::new("tar");
        if self.reproducible {
            command = command.args(REPRODUCIBLE_TAR_FLAGS);
        }
        command
            .arg("-cjC")
            .arg(install_host_dir.display().to_string())
            .arg("-f")
            .arg(tarball.display().to_string())
            .arg(package_name)
    }

    /// Archive `install_host_dir/<package_name>` into `dist_dir`. The install
    /// tree itself is left untouched.
    pub fn emit(
        &self,
        install_host_dir: &Path,
        package_name: &str,
        host: HostPlatform,
        version: &str,
        dist_dir: &Path,
    ) -> Result<PackageArtifact> {
        check_artifact(
            self.exec,
            "install tree",
            &install_host_dir.join(package_name),
        )?;
        if !self.exec.is_dir(dist_dir) {
            self.exec.create_dir_all(dist_dir)?;
        }

        let tarball_path = dist_dir.join(tarball_name(package_name, host));
        info!("Packaging {}", tarball_path.display());
        self.exec
            .run(&self.archive_command(install_host_dir, package_name, &tarball_path))?;

        Ok(PackageArtifact {
            package_name: package_name.to_string(),
            host,
            tarball_path,
            version: version.to_string(),
        })
    }
}
