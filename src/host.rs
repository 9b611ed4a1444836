//! Host platforms the toolchain binaries run on, and what differs between them

use crate::error::{BuildError, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum HostPlatform {
    Linux,
    Darwin,
    Windows,
}

impl HostPlatform {
    pub const ALL: [HostPlatform; 3] = [
        HostPlatform::Linux,
        HostPlatform::Darwin,
        HostPlatform::Windows,
    ];

    /// Directory name used for this host inside build and install trees.
    pub fn tag(self) -> &'static str {
        match self {
            HostPlatform::Linux => "linux-x86",
            HostPlatform::Darwin => "darwin-x86",
            HostPlatform::Windows => "windows-x86",
        }
    }

    /// OS component of the tag (`linux`, `darwin`, `windows`).
    pub fn os_name(self) -> &'static str {
        match self {
            HostPlatform::Linux => "linux",
            HostPlatform::Darwin => "darwin",
            HostPlatform::Windows => "windows",
        }
    }

    pub fn bin_ext(self) -> &'static str {
        match self {
            HostPlatform::Windows => ".exe",
            _ => "",
        }
    }

    pub fn lib_ext(self) -> &'static str {
        match self {
            HostPlatform::Linux => ".so",
            HostPlatform::Darwin => ".dylib",
            HostPlatform::Windows => ".dll",
        }
    }

    /// Whether an installed file at `rel_path` (relative to the install
    /// root) may be stripped. Darwin only strips executables.
    pub fn can_strip(self, rel_path: &Path) -> bool {
        match self {
            HostPlatform::Darwin => rel_path.starts_with("bin"),
            _ => true,
        }
    }

    /// Windows resolves `clang.exe` directly, so a script wrapper cannot
    /// stand in for it.
    pub fn supports_compiler_wrapper(self) -> bool {
        self != HostPlatform::Windows
    }

    /// Host-side sanitizer runtimes are only built on Linux.
    pub fn supports_sanitizers(self) -> bool {
        self == HostPlatform::Linux
    }

    pub fn supports_host_profile_rt(self) -> bool {
        self == HostPlatform::Linux
    }

    /// OpenMP and the per-target libFuzzer are not built on Darwin.
    pub fn supports_target_runtimes(self) -> bool {
        self != HostPlatform::Darwin
    }

    pub fn supports_host_fuzzer(self) -> bool {
        self != HostPlatform::Windows
    }

    /// libclang and libLLVM are not packaged for Windows, so neither are
    /// their development headers.
    pub fn supports_dev_headers(self) -> bool {
        self != HostPlatform::Windows
    }

    pub fn needs_winpthreads(self) -> bool {
        self == HostPlatform::Windows
    }

    /// Stage1 installs are consumed by the build machine itself, which is
    /// never Windows.
    pub fn installs_stage1(self) -> bool {
        self != HostPlatform::Windows
    }

    /// Hosts produced by a build machine running `os` (as reported by
    /// `std::env::consts::OS`). The first entry is the primary host.
    pub fn for_build_os(os: &str) -> Result<Vec<HostPlatform>> {
        match os {
            "linux" => Ok(vec![HostPlatform::Linux, HostPlatform::Windows]),
            "macos" => Ok(vec![HostPlatform::Darwin]),
            other => Err(BuildError::UnsupportedHost(other.to_string())),
        }
    }

    pub fn for_current_os() -> Result<Vec<HostPlatform>> {
        Self::for_build_os(std::env::consts::OS)
    }
}

impl FromStr for HostPlatform {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "linux" | "linux-x86" => Ok(HostPlatform::Linux),
            "darwin" | "darwin-x86" => Ok(HostPlatform::Darwin),
            "windows" | "windows-x86" => Ok(HostPlatform::Windows),
            _ => Err(BuildError::UnsupportedHost(s.to_string())),
        }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
