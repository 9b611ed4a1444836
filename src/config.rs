//! Run configuration: defaults, an optional TOML file, environment, then CLI

use crate::error::{BuildError, Result};
use crate::host::HostPlatform;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_OUT_DIR: &str = "out";
const DEFAULT_BUILD_TOOL: &str = "make";
const DEFAULT_STRIP_TOOL: &str = "strip";
const DEFAULT_BUILD_NAME: &str = "dev";

const DEFAULT_VERSION_MAJOR: &str = "5";
const DEFAULT_VERSION_MINOR: &str = "0";
const DEFAULT_VERSION_PATCH: &str = "300080";

/// Version of the clang being built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolchainVersion {
    pub major: String,
    pub minor: String,
    pub patch: String,
}

impl Default for ToolchainVersion {
    fn default() -> Self {
        Self {
            major: DEFAULT_VERSION_MAJOR.to_string(),
            minor: DEFAULT_VERSION_MINOR.to_string(),
            patch: DEFAULT_VERSION_PATCH.to_string(),
        }
    }
}

impl ToolchainVersion {
    pub fn new(major: &str, minor: &str, patch: &str) -> Self {
        Self {
            major: major.to_string(),
            minor: minor.to_string(),
            patch: patch.to_string(),
        }
    }

    /// `major.minor`, the name of the resource directory.
    pub fn short(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }

    /// `major.minor.patch`
    pub fn long(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Shape of the optional `--config` file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    source_root: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    dist_dir: Option<PathBuf>,
    build_tool: Option<String>,
    strip_tool: Option<String>,
    version: Option<ToolchainVersion>,
}

/// Where things live and which tools to call. Fixed for the whole run.
#[derive(Debug, Clone)]
pub struct ToolchainConfig {
    /// Root of the source tree; sub-builds run here.
    pub source_root: PathBuf,
    /// Base of every stage output directory (`OUT_DIR`).
    pub out_dir: PathBuf,
    /// Destination for packages and an optional pre-made `repo.prop`
    /// (`DIST_DIR`).
    pub dist_dir: Option<PathBuf>,
    pub build_tool: String,
    pub strip_tool: String,
    pub version: ToolchainVersion,
    pub available_cpus: usize,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("."),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            dist_dir: None,
            build_tool: DEFAULT_BUILD_TOOL.to_string(),
            strip_tool: DEFAULT_STRIP_TOOL.to_string(),
            version: ToolchainVersion::default(),
            available_cpus: available_cpus(),
        }
    }
}

impl ToolchainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, overlaid with `OUT_DIR` and `DIST_DIR` from the environment.
    pub fn from_env() -> Self {
        Self::default().with_env_vars(&env::vars().collect())
    }

    /// Overlay `OUT_DIR`/`DIST_DIR` taken from `vars`. Empty values are
    /// ignored.
    pub fn with_env_vars(mut self, vars: &BTreeMap<String, String>) -> Self {
        if let Some(out_dir) = vars.get("OUT_DIR").filter(|v| !v.is_empty()) {
            self.out_dir = PathBuf::from(out_dir);
        }
        if let Some(dist_dir) = vars.get("DIST_DIR").filter(|v| !v.is_empty()) {
            self.dist_dir = Some(PathBuf::from(dist_dir));
        }
        self
    }

    /// Overlay the keys present in a TOML config file.
    pub fn with_file(self, path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| BuildError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        self.with_toml(&contents)
            .map_err(|e| BuildError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn with_toml(mut self, contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| BuildError::Config(e.to_string()))?;

        if let Some(source_root) = file.source_root {
            self.source_root = source_root;
        }
        if let Some(out_dir) = file.out_dir {
            self.out_dir = out_dir;
        }
        if let Some(dist_dir) = file.dist_dir {
            self.dist_dir = Some(dist_dir);
        }
        if let Some(build_tool) = file.build_tool {
            self.build_tool = build_tool;
        }
        if let Some(strip_tool) = file.strip_tool {
            self.strip_tool = strip_tool;
        }
        if let Some(version) = file.version {
            self.version = version;
        }
        Ok(self)
    }

    pub fn with_source_root(mut self, source_root: impl Into<PathBuf>) -> Self {
        self.source_root = source_root.into();
        self
    }

    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = out_dir.into();
        self
    }

    pub fn with_dist_dir(mut self, dist_dir: Option<PathBuf>) -> Self {
        self.dist_dir = dist_dir;
        self
    }

    pub fn with_version(mut self, version: ToolchainVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_available_cpus(mut self, cpus: usize) -> Self {
        self.available_cpus = cpus.max(1);
        self
    }

    /// A path inside the source tree.
    pub fn source_path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.source_root.join(rel)
    }

    /// A path under `OUT_DIR`. A relative `OUT_DIR` is taken relative to
    /// the source root, where the build tool runs.
    pub fn build_path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.out_root().join(rel)
    }

    pub fn out_root(&self) -> PathBuf {
        if self.out_dir.is_absolute() {
            self.out_dir.clone()
        } else {
            self.source_root.join(&self.out_dir)
        }
    }
}

fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Per-run switches chosen by the operator.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub build_name: String,
    pub jobs: usize,
    pub multi_stage: bool,
    pub skip_stage1_install: bool,
    pub build_all_llvm_tools: bool,
    pub debug_clang: bool,
    pub pgo_clang: bool,
    /// A merged profile supplied by the operator for stage2.
    pub pgo_profile: Option<PathBuf>,
    /// Hosts to install and package, primary host first.
    pub hosts: Vec<HostPlatform>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            build_name: DEFAULT_BUILD_NAME.to_string(),
            jobs: available_cpus(),
            multi_stage: false,
            skip_stage1_install: false,
            build_all_llvm_tools: true,
            debug_clang: false,
            pgo_clang: false,
            pgo_profile: None,
            hosts: vec![HostPlatform::Linux],
        }
    }
}

impl PipelineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_build_name(mut self, name: impl Into<String>) -> Self {
        self.build_name = name.into();
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_multi_stage(mut self, multi_stage: bool) -> Self {
        self.multi_stage = multi_stage;
        self
    }

    pub fn with_skip_stage1_install(mut self, skip: bool) -> Self {
        self.skip_stage1_install = skip;
        self
    }

    pub fn with_build_all_llvm_tools(mut self, build_all: bool) -> Self {
        self.build_all_llvm_tools = build_all;
        self
    }

    pub fn with_debug_clang(mut self, debug: bool) -> Self {
        self.debug_clang = debug;
        self
    }

    pub fn with_pgo_clang(mut self, pgo: bool) -> Self {
        self.pgo_clang = pgo;
        self
    }

    pub fn with_pgo_profile(mut self, profile: Option<PathBuf>) -> Self {
        self.pgo_profile = profile;
        self
    }

    pub fn with_hosts(mut self, hosts: Vec<HostPlatform>) -> Self {
        self.hosts = hosts;
        self
    }

    /// `clang-<build_name>`, the top-level directory of every package.
    pub fn package_name(&self) -> String {
        format!("clang-{}", self.build_name)
    }
}
