//! Build environment for one (stage, product) pair

use super::config::{BuildStageConfig, ProfileTask};
use crate::config::ToolchainVersion;
use crate::error::{BuildError, Result};
use crate::exec::{CommandSpec, Executor};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

pub const TARGET_MINIMAL: &str = "clang-toolchain-minimal";
pub const TARGET_FULL: &str = "clang-toolchain-full";
pub const TARGET_LLVM_TOOLS: &str = "llvm-tools";
pub const TARGET_PROFILE: &str = "clang-profile-targets";

/// `%9m` lets every instrumented binary merge into its own pool of raw
/// profile files instead of overwriting one.
pub const PROFILE_FILE_PATTERN: &str = "clang-%9m.profraw";

/// Everything needed to invoke the build tool for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInvocation {
    pub product: String,
    /// Overlaid on the ambient process environment.
    pub env: BTreeMap<String, String>,
    /// `NAME=value` variables passed on the build tool command line.
    pub overrides: Vec<String>,
    pub jobs: usize,
    pub targets: Vec<String>,
}

impl StageInvocation {
    pub fn command(&self, build_tool: &str, source_root: &Path) -> CommandSpec {
        CommandSpec::new(build_tool)
            .arg(format!("-j{}", self.jobs))
            .args(self.overrides.iter().cloned())
            .args(self.targets.iter().cloned())
            .current_dir(source_root)
            .envs(&self.env)
    }
}

/// Use at least one and at most every available CPU.
pub fn clamp_jobs(requested: usize, available_cpus: usize) -> usize {
    requested.min(available_cpus).max(1)
}

/// Derive the invocation for `product`. Pure: the same inputs always give
/// the same invocation.
pub fn derive_invocation(
    config: &BuildStageConfig,
    product: &str,
    available_cpus: usize,
    version: &ToolchainVersion,
) -> Result<StageInvocation> {
    let mut env = BTreeMap::new();
    let mut set = |k: &str, v: String| {
        env.insert(k.to_string(), v);
    };
    set("DISABLE_LLVM_DEVICE_BUILDS", "true".into());
    set("DISABLE_RELOCATION_PACKER", "true".into());
    set("FORCE_BUILD_LLVM_COMPONENTS", "true".into());
    set("FORCE_BUILD_SANITIZER_SHARED_OBJECTS", "true".into());
    set("OUT_DIR", config.out_dir.display().to_string());
    set("SKIP_LLVM_TESTS", "true".into());
    set("SOONG_ALLOW_MISSING_DEPENDENCIES", "true".into());
    set("DISABLE_HOST_PIE", "true".into());
    set("TARGET_BUILD_VARIANT", "userdebug".into());
    set("TARGET_PRODUCT", product.to_string());

    if config.debug_clang {
        set("FORCE_BUILD_LLVM_DEBUG", "true".into());
        set("FORCE_BUILD_LLVM_DISABLE_NDEBUG", "true".into());
    }

    let mut overrides = Vec::new();
    if let Some(path) = &config.prebuilts_path {
        overrides.push(format!("LLVM_PREBUILTS_BASE={}", path.display()));
    }
    if let Some(version) = &config.prebuilts_version {
        overrides.push(format!("LLVM_PREBUILTS_VERSION={}", version));
    }
    if config.use_updated_version {
        overrides.push(format!("LLVM_RELEASE_VERSION={}", version.short()));
    }

    let mut targets = vec![TARGET_MINIMAL.to_string()];
    if config.build_all_clang_tools {
        targets.push(TARGET_FULL.to_string());
    }
    if config.build_all_llvm_tools {
        targets.push(TARGET_LLVM_TOOLS.to_string());
    }

    match &config.profile_task {
        ProfileTask::None => {}
        ProfileTask::Instrument => {
            overrides.push("FORCE_BUILD_LLVM_PROFILE_GENERATE=true".to_string());
        }
        ProfileTask::Generate => {
            let pattern = config.profiles_dir().join(PROFILE_FILE_PATTERN);
            env.insert("LLVM_PROFILE_FILE".to_string(), pattern.display().to_string());
            targets = vec![TARGET_PROFILE.to_string()];
        }
        ProfileTask::Use(path) => {
            if path.as_os_str().is_empty() {
                return Err(BuildError::InvalidProfileTask("use=".to_string()));
            }
            overrides.push(format!("FORCE_BUILD_LLVM_PROFILE_USE={}", path.display()));
        }
    }

    Ok(StageInvocation {
        product: product.to_string(),
        env,
        overrides,
        jobs: clamp_jobs(config.max_jobs, available_cpus),
        targets,
    })
}

/// Filesystem preparation a stage needs before its first invocation.
///
/// A `Generate` stage must start from an empty output directory: the build
/// system cannot tell that the compiler producing the profiles changed, so
/// anything left over would be reused and stale profiles would be merged.
pub fn prepare_stage(exec: &dyn Executor, config: &BuildStageConfig) -> Result<()> {
    if config.profile_task != ProfileTask::Generate {
        return Ok(());
    }
    if exec.exists(&config.out_dir) {
        debug!("Clearing {} before profile generation", config.out_dir.display());
        exec.remove_dir_all(&config.out_dir)?;
    }
    exec.create_dir_all(&config.profiles_dir())
}
