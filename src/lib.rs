//! clang-build - staged, profile-guided clang toolchain builds
//!
//! The pipeline builds clang for every Android target product in up to two
//! stages, optionally trains a PGO profile on an instrumented compiler, and
//! turns the final stage's output into one installed and archived toolchain
//! per host platform.
//!
//! # Core Concepts
//!
//! - **Stage**: one build of all target products into its own output
//!   directory, configured by a [`BuildStageConfig`]
//! - **Executor**: every process and filesystem side effect goes through an
//!   [`Executor`], which can be real, a dry run, or in memory
//! - **Install manifest**: the typed list of copy, strip, wrap and link
//!   operations that lays out one host's toolchain
//!
//! # Example Usage
//!
//! ```no_run
//! use clang_build::{BuildPipeline, PipelineOptions, RealExecutor, ToolchainConfig};
//!
//! let config = ToolchainConfig::from_env().with_source_root("/work/llvm");
//! let options = PipelineOptions::new()
//!     .with_build_name("r300080")
//!     .with_multi_stage(true)
//!     .with_pgo_clang(true);
//!
//! let exec = RealExecutor::new();
//! let report = BuildPipeline::new(&exec, &config, &options).run()?;
//! for package in &report.packages {
//!     println!("{}", package.tarball_path.display());
//! }
//! # Ok::<(), clang_build::BuildError>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod host;
pub mod install;
pub mod package;
pub mod pipeline;
pub mod profile;
pub mod progress;
pub mod stage;
pub mod util;

pub use config::{PipelineOptions, ToolchainConfig, ToolchainVersion};
pub use error::{BuildError, Result};
pub use exec::{Action, CommandSpec, DryRunExecutor, Executor, MemoryExecutor, RealExecutor};
pub use host::HostPlatform;
pub use install::{InstallManifest, InstallationAssembler, ToolchainFlavor};
pub use package::{PackageArtifact, PackageEmitter};
pub use pipeline::{BuildPipeline, PipelineReport, PipelineState};
pub use profile::{ProfileArtifact, ProfileMerger};
pub use progress::{LoggingHandler, NoOpHandler, ProgressEvent, ProgressHandler};
pub use stage::{BuildStageConfig, ProfileTask, StageInvocation, TargetProduct};
pub use util::{init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "clang-build");
    }
}
