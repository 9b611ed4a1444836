//! Running one build stage across its target products

pub mod config;
pub mod env;
pub mod matrix;

pub use config::{BuildStageConfig, ProfileTask};
pub use env::{clamp_jobs, derive_invocation, prepare_stage, StageInvocation};
pub use matrix::{products, profiling_product, TargetArch, TargetProduct};

use crate::config::ToolchainConfig;
use crate::error::Result;
use crate::exec::Executor;
use crate::progress::{ProgressEvent, ProgressHandler};
use std::time::Instant;
use tracing::info;

pub struct StageRunner<'a> {
    exec: &'a dyn Executor,
    config: &'a ToolchainConfig,
    progress: &'a dyn ProgressHandler,
}

impl<'a> StageRunner<'a> {
    pub fn new(
        exec: &'a dyn Executor,
        config: &'a ToolchainConfig,
        progress: &'a dyn ProgressHandler,
    ) -> Self {
        Self {
            exec,
            config,
            progress,
        }
    }

    /// Build every product in order. Every invocation is derived (and so
    /// validated) before anything runs; the first failing build aborts the
    /// stage and the remaining products are not attempted.
    pub fn build(&self, stage: &BuildStageConfig, products: &[TargetProduct]) -> Result<()> {
        let invocations = products
            .iter()
            .map(|p| {
                derive_invocation(
                    stage,
                    p.name,
                    self.config.available_cpus,
                    &self.config.version,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        prepare_stage(self.exec, stage)?;

        info!(
            "Building {} product(s) into {} (profile task: {})",
            invocations.len(),
            stage.out_dir.display(),
            stage.profile_task
        );

        let total = invocations.len();
        for (index, invocation) in invocations.iter().enumerate() {
            let start = Instant::now();
            let command = invocation.command(&self.config.build_tool, &self.config.source_root);
            self.exec.run(&command)?;

            self.progress.on_progress(&ProgressEvent::ProductBuilt {
                out_dir: stage.out_dir.clone(),
                product: invocation.product.clone(),
                index: index + 1,
                total,
                duration: start.elapsed(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;
    use crate::exec::MemoryExecutor;
    use crate::progress::NoOpHandler;
    use std::path::PathBuf;

    fn config() -> ToolchainConfig {
        ToolchainConfig::new()
            .with_source_root("/src")
            .with_out_dir("/out")
            .with_available_cpus(8)
    }

    #[test]
    fn test_builds_every_product_in_order() {
        let exec = MemoryExecutor::new();
        let config = config();
        let runner = StageRunner::new(&exec, &config, &NoOpHandler);

        runner
            .build(&BuildStageConfig::new("/out/stage1").with_max_jobs(4), products())
            .unwrap();

        let built: Vec<String> = exec
            .commands()
            .iter()
            .map(|c| c.env["TARGET_PRODUCT"].clone())
            .collect();
        assert_eq!(
            built,
            vec![
                "aosp_arm",
                "aosp_arm64",
                "aosp_mips",
                "aosp_mips64",
                "aosp_x86",
                "aosp_x86_64"
            ]
        );
        assert!(exec
            .commands()
            .iter()
            .all(|c| c.program == "make" && c.cwd == Some(PathBuf::from("/src"))));
    }

    #[test]
    fn test_first_failure_stops_the_stage() {
        let exec = MemoryExecutor::new();
        exec.fail_command(
            |c| c.env.get("TARGET_PRODUCT").map(String::as_str) == Some("aosp_mips"),
            2,
        );
        let config = config();
        let runner = StageRunner::new(&exec, &config, &NoOpHandler);

        let err = runner
            .build(&BuildStageConfig::new("/out/stage1"), products())
            .unwrap_err();

        assert!(matches!(
            err,
            BuildError::ExternalCommandFailure { code: Some(2), .. }
        ));
        assert_eq!(exec.commands().len(), 3);
    }

    #[test]
    fn test_invalid_profile_task_runs_nothing() {
        let exec = MemoryExecutor::new();
        let config = config();
        let runner = StageRunner::new(&exec, &config, &NoOpHandler);

        let stage = BuildStageConfig::new("/out/stage2").with_profile_task(ProfileTask::Use(PathBuf::new()));
        let err = runner.build(&stage, products()).unwrap_err();

        assert!(matches!(err, BuildError::InvalidProfileTask(_)));
        assert!(exec.actions().is_empty());
    }
}
