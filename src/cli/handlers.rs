use super::commands::CliArgs;
use crate::config::{PipelineOptions, ToolchainConfig};
use crate::error::BuildError;
use crate::exec::{DryRunExecutor, Executor, RealExecutor};
use crate::host::HostPlatform;
use crate::pipeline::{BuildPipeline, PipelineReport};
use crate::progress::LoggingHandler;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Defaults, then `--config`, then the environment, then flags.
pub fn load_config(args: &CliArgs, env_vars: &BTreeMap<String, String>) -> Result<ToolchainConfig> {
    let mut config = ToolchainConfig::new();
    if let Some(path) = &args.config {
        config = config.with_file(path)?;
    }
    config = config.with_env_vars(env_vars);
    if let Some(source_root) = &args.source_root {
        config = config.with_source_root(source_root);
    }
    Ok(config)
}

/// Flags over defaults. Without `--host` the host list follows the build
/// machine's OS.
pub fn pipeline_options(args: &CliArgs, config: &ToolchainConfig) -> Result<PipelineOptions> {
    let defaults = PipelineOptions::new();
    let hosts = if args.hosts.is_empty() {
        HostPlatform::for_current_os()?
    } else {
        args.hosts.clone()
    };

    Ok(PipelineOptions::new()
        .with_build_name(args.build_name.clone().unwrap_or(defaults.build_name))
        .with_jobs(args.jobs.unwrap_or(config.available_cpus))
        .with_multi_stage(args.multi_stage().unwrap_or(defaults.multi_stage))
        .with_skip_stage1_install(args.skip_stage1_install)
        .with_build_all_llvm_tools(
            args.build_all_llvm_tools()
                .unwrap_or(defaults.build_all_llvm_tools),
        )
        .with_debug_clang(args.debug_clang().unwrap_or(defaults.debug_clang))
        .with_pgo_clang(args.pgo_clang().unwrap_or(defaults.pgo_clang))
        .with_pgo_profile(args.pgo_profile.clone())
        .with_hosts(hosts))
}

pub fn handle_build(args: &CliArgs) -> Result<PipelineReport> {
    let config = load_config(args, &env::vars().collect())?;
    let options = pipeline_options(args, &config)?;
    debug!("Configuration: {:?}", config);
    debug!("Options: {:?}", options);

    if args.dry_run {
        info!("Dry run: no command or filesystem change will be made");
        let exec = DryRunExecutor::new();
        let result = run_pipeline(&exec, &config, &options);
        if let Some(plan) = &args.emit_plan {
            write_plan(&exec, plan)?;
        }
        return result;
    }

    run_pipeline(&RealExecutor::new(), &config, &options)
}

fn run_pipeline(
    exec: &dyn Executor,
    config: &ToolchainConfig,
    options: &PipelineOptions,
) -> Result<PipelineReport> {
    let progress = LoggingHandler;
    let report = BuildPipeline::new(exec, config, options)
        .with_progress(&progress)
        .run()?;
    Ok(report)
}

fn write_plan(exec: &DryRunExecutor, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&exec.actions())
        .context("Failed to serialize the action plan")?;
    fs::write(path, json).with_context(|| format!("Failed to write plan to {}", path.display()))?;
    info!("Plan written to {}", path.display());
    Ok(())
}

/// Exit code for a failed run: the failing command's own code when the
/// error came from one.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<BuildError>()
        .map(BuildError::exit_code)
        .unwrap_or(1)
}
