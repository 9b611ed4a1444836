use super::state::{PipelineReport, PipelineState};
use crate::config::{PipelineOptions, ToolchainConfig};
use crate::error::{BuildError, Result};
use crate::exec::{check_artifact, Executor};
use crate::host::HostPlatform;
use crate::install::{InstallationAssembler, ToolchainFlavor};
use crate::package::{PackageArtifact, PackageEmitter};
use crate::profile::{ProfileArtifact, ProfileMerger};
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use crate::stage::{products, profiling_product, BuildStageConfig, ProfileTask, StageRunner};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

/// Version name of the instrumented compiler's install.
const INSTRUMENTED_VERSION: &str = "clang-dev";
const MERGED_PROFILE: &str = "clang.profile";

static NO_PROGRESS: NoOpHandler = NoOpHandler;

/// Directories of one run, all under `OUT_DIR`.
#[derive(Debug, Clone)]
pub struct PipelinePaths {
    pub stage1: PathBuf,
    pub stage1_install: PathBuf,
    pub instrumented: PathBuf,
    pub instrumented_install: PathBuf,
    pub profiled: PathBuf,
    pub stage2: PathBuf,
    pub install: PathBuf,
}

impl PipelinePaths {
    pub fn new(config: &ToolchainConfig) -> Self {
        Self {
            stage1: config.build_path("stage1"),
            stage1_install: config.build_path("stage1-install"),
            instrumented: config.build_path("stage2-instrumented"),
            instrumented_install: config.build_path("stage2-instrumented-install"),
            profiled: config.build_path("stage2-profiled"),
            stage2: config.build_path("stage2"),
            install: config.build_path("install"),
        }
    }
}

/// Drives a whole toolchain build: the stages, the optional PGO loop, and
/// per-host install and packaging. Strictly sequential; the first error
/// ends the run.
pub struct BuildPipeline<'a> {
    exec: &'a dyn Executor,
    config: &'a ToolchainConfig,
    options: &'a PipelineOptions,
    progress: &'a dyn ProgressHandler,
    paths: PipelinePaths,
}

impl<'a> BuildPipeline<'a> {
    pub fn new(
        exec: &'a dyn Executor,
        config: &'a ToolchainConfig,
        options: &'a PipelineOptions,
    ) -> Self {
        Self {
            exec,
            config,
            options,
            progress: &NO_PROGRESS,
            paths: PipelinePaths::new(config),
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressHandler) -> Self {
        self.progress = progress;
        self
    }

    pub fn paths(&self) -> &PipelinePaths {
        &self.paths
    }

    pub fn run(&self) -> Result<PipelineReport> {
        let start = Instant::now();
        debug!(
            "Building {} into {}",
            self.options.package_name(),
            self.config.out_root().display()
        );
        self.progress.on_progress(&ProgressEvent::Started {
            out_dir: self.config.out_root(),
            hosts: self.options.hosts.iter().map(|h| h.tag().to_string()).collect(),
        });

        match self.execute() {
            Ok(report) => {
                debug!("States visited: {:?}", report.states);
                self.progress.on_progress(&ProgressEvent::Completed {
                    packages: report.packages.len(),
                    total_time: start.elapsed(),
                });
                Ok(report)
            }
            Err(err) => {
                self.progress.on_progress(&ProgressEvent::Failed {
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Option combinations that cannot work, checked before any side effect.
    fn validate(&self) -> Result<()> {
        if self.options.hosts.is_empty() {
            return Err(BuildError::Config("no hosts to build for".to_string()));
        }
        if let Some(profile) = &self.options.pgo_profile {
            if !self.options.multi_stage {
                return Err(BuildError::Config(
                    "a PGO profile is only used by a multi-stage build".to_string(),
                ));
            }
            check_artifact(self.exec, "PGO profile", profile)?;
        }
        Ok(())
    }

    fn execute(&self) -> Result<PipelineReport> {
        self.validate()?;

        let mut states = Vec::new();
        let options = self.options;

        // A single-stage build packages stage1, so it gets the full tool set.
        let is_stage1_final = !options.multi_stage;
        let stage1 = BuildStageConfig::new(&self.paths.stage1)
            .with_clang_tools(is_stage1_final)
            .with_llvm_tools(is_stage1_final && options.build_all_llvm_tools)
            .with_debug_clang(is_stage1_final && options.debug_clang)
            .with_max_jobs(options.jobs);
        self.enter(PipelineState::Stage1Build, &mut states, || {
            self.runner().build(&stage1, products())
        })?;

        let mut profile = None;
        let final_out_dir = if options.multi_stage {
            if options.skip_stage1_install {
                self.skip(PipelineState::Stage1Install, "--skip-stage1-install");
                self.check_stage1_install()?;
            } else {
                self.enter(PipelineState::Stage1Install, &mut states, || {
                    self.install_stage1()
                })?;
            }

            let profile_path = match &options.pgo_profile {
                Some(supplied) => {
                    self.skip_pgo("profile supplied by the operator");
                    Some(supplied.clone())
                }
                None => {
                    profile = self.gather_profile(&mut states)?;
                    profile.as_ref().map(|p| p.merged_path.clone())
                }
            };

            self.enter(PipelineState::Stage2Build, &mut states, || {
                self.build_stage2(profile_path)
            })?;
            self.paths.stage2.clone()
        } else {
            self.skip(PipelineState::Stage1Install, "single-stage build");
            self.skip_pgo("single-stage build");
            self.skip(PipelineState::Stage2Build, "single-stage build");
            self.paths.stage1.clone()
        };

        let packages = self.enter(PipelineState::PackagePerHost, &mut states, || {
            self.package_hosts(&final_out_dir)
        })?;
        states.push(PipelineState::Done);

        Ok(PipelineReport {
            states,
            profile,
            packages,
            final_out_dir,
        })
    }

    fn runner(&self) -> StageRunner<'_> {
        StageRunner::new(self.exec, self.config, self.progress)
    }

    fn enter<T>(
        &self,
        state: PipelineState,
        states: &mut Vec<PipelineState>,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        debug!("Entering {}", state);
        self.progress.on_progress(&ProgressEvent::StateStarted {
            state: state.to_string(),
        });
        states.push(state);

        let state_start = Instant::now();
        let value = f()?;

        self.progress.on_progress(&ProgressEvent::StateComplete {
            state: state.to_string(),
            duration: state_start.elapsed(),
        });
        debug!("State {} complete", state);
        Ok(value)
    }

    fn skip(&self, state: PipelineState, reason: &str) {
        self.progress.on_progress(&ProgressEvent::StateSkipped {
            state: state.to_string(),
            reason: reason.to_string(),
        });
    }

    fn skip_pgo(&self, reason: &str) {
        for state in [
            PipelineState::PgoInstrument,
            PipelineState::PgoGenerate,
            PipelineState::PgoMerge,
        ] {
            self.skip(state, reason);
        }
    }

    /// `stage1-install/<host>/<package>`
    fn stage1_install_dir(&self, host: HostPlatform) -> PathBuf {
        self.paths
            .stage1_install
            .join(host.tag())
            .join(self.options.package_name())
    }

    /// Minimal toolchains for every host that can run the next stage's
    /// build. Other hosts only have their stale install removed.
    fn install_stage1(&self) -> Result<()> {
        let assembler = InstallationAssembler::new(self.exec, self.config);
        let package_name = self.options.package_name();

        for &host in &self.options.hosts {
            let install_host_dir = self.paths.stage1_install.join(host.tag());
            if !host.installs_stage1() {
                if self.exec.exists(&install_host_dir) {
                    self.exec.remove_dir_all(&install_host_dir)?;
                }
                continue;
            }

            let install_dir = assembler.install_toolchain(
                &self.paths.stage1,
                &install_host_dir,
                &package_name,
                host,
                true,
                ToolchainFlavor::Minimal,
            )?;
            self.progress.on_progress(&ProgressEvent::HostInstalled {
                host: host.tag().to_string(),
                install_dir,
            });
        }
        Ok(())
    }

    /// A skipped stage1 install must have left a usable one behind.
    fn check_stage1_install(&self) -> Result<()> {
        for &host in &self.options.hosts {
            if !host.installs_stage1() {
                continue;
            }
            let bin = self.stage1_install_dir(host).join("bin");
            for tool in ["clang", "llvm-profdata"] {
                let path = bin.join(format!("{}{}", tool, host.bin_ext()));
                check_artifact(self.exec, "stage1 install", &path)?;
            }
        }
        Ok(())
    }

    /// Build an instrumented compiler, profile it on the profiling product
    /// and merge the result. Only runs on a Linux primary host.
    fn gather_profile(&self, states: &mut Vec<PipelineState>) -> Result<Option<ProfileArtifact>> {
        if !self.options.pgo_clang {
            self.skip_pgo("PGO not requested");
            return Ok(None);
        }
        let host = self.options.hosts[0];
        if host != HostPlatform::Linux {
            warn!("PGO is only supported on linux-x86, not {}; building without it", host);
            self.skip_pgo("PGO unsupported on this host");
            return Ok(None);
        }

        let package_name = self.options.package_name();
        let instrumented_host_dir = self.paths.instrumented_install.join(host.tag());
        let instrumented_install = instrumented_host_dir.join(INSTRUMENTED_VERSION);

        self.enter(PipelineState::PgoInstrument, states, || {
            if self.exec.exists(&self.paths.instrumented_install) {
                self.exec.remove_dir_all(&self.paths.instrumented_install)?;
            }
            let stage = self
                .pgo_stage(&self.paths.instrumented)
                .with_prebuilts(&self.paths.stage1_install, &package_name)
                .with_profile_task(ProfileTask::Instrument);
            self.runner().build(&stage, &[profiling_product()])?;

            let install_dir = InstallationAssembler::new(self.exec, self.config).install_toolchain(
                &self.paths.instrumented,
                &instrumented_host_dir,
                INSTRUMENTED_VERSION,
                host,
                true,
                ToolchainFlavor::Instrumented,
            )?;
            self.progress.on_progress(&ProgressEvent::HostInstalled {
                host: host.tag().to_string(),
                install_dir,
            });
            Ok(())
        })?;

        self.enter(PipelineState::PgoGenerate, states, || {
            let stage = self
                .pgo_stage(&self.paths.profiled)
                .with_prebuilts(&self.paths.instrumented_install, INSTRUMENTED_VERSION)
                .with_profile_task(ProfileTask::Generate);
            self.runner().build(&stage, &[profiling_product()])
        })?;

        let artifact = self.enter(PipelineState::PgoMerge, states, || {
            let llvm_profdata = self.stage1_install_dir(host).join("bin/llvm-profdata");
            ProfileMerger::new(self.exec, llvm_profdata).merge(
                &self.paths.profiled.join("profiles"),
                &instrumented_install.join(MERGED_PROFILE),
            )
        })?;
        Ok(Some(artifact))
    }

    fn pgo_stage(&self, out_dir: &Path) -> BuildStageConfig {
        BuildStageConfig::new(out_dir)
            .with_max_jobs(self.options.jobs)
            .with_updated_version(true)
    }

    fn build_stage2(&self, profile: Option<PathBuf>) -> Result<()> {
        let task = match profile {
            Some(path) => ProfileTask::Use(path),
            None => ProfileTask::None,
        };
        let stage = BuildStageConfig::new(&self.paths.stage2)
            .with_prebuilts(&self.paths.stage1_install, self.options.package_name())
            .with_clang_tools(true)
            .with_llvm_tools(self.options.build_all_llvm_tools)
            .with_debug_clang(self.options.debug_clang)
            .with_max_jobs(self.options.jobs)
            .with_updated_version(true)
            .with_profile_task(task);
        self.runner().build(&stage, products())
    }

    /// Install the full toolchain for each host and archive it. Windows
    /// binaries are always stripped; no debug clang is built for Windows.
    fn package_hosts(&self, final_out_dir: &Path) -> Result<Vec<PackageArtifact>> {
        let assembler = InstallationAssembler::new(self.exec, self.config);
        let emitter = PackageEmitter::new(self.exec);
        let package_name = self.options.package_name();
        let dist_dir = self
            .config
            .dist_dir
            .clone()
            .unwrap_or_else(|| final_out_dir.to_path_buf());
        let version = self.config.version.long();

        let mut packages = Vec::with_capacity(self.options.hosts.len());
        for &host in &self.options.hosts {
            let strip = host == HostPlatform::Windows || !self.options.debug_clang;
            let install_host_dir = self.paths.install.join(host.tag());

            let install_dir = assembler.install_toolchain(
                final_out_dir,
                &install_host_dir,
                &package_name,
                host,
                strip,
                ToolchainFlavor::Full,
            )?;
            self.progress.on_progress(&ProgressEvent::HostInstalled {
                host: host.tag().to_string(),
                install_dir,
            });

            let package = emitter.emit(&install_host_dir, &package_name, host, &version, &dist_dir)?;
            self.progress.on_progress(&ProgressEvent::HostPackaged {
                host: host.tag().to_string(),
                tarball: package.tarball_path.clone(),
            });
            packages.push(package);
        }
        Ok(packages)
    }
}
