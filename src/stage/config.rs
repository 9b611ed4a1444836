use std::fmt;
use std::path::{Path, PathBuf};

/// What a build does with execution profiles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProfileTask {
    #[default]
    None,
    /// Build a compiler that records profiles when it runs.
    Instrument,
    /// Run an instrumented compiler over the profiling targets.
    Generate,
    /// Optimize with the merged profile at this path.
    Use(PathBuf),
}

impl fmt::Display for ProfileTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileTask::None => f.write_str("none"),
            ProfileTask::Instrument => f.write_str("instrument"),
            ProfileTask::Generate => f.write_str("generate"),
            ProfileTask::Use(path) => write!(f, "use={}", path.display()),
        }
    }
}

/// Settings for one stage: every product of the stage is built with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStageConfig {
    pub out_dir: PathBuf,
    pub prebuilts_path: Option<PathBuf>,
    pub prebuilts_version: Option<String>,
    pub build_all_clang_tools: bool,
    pub build_all_llvm_tools: bool,
    pub debug_clang: bool,
    pub max_jobs: usize,
    pub use_updated_version: bool,
    pub profile_task: ProfileTask,
}

impl BuildStageConfig {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            prebuilts_path: None,
            prebuilts_version: None,
            build_all_clang_tools: false,
            build_all_llvm_tools: false,
            debug_clang: false,
            max_jobs: 1,
            use_updated_version: false,
            profile_task: ProfileTask::None,
        }
    }

    /// Build with the compiler installed at `<path>/<host>/<version>`.
    pub fn with_prebuilts(mut self, path: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        self.prebuilts_path = Some(path.into());
        self.prebuilts_version = Some(version.into());
        self
    }

    pub fn with_clang_tools(mut self, all: bool) -> Self {
        self.build_all_clang_tools = all;
        self
    }

    pub fn with_llvm_tools(mut self, all: bool) -> Self {
        self.build_all_llvm_tools = all;
        self
    }

    pub fn with_debug_clang(mut self, debug: bool) -> Self {
        self.debug_clang = debug;
        self
    }

    pub fn with_max_jobs(mut self, jobs: usize) -> Self {
        self.max_jobs = jobs;
        self
    }

    pub fn with_updated_version(mut self, updated: bool) -> Self {
        self.use_updated_version = updated;
        self
    }

    pub fn with_profile_task(mut self, task: ProfileTask) -> Self {
        self.profile_task = task;
        self
    }

    /// Where a `Generate` build writes raw profiles.
    pub fn profiles_dir(&self) -> PathBuf {
        profiles_dir(&self.out_dir)
    }
}

pub fn profiles_dir(out_dir: &Path) -> PathBuf {
    out_dir.join("profiles")
}
