use crate::package::PackageArtifact;
use crate::profile::ProfileArtifact;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Pipeline states, in the only order they can be visited. Any state can
/// fail, which ends the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PipelineState {
    Stage1Build,
    Stage1Install,
    PgoInstrument,
    PgoGenerate,
    PgoMerge,
    Stage2Build,
    PackagePerHost,
    Done,
}

impl PipelineState {
    pub fn name(self) -> &'static str {
        match self {
            PipelineState::Stage1Build => "Stage1Build",
            PipelineState::Stage1Install => "Stage1Install",
            PipelineState::PgoInstrument => "PgoInstrument",
            PipelineState::PgoGenerate => "PgoGenerate",
            PipelineState::PgoMerge => "PgoMerge",
            PipelineState::Stage2Build => "Stage2Build",
            PipelineState::PackagePerHost => "PackagePerHost",
            PipelineState::Done => "Done",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// States entered, in order, ending with `Done`.
    pub states: Vec<PipelineState>,
    /// The profile merged by this run, if PGO ran.
    pub profile: Option<ProfileArtifact>,
    pub packages: Vec<PackageArtifact>,
    /// Output directory of the stage that was packaged.
    pub final_out_dir: PathBuf,
}

impl PipelineReport {
    pub fn visited(&self, state: PipelineState) -> bool {
        self.states.contains(&state)
    }
}
