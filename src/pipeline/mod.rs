//! The staged build state machine

pub mod orchestrator;
pub mod state;

pub use orchestrator::{BuildPipeline, PipelinePaths};
pub use state::{PipelineReport, PipelineState};
