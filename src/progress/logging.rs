//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, error, info};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { out_dir, hosts } => {
                info!(
                    out_dir = %out_dir.display(),
                    hosts = %hosts.join(","),
                    "Starting toolchain build"
                );
            }
            ProgressEvent::StateStarted { state } => {
                info!(state = %state, "Entering state");
            }
            ProgressEvent::StateComplete { state, duration } => {
                info!(
                    state = %state,
                    duration_ms = duration.as_millis(),
                    "State complete"
                );
            }
            ProgressEvent::StateSkipped { state, reason } => {
                debug!(state = %state, reason = %reason, "Skipping state");
            }
            ProgressEvent::ProductBuilt {
                out_dir,
                product,
                index,
                total,
                duration,
            } => {
                info!(
                    out_dir = %out_dir.display(),
                    product = %product,
                    progress = format!("{}/{}", index, total),
                    duration_ms = duration.as_millis(),
                    "Product built"
                );
            }
            ProgressEvent::HostInstalled { host, install_dir } => {
                info!(host = %host, install_dir = %install_dir.display(), "Install tree assembled");
            }
            ProgressEvent::HostPackaged { host, tarball } => {
                info!(host = %host, tarball = %tarball.display(), "Package written");
            }
            ProgressEvent::Completed {
                packages,
                total_time,
            } => {
                info!(
                    packages,
                    total_time_ms = total_time.as_millis(),
                    "Toolchain build complete"
                );
            }
            ProgressEvent::Failed { error: err } => {
                error!(error = %err, "Toolchain build failed");
            }
        }
    }
}
