//! Progress handler trait and events

use std::path::PathBuf;
use std::time::Duration;

/// Events emitted while the pipeline runs
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Pipeline started
    Started { out_dir: PathBuf, hosts: Vec<String> },

    /// A pipeline state was entered
    StateStarted { state: String },

    /// A pipeline state finished
    StateComplete { state: String, duration: Duration },

    /// A pipeline state was not entered
    StateSkipped { state: String, reason: String },

    /// One product of a stage was built
    ProductBuilt {
        out_dir: PathBuf,
        product: String,
        index: usize,
        total: usize,
        duration: Duration,
    },

    /// An install tree was assembled
    HostInstalled { host: String, install_dir: PathBuf },

    /// A package was written
    HostPackaged { host: String, tarball: PathBuf },

    /// Pipeline completed successfully
    Completed { packages: usize, total_time: Duration },

    /// Pipeline failed
    Failed { error: String },
}

/// Trait for handling progress events during a pipeline run
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {
        // Intentionally empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    impl ProgressHandler for CountingHandler {
        fn on_progress(&self, _event: &ProgressEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_noop_handler() {
        let handler = NoOpHandler;
        handler.on_progress(&ProgressEvent::Started {
            out_dir: PathBuf::from("out"),
            hosts: vec!["linux-x86".to_string()],
        });
        // Should not panic or do anything
    }

    #[test]
    fn test_progress_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = CountingHandler {
            count: count.clone(),
        };

        handler.on_progress(&ProgressEvent::StateStarted {
            state: "Stage1Build".to_string(),
        });
        handler.on_progress(&ProgressEvent::StateComplete {
            state: "Stage1Build".to_string(),
            duration: Duration::from_secs(3600),
        });
        handler.on_progress(&ProgressEvent::Completed {
            packages: 2,
            total_time: Duration::from_secs(7200),
        });

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_event_debug() {
        let event = ProgressEvent::StateSkipped {
            state: "PgoInstrument".to_string(),
            reason: "pgo disabled".to_string(),
        };
        let debug_str = format!("{:?}", event);
        assert!(debug_str.contains("StateSkipped"));
        assert!(debug_str.contains("PgoInstrument"));
    }
}
