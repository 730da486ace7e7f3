//! Progress reporting for decompilation runs.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// A snapshot of the progress of one decompilation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompilationProgress {
    /// What is being decompiled
    pub title: String,
    /// The unit that was finished last
    pub status: String,
    /// Number of units known so far, including the assembly info file
    pub total_units: usize,
    /// Number of finished units
    pub units_completed: usize,
}

/// Receives progress updates; called from worker threads.
pub trait ProgressSink: Send + Sync {
    /// Reports a new snapshot.
    fn report(&self, progress: &DecompilationProgress);
}

/// Shared counters of a run.
pub(crate) struct ProgressTracker {
    title: String,
    total: AtomicUsize,
    completed: AtomicUsize,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl ProgressTracker {
    pub(crate) fn new(title: String, sink: Option<Arc<dyn ProgressSink>>) -> Self {
        ProgressTracker {
            title,
            total: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            sink,
        }
    }

    pub(crate) fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
    }

    pub(crate) fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Counts one finished unit and notifies the sink.
    pub(crate) fn unit_completed(&self, status: &str) {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(sink) = &self.sink {
            sink.report(&DecompilationProgress {
                title: self.title.clone(),
                status: status.to_string(),
                total_units: self.total(),
                units_completed: completed,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<DecompilationProgress>>);

    impl ProgressSink for Recorder {
        fn report(&self, progress: &DecompilationProgress) {
            self.0.lock().unwrap().push(progress.clone());
        }
    }

    #[test]
    fn test_tracker_reports() {
        let recorder = Arc::new(Recorder::default());
        let tracker = ProgressTracker::new("Decompiling Foo".into(), Some(recorder.clone()));
        tracker.set_total(3);
        tracker.unit_completed("A.cs");
        tracker.set_total(4);
        tracker.unit_completed("B.cs");

        let reports = recorder.0.lock().unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].status, "A.cs");
        assert_eq!(reports[0].total_units, 3);
        assert_eq!(reports[1].units_completed, 2);
        assert_eq!(reports[1].total_units, 4);
        assert_eq!(tracker.completed(), 2);
    }
}
