//! Progress reporting for long-running operations

use core::fmt;

/// Default reporting granularity between the start and completion reports
pub const PROGRESS_GRANULARITY: usize = 1024;

/// Long-running operation a progress report belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Page-wise or bulk erase
    Erase,
    /// Code memory programming
    Program,
    /// Code memory read
    Read,
    /// Data EEPROM read
    EepromRead,
    /// Data EEPROM write
    EepromWrite,
}

impl Operation {
    /// Short human-readable name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Erase => "Erasing",
            Self::Program => "Writing",
            Self::Read => "Reading",
            Self::EepromRead => "Reading EEPROM",
            Self::EepromWrite => "Writing EEPROM",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receiver of progress notifications
///
/// Purely observational: a sink cannot influence the running operation.
pub trait ProgressSink {
    /// `done` out of `total` bytes of `operation` have been processed
    fn report(&mut self, operation: Operation, done: usize, total: usize);
}

/// A no-op progress sink
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _operation: Operation, _done: usize, _total: usize) {}
}

/// Per-call progress state
///
/// One tracker is created by each orchestration call and threaded by
/// reference through the algorithms it invokes. It always forwards the start
/// and completion reports, and in between only reports once at least
/// `granularity` bytes have passed since the previous report.
pub struct ProgressTracker<'a> {
    sink: Option<&'a mut dyn ProgressSink>,
    operation: Operation,
    total: usize,
    granularity: usize,
    last_reported: Option<usize>,
}

impl<'a> ProgressTracker<'a> {
    /// Create a tracker forwarding to `sink` (if any)
    pub fn new(sink: Option<&'a mut dyn ProgressSink>, operation: Operation, total: usize) -> Self {
        Self {
            sink,
            operation,
            total,
            granularity: PROGRESS_GRANULARITY,
            last_reported: None,
        }
    }

    /// A tracker that reports nowhere
    pub fn disabled(operation: Operation, total: usize) -> Self {
        Self::new(None, operation, total)
    }

    /// Override the reporting granularity (0 reports every update)
    pub fn with_granularity(mut self, granularity: usize) -> Self {
        self.granularity = granularity;
        self
    }

    /// Operation being tracked
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Total number of bytes the operation covers
    pub fn total(&self) -> usize {
        self.total
    }

    /// Report the start of the operation
    pub fn start(&mut self) {
        self.emit(0);
    }

    /// Report that `done` bytes have been processed
    pub fn update(&mut self, done: usize) {
        let done = done.min(self.total);
        if done == self.total {
            return self.finish();
        }
        match self.last_reported {
            Some(last) if done < last.saturating_add(self.granularity) => {}
            _ => self.emit(done),
        }
    }

    /// Report completion of the operation
    pub fn finish(&mut self) {
        if self.last_reported != Some(self.total) {
            self.emit(self.total);
        }
    }

    fn emit(&mut self, done: usize) {
        self.last_reported = Some(done);
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.report(self.operation, done, self.total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[derive(Default)]
    struct Recorder(Vec<(Operation, usize, usize)>);

    impl ProgressSink for Recorder {
        fn report(&mut self, operation: Operation, done: usize, total: usize) {
            self.0.push((operation, done, total));
        }
    }

    #[test]
    fn test_reports_start_granularity_and_finish() {
        let mut recorder = Recorder::default();
        {
            let mut tracker = ProgressTracker::new(Some(&mut recorder), Operation::Program, 4096);
            tracker.start();
            for done in (8..4096).step_by(8) {
                tracker.update(done);
            }
            tracker.finish();
        }
        let done: Vec<usize> = recorder.0.iter().map(|r| r.1).collect();
        assert_eq!(done, [0, 1024, 2048, 3072, 4096]);
        assert!(recorder.0.iter().all(|r| r.0 == Operation::Program && r.2 == 4096));
    }

    #[test]
    fn test_completion_reported_once() {
        let mut recorder = Recorder::default();
        {
            let mut tracker = ProgressTracker::new(Some(&mut recorder), Operation::Erase, 100);
            tracker.start();
            tracker.update(100);
            tracker.finish();
        }
        assert_eq!(
            recorder.0,
            [(Operation::Erase, 0, 100), (Operation::Erase, 100, 100)]
        );
    }

    #[test]
    fn test_trackers_are_independent() {
        let mut recorder = Recorder::default();
        {
            let mut first = ProgressTracker::new(Some(&mut recorder), Operation::Read, 2048);
            first.start();
            first.update(1500);
        }
        {
            // A fresh tracker starts reporting from scratch
            let mut second = ProgressTracker::new(Some(&mut recorder), Operation::Read, 2048);
            second.start();
        }
        let done: Vec<usize> = recorder.0.iter().map(|r| r.1).collect();
        assert_eq!(done, [0, 1500, 0]);
    }
}
