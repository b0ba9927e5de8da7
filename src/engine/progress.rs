//! engine::progress
//!
//! Progress and cancellation reporting.
//!
//! Long-running operations announce a task with a fixed number of work
//! units, report units as they complete, and poll for cancellation between
//! steps. [`ProgressTask`] guarantees `done` is reported on every exit path.

/// Receives progress from an operation.
pub trait ProgressMonitor {
    fn begin_task(&mut self, name: &str, total: u32);

    fn worked(&mut self, units: u32);

    fn done(&mut self);

    /// Polled between steps; a `true` answer aborts before the next mutation.
    fn is_canceled(&self) -> bool {
        false
    }
}

/// Monitor that ignores everything and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgressMonitor;

impl ProgressMonitor for NullProgressMonitor {
    fn begin_task(&mut self, _name: &str, _total: u32) {}

    fn worked(&mut self, _units: u32) {}

    fn done(&mut self) {}
}

/// A progress event seen by [`RecordingMonitor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Begin { name: String, total: u32 },
    Worked(u32),
    Done,
}

/// Monitor that records events, optionally requesting cancellation.
#[derive(Debug, Clone, Default)]
pub struct RecordingMonitor {
    pub events: Vec<ProgressEvent>,
    pub cancel: bool,
}

impl RecordingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A monitor that reports cancellation from the start.
    pub fn canceled() -> Self {
        Self {
            events: Vec::new(),
            cancel: true,
        }
    }

    /// Sum of reported work units.
    pub fn total_worked(&self) -> u32 {
        self.events
            .iter()
            .map(|e| match e {
                ProgressEvent::Worked(units) => *units,
                _ => 0,
            })
            .sum()
    }
}

impl ProgressMonitor for RecordingMonitor {
    fn begin_task(&mut self, name: &str, total: u32) {
        self.events.push(ProgressEvent::Begin {
            name: name.to_string(),
            total,
        });
    }

    fn worked(&mut self, units: u32) {
        self.events.push(ProgressEvent::Worked(units));
    }

    fn done(&mut self) {
        self.events.push(ProgressEvent::Done);
    }

    fn is_canceled(&self) -> bool {
        self.cancel
    }
}

/// A begun task; reports `done` when dropped.
pub struct ProgressTask<'a> {
    monitor: &'a mut dyn ProgressMonitor,
}

impl<'a> ProgressTask<'a> {
    pub fn begin(monitor: &'a mut dyn ProgressMonitor, name: &str, total: u32) -> Self {
        monitor.begin_task(name, total);
        Self { monitor }
    }

    pub fn worked(&mut self, units: u32) {
        self.monitor.worked(units);
    }

    pub fn is_canceled(&self) -> bool {
        self.monitor.is_canceled()
    }
}

impl Drop for ProgressTask<'_> {
    fn drop(&mut self) {
        self.monitor.done();
    }
}
