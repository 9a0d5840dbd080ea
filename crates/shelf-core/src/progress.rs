//! Progress reporting for long-running bulk file operations.
//!
//! The file manager drives a [`ProgressTracker`] while it moves or deletes an
//! entry folder, one step per file. Callbacks run synchronously on the calling
//! thread, inside the file walk: a slow callback slows the operation down.
//!
//! ```rust,ignore
//! use shelf_core::progress::CallbackTracker;
//!
//! let mut tracker = CallbackTracker::new(
//!     |p| println!("{:.0}%", p.percent()),
//!     || println!("done"),
//! );
//! store.delete_with_progress("ID", &mut tracker)?;
//! ```

use serde::{Deserialize, Serialize};

/// Snapshot passed to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Steps completed so far.
    pub position: u64,
    /// Total number of steps.
    pub max: u64,
}

impl ProgressUpdate {
    /// Completed fraction in `0.0..=1.0`. An empty operation counts as done.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.max == 0 {
            return 1.0;
        }
        self.position as f64 / self.max as f64
    }

    /// Completed percentage in `0.0..=100.0`.
    #[must_use]
    pub fn percent(&self) -> f64 {
        self.fraction() * 100.0
    }
}

/// Observer for bulk file operations.
pub trait ProgressTracker {
    /// Set the total number of steps.
    fn set_max(&mut self, max: u64);

    /// Move to `position` and report progress.
    fn set_position(&mut self, position: u64);

    /// Advance by one step and report progress.
    fn increment(&mut self);

    /// Force `position = max` and report completion. Completion fires once
    /// per [`ProgressTracker::set_max`].
    fn complete(&mut self);
}

/// Report step `done` (zero-based) of `total` as finished.
///
/// The last step is not reported: [`ProgressTracker::complete`] is what
/// moves the position to max.
pub(crate) fn advance(tracker: &mut dyn ProgressTracker, done: usize, total: usize) {
    if done.saturating_add(1) < total {
        tracker.increment();
    }
}

/// Tracker for callers that don't care about progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnboundTracker;

impl ProgressTracker for UnboundTracker {
    fn set_max(&mut self, _max: u64) {}

    fn set_position(&mut self, _position: u64) {}

    fn increment(&mut self) {}

    fn complete(&mut self) {}
}

/// Tracker that forwards progress and completion to a pair of closures.
pub struct CallbackTracker<P, C>
where
    P: FnMut(ProgressUpdate),
    C: FnMut(),
{
    position: u64,
    max: u64,
    completed: bool,
    on_progress: P,
    on_complete: C,
}

impl<P, C> CallbackTracker<P, C>
where
    P: FnMut(ProgressUpdate),
    C: FnMut(),
{
    /// Create a tracker with zero steps.
    pub const fn new(on_progress: P, on_complete: C) -> Self {
        Self {
            position: 0,
            max: 0,
            completed: false,
            on_progress,
            on_complete,
        }
    }

    /// Current state.
    pub const fn snapshot(&self) -> ProgressUpdate {
        ProgressUpdate {
            position: self.position,
            max: self.max,
        }
    }

    /// Whether [`ProgressTracker::complete`] has fired.
    pub const fn is_completed(&self) -> bool {
        self.completed
    }
}

impl<P, C> ProgressTracker for CallbackTracker<P, C>
where
    P: FnMut(ProgressUpdate),
    C: FnMut(),
{
    fn set_max(&mut self, max: u64) {
        // A new max starts a new run.
        self.max = max;
        self.position = self.position.min(max);
        self.completed = false;
    }

    fn set_position(&mut self, position: u64) {
        // Never report beyond max; positions past it are clamped.
        self.position = position.min(self.max);
        let snapshot = self.snapshot();
        (self.on_progress)(snapshot);
    }

    fn increment(&mut self) {
        self.set_position(self.position.saturating_add(1));
    }

    fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        self.position = self.max;
        let snapshot = self.snapshot();
        (self.on_progress)(snapshot);
        (self.on_complete)();
    }
}
