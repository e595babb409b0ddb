//! Adaptive pacing of the command-frame cadence.
//!
//! Every closed frame yields one sample: how many updates the slowest
//! peer needed before it held every batch, relative to the target in
//! force. The [`Pacer`] keeps a short history of these samples, bounded
//! by a window measured in simulation updates, and derives the cadence
//! that would have let the slowest recent peer finish with one update to
//! spare.
//!
//! Every input comes from `Done` notices that all peers exchange, and
//! the window is measured in update numbers rather than local time, so
//! every peer computes the same suggestion.

use std::collections::VecDeque;

use phalanx_core::{CommandFrame, UpdateNumber};

use crate::config::SyncConfig;

/// One closed frame's pacing observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacingSample {
    /// The closed frame.
    pub frame: CommandFrame,
    /// Update number at which the frame closed.
    pub recorded_at: UpdateNumber,
    /// Target updates-per-frame in force for the frame.
    pub target: u32,
    /// Slowest peer's updates taken minus `target`.
    pub delta: i64,
}

impl PacingSample {
    /// Updates the slowest peer took.
    pub fn slowest(&self) -> i64 {
        i64::from(self.target) + self.delta
    }
}

/// Rolling pacing history and target suggestion.
#[derive(Clone, Debug)]
pub struct Pacer {
    window: u32,
    min: u32,
    max: u32,
    history: VecDeque<PacingSample>,
}

impl Pacer {
    /// A pacer using the bounds and window from `config`.
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            window: config.pacing_window_updates,
            min: config.min_updates_per_frame,
            max: config.max_updates_per_frame,
            history: VecDeque::new(),
        }
    }

    /// Record the updates each peer (the local one included) took to
    /// complete `frame`. Returns the slowest-minus-target delta, or `None`
    /// when no counts were supplied.
    pub fn record(
        &mut self,
        frame: CommandFrame,
        recorded_at: UpdateNumber,
        target: u32,
        updates_taken: impl IntoIterator<Item = u32>,
    ) -> Option<i64> {
        let slowest = updates_taken.into_iter().max()?;
        let delta = i64::from(slowest) - i64::from(target);
        self.history.push_back(PacingSample {
            frame,
            recorded_at,
            target,
            delta,
        });
        self.prune(recorded_at);
        Some(delta)
    }

    /// Forget samples that fell out of the window as of `now`.
    pub fn prune(&mut self, now: UpdateNumber) {
        while let Some(oldest) = self.history.front() {
            if u64::from(oldest.recorded_at.0) + u64::from(self.window) < u64::from(now.0) {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    /// Suggested target for the next cycle: the slowest sample in the
    /// window plus one, clamped to the configured bounds. `None` while
    /// the history is empty.
    pub fn suggested_target(&self) -> Option<u32> {
        let slowest = self.history.iter().map(PacingSample::slowest).max()?;
        let suggested = (slowest + 1).clamp(i64::from(self.min), i64::from(self.max));
        u32::try_from(suggested).ok()
    }

    /// Samples currently in the window, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &PacingSample> {
        self.history.iter()
    }

    /// Number of samples in the window.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether the window holds no samples.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
