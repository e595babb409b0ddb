//! Synchronizer configuration, validation, and error types.
//!
//! [`SyncConfig`] is passed to
//! [`CommandSynchronizer::new`](crate::CommandSynchronizer::new).
//! [`validate()`](SyncConfig::validate) checks its invariants at startup;
//! the constructor calls it and refuses an invalid configuration.

use thiserror::Error;

// ── PacingPolicy ───────────────────────────────────────────────────

/// How the number of updates per command frame is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PacingPolicy {
    /// Always use [`SyncConfig::target_updates_per_frame`].
    ///
    /// The adaptive suggestion is still computed and reported through
    /// [`Pacer::suggested_target`](crate::Pacer::suggested_target), but
    /// never applied.
    #[default]
    Pinned,
    /// After every closed frame, switch to the pacer's suggestion so the
    /// cadence follows the slowest peer.
    Adaptive,
}

// ── SyncConfig ─────────────────────────────────────────────────────

/// Lockstep synchronizer configuration.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Simulation updates between two command-frame boundaries. The hard
    /// deadline for closing a frame is twice this. Default: 6.
    pub target_updates_per_frame: u32,
    /// Target selection policy. Default: [`PacingPolicy::Pinned`].
    pub pacing: PacingPolicy,
    /// Lower bound on the adaptive target. Default: 2.
    pub min_updates_per_frame: u32,
    /// Upper bound on the adaptive target. Default: 30.
    pub max_updates_per_frame: u32,
    /// Pacing history retention window, in updates. Samples older than
    /// this are forgotten. Default: 300.
    pub pacing_window_updates: u32,
    /// Closed frames kept in endpoint and local history before they are
    /// discarded. Must be at least 1. Default: 8.
    pub retained_frames: u32,
    /// Datagrams for frames further than this ahead of the last closed
    /// frame are discarded. Default: 64.
    pub max_frames_ahead: u32,
    /// While paused, retransmit the local batch and `Done` for the
    /// unclosed frame every this many polls. `0` disables. Default: 30.
    pub resend_interval_updates: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            target_updates_per_frame: 6,
            pacing: PacingPolicy::Pinned,
            min_updates_per_frame: 2,
            max_updates_per_frame: 30,
            pacing_window_updates: 300,
            retained_frames: 8,
            max_frames_ahead: 64,
            resend_interval_updates: 30,
        }
    }
}

impl SyncConfig {
    /// A default configuration with the given target cadence.
    ///
    /// The adaptive bounds are widened when needed so the result always
    /// validates for any non-zero target.
    pub fn with_target(target_updates_per_frame: u32) -> Self {
        let base = Self::default();
        Self {
            target_updates_per_frame,
            min_updates_per_frame: base.min_updates_per_frame.min(target_updates_per_frame),
            max_updates_per_frame: base.max_updates_per_frame.max(target_updates_per_frame),
            ..base
        }
    }

    /// Check all structural invariants.
    pub fn validate(&self) -> Result<(), SyncConfigError> {
        if self.target_updates_per_frame == 0 {
            return Err(SyncConfigError::ZeroTarget);
        }
        if self.min_updates_per_frame == 0
            || self.min_updates_per_frame > self.max_updates_per_frame
        {
            return Err(SyncConfigError::InvalidBounds {
                min: self.min_updates_per_frame,
                max: self.max_updates_per_frame,
            });
        }
        if !(self.min_updates_per_frame..=self.max_updates_per_frame)
            .contains(&self.target_updates_per_frame)
        {
            return Err(SyncConfigError::TargetOutOfBounds {
                target: self.target_updates_per_frame,
                min: self.min_updates_per_frame,
                max: self.max_updates_per_frame,
            });
        }
        if self.pacing_window_updates == 0 {
            return Err(SyncConfigError::ZeroPacingWindow);
        }
        if self.max_frames_ahead == 0 {
            return Err(SyncConfigError::ZeroLookahead);
        }
        if self.retained_frames == 0 {
            return Err(SyncConfigError::ZeroRetention);
        }
        Ok(())
    }
}

// ── SyncConfigError ────────────────────────────────────────────────

/// Errors detected during [`SyncConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SyncConfigError {
    /// `target_updates_per_frame` is zero.
    #[error("target_updates_per_frame must be at least 1")]
    ZeroTarget,
    /// The adaptive bounds are empty or start at zero.
    #[error("invalid adaptive bounds: min {min}, max {max}")]
    InvalidBounds {
        /// Configured lower bound.
        min: u32,
        /// Configured upper bound.
        max: u32,
    },
    /// The target lies outside the adaptive bounds.
    #[error("target {target} is outside [{min}, {max}]")]
    TargetOutOfBounds {
        /// Configured target.
        target: u32,
        /// Configured lower bound.
        min: u32,
        /// Configured upper bound.
        max: u32,
    },
    /// `pacing_window_updates` is zero.
    #[error("pacing_window_updates must be at least 1")]
    ZeroPacingWindow,
    /// `max_frames_ahead` is zero.
    #[error("max_frames_ahead must be at least 1")]
    ZeroLookahead,
    /// `retained_frames` is zero; a peer one frame behind could never
    /// recover a lost batch.
    #[error("retained_frames must be at least 1")]
    ZeroRetention,
}
