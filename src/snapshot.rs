//! Snapshots published to the presentation layer
//!
//! The training loop emits two kinds of state snapshots:
//! - a step snapshot per window position (the animated "step"), carrying
//!   the live gradient accumulator
//! - an epoch snapshot per completed epoch, carrying the updated kernel,
//!   the appended loss history, and an all-zero gradient
//!
//! The epoch snapshot's gradient is zeroed deliberately: the display shows
//! a cleared accumulator after every update, ready for the next pass.
//!
//! Snapshots serialize with serde so a renderer outside this crate can
//! consume them as JSON.

use serde::Serialize;

use crate::convolution::{Matrix3, Position, KERNEL_SIZE};

/// Transient per-position state, published once per animation step
///
/// Not persisted anywhere; a renderer may drop these freely.
#[derive(Debug, Clone, Serialize)]
pub struct StepSnapshot {
    /// Zero-based index of the epoch in progress
    pub epoch: usize,
    /// Flat index of the current position, in [0, 9)
    pub position_index: usize,
    /// Top-left corner of the current window
    pub position: Position,
    /// Raw linear convolution output at this position
    pub raw_output: f64,
    /// raw_output minus the target value at this position
    pub error: f64,
    /// The epoch's working kernel (unmodified mid-epoch)
    pub kernel: Matrix3,
    /// Gradient accumulator including this position's contribution
    pub gradient: Matrix3,
}

/// Durable per-epoch state, published once per completed epoch
#[derive(Debug, Clone, Serialize)]
pub struct EpochSnapshot {
    /// Number of completed epochs, including this one
    pub epoch: usize,
    /// Kernel after this epoch's weight update
    pub kernel: Matrix3,
    /// Always all-zero: the accumulator as displayed after an update
    pub gradient: Matrix3,
    /// This epoch's loss (MSE over the ReLU output grid, 4 decimal places)
    pub loss: f64,
    /// Whether every ReLU output rounds to its target value
    pub matches_all: bool,
    /// Full ordered loss history since the last reset
    pub loss_history: Vec<f64>,
}

impl EpochSnapshot {
    /// The zeroed gradient every epoch snapshot carries
    pub fn cleared_gradient() -> Matrix3 {
        [[0.0; KERNEL_SIZE]; KERNEL_SIZE]
    }
}

/// Callback surface for the presentation adapter
///
/// Both methods default to no-ops so consumers override only what they
/// render. Called from the training thread between yield points.
pub trait TrainingObserver {
    /// One animation step: a position was processed
    fn on_step(&mut self, _snapshot: &StepSnapshot) {}

    /// One epoch completed: kernel updated, loss appended
    fn on_epoch(&mut self, _snapshot: &EpochSnapshot) {}
}

/// Observer that ignores everything, for headless runs
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl TrainingObserver for NullObserver {}

/// Observer that records every snapshot, for tests
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub steps: Vec<StepSnapshot>,
    pub epochs: Vec<EpochSnapshot>,
}

impl TrainingObserver for RecordingObserver {
    fn on_step(&mut self, snapshot: &StepSnapshot) {
        self.steps.push(snapshot.clone());
    }

    fn on_epoch(&mut self, snapshot: &EpochSnapshot) {
        self.epochs.push(snapshot.clone());
    }
}
