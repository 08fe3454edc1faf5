//! Training session: shared state and run lifecycle
//!
//! Owns the kernel, gradient accumulator, position index, and loss history
//! behind a `parking_lot::RwLock`, with atomic running/cancel flags beside
//! it. One session supports at most one active training loop at a time:
//! `start` is guarded by a compare-exchange on the running flag, so a second
//! concurrent caller gets a silent no-op.
//!
//! Cancellation is cooperative. `request_cancel` sets a flag the loop
//! observes at its yield points (after each position pause, and between
//! epochs); a run terminated this way does not apply the partial epoch's
//! update and does not append a loss value. The terminating loop consumes
//! the flag, so a later `start` begins clean.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use thiserror::Error;

use crate::convolution::{ConvolutionEngine, Matrix3, Position, KERNEL_SIZE};
use crate::snapshot::{EpochSnapshot, StepSnapshot, TrainingObserver};
use crate::training::{Pacer, RunSummary, StopReason, TrainingConfig, TrainingLoop};

/// Operational misuse of the session lifecycle
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// `reset` was called while a training loop was active. Cancel the run
    /// and wait for it to terminate before resetting.
    #[error("cannot reset while a training run is active")]
    ResetWhileRunning,
}

/// Mutable state guarded by the session lock
#[derive(Debug, Clone)]
struct SessionState {
    kernel: Matrix3,
    gradient: Matrix3,
    position_index: usize,
    loss_history: Vec<f64>,
}

impl SessionState {
    fn seeded(config: &TrainingConfig) -> Self {
        Self {
            kernel: config.seed_kernel,
            gradient: [[0.0; KERNEL_SIZE]; KERNEL_SIZE],
            position_index: 0,
            loss_history: Vec::new(),
        }
    }
}

/// State holder for one training visualization
///
/// Wrap in an `Arc` to cancel from another thread while `start` runs.
pub struct TrainingSession {
    config: TrainingConfig,
    engine: ConvolutionEngine,
    state: RwLock<SessionState>,
    running: AtomicBool,
    cancel_requested: AtomicBool,
}

impl TrainingSession {
    /// Create a session seeded from the config's kernel
    pub fn new(config: TrainingConfig) -> Self {
        let engine = ConvolutionEngine::new(config.input);
        let state = RwLock::new(SessionState::seeded(&config));
        Self {
            config,
            engine,
            state,
            running: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn engine(&self) -> &ConvolutionEngine {
        &self.engine
    }

    /// Current kernel weights
    pub fn kernel(&self) -> Matrix3 {
        self.state.read().kernel
    }

    /// Current gradient accumulator (zeroed after every epoch update)
    pub fn gradient(&self) -> Matrix3 {
        self.state.read().gradient
    }

    /// Flat index of the position being animated, in [0, 9)
    pub fn position_index(&self) -> usize {
        self.state.read().position_index
    }

    /// Per-epoch loss values since the last reset
    pub fn loss_history(&self) -> Vec<f64> {
        self.state.read().loss_history.clone()
    }

    /// Number of completed epochs since the last reset
    pub fn epochs_completed(&self) -> usize {
        self.state.read().loss_history.len()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request cooperative cancellation of the active run
    ///
    /// Observed at the next yield point; a no-op when nothing is running
    /// until the flag is consumed or cleared by `reset`.
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    /// Consume a pending cancellation request
    fn take_cancel(&self) -> bool {
        self.cancel_requested.swap(false, Ordering::SeqCst)
    }

    /// Restore the seed kernel, clear history, and drop any pending cancel
    ///
    /// Rejected while a run is active; cancel first and let the run
    /// terminate.
    pub fn reset(&self) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::ResetWhileRunning);
        }
        *self.state.write() = SessionState::seeded(&self.config);
        self.cancel_requested.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Run the training loop to a terminal state on the calling thread
    ///
    /// Returns `None` without touching any state when a loop is already
    /// active (idempotent guard, not an error). Otherwise runs until
    /// convergence, the epoch cap, or cancellation, and reports which.
    pub fn start(
        &self,
        observer: &mut dyn TrainingObserver,
        pacer: &dyn Pacer,
    ) -> Option<RunSummary> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }

        let summary = self.run_loop(observer, pacer);
        self.running.store(false, Ordering::SeqCst);
        Some(summary)
    }

    fn run_loop(&self, observer: &mut dyn TrainingObserver, pacer: &dyn Pacer) -> RunSummary {
        let training = TrainingLoop::new(&self.engine, &self.config);
        let mut epochs_completed = 0;
        let mut final_loss = None;

        let reason = 'run: loop {
            if epochs_completed >= self.config.max_epochs {
                break StopReason::EpochLimit;
            }
            if self.take_cancel() {
                break StopReason::Cancelled;
            }

            // Working kernel is fixed for the whole epoch
            let kernel = self.kernel();
            let mut accumulator = [[0.0; KERNEL_SIZE]; KERNEL_SIZE];

            for position in Position::all() {
                let (raw_output, error) =
                    training.accumulate_position(&kernel, &mut accumulator, position);

                {
                    let mut state = self.state.write();
                    state.gradient = accumulator;
                    state.position_index = position.index();
                }

                log::trace!(
                    "epoch {} position ({}, {}): raw {:.4}, error {:.4}",
                    epochs_completed,
                    position.row,
                    position.col,
                    raw_output,
                    error
                );
                observer.on_step(&StepSnapshot {
                    epoch: epochs_completed,
                    position_index: position.index(),
                    position,
                    raw_output,
                    error,
                    kernel,
                    gradient: accumulator,
                });

                pacer.pause(self.config.step_delay);
                if self.take_cancel() {
                    // Partial epoch: no update, no loss entry
                    break 'run StopReason::Cancelled;
                }
            }

            let average = training.average_gradient(&accumulator);
            let updated = training.apply_update(&kernel, &average);
            let evaluation = training.evaluate(&updated);
            epochs_completed += 1;
            final_loss = Some(evaluation.loss);

            let history = {
                let mut state = self.state.write();
                state.kernel = updated;
                state.gradient = EpochSnapshot::cleared_gradient();
                state.position_index = 0;
                state.loss_history.push(evaluation.loss);
                state.loss_history.clone()
            };

            log::debug!(
                "epoch {}: loss {:.4}, matches_all {}",
                epochs_completed,
                evaluation.loss,
                evaluation.matches_all
            );
            observer.on_epoch(&EpochSnapshot {
                epoch: epochs_completed,
                kernel: updated,
                gradient: EpochSnapshot::cleared_gradient(),
                loss: evaluation.loss,
                matches_all: evaluation.matches_all,
                loss_history: history,
            });

            if evaluation.matches_all || evaluation.loss <= self.config.target_loss {
                break StopReason::Converged;
            }
        };

        RunSummary {
            reason,
            epochs_completed,
            final_loss,
        }
    }
}
