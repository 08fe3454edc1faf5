//! Gradient-descent training over the 3x3 filter
//!
//! Implements the per-epoch arithmetic of the visualizer's training loop:
//! - One epoch is a full sweep over the 9 window positions in canonical order
//! - The working kernel is fixed for the whole epoch; gradients accumulate
//!   additively across positions and are averaged at epoch end
//! - Weight update: w' = clamp(w - lr * avg_grad, -2, 2), with the same
//!   decimal rounding the visualizer displays
//! - Loss is MSE over the ReLU output grid; gradients never flow through
//!   the ReLU (the toy learning rule is linear by construction)
//!
//! Pacing between positions is injected through the [`Pacer`] trait so tests
//! run without real delays.

use std::thread;
use std::time::Duration;

use crate::convolution::{
    ConvolutionEngine, InputMatrix, Matrix3, Position, TargetMatrix, KERNEL_SIZE, NUM_POSITIONS,
};

/// Fixed 5x5 binary input the filter convolves over
pub const DEFAULT_INPUT: InputMatrix = [
    [1, 0, 1, 0, 1],
    [0, 1, 0, 1, 0],
    [1, 0, 1, 0, 1],
    [0, 1, 0, 1, 0],
    [1, 0, 1, 0, 1],
];

/// Fixed 3x3 target map the filter learns to reproduce
pub const DEFAULT_TARGET: TargetMatrix = [[1, 0, 1], [0, 1, 0], [1, 0, 1]];

/// Seed kernel restored on every reset
pub const SEED_KERNEL: Matrix3 = [[0.2, -0.5, 0.3], [0.0, 0.8, -0.2], [0.1, -0.4, 0.6]];

/// Default learning rate
pub const LEARNING_RATE: f64 = 0.01;

/// Default epoch cap per run
pub const MAX_EPOCHS: usize = 100;

/// Loss threshold below which the run converges
pub const TARGET_LOSS: f64 = 0.01;

/// Default pause between the 9 per-epoch animation steps
pub const STEP_DELAY: Duration = Duration::from_millis(150);

/// Weights are clamped to [-WEIGHT_LIMIT, WEIGHT_LIMIT] after every update
pub const WEIGHT_LIMIT: f64 = 2.0;

/// Round to a fixed number of decimal places
///
/// Matches the display rounding the visualizer applies to averaged
/// gradients (6), updated weights (4), and loss values (4).
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Training hyperparameters and fixed problem data
///
/// The defaults are the visualizer's constants; tests override individual
/// fields (a zero delay, a lower epoch cap) without touching the rest.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// 5x5 binary input matrix
    pub input: InputMatrix,
    /// 3x3 binary target map
    pub target: TargetMatrix,
    /// Kernel the session starts from and resets to
    pub seed_kernel: Matrix3,
    /// Learning rate (default: 0.01)
    pub learning_rate: f64,
    /// Maximum epochs per run (default: 100)
    pub max_epochs: usize,
    /// Loss threshold for convergence (default: 0.01)
    pub target_loss: f64,
    /// Pause between per-position animation steps (default: 150 ms)
    pub step_delay: Duration,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            input: DEFAULT_INPUT,
            target: DEFAULT_TARGET,
            seed_kernel: SEED_KERNEL,
            learning_rate: LEARNING_RATE,
            max_epochs: MAX_EPOCHS,
            target_loss: TARGET_LOSS,
            step_delay: STEP_DELAY,
        }
    }
}

impl TrainingConfig {
    /// Config for tests and headless runs: no inter-step delay
    pub fn instant() -> Self {
        Self {
            step_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Suspension point between animation steps
///
/// The training loop yields through this after every position so the host
/// can pace the animation and observe cancellation. Injected so tests run
/// the loop without real time delays.
pub trait Pacer {
    fn pause(&self, duration: Duration);
}

/// Real pacing: blocks the training thread for the requested duration
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepPacer;

impl Pacer for SleepPacer {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// No-op pacing for tests and instant runs
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl Pacer for NoDelay {
    fn pause(&self, _duration: Duration) {}
}

/// Result of evaluating a kernel against the target map
#[derive(Debug, Clone, Copy)]
pub struct EpochEvaluation {
    /// MSE over the 9 ReLU outputs, rounded to 4 decimal places
    pub loss: f64,
    /// True iff every ReLU output, rounded to 2 decimal places, equals the
    /// corresponding integer target value
    pub matches_all: bool,
}

/// Why a training run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// matches_all was true, or loss reached the target threshold
    Converged,
    /// The epoch cap was reached without convergence
    EpochLimit,
    /// Cancellation was observed at a yield point
    Cancelled,
}

/// Summary returned by a completed (or cancelled) training run
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub reason: StopReason,
    /// Completed epochs; equals the loss entries appended by this run
    pub epochs_completed: usize,
    /// Loss after the last completed epoch, if any epoch completed
    pub final_loss: Option<f64>,
}

/// Per-epoch arithmetic of the training loop
///
/// Pure with respect to session state: callers pass the working kernel and
/// the accumulator in, and apply the returned update themselves. The session
/// drives this once per epoch and owns all mutation.
pub struct TrainingLoop<'a> {
    engine: &'a ConvolutionEngine,
    config: &'a TrainingConfig,
}

impl<'a> TrainingLoop<'a> {
    pub fn new(engine: &'a ConvolutionEngine, config: &'a TrainingConfig) -> Self {
        Self { engine, config }
    }

    /// Target value at a window position, as a real number
    #[inline]
    pub fn target_at(&self, position: Position) -> f64 {
        f64::from(self.config.target[position.row][position.col])
    }

    /// Process one position: accumulate its gradient contribution
    ///
    /// Uses the raw linear output (no ReLU). Returns (raw output, error)
    /// for the step snapshot.
    pub fn accumulate_position(
        &self,
        kernel: &Matrix3,
        accumulator: &mut Matrix3,
        position: Position,
    ) -> (f64, f64) {
        let raw = self.engine.convolve(position, kernel);
        let error = raw - self.target_at(position);

        for i in 0..KERNEL_SIZE {
            for j in 0..KERNEL_SIZE {
                accumulator[i][j] += self.engine.window_value(position, i, j) * error;
            }
        }

        (raw, error)
    }

    /// Epoch-average gradient: accumulator / 9, rounded to 6 decimal places
    pub fn average_gradient(&self, accumulator: &Matrix3) -> Matrix3 {
        let mut average = [[0.0; KERNEL_SIZE]; KERNEL_SIZE];
        for i in 0..KERNEL_SIZE {
            for j in 0..KERNEL_SIZE {
                average[i][j] = round_to(accumulator[i][j] / NUM_POSITIONS as f64, 6);
            }
        }
        average
    }

    /// Apply one gradient-descent step to every weight
    ///
    /// w' = clamp(w - lr * avg, -2, 2), rounded to 4 decimal places.
    pub fn apply_update(&self, kernel: &Matrix3, average_gradient: &Matrix3) -> Matrix3 {
        let mut updated = [[0.0; KERNEL_SIZE]; KERNEL_SIZE];
        for i in 0..KERNEL_SIZE {
            for j in 0..KERNEL_SIZE {
                let stepped = kernel[i][j] - self.config.learning_rate * average_gradient[i][j];
                updated[i][j] = round_to(stepped.clamp(-WEIGHT_LIMIT, WEIGHT_LIMIT), 4);
            }
        }
        updated
    }

    /// Evaluate a kernel: MSE loss over the ReLU output grid, plus the
    /// exact-match flag the convergence check uses
    pub fn evaluate(&self, kernel: &Matrix3) -> EpochEvaluation {
        let mut total = 0.0;
        let mut matches_all = true;

        for position in Position::all() {
            let output = self.engine.display_output(position, kernel);
            let target = self.target_at(position);
            let diff = output - target;
            total += diff * diff;

            if round_to(output, 2) != target {
                matches_all = false;
            }
        }

        EpochEvaluation {
            loss: round_to(total / NUM_POSITIONS as f64, 4),
            matches_all,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fixture() -> (ConvolutionEngine, TrainingConfig) {
        let config = TrainingConfig::instant();
        let engine = ConvolutionEngine::new(config.input);
        (engine, config)
    }

    /// Accumulate one full epoch from the given kernel
    fn accumulate_epoch(training: &TrainingLoop, kernel: &Matrix3) -> Matrix3 {
        let mut accumulator = [[0.0; KERNEL_SIZE]; KERNEL_SIZE];
        for position in Position::all() {
            training.accumulate_position(kernel, &mut accumulator, position);
        }
        accumulator
    }

    // ==================== Config Tests ====================

    #[test]
    fn test_config_defaults() {
        let config = TrainingConfig::default();
        assert_relative_eq!(config.learning_rate, 0.01);
        assert_relative_eq!(config.target_loss, 0.01);
        assert_eq!(config.max_epochs, 100);
        assert_eq!(config.step_delay, Duration::from_millis(150));
    }

    #[test]
    fn test_config_instant_has_no_delay() {
        let config = TrainingConfig::instant();
        assert!(config.step_delay.is_zero());
        assert_relative_eq!(config.learning_rate, 0.01);
    }

    // ==================== Rounding Tests ====================

    #[test]
    fn test_round_to_places() {
        assert_relative_eq!(round_to(0.5248888, 4), 0.5249);
        assert_relative_eq!(round_to(-0.48888888, 6), -0.488889);
        assert_relative_eq!(round_to(1.972, 2), 1.97);
    }

    // ==================== Gradient Tests ====================

    #[test]
    fn test_epoch_one_accumulated_gradient_fixture() {
        let (engine, config) = fixture();
        let training = TrainingLoop::new(&engine, &config);

        let accumulator = accumulate_epoch(&training, &SEED_KERNEL);

        // Deterministic fixture for the fixed input/target/seed triple
        let expected = [[5.0, -4.4, 5.0], [-4.4, 5.0, -4.4], [5.0, -4.4, 5.0]];
        for i in 0..KERNEL_SIZE {
            for j in 0..KERNEL_SIZE {
                assert_relative_eq!(accumulator[i][j], expected[i][j], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_average_gradient_rounds_to_six_places() {
        let (engine, config) = fixture();
        let training = TrainingLoop::new(&engine, &config);

        let accumulator = accumulate_epoch(&training, &SEED_KERNEL);
        let average = training.average_gradient(&accumulator);

        assert_relative_eq!(average[0][0], 0.555556, epsilon = 1e-12);
        assert_relative_eq!(average[0][1], -0.488889, epsilon = 1e-12);
    }

    #[test]
    fn test_gradient_uses_raw_output_not_relu() {
        // Position (0,1) has a negative raw output under the seed kernel.
        // ReLU would zero it and shrink the error; the learning rule must
        // see the raw value.
        let (engine, config) = fixture();
        let training = TrainingLoop::new(&engine, &config);

        let position = Position::new(0, 1);
        let mut accumulator = [[0.0; KERNEL_SIZE]; KERNEL_SIZE];
        let (raw, error) = training.accumulate_position(&SEED_KERNEL, &mut accumulator, position);

        assert_relative_eq!(raw, -1.1, epsilon = 1e-12);
        assert_relative_eq!(error, -1.1, epsilon = 1e-12); // target is 0 here
    }

    // ==================== Update Tests ====================

    #[test]
    fn test_epoch_one_updated_kernel_fixture() {
        let (engine, config) = fixture();
        let training = TrainingLoop::new(&engine, &config);

        let accumulator = accumulate_epoch(&training, &SEED_KERNEL);
        let average = training.average_gradient(&accumulator);
        let updated = training.apply_update(&SEED_KERNEL, &average);

        let expected = [
            [0.1944, -0.4951, 0.2944],
            [0.0049, 0.7944, -0.1951],
            [0.0944, -0.3951, 0.5944],
        ];
        for i in 0..KERNEL_SIZE {
            for j in 0..KERNEL_SIZE {
                assert_relative_eq!(updated[i][j], expected[i][j], epsilon = 1e-12);
                assert!(updated[i][j].abs() <= WEIGHT_LIMIT);
                // Each weight moved by exactly -lr * avg before rounding
                let stepped = SEED_KERNEL[i][j] - config.learning_rate * average[i][j];
                assert_relative_eq!(updated[i][j], round_to(stepped, 4), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_update_clamps_to_weight_limit() {
        let (engine, config) = fixture();
        let training = TrainingLoop::new(&engine, &config);

        let kernel = [[1.9999, -1.9999, 0.0]; 3];
        let huge_gradient = [[-1000.0, 1000.0, 0.0]; 3];
        let updated = training.apply_update(&kernel, &huge_gradient);

        for row in &updated {
            assert_relative_eq!(row[0], WEIGHT_LIMIT);
            assert_relative_eq!(row[1], -WEIGHT_LIMIT);
            assert_relative_eq!(row[2], 0.0);
        }
    }

    // ==================== Evaluation Tests ====================

    #[test]
    fn test_epoch_one_loss_fixture() {
        let (engine, config) = fixture();
        let training = TrainingLoop::new(&engine, &config);

        let accumulator = accumulate_epoch(&training, &SEED_KERNEL);
        let average = training.average_gradient(&accumulator);
        let updated = training.apply_update(&SEED_KERNEL, &average);
        let evaluation = training.evaluate(&updated);

        assert_relative_eq!(evaluation.loss, 0.5249, epsilon = 1e-12);
        assert!(!evaluation.matches_all);
    }

    #[test]
    fn test_matches_all_definition() {
        let (engine, config) = fixture();
        let training = TrainingLoop::new(&engine, &config);

        // The center-only kernel reproduces the input's center 3x3 window,
        // which equals the target for this checkerboard.
        let identity_center = [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]];
        let evaluation = training.evaluate(&identity_center);

        assert!(evaluation.matches_all);
        assert_relative_eq!(evaluation.loss, 0.0);

        // Reference check against the definition itself
        for position in Position::all() {
            let output = engine.display_output(position, &identity_center);
            assert_relative_eq!(round_to(output, 2), training.target_at(position));
        }
    }

    #[test]
    fn test_matches_all_false_when_one_cell_off() {
        let (engine, config) = fixture();
        let training = TrainingLoop::new(&engine, &config);

        // Perturb the center weight enough that rounding to 2 places no
        // longer lands on the integer target.
        let off_center = [[0.0, 0.0, 0.0], [0.0, 0.99, 0.0], [0.0, 0.0, 0.0]];
        let evaluation = training.evaluate(&off_center);

        assert!(!evaluation.matches_all);
        assert!(evaluation.loss > 0.0);
    }
}
