//! convlens: a 3x3 convolution filter learning a fixed target map
//!
//! Educational core behind a browser-style visualizer: a single 3x3 kernel
//! slides over a fixed 5x5 binary input and learns, by manual gradient
//! descent, to reproduce a fixed 3x3 target. ReLU is applied only at
//! display/loss time; the learning rule itself is linear.
//!
//! Layout:
//! - [`convolution`]: the pure sliding-window arithmetic
//! - [`training`]: per-epoch gradient math, hyperparameters, pacing
//! - [`session`]: shared state, run lifecycle, cancellation
//! - [`snapshot`]: what the presentation layer consumes
//!
//! ```no_run
//! use convlens::{NullObserver, SleepPacer, TrainingConfig, TrainingSession};
//!
//! let session = TrainingSession::new(TrainingConfig::default());
//! let summary = session.start(&mut NullObserver, &SleepPacer).unwrap();
//! println!("stopped after {} epochs: {:?}", summary.epochs_completed, summary.reason);
//! ```

pub mod convolution;
pub mod session;
pub mod snapshot;
pub mod training;

pub use convolution::{
    ConvolutionEngine, InputMatrix, Matrix3, Position, TargetMatrix, INPUT_SIZE, KERNEL_SIZE,
    NUM_POSITIONS, OUTPUT_SIZE,
};
pub use session::{SessionError, TrainingSession};
pub use snapshot::{EpochSnapshot, NullObserver, RecordingObserver, StepSnapshot, TrainingObserver};
pub use training::{
    EpochEvaluation, NoDelay, Pacer, RunSummary, SleepPacer, StopReason, TrainingConfig,
    TrainingLoop, DEFAULT_INPUT, DEFAULT_TARGET, LEARNING_RATE, MAX_EPOCHS, SEED_KERNEL,
    STEP_DELAY, TARGET_LOSS, WEIGHT_LIMIT,
};
