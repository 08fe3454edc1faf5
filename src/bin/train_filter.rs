//! Headless training run, standing in for the presentation adapter
//!
//! Runs one session to a terminal state and prints per-epoch loss lines.
//!
//! Options:
//!   --delay=MS        Inter-step pause in milliseconds (default: 150, 0 for instant)
//!   --max-epochs=N    Epoch cap (default: 100)
//!   --quiet           Epoch lines only, no per-step output
//!   --json            Emit the final epoch snapshot as JSON on exit

use convlens::{
    EpochSnapshot, SleepPacer, StepSnapshot, TrainingConfig, TrainingObserver, TrainingSession,
};
use std::time::Duration;

/// Prints training progress to stdout
struct ConsoleObserver {
    quiet: bool,
    last_epoch: Option<EpochSnapshot>,
}

impl TrainingObserver for ConsoleObserver {
    fn on_step(&mut self, snapshot: &StepSnapshot) {
        if !self.quiet {
            println!(
                "  step {}/9 at ({}, {}): raw {:+.4}, error {:+.4}",
                snapshot.position_index + 1,
                snapshot.position.row,
                snapshot.position.col,
                snapshot.raw_output,
                snapshot.error
            );
        }
    }

    fn on_epoch(&mut self, snapshot: &EpochSnapshot) {
        println!(
            "Pass {}, Loss: {}, Matches All: {}",
            snapshot.epoch, snapshot.loss, snapshot.matches_all
        );
        self.last_epoch = Some(snapshot.clone());
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let quiet = args.iter().any(|a| a == "--quiet");
    let emit_json = args.iter().any(|a| a == "--json");

    let delay_ms: Option<u64> = args
        .iter()
        .find(|a| a.starts_with("--delay="))
        .and_then(|a| a.strip_prefix("--delay="))
        .and_then(|s| s.parse().ok());

    let max_epochs: Option<usize> = args
        .iter()
        .find(|a| a.starts_with("--max-epochs="))
        .and_then(|a| a.strip_prefix("--max-epochs="))
        .and_then(|s| s.parse().ok());

    let mut config = TrainingConfig::default();
    if let Some(ms) = delay_ms {
        config.step_delay = Duration::from_millis(ms);
    }
    if let Some(cap) = max_epochs {
        config.max_epochs = cap;
    }

    println!("=== convlens: training a 3x3 filter ===");
    println!(
        "learning rate {}, max epochs {}, target loss {}, step delay {:?}\n",
        config.learning_rate, config.max_epochs, config.target_loss, config.step_delay
    );

    let session = TrainingSession::new(config);
    let mut observer = ConsoleObserver {
        quiet,
        last_epoch: None,
    };

    let summary = session
        .start(&mut observer, &SleepPacer)
        .expect("fresh session has no active loop");

    println!(
        "\nStopped: {:?} after {} epochs{}",
        summary.reason,
        summary.epochs_completed,
        summary
            .final_loss
            .map(|loss| format!(", final loss {}", loss))
            .unwrap_or_default()
    );

    println!("Final kernel:");
    for row in session.kernel() {
        println!(
            "  [{}]",
            row.iter()
                .map(|w| format!("{:+.4}", w))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    if emit_json {
        if let Some(last) = &observer.last_epoch {
            match serde_json::to_string_pretty(last) {
                Ok(json) => println!("{}", json),
                Err(err) => log::error!("failed to serialize snapshot: {}", err),
            }
        }
    }
}
