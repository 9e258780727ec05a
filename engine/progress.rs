//! Progress reporting hooks for model training.

use std::fmt;

/// Summary of one completed training epoch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpochSummary {
    /// Zero-based epoch index.
    pub epoch: usize,
    pub learning_rate: f64,
    /// Mean log loss of the predictions made before each update in the epoch.
    pub mean_log_loss: f64,
}

impl fmt::Display for EpochSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "epoch {} (learning rate {:.4}): mean log loss {:.5}",
            self.epoch + 1,
            self.learning_rate,
            self.mean_log_loss
        )
    }
}

/// Observer for reporting incremental progress while training a model.
pub trait TrainingProgressObserver {
    fn on_training_start(&mut self, total_records: usize, epochs: usize) {
        let _ = (total_records, epochs);
    }
    fn on_epoch_advance(&mut self, epoch: usize, processed_records: usize) {
        let _ = (epoch, processed_records);
    }
    fn on_epoch_finish(&mut self, summary: &EpochSummary) {
        let _ = summary;
    }
    fn on_training_finish(&mut self) {}
}

#[derive(Default)]
pub struct NoopTrainingProgress;

impl TrainingProgressObserver for NoopTrainingProgress {}
