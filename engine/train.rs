//! # Online Training by Stochastic Gradient Descent
//!
//! The estimator is a logistic regression over hashed features, fitted one
//! record at a time:
//!
//! 1.  The bias starts at the log-odds of the base rate (epsilon-guarded, so a
//!     base rate of exactly 0 or 1 stays finite) and all weights start at zero.
//!
//! 2.  Each epoch walks the records in the order supplied, without shuffling.
//!     For each record the gradient of the log loss with respect to the linear
//!     predictor is `p - y`. The bias takes a plain gradient step and every
//!     active weight takes a combined decay-and-gradient step
//!     `w = w * (1 - lr * lambda) - lr * (p - y)`.
//!
//! 3.  The learning rate decays per epoch as `lr0 / (1 + epoch)`.
//!
//! Given the same records in the same order and the same hyperparameters the
//! result is bit-for-bit reproducible.

use crate::config::TrainingConfig;
use crate::diagnostics::log_loss_term;
use crate::hashing::feature_indices;
use crate::model::{Model, sigmoid};
use crate::progress::{EpochSummary, NoopTrainingProgress, TrainingProgressObserver};
use crate::record::Record;
use ndarray::Array1;
use rayon::prelude::*;

/// Guard added to both sides of the base-rate odds ratio.
pub const BASE_RATE_EPSILON: f64 = 1e-6;

/// Records between two progress notifications.
const PROGRESS_STRIDE: usize = 4096;

/// Log-odds of `rate`, with the epsilon guard on both sides of the ratio.
pub fn guarded_logit(rate: f64) -> f64 {
    ((rate + BASE_RATE_EPSILON) / (1.0 - rate + BASE_RATE_EPSILON)).ln()
}

/// Trains a model on `records`.
///
/// Returns `None` when there is nothing to learn from (no records) or the
/// dimension is zero. Callers treat that as "no estimator available".
pub fn train(records: &[Record], dimension: usize, config: &TrainingConfig) -> Option<Model> {
    train_with_progress(records, dimension, config, &mut NoopTrainingProgress)
}

/// Same as [`train`], reporting progress to `observer`.
pub fn train_with_progress(
    records: &[Record],
    dimension: usize,
    config: &TrainingConfig,
    observer: &mut dyn TrainingProgressObserver,
) -> Option<Model> {
    if records.is_empty() {
        log::warn!("No records supplied; no model will be trained.");
        return None;
    }
    if dimension == 0 {
        log::warn!("Hash dimension is zero; no model will be trained.");
        return None;
    }

    let injured = records.iter().filter(|r| r.injured).count();
    let base_rate = injured as f64 / records.len() as f64;
    let mut bias = guarded_logit(base_rate);
    let mut weights = Array1::<f64>::zeros(dimension);

    log::info!(
        "Starting SGD training: {} records, base rate {:.4}, dimension {}, {} epochs, lr0 {}, l2 {}",
        records.len(),
        base_rate,
        dimension,
        config.epochs,
        config.learning_rate,
        config.l2_lambda
    );

    // Feature indices do not change between epochs; encode each record once.
    let encoded: Vec<Vec<usize>> = records
        .par_iter()
        .map(|record| feature_indices(&record.conditions, dimension))
        .collect();

    observer.on_training_start(records.len(), config.epochs);

    for epoch in 0..config.epochs {
        let lr = config.learning_rate / (1.0 + epoch as f64);
        let decay = 1.0 - lr * config.l2_lambda;
        let mut loss_sum = 0.0;

        for (position, (record, indices)) in records.iter().zip(&encoded).enumerate() {
            let z = indices.iter().fold(bias, |acc, &idx| acc + weights[idx]);
            let p = sigmoid(z);
            let gradient = p - record.label();
            loss_sum += log_loss_term(p, record.injured);

            bias -= lr * gradient;
            for &idx in indices {
                weights[idx] = weights[idx] * decay - lr * gradient;
            }

            let processed = position + 1;
            if processed % PROGRESS_STRIDE == 0 {
                observer.on_epoch_advance(epoch, processed);
            }
        }

        let summary = EpochSummary {
            epoch,
            learning_rate: lr,
            mean_log_loss: loss_sum / records.len() as f64,
        };
        log::debug!("Finished {summary}");
        observer.on_epoch_advance(epoch, records.len());
        observer.on_epoch_finish(&summary);
    }

    observer.on_training_finish();

    let model = Model {
        dimension,
        weights,
        bias,
        base_rate,
    };
    log::info!(
        "Training complete: bias {:.5}, {} of {} buckets active.",
        model.bias,
        model.active_buckets(),
        dimension
    );
    Some(model)
}
