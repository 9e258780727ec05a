//! In-sample fit diagnostics for a trained model.
//!
//! These are summaries for a human reading the training log, not a
//! validation protocol: they are computed on the same records the model was
//! trained on.

use crate::model::Model;
use crate::record::Record;
use std::fmt;

/// Probabilities are pulled this far away from 0 and 1 before taking logs.
const LOG_LOSS_GUARD: f64 = 1e-15;

/// Negative log-likelihood of one binary outcome under probability `p`.
pub fn log_loss_term(p: f64, injured: bool) -> f64 {
    let p = p.clamp(LOG_LOSS_GUARD, 1.0 - LOG_LOSS_GUARD);
    if injured { -p.ln() } else { -(1.0 - p).ln() }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    pub records: usize,
    /// Fraction of records labelled injured.
    pub observed_rate: f64,
    pub mean_prediction: f64,
    pub log_loss: f64,
    pub brier_score: f64,
    /// Fraction of records on the correct side of 0.5.
    pub accuracy: f64,
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Records evaluated: {}", self.records)?;
        writeln!(
            f,
            "Observed injury rate: {:.4} | mean prediction: {:.4}",
            self.observed_rate, self.mean_prediction
        )?;
        write!(
            f,
            "Log loss: {:.5} | Brier score: {:.5} | accuracy: {:.4}",
            self.log_loss, self.brier_score, self.accuracy
        )
    }
}

/// Evaluates `model` on `records`. Returns `None` for an empty record set.
pub fn evaluate(model: &Model, records: &[Record]) -> Option<Evaluation> {
    if records.is_empty() {
        return None;
    }

    let predictions = model.predict_many(records);
    let n = records.len() as f64;

    let mut injured = 0usize;
    let mut log_loss = 0.0;
    let mut brier = 0.0;
    let mut correct = 0usize;
    for (record, &p) in records.iter().zip(&predictions) {
        let y = record.label();
        if record.injured {
            injured += 1;
        }
        log_loss += log_loss_term(p, record.injured);
        brier += (p - y) * (p - y);
        if (p >= 0.5) == record.injured {
            correct += 1;
        }
    }

    Some(Evaluation {
        records: records.len(),
        observed_rate: injured as f64 / n,
        mean_prediction: predictions.iter().sum::<f64>() / n,
        log_loss: log_loss / n,
        brier_score: brier / n,
        accuracy: correct as f64 / n,
    })
}
