use crate::hashing::feature_indices;
use crate::record::{Conditions, Record};
use ndarray::Array1;
use rayon::prelude::*;

/// Bound applied to the linear predictor before exponentiating.
pub const LOGIT_CLAMP: f64 = 30.0;

/// A trained hashed-feature logistic regression.
///
/// Created once per training run and never mutated afterwards; it is
/// `Send + Sync` and can be shared by any number of concurrent readers.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub(crate) dimension: usize,
    /// One weight per hash bucket.
    pub(crate) weights: Array1<f64>,
    pub(crate) bias: f64,
    /// Fraction of injured records in the training set.
    pub(crate) base_rate: f64,
}

impl Model {
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn base_rate(&self) -> f64 {
        self.base_rate
    }

    /// Number of buckets holding a non-zero weight.
    pub fn active_buckets(&self) -> usize {
        self.weights.iter().filter(|w| **w != 0.0).count()
    }

    /// `bias + sum(weights[idx])` over the active features of `query`,
    /// counting repeated indices once per occurrence.
    pub fn linear_predictor(&self, query: &Conditions) -> f64 {
        feature_indices(query, self.dimension)
            .into_iter()
            .fold(self.bias, |z, idx| z + self.weights[idx])
    }

    /// Probability that a collision matching `query` involved an injury.
    /// Always within `[0, 1]`.
    pub fn predict(&self, query: &Conditions) -> f64 {
        probability(self.linear_predictor(query))
    }

    /// Predictions for a batch of records, in input order.
    pub fn predict_many(&self, records: &[Record]) -> Vec<f64> {
        records
            .par_iter()
            .map(|record| self.predict(&record.conditions))
            .collect()
    }
}

/// Predicts with an optional model. `None` means no estimator is available,
/// e.g. because training saw no records.
pub fn predict(model: Option<&Model>, query: &Conditions) -> Option<f64> {
    model.map(|m| m.predict(query))
}

/// Logistic function with the argument clamped to `[-LOGIT_CLAMP, LOGIT_CLAMP]`.
/// A NaN argument is treated as zero.
pub fn sigmoid(z: f64) -> f64 {
    let z = if z.is_nan() {
        0.0
    } else {
        z.clamp(-LOGIT_CLAMP, LOGIT_CLAMP)
    };
    1.0 / (1.0 + (-z).exp())
}

/// Maps a linear predictor to a probability, enforcing `[0, 1]` at the boundary.
pub fn probability(z: f64) -> f64 {
    sigmoid(z).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::hash_key;
    use approx::assert_abs_diff_eq;

    fn model_with(dimension: usize, bias: f64, entries: &[(&str, f64)]) -> Model {
        let mut weights = Array1::zeros(dimension);
        for (key, weight) in entries {
            weights[hash_key(key, dimension)] += *weight;
        }
        Model {
            dimension,
            weights,
            bias,
            base_rate: 0.5,
        }
    }

    #[test]
    fn sigmoid_is_bounded_and_finite() {
        for z in [
            f64::NEG_INFINITY,
            -1e300,
            -31.0,
            0.0,
            31.0,
            1e300,
            f64::INFINITY,
            f64::NAN,
        ] {
            let p = probability(z);
            assert!(p.is_finite());
            assert!((0.0..=1.0).contains(&p));
        }
        assert_abs_diff_eq!(sigmoid(0.0), 0.5);
        assert_abs_diff_eq!(sigmoid(f64::NAN), 0.5);
        assert_eq!(sigmoid(1e6), sigmoid(LOGIT_CLAMP));
    }

    #[test]
    fn linear_predictor_sums_active_weights() {
        let model = model_with(4096, -1.0, &[("vehicleType=Bus", 0.5), ("hour=8", 0.25)]);
        let query = Conditions {
            vehicle_type: Some("Bus".to_string()),
            hour: Some(8),
            ..Conditions::default()
        };
        assert_abs_diff_eq!(model.linear_predictor(&query), -0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(model.linear_predictor(&Conditions::new()), -1.0);
    }

    #[test]
    fn repeated_buckets_accumulate() {
        let mut weights = Array1::zeros(1);
        weights[0] = 0.5;
        let model = Model {
            dimension: 1,
            weights,
            bias: 0.0,
            base_rate: 0.5,
        };
        let query = Conditions {
            vehicle_type: Some("Bus".to_string()),
            borough: Some("BRONX".to_string()),
            ..Conditions::default()
        };
        assert_abs_diff_eq!(model.linear_predictor(&query), 1.0);
    }

    #[test]
    fn absent_model_has_no_estimate() {
        assert_eq!(predict(None, &Conditions::new()), None);
        let model = model_with(8, 0.0, &[]);
        assert_eq!(predict(Some(&model), &Conditions::new()), Some(0.5));
    }

    #[test]
    fn extreme_weights_still_give_probabilities() {
        let model = model_with(64, 1e308, &[("borough=QUEENS", 1e308)]);
        let query = Conditions {
            borough: Some("QUEENS".to_string()),
            ..Conditions::default()
        };
        let p = model.predict(&query);
        assert!(p.is_finite());
        assert!(p <= 1.0);
    }
}
