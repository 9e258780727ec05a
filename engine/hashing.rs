//! # Feature Hashing
//!
//! Every categorical observation is projected into a fixed number of buckets
//! instead of a growing vocabulary. A feature is a `field=value` key (or a
//! two-way interaction key); its bucket is a 32-bit rolling hash of the key
//! bytes reduced modulo the model dimension. Distinct keys may share a bucket.
//! That costs some discriminative power and never causes an error.

use crate::record::{Conditions, Field, FieldValue};

/// Default number of hash buckets.
pub const DEFAULT_DIMENSION: usize = 1024;

/// Multiplier of the rolling string hash.
const HASH_MULTIPLIER: i32 = 31;

/// Two-way interactions emitted when both constituent fields are present.
pub const INTERACTIONS: [(Field, Field); 3] = [
    (Field::PreCrash, Field::Hour),
    (Field::PreCrash, Field::DayOfWeek),
    (Field::VehicleType, Field::PreCrash),
];

/// Maps a feature key to a bucket in `[0, dimension)`.
///
/// The hash is `h = h * 31 + byte` over the UTF-8 bytes with 32-bit
/// two's-complement wrapping, followed by a Euclidean remainder so negative
/// hashes still land in range. The result depends only on the key and the
/// dimension, so it is stable across runs, processes and platforms.
///
/// A zero dimension is treated as one bucket.
pub fn hash_key(key: &str, dimension: usize) -> usize {
    let mut hash: i32 = 0;
    for byte in key.bytes() {
        hash = hash
            .wrapping_mul(HASH_MULTIPLIER)
            .wrapping_add(i32::from(byte));
    }
    let modulus = dimension.max(1) as i64;
    i64::from(hash).rem_euclid(modulus) as usize
}

/// Value of a field as it appears in a feature key, or `None` when the field
/// is absent or carries the `Unspecified` placeholder.
fn active_value(conditions: &Conditions, field: Field) -> Option<FieldValue> {
    conditions
        .get(field)
        .filter(|value| !value.is_unspecified())
}

/// Builds the feature keys for a record or partial query.
///
/// Single-field keys come first in canonical field order, followed by the
/// interaction keys in `INTERACTIONS` order.
pub fn feature_keys(conditions: &Conditions) -> Vec<String> {
    let mut keys = Vec::with_capacity(Field::ALL.len() + INTERACTIONS.len());

    for field in Field::ALL {
        if let Some(value) = active_value(conditions, field) {
            keys.push(format!("{}={}", field.key(), value));
        }
    }

    for (left, right) in INTERACTIONS {
        if let (Some(a), Some(b)) = (
            active_value(conditions, left),
            active_value(conditions, right),
        ) {
            keys.push(format!("{}&{}={}|{}", left.key(), right.key(), a, b));
        }
    }

    keys
}

/// The active bucket indices for `conditions`.
///
/// Keys that collide yield repeated indices. The repeats are kept on purpose:
/// training and prediction accumulate over every occurrence.
pub fn feature_indices(conditions: &Conditions, dimension: usize) -> Vec<usize> {
    feature_keys(conditions)
        .iter()
        .map(|key| hash_key(key, dimension))
        .collect()
}
