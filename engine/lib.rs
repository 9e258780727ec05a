#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

//! Injury-risk estimation for traffic collisions.
//!
//! Records are hashed into a fixed-size feature space, an online logistic
//! regression is fitted by stochastic gradient descent, and a greedy search
//! walks the fitted model to find the combinations of conditions that raise
//! or lower the predicted injury probability the most.

pub mod chain;
pub mod config;
pub mod data;
pub mod diagnostics;
pub mod domains;
pub mod hashing;
pub mod model;
pub mod progress;
pub mod record;
pub mod session;
pub mod train;
