//! # Greedy Risk-Chain Search
//!
//! A chain is an ordered sequence of `field = value` assignments that, one
//! step at a time, pushes the predicted injury probability as far as possible
//! in one direction: up for the worst chain, down for the best chain.
//!
//! The search is greedy and depth-bounded. At each step it tries every value
//! of every still-unassigned field, keeps the single assignment with the
//! largest directional change, and stops when nothing improves by at least
//! `min_delta` or the depth bound is hit. It is an approximation: it does not
//! guarantee the globally most extreme combination of conditions.
//!
//! Candidates are visited in canonical field order (vehicle, action, borough,
//! hour, day of week) and, within a field, in domain-table order. On an exact
//! score tie the first candidate visited wins, which makes the output fully
//! reproducible.

use crate::config::ChainConfig;
use crate::domains::DomainTable;
use crate::model::{Model, predict};
use crate::record::{Conditions, Field, FieldValue, Record};
use std::fmt;

/// Label of the synthetic first step.
pub const START_LABEL: &str = "Start";

/// Which way a chain pushes the predicted probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Greedily maximize predicted probability.
    Worst,
    /// Greedily minimize predicted probability.
    Best,
}

impl Direction {
    /// Directional score of a probability change; larger is better.
    pub fn score(self, delta: f64) -> f64 {
        match self {
            Self::Worst => delta,
            Self::Best => -delta,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Worst => "worst",
            Self::Best => "best",
        })
    }
}

/// One step of a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainStep {
    pub label: String,
    /// `None` for the Start step.
    pub field: Option<Field>,
    /// `None` for the Start step.
    pub value: Option<FieldValue>,
    /// Predicted probability with every assignment up to and including this step.
    pub probability: f64,
    /// Number of records matching every assignment up to and including this step.
    pub support: usize,
}

impl ChainStep {
    fn start(probability: f64, support: usize) -> Self {
        Self {
            label: START_LABEL.to_string(),
            field: None,
            value: None,
            probability,
            support,
        }
    }

    pub fn is_start(&self) -> bool {
        self.field.is_none()
    }
}

/// Worst and best chains built from the same inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskChains {
    pub worst: Vec<ChainStep>,
    pub best: Vec<ChainStep>,
}

/// Number of records satisfying every constraint in `conditions`. A record
/// with no value on a constrained field never matches.
pub fn support_count(records: &[Record], conditions: &Conditions) -> usize {
    records
        .iter()
        .filter(|record| conditions.is_matched_by(&record.conditions))
        .count()
}

/// Support of `selection` extended by one assignment, without materializing
/// the extended selection. Only records already matching `selection` are
/// passed in.
fn extended_support(matching: &[&Record], field: Field, value: &FieldValue) -> usize {
    matching
        .iter()
        .filter(|record| record.conditions.holds(field, value))
        .count()
}

struct Candidate<'a> {
    field: Field,
    value: &'a FieldValue,
    probability: f64,
    support: usize,
    score: f64,
}

/// Builds one risk chain.
///
/// The returned sequence always starts with the Start step (unconstrained
/// prediction, support equal to the record count) and holds between 1 and
/// `config.max_depth + 1` steps. Without a model the Start probability falls
/// back to a base rate of 0 and the chain ends immediately.
pub fn build_chain(
    records: &[Record],
    model: Option<&Model>,
    domains: &DomainTable,
    direction: Direction,
    config: &ChainConfig,
) -> Vec<ChainStep> {
    let mut selection = Conditions::new();
    let mut current = predict(model, &selection)
        .unwrap_or_else(|| model.map_or(0.0, Model::base_rate));

    // Each field is assigned at most once, so no chain outgrows the field count.
    let mut steps = Vec::with_capacity(config.max_depth.min(Field::ALL.len()) + 1);
    steps.push(ChainStep::start(current, records.len()));

    let mut matching: Vec<&Record> = records.iter().collect();

    for depth in 0..config.max_depth {
        let mut best: Option<Candidate> = None;

        for field in Field::ALL {
            if selection.is_constrained(field) {
                continue;
            }
            for value in domains.values(field) {
                let support = extended_support(&matching, field, value);
                if support < config.min_support {
                    continue;
                }
                let trial = selection.with(field, value.clone());
                let Some(probability) = predict(model, &trial) else {
                    continue;
                };
                let score = direction.score(probability - current);
                if best.as_ref().is_none_or(|b| score > b.score) {
                    best = Some(Candidate {
                        field,
                        value,
                        probability,
                        support,
                        score,
                    });
                }
            }
        }

        let Some(winner) = best else {
            log::debug!("{direction} chain: no eligible candidate at depth {depth}.");
            break;
        };
        if winner.score < config.min_delta {
            log::debug!(
                "{direction} chain: best improvement {:.6} below {:.6} at depth {depth}.",
                winner.score,
                config.min_delta
            );
            break;
        }

        selection.set(winner.field, winner.value.clone());
        matching.retain(|record| record.conditions.holds(winner.field, winner.value));
        current = winner.probability;
        steps.push(ChainStep {
            label: format!(
                "{}: {}",
                winner.field.describe(),
                winner.field.format_value(winner.value)
            ),
            field: Some(winner.field),
            value: Some(winner.value.clone()),
            probability: winner.probability,
            support: winner.support,
        });
    }

    log::debug!(
        "{direction} chain finished with {} steps, final probability {:.4}.",
        steps.len(),
        current
    );
    steps
}

/// Builds the worst and the best chain.
pub fn build_chains(
    records: &[Record],
    model: Option<&Model>,
    domains: &DomainTable,
    config: &ChainConfig,
) -> RiskChains {
    RiskChains {
        worst: build_chain(records, model, domains, Direction::Worst, config),
        best: build_chain(records, model, domains, Direction::Best, config),
    }
}
