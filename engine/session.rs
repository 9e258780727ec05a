//! Per-view engine state.
//!
//! A `RiskSession` owns one record set together with everything derived
//! from it: the trained model and the two domain tables. Derived state is
//! built lazily on first use and dropped whenever the record set is
//! replaced. Callers keep one session per view instead of sharing global
//! caches keyed by view identifiers.

use crate::chain::{ChainStep, Direction, RiskChains, build_chain, build_chains};
use crate::config::EngineConfig;
use crate::domains::DomainTable;
use crate::model::{Model, predict};
use crate::progress::{NoopTrainingProgress, TrainingProgressObserver};
use crate::record::{Conditions, Record};
use crate::train::train_with_progress;
use std::fmt;
use std::sync::OnceLock;

/// A point estimate, or the explicit absence of one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate {
    Probability(f64),
    NotEnoughData,
}

impl Estimate {
    pub fn probability(self) -> Option<f64> {
        match self {
            Self::Probability(p) => Some(p),
            Self::NotEnoughData => None,
        }
    }
}

impl From<Option<f64>> for Estimate {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::NotEnoughData, Self::Probability)
    }
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Probability(p) => write!(f, "{:.1}%", p * 100.0),
            Self::NotEnoughData => f.write_str("not enough data"),
        }
    }
}

pub struct RiskSession {
    config: EngineConfig,
    records: Vec<Record>,
    model: OnceLock<Option<Model>>,
    chain_domains: OnceLock<DomainTable>,
    display_domains: OnceLock<DomainTable>,
}

impl RiskSession {
    pub fn new(config: EngineConfig, records: Vec<Record>) -> Self {
        Self {
            config,
            records,
            model: OnceLock::new(),
            chain_domains: OnceLock::new(),
            display_domains: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Swaps in a different record set and discards every derived artifact.
    pub fn replace_records(&mut self, records: Vec<Record>) {
        log::debug!(
            "Replacing {} records with {}; derived state invalidated.",
            self.records.len(),
            records.len()
        );
        self.records = records;
        self.model.take();
        self.chain_domains.take();
        self.display_domains.take();
    }

    /// The trained model, training on first access. `None` when the record
    /// set is empty.
    pub fn model(&self) -> Option<&Model> {
        self.model
            .get_or_init(|| self.fit(&mut NoopTrainingProgress))
            .as_ref()
    }

    /// Like [`RiskSession::model`], reporting progress if training happens now.
    pub fn model_with_progress(
        &self,
        observer: &mut dyn TrainingProgressObserver,
    ) -> Option<&Model> {
        self.model.get_or_init(|| self.fit(observer)).as_ref()
    }

    fn fit(&self, observer: &mut dyn TrainingProgressObserver) -> Option<Model> {
        train_with_progress(
            &self.records,
            self.config.hashing.dimension,
            &self.config.training,
            observer,
        )
    }

    /// Domains used by chain search (chain domain cap).
    pub fn chain_domains(&self) -> &DomainTable {
        self.chain_domains
            .get_or_init(|| DomainTable::build(&self.records, self.config.chain.domain_cap))
    }

    /// Domains offered for interactive selection (display domain cap).
    pub fn display_domains(&self) -> &DomainTable {
        self.display_domains
            .get_or_init(|| DomainTable::build(&self.records, self.config.display.domain_cap))
    }

    pub fn estimate(&self, query: &Conditions) -> Estimate {
        predict(self.model(), query).into()
    }

    pub fn chain(&self, direction: Direction) -> Vec<ChainStep> {
        build_chain(
            &self.records,
            self.model(),
            self.chain_domains(),
            direction,
            &self.config.chain,
        )
    }

    pub fn chains(&self) -> RiskChains {
        build_chains(
            &self.records,
            self.model(),
            self.chain_domains(),
            &self.config.chain,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Field;

    fn records(count: usize) -> Vec<Record> {
        (0..count)
            .map(|i| {
                Record::new(
                    Conditions {
                        borough: Some(if i % 2 == 0 { "QUEENS" } else { "BRONX" }.to_string()),
                        ..Conditions::default()
                    },
                    i % 3 == 0,
                )
            })
            .collect()
    }

    #[test]
    fn empty_session_reports_not_enough_data() {
        let session = RiskSession::new(EngineConfig::default(), Vec::new());
        assert!(session.model().is_none());
        let estimate = session.estimate(&Conditions::new());
        assert_eq!(estimate, Estimate::NotEnoughData);
        assert_eq!(estimate.to_string(), "not enough data");

        let chains = session.chains();
        assert_eq!(chains.worst.len(), 1);
        assert_eq!(chains.best.len(), 1);
        assert_eq!(chains.worst[0].support, 0);
    }

    #[test]
    fn replacing_records_invalidates_derived_state() {
        let mut session = RiskSession::new(EngineConfig::default(), records(10));
        let before = session.model().expect("model").clone();
        assert_eq!(session.display_domains().values(Field::Borough).len(), 2);

        session.replace_records(records(9));
        let after = session.model().expect("model");
        assert_ne!(before.base_rate(), after.base_rate());

        session.replace_records(Vec::new());
        assert!(session.model().is_none());
        assert!(session.display_domains().is_empty());
    }

    #[test]
    fn estimate_formats_as_percentage() {
        assert_eq!(Estimate::Probability(0.1234).to_string(), "12.3%");
        assert_eq!(Estimate::from(Some(0.5)).probability(), Some(0.5));
    }
}
