//! Rule evaluation for the notification pipeline.
//!
//! Each [`Evaluator`] consumes aggregate query results and a rule's typed
//! configuration and decides whether the rule fires, producing rendered
//! [`Firing`]s for the dispatcher. Evaluators never deliver anything
//! themselves.

pub mod config;
pub mod error;
pub mod rules;


use async_trait::async_trait;
use beacon_common::{Firing, NotificationRule, RuleType};
use beacon_query::QueryEngine;
use beacon_storage::KnownValueTracker;
use chrono::{DateTime, Utc, Weekday};
use std::collections::HashMap;
use std::sync::Arc;

pub use error::{AlertError, Result};

/// Decides whether rules of one or more types fire at `now`.
///
/// Implementations are registered in an [`EvaluatorRegistry`] under every
/// type returned by `rule_types()`. An `Err` means the rule could not be
/// evaluated this tick (query failure, unusable configuration); the caller
/// logs it and moves on to the next rule.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn rule_types(&self) -> &[RuleType];

    async fn evaluate(&self, rule: &NotificationRule, now: DateTime<Utc>) -> Result<Vec<Firing>>;
}

/// Lookup from rule type to the evaluator that handles it.
#[derive(Clone, Default)]
pub struct EvaluatorRegistry {
    evaluators: HashMap<RuleType, Arc<dyn Evaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the six built-in evaluators covering every rule type.
    pub fn standard(
        query: Arc<dyn QueryEngine>,
        tracker: KnownValueTracker,
        default_weekly_day: Weekday,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(rules::EventPushEvaluator::new(query.clone())));
        registry.register(Arc::new(rules::ThresholdEvaluator::new(query.clone())));
        registry.register(Arc::new(rules::NewValueEvaluator::new(query.clone(), tracker)));
        registry.register(Arc::new(rules::DeadAppEvaluator::new(query.clone())));
        registry.register(Arc::new(rules::VolumeAnomalyEvaluator::new(query.clone())));
        registry.register(Arc::new(rules::DigestEvaluator::new(query, default_weekly_day)));
        registry
    }

    pub fn register(&mut self, evaluator: Arc<dyn Evaluator>) {
        for rule_type in evaluator.rule_types() {
            self.evaluators.insert(*rule_type, evaluator.clone());
        }
    }

    pub fn get(&self, rule_type: RuleType) -> Option<&Arc<dyn Evaluator>> {
        self.evaluators.get(&rule_type)
    }

    pub fn rule_types(&self) -> Vec<RuleType> {
        RuleType::ALL
            .into_iter()
            .filter(|t| self.evaluators.contains_key(t))
            .collect()
    }
}
