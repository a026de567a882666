use crate::config::{ScheduleConfig, ServerConfig};
use crate::state::AppState;
use anyhow::Context;
use beacon_alert::{AlertError, EvaluatorRegistry};
use beacon_common::RuleType;
use beacon_notify::{DispatchOutcome, Dispatcher};
use beacon_storage::NotificationStore;
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Rules driven by raw event activity, evaluated every few minutes.
pub const EVENT_RULE_TYPES: [RuleType; 5] = [
    RuleType::EventPush,
    RuleType::Threshold,
    RuleType::NewEventName,
    RuleType::NewAppVersion,
    RuleType::NewCountry,
];

pub const HEALTH_RULE_TYPES: [RuleType; 2] = [RuleType::DeadApp, RuleType::VolumeAnomaly];

pub const DIGEST_RULE_TYPES: [RuleType; 1] = [RuleType::ScheduledDigest];

/// Counters for one tick, logged when the tick ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub rules: usize,
    pub failed_rules: usize,
    pub firings: usize,
    pub delivered: usize,
    pub suppressed: usize,
}

impl TickSummary {
    fn record(&mut self, outcome: DispatchOutcome) {
        self.firings += 1;
        match outcome {
            DispatchOutcome::Attempted { delivered, .. } => self.delivered += delivered,
            DispatchOutcome::Duplicate
            | DispatchOutcome::RateLimited { .. }
            | DispatchOutcome::CheckFailed => self.suppressed += 1,
        }
    }
}

/// One cron-driven loop over the enabled rules of a fixed set of types.
///
/// Ticks of the same scheduler never overlap: the next wait starts only
/// after the previous tick finished. Separate schedulers run as separate
/// tasks and may overlap freely.
pub struct AlertScheduler {
    name: &'static str,
    schedule: Schedule,
    rule_types: Vec<RuleType>,
    store: Arc<dyn NotificationStore>,
    evaluators: Arc<EvaluatorRegistry>,
    dispatcher: Arc<Dispatcher>,
}

impl AlertScheduler {
    pub fn new(
        name: &'static str,
        cron_expr: &str,
        rule_types: &[RuleType],
        state: &AppState,
    ) -> anyhow::Result<Self> {
        let schedule = Schedule::from_str(cron_expr)
            .with_context(|| format!("Invalid cron expression '{cron_expr}' for {name} scheduler"))?;
        Ok(Self {
            name,
            schedule,
            rule_types: rule_types.to_vec(),
            store: state.store.clone(),
            evaluators: state.evaluators.clone(),
            dispatcher: state.dispatcher.clone(),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn rule_types(&self) -> &[RuleType] {
        &self.rule_types
    }

    /// Next fire time strictly after `after`.
    pub fn next_tick_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Waits for each cron fire time and runs a tick, until `cancel` fires.
    ///
    /// Each tick runs in its own task so a panic inside an evaluator or an
    /// adapter is logged and the loop keeps going. Cancellation is observed
    /// only while waiting; a tick in progress is allowed to finish.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            scheduler = self.name,
            rule_types = ?self.rule_types,
            "Alert scheduler started"
        );

        loop {
            let Some(next) = self.next_tick_after(Utc::now()) else {
                tracing::warn!(scheduler = self.name, "Cron schedule has no upcoming fire time");
                break;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or_default();

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            let this = self.clone();
            let handle = tokio::spawn(async move { this.run_tick(Utc::now()).await });
            match handle.await {
                Ok(Ok(summary)) => {
                    tracing::info!(
                        scheduler = self.name,
                        rules = summary.rules,
                        failed_rules = summary.failed_rules,
                        firings = summary.firings,
                        delivered = summary.delivered,
                        suppressed = summary.suppressed,
                        "Scheduler tick completed"
                    );
                }
                Ok(Err(e)) => {
                    tracing::error!(scheduler = self.name, error = %e, "Scheduler tick failed");
                }
                Err(e) => {
                    tracing::error!(scheduler = self.name, error = %e, "Scheduler tick task panicked");
                }
            }
        }

        tracing::info!(scheduler = self.name, "Alert scheduler stopped");
    }

    /// Evaluates every enabled rule of this scheduler's types once.
    ///
    /// A rule that fails to evaluate is logged and counted; the remaining
    /// rules still run. Only failing to load the batch fails the tick.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> anyhow::Result<TickSummary> {
        let rules = self
            .store
            .enabled_rules_by_type(&self.rule_types)
            .context("Failed to load enabled rules")?;

        let mut summary = TickSummary {
            rules: rules.len(),
            ..TickSummary::default()
        };
        if rules.is_empty() {
            tracing::debug!(scheduler = self.name, "No enabled rules, skipping tick");
            return Ok(summary);
        }

        for rule in &rules {
            let Some(evaluator) = self.evaluators.get(rule.rule_type) else {
                tracing::warn!(
                    rule_id = %rule.id,
                    rule_type = %rule.rule_type,
                    "No evaluator registered for rule type"
                );
                summary.failed_rules += 1;
                continue;
            };

            let firings = match evaluator.evaluate(rule, now).await {
                Ok(firings) => firings,
                Err(e @ AlertError::InvalidConfig { .. }) => {
                    tracing::warn!(rule_id = %rule.id, error = %e, "Skipping rule with unusable config");
                    summary.failed_rules += 1;
                    continue;
                }
                Err(e) => {
                    tracing::error!(
                        rule_id = %rule.id,
                        app_id = %rule.app_id,
                        rule_type = %rule.rule_type,
                        error = %e,
                        "Rule evaluation failed"
                    );
                    summary.failed_rules += 1;
                    continue;
                }
            };

            for firing in &firings {
                let outcome = self.dispatcher.dispatch(rule, firing, now).await;
                summary.record(outcome);
            }
        }

        Ok(summary)
    }
}

/// Builds the enabled schedulers from configuration, in the order events,
/// health, digest.
pub fn build_schedulers(
    config: &ServerConfig,
    state: &AppState,
) -> anyhow::Result<Vec<Arc<AlertScheduler>>> {
    let specs: [(&'static str, &ScheduleConfig, &[RuleType]); 3] = [
        ("events", &config.schedulers.events, &EVENT_RULE_TYPES),
        ("health", &config.schedulers.health, &HEALTH_RULE_TYPES),
        ("digest", &config.schedulers.digest, &DIGEST_RULE_TYPES),
    ];

    let mut schedulers = Vec::new();
    for (name, schedule, rule_types) in specs {
        if !schedule.enabled {
            tracing::info!(scheduler = name, "Scheduler disabled by configuration");
            continue;
        }
        schedulers.push(Arc::new(AlertScheduler::new(
            name,
            &schedule.cron,
            rule_types,
            state,
        )?));
    }
    Ok(schedulers)
}
