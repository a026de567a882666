use crate::management::{ChannelPatch, NotificationService, RulePatch};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ---- Seed file types (used by the `init` CLI subcommand) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedFile {
    pub app_id: String,
    #[serde(default)]
    pub channels: Vec<SeedChannel>,
    #[serde(default)]
    pub rules: Vec<SeedRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedChannel {
    pub name: String,
    pub channel_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub config: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRule {
    pub rule_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub config: Value,
    /// Channel names, resolved against the app's channels after the seed's
    /// own channels are created.
    #[serde(default)]
    pub channels: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub channels_created: u32,
    pub channels_skipped: u32,
    pub rules_created: u32,
    pub rules_skipped: u32,
}

pub fn load_seed(path: &str) -> anyhow::Result<SeedFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read seed file '{}': {}", path, e))?;
    let seed: SeedFile = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{}': {}", path, e))?;
    Ok(seed)
}

/// Creates the seed's channels and rules for its app.
///
/// Channels whose name already exists for the app are skipped, and so are
/// rules identical in type and config to an existing rule, so the import
/// can be re-run. Individual failures are logged and do not stop the import.
pub fn apply_seed(service: &NotificationService, seed: &SeedFile) -> anyhow::Result<SeedReport> {
    let app_id = seed.app_id.as_str();
    let mut report = SeedReport::default();

    let mut channel_ids: HashMap<String, String> = service
        .list_channels(app_id)?
        .into_iter()
        .map(|ch| (ch.name, ch.id))
        .collect();

    for ch in &seed.channels {
        if channel_ids.contains_key(&ch.name) {
            tracing::warn!(name = %ch.name, "Channel already exists, skipping");
            report.channels_skipped += 1;
            continue;
        }

        match service.create_channel(app_id, &ch.name, &ch.channel_type, &ch.config) {
            Ok(created) => {
                if !ch.enabled {
                    let patch = ChannelPatch {
                        enabled: Some(false),
                        ..ChannelPatch::default()
                    };
                    if let Err(e) = service.update_channel(app_id, &created.id, patch) {
                        tracing::warn!(name = %ch.name, error = %e, "Failed to disable channel");
                    }
                }
                tracing::info!(name = %ch.name, id = %created.id, "Channel created");
                channel_ids.insert(created.name, created.id);
                report.channels_created += 1;
            }
            Err(e) => {
                tracing::error!(name = %ch.name, error = %e, "Failed to create channel");
            }
        }
    }

    let existing_rules = service.list_rules(app_id)?;

    for r in &seed.rules {
        let duplicate = existing_rules.iter().any(|existing| {
            existing.rule_type.as_str() == r.rule_type && existing.config_value() == r.config
        });
        if duplicate {
            tracing::warn!(rule_type = %r.rule_type, "Identical rule already exists, skipping");
            report.rules_skipped += 1;
            continue;
        }

        let mut ids = Vec::with_capacity(r.channels.len());
        for name in &r.channels {
            match channel_ids.get(name) {
                Some(id) => ids.push(id.clone()),
                None => {
                    tracing::warn!(rule_type = %r.rule_type, channel = %name, "Unknown channel name in seed rule");
                }
            }
        }

        match service.create_rule(app_id, &r.rule_type, &r.config, ids) {
            Ok(created) => {
                if !r.enabled {
                    let patch = RulePatch {
                        enabled: Some(false),
                        ..RulePatch::default()
                    };
                    if let Err(e) = service.update_rule(app_id, &created.id, patch) {
                        tracing::warn!(rule_id = %created.id, error = %e, "Failed to disable rule");
                    }
                }
                tracing::info!(rule_type = %r.rule_type, id = %created.id, "Rule created");
                report.rules_created += 1;
            }
            Err(e) => {
                tracing::error!(rule_type = %r.rule_type, error = %e, "Failed to create rule");
            }
        }
    }

    tracing::info!(
        app_id,
        channels_created = report.channels_created,
        channels_skipped = report.channels_skipped,
        rules_created = report.rules_created,
        rules_skipped = report.rules_skipped,
        "init completed"
    );
    Ok(report)
}
