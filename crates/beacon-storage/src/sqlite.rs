use crate::error::{Result, StorageError};
use crate::{ChannelUpdate, NewChannel, NewRule, NotificationStore, RuleUpdate};
use beacon_common::{
    KnownValue, NotificationChannel, NotificationLogEntry, NotificationLogView, NotificationRule,
    RuleType, ValueType,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Params, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS notification_channels (
    id TEXT PRIMARY KEY,
    app_id TEXT NOT NULL,
    name TEXT NOT NULL,
    channel_type TEXT NOT NULL,
    config_json TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notification_channels_app_id
    ON notification_channels(app_id);

CREATE TABLE IF NOT EXISTS notification_rules (
    id TEXT PRIMARY KEY,
    app_id TEXT NOT NULL,
    rule_type TEXT NOT NULL,
    config_json TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notification_rules_app_id
    ON notification_rules(app_id);
CREATE INDEX IF NOT EXISTS idx_notification_rules_type_enabled
    ON notification_rules(rule_type, enabled);

CREATE TABLE IF NOT EXISTS notification_rule_channels (
    rule_id TEXT NOT NULL REFERENCES notification_rules(id),
    channel_id TEXT NOT NULL REFERENCES notification_channels(id),
    PRIMARY KEY (rule_id, channel_id)
);
CREATE INDEX IF NOT EXISTS idx_notification_rule_channels_channel_id
    ON notification_rule_channels(channel_id);

CREATE TABLE IF NOT EXISTS notification_log (
    id TEXT PRIMARY KEY,
    app_id TEXT NOT NULL,
    rule_id TEXT,
    channel_id TEXT NOT NULL,
    message TEXT NOT NULL,
    sent_at INTEGER NOT NULL,
    dedup_key TEXT
);
CREATE INDEX IF NOT EXISTS idx_notification_log_app_id_sent_at
    ON notification_log(app_id, sent_at DESC);
CREATE INDEX IF NOT EXISTS idx_notification_log_dedup_key
    ON notification_log(dedup_key);

CREATE TABLE IF NOT EXISTS notification_known_values (
    app_id TEXT NOT NULL,
    value_type TEXT NOT NULL,
    value TEXT NOT NULL,
    first_seen_at INTEGER NOT NULL,
    PRIMARY KEY (app_id, value_type, value)
);
";

const CHANNEL_COLUMNS: &str =
    "id, app_id, name, channel_type, config_json, enabled, created_at, updated_at";

pub struct SqliteNotificationStore {
    conn: Mutex<Connection>,
}

impl SqliteNotificationStore {
    /// Opens (creating if needed) the database file at `path` in WAL mode.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self::init(conn)?;
        tracing::info!(path = %path.display(), "Opened notification store");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn read_channel(row: &Row<'_>) -> rusqlite::Result<NotificationChannel> {
    Ok(NotificationChannel {
        id: row.get(0)?,
        app_id: row.get(1)?,
        name: row.get(2)?,
        channel_type: row.get(3)?,
        config_json: row.get(4)?,
        enabled: row.get(5)?,
        created_at: from_millis(row.get(6)?),
        updated_at: from_millis(row.get(7)?),
    })
}

struct RawRule {
    id: String,
    app_id: String,
    rule_type: String,
    config_json: String,
    enabled: bool,
    created_at: i64,
    updated_at: i64,
}

impl RawRule {
    fn into_rule(self) -> Result<NotificationRule> {
        let rule_type = self
            .rule_type
            .parse::<RuleType>()
            .map_err(|_| StorageError::InvalidColumn {
                column: "rule_type",
                value: self.rule_type.clone(),
            })?;
        Ok(NotificationRule {
            id: self.id,
            app_id: self.app_id,
            rule_type,
            config_json: self.config_json,
            enabled: self.enabled,
            channel_ids: Vec::new(),
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
        })
    }
}

/// Loads rules matching `filter` (a condition over alias `r`) joined with
/// their channel ids. Rows arrive grouped by rule so links are folded into
/// the preceding rule.
fn query_rules<P: Params>(conn: &Connection, filter: &str, params: P) -> Result<Vec<NotificationRule>> {
    let sql = format!(
        "SELECT r.id, r.app_id, r.rule_type, r.config_json, r.enabled, r.created_at, r.updated_at,
                rc.channel_id
         FROM notification_rules r
         LEFT JOIN notification_rule_channels rc ON rc.rule_id = r.id
         WHERE {filter}
         ORDER BY r.created_at ASC, r.id ASC, rc.rowid ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params, |row| {
        let raw = RawRule {
            id: row.get(0)?,
            app_id: row.get(1)?,
            rule_type: row.get(2)?,
            config_json: row.get(3)?,
            enabled: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        };
        let channel_id: Option<String> = row.get(7)?;
        Ok((raw, channel_id))
    })?;

    let mut rules: Vec<NotificationRule> = Vec::new();
    for row in rows {
        let (raw, channel_id) = row?;
        match rules.last_mut() {
            Some(last) if last.id == raw.id => last.channel_ids.extend(channel_id),
            _ => {
                let mut rule = raw.into_rule()?;
                rule.channel_ids.extend(channel_id);
                rules.push(rule);
            }
        }
    }
    Ok(rules)
}

fn ensure_channels_in_app(conn: &Connection, app_id: &str, channel_ids: &[String]) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "SELECT COUNT(*) FROM notification_channels WHERE id = ?1 AND app_id = ?2",
    )?;
    for channel_id in channel_ids {
        let count: i64 = stmt.query_row(params![channel_id, app_id], |row| row.get(0))?;
        if count == 0 {
            return Err(StorageError::ChannelNotInApp {
                app_id: app_id.to_string(),
                channel_id: channel_id.clone(),
            });
        }
    }
    Ok(())
}

fn insert_links(conn: &Connection, rule_id: &str, channel_ids: &[String]) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO notification_rule_channels (rule_id, channel_id) VALUES (?1, ?2)",
    )?;
    for channel_id in channel_ids {
        stmt.execute(params![rule_id, channel_id])?;
    }
    Ok(())
}

impl NotificationStore for SqliteNotificationStore {
    fn list_channels(&self, app_id: &str) -> Result<Vec<NotificationChannel>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM notification_channels
             WHERE app_id = ?1 ORDER BY created_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![app_id], read_channel)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_channel(&self, app_id: &str, channel_id: &str) -> Result<Option<NotificationChannel>> {
        let conn = self.lock();
        let channel = conn
            .query_row(
                &format!(
                    "SELECT {CHANNEL_COLUMNS} FROM notification_channels
                     WHERE id = ?1 AND app_id = ?2"
                ),
                params![channel_id, app_id],
                read_channel,
            )
            .optional()?;
        Ok(channel)
    }

    fn insert_channel(&self, channel: &NewChannel) -> Result<NotificationChannel> {
        let now = Utc::now();
        let row = NotificationChannel {
            id: beacon_common::id::next_id(),
            app_id: channel.app_id.clone(),
            name: channel.name.clone(),
            channel_type: channel.channel_type.clone(),
            config_json: channel.config_json.clone(),
            enabled: true,
            created_at: now,
            updated_at: now,
        };
        let conn = self.lock();
        conn.execute(
            "INSERT INTO notification_channels
                 (id, app_id, name, channel_type, config_json, enabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &row.id,
                &row.app_id,
                &row.name,
                &row.channel_type,
                &row.config_json,
                row.enabled,
                now.timestamp_millis(),
                now.timestamp_millis(),
            ],
        )?;
        Ok(row)
    }

    fn update_channel(&self, channel_id: &str, update: &ChannelUpdate) -> Result<()> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE notification_channels
             SET name = ?1, config_json = ?2, enabled = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                &update.name,
                &update.config_json,
                update.enabled,
                Utc::now().timestamp_millis(),
                channel_id,
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound {
                entity: "notification_channel",
                id: channel_id.to_string(),
            });
        }
        Ok(())
    }

    fn delete_channel(&self, channel_id: &str) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM notification_rule_channels WHERE channel_id = ?1",
            params![channel_id],
        )?;
        tx.execute(
            "DELETE FROM notification_channels WHERE id = ?1",
            params![channel_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn list_rules(&self, app_id: &str) -> Result<Vec<NotificationRule>> {
        let conn = self.lock();
        query_rules(&conn, "r.app_id = ?1", params![app_id])
    }

    fn get_rule(&self, app_id: &str, rule_id: &str) -> Result<Option<NotificationRule>> {
        let conn = self.lock();
        let mut rules = query_rules(&conn, "r.id = ?1 AND r.app_id = ?2", params![rule_id, app_id])?;
        Ok(rules.pop())
    }

    fn insert_rule(&self, rule: &NewRule) -> Result<NotificationRule> {
        let id = beacon_common::id::next_id();
        let now = Utc::now().timestamp_millis();
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        ensure_channels_in_app(&tx, &rule.app_id, &rule.channel_ids)?;
        tx.execute(
            "INSERT INTO notification_rules
                 (id, app_id, rule_type, config_json, enabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
            params![&id, &rule.app_id, rule.rule_type.as_str(), &rule.config_json, now, now],
        )?;
        insert_links(&tx, &id, &rule.channel_ids)?;
        tx.commit()?;

        query_rules(&conn, "r.id = ?1", params![&id])?
            .pop()
            .ok_or(StorageError::NotFound {
                entity: "notification_rule",
                id,
            })
    }

    fn update_rule(&self, rule_id: &str, update: &RuleUpdate) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let app_id: String = tx
            .query_row(
                "SELECT app_id FROM notification_rules WHERE id = ?1",
                params![rule_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound {
                entity: "notification_rule",
                id: rule_id.to_string(),
            })?;
        ensure_channels_in_app(&tx, &app_id, &update.channel_ids)?;
        tx.execute(
            "UPDATE notification_rules SET config_json = ?1, enabled = ?2, updated_at = ?3
             WHERE id = ?4",
            params![
                &update.config_json,
                update.enabled,
                Utc::now().timestamp_millis(),
                rule_id,
            ],
        )?;
        tx.execute(
            "DELETE FROM notification_rule_channels WHERE rule_id = ?1",
            params![rule_id],
        )?;
        insert_links(&tx, rule_id, &update.channel_ids)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_rule(&self, rule_id: &str) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM notification_rule_channels WHERE rule_id = ?1",
            params![rule_id],
        )?;
        tx.execute("DELETE FROM notification_rules WHERE id = ?1", params![rule_id])?;
        tx.commit()?;
        Ok(())
    }

    fn enabled_rules_by_type(&self, rule_types: &[RuleType]) -> Result<Vec<NotificationRule>> {
        if rule_types.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; rule_types.len()].join(", ");
        let filter = format!("r.enabled = 1 AND r.rule_type IN ({placeholders})");
        let conn = self.lock();
        query_rules(
            &conn,
            &filter,
            params_from_iter(rule_types.iter().map(|t| t.as_str())),
        )
    }

    fn known_values(&self, app_id: &str, value_type: ValueType) -> Result<Vec<KnownValue>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT value, first_seen_at FROM notification_known_values
             WHERE app_id = ?1 AND value_type = ?2",
        )?;
        let rows = stmt.query_map(params![app_id, value_type.as_str()], |row| {
            let value: String = row.get(0)?;
            let first_seen_at: i64 = row.get(1)?;
            Ok((value, first_seen_at))
        })?;
        let mut values = Vec::new();
        for row in rows {
            let (value, first_seen_at) = row?;
            values.push(KnownValue {
                app_id: app_id.to_string(),
                value_type,
                value,
                first_seen_at: from_millis(first_seen_at),
            });
        }
        Ok(values)
    }

    fn insert_known_values(
        &self,
        app_id: &str,
        value_type: ValueType,
        values: &[String],
        first_seen_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO notification_known_values
                     (app_id, value_type, value, first_seen_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for value in values {
                inserted += stmt.execute(params![
                    app_id,
                    value_type.as_str(),
                    value,
                    first_seen_at.timestamp_millis(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn has_notification_since(&self, dedup_key: &str, since: DateTime<Utc>) -> Result<bool> {
        let conn = self.lock();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(
                 SELECT 1 FROM notification_log WHERE dedup_key = ?1 AND sent_at > ?2
             )",
            params![dedup_key, since.timestamp_millis()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn count_notifications_since(&self, app_id: &str, since: DateTime<Utc>) -> Result<u64> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notification_log WHERE app_id = ?1 AND sent_at > ?2",
            params![app_id, since.timestamp_millis()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn append_log(&self, entry: &NotificationLogEntry) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO notification_log (id, app_id, rule_id, channel_id, message, sent_at, dedup_key)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &entry.id,
                &entry.app_id,
                &entry.rule_id,
                &entry.channel_id,
                &entry.message,
                entry.sent_at.timestamp_millis(),
                &entry.dedup_key,
            ],
        )?;
        Ok(())
    }

    fn recent_logs(&self, app_id: &str, limit: usize) -> Result<Vec<NotificationLogView>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT l.id, l.rule_id, l.channel_id, c.name, r.rule_type, l.message, l.sent_at
             FROM notification_log l
             LEFT JOIN notification_channels c ON c.id = l.channel_id
             LEFT JOIN notification_rules r ON r.id = l.rule_id
             WHERE l.app_id = ?1
             ORDER BY l.sent_at DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![app_id, limit as i64], |row| {
            Ok(NotificationLogView {
                id: row.get(0)?,
                rule_id: row.get(1)?,
                channel_id: row.get(2)?,
                channel_name: row.get(3)?,
                rule_type: row.get(4)?,
                message: row.get(5)?,
                sent_at: from_millis(row.get(6)?),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
