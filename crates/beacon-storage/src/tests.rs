use crate::sqlite::SqliteNotificationStore;
use crate::{
    ChannelUpdate, KnownValueTracker, NewChannel, NewRule, NotificationStore, RuleUpdate,
    StorageError,
};
use beacon_common::{NotificationLogEntry, RuleType, ValueType};
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

fn setup() -> (TempDir, SqliteNotificationStore) {
    beacon_common::id::init(1, 1);
    let dir = TempDir::new().unwrap();
    let store = SqliteNotificationStore::open(&dir.path().join("beacon.db")).unwrap();
    (dir, store)
}

fn channel(store: &SqliteNotificationStore, app_id: &str, name: &str) -> String {
    store
        .insert_channel(&NewChannel {
            app_id: app_id.to_string(),
            name: name.to_string(),
            channel_type: "ntfy".to_string(),
            config_json: r#"{"topic":"alerts"}"#.to_string(),
        })
        .unwrap()
        .id
}

fn log_entry(app_id: &str, channel_id: &str, dedup_key: Option<&str>, sent_at: chrono::DateTime<Utc>) -> NotificationLogEntry {
    NotificationLogEntry {
        id: beacon_common::id::next_id(),
        app_id: app_id.to_string(),
        rule_id: Some("rule-1".to_string()),
        channel_id: channel_id.to_string(),
        message: "Threshold Alert: error".to_string(),
        sent_at,
        dedup_key: dedup_key.map(str::to_string),
    }
}

#[test]
fn channel_crud_is_scoped_to_app() {
    let (_dir, store) = setup();
    let id = channel(&store, "app-a", "ops");

    assert!(store.get_channel("app-a", &id).unwrap().is_some());
    assert!(store.get_channel("app-b", &id).unwrap().is_none());

    store
        .update_channel(
            &id,
            &ChannelUpdate {
                name: "ops-renamed".to_string(),
                config_json: r#"{"topic":"other"}"#.to_string(),
                enabled: false,
            },
        )
        .unwrap();
    let updated = store.get_channel("app-a", &id).unwrap().unwrap();
    assert_eq!(updated.name, "ops-renamed");
    assert!(!updated.enabled);
    assert_eq!(store.list_channels("app-a").unwrap().len(), 1);
    assert!(store.list_channels("app-b").unwrap().is_empty());
}

#[test]
fn update_missing_channel_is_not_found() {
    let (_dir, store) = setup();
    let err = store
        .update_channel(
            "missing",
            &ChannelUpdate {
                name: "x".to_string(),
                config_json: "{}".to_string(),
                enabled: true,
            },
        )
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[test]
fn rule_links_preserve_channel_order() {
    let (_dir, store) = setup();
    let first = channel(&store, "app-a", "first");
    let second = channel(&store, "app-a", "second");

    let rule = store
        .insert_rule(&NewRule {
            app_id: "app-a".to_string(),
            rule_type: RuleType::Threshold,
            config_json: r#"{"event_name":"error","threshold":1000}"#.to_string(),
            channel_ids: vec![second.clone(), first.clone()],
        })
        .unwrap();
    assert_eq!(rule.channel_ids, vec![second.clone(), first.clone()]);
    assert!(rule.enabled);

    let loaded = store.get_rule("app-a", &rule.id).unwrap().unwrap();
    assert_eq!(loaded.rule_type, RuleType::Threshold);
    assert_eq!(loaded.channel_ids, vec![second, first]);
}

#[test]
fn rule_rejects_channel_from_other_app() {
    let (_dir, store) = setup();
    let foreign = channel(&store, "app-b", "theirs");

    let err = store
        .insert_rule(&NewRule {
            app_id: "app-a".to_string(),
            rule_type: RuleType::DeadApp,
            config_json: "{}".to_string(),
            channel_ids: vec![foreign],
        })
        .unwrap_err();
    assert!(matches!(err, StorageError::ChannelNotInApp { .. }));
    assert!(store.list_rules("app-a").unwrap().is_empty());
}

#[test]
fn rule_without_channels_is_legal() {
    let (_dir, store) = setup();
    let rule = store
        .insert_rule(&NewRule {
            app_id: "app-a".to_string(),
            rule_type: RuleType::DeadApp,
            config_json: "{}".to_string(),
            channel_ids: vec![],
        })
        .unwrap();
    assert!(rule.channel_ids.is_empty());
    assert_eq!(store.enabled_rules_by_type(&[RuleType::DeadApp]).unwrap().len(), 1);
}

#[test]
fn update_rule_replaces_channel_set() {
    let (_dir, store) = setup();
    let a = channel(&store, "app-a", "a");
    let b = channel(&store, "app-a", "b");
    let rule = store
        .insert_rule(&NewRule {
            app_id: "app-a".to_string(),
            rule_type: RuleType::EventPush,
            config_json: r#"{"event_names":["signup"]}"#.to_string(),
            channel_ids: vec![a],
        })
        .unwrap();

    store
        .update_rule(
            &rule.id,
            &RuleUpdate {
                config_json: r#"{"event_names":["purchase"]}"#.to_string(),
                enabled: false,
                channel_ids: vec![b.clone()],
            },
        )
        .unwrap();

    let loaded = store.get_rule("app-a", &rule.id).unwrap().unwrap();
    assert_eq!(loaded.channel_ids, vec![b]);
    assert!(!loaded.enabled);
    assert!(loaded.config_json.contains("purchase"));
}

#[test]
fn enabled_rules_by_type_filters_type_and_enabled() {
    let (_dir, store) = setup();
    let ch = channel(&store, "app-a", "ops");
    let new_rule = |rule_type| NewRule {
        app_id: "app-a".to_string(),
        rule_type,
        config_json: "{}".to_string(),
        channel_ids: vec![ch.clone()],
    };
    let push = store.insert_rule(&new_rule(RuleType::EventPush)).unwrap();
    let threshold = store.insert_rule(&new_rule(RuleType::Threshold)).unwrap();
    store.insert_rule(&new_rule(RuleType::DeadApp)).unwrap();
    store
        .update_rule(
            &threshold.id,
            &RuleUpdate {
                config_json: "{}".to_string(),
                enabled: false,
                channel_ids: vec![ch.clone()],
            },
        )
        .unwrap();

    let rules = store
        .enabled_rules_by_type(&[RuleType::EventPush, RuleType::Threshold])
        .unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].id, push.id);
    assert_eq!(rules[0].channel_ids, vec![ch]);

    assert!(store.enabled_rules_by_type(&[]).unwrap().is_empty());
}

#[test]
fn delete_channel_unlinks_rules() {
    let (_dir, store) = setup();
    let ch = channel(&store, "app-a", "ops");
    let rule = store
        .insert_rule(&NewRule {
            app_id: "app-a".to_string(),
            rule_type: RuleType::DeadApp,
            config_json: "{}".to_string(),
            channel_ids: vec![ch.clone()],
        })
        .unwrap();

    store.delete_channel(&ch).unwrap();
    let loaded = store.get_rule("app-a", &rule.id).unwrap().unwrap();
    assert!(loaded.channel_ids.is_empty());

    store.delete_rule(&rule.id).unwrap();
    assert!(store.get_rule("app-a", &rule.id).unwrap().is_none());
}

#[test]
fn dedup_lookup_respects_window() {
    let (_dir, store) = setup();
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    store
        .append_log(&log_entry("app-a", "ch", Some("threshold:r1:2024-03-01"), now - Duration::minutes(30)))
        .unwrap();

    assert!(store
        .has_notification_since("threshold:r1:2024-03-01", now - Duration::minutes(60))
        .unwrap());
    assert!(!store
        .has_notification_since("threshold:r1:2024-03-01", now - Duration::minutes(10))
        .unwrap());
    assert!(!store
        .has_notification_since("threshold:r1:2024-03-02", now - Duration::minutes(60))
        .unwrap());
}

#[test]
fn count_notifications_is_per_app_and_windowed() {
    let (_dir, store) = setup();
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    for minutes_ago in [5, 20, 59, 61, 120] {
        store
            .append_log(&log_entry("app-a", "ch", None, now - Duration::minutes(minutes_ago)))
            .unwrap();
    }
    store
        .append_log(&log_entry("app-b", "ch", None, now - Duration::minutes(1)))
        .unwrap();

    let since = now - Duration::minutes(60);
    assert_eq!(store.count_notifications_since("app-a", since).unwrap(), 3);
    assert_eq!(store.count_notifications_since("app-b", since).unwrap(), 1);
    assert_eq!(store.count_notifications_since("app-c", since).unwrap(), 0);
}

#[test]
fn recent_logs_are_newest_first_with_joins() {
    let (_dir, store) = setup();
    let ch = channel(&store, "app-a", "ops");
    let now = Utc::now();
    store.append_log(&log_entry("app-a", &ch, None, now - Duration::minutes(10))).unwrap();
    let mut test_send = log_entry("app-a", &ch, None, now);
    test_send.rule_id = None;
    test_send.message = "Test notification".to_string();
    store.append_log(&test_send).unwrap();
    store.append_log(&log_entry("app-a", "deleted-channel", None, now - Duration::minutes(20))).unwrap();

    let logs = store.recent_logs("app-a", 2).unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].message, "Test notification");
    assert!(logs[0].rule_id.is_none());
    assert_eq!(logs[0].channel_name.as_deref(), Some("ops"));
    assert!(logs[1].rule_type.is_none());

    let all = store.recent_logs("app-a", 50).unwrap();
    assert_eq!(all.len(), 3);
    assert!(all[2].channel_name.is_none());
}

#[test]
fn known_values_insert_once() {
    let (_dir, store) = setup();
    let tracker = KnownValueTracker::new(Arc::new(store));
    let first_seen = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();

    let inserted = tracker
        .record_new_values(
            "app-a",
            ValueType::EventName,
            &["purchase".to_string(), "signup".to_string()],
            first_seen,
        )
        .unwrap();
    assert_eq!(inserted, 2);

    let again = tracker
        .record_new_values(
            "app-a",
            ValueType::EventName,
            &["purchase".to_string()],
            first_seen + Duration::days(1),
        )
        .unwrap();
    assert_eq!(again, 0);

    let known = tracker.known_values("app-a", ValueType::EventName).unwrap();
    assert!(known.contains("purchase"));
    assert!(known.contains("signup"));
    assert!(tracker.known_values("app-a", ValueType::AppVersion).unwrap().is_empty());
    assert!(tracker.known_values("app-b", ValueType::EventName).unwrap().is_empty());
}

#[test]
fn known_value_keeps_first_seen_timestamp() {
    let (_dir, store) = setup();
    let first_seen = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    store
        .insert_known_values("app-a", ValueType::CountryCode, &["DE".to_string()], first_seen)
        .unwrap();
    store
        .insert_known_values(
            "app-a",
            ValueType::CountryCode,
            &["DE".to_string()],
            first_seen + Duration::hours(5),
        )
        .unwrap();

    let values = store.known_values("app-a", ValueType::CountryCode).unwrap();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].first_seen_at, first_seen);
}

#[test]
fn reopen_keeps_data() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("beacon.db");
    {
        let store = SqliteNotificationStore::open(&path).unwrap();
        channel(&store, "app-a", "ops");
    }
    let store = SqliteNotificationStore::open(&path).unwrap();
    assert_eq!(store.list_channels("app-a").unwrap().len(), 1);
}

#[test]
fn config_columns_are_opaque_but_rule_types_are_checked() {
    let (dir, store) = setup();
    let rule = store
        .insert_rule(&NewRule {
            app_id: "app-a".to_string(),
            rule_type: RuleType::DeadApp,
            config_json: "not json".to_string(),
            channel_ids: vec![],
        })
        .unwrap();
    assert_eq!(store.list_rules("app-a").unwrap()[0].config_json, "not json");

    let conn = rusqlite::Connection::open(dir.path().join("beacon.db")).unwrap();
    conn.execute(
        "UPDATE notification_rules SET rule_type = 'carrier_pigeon' WHERE id = ?1",
        [&rule.id],
    )
    .unwrap();
    drop(conn);

    let err = store.list_rules("app-a").unwrap_err();
    assert!(matches!(
        err,
        StorageError::InvalidColumn { column: "rule_type", ref value } if value == "carrier_pigeon"
    ));
}
