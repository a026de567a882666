use crate::error::Result;
use crate::NotificationStore;
use beacon_common::ValueType;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// Remembers which discrete values (event names, app versions, countries)
/// have already been observed per app.
#[derive(Clone)]
pub struct KnownValueTracker {
    store: Arc<dyn NotificationStore>,
}

impl KnownValueTracker {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    pub fn known_values(&self, app_id: &str, value_type: ValueType) -> Result<HashSet<String>> {
        Ok(self
            .store
            .known_values(app_id, value_type)?
            .into_iter()
            .map(|v| v.value)
            .collect())
    }

    /// Insert-if-absent for each value. Recording a value twice never
    /// touches its original `first_seen_at`.
    pub fn record_new_values(
        &self,
        app_id: &str,
        value_type: ValueType,
        values: &[String],
        now: DateTime<Utc>,
    ) -> Result<usize> {
        if values.is_empty() {
            return Ok(0);
        }
        let inserted = self
            .store
            .insert_known_values(app_id, value_type, values, now)?;
        tracing::debug!(
            app_id,
            value_type = %value_type,
            inserted,
            "Recorded known values"
        );
        Ok(inserted)
    }
}
