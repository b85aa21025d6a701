use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::crm::CrmApi;
use crate::error::SyncError;
use crate::models::common::is_empty_value;
use crate::services::settings::SettingsService;

/// Custom group holding the synced Zoom participant fields
pub const ZOOM_DATA_SYNC_GROUP: &str = "Zoom_Data_Sync";

/// Zoom reports rejoins as `duration_1` .. `duration_20`
pub const MAX_DURATION_ENTRIES: u32 = 20;

const CRM_DATETIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Whole minutes in a seconds value, rounding down
pub fn seconds_to_minutes(value: &Value) -> Option<i64> {
    let seconds = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    seconds
        .is_finite()
        .then(|| (seconds / 60.0).floor() as i64)
}

/// Zoom timestamp as the CRM's compact `YYYYMMDDHHMMSS` in UTC
pub fn format_crm_datetime(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()?;
    Some(parsed.format(CRM_DATETIME_FORMAT).to_string())
}

/// Rename Zoom keys to the custom field names and convert `duration` to
/// minutes. A duration that is not a number of seconds is dropped.
pub fn normalize_zoom_data(mut data: Map<String, Value>) -> Map<String, Value> {
    if let Some(email) = data.get("user_email").filter(|v| !is_empty_value(v)).cloned() {
        data.insert("email".to_string(), email);
    }
    if let Some(id) = data.get("id").filter(|v| !is_empty_value(v)).cloned() {
        data.insert("registrant_id".to_string(), id);
    }
    if let Some(duration) = data.get("duration").filter(|v| !is_empty_value(v)).cloned() {
        match seconds_to_minutes(&duration) {
            Some(minutes) => {
                data.insert("duration".to_string(), json!(minutes));
            }
            None => {
                warn!("Dropping unreadable Zoom duration {}", duration);
                data.remove("duration");
            }
        }
    }
    data
}

/// Selected sync fields plus every `duration_N` present in the payload when
/// `duration` itself is selected
pub fn enabled_fields(sync_fields: &[String], data: &Map<String, Value>) -> Vec<String> {
    let mut fields = sync_fields.to_vec();
    if sync_fields.iter().any(|field| field == "duration") {
        for count in 1..=MAX_DURATION_ENTRIES {
            let name = format!("duration_{}", count);
            let present = data.get(&name).map(|v| !is_empty_value(v)).unwrap_or(false);
            if present && !fields.contains(&name) {
                fields.push(name);
            }
        }
    }
    fields
}

// Value to store for one field, `None` when it cannot be converted
fn field_value(field: &str, value: &Value) -> Option<Value> {
    match field {
        "join_time" | "leave_time" => {
            let formatted = value.as_str().and_then(format_crm_datetime);
            if formatted.is_none() {
                warn!("Unparseable {} value: {}", field, value);
            }
            formatted.map(Value::String)
        }
        _ if field.starts_with("duration_") => seconds_to_minutes(value).map(|m| json!(m)),
        _ => Some(value.clone()),
    }
}

/// Writes Zoom participant data into the participant's custom fields
pub struct ParticipantSync {
    crm: Arc<dyn CrmApi>,
    settings: Arc<SettingsService>,
}

impl ParticipantSync {
    pub fn new(crm: Arc<dyn CrmApi>, settings: Arc<SettingsService>) -> Self {
        Self { crm, settings }
    }

    /// Update the selected sync fields of a participant from a Zoom payload.
    ///
    /// Returns the written values, or `None` when there was nothing to write.
    /// Fields without a matching custom field, or with an empty value, are
    /// skipped.
    pub async fn update_zoom_participant_data(
        &self,
        participant_id: i64,
        zoom_data: Map<String, Value>,
    ) -> Result<Option<Value>, SyncError> {
        if participant_id <= 0 || zoom_data.is_empty() {
            return Ok(None);
        }

        let data = normalize_zoom_data(zoom_data);

        let group_id = self
            .crm
            .find_custom_group(ZOOM_DATA_SYNC_GROUP)
            .await?
            .ok_or_else(|| {
                SyncError::NotConfigured(format!("custom group {}", ZOOM_DATA_SYNC_GROUP))
            })?;

        let mut update = Map::new();
        for field in enabled_fields(&self.settings.sync_fields(), &data) {
            let Some(value) = data.get(&field).filter(|v| !is_empty_value(v)) else {
                continue;
            };

            let custom_field_id = match self.crm.find_custom_field(&field, Some(group_id)).await {
                Ok(Some(id)) => id,
                Ok(None) => {
                    debug!("No custom field for sync field {}", field);
                    continue;
                }
                Err(err) => {
                    warn!("Looking up custom field {} failed: {}", field, err);
                    continue;
                }
            };

            if let Some(converted) = field_value(&field, value) {
                update.insert(format!("custom_{}", custom_field_id), converted);
            }
        }

        if update.is_empty() {
            info!("No Zoom data to sync for participant {}", participant_id);
            return Ok(None);
        }

        info!(
            "Syncing {} Zoom fields to participant {}",
            update.len(),
            participant_id
        );
        let written = self.crm.write_custom_values(participant_id, update).await?;
        Ok(Some(written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_mock::MockCrm;
    use crate::models::settings::GlobalSettings;
    use crate::services::accounts::AccountStore;
    use mockall::predicate::*;
    use tempfile::tempdir;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn sync_service(crm: MockCrm, fields: &[&str]) -> (ParticipantSync, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.csv");
        let settings = SettingsService::new(
            GlobalSettings {
                sync_zoom_data_fields: fields.iter().map(|f| f.to_string()).collect(),
                ..Default::default()
            },
            AccountStore::new(path.to_str().unwrap()).unwrap(),
        );
        (ParticipantSync::new(Arc::new(crm), Arc::new(settings)), dir)
    }

    #[test]
    fn test_seconds_to_minutes_floors() {
        assert_eq!(seconds_to_minutes(&json!(3599)), Some(59));
        assert_eq!(seconds_to_minutes(&json!(60)), Some(1));
        assert_eq!(seconds_to_minutes(&json!("125")), Some(2));
        assert_eq!(seconds_to_minutes(&json!(59)), Some(0));
        assert_eq!(seconds_to_minutes(&json!("3700.0")), Some(61));
        assert_eq!(seconds_to_minutes(&json!(3700.9)), Some(61));
        assert_eq!(seconds_to_minutes(&json!("n/a")), None);
    }

    #[test]
    fn test_format_crm_datetime() {
        assert_eq!(
            format_crm_datetime("2021-03-09T18:48:43Z").as_deref(),
            Some("20210309184843")
        );
        assert_eq!(
            format_crm_datetime("2021-03-09T18:48:43+02:00").as_deref(),
            Some("20210309164843")
        );
        assert_eq!(
            format_crm_datetime("2021-03-09 18:48:43").as_deref(),
            Some("20210309184843")
        );
        assert!(format_crm_datetime("yesterday").is_none());
    }

    #[test]
    fn test_normalize_renames_and_converts() {
        let data = normalize_zoom_data(payload(json!({
            "user_email": "ann@example.org",
            "id": "zr_123",
            "duration": 3700,
        })));
        assert_eq!(data["email"], "ann@example.org");
        assert_eq!(data["registrant_id"], "zr_123");
        assert_eq!(data["duration"], 61);
    }

    #[test]
    fn test_normalize_never_keeps_raw_seconds() {
        let data = normalize_zoom_data(payload(json!({ "duration": "3700.0" })));
        assert_eq!(data["duration"], 61);

        let data = normalize_zoom_data(payload(json!({ "duration": "about an hour" })));
        assert!(!data.contains_key("duration"));
    }

    #[test]
    fn test_enabled_fields_adds_present_durations() {
        let data = payload(json!({ "duration_1": 600, "duration_3": 120, "duration_2": "" }));
        let fields = enabled_fields(&["email".to_string(), "duration".to_string()], &data);
        assert_eq!(fields, vec!["email", "duration", "duration_1", "duration_3"]);

        let without = enabled_fields(&["email".to_string()], &data);
        assert_eq!(without, vec!["email"]);
    }

    #[tokio::test]
    async fn test_update_writes_mapped_fields_in_one_call() {
        let mut crm = MockCrm::new();
        crm.expect_find_custom_group()
            .with(eq(ZOOM_DATA_SYNC_GROUP))
            .returning(|_| Ok(Some(4)));
        crm.expect_find_custom_field()
            .withf(|name, group| name == "email" && *group == Some(4))
            .returning(|_, _| Ok(Some(31)));
        crm.expect_find_custom_field()
            .withf(|name, _| name == "duration")
            .returning(|_, _| Ok(Some(32)));
        crm.expect_find_custom_field()
            .withf(|name, _| name == "join_time")
            .returning(|_, _| Ok(Some(33)));
        crm.expect_find_custom_field()
            .withf(|name, _| name == "duration_1")
            .returning(|_, _| Ok(Some(34)));
        crm.expect_find_custom_field()
            .withf(|name, _| name == "registrant_id")
            .returning(|_, _| Ok(None));
        crm.expect_write_custom_values()
            .withf(|participant_id, values| {
                *participant_id == 77
                    && values.len() == 4
                    && values["custom_31"] == "ann@example.org"
                    && values["custom_32"] == 61
                    && values["custom_33"] == "20210309184843"
                    && values["custom_34"] == 10
            })
            .times(1)
            .returning(|_, values| Ok(Value::Object(values)));

        let (service, _dir) = sync_service(
            crm,
            &["email", "duration", "join_time", "registrant_id", "leave_time"],
        );
        let written = service
            .update_zoom_participant_data(
                77,
                payload(json!({
                    "user_email": "ann@example.org",
                    "id": "zr_1",
                    "duration": 3700,
                    "duration_1": 600,
                    "join_time": "2021-03-09T18:48:43Z",
                })),
            )
            .await
            .unwrap();

        assert!(written.is_some());
    }

    #[tokio::test]
    async fn test_missing_group_is_not_configured() {
        let mut crm = MockCrm::new();
        crm.expect_find_custom_group().returning(|_| Ok(None));
        crm.expect_write_custom_values().never();

        let (service, _dir) = sync_service(crm, &["email"]);
        let result = service
            .update_zoom_participant_data(5, payload(json!({ "user_email": "a@b.org" })))
            .await;

        assert!(matches!(result, Err(SyncError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_nothing_mapped_means_no_write() {
        let mut crm = MockCrm::new();
        crm.expect_find_custom_group().returning(|_| Ok(Some(4)));
        crm.expect_find_custom_field().returning(|_, _| Ok(None));
        crm.expect_write_custom_values().never();

        let (service, _dir) = sync_service(crm, &["email", "name"]);
        let result = service
            .update_zoom_participant_data(
                5,
                payload(json!({ "user_email": "a@b.org", "name": "Ann" })),
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_empty_payload_short_circuits() {
        let crm = MockCrm::new();
        let (service, _dir) = sync_service(crm, &["email"]);
        let result = service
            .update_zoom_participant_data(5, Map::new())
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
