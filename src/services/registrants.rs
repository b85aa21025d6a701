use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::crm::CrmApi;
use crate::error::SyncError;
use crate::models::zoom::ZoomRegistrant;

/// Custom field on events that receives the registrant list
pub const EVENT_ZOOM_NOTES_FIELD: &str = "Event_Zoom_Notes";

pub const DEFAULT_MINS_BACK: i64 = 60;
pub const DEFAULT_GLUE: &str = " , ";

fn parse_create_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|naive| naive.and_utc())
        })
        .ok()
}

/// Registrants created less than `mins_back` minutes before `now`.
///
/// Registrants without a readable `create_time` are left out.
pub fn filter_registrants_by_time(
    registrants: &[ZoomRegistrant],
    mins_back: i64,
    now: DateTime<Utc>,
) -> Vec<ZoomRegistrant> {
    registrants
        .iter()
        .filter(|registrant| {
            let Some(created) = registrant.create_time.as_deref().and_then(parse_create_time)
            else {
                warn!(
                    "Ignoring registrant {} with unreadable create_time {:?}",
                    registrant.email, registrant.create_time
                );
                return false;
            };
            let seconds = (now - created).num_seconds();
            (seconds as f64 / 60.0) < mins_back as f64
        })
        .cloned()
        .collect()
}

/// `First Last - email` for each registrant, joined by `glue`
pub fn string_of_registrants(registrants: &[ZoomRegistrant], glue: &str) -> String {
    registrants
        .iter()
        .map(|r| format!("{} {} - {}", r.first_name, r.last_name, r.email))
        .collect::<Vec<_>>()
        .join(glue)
}

#[derive(Debug, Clone, Serialize)]
pub struct NotesUpdate {
    pub event_id: i64,
    pub registrants: usize,
    pub message: String,
}

/// Writes registrant lists into the event notes custom field
pub struct RegistrantNotes {
    crm: Arc<dyn CrmApi>,
}

impl RegistrantNotes {
    pub fn new(crm: Arc<dyn CrmApi>) -> Self {
        Self { crm }
    }

    pub async fn update_registrants_to_notes(
        &self,
        event_id: i64,
        registrants: &[ZoomRegistrant],
    ) -> Result<NotesUpdate, SyncError> {
        if event_id <= 0 || registrants.is_empty() {
            return Err(SyncError::MissingParams(
                "event id and registrants are required".to_string(),
            ));
        }

        let field_id = self
            .crm
            .find_custom_field(EVENT_ZOOM_NOTES_FIELD, None)
            .await?
            .ok_or_else(|| {
                SyncError::NotConfigured(format!("custom field {}", EVENT_ZOOM_NOTES_FIELD))
            })?;

        let notes = format!("{}.", string_of_registrants(registrants, DEFAULT_GLUE));
        let mut values = serde_json::Map::new();
        values.insert(format!("custom_{}", field_id), notes.into());
        self.crm.write_custom_values(event_id, values).await?;

        info!(
            "Wrote {} Zoom registrants to notes of event {}",
            registrants.len(),
            event_id
        );
        Ok(NotesUpdate {
            event_id,
            registrants: registrants.len(),
            message: "Registrants have been updated to the event successfully.".to_string(),
        })
    }
}
