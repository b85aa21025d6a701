use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::crm::CrmApi;
use crate::error::SyncError;
use crate::models::crm::CrmEvent;
use crate::services::settings::SettingsService;

/// Concatenate event lists, keeping the first occurrence of each id
pub fn union_events(first: Vec<CrmEvent>, second: Vec<CrmEvent>) -> Vec<CrmEvent> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|event| seen.insert(event.id))
        .collect()
}

// Data the event edit form needs to render the Zoom account picker
#[derive(Debug, Clone, Serialize)]
pub struct EventFormOptions {
    pub zoom_accounts: BTreeMap<i64, String>,
    pub custom_id_webinar: Option<String>,
    pub custom_id_meeting: Option<String>,
    pub account_id_field: Option<String>,
    pub selected_account: Option<i64>,
}

pub struct EventService {
    crm: Arc<dyn CrmApi>,
    settings: Arc<SettingsService>,
}

impl EventService {
    pub fn new(crm: Arc<dyn CrmApi>, settings: Arc<SettingsService>) -> Self {
        Self { crm, settings }
    }

    /// Events starting or ending today or later
    pub async fn upcoming_events(&self, today: NaiveDate) -> Result<Vec<CrmEvent>, SyncError> {
        let today = today.format("%Y-%m-%d").to_string();

        let starting = self
            .crm
            .get_events(json!({ "start_date": { ">=": today } }))
            .await?;
        let ending = self
            .crm
            .get_events(json!({ "end_date": { ">=": today } }))
            .await?;

        let events = union_events(starting, ending);
        info!("Found {} upcoming events", events.len());
        Ok(events)
    }

    /// Account picker contents, with the event's current account selected
    /// when editing an existing event
    pub async fn event_form_options(
        &self,
        event_id: Option<i64>,
    ) -> Result<EventFormOptions, SyncError> {
        let zoom_accounts = self.settings.account_names_and_ids()?;
        let account_id_field = self.settings.account_id_custom_field();

        let mut selected_account = None;
        if let (Some(event_id), Some(field)) = (event_id, account_id_field.as_deref()) {
            match self.crm.latest_custom_value(event_id, field).await {
                Ok(Some(latest)) => {
                    selected_account = latest
                        .trim()
                        .parse::<i64>()
                        .ok()
                        .filter(|id| zoom_accounts.contains_key(id));
                }
                Ok(None) => {}
                // The form still renders without a preselected account
                Err(err) => warn!("Reading Zoom account of event {} failed: {}", event_id, err),
            }
        }

        Ok(EventFormOptions {
            zoom_accounts,
            custom_id_webinar: self.settings.webinar_custom_field(),
            custom_id_meeting: self.settings.meeting_custom_field(),
            account_id_field,
            selected_account,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_mock::MockCrm;
    use crate::error::CrmError;
    use crate::models::settings::{GlobalSettings, ZoomAccount};
    use crate::services::accounts::AccountStore;
    use mockall::predicate::*;
    use tempfile::{tempdir, TempDir};

    fn event(id: i64) -> CrmEvent {
        CrmEvent {
            id,
            title: Some(format!("Event {}", id)),
            start_date: None,
            end_date: None,
        }
    }

    fn service(crm: MockCrm) -> (EventService, TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.csv");
        let store = AccountStore::new(path.to_str().unwrap()).unwrap();
        store
            .upsert(ZoomAccount {
                id: 4,
                name: "Webinars".to_string(),
                api_key: "k".to_string(),
                secret_key: "s".to_string(),
                base_url: "https://api.zoom.us/v2".to_string(),
            })
            .unwrap();
        let settings = SettingsService::new(
            GlobalSettings {
                custom_field_id_webinar: Some(1),
                custom_field_id_meeting: Some(2),
                custom_field_account_id: Some(3),
                ..Default::default()
            },
            store,
        );
        (EventService::new(Arc::new(crm), Arc::new(settings)), dir)
    }

    #[test]
    fn test_union_keeps_first_occurrence() {
        let mut renamed = event(2);
        renamed.title = Some("Renamed".to_string());
        let merged = union_events(vec![event(1), event(2)], vec![renamed, event(3)]);

        let ids: Vec<i64> = merged.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(merged[1].title.as_deref(), Some("Event 2"));
    }

    #[tokio::test]
    async fn test_upcoming_events_queries_start_and_end() {
        let mut crm = MockCrm::new();
        crm.expect_get_events()
            .with(eq(json!({ "start_date": { ">=": "2024-05-10" } })))
            .returning(|_| Ok(vec![event(1), event(2)]));
        crm.expect_get_events()
            .with(eq(json!({ "end_date": { ">=": "2024-05-10" } })))
            .returning(|_| Ok(vec![event(2), event(5)]));

        let (service, _dir) = service(crm);
        let events = service
            .upcoming_events(NaiveDate::from_ymd_opt(2024, 5, 10).unwrap())
            .await
            .unwrap();
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_form_options_select_known_account() {
        let mut crm = MockCrm::new();
        crm.expect_latest_custom_value()
            .with(eq(9), eq("custom_3"))
            .returning(|_, _| Ok(Some("4".to_string())));
        crm.expect_latest_custom_value()
            .with(eq(10), eq("custom_3"))
            .returning(|_, _| Ok(Some("77".to_string())));
        crm.expect_latest_custom_value()
            .with(eq(11), eq("custom_3"))
            .returning(|_, _| Err(CrmError::Decode("bad body".into())));

        let (service, _dir) = service(crm);

        let options = service.event_form_options(Some(9)).await.unwrap();
        assert_eq!(options.selected_account, Some(4));
        assert_eq!(options.custom_id_webinar.as_deref(), Some("custom_1"));
        assert_eq!(options.zoom_accounts.len(), 2);

        let unknown = service.event_form_options(Some(10)).await.unwrap();
        assert!(unknown.selected_account.is_none());

        let failing = service.event_form_options(Some(11)).await.unwrap();
        assert!(failing.selected_account.is_none());

        let new_event = service.event_form_options(None).await.unwrap();
        assert!(new_event.selected_account.is_none());
    }
}
