use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::crm::CrmApi;
use crate::error::{CrmError, SyncError};
use crate::models::crm::{NewMessageTemplate, TemplateLookup};
use crate::services::notifier::REGISTRANTS_TEMPLATE_TITLE;
use crate::services::registrants::EVENT_ZOOM_NOTES_FIELD;
use crate::services::settings::SettingsService;

pub const EVENT_ZOOM_NOTES_GROUP: &str = "Event_Zoom_Notes";
pub const REGISTRANTS_TEMPLATE_HTML: &str = "<br> {event_title} <br> {registrants} <br>";
pub const REGISTRANTS_TEMPLATE_SUBJECT: &str = "Recently Joined to the zoom event: {event_title}";

#[derive(Debug, Clone, Default, Serialize)]
pub struct BootstrapReport {
    pub custom_group_id: i64,
    pub custom_field_id: i64,
    pub template_id: i64,
    /// Names of the records this run had to create
    pub created: Vec<String>,
}

/// Creates the CRM records the sync relies on. Safe to run repeatedly.
pub struct Bootstrap {
    crm: Arc<dyn CrmApi>,
    settings: Arc<SettingsService>,
}

impl Bootstrap {
    pub fn new(crm: Arc<dyn CrmApi>, settings: Arc<SettingsService>) -> Self {
        Self { crm, settings }
    }

    pub async fn run(&self) -> Result<BootstrapReport, SyncError> {
        let mut report = BootstrapReport::default();

        report.custom_group_id = match self.crm.find_custom_group(EVENT_ZOOM_NOTES_GROUP).await? {
            Some(id) => id,
            None => {
                let id = self
                    .crm
                    .create_custom_group(json!({
                        "title": "Event Zoom Notes",
                        "extends": "Event",
                        "name": EVENT_ZOOM_NOTES_GROUP,
                    }))
                    .await?;
                report.created.push(format!("CustomGroup {}", EVENT_ZOOM_NOTES_GROUP));
                id
            }
        };

        report.custom_field_id = match self
            .crm
            .find_custom_field(EVENT_ZOOM_NOTES_FIELD, Some(report.custom_group_id))
            .await?
        {
            Some(id) => id,
            None => {
                let id = self
                    .crm
                    .create_custom_field(json!({
                        "custom_group_id": report.custom_group_id,
                        "label": "Event Zoom Notes",
                        "name": EVENT_ZOOM_NOTES_FIELD,
                        "data_type": "Memo",
                        "html_type": "TextArea",
                        "is_view": 1,
                    }))
                    .await?;
                report.created.push(format!("CustomField {}", EVENT_ZOOM_NOTES_FIELD));
                id
            }
        };

        let existing = self
            .crm
            .message_template(TemplateLookup::Title(REGISTRANTS_TEMPLATE_TITLE.to_string()))
            .await?;
        report.template_id = match existing {
            Some(template) => template.id.ok_or_else(|| {
                CrmError::Decode(format!(
                    "message template '{}' returned without an id",
                    REGISTRANTS_TEMPLATE_TITLE
                ))
            })?,
            None => {
                let id = self
                    .crm
                    .create_message_template(NewMessageTemplate {
                        msg_title: REGISTRANTS_TEMPLATE_TITLE.to_string(),
                        msg_html: REGISTRANTS_TEMPLATE_HTML.to_string(),
                        msg_subject: REGISTRANTS_TEMPLATE_SUBJECT.to_string(),
                    })
                    .await?;
                report.created.push(format!("MessageTemplate {}", REGISTRANTS_TEMPLATE_TITLE));
                id
            }
        };

        self.settings.set_email_template_id(report.template_id)?;

        info!(
            "Bootstrap complete, created {} records, template id {}",
            report.created.len(),
            report.template_id
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_mock::MockCrm;
    use crate::models::crm::MessageTemplate;
    use crate::models::settings::GlobalSettings;
    use crate::services::accounts::AccountStore;
    use mockall::predicate::*;
    use tempfile::{tempdir, TempDir};

    fn settings() -> (Arc<SettingsService>, TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.csv");
        let settings = SettingsService::new(
            GlobalSettings::default(),
            AccountStore::new(path.to_str().unwrap()).unwrap(),
        );
        (Arc::new(settings), dir)
    }

    #[tokio::test]
    async fn test_fresh_install_creates_everything() {
        let mut crm = MockCrm::new();
        crm.expect_find_custom_group()
            .with(eq(EVENT_ZOOM_NOTES_GROUP))
            .returning(|_| Ok(None));
        crm.expect_create_custom_group()
            .withf(|params| params["extends"] == "Event")
            .times(1)
            .returning(|_| Ok(12));
        crm.expect_find_custom_field()
            .with(eq(EVENT_ZOOM_NOTES_FIELD), eq(Some(12)))
            .returning(|_, _| Ok(None));
        crm.expect_create_custom_field()
            .withf(|params| {
                params["custom_group_id"] == 12
                    && params["data_type"] == "Memo"
                    && params["is_view"] == 1
            })
            .times(1)
            .returning(|_| Ok(40));
        crm.expect_message_template().returning(|_| Ok(None));
        crm.expect_create_message_template()
            .withf(|template| {
                template.msg_title == REGISTRANTS_TEMPLATE_TITLE
                    && template.msg_html == REGISTRANTS_TEMPLATE_HTML
            })
            .times(1)
            .returning(|_| Ok(8));

        let (settings, _dir) = settings();
        let report = Bootstrap::new(Arc::new(crm), settings.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(report.custom_field_id, 40);
        assert_eq!(report.created.len(), 3);
        assert_eq!(settings.email_template_id(), Some(8));
    }

    #[tokio::test]
    async fn test_existing_records_are_reused() {
        let mut crm = MockCrm::new();
        crm.expect_find_custom_group().returning(|_| Ok(Some(12)));
        crm.expect_create_custom_group().never();
        crm.expect_find_custom_field().returning(|_, _| Ok(Some(40)));
        crm.expect_create_custom_field().never();
        crm.expect_message_template().returning(|_| {
            Ok(Some(MessageTemplate {
                id: Some(5),
                msg_title: Some(REGISTRANTS_TEMPLATE_TITLE.to_string()),
                msg_subject: REGISTRANTS_TEMPLATE_SUBJECT.to_string(),
                msg_html: REGISTRANTS_TEMPLATE_HTML.to_string(),
                msg_text: None,
            }))
        });
        crm.expect_create_message_template().never();

        let (settings, _dir) = settings();
        let report = Bootstrap::new(Arc::new(crm), settings.clone())
            .run()
            .await
            .unwrap();

        assert!(report.created.is_empty());
        assert_eq!(settings.email_template_id(), Some(5));
    }

    #[tokio::test]
    async fn test_template_without_id_is_not_duplicated() {
        let mut crm = MockCrm::new();
        crm.expect_find_custom_group().returning(|_| Ok(Some(12)));
        crm.expect_find_custom_field().returning(|_, _| Ok(Some(40)));
        crm.expect_message_template().returning(|_| {
            Ok(Some(MessageTemplate {
                id: None,
                msg_title: Some(REGISTRANTS_TEMPLATE_TITLE.to_string()),
                ..Default::default()
            }))
        });
        crm.expect_create_message_template().never();

        let (settings, _dir) = settings();
        let result = Bootstrap::new(Arc::new(crm), settings.clone()).run().await;

        assert!(matches!(result, Err(SyncError::Crm(CrmError::Decode(_)))));
        assert!(settings.email_template_id().is_none());
    }
}
