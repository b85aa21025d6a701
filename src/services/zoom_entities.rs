use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::client::ZoomApi;
use crate::error::SyncError;
use crate::models::zoom::{UserEntityList, ZoomEntityKind};
use crate::services::settings::SettingsService;

// A Zoom user's meetings or webinars with an id => topic lookup
#[derive(Debug, Clone, Serialize)]
pub struct UserEntities {
    pub kind: ZoomEntityKind,
    pub list: UserEntityList,
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EntityValidation {
    Valid { entities: UserEntities },
    Invalid { message: String },
}

/// Looks up and validates the Zoom meetings and webinars of a user
pub struct ZoomEntityService {
    zoom: Arc<dyn ZoomApi>,
    settings: Arc<SettingsService>,
}

impl ZoomEntityService {
    pub fn new(zoom: Arc<dyn ZoomApi>, settings: Arc<SettingsService>) -> Self {
        Self { zoom, settings }
    }

    /// Meetings or webinars of `user_id` under the given account.
    ///
    /// `Err(message)` carries the text shown to the admin when the list
    /// cannot be fetched.
    pub async fn meetings_webinars_by_user_id(
        &self,
        account_id: Option<i64>,
        user_id: &str,
        kind: ZoomEntityKind,
    ) -> Result<Result<UserEntities, String>, SyncError> {
        let settings = self.settings.zoom_settings(account_id)?;
        let creds = settings.credentials().ok_or_else(|| {
            SyncError::NotConfigured(format!("Zoom credentials for account {:?}", account_id))
        })?;

        let list = match self.zoom.user_entities(&creds, user_id, kind).await {
            Ok(list) => list,
            Err(err) => {
                warn!("Listing {} of user {} failed: {}", kind.collection(), user_id, err);
                return Ok(Err(format!("User ID: {} does not exists", user_id)));
            }
        };

        if list.entries(kind).is_empty() {
            if let Some(message) = list.message.clone() {
                return Ok(Err(message));
            }
        }

        let options = list
            .entries(kind)
            .iter()
            .map(|entry| (entry.id.clone(), entry.topic.clone()))
            .collect();

        info!(
            "User {} has {} {}",
            user_id,
            list.entries(kind).len(),
            kind.collection()
        );
        Ok(Ok(UserEntities {
            kind,
            list,
            options,
        }))
    }

    /// Check that a meeting/webinar id belongs to the Zoom user
    pub async fn validate_meeting_webinar_by_user_id(
        &self,
        account_id: Option<i64>,
        user_id: &str,
        entity_id: &str,
        kind: ZoomEntityKind,
    ) -> Result<EntityValidation, SyncError> {
        if user_id.trim().is_empty() || entity_id.trim().is_empty() {
            return Err(SyncError::MissingParams(
                "user_id and entity id are required".to_string(),
            ));
        }

        let entities = match self
            .meetings_webinars_by_user_id(account_id, user_id, kind)
            .await?
        {
            Ok(entities) => entities,
            Err(message) => return Ok(EntityValidation::Invalid { message }),
        };

        if entities.options.is_empty() {
            return Ok(EntityValidation::Invalid {
                message: format!("No {} found for this user.", kind),
            });
        }

        if !entities.options.contains_key(entity_id.trim()) {
            return Ok(EntityValidation::Invalid {
                message: format!(
                    "{} ID ({}) not found for this user ID: {} ",
                    kind, entity_id, user_id
                ),
            });
        }

        Ok(EntityValidation::Valid { entities })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_mock::MockZoom;
    use crate::error::ZoomError;
    use crate::models::settings::{GlobalSettings, ZoomAccount};
    use crate::models::zoom::ZoomEntitySummary;
    use crate::services::accounts::AccountStore;
    use tempfile::{tempdir, TempDir};

    fn service(zoom: MockZoom) -> (ZoomEntityService, TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.csv");
        let store = AccountStore::new(path.to_str().unwrap()).unwrap();
        store
            .upsert(ZoomAccount {
                id: 1,
                name: "Main".to_string(),
                api_key: "k".to_string(),
                secret_key: "s".to_string(),
                base_url: "https://api.zoom.us/v2".to_string(),
            })
            .unwrap();
        let settings = SettingsService::new(GlobalSettings::default(), store);
        (ZoomEntityService::new(Arc::new(zoom), Arc::new(settings)), dir)
    }

    fn meetings(ids: &[&str]) -> UserEntityList {
        UserEntityList {
            page_size: Some(30),
            total_records: Some(ids.len() as u32),
            meetings: ids
                .iter()
                .map(|id| ZoomEntitySummary {
                    id: id.to_string(),
                    topic: format!("Topic {}", id),
                    start_time: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_valid_meeting_id() {
        let mut zoom = MockZoom::new();
        zoom.expect_user_entities()
            .withf(|_, user, kind| user == "host@example.org" && *kind == ZoomEntityKind::Meeting)
            .returning(|_, _, _| Ok(meetings(&["111", "222"])));

        let (service, _dir) = service(zoom);
        let result = service
            .validate_meeting_webinar_by_user_id(Some(1), "host@example.org", "222", ZoomEntityKind::Meeting)
            .await
            .unwrap();

        match result {
            EntityValidation::Valid { entities } => {
                assert_eq!(entities.options["111"], "Topic 111");
            }
            other => panic!("expected valid, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_meeting_id() {
        let mut zoom = MockZoom::new();
        zoom.expect_user_entities()
            .returning(|_, _, _| Ok(meetings(&["111"])));

        let (service, _dir) = service(zoom);
        let result = service
            .validate_meeting_webinar_by_user_id(Some(1), "host", "999", ZoomEntityKind::Meeting)
            .await
            .unwrap();

        match result {
            EntityValidation::Invalid { message } => {
                assert_eq!(message, "Meeting ID (999) not found for this user ID: host ");
            }
            other => panic!("expected invalid, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_user_without_webinars() {
        let mut zoom = MockZoom::new();
        zoom.expect_user_entities()
            .returning(|_, _, _| Ok(UserEntityList::default()));

        let (service, _dir) = service(zoom);
        let result = service
            .validate_meeting_webinar_by_user_id(Some(1), "host", "1", ZoomEntityKind::Webinar)
            .await
            .unwrap();

        match result {
            EntityValidation::Invalid { message } => {
                assert_eq!(message, "No Webinar found for this user.");
            }
            other => panic!("expected invalid, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let mut zoom = MockZoom::new();
        zoom.expect_user_entities().returning(|_, _, _| {
            Err(ZoomError::Api {
                status: 404,
                message: "User does not exist: ghost".into(),
            })
        });

        let (service, _dir) = service(zoom);
        let result = service
            .meetings_webinars_by_user_id(Some(1), "ghost", ZoomEntityKind::Meeting)
            .await
            .unwrap();
        assert_eq!(result.unwrap_err(), "User ID: ghost does not exists");
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let (service, _dir) = service(MockZoom::new());
        let result = service
            .meetings_webinars_by_user_id(None, "host", ZoomEntityKind::Meeting)
            .await;
        assert!(matches!(result, Err(SyncError::NotConfigured(_))));
    }
}
