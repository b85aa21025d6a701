use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ZoomError;
use crate::models::settings::ZoomCredentials;
use crate::models::zoom::{AbsenteesPage, ParticipantsPage, UserEntityList, ZoomEntityKind};

/// Largest page Zoom serves for report-style listings
pub const ZOOM_PAGE_SIZE: u32 = 300;

/// Zoom REST calls used by the sync services.
///
/// Every call takes the account's credentials because a deployment can hold
/// several Zoom accounts and each event names the one it belongs to.
#[async_trait]
pub trait ZoomApi: Send + Sync {
    /// One page of a past webinar's absentees, `page_number` starting at 1
    async fn past_webinar_absentees(
        &self,
        creds: &ZoomCredentials,
        webinar_id: &str,
        page_number: u32,
    ) -> Result<AbsenteesPage, ZoomError>;

    /// Participant list of a past meeting
    async fn past_meeting_participants(
        &self,
        creds: &ZoomCredentials,
        meeting_id: &str,
    ) -> Result<ParticipantsPage, ZoomError>;

    /// Meetings or webinars owned by a Zoom user
    async fn user_entities(
        &self,
        creds: &ZoomCredentials,
        user_id: &str,
        kind: ZoomEntityKind,
    ) -> Result<UserEntityList, ZoomError>;
}

/// Client for the Zoom REST API
#[derive(Clone, Default)]
pub struct ZoomClient {
    client: Client,
}

impl ZoomClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        creds: &ZoomCredentials,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ZoomError> {
        let url = creds.url(path);
        debug!("Zoom API URL: {}", url);

        let res = self
            .client
            .get(&url)
            .query(query)
            .header("Content-Type", "application/json;charset=UTF-8")
            .bearer_auth(creds.bearer_token())
            .send()
            .await?;
        info!("Zoom response received with status: {}", res.status());

        let res = Self::check_status(res).await?;
        Ok(res.json::<T>().await?)
    }

    // Zoom reports failures as {"code": .., "message": ..} with a non-2xx status
    async fn check_status(res: Response) -> Result<Response, ZoomError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        let body = res.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(body);

        Err(ZoomError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ZoomApi for ZoomClient {
    async fn past_webinar_absentees(
        &self,
        creds: &ZoomCredentials,
        webinar_id: &str,
        page_number: u32,
    ) -> Result<AbsenteesPage, ZoomError> {
        info!(
            "Fetching absentees page {} for webinar {}",
            page_number, webinar_id
        );
        self.get_json(
            creds,
            &format!("/past_webinars/{}/absentees", webinar_id),
            &[
                ("page_size", ZOOM_PAGE_SIZE.to_string()),
                ("page_number", page_number.to_string()),
            ],
        )
        .await
    }

    async fn past_meeting_participants(
        &self,
        creds: &ZoomCredentials,
        meeting_id: &str,
    ) -> Result<ParticipantsPage, ZoomError> {
        info!("Fetching participants for meeting {}", meeting_id);
        self.get_json(
            creds,
            &format!("/past_meetings/{}/participants", meeting_id),
            &[("page_size", ZOOM_PAGE_SIZE.to_string())],
        )
        .await
    }

    async fn user_entities(
        &self,
        creds: &ZoomCredentials,
        user_id: &str,
        kind: ZoomEntityKind,
    ) -> Result<UserEntityList, ZoomError> {
        info!("Listing {} for Zoom user {}", kind.collection(), user_id);
        self.get_json(
            creds,
            &format!("/users/{}/{}", user_id, kind.collection()),
            &[],
        )
        .await
    }
}
