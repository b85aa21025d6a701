use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::common::opt_id_from_any;
use crate::models::zoom::{ZoomEntityKind, ZoomRegistrant};
use crate::services::registrants::DEFAULT_MINS_BACK;

// Body of the attendance generation endpoint
#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub days: Option<u32>,
}

// Registrants pushed for an event, as returned by Zoom
#[derive(Debug, Deserialize)]
pub struct RegistrantsRequest {
    pub registrants: Vec<ZoomRegistrant>,
    #[serde(default = "default_mins_back")]
    pub mins_back: i64,
    /// Comma-separated recipients; no email is sent when absent
    #[serde(default)]
    pub notify_emails: Option<String>,
    #[serde(default)]
    pub event_title: Option<String>,
}

pub fn default_mins_back() -> i64 {
    DEFAULT_MINS_BACK
}

#[derive(Debug, Serialize)]
pub struct RegistrantsResponse {
    pub success: bool,
    pub event_id: i64,
    pub recent_registrants: usize,
    pub notes: Option<String>,
    pub emails: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ZoomDataRequest {
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct ZoomDataResponse {
    pub success: bool,
    pub participant_id: i64,
    pub updated: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileCheckRequest {
    #[serde(default)]
    pub profile_ids: Vec<i64>,
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileCheckResponse {
    pub missing_fields: Option<Vec<String>>,
}

// Account selection shared by the Zoom user endpoints
#[derive(Debug, Default, Deserialize)]
pub struct AccountQuery {
    #[serde(default, deserialize_with = "opt_id_from_any")]
    pub account_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    #[serde(default, deserialize_with = "opt_id_from_any")]
    pub account_id: Option<i64>,
    pub user_id: String,
    pub entity: ZoomEntityKind,
    pub entity_id: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}
