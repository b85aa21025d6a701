use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::common::string_from_any;

/// The two kinds of Zoom sessions an event can be linked to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoomEntityKind {
    #[serde(alias = "webinar", alias = "webinars")]
    Webinar,
    #[serde(alias = "meeting", alias = "meetings")]
    Meeting,
}

impl ZoomEntityKind {
    /// Collection name used in Zoom URLs and list responses
    pub fn collection(&self) -> &'static str {
        match self {
            ZoomEntityKind::Webinar => "webinars",
            ZoomEntityKind::Meeting => "meetings",
        }
    }
}

impl fmt::Display for ZoomEntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoomEntityKind::Webinar => write!(f, "Webinar"),
            ZoomEntityKind::Meeting => write!(f, "Meeting"),
        }
    }
}

impl FromStr for ZoomEntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "webinar" | "webinars" => Ok(ZoomEntityKind::Webinar),
            "meeting" | "meetings" => Ok(ZoomEntityKind::Meeting),
            other => Err(format!("unknown Zoom entity: {}", other)),
        }
    }
}

// Webinar registrant, also the shape of an absentee record
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ZoomRegistrant {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

// GET /past_webinars/{id}/absentees
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AbsenteesPage {
    #[serde(default)]
    pub page_count: u32,
    #[serde(default)]
    pub page_number: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub total_records: u32,
    #[serde(default)]
    pub registrants: Vec<ZoomRegistrant>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoomParticipant {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub join_time: Option<String>,
    #[serde(default)]
    pub leave_time: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
}

// GET /past_meetings/{id}/participants
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticipantsPage {
    #[serde(default)]
    pub page_count: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub total_records: u32,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub participants: Vec<ZoomParticipant>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZoomEntitySummary {
    #[serde(deserialize_with = "string_from_any")]
    pub id: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub start_time: Option<String>,
}

// GET /users/{id}/meetings and /users/{id}/webinars
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserEntityList {
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub total_records: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meetings: Vec<ZoomEntitySummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub webinars: Vec<ZoomEntitySummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UserEntityList {
    pub fn entries(&self, kind: ZoomEntityKind) -> &[ZoomEntitySummary] {
        match kind {
            ZoomEntityKind::Webinar => &self.webinars,
            ZoomEntityKind::Meeting => &self.meetings,
        }
    }
}
