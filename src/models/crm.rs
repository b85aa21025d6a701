use serde::{Deserialize, Serialize};

use crate::models::common::{id_from_any, opt_id_from_any};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrmEvent {
    #[serde(deserialize_with = "id_from_any")]
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

// A registered participant of an event together with every email of its contact
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisteredParticipant {
    pub participant_id: i64,
    pub contact_id: i64,
    #[serde(default)]
    pub emails: Vec<String>,
}

// Participant whose status gets set to Attended
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attendee {
    pub email: String,
    pub contact_id: i64,
    pub participant_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageTemplate {
    #[serde(default, deserialize_with = "opt_id_from_any")]
    pub id: Option<i64>,
    #[serde(default)]
    pub msg_title: Option<String>,
    #[serde(default)]
    pub msg_subject: String,
    #[serde(default)]
    pub msg_html: String,
    #[serde(default)]
    pub msg_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateLookup {
    Title(String),
    Id(i64),
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessageTemplate {
    pub msg_title: String,
    pub msg_html: String,
    pub msg_subject: String,
}

// Rendered email ready for dispatch
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MailParams {
    pub template_id: i64,
    pub to_name: String,
    pub to_email: String,
    pub from: Option<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
}
