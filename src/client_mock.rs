use async_trait::async_trait;
use mockall::mock;
use serde_json::{Map, Value};

use crate::client::ZoomApi;
use crate::crm::CrmApi;
use crate::error::{CrmError, ZoomError};
use crate::models::crm::{
    CrmEvent, MailParams, MessageTemplate, NewMessageTemplate, RegisteredParticipant,
    TemplateLookup,
};
use crate::models::settings::ZoomCredentials;
use crate::models::zoom::{
    AbsenteesPage, ParticipantsPage, UserEntityList, ZoomEntityKind, ZoomParticipant,
    ZoomRegistrant,
};

// Mock of the Zoom REST API
mock! {
    pub Zoom {}

    #[async_trait]
    impl ZoomApi for Zoom {
        async fn past_webinar_absentees(
            &self,
            creds: &ZoomCredentials,
            webinar_id: &str,
            page_number: u32,
        ) -> Result<AbsenteesPage, ZoomError>;

        async fn past_meeting_participants(
            &self,
            creds: &ZoomCredentials,
            meeting_id: &str,
        ) -> Result<ParticipantsPage, ZoomError>;

        async fn user_entities(
            &self,
            creds: &ZoomCredentials,
            user_id: &str,
            kind: ZoomEntityKind,
        ) -> Result<UserEntityList, ZoomError>;
    }
}

// Mock of the CRM entity API
mock! {
    pub Crm {}

    #[async_trait]
    impl CrmApi for Crm {
        async fn get_events(&self, filter: Value) -> Result<Vec<CrmEvent>, CrmError>;

        async fn event_field(&self, event_id: i64, field: &str) -> Result<Option<String>, CrmError>;

        async fn registered_participants(
            &self,
            event_id: i64,
        ) -> Result<Vec<RegisteredParticipant>, CrmError>;

        async fn set_participant_status(
            &self,
            event_id: i64,
            participant_id: i64,
            status: &str,
        ) -> Result<(), CrmError>;

        async fn find_custom_group(&self, name: &str) -> Result<Option<i64>, CrmError>;

        async fn create_custom_group(&self, params: Value) -> Result<i64, CrmError>;

        async fn find_custom_field(
            &self,
            name: &str,
            custom_group_id: Option<i64>,
        ) -> Result<Option<i64>, CrmError>;

        async fn create_custom_field(&self, params: Value) -> Result<i64, CrmError>;

        async fn latest_custom_value(
            &self,
            entity_id: i64,
            field: &str,
        ) -> Result<Option<String>, CrmError>;

        async fn write_custom_values(
            &self,
            entity_id: i64,
            values: Map<String, Value>,
        ) -> Result<Value, CrmError>;

        async fn message_template(
            &self,
            lookup: TemplateLookup,
        ) -> Result<Option<MessageTemplate>, CrmError>;

        async fn create_message_template(&self, template: NewMessageTemplate) -> Result<i64, CrmError>;

        async fn profile_field_names(&self, profile_id: i64) -> Result<Vec<String>, CrmError>;

        async fn default_from_address(&self) -> Result<Option<String>, CrmError>;

        async fn send_email(&self, mail: MailParams) -> Result<(), CrmError>;
    }
}

// Fixture helpers shared by the service and handler tests

pub fn registrant(first: &str, last: &str, email: &str, create_time: &str) -> ZoomRegistrant {
    ZoomRegistrant {
        id: Some(format!("reg_{}", first.to_lowercase())),
        email: email.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        create_time: Some(create_time.to_string()),
        status: Some("approved".to_string()),
    }
}

pub fn absentees_page(page_number: u32, page_count: u32, emails: &[&str]) -> AbsenteesPage {
    AbsenteesPage {
        page_count,
        page_number,
        page_size: 300,
        total_records: emails.len() as u32,
        registrants: emails
            .iter()
            .map(|email| ZoomRegistrant {
                email: email.to_string(),
                ..Default::default()
            })
            .collect(),
    }
}

pub fn participants_page(emails: &[&str]) -> ParticipantsPage {
    ParticipantsPage {
        page_count: 1,
        page_size: 300,
        total_records: emails.len() as u32,
        next_page_token: None,
        participants: emails
            .iter()
            .map(|email| ZoomParticipant {
                user_email: Some(email.to_string()),
                ..Default::default()
            })
            .collect(),
    }
}

pub fn crm_participant(participant_id: i64, contact_id: i64, emails: &[&str]) -> RegisteredParticipant {
    RegisteredParticipant {
        participant_id,
        contact_id,
        emails: emails.iter().map(|email| email.to_string()).collect(),
    }
}
