use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::error::CrmError;
use crate::models::common::{as_i64, plain_string};
use crate::models::crm::{
    CrmEvent, MailParams, MessageTemplate, NewMessageTemplate, RegisteredParticipant,
    TemplateLookup,
};

/// CRM entity calls used by the sync services
#[async_trait]
pub trait CrmApi: Send + Sync {
    /// Events matching an `Event.get` filter, all pages
    async fn get_events(&self, filter: Value) -> Result<Vec<CrmEvent>, CrmError>;

    /// A single field of an event, `None` when empty
    async fn event_field(&self, event_id: i64, field: &str) -> Result<Option<String>, CrmError>;

    /// Participants of an event with every email of their contact
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

    /// Id of the custom field with this name, optionally inside one group.
    /// Ambiguous names resolve to `None`.
    async fn find_custom_field(
        &self,
        name: &str,
        custom_group_id: Option<i64>,
    ) -> Result<Option<i64>, CrmError>;

    async fn create_custom_field(&self, params: Value) -> Result<i64, CrmError>;

    /// Latest stored value of `custom_<N>` for an entity
    async fn latest_custom_value(
        &self,
        entity_id: i64,
        field: &str,
    ) -> Result<Option<String>, CrmError>;

    /// Write several `custom_<N>` values of one entity in a single call
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

    /// Field names of a profile (UF group)
    async fn profile_field_names(&self, profile_id: i64) -> Result<Vec<String>, CrmError>;

    async fn default_from_address(&self) -> Result<Option<String>, CrmError>;

    async fn send_email(&self, mail: MailParams) -> Result<(), CrmError>;
}

/// Client for the CiviCRM APIv3 REST endpoint
#[derive(Clone)]
pub struct CrmClient {
    client: Client,
    base_url: String,
    api_key: String,
    site_key: String,
}

impl CrmClient {
    pub fn new(base_url: &str, api_key: &str, site_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            site_key: site_key.to_string(),
        }
    }

    /// Perform one `entity.action` call and return the full response body.
    ///
    /// The endpoint answers HTTP 200 for API-level failures too; those carry
    /// `is_error: 1` and are turned into `CrmError::Api`.
    pub async fn call(&self, entity: &str, action: &str, params: Value) -> Result<Value, CrmError> {
        let url = format!("{}/civicrm/ajax/rest", self.base_url);
        let json_params = params.to_string();
        debug!("CRM call {}.{} with {}", entity, action, json_params);

        let res = self
            .client
            .post(&url)
            .query(&[
                ("entity", entity),
                ("action", action),
                ("json", json_params.as_str()),
            ])
            .header("X-Civi-Auth", format!("Bearer {}", self.api_key))
            .header("X-Civi-Key", &self.site_key)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await?
            .error_for_status()?;

        let body: Value = res.json().await?;

        if body.get("is_error").and_then(as_i64).unwrap_or(0) != 0 {
            let message = body
                .get("error_message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            warn!("CRM {}.{} failed: {}", entity, action, message);
            return Err(CrmError::Api {
                entity: entity.to_string(),
                action: action.to_string(),
                message,
            });
        }

        Ok(body)
    }

    fn values(body: &Value) -> Vec<Value> {
        match body.get("values") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Object(map)) => map.values().cloned().collect(),
            _ => Vec::new(),
        }
    }

    fn first_value(body: &Value) -> Option<Value> {
        Self::values(body).into_iter().next()
    }

    fn created_id(entity: &str, body: &Value) -> Result<i64, CrmError> {
        body.get("id")
            .and_then(as_i64)
            .or_else(|| {
                Self::first_value(body)
                    .as_ref()
                    .and_then(|v| v.get("id"))
                    .and_then(as_i64)
            })
            .ok_or_else(|| CrmError::Decode(format!("{}.create returned no id", entity)))
    }
}

// Strip all spaces the way ids typed into event forms need it
fn compact(value: &str) -> String {
    value.trim().replace(' ', "")
}

#[async_trait]
impl CrmApi for CrmClient {
    async fn get_events(&self, filter: Value) -> Result<Vec<CrmEvent>, CrmError> {
        let mut params = json!({
            "sequential": 1,
            "return": ["id", "title", "start_date", "end_date"],
            "options": { "limit": 0 },
        });
        if let (Some(target), Value::Object(extra)) = (params.as_object_mut(), filter) {
            target.extend(extra);
        }

        let body = self.call("Event", "get", params).await?;
        Self::values(&body)
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(|e| CrmError::Decode(e.to_string())))
            .collect()
    }

    async fn event_field(&self, event_id: i64, field: &str) -> Result<Option<String>, CrmError> {
        let body = self
            .call(
                "Event",
                "get",
                json!({ "sequential": 1, "return": [field], "id": event_id }),
            )
            .await?;

        Ok(Self::first_value(&body)
            .as_ref()
            .and_then(|event| event.get(field))
            .and_then(plain_string)
            .map(|value| compact(&value))
            .filter(|value| !value.is_empty()))
    }

    async fn registered_participants(
        &self,
        event_id: i64,
    ) -> Result<Vec<RegisteredParticipant>, CrmError> {
        let body = self
            .call(
                "Participant",
                "get",
                json!({
                    "sequential": 1,
                    "event_id": event_id,
                    "return": ["id", "contact_id"],
                    "options": { "limit": 0 },
                    "api.Email.get": { "return": ["email"], "options": { "limit": 0 } },
                }),
            )
            .await?;

        let mut participants = Vec::new();
        for value in Self::values(&body) {
            let (Some(participant_id), Some(contact_id)) = (
                value.get("id").and_then(as_i64),
                value.get("contact_id").and_then(as_i64),
            ) else {
                warn!("Skipping participant record without ids: {}", value);
                continue;
            };

            let emails = value
                .pointer("/api.Email.get/values")
                .and_then(Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .filter_map(|email| email.get("email").and_then(Value::as_str))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            participants.push(RegisteredParticipant {
                participant_id,
                contact_id,
                emails,
            });
        }

        info!(
            "Found {} registered participants for event {}",
            participants.len(),
            event_id
        );
        Ok(participants)
    }

    async fn set_participant_status(
        &self,
        event_id: i64,
        participant_id: i64,
        status: &str,
    ) -> Result<(), CrmError> {
        self.call(
            "Participant",
            "create",
            json!({ "event_id": event_id, "id": participant_id, "status_id": status }),
        )
        .await?;
        Ok(())
    }

    async fn find_custom_group(&self, name: &str) -> Result<Option<i64>, CrmError> {
        let body = self
            .call(
                "CustomGroup",
                "get",
                json!({ "sequential": 1, "name": name, "return": ["id"] }),
            )
            .await?;
        Ok(Self::first_value(&body)
            .as_ref()
            .and_then(|group| group.get("id"))
            .and_then(as_i64))
    }

    async fn create_custom_group(&self, params: Value) -> Result<i64, CrmError> {
        let body = self.call("CustomGroup", "create", params).await?;
        Self::created_id("CustomGroup", &body)
    }

    async fn find_custom_field(
        &self,
        name: &str,
        custom_group_id: Option<i64>,
    ) -> Result<Option<i64>, CrmError> {
        let mut params = json!({ "sequential": 1, "name": name });
        if let Some(group_id) = custom_group_id {
            params["custom_group_id"] = json!(group_id);
        }

        let body = self.call("CustomField", "get", params).await?;
        let fields = Self::values(&body);
        if fields.len() != 1 {
            debug!("Custom field {} matched {} records", name, fields.len());
            return Ok(None);
        }
        Ok(fields[0].get("id").and_then(as_i64))
    }

    async fn create_custom_field(&self, params: Value) -> Result<i64, CrmError> {
        let body = self.call("CustomField", "create", params).await?;
        Self::created_id("CustomField", &body)
    }

    async fn latest_custom_value(
        &self,
        entity_id: i64,
        field: &str,
    ) -> Result<Option<String>, CrmError> {
        let mut params = json!({ "sequential": 1, "entity_id": entity_id });
        params[format!("return.{}", field)] = json!(1);

        let body = self.call("CustomValue", "get", params).await?;
        Ok(Self::first_value(&body)
            .as_ref()
            .and_then(|value| value.get("latest"))
            .and_then(plain_string)
            .filter(|value| !value.is_empty()))
    }

    async fn write_custom_values(
        &self,
        entity_id: i64,
        values: Map<String, Value>,
    ) -> Result<Value, CrmError> {
        let mut params = values;
        params.insert("entity_id".to_string(), json!(entity_id));

        let body = self
            .call("CustomValue", "create", Value::Object(params))
            .await?;
        Ok(body.get("values").cloned().unwrap_or(Value::Null))
    }

    async fn message_template(
        &self,
        lookup: TemplateLookup,
    ) -> Result<Option<MessageTemplate>, CrmError> {
        let params = match lookup {
            TemplateLookup::Title(title) => json!({ "sequential": 1, "msg_title": title }),
            TemplateLookup::Id(id) => json!({ "sequential": 1, "id": id }),
        };

        let body = self.call("MessageTemplate", "get", params).await?;
        Self::first_value(&body)
            .map(|v| serde_json::from_value(v).map_err(|e| CrmError::Decode(e.to_string())))
            .transpose()
    }

    async fn create_message_template(&self, template: NewMessageTemplate) -> Result<i64, CrmError> {
        let params =
            serde_json::to_value(&template).map_err(|e| CrmError::Decode(e.to_string()))?;
        let body = self.call("MessageTemplate", "create", params).await?;
        Self::created_id("MessageTemplate", &body)
    }

    async fn profile_field_names(&self, profile_id: i64) -> Result<Vec<String>, CrmError> {
        let body = self
            .call(
                "UFField",
                "get",
                json!({ "sequential": 1, "uf_group_id": profile_id, "options": { "limit": 0 } }),
            )
            .await?;

        Ok(Self::values(&body)
            .iter()
            .filter_map(|field| field.get("field_name").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    async fn default_from_address(&self) -> Result<Option<String>, CrmError> {
        let body = self
            .call(
                "OptionValue",
                "get",
                json!({
                    "sequential": 1,
                    "option_group_id": "from_email_address",
                    "is_default": 1,
                    "return": ["label"],
                }),
            )
            .await?;

        Ok(Self::first_value(&body)
            .as_ref()
            .and_then(|option| option.get("label"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn send_email(&self, mail: MailParams) -> Result<(), CrmError> {
        // Content is already rendered, so the template send is used purely as
        // a delivery channel with its text overridden and Smarty disabled.
        let mut params = json!({
            "id": mail.template_id,
            "to_name": mail.to_name,
            "to_email": mail.to_email,
            "disableSmarty": 1,
            "messageTemplate": {
                "msg_subject": mail.subject,
                "msg_html": mail.html,
                "msg_text": mail.text,
            },
        });
        if let Some(from) = mail.from {
            params["from"] = json!(from);
        }

        self.call("MessageTemplate", "send", params).await?;
        Ok(())
    }
}
