use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::auth::ZoomAuth;

const REDACTED: &str = "********";

/// Settings shared by every Zoom account
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GlobalSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_field_id_webinar: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_field_id_meeting: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_field_account_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrants_email_template_id: Option<i64>,
    #[serde(default)]
    pub sync_zoom_data_fields: Vec<String>,
    // Single-account installs keep credentials here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    // Keys this service does not interpret are kept on write-back
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One configured Zoom account, a row of the account store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZoomAccount {
    pub id: i64,
    pub name: String,
    pub api_key: String,
    pub secret_key: String,
    pub base_url: String,
}

/// Credentials needed to call the Zoom API for one account
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomCredentials {
    pub api_key: String,
    pub secret_key: String,
    pub base_url: String,
}

impl ZoomCredentials {
    pub fn bearer_token(&self) -> String {
        ZoomAuth::token_now(&self.api_key, &self.secret_key)
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Global settings with an account's values merged over them
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ZoomSettings {
    pub account_id: Option<i64>,
    pub account_name: Option<String>,
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub base_url: Option<String>,
    pub custom_field_id_webinar: Option<i64>,
    pub custom_field_id_meeting: Option<i64>,
    pub custom_field_account_id: Option<i64>,
    pub registrants_email_template_id: Option<i64>,
    pub sync_zoom_data_fields: Vec<String>,
}

impl ZoomSettings {
    /// Account values replace global values for the keys both define
    pub fn merge(global: &GlobalSettings, account: Option<&ZoomAccount>) -> Self {
        let mut settings = ZoomSettings {
            account_id: None,
            account_name: None,
            api_key: global.api_key.clone(),
            secret_key: global.secret_key.clone(),
            base_url: global.base_url.clone(),
            custom_field_id_webinar: global.custom_field_id_webinar,
            custom_field_id_meeting: global.custom_field_id_meeting,
            custom_field_account_id: global.custom_field_account_id,
            registrants_email_template_id: global.registrants_email_template_id,
            sync_zoom_data_fields: global.sync_zoom_data_fields.clone(),
        };

        if let Some(account) = account {
            settings.account_id = Some(account.id);
            settings.account_name = Some(account.name.clone());
            settings.api_key = Some(account.api_key.clone());
            settings.secret_key = Some(account.secret_key.clone());
            settings.base_url = Some(account.base_url.clone());
        }

        settings
    }

    /// Credentials when key, secret and base URL are all present
    pub fn credentials(&self) -> Option<ZoomCredentials> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Some(ZoomCredentials {
            api_key: present(&self.api_key)?,
            secret_key: present(&self.secret_key)?,
            base_url: present(&self.base_url)?,
        })
    }

    /// Copy safe to return over HTTP
    pub fn redacted(&self) -> Self {
        let mask = |value: &Option<String>| value.as_ref().map(|_| REDACTED.to_string());
        ZoomSettings {
            api_key: mask(&self.api_key),
            secret_key: mask(&self.secret_key),
            ..self.clone()
        }
    }
}
