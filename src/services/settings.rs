use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::crm::CrmApi;
use crate::error::SyncError;
use crate::models::settings::{GlobalSettings, ZoomAccount, ZoomSettings};
use crate::services::accounts::AccountStore;

/// Placeholder entry at the top of account pickers
pub const SELECT_PLACEHOLDER: &str = "--select--";

/// Access to global Zoom settings and the configured accounts.
///
/// Global settings are held in memory and, when a path is configured,
/// written back to that JSON file on change.
pub struct SettingsService {
    settings_path: Option<PathBuf>,
    global: RwLock<GlobalSettings>,
    write_mutex: Mutex<()>,
    accounts: AccountStore,
}

fn custom_field_name(id: Option<i64>) -> Option<String> {
    id.map(|id| format!("custom_{}", id))
}

impl SettingsService {
    /// Settings injected directly, nothing persisted on change
    pub fn new(global: GlobalSettings, accounts: AccountStore) -> Self {
        Self {
            settings_path: None,
            global: RwLock::new(global),
            write_mutex: Mutex::new(()),
            accounts,
        }
    }

    /// Load global settings from a JSON file. A missing file means defaults.
    pub fn load(settings_path: &Path, accounts: AccountStore) -> Result<Self, SyncError> {
        let global = if settings_path.exists() {
            let raw = fs::read_to_string(settings_path)
                .map_err(|e| SyncError::Storage(format!("Failed to read settings: {}", e)))?;
            serde_json::from_str(&raw)
                .map_err(|e| SyncError::Storage(format!("Invalid settings file: {}", e)))?
        } else {
            warn!(
                "Settings file {} not found, starting with empty Zoom settings",
                settings_path.display()
            );
            GlobalSettings::default()
        };

        info!("Loaded Zoom settings from {}", settings_path.display());
        Ok(Self {
            settings_path: Some(settings_path.to_path_buf()),
            global: RwLock::new(global),
            write_mutex: Mutex::new(()),
            accounts,
        })
    }

    pub fn global(&self) -> GlobalSettings {
        self.global
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Global settings, merged with the account's when an id is given
    pub fn zoom_settings(&self, account_id: Option<i64>) -> Result<ZoomSettings, SyncError> {
        let global = self.global();
        let Some(id) = account_id else {
            return Ok(ZoomSettings::merge(&global, None));
        };

        let account = self.account_by_id_or_name(Some(id), None)?;
        if account.is_none() {
            warn!("Zoom account {} not found, using global settings only", id);
        }
        Ok(ZoomSettings::merge(&global, account.as_ref()))
    }

    pub fn all_accounts(&self) -> Result<BTreeMap<i64, ZoomAccount>, SyncError> {
        self.accounts.all()
    }

    /// Look an account up by id, falling back to its name
    pub fn account_by_id_or_name(
        &self,
        id: Option<i64>,
        name: Option<&str>,
    ) -> Result<Option<ZoomAccount>, SyncError> {
        if id.is_none() && name.is_none() {
            return Ok(None);
        }

        let mut accounts = self.accounts.all()?;
        if let Some(account) = id.and_then(|id| accounts.remove(&id)) {
            return Ok(Some(account));
        }

        Ok(name.and_then(|name| accounts.into_values().find(|account| account.name == name)))
    }

    /// `0 => "--select--"` followed by every account's id and name
    pub fn account_names_and_ids(&self) -> Result<BTreeMap<i64, String>, SyncError> {
        let mut list = BTreeMap::new();
        list.insert(0, SELECT_PLACEHOLDER.to_string());
        for (id, account) in self.accounts.all()? {
            list.insert(id, account.name);
        }
        Ok(list)
    }

    pub fn upsert_account(&self, account: ZoomAccount) -> Result<(), SyncError> {
        self.accounts.upsert(account)
    }

    pub fn webinar_custom_field(&self) -> Option<String> {
        custom_field_name(self.global().custom_field_id_webinar)
    }

    pub fn meeting_custom_field(&self) -> Option<String> {
        custom_field_name(self.global().custom_field_id_meeting)
    }

    pub fn account_id_custom_field(&self) -> Option<String> {
        custom_field_name(self.global().custom_field_account_id)
    }

    pub fn email_template_id(&self) -> Option<i64> {
        self.global().registrants_email_template_id
    }

    pub fn sync_fields(&self) -> Vec<String> {
        self.global().sync_zoom_data_fields
    }

    pub fn set_email_template_id(&self, template_id: i64) -> Result<(), SyncError> {
        self.update(|global| global.registrants_email_template_id = Some(template_id))
    }

    /// Apply a change to the global settings and persist it
    pub fn update<F>(&self, change: F) -> Result<(), SyncError>
    where
        F: FnOnce(&mut GlobalSettings),
    {
        let _lock = self
            .write_mutex
            .lock()
            .map_err(|e| SyncError::Storage(format!("Failed to acquire mutex: {}", e)))?;

        let mut updated = self.global();
        change(&mut updated);

        if let Some(path) = &self.settings_path {
            let raw = serde_json::to_string_pretty(&updated)
                .map_err(|e| SyncError::Storage(format!("Failed to encode settings: {}", e)))?;
            fs::write(path, raw)
                .map_err(|e| SyncError::Storage(format!("Failed to write settings: {}", e)))?;
            info!("Saved Zoom settings to {}", path.display());
        }

        *self
            .global
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = updated;
        Ok(())
    }

    /// Zoom account id stored on an event, spaces removed
    pub async fn account_id_for_event(
        &self,
        crm: &dyn CrmApi,
        event_id: i64,
    ) -> Result<Option<i64>, SyncError> {
        let Some(field) = self.account_id_custom_field() else {
            return Err(SyncError::NotConfigured(
                "account id custom field".to_string(),
            ));
        };

        let value = crm.event_field(event_id, &field).await?;
        Ok(value.and_then(|raw| match raw.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!("Event {} has a non-numeric Zoom account id: {}", event_id, raw);
                None
            }
        }))
    }

    /// Settings of the Zoom account an event is linked to
    pub async fn zoom_settings_for_event(
        &self,
        crm: &dyn CrmApi,
        event_id: i64,
    ) -> Result<ZoomSettings, SyncError> {
        let account_id = self
            .account_id_for_event(crm, event_id)
            .await?
            .ok_or_else(|| {
                SyncError::NotConfigured(format!("event {} has no Zoom account", event_id))
            })?;

        let account = self
            .account_by_id_or_name(Some(account_id), None)?
            .ok_or_else(|| {
                SyncError::NotConfigured(format!("Zoom account {} does not exist", account_id))
            })?;

        Ok(ZoomSettings::merge(&self.global(), Some(&account)))
    }
}
