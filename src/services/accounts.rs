use csv::{ReaderBuilder, WriterBuilder};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use crate::error::SyncError;
use crate::models::settings::ZoomAccount;

const HEADERS: [&str; 5] = ["id", "name", "api_key", "secret_key", "base_url"];

// CSV-backed store of Zoom account rows
pub struct AccountStore {
    csv_path: String,
    file_mutex: Mutex<()>,
}

impl AccountStore {
    /// Open the store, creating the file with a header row if needed
    pub fn new(csv_path: &str) -> Result<Self, SyncError> {
        if !Path::new(csv_path).exists() {
            info!("Creating new Zoom account store at {}", csv_path);

            let file = File::create(csv_path)
                .map_err(|e| SyncError::Storage(format!("Failed to create account store: {}", e)))?;
            let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
            writer
                .write_record(HEADERS)
                .map_err(|e| SyncError::Storage(format!("Failed to write headers: {}", e)))?;
            writer
                .flush()
                .map_err(|e| SyncError::Storage(format!("Failed to flush headers: {}", e)))?;
        }

        Ok(Self {
            csv_path: csv_path.to_string(),
            file_mutex: Mutex::new(()),
        })
    }

    /// Every account keyed by id
    pub fn all(&self) -> Result<BTreeMap<i64, ZoomAccount>, SyncError> {
        let _lock = self
            .file_mutex
            .lock()
            .map_err(|e| SyncError::Storage(format!("Failed to acquire mutex: {}", e)))?;
        self.read_all()
    }

    /// Insert the account, replacing any row with the same id
    pub fn upsert(&self, account: ZoomAccount) -> Result<(), SyncError> {
        let _lock = self
            .file_mutex
            .lock()
            .map_err(|e| SyncError::Storage(format!("Failed to acquire mutex: {}", e)))?;

        let mut accounts = self.read_all()?;
        let id = account.id;
        let replaced = accounts.insert(id, account).is_some();

        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.csv_path)
            .map_err(|e| SyncError::Storage(format!("Failed to open account store for writing: {}", e)))?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

        writer
            .write_record(HEADERS)
            .map_err(|e| SyncError::Storage(format!("Failed to write headers: {}", e)))?;
        for account in accounts.values() {
            writer
                .serialize(account)
                .map_err(|e| SyncError::Storage(format!("Failed to write account: {}", e)))?;
        }
        writer
            .flush()
            .map_err(|e| SyncError::Storage(format!("Failed to flush writer: {}", e)))?;

        if replaced {
            info!("Updated Zoom account {}", id);
        } else {
            info!("Added Zoom account {}", id);
        }
        Ok(())
    }

    fn read_all(&self) -> Result<BTreeMap<i64, ZoomAccount>, SyncError> {
        let file = File::open(&self.csv_path)
            .map_err(|e| SyncError::Storage(format!("Failed to open account store: {}", e)))?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        let mut accounts = BTreeMap::new();
        for result in reader.deserialize::<ZoomAccount>() {
            let account =
                result.map_err(|e| SyncError::Storage(format!("Failed to read account: {}", e)))?;
            accounts.insert(account.id, account);
        }
        Ok(accounts)
    }
}
