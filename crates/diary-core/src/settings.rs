//! External-service settings record
//!
//! A single [`AppSettings`] document in the local store. Updates merge
//! only the fields present in the patch; a blank value turns the feature off.

use tracing::info;

use crate::models::AppSettings;
use crate::storage::{LocalStore, StorageResult, StoreKey};

/// Names accepted by [`SettingsStore::set_field`]
pub const SETTING_KEYS: [&str; 4] = [
    "gemini_api_key",
    "spreadsheet_id",
    "spreadsheet_url",
    "apps_script_url",
];

#[derive(Debug, Clone)]
pub struct SettingsStore {
    store: LocalStore,
}

impl SettingsStore {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Current settings; all fields absent if never saved
    pub fn get(&self) -> StorageResult<AppSettings> {
        self.store.get(StoreKey::Settings)
    }

    /// Merge `patch` into the stored settings and return the result
    pub fn update(&self, patch: AppSettings) -> StorageResult<AppSettings> {
        let merged = self
            .store
            .modify(StoreKey::Settings, |settings: &mut AppSettings| {
                settings.merge(patch);
                Some(settings.clone())
            })?
            .unwrap_or_default();

        info!(
            gemini = merged.has_gemini_key(),
            spreadsheet = merged.has_spreadsheet_id(),
            apps_script = merged.has_apps_script_url(),
            "updated settings"
        );
        Ok(merged)
    }

    /// Set one field by its snake_case name
    ///
    /// Returns `Ok(None)` for an unknown key without touching storage.
    pub fn set_field(&self, key: &str, value: &str) -> StorageResult<Option<AppSettings>> {
        let value = Some(value.to_string());
        let patch = match key {
            "gemini_api_key" => AppSettings {
                gemini_api_key: value,
                ..AppSettings::default()
            },
            "spreadsheet_id" => AppSettings {
                spreadsheet_id: value,
                ..AppSettings::default()
            },
            "spreadsheet_url" => AppSettings {
                spreadsheet_url: value,
                ..AppSettings::default()
            },
            "apps_script_url" => AppSettings {
                apps_script_url: value,
                ..AppSettings::default()
            },
            _ => return Ok(None),
        };
        self.update(patch).map(Some)
    }
}

/// Mask a secret for display, keeping the last four characters
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_settings(temp_dir: &TempDir) -> SettingsStore {
        SettingsStore::new(LocalStore::open(temp_dir.path()))
    }

    #[test]
    fn test_defaults_when_never_saved() {
        let temp_dir = TempDir::new().unwrap();
        let settings = test_settings(&temp_dir).get().unwrap();
        assert!(!settings.has_gemini_key());
        assert!(!settings.has_apps_script_url());
    }

    #[test]
    fn test_partial_update_merges() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_settings(&temp_dir);

        store
            .update(AppSettings {
                gemini_api_key: Some("key".to_string()),
                ..AppSettings::default()
            })
            .unwrap();
        let merged = store
            .update(AppSettings {
                apps_script_url: Some("https://script.example/exec".to_string()),
                ..AppSettings::default()
            })
            .unwrap();

        assert_eq!(merged.gemini_api_key.as_deref(), Some("key"));
        assert_eq!(
            merged.apps_script_url.as_deref(),
            Some("https://script.example/exec")
        );
        assert_eq!(store.get().unwrap(), merged);
    }

    #[test]
    fn test_set_field() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_settings(&temp_dir);

        let updated = store.set_field("spreadsheet_id", "abc").unwrap().unwrap();
        assert_eq!(updated.spreadsheet_id.as_deref(), Some("abc"));

        let cleared = store.set_field("spreadsheet_id", "").unwrap().unwrap();
        assert!(!cleared.has_spreadsheet_id());

        assert!(store.set_field("unknown", "x").unwrap().is_none());
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("abcdefgh"), "****efgh");
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret(""), "");
    }
}
