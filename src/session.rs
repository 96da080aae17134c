//! Persisted session state for branchdesk
//!
//! Holds the bearer token, the tenant codes and the video soft-delete shadow
//! in one JSON file. Older portal builds wrote the same values under several
//! key spellings; those are folded into the canonical keys once, on load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{DeskError, Result};
use crate::shadow::ShadowEntry;

pub const TOKEN_KEY: &str = "token";
pub const BRANCH_CODE_KEY: &str = "branch_code";
pub const FRANCHISE_CODE_KEY: &str = "franchise_code";
pub const DELETED_VIDEO_IDS_KEY: &str = "deleted_video_ids";

/// Canonical key followed by the legacy spellings that map onto it
const LEGACY_ALIASES: &[(&str, &[&str])] = &[
    (TOKEN_KEY, &["authToken", "access_token", "adminToken", "branchToken"]),
    (BRANCH_CODE_KEY, &["branchCode", "branch"]),
    (FRANCHISE_CODE_KEY, &["franchiseCode", "franchise"]),
    (
        DELETED_VIDEO_IDS_KEY,
        &["deletedVideoIds", "deletedVideos", "deleted_videos"],
    ),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub branch_code: Option<String>,
    #[serde(default)]
    pub franchise_code: Option<String>,
    #[serde(default)]
    pub deleted_video_ids: Vec<ShadowEntry>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Session store backed by an optional file
#[derive(Debug)]
pub struct SessionStore {
    path: Option<PathBuf>,
    session: StoredSession,
}

/// Session handle injected into the transport and the shadow
pub type SharedSession = Arc<Mutex<SessionStore>>;

pub fn shared(store: SessionStore) -> SharedSession {
    Arc::new(Mutex::new(store))
}

/// Lock a shared session, turning poisoning into an internal error
pub fn lock(session: &SharedSession) -> Result<MutexGuard<'_, SessionStore>> {
    session
        .lock()
        .map_err(|_| DeskError::internal("Session store lock poisoned"))
}

impl SessionStore {
    /// Open the session file at `path`, migrating legacy keys when found
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut store = Self {
            path: Some(path),
            session: StoredSession::default(),
        };
        store.load()?;
        Ok(store)
    }

    /// Session that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            path: None,
            session: StoredSession::default(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        non_empty(&self.session.token)
    }

    pub fn branch_code(&self) -> Option<&str> {
        non_empty(&self.session.branch_code)
    }

    pub fn franchise_code(&self) -> Option<&str> {
        non_empty(&self.session.franchise_code)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn set_credentials(
        &mut self,
        token: String,
        branch_code: Option<String>,
        franchise_code: Option<String>,
    ) -> Result<()> {
        if token.trim().is_empty() {
            return Err(DeskError::invalid_input("Token cannot be empty"));
        }

        self.session.token = Some(token.trim().to_string());
        if branch_code.is_some() {
            self.session.branch_code = branch_code;
        }
        if franchise_code.is_some() {
            self.session.franchise_code = franchise_code;
        }
        self.save()
    }

    /// Drop the stored token. Tenant codes and the shadow survive a logout.
    pub fn clear_auth(&mut self) -> Result<()> {
        self.session.token = None;
        self.save()
    }

    pub fn shadow_entries(&self) -> &[ShadowEntry] {
        &self.session.deleted_video_ids
    }

    pub fn set_shadow_entries(&mut self, entries: Vec<ShadowEntry>) -> Result<()> {
        self.session.deleted_video_ids = entries;
        self.save()
    }

    fn load(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };

        if !path.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| DeskError::io_from_error("Failed to read session file", e))?;

        if content.trim().is_empty() {
            return Ok(());
        }

        let mut raw: Map<String, Value> = serde_json::from_str(&content)
            .map_err(|e| DeskError::config(format!("Failed to parse session file: {}", e)))?;

        let migrated = migrate_legacy_keys(&mut raw);

        self.session = serde_json::from_value(Value::Object(raw))
            .map_err(|e| DeskError::config(format!("Failed to parse session file: {}", e)))?;

        if migrated {
            tracing::info!("Migrated legacy session keys in {}", path.display());
            self.save()?;
        }

        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        self.session.updated_at = Some(Utc::now());

        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| DeskError::io_from_error("Failed to create session directory", e))?;
        }

        let content = serde_json::to_string_pretty(&self.session)?;
        fs::write(path, content)
            .map_err(|e| DeskError::io_from_error("Failed to write session file", e))?;

        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Fold legacy key spellings into the canonical keys. A canonical value that
/// is already present wins over any alias. Returns whether anything changed.
pub fn migrate_legacy_keys(raw: &mut Map<String, Value>) -> bool {
    let mut changed = false;

    for (canonical, aliases) in LEGACY_ALIASES {
        for alias in aliases.iter() {
            if let Some(value) = raw.remove(*alias) {
                changed = true;
                let canonical_missing = raw.get(*canonical).map_or(true, Value::is_null);
                if canonical_missing && !value.is_null() {
                    raw.insert(canonical.to_string(), value);
                }
            }
        }
    }

    // Browser storage kept the shadow as a JSON-encoded string
    if let Some(Value::String(encoded)) = raw.get(DELETED_VIDEO_IDS_KEY) {
        let decoded = serde_json::from_str::<Value>(encoded).unwrap_or(Value::Array(Vec::new()));
        raw.insert(DELETED_VIDEO_IDS_KEY.to_string(), decoded);
        changed = true;
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_keys_fold_into_canonical_ones() {
        let mut raw = json!({
            "authToken": "abc",
            "branchCode": "BR-7",
            "franchise_code": "FR-1",
            "franchiseCode": "FR-OLD",
            "deletedVideoIds": "[\"v1\", 42]"
        })
        .as_object()
        .cloned()
        .unwrap();

        assert!(migrate_legacy_keys(&mut raw));
        assert_eq!(raw["token"], json!("abc"));
        assert_eq!(raw["branch_code"], json!("BR-7"));
        assert_eq!(raw["franchise_code"], json!("FR-1"));
        assert_eq!(raw["deleted_video_ids"], json!(["v1", 42]));
        assert!(!raw.contains_key("authToken"));
        assert!(!raw.contains_key("franchiseCode"));
    }

    #[test]
    fn canonical_session_is_untouched() {
        let mut raw = json!({"token": "abc", "branch_code": "BR-7"})
            .as_object()
            .cloned()
            .unwrap();
        assert!(!migrate_legacy_keys(&mut raw));
    }

    #[test]
    fn open_migrates_and_persists_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(
            &path,
            r#"{"authToken":"tok-1","branchCode":"BR-9","deletedVideoIds":["v123"]}"#,
        )
        .unwrap();

        let store = SessionStore::open(&path).unwrap();
        assert_eq!(store.token(), Some("tok-1"));
        assert_eq!(store.branch_code(), Some("BR-9"));
        assert_eq!(store.shadow_entries().len(), 1);
        assert_eq!(store.shadow_entries()[0].id.as_str(), "v123");

        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("\"token\""));
        assert!(!rewritten.contains("authToken"));
    }

    #[test]
    fn clear_auth_keeps_tenant_codes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut store = SessionStore::open(&path).unwrap();
        store
            .set_credentials("tok".to_string(), Some("BR-1".to_string()), None)
            .unwrap();
        assert!(store.is_authenticated());

        store.clear_auth().unwrap();
        let reopened = SessionStore::open(&path).unwrap();
        assert!(!reopened.is_authenticated());
        assert_eq!(reopened.branch_code(), Some("BR-1"));
    }

    #[test]
    fn blank_token_is_rejected() {
        let mut store = SessionStore::in_memory();
        assert!(store.set_credentials("  ".to_string(), None, None).is_err());
    }
}
