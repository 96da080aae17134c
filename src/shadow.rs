//! Client-side soft-delete shadow for video materials
//!
//! Video deletes are unreliable on the backend because videos live in two
//! legacy collections. Deleted IDs are remembered in the session and hidden
//! from every later video listing until one of these happens:
//! - the entry is older than the configured TTL
//! - a complete listing no longer returns the ID (backend caught up)
//!
//! Every time the shadow hides a row the backend still serves, a warning is
//! logged so the backend defect stays visible.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

use branchdesk_protocol::common::{Material, RecordId};

use crate::error::Result;
use crate::session::{self, SharedSession};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShadowEntry {
    pub id: RecordId,
    pub deleted_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireEntry {
    Full {
        id: RecordId,
        deleted_at: DateTime<Utc>,
    },
    // Older sessions stored bare IDs without a timestamp
    Bare(RecordId),
}

impl<'de> Deserialize<'de> for ShadowEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match WireEntry::deserialize(deserializer)? {
            WireEntry::Full { id, deleted_at } => Self { id, deleted_at },
            WireEntry::Bare(id) => Self {
                id,
                deleted_at: Utc::now(),
            },
        })
    }
}

/// Split entries into the ones still inside `ttl` and a count of the expired
pub fn prune_expired(
    entries: &[ShadowEntry],
    now: DateTime<Utc>,
    ttl: Duration,
) -> (Vec<ShadowEntry>, usize) {
    let kept: Vec<ShadowEntry> = entries
        .iter()
        .filter(|e| now - e.deleted_at < ttl)
        .cloned()
        .collect();
    let pruned = entries.len() - kept.len();
    (kept, pruned)
}

#[derive(Debug, Clone)]
pub struct DeletedShadow {
    session: SharedSession,
    ttl: Duration,
}

impl DeletedShadow {
    pub fn new(session: SharedSession, ttl: Duration) -> Self {
        Self { session, ttl }
    }

    /// Current shadowed IDs, after dropping expired entries
    pub fn load(&self) -> Result<HashSet<RecordId>> {
        let mut store = session::lock(&self.session)?;
        let (kept, pruned) = prune_expired(store.shadow_entries(), Utc::now(), self.ttl);

        if pruned > 0 {
            tracing::info!("Dropped {} expired video shadow entries", pruned);
            store.set_shadow_entries(kept.clone())?;
        }

        Ok(kept.into_iter().map(|e| e.id).collect())
    }

    pub fn contains(&self, id: &RecordId) -> Result<bool> {
        Ok(self.load()?.contains(id))
    }

    pub fn record(&self, id: RecordId) -> Result<()> {
        let mut store = session::lock(&self.session)?;
        if store.shadow_entries().iter().any(|e| e.id == id) {
            return Ok(());
        }

        let mut entries = store.shadow_entries().to_vec();
        entries.push(ShadowEntry {
            id,
            deleted_at: Utc::now(),
        });
        store.set_shadow_entries(entries)
    }

    /// Forget entries whose IDs a complete listing no longer returns.
    /// Only call this with the result of an unscoped, fully successful fetch.
    pub fn reconcile(&self, served_ids: &HashSet<RecordId>) -> Result<usize> {
        let mut store = session::lock(&self.session)?;
        let before = store.shadow_entries().len();
        let kept: Vec<ShadowEntry> = store
            .shadow_entries()
            .iter()
            .filter(|e| served_ids.contains(&e.id))
            .cloned()
            .collect();

        let dropped = before - kept.len();
        if dropped > 0 {
            tracing::info!(
                "Backend no longer serves {} shadowed video(s); dropping them from the shadow",
                dropped
            );
            store.set_shadow_entries(kept)?;
        }
        Ok(dropped)
    }

    /// Remove shadowed rows from `materials`
    pub fn apply(&self, materials: Vec<Material>) -> Result<Vec<Material>> {
        let shadowed = self.load()?;
        if shadowed.is_empty() {
            return Ok(materials);
        }

        Ok(materials
            .into_iter()
            .filter(|m| {
                let hidden = shadowed.contains(&m.id);
                if hidden {
                    tracing::warn!(
                        "Backend still serves deleted video {} from {}; hidden by local shadow",
                        m.id,
                        m.source
                    );
                }
                !hidden
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStore;
    use crate::tests::utils::test_helpers::material;
    use branchdesk_protocol::common::{MaterialSource, MaterialType};

    fn shadow() -> DeletedShadow {
        DeletedShadow::new(session::shared(SessionStore::in_memory()), Duration::days(30))
    }

    #[test]
    fn expired_entries_are_pruned() {
        let now = Utc::now();
        let entries = vec![
            ShadowEntry {
                id: "old".into(),
                deleted_at: now - Duration::days(31),
            },
            ShadowEntry {
                id: "fresh".into(),
                deleted_at: now - Duration::days(1),
            },
        ];
        let (kept, pruned) = prune_expired(&entries, now, Duration::days(30));
        assert_eq!(pruned, 1);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id.as_str(), "fresh");
    }

    #[test]
    fn bare_ids_deserialize_with_a_timestamp() {
        let entries: Vec<ShadowEntry> =
            serde_json::from_str(r#"["v1", 7, {"id":"v2","deleted_at":"2024-01-01T00:00:00Z"}]"#)
                .unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].id.as_str(), "7");
        assert_eq!(entries[2].deleted_at.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn record_is_idempotent_and_apply_hides() {
        let shadow = shadow();
        shadow.record("v123".into()).unwrap();
        shadow.record("v123".into()).unwrap();
        assert_eq!(shadow.load().unwrap().len(), 1);

        let rows = vec![
            material("v123", MaterialType::Video, MaterialSource::StudyMaterials),
            material("v200", MaterialType::Video, MaterialSource::Subjects),
        ];
        let visible = shadow.apply(rows).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id.as_str(), "v200");
    }

    #[test]
    fn reconcile_drops_ids_the_backend_stopped_serving() {
        let shadow = shadow();
        shadow.record("gone".into()).unwrap();
        shadow.record("stuck".into()).unwrap();

        let served: HashSet<RecordId> = ["stuck".into(), "other".into()].into_iter().collect();
        assert_eq!(shadow.reconcile(&served).unwrap(), 1);

        let remaining = shadow.load().unwrap();
        assert!(remaining.contains(&RecordId::from("stuck")));
        assert!(!remaining.contains(&RecordId::from("gone")));
    }
}
