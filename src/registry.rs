//! In-memory user registry.
//!
//! The registry maps Telegram user ids to their access metadata. It is built
//! once at startup from an optional JSON snapshot and shared with the access
//! gate and the broadcast handler. The only writers are the startup load and
//! the administrative flow, so a plain `RwLock` is enough discipline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Access level granted to the bot owner
pub const OWNER_ACCESS: i64 = 100;

/// Access metadata attached to a registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Privilege tier; commands require a minimum level
    pub access: i64,
    /// Reserved quota field, not consulted by current logic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

impl UserRecord {
    /// Record with the given access level and no limit
    #[must_use]
    pub const fn with_access(access: i64) -> Self {
        Self {
            access,
            limit: None,
        }
    }
}

/// Registry of known users, keyed by Telegram user id.
///
/// Always contains the owner entry with [`OWNER_ACCESS`], even when the
/// persisted snapshot is missing or empty.
pub struct UserRegistry {
    users: RwLock<HashMap<i64, UserRecord>>,
}

impl UserRegistry {
    /// Registry containing only the owner entry
    #[must_use]
    pub fn new(owner_id: i64) -> Self {
        let mut users = HashMap::new();
        users.insert(owner_id, UserRecord::with_access(OWNER_ACCESS));
        Self {
            users: RwLock::new(users),
        }
    }

    /// Load the registry from a JSON snapshot, falling back to the owner-only
    /// registry when the snapshot is absent or unreadable.
    ///
    /// A snapshot that lacks the owner entry gets it added back; the owner
    /// invariant holds on every load path.
    #[must_use]
    pub fn load(owner_id: i64, snapshot: Option<&Path>) -> Self {
        debug!("Loading users");
        let mut users: HashMap<i64, UserRecord> = snapshot
            .and_then(|path| match std::fs::read_to_string(path) {
                Ok(raw) => match serde_json::from_str(&raw) {
                    Ok(parsed) => Some(parsed),
                    Err(e) => {
                        warn!("Ignoring malformed users file {}: {e}", path.display());
                        None
                    }
                },
                Err(e) => {
                    warn!("Users file {} not readable: {e}", path.display());
                    None
                }
            })
            .unwrap_or_default();

        users
            .entry(owner_id)
            .or_insert_with(|| UserRecord::with_access(OWNER_ACCESS));

        debug!(
            "Loaded users: {}",
            users
                .keys()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );

        Self {
            users: RwLock::new(users),
        }
    }

    /// Access level of a user, 0 when unknown
    #[must_use]
    pub fn access_level(&self, user_id: i64) -> i64 {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
            .map_or(0, |record| record.access)
    }

    /// Ids of every registered user, in no particular order
    #[must_use]
    pub fn member_ids(&self) -> Vec<i64> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// Insert or replace a user record. Used by the administrative flow.
    pub fn upsert(&self, user_id: i64, record: UserRecord) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id, record);
    }

    /// Number of registered users
    #[must_use]
    pub fn len(&self) -> usize {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when the registry holds no entries (never after a load)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: i64 = 777;

    #[test]
    fn test_fresh_registry_contains_owner() {
        let registry = UserRegistry::new(OWNER);
        assert_eq!(registry.access_level(OWNER), OWNER_ACCESS);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_load_without_snapshot_defaults_to_owner_only() {
        let registry = UserRegistry::load(OWNER, None);
        assert_eq!(registry.access_level(OWNER), OWNER_ACCESS);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_load_missing_file_defaults_to_owner_only() {
        let registry = UserRegistry::load(OWNER, Some(Path::new("/nonexistent/users.json")));
        assert_eq!(registry.access_level(OWNER), OWNER_ACCESS);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_load_snapshot_keeps_owner_invariant() -> Result<(), Box<dyn std::error::Error>> {
        let path = std::env::temp_dir().join(format!("asquik-users-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"1": {"access": 1}, "2": {"access": 2, "limit": 10}}"#)?;

        let registry = UserRegistry::load(OWNER, Some(&path));
        std::fs::remove_file(&path)?;

        assert_eq!(registry.access_level(1), 1);
        assert_eq!(registry.access_level(2), 2);
        // Owner was not in the snapshot but must be present regardless
        assert_eq!(registry.access_level(OWNER), OWNER_ACCESS);
        assert_eq!(registry.len(), 3);
        Ok(())
    }

    #[test]
    fn test_unknown_user_defaults_to_zero() {
        let registry = UserRegistry::new(OWNER);
        assert_eq!(registry.access_level(12345), 0);
    }

    #[test]
    fn test_upsert() {
        let registry = UserRegistry::new(OWNER);
        registry.upsert(5, UserRecord::with_access(2));
        assert_eq!(registry.access_level(5), 2);
        assert_eq!(registry.len(), 2);

        registry.upsert(5, UserRecord::with_access(1));
        assert_eq!(registry.access_level(5), 1);
        assert_eq!(registry.len(), 2);
    }
}
