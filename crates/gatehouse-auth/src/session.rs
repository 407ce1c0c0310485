use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use gatehouse_db::Database;

/// Server-side revocation ledger for issued tokens. Only the SHA-256 hex
/// digest of a token is stored, so a database leak does not hand out live
/// sessions.
pub struct SessionStore {
    db: Arc<Database>,
}

/// Digest applied both at insert and lookup time.
pub fn token_hash(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl SessionStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record a newly issued token. Returns the session id.
    pub fn create(&self, user_id: i64, token: &str, expires_at: i64) -> anyhow::Result<String> {
        let id = Uuid::new_v4().to_string();
        self.db
            .insert_session(&id, user_id, &token_hash(token), expires_at)?;
        Ok(id)
    }

    /// Liveness check run on every authenticated request. Fails closed: a
    /// storage fault answers `false`, never an error the caller might
    /// interpret as "let it through".
    pub fn is_active(&self, token: &str) -> bool {
        let now = chrono::Utc::now().timestamp();
        match self.db.session_active(&token_hash(token), now) {
            Ok(active) => active,
            Err(e) => {
                warn!("session liveness check failed, treating as inactive: {e}");
                false
            }
        }
    }

    /// Idempotent: revoking an unknown or already-revoked token is a no-op.
    pub fn revoke(&self, token: &str) -> anyhow::Result<()> {
        let now = chrono::Utc::now().timestamp();
        self.db.revoke_session(&token_hash(token), now)
    }

    /// Delete rows whose expiry is at least `grace_secs` in the past.
    /// Optional cleanup; liveness never depends on it having run.
    pub fn sweep_expired(&self, grace_secs: i64) -> anyhow::Result<usize> {
        let cutoff = chrono::Utc::now().timestamp() - grace_secs;
        self.db.delete_expired_sessions(cutoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (SessionStore, Arc<Database>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        (SessionStore::new(db.clone()), db)
    }

    fn seed_user(db: &Database) -> i64 {
        db.create_user(Some("s@x.com"), None, None, None, true)
            .unwrap()
    }

    #[test]
    fn created_session_is_active_until_revoked() {
        let (store, db) = store();
        let uid = seed_user(&db);
        let future = chrono::Utc::now().timestamp() + 3600;

        store.create(uid, "tok-abc", future).unwrap();
        assert!(store.is_active("tok-abc"));
        assert!(!store.is_active("tok-other"));

        store.revoke("tok-abc").unwrap();
        assert!(!store.is_active("tok-abc"));

        // revoke is idempotent
        store.revoke("tok-abc").unwrap();
        store.revoke("never-issued").unwrap();
        assert!(!store.is_active("tok-abc"));
    }

    #[test]
    fn expired_session_is_inactive() {
        let (store, db) = store();
        let uid = seed_user(&db);
        let past = chrono::Utc::now().timestamp() - 2;

        store.create(uid, "tok-old", past).unwrap();
        assert!(!store.is_active("tok-old"));
    }

    #[test]
    fn raw_token_never_stored() {
        let (store, db) = store();
        let uid = seed_user(&db);
        let future = chrono::Utc::now().timestamp() + 3600;
        store.create(uid, "tok-secret", future).unwrap();

        let stored: String = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT token_hash FROM sessions", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_ne!(stored, "tok-secret");
        assert_eq!(stored, token_hash("tok-secret"));
    }

    #[test]
    fn sweep_removes_only_long_expired_rows() {
        let (store, db) = store();
        let uid = seed_user(&db);
        let now = chrono::Utc::now().timestamp();

        store.create(uid, "tok-live", now + 3600).unwrap();
        store.create(uid, "tok-dead", now - 7200).unwrap();

        let removed = store.sweep_expired(3600).unwrap();
        assert_eq!(removed, 1);
        assert!(store.is_active("tok-live"));
    }
}
