use crate::models::{AdminGrantRow, OtpChallengeRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    /// Insert a new user. Email must already be lowercased by the caller.
    pub fn create_user(
        &self,
        email: Option<&str>,
        name: Option<&str>,
        phone: Option<&str>,
        password_hash: Option<&str>,
        verified: bool,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (email, name, phone, password_hash, verified)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![email, name, phone, password_hash, verified],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    pub fn get_user_by_phone(&self, phone: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "phone = ?1", phone))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{USER_SELECT} WHERE id = ?1"))?;
            stmt.query_row([id], map_user_row).optional()
        })
    }

    /// Backfill the display name only when the stored one is empty.
    pub fn set_user_name_if_empty(&self, id: i64, name: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET name = ?2
                 WHERE id = ?1 AND (name IS NULL OR name = '')",
                rusqlite::params![id, name],
            )?;
            Ok(())
        })
    }

    /// Monotonic: flips verified on, never off.
    pub fn mark_user_verified(&self, id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("UPDATE users SET verified = 1 WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    pub fn set_user_role(&self, id: i64, role: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET role = ?2 WHERE id = ?1",
                rusqlite::params![id, role],
            )?;
            Ok(())
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{USER_SELECT} ORDER BY id"))?;
            let rows = stmt
                .query_map([], map_user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Sessions --

    pub fn insert_session(
        &self,
        id: &str,
        user_id: i64,
        token_hash: &str,
        expires_at: i64,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, token_hash, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, user_id, token_hash, expires_at],
            )?;
            Ok(())
        })
    }

    /// Active iff not revoked and not past expiry at `now`.
    pub fn session_active(&self, token_hash: &str, now: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let hit: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM sessions
                     WHERE token_hash = ?1 AND revoked_at IS NULL AND expires_at > ?2",
                    rusqlite::params![token_hash, now],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(hit.is_some())
        })
    }

    /// Single-row update; a concurrent reader sees the session either fully
    /// active or fully revoked. Unknown or already-revoked hashes are a no-op.
    pub fn revoke_session(&self, token_hash: &str, now: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE sessions SET revoked_at = ?2
                 WHERE token_hash = ?1 AND revoked_at IS NULL",
                rusqlite::params![token_hash, now],
            )?;
            Ok(())
        })
    }

    /// Cleanup of long-dead rows. Non-authoritative; liveness is always
    /// checked against expires_at at read time.
    pub fn delete_expired_sessions(&self, cutoff: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM sessions WHERE expires_at < ?1",
                [cutoff],
            )?;
            Ok(n)
        })
    }

    // -- Admin grants --

    pub fn admin_grant_active(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let hit: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM admin_grants WHERE email = ?1 AND active = 1",
                    [email],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(hit.is_some())
        })
    }

    /// Insert or re-activate a grant for this email.
    pub fn upsert_admin_grant(&self, email: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO admin_grants (email, active) VALUES (?1, 1)
                 ON CONFLICT(email) DO UPDATE SET active = 1",
                [email],
            )?;
            Ok(())
        })
    }

    /// Deactivates rather than deletes, keeping the row for audit.
    pub fn deactivate_admin_grant(&self, email: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE admin_grants SET active = 0 WHERE email = ?1 AND active = 1",
                [email],
            )?;
            Ok(n > 0)
        })
    }

    pub fn list_admin_grants(&self) -> Result<Vec<AdminGrantRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, active, created_at FROM admin_grants ORDER BY email",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(AdminGrantRow {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        active: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- OTP challenges --

    /// Consume any still-active challenge for this user+channel, then insert
    /// the replacement, in one transaction. At most one challenge is active
    /// per user+channel once this returns.
    pub fn replace_otp_challenge(
        &self,
        user_id: i64,
        channel: &str,
        code_hash: &str,
        expires_at: i64,
        now: i64,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE otp_challenges SET consumed_at = ?3
                 WHERE user_id = ?1 AND channel = ?2 AND consumed_at IS NULL",
                rusqlite::params![user_id, channel, now],
            )?;
            tx.execute(
                "INSERT INTO otp_challenges (user_id, channel, code_hash, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![user_id, channel, code_hash, expires_at],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(id)
        })
    }

    pub fn active_otp_challenge(
        &self,
        user_id: i64,
        channel: &str,
        now: i64,
    ) -> Result<Option<OtpChallengeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, channel, code_hash, expires_at, consumed_at
                 FROM otp_challenges
                 WHERE user_id = ?1 AND channel = ?2
                   AND consumed_at IS NULL AND expires_at > ?3
                 ORDER BY id DESC LIMIT 1",
            )?;
            stmt.query_row(rusqlite::params![user_id, channel, now], |row| {
                Ok(OtpChallengeRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    channel: row.get(2)?,
                    code_hash: row.get(3)?,
                    expires_at: row.get(4)?,
                    consumed_at: row.get(5)?,
                })
            })
            .optional()
        })
    }

    /// One-way: a consumed challenge never verifies again.
    pub fn consume_otp_challenge(&self, id: i64, now: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE otp_challenges SET consumed_at = ?2
                 WHERE id = ?1 AND consumed_at IS NULL",
                rusqlite::params![id, now],
            )?;
            Ok(())
        })
    }
}

const USER_SELECT: &str =
    "SELECT id, email, name, phone, password_hash, verified, role, created_at FROM users";

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("{USER_SELECT} WHERE {predicate}"))?;
    stmt.query_row([value], map_user_row).optional()
}

fn map_user_row(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        password_hash: row.get(4)?,
        verified: row.get(5)?,
        role: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    #[test]
    fn session_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let uid = db.create_user(Some("s@x.com"), None, None, None, true).unwrap();

        db.insert_session("sid-1", uid, "hash-1", 1_000).unwrap();
        assert!(db.session_active("hash-1", 500).unwrap());
        assert!(!db.session_active("hash-1", 1_000).unwrap());

        db.revoke_session("hash-1", 600).unwrap();
        assert!(!db.session_active("hash-1", 700).unwrap());
        // repeat revoke is a no-op
        db.revoke_session("hash-1", 800).unwrap();
        db.revoke_session("no-such-hash", 800).unwrap();
    }

    #[test]
    fn otp_reissue_leaves_one_active_challenge() {
        let db = Database::open_in_memory().unwrap();
        let uid = db.create_user(Some("o@x.com"), None, None, None, true).unwrap();

        db.replace_otp_challenge(uid, "email", "h1", 1_000, 100).unwrap();
        let second = db.replace_otp_challenge(uid, "email", "h2", 1_000, 200).unwrap();

        let active = db.active_otp_challenge(uid, "email", 300).unwrap().unwrap();
        assert_eq!(active.id, second);
        assert_eq!(active.code_hash, "h2");
    }

    #[test]
    fn admin_grant_deactivation_keeps_row() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_admin_grant("boss@x.com").unwrap();
        assert!(db.admin_grant_active("boss@x.com").unwrap());

        assert!(db.deactivate_admin_grant("boss@x.com").unwrap());
        assert!(!db.admin_grant_active("boss@x.com").unwrap());
        assert_eq!(db.list_admin_grants().unwrap().len(), 1);

        db.upsert_admin_grant("boss@x.com").unwrap();
        assert!(db.admin_grant_active("boss@x.com").unwrap());
    }
}
