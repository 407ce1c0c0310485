/// Database row types — these map directly to SQLite rows.
/// Distinct from gatehouse-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub verified: bool,
    pub role: String,
    pub created_at: String,
}

pub struct AdminGrantRow {
    pub id: i64,
    pub email: String,
    pub active: bool,
    pub created_at: String,
}

pub struct OtpChallengeRow {
    pub id: i64,
    pub user_id: i64,
    pub channel: String,
    pub code_hash: String,
    pub expires_at: i64,
    pub consumed_at: Option<i64>,
}
