use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::info;

use gatehouse_db::models::UserRow;
use gatehouse_db::Database;
use gatehouse_types::api::OtpChannel;

use crate::error::AuthError;
use crate::reconcile::fold_email;

const CODE_LEN: usize = 6;

/// Delivery collaborator for one-time codes. Production wires the email or
/// SMS provider here; tests and dev use [`LogOtpSender`].
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, channel: OtpChannel, destination: &str, code: &str) -> anyhow::Result<()>;
}

/// Dev sender that just logs the code instead of delivering it.
pub struct LogOtpSender;

#[async_trait]
impl OtpSender for LogOtpSender {
    async fn send(&self, channel: OtpChannel, destination: &str, code: &str) -> anyhow::Result<()> {
        info!(channel = channel.as_str(), destination, code, "OTP issued (log sender)");
        Ok(())
    }
}

/// Issues and verifies one-time login codes. At most one challenge per
/// user+channel is active at a time; issuing a replacement consumes the
/// previous one before the new row lands.
pub struct OtpService {
    db: Arc<Database>,
    sender: Arc<dyn OtpSender>,
    ttl_secs: i64,
}

impl OtpService {
    pub fn new(db: Arc<Database>, sender: Arc<dyn OtpSender>, ttl_secs: i64) -> Self {
        Self { db, sender, ttl_secs }
    }

    /// Create a challenge for an existing user and hand the code to the
    /// delivery collaborator. Delivery failure surfaces as
    /// `ProviderUnavailable`, distinct from any credential problem.
    pub async fn request(&self, channel: OtpChannel, destination: &str) -> Result<(), AuthError> {
        let user = self.lookup_user(channel, destination)?;

        let code = generate_code();
        let now = chrono::Utc::now().timestamp();
        self.db.replace_otp_challenge(
            user.id,
            channel.as_str(),
            &salted_hash(&code),
            now + self.ttl_secs,
            now,
        )?;

        self.sender
            .send(channel, destination, &code)
            .await
            .map_err(|e| {
                tracing::warn!("OTP delivery failed: {e}");
                AuthError::ProviderUnavailable
            })
    }

    /// Check a submitted code. A correct code consumes the challenge; it
    /// never verifies a second time. Wrong codes leave the challenge active.
    pub fn verify(
        &self,
        channel: OtpChannel,
        destination: &str,
        code: &str,
    ) -> Result<UserRow, AuthError> {
        let user = self.lookup_user(channel, destination)?;
        let now = chrono::Utc::now().timestamp();

        let challenge = self
            .db
            .active_otp_challenge(user.id, channel.as_str(), now)?
            .ok_or(AuthError::CredentialMismatch)?;

        if !verify_salted_hash(code, &challenge.code_hash) {
            return Err(AuthError::CredentialMismatch);
        }

        self.db.consume_otp_challenge(challenge.id, now)?;
        if !user.verified {
            self.db.mark_user_verified(user.id)?;
        }
        Ok(user)
    }

    fn lookup_user(&self, channel: OtpChannel, destination: &str) -> Result<UserRow, AuthError> {
        let found = match channel {
            OtpChannel::Email => self.db.get_user_by_email(&fold_email(destination))?,
            OtpChannel::Sms => self.db.get_user_by_phone(destination.trim())?,
        };
        found.ok_or(AuthError::UserNotFound)
    }
}

fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{n:0width$}", width = CODE_LEN)
}

/// `salt$digest`, both hex. Codes are short-lived, so a salted SHA-256 is
/// enough; the salt blocks precomputed lookups over the 10^6 code space
/// across rows.
fn salted_hash(code: &str) -> String {
    let salt: [u8; 16] = rand::rng().random();
    let salt_hex = hex::encode(salt);
    format!("{salt_hex}${}", digest(&salt_hex, code))
}

fn verify_salted_hash(code: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt_hex, expect)) => digest(salt_hex, code) == expect,
        None => false,
    }
}

fn digest(salt_hex: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}
