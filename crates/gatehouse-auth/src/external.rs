use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::warn;

use gatehouse_types::models::{Role, VerifiedIdentity};

use crate::error::AuthError;

/// Issuer JWKS document, trimmed to the RSA fields we verify with.
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    #[serde(default)]
    pub kid: Option<String>,
    pub kty: String,
    /// RSA modulus and exponent, base64url.
    pub n: String,
    pub e: String,
}

/// Per-issuer signing-key cache with a fixed TTL. Injectable so tests can
/// preload keys and skip the network entirely.
pub struct JwksCache {
    http: reqwest::Client,
    ttl: Duration,
    inner: RwLock<HashMap<String, (Instant, JwkSet)>>,
}

impl JwksCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            ttl,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Current keys for an issuer's JWKS URL; one network fetch per TTL
    /// window. A fetch failure is an upstream outage, not a bad credential.
    pub async fn get(&self, jwks_url: &str) -> Result<JwkSet, AuthError> {
        {
            let cache = self.inner.read().await;
            if let Some((fetched_at, set)) = cache.get(jwks_url) {
                if fetched_at.elapsed() < self.ttl {
                    return Ok(set.clone());
                }
            }
        }

        let set = self
            .http
            .get(jwks_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!("JWKS fetch from {jwks_url} failed: {e}");
                AuthError::ProviderUnavailable
            })?
            .json::<JwkSet>()
            .await
            .map_err(|e| {
                warn!("JWKS response from {jwks_url} unparseable: {e}");
                AuthError::ProviderUnavailable
            })?;

        self.inner
            .write()
            .await
            .insert(jwks_url.to_string(), (Instant::now(), set.clone()));
        Ok(set)
    }

    /// Seed the cache directly (tests, or a bundled fallback key set).
    pub async fn preload(&self, jwks_url: &str, set: JwkSet) {
        self.inner
            .write()
            .await
            .insert(jwks_url.to_string(), (Instant::now(), set));
    }
}

/// Claims we read out of externally issued ID tokens (Google, hosted auth
/// provider). Extra claims are ignored.
#[derive(Debug, Deserialize)]
struct ExternalClaims {
    #[allow(dead_code)]
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    /// Provider-declared role, when the issuer embeds one.
    #[serde(default)]
    role: Option<String>,
}

/// Verifies RS256 ID tokens from one external issuer against its JWKS.
/// The accepted algorithm set is pinned: a token advertising anything but
/// RS256 is rejected before any key lookup happens.
pub struct ExternalVerifier {
    jwks: Arc<JwksCache>,
    jwks_url: String,
    issuer: String,
    audience: String,
}

impl ExternalVerifier {
    pub fn new(jwks: Arc<JwksCache>, jwks_url: String, issuer: String, audience: String) -> Self {
        Self {
            jwks,
            jwks_url,
            issuer,
            audience,
        }
    }

    /// Google's published token endpoint parameters.
    pub fn google(jwks: Arc<JwksCache>, client_id: String) -> Self {
        Self::new(
            jwks,
            "https://www.googleapis.com/oauth2/v3/certs".to_string(),
            "https://accounts.google.com".to_string(),
            client_id,
        )
    }

    pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken);
        }

        let keys = self.jwks.get(&self.jwks_url).await?;
        let jwk = keys
            .keys
            .iter()
            .filter(|k| k.kty == "RSA")
            .find(|k| match (&header.kid, &k.kid) {
                (Some(want), Some(have)) => want == have,
                // No kid in the header: a single-key set is unambiguous.
                (None, _) => keys.keys.len() == 1,
                (Some(_), None) => false,
            })
            .ok_or(AuthError::InvalidToken)?;

        let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|_| AuthError::InvalidToken)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let data =
            decode::<ExternalClaims>(token, &key, &validation).map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                jsonwebtoken::errors::ErrorKind::InvalidSignature
                | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm
                | jsonwebtoken::errors::ErrorKind::InvalidIssuer
                | jsonwebtoken::errors::ErrorKind::InvalidAudience => AuthError::InvalidToken,
                _ => AuthError::MalformedToken,
            })?;

        // A verified token without an email cannot be reconciled to a user.
        let email = data.claims.email.ok_or(AuthError::CredentialMismatch)?;
        let provider_role = match data.claims.role.as_deref() {
            Some("admin") => Some(Role::Admin),
            _ => None,
        };

        Ok(VerifiedIdentity {
            email,
            name: data.claims.name,
            provider_role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct FakeClaims {
        sub: String,
        email: String,
        exp: i64,
    }

    fn verifier() -> ExternalVerifier {
        let cache = Arc::new(JwksCache::new(Duration::from_secs(600)));
        ExternalVerifier::new(
            cache,
            "http://127.0.0.1:1/jwks.json".to_string(),
            "https://issuer.example".to_string(),
            "aud-1".to_string(),
        )
    }

    #[tokio::test]
    async fn non_rs256_token_is_rejected_before_any_fetch() {
        let claims = FakeClaims {
            sub: "x".into(),
            email: "a@x.com".into(),
            exp: chrono::Utc::now().timestamp() + 60,
        };
        // HS256-signed token presented to the RS256-only verifier.
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"whatever"),
        )
        .unwrap();

        assert!(matches!(
            verifier().verify(&token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn garbage_token_is_malformed() {
        assert!(matches!(
            verifier().verify("???").await,
            Err(AuthError::MalformedToken)
        ));
    }

    #[tokio::test]
    async fn unreachable_jwks_is_provider_unavailable() {
        let cache = JwksCache::new(Duration::from_secs(600));
        assert!(matches!(
            cache.get("http://127.0.0.1:1/jwks.json").await,
            Err(AuthError::ProviderUnavailable)
        ));
    }

    #[tokio::test]
    async fn preloaded_keys_skip_the_network() {
        let cache = JwksCache::new(Duration::from_secs(600));
        let set = JwkSet {
            keys: vec![Jwk {
                kid: Some("k1".into()),
                kty: "RSA".into(),
                n: "AQAB".into(),
                e: "AQAB".into(),
            }],
        };
        cache.preload("http://127.0.0.1:1/jwks.json", set).await;

        let got = cache.get("http://127.0.0.1:1/jwks.json").await.unwrap();
        assert_eq!(got.keys.len(), 1);
        assert_eq!(got.keys[0].kid.as_deref(), Some("k1"));
    }
}
