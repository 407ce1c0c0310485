use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use gatehouse_types::models::{Provider, Role, SessionClaims};

use crate::error::AuthError;

/// Signs and verifies session tokens. Stateless; safe to share across
/// request handlers without locking.
///
/// The verifier pins HS256: a token advertising any other algorithm in its
/// header fails as [`AuthError::InvalidToken`], which closes the
/// algorithm-substitution hole ("none", HMAC/RSA confusion).
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl TokenCodec {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Short-lived sessions in tests rely on exact expiry.
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs,
        }
    }

    /// Build claims for a freshly authenticated principal and sign them.
    pub fn issue(
        &self,
        sub: i64,
        email: Option<String>,
        name: Option<String>,
        role: Role,
        provider: Provider,
    ) -> Result<(String, SessionClaims), AuthError> {
        let now = chrono::Utc::now().timestamp();
        let claims = SessionClaims {
            sub,
            email,
            name,
            role,
            provider,
            iat: now,
            exp: now + self.ttl_secs,
        };
        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    pub fn sign(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|_| AuthError::MalformedToken)
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                jsonwebtoken::errors::ErrorKind::InvalidSignature
                | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm
                | jsonwebtoken::errors::ErrorKind::InvalidAlgorithmName => AuthError::InvalidToken,
                _ => AuthError::MalformedToken,
            })?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new("test-secret-that-is-long-enough-for-hmac", 3600)
    }

    #[test]
    fn sign_verify_roundtrip() {
        let c = codec();
        let (token, issued) = c
            .issue(
                42,
                Some("ann@x.com".into()),
                Some("Ann".into()),
                Role::User,
                Provider::Password,
            )
            .unwrap();

        let claims = c.verify(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email.as_deref(), Some("ann@x.com"));
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.provider, Provider::Password);
        assert_eq!(claims.exp, issued.exp);
    }

    #[test]
    fn foreign_secret_is_invalid() {
        let (token, _) = codec()
            .issue(1, None, None, Role::User, Provider::Otp)
            .unwrap();

        let other = TokenCodec::new("a-completely-different-secret-value", 3600);
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn expired_token_is_rejected_even_with_valid_signature() {
        let c = codec();
        let now = chrono::Utc::now().timestamp();
        let claims = SessionClaims {
            sub: 1,
            email: None,
            name: None,
            role: Role::User,
            provider: Provider::Password,
            iat: now - 120,
            exp: now - 60,
        };
        let token = c.sign(&claims).unwrap();
        assert!(matches!(c.verify(&token), Err(AuthError::ExpiredToken)));
    }

    #[test]
    fn other_hmac_algorithm_is_rejected() {
        let c = codec();
        let now = chrono::Utc::now().timestamp();
        let claims = SessionClaims {
            sub: 1,
            email: None,
            name: None,
            role: Role::Admin,
            provider: Provider::Password,
            iat: now,
            exp: now + 60,
        };
        // Same secret, different algorithm in the header.
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret("test-secret-that-is-long-enough-for-hmac".as_bytes()),
        )
        .unwrap();

        assert!(matches!(c.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            codec().verify("not-a-jwt"),
            Err(AuthError::MalformedToken)
        ));
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let c = codec();
        let (token, _) = c
            .issue(7, Some("t@x.com".into()), None, Role::User, Provider::Google)
            .unwrap();

        // Swap the payload segment for one claiming a different subject.
        let (other, _) = c
            .issue(8, Some("u@x.com".into()), None, Role::Admin, Provider::Google)
            .unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        parts[1] = other_parts[1];
        let franken = parts.join(".");

        assert!(c.verify(&franken).is_err());
    }
}
