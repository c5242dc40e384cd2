use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::CredentialError;

/// Claims carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub email: String,
    pub role: String,
    /// Expiration time (Unix timestamp).
    pub exp: u64,
}

/// The caller, once its credential checks out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Verifies a raw bearer token.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<AuthenticatedUser, CredentialError>;
}

/// HS256 JWT verifier.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<AuthenticatedUser, CredentialError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "JWT validation failed");
            CredentialError::from(e)
        })?;
        Ok(data.claims.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token(secret: &str, exp_offset: i64) -> String {
        let claims = Claims {
            id: "u1".into(),
            email: "u1@example.com".into(),
            role: "admin".into(),
            exp: (Utc::now().timestamp() + exp_offset) as u64,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token() {
        let user = JwtVerifier::new(SECRET).verify(&token(SECRET, 3600)).unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.role, "admin");
    }

    #[test]
    fn test_expired_and_malformed_are_distinct() {
        let verifier = JwtVerifier::new(SECRET);
        assert_eq!(
            verifier.verify(&token(SECRET, -60)),
            Err(CredentialError::Expired)
        );
        assert_eq!(
            verifier.verify(&token("other-secret", 3600)),
            Err(CredentialError::Malformed)
        );
        assert_eq!(verifier.verify("not.a.jwt"), Err(CredentialError::Malformed));
    }
}
