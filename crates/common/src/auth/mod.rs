//! Authentication and authorization utilities
//!
//! Provides:
//! - API key generation and hashing
//! - JWT session token generation and validation
//! - Caller context extraction (person, organization, role)

use crate::db::models::PersonRole;
use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// API key prefix
pub const API_KEY_PREFIX: &str = "ck_";

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Calling person
    pub person_id: Uuid,

    /// Organization every query is scoped to
    pub org_id: Uuid,

    /// Role within the organization
    pub role: PersonRole,

    /// Request ID for tracing
    pub request_id: String,
}

impl AuthContext {
    pub fn is_manager(&self) -> bool {
        self.role.is_manager()
    }

    /// Require owner or admin, returning error if not present
    pub fn require_manager(&self) -> Result<()> {
        if self.is_manager() {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: "This action requires an owner or admin role".to_string(),
            })
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (person ID)
    pub sub: String,

    /// Organization ID
    pub org_id: String,

    /// Role within the organization
    pub role: PersonRole,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// Issued session token
#[derive(Debug, Clone, Serialize)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new JWT token
    pub fn generate_token(
        &self,
        person_id: Uuid,
        org_id: Uuid,
        role: PersonRole,
    ) -> Result<SessionToken> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: person_id.to_string(),
            org_id: org_id.to_string(),
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            AppError::Internal {
                message: format!("Failed to generate token: {}", e),
            }
        })?;

        Ok(SessionToken {
            token,
            expires_at: Utc.timestamp_opt(claims.exp, 0).single().unwrap_or(exp),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidApiKey,
            })
    }

    /// Decode a token into a caller context
    pub fn authenticate(&self, token: &str, request_id: String) -> Result<AuthContext> {
        let claims = self.validate_token(token)?;
        let person_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidApiKey)?;
        let org_id = Uuid::parse_str(&claims.org_id).map_err(|_| AppError::InvalidApiKey)?;

        Ok(AuthContext {
            person_id,
            org_id,
            role: claims.role,
            request_id,
        })
    }
}

/// Hash an API key for storage
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Validate an API key against a stored hash
pub fn validate_api_key(api_key: &str, stored_hash: &str) -> bool {
    hash_api_key(api_key) == stored_hash
}

/// Generate a new API key
pub fn generate_api_key() -> String {
    let random_bytes: [u8; 32] = rand::random();
    format!("{}{}", API_KEY_PREFIX, hex::encode(random_bytes))
}

/// Extract bearer token from Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
    Arc<JwtManager>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        // Extract request ID
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Authorization header must be a Bearer token".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        jwt.authenticate(token, request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_api_key() {
        let key = "ck_test_12345";
        let hash = hash_api_key(key);
        assert!(validate_api_key(key, &hash));
        assert!(!validate_api_key("wrong_key", &hash));
    }

    #[test]
    fn test_generate_api_key() {
        let key = generate_api_key();
        assert!(key.starts_with(API_KEY_PREFIX));
        assert_eq!(key.len(), API_KEY_PREFIX.len() + 64);
        assert_ne!(key, generate_api_key());
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("abc.def"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);

        let person_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();

        let session = manager
            .generate_token(person_id, org_id, PersonRole::Admin)
            .unwrap();
        let ctx = manager
            .authenticate(&session.token, "req-1".to_string())
            .unwrap();

        assert_eq!(ctx.person_id, person_id);
        assert_eq!(ctx.org_id, org_id);
        assert_eq!(ctx.role, PersonRole::Admin);
        assert!(ctx.is_manager());
        assert!(session.expires_at > Utc::now());
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let issuer = JwtManager::new("secret-a", 3600);
        let verifier = JwtManager::new("secret-b", 3600);
        let session = issuer
            .generate_token(Uuid::new_v4(), Uuid::new_v4(), PersonRole::Member)
            .unwrap();
        assert!(matches!(
            verifier.validate_token(&session.token),
            Err(AppError::InvalidApiKey)
        ));
    }

    #[test]
    fn test_expired_token() {
        // well past the default 60s leeway
        let manager = JwtManager {
            expiration_secs: -600,
            ..JwtManager::new("test_secret", 0)
        };
        let session = manager
            .generate_token(Uuid::new_v4(), Uuid::new_v4(), PersonRole::Member)
            .unwrap();
        assert!(matches!(
            manager.validate_token(&session.token),
            Err(AppError::ExpiredToken)
        ));
    }

    #[test]
    fn test_member_is_not_manager() {
        let ctx = AuthContext {
            person_id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            role: PersonRole::Member,
            request_id: "r".into(),
        };
        assert!(matches!(ctx.require_manager(), Err(AppError::Forbidden { .. })));
    }
}
