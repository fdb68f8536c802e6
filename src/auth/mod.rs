pub mod guard;
pub mod password;

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SecurityConfig;

pub use guard::{authorize, Decision, DenyReason};

/// Roles a user can hold. Serialized lowercase on the wire and in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(ClaimError::UnknownRole(other.to_string())),
        }
    }
}

/// Identity carried by a signed access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaim {
    pub username: String,
    pub role: Role,
}

impl IdentityClaim {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }
}

/// A signed token whose payload does not describe an identity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error("claim is missing '{0}'")]
    MissingField(&'static str),

    #[error("unknown role '{0}'")]
    UnknownRole(String),
}

/// Result of decoding the identity out of a verified token
pub type DecodedClaim = Result<IdentityClaim, ClaimError>;

/// Token payload as signed. Identity fields are optional here so that a
/// structurally broken payload surfaces as a `ClaimError` rather than a
/// signature failure.
#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    iat: i64,
    exp: i64,
}

impl TokenPayload {
    fn into_claim(self) -> DecodedClaim {
        let username = self
            .username
            .filter(|u| !u.is_empty())
            .ok_or(ClaimError::MissingField("username"))?;
        let role = self.role.ok_or(ClaimError::MissingField("role"))?.parse()?;
        Ok(IdentityClaim { username, role })
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("JWT generation error: {0}")]
    Generation(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),
}

/// Access token handed back at login
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

/// Issues and verifies HS256 access tokens
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry_secs: u64,
}

impl TokenService {
    pub fn new(secret: &str, expiry_secs: u64) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::InvalidSecret);
        }

        let mut validation = Validation::default();
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expiry_secs,
        })
    }

    pub fn from_config(security: &SecurityConfig) -> Result<Self, TokenError> {
        Self::new(&security.jwt_secret, security.jwt_expiry_secs)
    }

    pub fn issue(&self, claim: &IdentityClaim) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let payload = TokenPayload {
            username: Some(claim.username.clone()),
            role: Some(claim.role.as_str().to_string()),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.expiry_secs as i64)).timestamp(),
        };

        let access_token = encode(&Header::default(), &payload, &self.encoding_key)
            .map_err(|e| TokenError::Generation(e.to_string()))?;

        Ok(IssuedToken {
            access_token,
            token_type: "Bearer",
            expires_in: self.expiry_secs,
        })
    }

    /// Check signature and expiry, then decode the identity.
    ///
    /// The outer error means the token itself cannot be trusted; the inner
    /// `DecodedClaim` is `Err` when the token is genuine but its payload is
    /// not a usable identity.
    pub fn verify(&self, token: &str) -> Result<DecodedClaim, TokenError> {
        let data = decode::<TokenPayload>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        Ok(data.claims.into_claim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> TokenService {
        TokenService::new("test-secret", 3600).unwrap()
    }

    fn sign(payload: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &payload,
            &EncodingKey::from_secret("test-secret".as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn issue_then_verify_returns_identity() {
        let tokens = service();
        let claim = IdentityClaim::new("nurse", Role::Admin);
        let issued = tokens.issue(&claim).unwrap();

        assert_eq!(issued.expires_in, 3600);
        assert_eq!(tokens.verify(&issued.access_token).unwrap(), Ok(claim));
    }

    #[test]
    fn rejects_empty_secret() {
        assert!(matches!(TokenService::new("", 60), Err(TokenError::InvalidSecret)));
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let other = TokenService::new("other-secret", 3600).unwrap();
        let issued = other.issue(&IdentityClaim::new("x", Role::User)).unwrap();
        assert!(matches!(service().verify(&issued.access_token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn rejects_expired_token() {
        let now = Utc::now().timestamp();
        let token = sign(json!({"username": "a", "role": "admin", "iat": now - 7200, "exp": now - 3600}));
        assert!(matches!(service().verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn genuine_token_without_role_is_a_claim_error() {
        let now = Utc::now().timestamp();
        let token = sign(json!({"username": "a", "iat": now, "exp": now + 60}));
        assert_eq!(service().verify(&token).unwrap(), Err(ClaimError::MissingField("role")));
    }

    #[test]
    fn genuine_token_with_unknown_role_is_a_claim_error() {
        let now = Utc::now().timestamp();
        let token = sign(json!({"username": "a", "role": "root", "iat": now, "exp": now + 60}));
        assert_eq!(
            service().verify(&token).unwrap(),
            Err(ClaimError::UnknownRole("root".to_string()))
        );
    }
}
