//! Bearer token issuance and verification for the authenticated variant.
//!
//! Tokens are HS256 JWTs whose subject is the user's email. The store never
//! sees them; the HTTP layer checks them before calling into it.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Invalid token format (expected 'Bearer <token>')")]
    InvalidFormat,
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token: {0}")]
    Invalid(String),
    #[error("Could not issue token: {0}")]
    Issue(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Email of the authenticated user
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

pub struct JwtAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtAuth {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 5;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// Issue a token for `email`, already prefixed with `Bearer `.
    pub fn issue(&self, email: &str) -> Result<String, AuthError> {
        let now = unix_now();
        let claims = Claims {
            sub: email.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs()),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Issue(e.to_string()))?;
        Ok(format!("{BEARER_PREFIX}{token}"))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                JwtErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(e.to_string()),
            }
        })?;
        Ok(data.claims)
    }

    /// Validate the value of an `Authorization` header.
    pub fn validate_header(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let header = header.ok_or(AuthError::MissingToken)?;
        self.validate_token(extract_token(header)?)
    }
}

/// Strip the `Bearer ` prefix from an `Authorization` header value.
pub fn extract_token(header: &str) -> Result<&str, AuthError> {
    let token = header
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::InvalidFormat)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef";

    fn auth() -> JwtAuth {
        JwtAuth::new(SECRET, Duration::from_secs(3600))
    }

    #[test]
    fn issued_token_round_trips() {
        let auth = auth();
        let header = auth.issue("ana@x.com").unwrap();
        assert!(header.starts_with("Bearer "));

        let claims = auth.validate_header(Some(&header)).unwrap();
        assert_eq!(claims.sub, "ana@x.com");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = unix_now();
        let claims = Claims {
            sub: "ana@x.com".into(),
            iat: now - 1000,
            exp: now - 100,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(auth().validate_token(&token), Err(AuthError::Expired));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let other = JwtAuth::new("fedcba9876543210", Duration::from_secs(60));
        let header = other.issue("ana@x.com").unwrap();
        assert!(matches!(
            auth().validate_header(Some(&header)),
            Err(AuthError::Invalid(_))
        ));
    }

    #[test]
    fn header_shape_is_checked() {
        let auth = auth();
        assert_eq!(auth.validate_header(None), Err(AuthError::MissingToken));
        assert_eq!(auth.validate_header(Some("Token abc")), Err(AuthError::InvalidFormat));
        assert_eq!(auth.validate_header(Some("Bearer ")), Err(AuthError::MissingToken));
        assert_eq!(extract_token("Bearer abc.def"), Ok("abc.def"));
    }
}
