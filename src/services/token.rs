use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::models::Role;

const ISSUER: &str = "shuati";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id, or admin id when `role` is admin.
    pub sub: i64,
    pub role: Role,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expire_at: DateTime<Utc>,
}

/// Signs and verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours.max(1)),
        }
    }

    pub fn issue(&self, sub: i64, role: Role, name: &str) -> Result<IssuedToken> {
        let now = Utc::now();
        let expire_at = now + self.ttl;
        let claims = Claims {
            sub,
            role,
            name: name.to_string(),
            iat: now.timestamp(),
            exp: expire_at.timestamp(),
            iss: ISSUER.to_string(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(IssuedToken { token, expire_at })
    }

    /// Claims of a valid, unexpired token issued by this service.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.leeway = 0;

        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| eyre!("invalid token: {e}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify() {
        let tokens = TokenService::new("secret", 24);
        let issued = tokens.issue(42, Role::Guest, "guest_abc").unwrap();

        let claims = tokens.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::Guest);
        assert_eq!(claims.name, "guest_abc");
        assert_eq!(claims.iss, "shuati");
        assert_eq!(claims.exp, issued.expire_at.timestamp());
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let issued = TokenService::new("one", 24).issue(1, Role::User, "a").unwrap();
        assert!(TokenService::new("two", 24).verify(&issued.token).is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let tokens = TokenService::new("secret", 24);
        let claims = Claims {
            sub: 1,
            role: Role::Admin,
            name: "admin".to_string(),
            iat: 1_000,
            exp: 2_000,
            iss: ISSUER.to_string(),
        };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &tokens.encoding).unwrap();
        assert!(tokens.verify(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(TokenService::new("secret", 1).verify("not.a.token").is_err());
    }
}
