//! Acting-user resolution for write endpoints
//!
//! With `auth.enabled`, callers present `Authorization: Bearer <jwt>` signed with
//! the shared HS256 secret; the `sub` claim is the acting user's UUID. Without it,
//! the `X-Actor-Id` header names the actor directly (local development, trusted
//! gateways).

use crate::config::AuthConfig;
use crate::state::AppState;
use crate::Error;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Debug, Clone, Deserialize)]
struct ActorClaims {
    sub: String,
}

pub struct AuthManager {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl AuthManager {
    pub fn new(config: &AuthConfig) -> crate::Result<Self> {
        let key = if config.enabled {
            let secret = config
                .jwt_secret
                .as_deref()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    Error::Config("auth.jwt_secret must be set when auth is enabled".into())
                })?;
            Some(DecodingKey::from_secret(secret.as_bytes()))
        } else {
            None
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Ok(Self { key, validation })
    }

    pub fn enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Resolve the acting user from request headers.
    pub fn actor(&self, headers: &HeaderMap) -> crate::Result<Uuid> {
        match &self.key {
            Some(key) => {
                let token = bearer_token(headers)
                    .ok_or_else(|| Error::Unauthorized("missing bearer token".into()))?;
                let data = decode::<ActorClaims>(token, key, &self.validation)
                    .map_err(|e| Error::Unauthorized(format!("invalid token: {e}")))?;
                parse_actor(&data.claims.sub)
            }
            None => {
                let value = headers
                    .get(ACTOR_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| Error::Unauthorized("missing X-Actor-Id header".into()))?;
                parse_actor(value)
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
}

fn parse_actor(value: &str) -> crate::Result<Uuid> {
    match Uuid::parse_str(value.trim()) {
        Ok(id) if !id.is_nil() => Ok(id),
        _ => Err(Error::Unauthorized(
            "acting user must be a non-nil UUID".into(),
        )),
    }
}

/// The authenticated acting user of a write request.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state.auth.actor(&parts.headers).map(Actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: usize,
    }

    fn token(secret: &str, sub: &str) -> String {
        let exp = (chrono::Utc::now().timestamp() + 600) as usize;
        encode(
            &Header::new(Algorithm::HS256),
            &Claims {
                sub: sub.to_string(),
                exp,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn enabled(secret: &str) -> AuthManager {
        AuthManager::new(&AuthConfig {
            enabled: true,
            jwt_secret: Some(secret.to_string()),
        })
        .unwrap()
    }

    #[test]
    fn header_actor_when_auth_is_off() {
        let auth = AuthManager::new(&AuthConfig::default()).unwrap();
        let actor = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        assert!(auth.actor(&headers).is_err());

        headers.insert(
            ACTOR_HEADER,
            HeaderValue::from_str(&actor.to_string()).unwrap(),
        );
        assert_eq!(auth.actor(&headers).unwrap(), actor);

        headers.insert(ACTOR_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(auth.actor(&headers), Err(Error::Unauthorized(_))));
    }

    #[test]
    fn bearer_subject_is_the_actor() {
        let auth = enabled("s3cret");
        let actor = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token("s3cret", &actor.to_string())))
                .unwrap(),
        );
        assert_eq!(auth.actor(&headers).unwrap(), actor);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let auth = enabled("s3cret");
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!(
                "Bearer {}",
                token("other", &Uuid::new_v4().to_string())
            ))
            .unwrap(),
        );
        assert!(matches!(auth.actor(&headers), Err(Error::Unauthorized(_))));
    }

    #[test]
    fn enabled_without_secret_is_a_config_error() {
        let res = AuthManager::new(&AuthConfig {
            enabled: true,
            jwt_secret: None,
        });
        assert!(matches!(res, Err(Error::Config(_))));
    }
}
