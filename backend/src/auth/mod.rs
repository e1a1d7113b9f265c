use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::collaborators::ProfileProvider;
use crate::error::AppError;
use crate::models::actor::{Actor, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // user id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<Uuid>,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// What the extractor needs from application state.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub profiles: Arc<dyn ProfileProvider>,
    pub default_timezone: String,
}

/// The authenticated caller, resolved from a bearer token.
pub struct AuthUser(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AuthConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let cfg = AuthConfig::from_ref(state);
        let token = extract_bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;

        let key = DecodingKey::from_secret(cfg.jwt_secret.as_bytes());
        let claims = decode::<Claims>(&token, &key, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                tracing::warn!("JWT decode failed: {}", e);
                AppError::Unauthorized
            })?
            .claims;

        if claims.role == Role::OrgAdmin && claims.org_id.is_none() {
            tracing::warn!(user = %claims.sub, "org_admin token without org_id");
            return Err(AppError::Unauthorized);
        }

        let timezone = cfg
            .profiles
            .default_timezone(claims.sub)
            .await
            .map_err(|e| AppError::Internal(e.context("Profile timezone lookup failed")))?
            .filter(|tz| tz.parse::<chrono_tz::Tz>().is_ok())
            .unwrap_or(cfg.default_timezone);

        Ok(AuthUser(Actor {
            id: claims.sub,
            role: claims.role,
            org_id: claims.org_id,
            timezone,
        }))
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get("Authorization")?.to_str().ok()?;
    let token = auth.strip_prefix("Bearer ")?;
    Some(token.to_string())
}

/// Issues a token in the format the extractor accepts. Tokens are normally
/// minted by the identity service; this is used by tooling and tests.
pub fn create_token(
    user_id: Uuid,
    org_id: Option<Uuid>,
    role: Role,
    secret: &str,
    expiry_hours: u64,
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = OffsetDateTime::now_utc();
    let exp = now + time::Duration::hours(expiry_hours as i64);

    let claims = Claims {
        sub: user_id,
        org_id,
        role,
        exp: exp.unix_timestamp(),
        iat: now.unix_timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
