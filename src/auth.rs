//! Learner identity boundary. Tokens are normally issued by the external
//! identity provider; this module only verifies them and exposes the
//! learner id as an opaque string to the rest of the server.

use std::sync::LazyLock;

use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::Error;

static JWT_SECRET: LazyLock<Vec<u8>> = LazyLock::new(|| {
    let _ = dotenvy::dotenv();
    dotenvy::var("JWT_SECRET")
        .unwrap_or_else(|_| "insecure-dev-secret".to_string())
        .as_bytes()
        .to_vec()
});

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

pub fn issue_token(learner_id: &str, expired_time: time::Duration) -> anyhow::Result<String> {
    let exp = (time::OffsetDateTime::now_utc() + expired_time).unix_timestamp();
    let claims = Claims {
        sub: learner_id.to_string(),
        exp,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(&JWT_SECRET),
    )?;
    Ok(token)
}

pub fn verify_token(token: &str) -> Result<String, Error> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(&JWT_SECRET),
        &Validation::default(),
    )
    .map_err(|_| Error::Unauthorized)?
    .claims;
    Ok(claims.sub)
}

/// Verified learner id, extracted from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct Learner(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Learner {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(Error::Unauthorized)?;
        let token = header.strip_prefix("Bearer ").ok_or(Error::Unauthorized)?;
        Ok(Learner(verify_token(token)?))
    }
}
