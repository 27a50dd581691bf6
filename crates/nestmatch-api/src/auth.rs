//! Bearer-session identity extractor.
//!
//! Session issuance lives outside this crate. Requests carry
//! `Authorization: Bearer <token>`; the store only ever sees the SHA-256 hex
//! digest of the token.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use nestmatch_core::{household::UserAccount, store::NestStore};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::{AppState, error::ApiError};

/// The authenticated caller, loaded fresh from the store for each request.
///
/// Rate-limited routes resolve it in middleware and leave it in the request
/// extensions; the extractor takes it from there instead of asking the store
/// again.
#[derive(Debug, Clone)]
pub struct Identity(pub UserAccount);

/// Hex SHA-256 digest under which a session token is stored.
pub fn token_digest(token: &str) -> String {
  hex::encode(Sha256::digest(token.as_bytes()))
}

/// 256 bits from the OS RNG, hex-encoded. Used for invitation and session
/// tokens.
pub fn new_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

/// Extract the raw bearer token, if the header is present and well-formed.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

impl<S> FromRequestParts<AppState<S>> for Identity
where
  S: NestStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    if let Some(identity) = parts.extensions.remove::<Identity>() {
      return Ok(identity);
    }
    let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
    let user = state
      .engine
      .store()
      .user_for_session(token_digest(token))
      .await
      .map_err(ApiError::store)?
      .ok_or(ApiError::Unauthorized)?;
    Ok(Identity(user))
  }
}
