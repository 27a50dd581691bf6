//! `PUT /users/me/preferences`

use axum::{Json, extract::State};
use nestmatch_core::{
  location::{EffectiveScope, LocationPreference},
  store::NestStore,
};

use crate::{AppState, auth::Identity, error::ApiError, extract::Body};

/// Replace the caller's location preferences. Responds with the household's
/// recomputed effective scope.
pub async fn replace<S>(
  State(state): State<AppState<S>>,
  Identity(user): Identity,
  Body(body): Body<LocationPreference>,
) -> Result<Json<EffectiveScope>, ApiError>
where
  S: NestStore + 'static,
{
  Ok(Json(state.engine.set_preferences(&user, body).await?))
}
