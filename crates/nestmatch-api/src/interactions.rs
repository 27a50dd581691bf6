//! `POST /interactions`: record a like or dislike.

use axum::{
  Json,
  extract::State,
  http::StatusCode,
};
use nestmatch_core::{
  interaction::{Interaction, InteractionKind},
  store::NestStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Identity, error::ApiError, extract::Body};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionBody {
  pub property_id:      Uuid,
  pub interaction_type: InteractionKind,
}

/// Appends a row stamped with the caller's current household. Returns 201.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Identity(user): Identity,
  Body(body): Body<InteractionBody>,
) -> Result<(StatusCode, Json<Interaction>), ApiError>
where
  S: NestStore + 'static,
{
  let interaction = state
    .engine
    .record_interaction(&user, body.property_id, body.interaction_type)
    .await?;
  Ok((StatusCode::CREATED, Json(interaction)))
}
