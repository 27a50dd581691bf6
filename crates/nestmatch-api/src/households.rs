//! Handlers for household membership and invitations.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `POST`  | `/households` | Body `{"name": ...}`; 201 + household |
//! | `GET`   | `/households/me` | Household (member count reconciled) and members |
//! | `GET`   | `/households/scope` | Effective location scope |
//! | `PATCH` | `/households/invite` | Body `{"email": ...}`; 201 + invitation |
//! | `POST`  | `/households/leave` | 204 |
//! | `POST`  | `/invite/{token}/accept` | 200 + joined household |
//! | `POST`  | `/invite/{token}/revoke` | 204 |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use nestmatch_core::{
  household::{Household, Invitation},
  location::EffectiveScope,
  store::NestStore,
};
use serde::Deserialize;

use crate::{
  AppState,
  auth::Identity,
  engine::HouseholdView,
  error::ApiError,
  extract::Body,
};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name: String,
}

/// `POST /households`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Identity(user): Identity,
  Body(body): Body<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: NestStore + 'static,
{
  let household = state.engine.create_household(&user, &body.name).await?;
  Ok((StatusCode::CREATED, Json(household)))
}

/// `GET /households/me`
pub async fn me<S>(
  State(state): State<AppState<S>>,
  Identity(user): Identity,
) -> Result<Json<HouseholdView>, ApiError>
where
  S: NestStore + 'static,
{
  Ok(Json(state.engine.household_view(&user).await?))
}

/// `GET /households/scope`
pub async fn scope<S>(
  State(state): State<AppState<S>>,
  Identity(user): Identity,
) -> Result<Json<EffectiveScope>, ApiError>
where
  S: NestStore + 'static,
{
  Ok(Json(state.engine.scope(&user).await?))
}

#[derive(Debug, Deserialize)]
pub struct InviteBody {
  pub email: String,
}

/// `PATCH /households/invite`
pub async fn invite<S>(
  State(state): State<AppState<S>>,
  Identity(user): Identity,
  Body(body): Body<InviteBody>,
) -> Result<(StatusCode, Json<Invitation>), ApiError>
where
  S: NestStore + 'static,
{
  let invitation = state.engine.invite(&user, &body.email).await?;
  Ok((StatusCode::CREATED, Json(invitation)))
}

/// `POST /households/leave`
pub async fn leave<S>(
  State(state): State<AppState<S>>,
  Identity(user): Identity,
) -> Result<StatusCode, ApiError>
where
  S: NestStore + 'static,
{
  state.engine.leave(&user).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /invite/{token}/accept`
pub async fn accept<S>(
  State(state): State<AppState<S>>,
  Identity(user): Identity,
  Path(token): Path<String>,
) -> Result<Json<Household>, ApiError>
where
  S: NestStore + 'static,
{
  Ok(Json(state.engine.accept(&user, &token).await?))
}

/// `POST /invite/{token}/revoke`
pub async fn revoke<S>(
  State(state): State<AppState<S>>,
  Identity(user): Identity,
  Path(token): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: NestStore + 'static,
{
  state.engine.revoke(&user, &token).await?;
  Ok(StatusCode::NO_CONTENT)
}
