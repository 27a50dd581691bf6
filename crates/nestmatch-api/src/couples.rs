//! Handlers for `/couples` decision views.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/couples/mutual-likes` | `?includeProperties=true\|false&window=all\|<n>d` |
//! | `GET`   | `/couples/disputed` | Same query parameters |
//! | `PATCH` | `/couples/disputed` | Body `{"propertyId": ...}`; idempotent |

use std::time::Instant;

use axum::{
  Json,
  extract::State,
};
use nestmatch_core::{
  params::{Window, parse_flag},
  store::NestStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  AppState,
  auth::Identity,
  engine::{DecisionsOutcome, ResolveOutcome},
  error::ApiError,
  extract::{Body, Params},
  view::Performance,
};

// ─── Reads ────────────────────────────────────────────────────────────────────

/// Raw query parameters; parsed strictly rather than by serde so that
/// malformed values become validation errors.
#[derive(Debug, Default, Deserialize)]
pub struct DecisionParams {
  #[serde(rename = "includeProperties")]
  pub include_properties: Option<String>,
  pub window:             Option<String>,
}

async fn load<S>(
  state: &AppState<S>,
  identity: &Identity,
  params: &DecisionParams,
) -> Result<(DecisionsOutcome, Performance), ApiError>
where
  S: NestStore + 'static,
{
  let started = Instant::now();
  let include_properties = parse_flag(params.include_properties.as_deref())?;
  let window = Window::parse(params.window.as_deref())?;

  let outcome = state
    .engine
    .decisions(&identity.0, include_properties, window)
    .await?;

  let performance = Performance {
    total_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    cached:        outcome.cached,
    degraded:      outcome.degraded,
  };
  Ok((outcome, performance))
}

/// `GET /couples/mutual-likes`
pub async fn mutual_likes<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Params(params): Params<DecisionParams>,
) -> Result<Json<Value>, ApiError>
where
  S: NestStore + 'static,
{
  let (outcome, performance) = load(&state, &identity, &params).await?;
  Ok(Json(json!({
    "mutualLikes": outcome.view.mutual_likes,
    "performance": performance,
  })))
}

/// `GET /couples/disputed`
pub async fn disputed<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Params(params): Params<DecisionParams>,
) -> Result<Json<Value>, ApiError>
where
  S: NestStore + 'static,
{
  let (outcome, performance) = load(&state, &identity, &params).await?;
  Ok(Json(json!({
    "disputedProperties": outcome.view.disputed_properties,
    "performance": performance,
  })))
}

// ─── Resolve ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveBody {
  pub property_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
  pub property_id: Uuid,
  pub status:      ResolveOutcome,
}

/// `PATCH /couples/disputed`
pub async fn resolve<S>(
  State(state): State<AppState<S>>,
  Identity(user): Identity,
  Body(body): Body<ResolveBody>,
) -> Result<Json<ResolveResponse>, ApiError>
where
  S: NestStore + 'static,
{
  let status = state
    .engine
    .resolve_dispute(&user, body.property_id)
    .await?;
  Ok(Json(ResolveResponse { property_id: body.property_id, status }))
}
