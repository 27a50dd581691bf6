//! JSON HTTP API for the nestmatch household engine.
//!
//! Exposes an axum [`Router`] backed by any [`NestStore`]. Requests
//! authenticate with an opaque bearer session token; issuing tokens is the
//! caller's concern.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let engine = Engine::new(store, EngineConfig::default());
//! let app = nestmatch_api::router(AppState::new(engine, RateLimitConfig::default()));
//! ```

pub mod auth;
pub mod cache;
pub mod couples;
pub mod engine;
pub mod error;
pub mod extract;
pub mod households;
pub mod interactions;
pub mod limiter;
pub mod notify;
pub mod preferences;
pub mod view;

use std::sync::Arc;

use axum::{
  Router, middleware,
  routing::{get, patch, post, put},
};
use nestmatch_core::store::NestStore;
use tower_http::trace::TraceLayer;

pub use engine::{Engine, EngineConfig};
pub use error::ApiError;
pub use limiter::{RateLimitConfig, RateLimiter};

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers. Both the engine (with its
/// cache) and the limiter are process-wide and constructed exactly once.
pub struct AppState<S> {
  pub engine:  Arc<Engine<S>>,
  pub limiter: Arc<RateLimiter>,
}

impl<S> AppState<S> {
  pub fn new(engine: Engine<S>, limits: RateLimitConfig) -> Self {
    Self {
      engine:  Arc::new(engine),
      limiter: Arc::new(RateLimiter::new(limits)),
    }
  }
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { engine: self.engine.clone(), limiter: self.limiter.clone() }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router. Read endpoints accept only `GET` and sit behind the
/// rate limiter.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: NestStore + 'static,
{
  let limit = middleware::from_fn_with_state(state.clone(), limiter::limit_reads::<S>);

  Router::new()
    // Decision views
    .route("/couples/mutual-likes", get(couples::mutual_likes::<S>).route_layer(limit.clone()))
    .route(
      "/couples/disputed",
      get(couples::disputed::<S>)
        .route_layer(limit.clone())
        .patch(couples::resolve::<S>),
    )
    // Households
    .route("/households", post(households::create::<S>))
    .route("/households/me", get(households::me::<S>).route_layer(limit.clone()))
    .route("/households/scope", get(households::scope::<S>).route_layer(limit))
    .route("/households/invite", patch(households::invite::<S>))
    .route("/households/leave", post(households::leave::<S>))
    .route("/invite/{token}/accept", post(households::accept::<S>))
    .route("/invite/{token}/revoke", post(households::revoke::<S>))
    // Writes
    .route("/interactions", post(interactions::create::<S>))
    .route("/users/me/preferences", put(preferences::replace::<S>))
    .route("/health", get(health))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn health() -> &'static str { "ok" }

#[cfg(test)]
mod tests {
  use std::{net::SocketAddr, time::Duration};

  use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use nestmatch_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;
  use crate::auth::token_digest;

  struct Harness {
    store: Arc<SqliteStore>,
    state: AppState<SqliteStore>,
  }

  impl Harness {
    async fn new() -> Self {
      Self::with_limits(RateLimitConfig {
        burst:        1_000,
        per_sec:      1_000.0,
        peer_burst:   1_000,
        peer_per_sec: 1_000.0,
      })
      .await
    }

    async fn with_limits(limits: RateLimitConfig) -> Self {
      let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
      let engine = Engine::new(store.clone(), EngineConfig::default());
      Self { store, state: AppState::new(engine, limits) }
    }

    /// Create a user and return a bearer token for them.
    async fn login(&self, email: &str) -> String {
      let user = self.store.create_user(email.into()).await.unwrap();
      let token = format!("tok-{}", user.user_id.simple());
      self.store.issue_session(user.user_id, token_digest(&token)).await.unwrap();
      token
    }

    async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
      let mut builder = Request::builder().method(method).uri(uri);
      if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
      }
      let body = match body {
        Some(v) => {
          builder = builder.header(header::CONTENT_TYPE, "application/json");
          Body::from(v.to_string())
        }
        None => Body::empty(),
      };
      router(self.state.clone()).oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    async fn json(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
      let resp = self.call(method, uri, token, body).await;
      let status = resp.status();
      let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
      let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
      (status, value)
    }

    /// Two logged-in users sharing a household.
    async fn couple(&self) -> (String, String) {
      let a = self.login("alice@x.com").await;
      let b = self.login("bob@x.com").await;
      let (s, _) = self.json("POST", "/households", Some(&a), Some(json!({ "name": "Home" }))).await;
      assert_eq!(s, StatusCode::CREATED);
      let (s, inv) = self
        .json("PATCH", "/households/invite", Some(&a), Some(json!({ "email": "bob@x.com" })))
        .await;
      assert_eq!(s, StatusCode::CREATED);
      let token = inv["token"].as_str().unwrap().to_owned();
      let (s, _) = self.json("POST", &format!("/invite/{token}/accept"), Some(&b), None).await;
      assert_eq!(s, StatusCode::OK);
      (a, b)
    }

    async fn swipe(&self, token: &str, property_id: Uuid, kind: &str) {
      let body = json!({ "propertyId": property_id, "interactionType": kind });
      let (s, _) = self.json("POST", "/interactions", Some(token), Some(body)).await;
      assert_eq!(s, StatusCode::CREATED);
    }
  }

  fn ids(list: &Value) -> Vec<String> {
    list
      .as_array()
      .unwrap()
      .iter()
      .map(|i| i["propertyId"].as_str().unwrap().to_owned())
      .collect()
  }

  // ── Auth, limits, verbs ─────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_needs_no_auth() {
    let h = Harness::new().await;
    assert_eq!(h.call("GET", "/health", None, None).await.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn missing_or_unknown_token_is_401() {
    let h = Harness::new().await;
    let (s, body) = h.json("GET", "/couples/mutual-likes", None, None).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (s, _) = h.json("GET", "/couples/disputed", Some("nope"), None).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);
    let (s, _) = h.json("POST", "/households", None, Some(json!({ "name": "x" }))).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn read_endpoints_reject_other_verbs() {
    let h = Harness::new().await;
    let token = h.login("alice@x.com").await;
    for method in ["POST", "PUT", "DELETE"] {
      let resp = h.call(method, "/couples/mutual-likes", Some(&token), None).await;
      assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
    }
    let resp = h.call("DELETE", "/couples/disputed", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
  }

  #[tokio::test]
  async fn reads_are_throttled_per_session() {
    let h = Harness::with_limits(RateLimitConfig { burst: 2, per_sec: 0.0, ..RateLimitConfig::default() }).await;
    let token = h.login("alice@x.com").await;

    for _ in 0..2 {
      let resp = h.call("GET", "/couples/mutual-likes", Some(&token), None).await;
      assert_eq!(resp.status(), StatusCode::OK);
    }
    let (s, body) = h.json("GET", "/couples/mutual-likes", Some(&token), None).await;
    assert_eq!(s, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limited");

    // Writes are not throttled.
    let (s, _) = h.json("POST", "/households", Some(&token), Some(json!({ "name": "Home" }))).await;
    assert_eq!(s, StatusCode::CREATED);

    h.state.limiter.clear();
    let resp = h.call("GET", "/couples/mutual-likes", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  fn from_peer(ip: [u8; 4], token: &str) -> Request<Body> {
    let mut req = Request::builder()
      .uri("/couples/mutual-likes")
      .header(header::AUTHORIZATION, format!("Bearer {token}"))
      .body(Body::empty())
      .unwrap();
    req.extensions_mut().insert(ConnectInfo(SocketAddr::from((ip, 40_000))));
    req
  }

  #[tokio::test]
  async fn cycling_bogus_tokens_still_drains_the_peer_bucket() {
    let h = Harness::with_limits(RateLimitConfig {
      peer_burst: 3,
      peer_per_sec: 0.0,
      ..RateLimitConfig::default()
    })
    .await;

    let mut statuses = Vec::new();
    for i in 0..50 {
      let resp = router(h.state.clone())
        .oneshot(from_peer([10, 0, 0, 1], &format!("bogus-{i}")))
        .await
        .unwrap();
      statuses.push(resp.status());
    }
    assert_eq!(&statuses[..3], &[StatusCode::UNAUTHORIZED; 3]);
    assert!(statuses[3..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
    assert_eq!(h.state.limiter.tracked(), 1, "one bucket for the peer, none per token");

    // Another address is unaffected.
    let resp = router(h.state.clone())
      .oneshot(from_peer([10, 0, 0, 2], "bogus-x"))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn partners_behind_one_address_have_separate_buckets() {
    let h = Harness::with_limits(RateLimitConfig { burst: 1, per_sec: 0.0, ..RateLimitConfig::default() }).await;
    let (a, b) = h.couple().await;

    for token in [&a, &b] {
      let resp = router(h.state.clone()).oneshot(from_peer([192, 168, 1, 5], token)).await.unwrap();
      assert_eq!(resp.status(), StatusCode::OK);
    }
    let resp = router(h.state.clone()).oneshot(from_peer([192, 168, 1, 5], &a)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
  }

  #[tokio::test]
  async fn malformed_query_params_are_400() {
    let h = Harness::new().await;
    let token = h.login("alice@x.com").await;
    for uri in [
      "/couples/mutual-likes?includeProperties=yes",
      "/couples/mutual-likes?window=forever",
      "/couples/disputed?window=0d",
    ] {
      let (s, body) = h.json("GET", uri, Some(&token), None).await;
      assert_eq!(s, StatusCode::BAD_REQUEST, "{uri}");
      assert_eq!(body["error"], "validation_error");
    }
    let resp = h.call("GET", "/couples/mutual-likes?includeProperties=0&window=30d", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn malformed_bodies_are_400() {
    let h = Harness::new().await;
    let token = h.login("alice@x.com").await;

    let (s, body) = h
      .json("PATCH", "/couples/disputed", Some(&token), Some(json!({ "propertyId": "nope" })))
      .await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (s, body) = h
      .json("POST", "/interactions", Some(&token), Some(json!({ "propertyId": Uuid::new_v4(), "interactionType": "meh" })))
      .await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
  }

  // ── Membership ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn household_lifecycle() {
    let h = Harness::new().await;
    let (a, b) = h.couple().await;

    let (s, me) = h.json("GET", "/households/me", Some(&a), None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(me["household"]["memberCount"], 2);
    assert_eq!(me["members"].as_array().unwrap().len(), 2);

    let (s, body) = h.json("POST", "/households", Some(&b), Some(json!({ "name": "Mine" }))).await;
    assert_eq!(s, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_in_household");

    let resp = h.call("POST", "/households/leave", Some(&b), None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let (s, body) = h.json("POST", "/households/leave", Some(&b), None).await;
    assert_eq!(s, StatusCode::CONFLICT);
    assert_eq!(body["error"], "not_in_household");

    let (_, me) = h.json("GET", "/households/me", Some(&b), None).await;
    assert_eq!(me, json!({ "household": null, "members": [] }));
    let (_, me) = h.json("GET", "/households/me", Some(&a), None).await;
    assert_eq!(me["household"]["memberCount"], 1);
  }

  #[tokio::test]
  async fn accept_errors_map_to_statuses() {
    let h = Harness::new().await;
    let (a, _) = h.couple().await;
    let carol = h.login("carol@x.com").await;

    let (s, body) = h.json("POST", "/invite/not-a-token/accept", Some(&carol), None).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "invitation_not_found");

    // Re-invite supersedes the first token.
    let (_, first) = h
      .json("PATCH", "/households/invite", Some(&a), Some(json!({ "email": "carol@x.com" })))
      .await;
    let (_, second) = h
      .json("PATCH", "/households/invite", Some(&a), Some(json!({ "email": "carol@x.com" })))
      .await;
    let first = first["token"].as_str().unwrap().to_owned();
    let second = second["token"].as_str().unwrap().to_owned();

    let (s, body) = h.json("POST", &format!("/invite/{first}/accept"), Some(&carol), None).await;
    assert_eq!(s, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invitation_already_resolved");

    let (s, _) = h.json("POST", &format!("/invite/{second}/accept"), Some(&carol), None).await;
    assert_eq!(s, StatusCode::OK);
    let (s, _) = h.json("POST", &format!("/invite/{second}/accept"), Some(&carol), None).await;
    assert_eq!(s, StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn invite_validates_email() {
    let h = Harness::new().await;
    let (a, _) = h.couple().await;
    let (s, body) = h
      .json("PATCH", "/households/invite", Some(&a), Some(json!({ "email": "not-an-email" })))
      .await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let loner = h.login("zed@x.com").await;
    let (s, body) = h
      .json("PATCH", "/households/invite", Some(&loner), Some(json!({ "email": "a@b.com" })))
      .await;
    assert_eq!(s, StatusCode::CONFLICT);
    assert_eq!(body["error"], "not_in_household");
  }

  #[tokio::test]
  async fn revoke_round_trip() {
    let h = Harness::new().await;
    let (a, _) = h.couple().await;
    let carol = h.login("carol@x.com").await;
    let (_, inv) = h
      .json("PATCH", "/households/invite", Some(&a), Some(json!({ "email": "carol@x.com" })))
      .await;
    let token = inv["token"].as_str().unwrap().to_owned();

    let resp = h.call("POST", &format!("/invite/{token}/revoke"), Some(&a), None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let (s, _) = h.json("POST", &format!("/invite/{token}/accept"), Some(&carol), None).await;
    assert_eq!(s, StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn concurrent_accepts_one_wins() {
    let h = Harness::new().await;
    let alice = h.login("alice@x.com").await;
    let carol = h.login("carol@x.com").await;
    let bob = h.login("bob@x.com").await;

    let mut tokens = Vec::new();
    for owner in [&alice, &carol] {
      h.json("POST", "/households", Some(owner), Some(json!({ "name": "H" }))).await;
      let (_, inv) = h
        .json("PATCH", "/households/invite", Some(owner), Some(json!({ "email": "bob@x.com" })))
        .await;
      tokens.push(inv["token"].as_str().unwrap().to_owned());
    }

    let uri_a = format!("/invite/{}/accept", tokens[0]);
    let uri_c = format!("/invite/{}/accept", tokens[1]);
    let ((sa, ba), (sc, bc)) = tokio::join!(
      h.json("POST", &uri_a, Some(&bob), None),
      h.json("POST", &uri_c, Some(&bob), None),
    );

    let mut statuses = [sa.as_u16(), sc.as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, [200, 409]);
    let loser = if sa == StatusCode::CONFLICT { ba } else { bc };
    assert_eq!(loser["error"], "must_leave_household_first");
  }

  // ── Decisions ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn one_sided_dislike_is_not_a_dispute() {
    let h = Harness::new().await;
    let (a, b) = h.couple().await;
    let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());

    h.swipe(&a, p1, "like").await;
    h.swipe(&b, p1, "like").await;
    h.swipe(&b, p2, "dislike").await;

    let (s, body) = h.json("GET", "/couples/mutual-likes", Some(&a), None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(ids(&body["mutualLikes"]), vec![p1.to_string()]);
    assert_eq!(body["mutualLikes"][0]["likedByCount"], 2);
    assert_eq!(body["performance"]["cached"], false);
    assert_eq!(body["performance"]["degraded"], false);

    let (_, body) = h.json("GET", "/couples/disputed", Some(&b), None).await;
    assert!(ids(&body["disputedProperties"]).is_empty());
  }

  #[tokio::test]
  async fn dispute_resolution_is_idempotent() {
    let h = Harness::new().await;
    let (a, b) = h.couple().await;
    let p3 = Uuid::new_v4();
    h.swipe(&a, p3, "dislike").await;
    h.swipe(&b, p3, "like").await;

    let (_, body) = h.json("GET", "/couples/disputed", Some(&a), None).await;
    assert_eq!(ids(&body["disputedProperties"]), vec![p3.to_string()]);

    let patch = json!({ "propertyId": p3 });
    let (s, body) = h.json("PATCH", "/couples/disputed", Some(&a), Some(patch.clone())).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(body["status"], "resolved");
    let (s, body) = h.json("PATCH", "/couples/disputed", Some(&b), Some(patch)).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(body["status"], "alreadyResolved");

    let (_, body) = h.json("GET", "/couples/disputed", Some(&a), None).await;
    assert!(ids(&body["disputedProperties"]).is_empty());

    let other = json!({ "propertyId": Uuid::new_v4() });
    let (s, body) = h.json("PATCH", "/couples/disputed", Some(&a), Some(other)).await;
    assert_eq!(s, StatusCode::CONFLICT);
    assert_eq!(body["error"], "not_disputed");
  }

  #[tokio::test]
  async fn unaffiliated_caller_gets_empty_views() {
    let h = Harness::new().await;
    let token = h.login("alice@x.com").await;
    h.swipe(&token, Uuid::new_v4(), "like").await;
    let (s, body) = h.json("GET", "/couples/mutual-likes", Some(&token), None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(body["mutualLikes"], json!([]));
  }

  #[tokio::test]
  async fn repeated_reads_hit_the_cache() {
    let h = Harness::new().await;
    let (a, b) = h.couple().await;
    let p = Uuid::new_v4();
    h.swipe(&a, p, "like").await;

    let (_, first) = h.json("GET", "/couples/mutual-likes", Some(&a), None).await;
    assert_eq!(first["performance"]["cached"], false);
    let (_, second) = h.json("GET", "/couples/mutual-likes", Some(&b), None).await;
    assert_eq!(second["performance"]["cached"], true);

    // The partner's swipe invalidates eagerly.
    h.swipe(&b, p, "like").await;
    let (_, third) = h.json("GET", "/couples/mutual-likes", Some(&a), None).await;
    assert_eq!(third["performance"]["cached"], false);
    assert_eq!(ids(&third["mutualLikes"]), vec![p.to_string()]);
  }

  #[tokio::test]
  async fn preferences_feed_scope_and_hydration() {
    let h = Harness::new().await;
    let (a, b) = h.couple().await;

    let prefs = json!({
      "cities": [{ "city": "Austin", "state": "tx" }],
      "neighborhoods": [],
    });
    let (s, scope) = h.json("PUT", "/users/me/preferences", Some(&a), Some(prefs)).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(scope["cities"], json!([{ "city": "Austin", "state": "TX" }]));

    let prefs = json!({ "cities": [{ "city": "Dallas", "state": "TX" }], "neighborhoods": ["zilker"] });
    let (_, scope) = h.json("PUT", "/users/me/preferences", Some(&b), Some(prefs)).await;
    assert_eq!(scope["neighborhoods"], json!(["zilker"]));
    assert_eq!(scope["cities"].as_array().unwrap().len(), 1, "Dallas is overridden");

    let (_, scope) = h.json("GET", "/households/scope", Some(&a), None).await;
    assert_eq!(scope["neighborhoods"], json!(["zilker"]));

    let p = Uuid::new_v4();
    h.swipe(&a, p, "like").await;
    h.swipe(&b, p, "like").await;
    let (_, body) = h
      .json("GET", "/couples/mutual-likes?includeProperties=true", Some(&a), None)
      .await;
    let item = &body["mutualLikes"][0];
    assert!(item["property"].is_null());
    assert_eq!(item["inScope"], false);
  }

  // ── Degraded reads ──────────────────────────────────────────────────────────

  /// A backend whose aggregation queries never complete.
  struct StalledStore {
    user: nestmatch_core::household::UserAccount,
  }

  impl NestStore for StalledStore {
    type Error = std::convert::Infallible;
    async fn create_user(&self, _: String) -> Result<nestmatch_core::household::UserAccount, Self::Error> { unimplemented!() }
    async fn get_user(&self, _: Uuid) -> Result<Option<nestmatch_core::household::UserAccount>, Self::Error> { unimplemented!() }
    async fn issue_session(&self, _: Uuid, _: String) -> Result<(), Self::Error> { unimplemented!() }
    async fn user_for_session(&self, _: String) -> Result<Option<nestmatch_core::household::UserAccount>, Self::Error> { Ok(Some(self.user.clone())) }
    async fn set_preferences(&self, _: Uuid, _: nestmatch_core::location::LocationPreference) -> Result<(), Self::Error> { unimplemented!() }
    async fn get_household(&self, _: Uuid) -> Result<Option<nestmatch_core::household::Household>, Self::Error> { unimplemented!() }
    async fn members_of(&self, _: Uuid) -> Result<Vec<nestmatch_core::household::UserAccount>, Self::Error> { std::future::pending().await }
    async fn create_household(&self, _: Uuid, _: String) -> Result<nestmatch_core::store::Cas<nestmatch_core::household::Household>, Self::Error> { unimplemented!() }
    async fn join_household(&self, _: Uuid, _: Option<Uuid>, _: String) -> Result<nestmatch_core::store::Cas<nestmatch_core::household::Household>, Self::Error> { unimplemented!() }
    async fn leave_household(&self, _: Uuid, _: Uuid) -> Result<nestmatch_core::store::Cas<nestmatch_core::household::Household>, Self::Error> { unimplemented!() }
    async fn reconcile_member_count(&self, _: Uuid) -> Result<Option<nestmatch_core::household::Household>, Self::Error> { unimplemented!() }
    async fn replace_invitation(&self, _: nestmatch_core::household::Invitation) -> Result<u64, Self::Error> { unimplemented!() }
    async fn find_invitation(&self, _: String) -> Result<Option<nestmatch_core::household::Invitation>, Self::Error> { unimplemented!() }
    async fn revoke_invitation(&self, _: String) -> Result<bool, Self::Error> { unimplemented!() }
    async fn record_interaction(&self, _: nestmatch_core::interaction::NewInteraction) -> Result<nestmatch_core::interaction::Interaction, Self::Error> { unimplemented!() }
    async fn latest_by_household(&self, _: Uuid, _: Option<chrono::DateTime<chrono::Utc>>) -> Result<Vec<nestmatch_core::interaction::Interaction>, Self::Error> { unimplemented!() }
    async fn upsert_resolution(&self, _: nestmatch_core::decisions::Resolution) -> Result<(), Self::Error> { unimplemented!() }
    async fn resolutions_for(&self, _: Uuid) -> Result<Vec<nestmatch_core::decisions::Resolution>, Self::Error> { unimplemented!() }
    async fn properties_by_ids<'a>(&'a self, _: &'a [Uuid]) -> Result<Vec<nestmatch_core::property::Property>, Self::Error> { unimplemented!() }
  }

  #[tokio::test]
  async fn slow_backend_degrades_instead_of_hanging() {
    let user = nestmatch_core::household::UserAccount {
      user_id:      Uuid::new_v4(),
      email:        "alice@x.com".into(),
      household_id: Some(Uuid::new_v4()),
      preferences:  Default::default(),
      created_at:   chrono::Utc::now(),
    };
    let config = EngineConfig { query_timeout: Duration::from_millis(50), ..EngineConfig::default() };
    let engine = Engine::new(Arc::new(StalledStore { user }), config);
    let state = AppState::new(engine, RateLimitConfig::default());

    let req = Request::builder()
      .uri("/couples/disputed")
      .header(header::AUTHORIZATION, "Bearer anything")
      .body(Body::empty())
      .unwrap();
    let resp = router(state.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["disputedProperties"], json!([]));
    assert_eq!(body["performance"]["degraded"], true);
    assert_eq!(body["performance"]["cached"], false);
  }
}
