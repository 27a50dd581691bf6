//! Token-bucket rate limiting for read endpoints.
//!
//! Two tiers guard every read. The peer address is charged first, before the
//! session is looked up, so a client cycling through made-up tokens still
//! drains a single bucket and never reaches the store past its limit. Once the
//! session resolves, the user is charged separately, so partners behind one
//! address do not starve each other. A rejected request never reaches the
//! decision cache or the aggregation query.
//!
//! Buckets that have refilled completely, or sat idle for [`IDLE_EVICT`], are
//! pruned every [`PRUNE_EVERY`] checks.

use std::{
  hash::Hash,
  net::{IpAddr, SocketAddr},
  sync::atomic::{AtomicU64, Ordering},
  time::{Duration, Instant},
};

use axum::{
  extract::{ConnectInfo, FromRequestParts, Request, State},
  middleware::Next,
  response::{IntoResponse, Response},
};
use dashmap::DashMap;
use nestmatch_core::store::NestStore;
use uuid::Uuid;

use crate::{AppState, auth::Identity, error::ApiError};

pub const PRUNE_EVERY: u64 = 1_024;
pub const IDLE_EVICT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
  /// Per-user bucket capacity: requests allowed back to back.
  pub burst:        u32,
  /// Per-user refill rate in requests per second.
  pub per_sec:      f64,
  /// Per-peer-address capacity, charged before authentication.
  pub peer_burst:   u32,
  pub peer_per_sec: f64,
}

impl Default for RateLimitConfig {
  fn default() -> Self {
    Self { burst: 30, per_sec: 2.0, peer_burst: 120, peer_per_sec: 8.0 }
  }
}

#[derive(Debug)]
struct Bucket {
  tokens:  f64,
  updated: Instant,
}

/// Capacity and refill rate of one tier.
#[derive(Debug, Clone, Copy)]
struct Shape {
  burst:   f64,
  per_sec: f64,
}

impl Shape {
  fn take(&self, bucket: &mut Bucket, now: Instant) -> bool {
    let elapsed = now.saturating_duration_since(bucket.updated).as_secs_f64();
    bucket.tokens = (bucket.tokens + elapsed * self.per_sec).min(self.burst);
    bucket.updated = now;
    if bucket.tokens >= 1.0 {
      bucket.tokens -= 1.0;
      true
    } else {
      false
    }
  }

  /// Whether forgetting `bucket` would change nothing observable.
  fn is_idle(&self, bucket: &Bucket, now: Instant) -> bool {
    let idle = now.saturating_duration_since(bucket.updated);
    idle >= IDLE_EVICT || bucket.tokens + idle.as_secs_f64() * self.per_sec >= self.burst
  }
}

pub struct RateLimiter {
  user:   Shape,
  peer:   Shape,
  /// Keyed by peer IP; `None` when the connection address is unknown.
  peers:  DashMap<Option<IpAddr>, Bucket>,
  users:  DashMap<Uuid, Bucket>,
  checks: AtomicU64,
}

impl RateLimiter {
  pub fn new(config: RateLimitConfig) -> Self {
    Self {
      user:   Shape { burst: f64::from(config.burst), per_sec: config.per_sec },
      peer:   Shape { burst: f64::from(config.peer_burst), per_sec: config.peer_per_sec },
      peers:  DashMap::new(),
      users:  DashMap::new(),
      checks: AtomicU64::new(0),
    }
  }

  pub fn check_peer(&self, peer: Option<IpAddr>) -> bool {
    self.check_peer_at(peer, Instant::now())
  }

  pub fn check_peer_at(&self, peer: Option<IpAddr>, now: Instant) -> bool {
    self.take(&self.peers, self.peer, peer, now)
  }

  pub fn check_user(&self, user_id: Uuid) -> bool { self.check_user_at(user_id, Instant::now()) }

  pub fn check_user_at(&self, user_id: Uuid, now: Instant) -> bool {
    self.take(&self.users, self.user, user_id, now)
  }

  fn take<K: Hash + Eq>(&self, map: &DashMap<K, Bucket>, shape: Shape, key: K, now: Instant) -> bool {
    if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
      self.prune_at(now);
    }
    let mut bucket = map
      .entry(key)
      .or_insert_with(|| Bucket { tokens: shape.burst, updated: now });
    shape.take(&mut bucket, now)
  }

  /// Drop buckets that are full again or have been idle for [`IDLE_EVICT`].
  pub fn prune_at(&self, now: Instant) {
    self.peers.retain(|_, b| !self.peer.is_idle(b, now));
    self.users.retain(|_, b| !self.user.is_idle(b, now));
  }

  /// Number of buckets currently held.
  pub fn tracked(&self) -> usize { self.peers.len() + self.users.len() }

  /// Forget all counters.
  pub fn clear(&self) {
    self.peers.clear();
    self.users.clear();
  }
}

fn peer_ip(req: &Request) -> Option<IpAddr> {
  req
    .extensions()
    .get::<ConnectInfo<SocketAddr>>()
    .map(|ConnectInfo(addr)| addr.ip())
}

/// Middleware guarding read routes: charge the peer, authenticate, charge the
/// user. The resolved [`Identity`] is handed to the handler through request
/// extensions so the session is looked up once.
pub async fn limit_reads<S>(
  State(state): State<AppState<S>>,
  req: Request,
  next: Next,
) -> Response
where
  S: NestStore + 'static,
{
  let path = req.uri().path().to_owned();
  let peer = peer_ip(&req);
  if !state.limiter.check_peer(peer) {
    tracing::warn!(%path, peer = ?peer, "peer rate limit exceeded");
    return ApiError::RateLimited.into_response();
  }

  let (mut parts, body) = req.into_parts();
  let identity = match Identity::from_request_parts(&mut parts, &state).await {
    Ok(identity) => identity,
    Err(e) => return e.into_response(),
  };
  if !state.limiter.check_user(identity.0.user_id) {
    tracing::warn!(%path, user_id = %identity.0.user_id, "user rate limit exceeded");
    return ApiError::RateLimited.into_response();
  }

  parts.extensions.insert(identity);
  next.run(Request::from_parts(parts, body)).await
}
