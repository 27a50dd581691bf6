//! Short-TTL cache for classified decision views.
//!
//! Entries are keyed by `(household, includeProperties, window)`. Writes that
//! can change a household's view invalidate all of that household's entries
//! immediately instead of waiting for the TTL.
//!
//! Each household also carries a generation counter bumped by every
//! invalidation. A reader records the generation before loading and stores its
//! view only if no invalidation happened meanwhile, so a load that raced a
//! write cannot park a stale view for a full TTL.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use moka::future::Cache;
use nestmatch_core::params::Window;
use uuid::Uuid;

use crate::view::DecisionsView;

const MAX_ENTRIES: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
  pub household_id:       Uuid,
  pub include_properties: bool,
  pub window:             Window,
}

/// Process-wide decision cache. Constructed once and shared by the engine.
pub struct DecisionCache {
  inner:       Cache<CacheKey, Arc<DecisionsView>>,
  generations: DashMap<Uuid, u64>,
}

impl DecisionCache {
  pub fn new(ttl: Duration) -> Self {
    let inner = Cache::builder()
      .time_to_live(ttl)
      .max_capacity(MAX_ENTRIES)
      .build();
    Self { inner, generations: DashMap::new() }
  }

  /// Current invalidation generation of `household_id`.
  pub fn generation(&self, household_id: Uuid) -> u64 {
    self.generations.get(&household_id).map_or(0, |g| *g)
  }

  pub async fn get(&self, key: &CacheKey) -> Option<Arc<DecisionsView>> {
    self.inner.get(key).await
  }

  /// Store `view` if the household is still at generation `seen`. Returns
  /// whether the view was kept.
  pub async fn insert_if_current(&self, key: CacheKey, view: Arc<DecisionsView>, seen: u64) -> bool {
    if self.generation(key.household_id) != seen {
      return false;
    }
    self.inner.insert(key, view).await;
    // An invalidation may have slipped in between the check and the insert.
    if self.generation(key.household_id) != seen {
      self.inner.invalidate(&key).await;
      return false;
    }
    true
  }

  /// Drop every cached view for `household_id`.
  pub async fn invalidate_household(&self, household_id: Uuid) {
    *self.generations.entry(household_id).or_insert(0) += 1;
    let stale: Vec<CacheKey> = self
      .inner
      .iter()
      .filter(|(key, _)| key.household_id == household_id)
      .map(|(key, _)| *key)
      .collect();
    for key in &stale {
      self.inner.invalidate(key).await;
    }
    tracing::debug!(%household_id, dropped = stale.len(), "decision cache invalidated");
  }

  /// Reset hook for tests and operators.
  pub fn clear(&self) { self.inner.invalidate_all(); }
}
