//! Swipe interactions.
//!
//! Interactions are append-only. A change of mind is a new row, and only the
//! most recent row per `(user_id, property_id)` counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
  Like,
  Dislike,
}

/// A persisted interaction row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
  /// Store-assigned and strictly increasing; breaks `created_at` ties.
  pub interaction_id: i64,
  pub user_id:        Uuid,
  /// The user's household at the time of the swipe, if any.
  pub household_id:   Option<Uuid>,
  pub property_id:    Uuid,
  #[serde(rename = "interactionType")]
  pub kind:           InteractionKind,
  pub created_at:     DateTime<Utc>,
}

impl Interaction {
  /// Ordering key for "latest wins": timestamp first, then insertion order.
  pub fn recency(&self) -> (DateTime<Utc>, i64) { (self.created_at, self.interaction_id) }
}

/// Input to [`crate::store::NestStore::record_interaction`].
/// `interaction_id` and `created_at` are always assigned by the store.
#[derive(Debug, Clone)]
pub struct NewInteraction {
  pub user_id:      Uuid,
  pub household_id: Option<Uuid>,
  pub property_id:  Uuid,
  pub kind:         InteractionKind,
}
