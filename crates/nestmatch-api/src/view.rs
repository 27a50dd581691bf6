//! Response shapes for the decision views.

use nestmatch_core::{
  decisions::{Decisions, DisputedProperty, MutualLike},
  location::EffectiveScope,
  property::Property,
};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A listing attached to a decision when `includeProperties=true`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
  /// `None` when the listing record is unknown.
  pub property: Option<Property>,
  pub in_scope: bool,
}

/// A decision item, optionally hydrated with its listing.
#[derive(Debug, Clone, Serialize)]
pub struct Item<T> {
  #[serde(flatten)]
  pub decision: T,
  #[serde(flatten)]
  pub listing:  Option<Listing>,
}

/// The cached result of classifying one household.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionsView {
  pub mutual_likes:        Vec<Item<MutualLike>>,
  pub disputed_properties: Vec<Item<DisputedProperty>>,
}

impl DecisionsView {
  /// Bare ids only.
  pub fn bare(decisions: Decisions) -> Self {
    Self {
      mutual_likes:        decisions
        .mutual_likes
        .into_iter()
        .map(|decision| Item { decision, listing: None })
        .collect(),
      disputed_properties: decisions
        .disputed
        .into_iter()
        .map(|decision| Item { decision, listing: None })
        .collect(),
    }
  }

  /// Attach listings and scope membership to every item.
  pub fn hydrated(
    decisions: Decisions,
    properties: &BTreeMap<Uuid, Property>,
    scope: &EffectiveScope,
  ) -> Self {
    let listing = |property_id: &Uuid| {
      let property = properties.get(property_id).cloned();
      let in_scope = match &property {
        Some(p) => scope.contains(p),
        None => scope.is_empty(),
      };
      Some(Listing { property, in_scope })
    };

    Self {
      mutual_likes:        decisions
        .mutual_likes
        .into_iter()
        .map(|decision| Item { listing: listing(&decision.property_id), decision })
        .collect(),
      disputed_properties: decisions
        .disputed
        .into_iter()
        .map(|decision| Item { listing: listing(&decision.property_id), decision })
        .collect(),
    }
  }
}

/// Timing and provenance reported alongside every decision view.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
  pub total_time_ms: u64,
  pub cached:        bool,
  /// The backing query timed out and the lists are empty.
  pub degraded:      bool,
}
