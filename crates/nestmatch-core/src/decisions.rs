//! Mutual-like and dispute classification.
//!
//! Given the current members of a household and their interactions, every
//! property touched by at least one member is classified from the members'
//! latest interactions:
//!
//! - **mutual like**: at least two members have interacted and every one of
//!   them currently likes it. A member who never swiped is not a vote.
//! - **disputed**: at least one current like and at least one current
//!   dislike, unless an active [`Resolution`] suppresses it.
//! - neither, otherwise.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interaction::{Interaction, InteractionKind};

// ─── Resolution ──────────────────────────────────────────────────────────────

/// A persisted decision to stop surfacing a dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
  pub household_id:        Uuid,
  pub property_id:         Uuid,
  pub resolved_by:         Uuid,
  pub resolved_at:         DateTime<Utc>,
  /// Highest interaction id among the disputed group when it was resolved.
  pub last_interaction_id: i64,
}

impl Resolution {
  /// A resolution stays in force until some member's latest interaction on
  /// the property is newer than the ones it was based on.
  pub fn suppresses(&self, newest_interaction_id: i64) -> bool {
    newest_interaction_id <= self.last_interaction_id
  }
}

// ─── Derived views ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutualLike {
  pub property_id:         Uuid,
  pub liked_by:            BTreeSet<Uuid>,
  pub liked_by_count:      usize,
  pub last_interaction_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputedProperty {
  pub property_id:         Uuid,
  pub liked_by:            BTreeSet<Uuid>,
  pub disliked_by:         BTreeSet<Uuid>,
  pub last_interaction_id: i64,
}

/// The classification result for one household. Lists are ordered by most
/// recent activity first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decisions {
  pub mutual_likes: Vec<MutualLike>,
  pub disputed:     Vec<DisputedProperty>,
  /// Disputes currently suppressed by an active resolution.
  pub resolved:     Vec<DisputedProperty>,
}

impl Decisions {
  pub fn disputed(&self, property_id: Uuid) -> Option<&DisputedProperty> {
    self.disputed.iter().find(|d| d.property_id == property_id)
  }

  pub fn is_resolved(&self, property_id: Uuid) -> bool {
    self.resolved.iter().any(|d| d.property_id == property_id)
  }

  pub fn property_ids(&self) -> BTreeSet<Uuid> {
    self
      .mutual_likes
      .iter()
      .map(|m| m.property_id)
      .chain(self.disputed.iter().map(|d| d.property_id))
      .collect()
  }
}

// ─── Classification ──────────────────────────────────────────────────────────

/// Reduce `interactions` to the latest one per `(property, member)`, ignoring
/// users outside `members`. Latest is by `created_at`, then by id.
pub fn latest_per_member<'a>(
  members: &BTreeSet<Uuid>,
  interactions: &'a [Interaction],
) -> BTreeMap<Uuid, BTreeMap<Uuid, &'a Interaction>> {
  let mut by_property: BTreeMap<Uuid, BTreeMap<Uuid, &Interaction>> = BTreeMap::new();
  for interaction in interactions {
    if !members.contains(&interaction.user_id) {
      continue;
    }
    let votes = by_property.entry(interaction.property_id).or_default();
    match votes.get(&interaction.user_id) {
      Some(current) if current.recency() >= interaction.recency() => {}
      _ => {
        votes.insert(interaction.user_id, interaction);
      }
    }
  }
  by_property
}

/// Classify a household's interactions into mutual likes and disputes.
///
/// Households with fewer than two members never have either.
pub fn classify(
  members: &BTreeSet<Uuid>,
  interactions: &[Interaction],
  resolutions: &[Resolution],
) -> Decisions {
  let mut decisions = Decisions::default();
  if members.len() < 2 {
    return decisions;
  }

  let resolutions: BTreeMap<Uuid, &Resolution> =
    resolutions.iter().map(|r| (r.property_id, r)).collect();

  for (property_id, votes) in latest_per_member(members, interactions) {
    let mut liked_by = BTreeSet::new();
    let mut disliked_by = BTreeSet::new();
    let mut last_interaction_id = i64::MIN;

    for (user_id, interaction) in &votes {
      last_interaction_id = last_interaction_id.max(interaction.interaction_id);
      match interaction.kind {
        InteractionKind::Like => liked_by.insert(*user_id),
        InteractionKind::Dislike => disliked_by.insert(*user_id),
      };
    }

    if disliked_by.is_empty() && liked_by.len() >= 2 {
      decisions.mutual_likes.push(MutualLike {
        property_id,
        liked_by_count: liked_by.len(),
        liked_by,
        last_interaction_id,
      });
    } else if !liked_by.is_empty() && !disliked_by.is_empty() {
      let dispute = DisputedProperty {
        property_id,
        liked_by,
        disliked_by,
        last_interaction_id,
      };
      match resolutions.get(&property_id) {
        Some(r) if r.suppresses(last_interaction_id) => decisions.resolved.push(dispute),
        _ => decisions.disputed.push(dispute),
      }
    }
  }

  decisions
    .mutual_likes
    .sort_by(|a, b| b.last_interaction_id.cmp(&a.last_interaction_id));
  decisions
    .disputed
    .sort_by(|a, b| b.last_interaction_id.cmp(&a.last_interaction_id));
  decisions
    .resolved
    .sort_by(|a, b| b.last_interaction_id.cmp(&a.last_interaction_id));
  decisions
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  struct Log {
    next_id: i64,
    rows:    Vec<Interaction>,
  }

  impl Log {
    fn new() -> Self { Self { next_id: 1, rows: Vec::new() } }

    fn swipe(&mut self, user: Uuid, property: Uuid, kind: InteractionKind) -> i64 {
      let id = self.next_id;
      self.next_id += 1;
      self.rows.push(Interaction {
        interaction_id: id,
        user_id: user,
        household_id: None,
        property_id: property,
        kind,
        created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(id),
      });
      id
    }
  }

  fn ids<const N: usize>() -> [Uuid; N] { std::array::from_fn(|_| Uuid::new_v4()) }

  use InteractionKind::{Dislike, Like};

  #[test]
  fn single_member_household_has_no_decisions() {
    let [a, p] = ids();
    let mut log = Log::new();
    log.swipe(a, p, Like);
    let decisions = classify(&BTreeSet::from([a]), &log.rows, &[]);
    assert!(decisions.mutual_likes.is_empty());
    assert!(decisions.disputed.is_empty());
  }

  #[test]
  fn silence_is_neither_mutual_nor_disputed() {
    let [a, b, p] = ids();
    let mut log = Log::new();
    log.swipe(a, p, Like);
    let decisions = classify(&BTreeSet::from([a, b]), &log.rows, &[]);
    assert!(decisions.mutual_likes.is_empty());
    assert!(decisions.disputed.is_empty());
  }

  #[test]
  fn one_sided_dislike_is_not_a_dispute() {
    // A likes P1. B likes P1 and dislikes P2.
    let [a, b, p1, p2] = ids();
    let mut log = Log::new();
    log.swipe(a, p1, Like);
    log.swipe(b, p1, Like);
    log.swipe(b, p2, Dislike);
    let decisions = classify(&BTreeSet::from([a, b]), &log.rows, &[]);
    let mutual: Vec<Uuid> = decisions.mutual_likes.iter().map(|m| m.property_id).collect();
    assert_eq!(mutual, vec![p1]);
    assert_eq!(decisions.mutual_likes[0].liked_by_count, 2);
    assert!(decisions.disputed.is_empty());
  }

  #[test]
  fn like_and_dislike_is_disputed() {
    let [a, b, p3] = ids();
    let mut log = Log::new();
    log.swipe(a, p3, Dislike);
    log.swipe(b, p3, Like);
    let decisions = classify(&BTreeSet::from([a, b]), &log.rows, &[]);
    assert_eq!(decisions.disputed.len(), 1);
    let d = &decisions.disputed[0];
    assert_eq!(d.property_id, p3);
    assert_eq!(d.liked_by, BTreeSet::from([b]));
    assert_eq!(d.disliked_by, BTreeSet::from([a]));
  }

  #[test]
  fn latest_interaction_wins() {
    let [a, b, p] = ids();
    let mut log = Log::new();
    log.swipe(a, p, Like);
    log.swipe(b, p, Like);
    log.swipe(b, p, Dislike);
    let decisions = classify(&BTreeSet::from([a, b]), &log.rows, &[]);
    assert!(decisions.mutual_likes.is_empty());
    assert_eq!(decisions.disputed.len(), 1);
  }

  #[test]
  fn same_timestamp_ties_break_on_id() {
    let [a, b, p] = ids();
    let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let row = |id, user, kind| Interaction {
      interaction_id: id,
      user_id: user,
      household_id: None,
      property_id: p,
      kind,
      created_at: at,
    };
    // Rows arrive out of order; id 3 is the latest for b.
    let rows = vec![row(3, b, Like), row(1, a, Like), row(2, b, Dislike)];
    let decisions = classify(&BTreeSet::from([a, b]), &rows, &[]);
    assert_eq!(decisions.mutual_likes.len(), 1);
  }

  #[test]
  fn non_members_are_ignored() {
    let [a, b, outsider, p] = ids();
    let mut log = Log::new();
    log.swipe(a, p, Like);
    log.swipe(outsider, p, Dislike);
    let decisions = classify(&BTreeSet::from([a, b]), &log.rows, &[]);
    assert!(decisions.disputed.is_empty());
    assert!(decisions.mutual_likes.is_empty());
  }

  #[test]
  fn three_member_household_with_two_likes_and_a_silent_member() {
    let [a, b, c, p] = ids();
    let mut log = Log::new();
    log.swipe(a, p, Like);
    log.swipe(b, p, Like);
    let decisions = classify(&BTreeSet::from([a, b, c]), &log.rows, &[]);
    assert_eq!(decisions.mutual_likes.len(), 1);
  }

  fn resolution(household: Uuid, property: Uuid, by: Uuid, last: i64) -> Resolution {
    Resolution {
      household_id:        household,
      property_id:         property,
      resolved_by:         by,
      resolved_at:         Utc::now(),
      last_interaction_id: last,
    }
  }

  #[test]
  fn active_resolution_suppresses_dispute() {
    let [h, a, b, p] = ids();
    let mut log = Log::new();
    log.swipe(a, p, Dislike);
    let last = log.swipe(b, p, Like);
    let decisions = classify(&BTreeSet::from([a, b]), &log.rows, &[resolution(h, p, a, last)]);
    assert!(decisions.disputed.is_empty());
    assert!(decisions.is_resolved(p));
    assert!(decisions.mutual_likes.is_empty());
  }

  #[test]
  fn newer_interaction_reopens_resolved_dispute() {
    let [h, a, b, p] = ids();
    let mut log = Log::new();
    log.swipe(a, p, Dislike);
    let last = log.swipe(b, p, Like);
    let resolutions = [resolution(h, p, a, last)];
    // b flips to dislike and back to like.
    log.swipe(b, p, Dislike);
    log.swipe(b, p, Like);
    let decisions = classify(&BTreeSet::from([a, b]), &log.rows, &resolutions);
    assert!(decisions.disputed(p).is_some());
    assert!(!decisions.is_resolved(p));
  }

  #[test]
  fn ordering_is_most_recent_first() {
    let [a, b, p1, p2] = ids();
    let mut log = Log::new();
    log.swipe(a, p1, Like);
    log.swipe(b, p1, Like);
    log.swipe(a, p2, Like);
    log.swipe(b, p2, Like);
    let decisions = classify(&BTreeSet::from([a, b]), &log.rows, &[]);
    let order: Vec<Uuid> = decisions.mutual_likes.iter().map(|m| m.property_id).collect();
    assert_eq!(order, vec![p2, p1]);
  }
}
