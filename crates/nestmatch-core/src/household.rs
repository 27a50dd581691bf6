//! Households, users, and invitations: the records owned by the household
//! directory.
//!
//! Membership is implicit: a user points at no household or exactly one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::location::LocationPreference;

// ─── Household ───────────────────────────────────────────────────────────────

/// The shared account grouping the currently-linked partners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Household {
  pub household_id: Uuid,
  pub name:         String,
  pub created_by:   Uuid,
  /// Denormalised member count. Eventually consistent with the number of
  /// users pointing at this household; reconciled on read.
  pub member_count: u32,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

// ─── Users ───────────────────────────────────────────────────────────────────

/// A user as seen by the engine. Identity issuance lives elsewhere; this is
/// only the slice of the profile the engine reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
  pub user_id:      Uuid,
  pub email:        String,
  pub household_id: Option<Uuid>,
  pub preferences:  LocationPreference,
  pub created_at:   DateTime<Utc>,
}

impl UserAccount {
  pub fn membership(&self) -> Membership { Membership::from(self.household_id) }
}

/// Per-user membership state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
  Unaffiliated,
  Member(Uuid),
}

impl From<Option<Uuid>> for Membership {
  fn from(household_id: Option<Uuid>) -> Self {
    match household_id {
      Some(id) => Self::Member(id),
      None => Self::Unaffiliated,
    }
  }
}

impl Membership {
  pub fn household_id(&self) -> Option<Uuid> {
    match self {
      Self::Member(id) => Some(*id),
      Self::Unaffiliated => None,
    }
  }
}

// ─── Invitations ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
  Pending,
  Accepted,
  Expired,
  Revoked,
  /// Replaced by a newer invitation for the same email and household.
  Superseded,
}

impl InvitationStatus {
  pub fn is_terminal(&self) -> bool { !matches!(self, Self::Pending) }
}

/// A single-use invitation into a household.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
  /// Unguessable, unique lookup token.
  pub token:         String,
  pub household_id:  Uuid,
  /// Normalised (trimmed, lower-cased) address.
  pub invited_email: String,
  pub created_by:    Uuid,
  pub status:        InvitationStatus,
  pub accepted_by:   Option<Uuid>,
  pub created_at:    DateTime<Utc>,
  pub expires_at:    DateTime<Utc>,
}

impl Invitation {
  /// The status as of `now`. A pending invitation past its expiry reads as
  /// [`InvitationStatus::Expired`] without the stored record being touched.
  pub fn status_at(&self, now: DateTime<Utc>) -> InvitationStatus {
    match self.status {
      InvitationStatus::Pending if now >= self.expires_at => InvitationStatus::Expired,
      other => other,
    }
  }
}
