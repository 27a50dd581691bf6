//! The `NestStore` trait: the engine's view of its backing store.
//!
//! The trait is implemented by storage backends (e.g.
//! `nestmatch-store-sqlite`). The engine depends on this abstraction only.
//!
//! Membership mutations are compare-and-swap operations: each one names the
//! `household_id` the caller last observed for the user, and the store applies
//! the whole transition atomically only if that observation still holds.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  decisions::Resolution,
  household::{Household, Invitation, UserAccount},
  interaction::{Interaction, NewInteraction},
  location::LocationPreference,
  property::Property,
};

/// Outcome of a conditional membership write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cas<T> {
  Applied(T),
  /// The precondition no longer held; nothing was written.
  Conflict,
}

impl<T> Cas<T> {
  pub fn applied(self) -> Option<T> {
    match self {
      Self::Applied(t) => Some(t),
      Self::Conflict => None,
    }
  }
}

/// Abstraction over a nestmatch backend.
///
/// Interactions are append-only; there is no method that updates or deletes
/// one. All methods return `Send` futures so the trait can be used from axum
/// handlers on a multi-threaded runtime.
pub trait NestStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users & sessions ──────────────────────────────────────────────────

  /// Create an unaffiliated user with empty preferences.
  fn create_user(
    &self,
    email: String,
  ) -> impl Future<Output = Result<UserAccount, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<UserAccount>, Self::Error>> + Send + '_;

  /// Register a session for `user_id`, keyed by the digest of its token.
  fn issue_session(
    &self,
    user_id: Uuid,
    token_digest: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Resolve a session digest to its user. `None` for unknown sessions.
  fn user_for_session(
    &self,
    token_digest: String,
  ) -> impl Future<Output = Result<Option<UserAccount>, Self::Error>> + Send + '_;

  fn set_preferences(
    &self,
    user_id: Uuid,
    preferences: LocationPreference,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Households ────────────────────────────────────────────────────────

  fn get_household(
    &self,
    household_id: Uuid,
  ) -> impl Future<Output = Result<Option<Household>, Self::Error>> + Send + '_;

  /// All users currently pointing at `household_id`.
  fn members_of(
    &self,
    household_id: Uuid,
  ) -> impl Future<Output = Result<Vec<UserAccount>, Self::Error>> + Send + '_;

  /// Create a household with `member_count = 1` and link `user_id` to it,
  /// provided the user is still unaffiliated.
  fn create_household(
    &self,
    user_id: Uuid,
    name: String,
  ) -> impl Future<Output = Result<Cas<Household>, Self::Error>> + Send + '_;

  /// Accept invitation `token` for `user_id`: link the user to the
  /// invitation's household, mark the invitation accepted, and increment the
  /// household's count. Conflicts if the user's `household_id` is no longer
  /// `expected`, or the invitation is no longer pending and unexpired.
  fn join_household(
    &self,
    user_id: Uuid,
    expected: Option<Uuid>,
    token: String,
  ) -> impl Future<Output = Result<Cas<Household>, Self::Error>> + Send + '_;

  /// Unlink `user_id` from `household_id` and decrement its count. The
  /// household record is kept even when the count reaches zero.
  fn leave_household(
    &self,
    user_id: Uuid,
    household_id: Uuid,
  ) -> impl Future<Output = Result<Cas<Household>, Self::Error>> + Send + '_;

  /// Reset `member_count` to the number of users currently linked and return
  /// the corrected record.
  fn reconcile_member_count(
    &self,
    household_id: Uuid,
  ) -> impl Future<Output = Result<Option<Household>, Self::Error>> + Send + '_;

  // ── Invitations ───────────────────────────────────────────────────────

  /// Insert `invitation` and, in the same transaction, mark any other pending
  /// invitation for the same household and email as superseded. Returns the
  /// number superseded.
  fn replace_invitation(
    &self,
    invitation: Invitation,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn find_invitation(
    &self,
    token: String,
  ) -> impl Future<Output = Result<Option<Invitation>, Self::Error>> + Send + '_;

  /// Mark a pending invitation revoked. Returns `false` if it was not pending.
  fn revoke_invitation(
    &self,
    token: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Interactions ──────────────────────────────────────────────────────

  /// Append an interaction. `interaction_id` and `created_at` are assigned by
  /// the store.
  fn record_interaction(
    &self,
    input: NewInteraction,
  ) -> impl Future<Output = Result<Interaction, Self::Error>> + Send + '_;

  /// The latest interaction per `(user, property)` for every user currently
  /// linked to `household_id`, optionally restricted to those created at or
  /// after `since`.
  fn latest_by_household(
    &self,
    household_id: Uuid,
    since: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<Interaction>, Self::Error>> + Send + '_;

  // ── Resolutions ───────────────────────────────────────────────────────

  /// Insert or refresh the resolution for `(household_id, property_id)`.
  /// Writing an equal or older resolution over an existing one is a no-op.
  fn upsert_resolution(
    &self,
    resolution: Resolution,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn resolutions_for(
    &self,
    household_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Resolution>, Self::Error>> + Send + '_;

  // ── Properties ────────────────────────────────────────────────────────

  /// Fetch listing records; unknown ids are skipped.
  fn properties_by_ids<'a>(
    &'a self,
    ids: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<Property>, Self::Error>> + Send + 'a;
}
