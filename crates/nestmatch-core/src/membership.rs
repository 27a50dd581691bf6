//! The membership state machine.
//!
//! Each user is either [`Membership::Unaffiliated`] or
//! [`Membership::Member`]. The checks here decide whether a transition is
//! allowed from a given snapshot; applying it is the store's job and must be
//! a compare-and-swap against the same snapshot.
//!
//! | Transition | From | To |
//! |------------|------|----|
//! | create | `Unaffiliated` | `Member(new)` |
//! | invite | `Member(h)` | unchanged |
//! | accept | `Unaffiliated` | `Member(invitation.household_id)` |
//! | leave | `Member(h)` | `Unaffiliated` |

use chrono::{DateTime, Utc};

use crate::{
  Error, Result,
  household::{Invitation, InvitationStatus, Membership},
};

/// How long a fresh invitation stays acceptable.
pub const INVITATION_TTL_DAYS: i64 = 7;

pub const MAX_NAME_LEN: usize = 100;

// ─── Input validation ────────────────────────────────────────────────────────

/// Trim a household name and check its length.
pub fn validate_name(name: &str) -> Result<String> {
  let name = name.trim();
  if name.is_empty() {
    return Err(Error::InvalidName("name must not be empty".into()));
  }
  if name.chars().count() > MAX_NAME_LEN {
    return Err(Error::InvalidName(format!(
      "name must be at most {MAX_NAME_LEN} characters"
    )));
  }
  Ok(name.to_owned())
}

/// Trim and lower-case an email address after a shallow shape check.
pub fn normalize_email(email: &str) -> Result<String> {
  let normalized = email.trim().to_lowercase();
  let valid = match normalized.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !normalized.contains(char::is_whitespace)
    }
    None => false,
  };
  if valid {
    Ok(normalized)
  } else {
    Err(Error::InvalidEmail(email.to_owned()))
  }
}

// ─── Transition checks ───────────────────────────────────────────────────────

pub fn check_create(membership: Membership) -> Result<()> {
  match membership {
    Membership::Unaffiliated => Ok(()),
    Membership::Member(_) => Err(Error::AlreadyInHousehold),
  }
}

/// Returns the household the invitation will be issued for.
pub fn check_invite(membership: Membership) -> Result<uuid::Uuid> {
  membership.household_id().ok_or(Error::NotInHousehold)
}

/// Returns the household being left.
pub fn check_leave(membership: Membership) -> Result<uuid::Uuid> {
  membership.household_id().ok_or(Error::NotInHousehold)
}

/// Decide whether `invitation` can be accepted by a user in `membership`.
/// Returns the household to join.
///
/// Invitation problems are reported before membership problems, so a stale
/// token never leaks whether the caller is affiliated.
pub fn check_accept(
  membership: Membership,
  invitation: Option<&Invitation>,
  now: DateTime<Utc>,
) -> Result<uuid::Uuid> {
  let invitation = invitation.ok_or(Error::InvitationNotFound)?;
  match invitation.status_at(now) {
    InvitationStatus::Pending => {}
    InvitationStatus::Expired => return Err(Error::InvitationExpired),
    _ => return Err(Error::InvitationAlreadyResolved),
  }

  match membership {
    Membership::Unaffiliated => Ok(invitation.household_id),
    Membership::Member(current) if current == invitation.household_id => {
      Err(Error::AlreadyInHousehold)
    }
    Membership::Member(_) => Err(Error::MustLeaveHouseholdFirst),
  }
}

/// Only members of the inviting household may revoke, and only while the
/// invitation is pending. Other households see [`Error::InvitationNotFound`].
pub fn check_revoke(
  membership: Membership,
  invitation: Option<&Invitation>,
  now: DateTime<Utc>,
) -> Result<()> {
  let invitation = invitation.ok_or(Error::InvitationNotFound)?;
  if membership.household_id() != Some(invitation.household_id) {
    return Err(Error::InvitationNotFound);
  }
  match invitation.status_at(now) {
    InvitationStatus::Pending => Ok(()),
    InvitationStatus::Expired => Err(Error::InvitationExpired),
    _ => Err(Error::InvitationAlreadyResolved),
  }
}
