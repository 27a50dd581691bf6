//! Error types for `nestmatch-core`.
//!
//! These are the domain failures a caller can act on. None of them carry
//! storage details or internal identifiers beyond what the caller supplied.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("user already belongs to a household")]
  AlreadyInHousehold,

  #[error("user does not belong to a household")]
  NotInHousehold,

  #[error("invitation not found")]
  InvitationNotFound,

  #[error("invitation has expired")]
  InvitationExpired,

  #[error("invitation has already been resolved")]
  InvitationAlreadyResolved,

  #[error("user must leave their current household first")]
  MustLeaveHouseholdFirst,

  #[error("property is not currently disputed")]
  NotDisputed,

  #[error("invalid boolean flag: {0:?}")]
  InvalidFlag(String),

  #[error("invalid time window: {0:?}")]
  InvalidWindow(String),

  #[error("invalid email address: {0:?}")]
  InvalidEmail(String),

  #[error("invalid household name: {0}")]
  InvalidName(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Whether this error is a rejected input rather than a state conflict.
  pub fn is_validation(&self) -> bool {
    matches!(
      self,
      Self::InvalidFlag(_)
        | Self::InvalidWindow(_)
        | Self::InvalidEmail(_)
        | Self::InvalidName(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
