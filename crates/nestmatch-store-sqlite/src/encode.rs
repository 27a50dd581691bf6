//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that lexical comparison in SQL matches chronological order.
//! UUIDs are stored as hyphenated lowercase strings. Preferences are JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use nestmatch_core::{
  decisions::Resolution,
  household::{Household, Invitation, InvitationStatus, UserAccount},
  interaction::{Interaction, InteractionKind},
  location::LocationPreference,
  property::Property,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enumerations ────────────────────────────────────────────────────────────

pub fn encode_status(s: InvitationStatus) -> &'static str {
  match s {
    InvitationStatus::Pending => "pending",
    InvitationStatus::Accepted => "accepted",
    InvitationStatus::Expired => "expired",
    InvitationStatus::Revoked => "revoked",
    InvitationStatus::Superseded => "superseded",
  }
}

pub fn decode_status(s: &str) -> Result<InvitationStatus> {
  match s {
    "pending" => Ok(InvitationStatus::Pending),
    "accepted" => Ok(InvitationStatus::Accepted),
    "expired" => Ok(InvitationStatus::Expired),
    "revoked" => Ok(InvitationStatus::Revoked),
    "superseded" => Ok(InvitationStatus::Superseded),
    other => Err(Error::UnknownValue { column: "invitations.status", value: other.into() }),
  }
}

pub fn encode_kind(k: InteractionKind) -> &'static str {
  match k {
    InteractionKind::Like => "like",
    InteractionKind::Dislike => "dislike",
  }
}

pub fn decode_kind(s: &str) -> Result<InteractionKind> {
  match s {
    "like" => Ok(InteractionKind::Like),
    "dislike" => Ok(InteractionKind::Dislike),
    other => Err(Error::UnknownValue {
      column: "interactions.interaction_type",
      value:  other.into(),
    }),
  }
}

// ─── Preferences ─────────────────────────────────────────────────────────────

pub fn encode_preferences(p: &LocationPreference) -> Result<String> {
  Ok(serde_json::to_string(p)?)
}

pub fn decode_preferences(s: &str) -> Result<LocationPreference> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "user_id, email, household_id, preferences, created_at";

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:      String,
  pub email:        String,
  pub household_id: Option<String>,
  pub preferences:  String,
  pub created_at:   String,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:      row.get(0)?,
      email:        row.get(1)?,
      household_id: row.get(2)?,
      preferences:  row.get(3)?,
      created_at:   row.get(4)?,
    })
  }

  pub fn into_user(self) -> Result<UserAccount> {
    Ok(UserAccount {
      user_id:      decode_uuid(&self.user_id)?,
      email:        self.email,
      household_id: decode_opt_uuid(self.household_id)?,
      preferences:  decode_preferences(&self.preferences)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const HOUSEHOLD_COLUMNS: &str =
  "household_id, name, created_by, member_count, created_at, updated_at";

/// Raw strings read directly from a `households` row.
pub struct RawHousehold {
  pub household_id: String,
  pub name:         String,
  pub created_by:   String,
  pub member_count: i64,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawHousehold {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      household_id: row.get(0)?,
      name:         row.get(1)?,
      created_by:   row.get(2)?,
      member_count: row.get(3)?,
      created_at:   row.get(4)?,
      updated_at:   row.get(5)?,
    })
  }

  pub fn into_household(self) -> Result<Household> {
    Ok(Household {
      household_id: decode_uuid(&self.household_id)?,
      name:         self.name,
      created_by:   decode_uuid(&self.created_by)?,
      member_count: u32::try_from(self.member_count)
        .map_err(|_| Error::OutOfRange("households.member_count"))?,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

pub const INVITATION_COLUMNS: &str =
  "token, household_id, invited_email, created_by, status, accepted_by, created_at, expires_at";

/// Raw strings read directly from an `invitations` row.
pub struct RawInvitation {
  pub token:         String,
  pub household_id:  String,
  pub invited_email: String,
  pub created_by:    String,
  pub status:        String,
  pub accepted_by:   Option<String>,
  pub created_at:    String,
  pub expires_at:    String,
}

impl RawInvitation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      token:         row.get(0)?,
      household_id:  row.get(1)?,
      invited_email: row.get(2)?,
      created_by:    row.get(3)?,
      status:        row.get(4)?,
      accepted_by:   row.get(5)?,
      created_at:    row.get(6)?,
      expires_at:    row.get(7)?,
    })
  }

  pub fn into_invitation(self) -> Result<Invitation> {
    Ok(Invitation {
      token:         self.token,
      household_id:  decode_uuid(&self.household_id)?,
      invited_email: self.invited_email,
      created_by:    decode_uuid(&self.created_by)?,
      status:        decode_status(&self.status)?,
      accepted_by:   decode_opt_uuid(self.accepted_by)?,
      created_at:    decode_dt(&self.created_at)?,
      expires_at:    decode_dt(&self.expires_at)?,
    })
  }
}

/// Raw strings read directly from an `interactions` row.
pub struct RawInteraction {
  pub interaction_id:   i64,
  pub user_id:          String,
  pub household_id:     Option<String>,
  pub property_id:      String,
  pub interaction_type: String,
  pub created_at:       String,
}

impl RawInteraction {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      interaction_id:   row.get(0)?,
      user_id:          row.get(1)?,
      household_id:     row.get(2)?,
      property_id:      row.get(3)?,
      interaction_type: row.get(4)?,
      created_at:       row.get(5)?,
    })
  }

  pub fn into_interaction(self) -> Result<Interaction> {
    Ok(Interaction {
      interaction_id: self.interaction_id,
      user_id:        decode_uuid(&self.user_id)?,
      household_id:   decode_opt_uuid(self.household_id)?,
      property_id:    decode_uuid(&self.property_id)?,
      kind:           decode_kind(&self.interaction_type)?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `resolutions` row.
pub struct RawResolution {
  pub household_id:        String,
  pub property_id:         String,
  pub resolved_by:         String,
  pub resolved_at:         String,
  pub last_interaction_id: i64,
}

impl RawResolution {
  pub fn into_resolution(self) -> Result<Resolution> {
    Ok(Resolution {
      household_id:        decode_uuid(&self.household_id)?,
      property_id:         decode_uuid(&self.property_id)?,
      resolved_by:         decode_uuid(&self.resolved_by)?,
      resolved_at:         decode_dt(&self.resolved_at)?,
      last_interaction_id: self.last_interaction_id,
    })
  }
}

/// Raw values read directly from a `properties` row.
pub struct RawProperty {
  pub property_id:     String,
  pub address:         String,
  pub city:            String,
  pub state:           String,
  pub neighborhood_id: Option<String>,
  pub price:           Option<i64>,
  pub bedrooms:        Option<i64>,
}

impl RawProperty {
  pub fn into_property(self) -> Result<Property> {
    Ok(Property {
      property_id:     decode_uuid(&self.property_id)?,
      address:         self.address,
      city:            self.city,
      state:           self.state,
      neighborhood_id: self.neighborhood_id,
      price:           self.price,
      bedrooms:        self
        .bedrooms
        .map(u8::try_from)
        .transpose()
        .map_err(|_| Error::OutOfRange("properties.bedrooms"))?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  #[test]
  fn encoded_timestamps_sort_lexically() {
    let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let a = encode_dt(base);
    let b = encode_dt(base + Duration::microseconds(500));
    let c = encode_dt(base + Duration::seconds(1));
    assert!(a < b && b < c, "{a} {b} {c}");
    assert_eq!(decode_dt(&b).unwrap(), base + Duration::microseconds(500));
  }

  #[test]
  fn unknown_status_is_an_error() {
    assert!(matches!(decode_status("maybe"), Err(Error::UnknownValue { .. })));
    assert!(matches!(decode_kind("superlike"), Err(Error::UnknownValue { .. })));
  }
}
