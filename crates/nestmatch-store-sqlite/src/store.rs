//! [`SqliteStore`]: the SQLite implementation of [`NestStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use nestmatch_core::{
  decisions::Resolution,
  household::{Household, Invitation, UserAccount},
  interaction::{Interaction, NewInteraction},
  location::LocationPreference,
  property::Property,
  store::{Cas, NestStore},
};

use crate::{
  Result,
  encode::{
    HOUSEHOLD_COLUMNS, INVITATION_COLUMNS, RawHousehold, RawInteraction, RawInvitation,
    RawProperty, RawResolution, RawUser, USER_COLUMNS, encode_dt, encode_kind,
    encode_preferences, encode_status, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A nestmatch store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert or replace a listing record.
  pub async fn put_property(&self, property: Property) -> Result<()> {
    let id_str = encode_uuid(property.property_id);
    let bedrooms = property.bedrooms.map(i64::from);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO properties
             (property_id, address, city, state, neighborhood_id, price, bedrooms)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            id_str,
            property.address,
            property.city,
            property.state,
            property.neighborhood_id,
            property.price,
            bedrooms,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

fn select_household(
  conn: &rusqlite::Connection,
  household_id: &str,
) -> rusqlite::Result<Option<RawHousehold>> {
  conn
    .query_row(
      &format!("SELECT {HOUSEHOLD_COLUMNS} FROM households WHERE household_id = ?1"),
      rusqlite::params![household_id],
      RawHousehold::from_row,
    )
    .optional()
}

fn select_user(
  conn: &rusqlite::Connection,
  user_id: &str,
) -> rusqlite::Result<Option<RawUser>> {
  conn
    .query_row(
      &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
      rusqlite::params![user_id],
      RawUser::from_row,
    )
    .optional()
}

fn decode_cas(raw: Option<RawHousehold>) -> Result<Cas<Household>> {
  match raw {
    Some(raw) => Ok(Cas::Applied(raw.into_household()?)),
    None => Ok(Cas::Conflict),
  }
}

// ─── NestStore impl ──────────────────────────────────────────────────────────

impl NestStore for SqliteStore {
  type Error = crate::Error;

  // ── Users & sessions ──────────────────────────────────────────────────────

  async fn create_user(&self, email: String) -> Result<UserAccount> {
    let user = UserAccount {
      user_id:      Uuid::new_v4(),
      email,
      household_id: None,
      preferences:  LocationPreference::default(),
      created_at:   Utc::now(),
    };

    let id_str    = encode_uuid(user.user_id);
    let email_str = user.email.clone();
    let prefs_str = encode_preferences(&user.preferences)?;
    let at_str    = encode_dt(user.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, email, household_id, preferences, created_at)
           VALUES (?1, ?2, NULL, ?3, ?4)",
          rusqlite::params![id_str, email_str, prefs_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn get_user(&self, user_id: Uuid) -> Result<Option<UserAccount>> {
    let id_str = encode_uuid(user_id);

    let raw = self
      .conn
      .call(move |conn| Ok(select_user(conn, &id_str)?))
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn issue_session(&self, user_id: Uuid, token_digest: String) -> Result<()> {
    let id_str = encode_uuid(user_id);
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (token_digest, user_id, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![token_digest, id_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn user_for_session(&self, token_digest: String) -> Result<Option<UserAccount>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT u.user_id, u.email, u.household_id, u.preferences, u.created_at
             FROM sessions s JOIN users u ON u.user_id = s.user_id
             WHERE s.token_digest = ?1",
            rusqlite::params![token_digest],
            RawUser::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn set_preferences(
    &self,
    user_id: Uuid,
    preferences: LocationPreference,
  ) -> Result<()> {
    let id_str    = encode_uuid(user_id);
    let prefs_str = encode_preferences(&preferences)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE users SET preferences = ?2 WHERE user_id = ?1",
          rusqlite::params![id_str, prefs_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Households ────────────────────────────────────────────────────────────

  async fn get_household(&self, household_id: Uuid) -> Result<Option<Household>> {
    let id_str = encode_uuid(household_id);

    let raw = self
      .conn
      .call(move |conn| Ok(select_household(conn, &id_str)?))
      .await?;

    raw.map(RawHousehold::into_household).transpose()
  }

  async fn members_of(&self, household_id: Uuid) -> Result<Vec<UserAccount>> {
    let id_str = encode_uuid(household_id);

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {USER_COLUMNS} FROM users WHERE household_id = ?1
           ORDER BY created_at, user_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn create_household(&self, user_id: Uuid, name: String) -> Result<Cas<Household>> {
    let household_str = encode_uuid(Uuid::new_v4());
    let user_str      = encode_uuid(user_id);
    let at_str        = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
          "INSERT INTO households
             (household_id, name, created_by, member_count, created_at, updated_at)
           VALUES (?1, ?2, ?3, 1, ?4, ?4)",
          rusqlite::params![household_str, name, user_str, at_str],
        )?;
        let linked = tx.execute(
          "UPDATE users SET household_id = ?2
           WHERE user_id = ?1 AND household_id IS NULL",
          rusqlite::params![user_str, household_str],
        )?;
        if linked == 0 {
          return Ok(None);
        }
        let raw = select_household(&tx, &household_str)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    decode_cas(raw)
  }

  async fn join_household(
    &self,
    user_id: Uuid,
    expected: Option<Uuid>,
    token: String,
  ) -> Result<Cas<Household>> {
    let user_str     = encode_uuid(user_id);
    let expected_str = expected.map(encode_uuid);
    let now_str      = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let target: Option<String> = tx
          .query_row(
            "SELECT household_id FROM invitations
             WHERE token = ?1 AND status = 'pending' AND expires_at > ?2",
            rusqlite::params![token, now_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(household_str) = target else {
          return Ok(None);
        };

        let linked = tx.execute(
          "UPDATE users SET household_id = ?2
           WHERE user_id = ?1 AND household_id IS ?3",
          rusqlite::params![user_str, household_str, expected_str],
        )?;
        if linked == 0 {
          return Ok(None);
        }

        tx.execute(
          "UPDATE invitations SET status = 'accepted', accepted_by = ?2
           WHERE token = ?1 AND status = 'pending'",
          rusqlite::params![token, user_str],
        )?;
        tx.execute(
          "UPDATE households SET member_count = member_count + 1, updated_at = ?2
           WHERE household_id = ?1",
          rusqlite::params![household_str, now_str],
        )?;

        let raw = select_household(&tx, &household_str)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    decode_cas(raw)
  }

  async fn leave_household(&self, user_id: Uuid, household_id: Uuid) -> Result<Cas<Household>> {
    let user_str      = encode_uuid(user_id);
    let household_str = encode_uuid(household_id);
    let now_str       = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let unlinked = tx.execute(
          "UPDATE users SET household_id = NULL
           WHERE user_id = ?1 AND household_id = ?2",
          rusqlite::params![user_str, household_str],
        )?;
        if unlinked == 0 {
          return Ok(None);
        }
        tx.execute(
          "UPDATE households SET member_count = MAX(member_count - 1, 0), updated_at = ?2
           WHERE household_id = ?1",
          rusqlite::params![household_str, now_str],
        )?;
        let raw = select_household(&tx, &household_str)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    decode_cas(raw)
  }

  async fn reconcile_member_count(&self, household_id: Uuid) -> Result<Option<Household>> {
    let household_str = encode_uuid(household_id);
    let now_str       = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let actual: i64 = tx.query_row(
          "SELECT COUNT(*) FROM users WHERE household_id = ?1",
          rusqlite::params![household_str],
          |r| r.get(0),
        )?;
        let fixed = tx.execute(
          "UPDATE households SET member_count = ?2, updated_at = ?3
           WHERE household_id = ?1 AND member_count != ?2",
          rusqlite::params![household_str, actual, now_str],
        )?;
        if fixed > 0 {
          tracing::warn!(household_id = %household_str, actual, "member_count drift corrected");
        }
        let raw = select_household(&tx, &household_str)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawHousehold::into_household).transpose()
  }

  // ── Invitations ───────────────────────────────────────────────────────────

  async fn replace_invitation(&self, invitation: Invitation) -> Result<u64> {
    let token_str     = invitation.token;
    let household_str = encode_uuid(invitation.household_id);
    let email_str     = invitation.invited_email;
    let created_by    = encode_uuid(invitation.created_by);
    let status_str    = encode_status(invitation.status);
    let accepted_by   = invitation.accepted_by.map(encode_uuid);
    let created_str   = encode_dt(invitation.created_at);
    let expires_str   = encode_dt(invitation.expires_at);

    let superseded = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let superseded = tx.execute(
          "UPDATE invitations SET status = 'superseded'
           WHERE household_id = ?1 AND invited_email = ?2 AND status = 'pending'",
          rusqlite::params![household_str, email_str],
        )?;
        tx.execute(
          "INSERT INTO invitations
             (token, household_id, invited_email, created_by, status,
              accepted_by, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            token_str,
            household_str,
            email_str,
            created_by,
            status_str,
            accepted_by,
            created_str,
            expires_str,
          ],
        )?;
        tx.commit()?;
        Ok(superseded)
      })
      .await?;

    Ok(superseded as u64)
  }

  async fn find_invitation(&self, token: String) -> Result<Option<Invitation>> {
    let raw: Option<RawInvitation> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {INVITATION_COLUMNS} FROM invitations WHERE token = ?1"),
            rusqlite::params![token],
            RawInvitation::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawInvitation::into_invitation).transpose()
  }

  async fn revoke_invitation(&self, token: String) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE invitations SET status = 'revoked' WHERE token = ?1 AND status = 'pending'",
          rusqlite::params![token],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  // ── Interactions (append-only) ────────────────────────────────────────────

  async fn record_interaction(&self, input: NewInteraction) -> Result<Interaction> {
    let created_at    = Utc::now();
    let user_str      = encode_uuid(input.user_id);
    let household_str = input.household_id.map(encode_uuid);
    let property_str  = encode_uuid(input.property_id);
    let kind_str      = encode_kind(input.kind);
    let at_str        = encode_dt(created_at);

    let interaction_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO interactions
             (user_id, household_id, property_id, interaction_type, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![user_str, household_str, property_str, kind_str, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Interaction {
      interaction_id,
      user_id: input.user_id,
      household_id: input.household_id,
      property_id: input.property_id,
      kind: input.kind,
      created_at,
    })
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn latest_by_household(
    &self,
    household_id: Uuid,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<Interaction>> {
    let household_str = encode_uuid(household_id);
    let since_str     = since.map(encode_dt);

    let raws: Vec<RawInteraction> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT interaction_id, user_id, household_id, property_id,
                  interaction_type, created_at
           FROM (
             SELECT i.interaction_id, i.user_id, i.household_id, i.property_id,
                    i.interaction_type, i.created_at,
                    ROW_NUMBER() OVER (
                      PARTITION BY i.user_id, i.property_id
                      ORDER BY i.created_at DESC, i.interaction_id DESC
                    ) AS rn
             FROM interactions i
             JOIN users u ON u.user_id = i.user_id
             WHERE u.household_id = ?1
           )
           WHERE rn = 1 AND (?2 IS NULL OR created_at >= ?2)
           ORDER BY interaction_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![household_str, since_str], RawInteraction::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawInteraction::into_interaction).collect()
  }

  // ── Resolutions ───────────────────────────────────────────────────────────

  async fn upsert_resolution(&self, resolution: Resolution) -> Result<()> {
    let household_str = encode_uuid(resolution.household_id);
    let property_str  = encode_uuid(resolution.property_id);
    let by_str        = encode_uuid(resolution.resolved_by);
    let at_str        = encode_dt(resolution.resolved_at);
    let last_id       = resolution.last_interaction_id;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO resolutions
             (household_id, property_id, resolved_by, resolved_at, last_interaction_id)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (household_id, property_id) DO UPDATE SET
             resolved_by         = excluded.resolved_by,
             resolved_at         = excluded.resolved_at,
             last_interaction_id = excluded.last_interaction_id
           WHERE excluded.last_interaction_id > resolutions.last_interaction_id",
          rusqlite::params![household_str, property_str, by_str, at_str, last_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn resolutions_for(&self, household_id: Uuid) -> Result<Vec<Resolution>> {
    let household_str = encode_uuid(household_id);

    let raws: Vec<RawResolution> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT household_id, property_id, resolved_by, resolved_at, last_interaction_id
           FROM resolutions WHERE household_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![household_str], |row| {
            Ok(RawResolution {
              household_id:        row.get(0)?,
              property_id:         row.get(1)?,
              resolved_by:         row.get(2)?,
              resolved_at:         row.get(3)?,
              last_interaction_id: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawResolution::into_resolution).collect()
  }

  // ── Properties ────────────────────────────────────────────────────────────

  async fn properties_by_ids<'a>(&'a self, ids: &'a [Uuid]) -> Result<Vec<Property>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let id_strs: Vec<String> = ids.iter().copied().map(encode_uuid).collect();

    let raws: Vec<RawProperty> = self
      .conn
      .call(move |conn| {
        let placeholders = vec!["?"; id_strs.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
          "SELECT property_id, address, city, state, neighborhood_id, price, bedrooms
           FROM properties WHERE property_id IN ({placeholders})"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(id_strs.iter()), |row| {
            Ok(RawProperty {
              property_id:     row.get(0)?,
              address:         row.get(1)?,
              city:            row.get(2)?,
              state:           row.get(3)?,
              neighborhood_id: row.get(4)?,
              price:           row.get(5)?,
              bedrooms:        row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProperty::into_property).collect()
  }
}
