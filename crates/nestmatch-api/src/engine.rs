//! The household reconciliation engine.
//!
//! [`Engine`] sequences the pure checks from `nestmatch-core` against a
//! [`NestStore`], owns the decision cache, and applies the read-path timeout.
//!
//! Membership transitions run optimistically: validate against the caller's
//! snapshot, attempt the store's compare-and-swap, and on conflict re-read the
//! user and try again, up to [`MAX_CAS_ATTEMPTS`] times.

use std::{
  collections::{BTreeMap, BTreeSet},
  sync::Arc,
  time::Duration,
};

use chrono::Utc;
use nestmatch_core::{
  decisions::{Decisions, Resolution, classify},
  household::{Household, Invitation, InvitationStatus, UserAccount},
  interaction::{Interaction, InteractionKind, NewInteraction},
  location::{EffectiveScope, LocationPreference, effective_scope},
  membership::{
    INVITATION_TTL_DAYS, check_accept, check_create, check_invite, check_leave, check_revoke,
    normalize_email, validate_name,
  },
  params::Window,
  store::{Cas, NestStore},
};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  auth::new_token,
  cache::{CacheKey, DecisionCache},
  error::ApiError,
  notify::{InviteNotifier, LogNotifier},
  view::DecisionsView,
};

pub const MAX_CAS_ATTEMPTS: u32 = 3;

type Result<T, E = ApiError> = std::result::Result<T, E>;

// ─── Configuration ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EngineConfig {
  pub cache_ttl:      Duration,
  /// Hard limit on the aggregation query before a degraded view is served.
  pub query_timeout:  Duration,
  pub invitation_ttl: chrono::Duration,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      cache_ttl:      Duration::from_secs(5),
      query_timeout:  Duration::from_secs(3),
      invitation_ttl: chrono::Duration::days(INVITATION_TTL_DAYS),
    }
  }
}

// ─── Outcomes ─────────────────────────────────────────────────────────────────

/// A decision view plus where it came from.
#[derive(Debug, Clone)]
pub struct DecisionsOutcome {
  pub view:     Arc<DecisionsView>,
  pub cached:   bool,
  pub degraded: bool,
}

impl DecisionsOutcome {
  fn empty() -> Self {
    Self { view: Arc::default(), cached: false, degraded: false }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolveOutcome {
  Resolved,
  /// A resolution already covered the current dispute; nothing was written.
  AlreadyResolved,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
  pub user_id: Uuid,
  pub email:   String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdView {
  pub household: Option<Household>,
  pub members:   Vec<MemberSummary>,
}

// ─── Engine ───────────────────────────────────────────────────────────────────

pub struct Engine<S> {
  store:    Arc<S>,
  cache:    DecisionCache,
  config:   EngineConfig,
  notifier: Arc<dyn InviteNotifier>,
}

impl<S> Engine<S>
where
  S: NestStore + 'static,
{
  pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
    Self {
      store,
      cache: DecisionCache::new(config.cache_ttl),
      config,
      notifier: Arc::new(LogNotifier),
    }
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn InviteNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn cache(&self) -> &DecisionCache { &self.cache }

  async fn reload(&self, user_id: Uuid) -> Result<UserAccount> {
    self
      .store
      .get_user(user_id)
      .await
      .map_err(ApiError::store)?
      .ok_or(ApiError::Unauthorized)
  }

  // ── Membership ──────────────────────────────────────────────────────────────

  pub async fn create_household(&self, user: &UserAccount, name: &str) -> Result<Household> {
    let name = validate_name(name)?;
    let mut current = user.clone();

    for attempt in 1..=MAX_CAS_ATTEMPTS {
      check_create(current.membership())?;
      match self
        .store
        .create_household(current.user_id, name.clone())
        .await
        .map_err(ApiError::store)?
      {
        Cas::Applied(household) => {
          info!(household_id = %household.household_id, user_id = %user.user_id, "household created");
          return Ok(household);
        }
        Cas::Conflict => {
          debug!(attempt, user_id = %user.user_id, "create_household lost a race");
          current = self.reload(user.user_id).await?;
        }
      }
    }
    Err(ApiError::Conflict)
  }

  /// Issue an invitation, superseding any pending one for the same email.
  pub async fn invite(&self, user: &UserAccount, email: &str) -> Result<Invitation> {
    let email = normalize_email(email)?;
    let household_id = check_invite(user.membership())?;

    let now = Utc::now();
    let invitation = Invitation {
      token: new_token(),
      household_id,
      invited_email: email,
      created_by: user.user_id,
      status: InvitationStatus::Pending,
      accepted_by: None,
      created_at: now,
      expires_at: now + self.config.invitation_ttl,
    };

    let superseded = self
      .store
      .replace_invitation(invitation.clone())
      .await
      .map_err(ApiError::store)?;
    info!(%household_id, superseded, "invitation issued");

    tokio::spawn(self.notifier.invitation_created(invitation.clone()));
    Ok(invitation)
  }

  pub async fn accept(&self, user: &UserAccount, token: &str) -> Result<Household> {
    let mut current = user.clone();

    for attempt in 1..=MAX_CAS_ATTEMPTS {
      let invitation = self
        .store
        .find_invitation(token.to_owned())
        .await
        .map_err(ApiError::store)?;
      check_accept(current.membership(), invitation.as_ref(), Utc::now())?;

      match self
        .store
        .join_household(current.user_id, current.household_id, token.to_owned())
        .await
        .map_err(ApiError::store)?
      {
        Cas::Applied(household) => {
          self.cache.invalidate_household(household.household_id).await;
          info!(household_id = %household.household_id, user_id = %user.user_id, "invitation accepted");
          return Ok(household);
        }
        Cas::Conflict => {
          debug!(attempt, user_id = %user.user_id, "accept lost a race");
          current = self.reload(user.user_id).await?;
        }
      }
    }
    Err(ApiError::Conflict)
  }

  /// Leave the caller's household. Returns the household as left behind.
  pub async fn leave(&self, user: &UserAccount) -> Result<Household> {
    let mut current = user.clone();

    for attempt in 1..=MAX_CAS_ATTEMPTS {
      let household_id = check_leave(current.membership())?;
      match self
        .store
        .leave_household(current.user_id, household_id)
        .await
        .map_err(ApiError::store)?
      {
        Cas::Applied(household) => {
          self.cache.invalidate_household(household_id).await;
          info!(%household_id, user_id = %user.user_id, member_count = household.member_count, "member left");
          return Ok(household);
        }
        Cas::Conflict => {
          debug!(attempt, user_id = %user.user_id, "leave lost a race");
          current = self.reload(user.user_id).await?;
        }
      }
    }
    Err(ApiError::Conflict)
  }

  pub async fn revoke(&self, user: &UserAccount, token: &str) -> Result<()> {
    let invitation = self
      .store
      .find_invitation(token.to_owned())
      .await
      .map_err(ApiError::store)?;
    check_revoke(user.membership(), invitation.as_ref(), Utc::now())?;

    let revoked = self
      .store
      .revoke_invitation(token.to_owned())
      .await
      .map_err(ApiError::store)?;
    if !revoked {
      // Accepted or superseded between the read and the write.
      return Err(nestmatch_core::Error::InvitationAlreadyResolved.into());
    }
    info!(user_id = %user.user_id, "invitation revoked");
    Ok(())
  }

  /// The caller's household with a freshly reconciled member count.
  pub async fn household_view(&self, user: &UserAccount) -> Result<HouseholdView> {
    let Some(household_id) = user.household_id else {
      return Ok(HouseholdView::default());
    };
    let household = self
      .store
      .reconcile_member_count(household_id)
      .await
      .map_err(ApiError::store)?;
    let members = self
      .store
      .members_of(household_id)
      .await
      .map_err(ApiError::store)?
      .into_iter()
      .map(|m| MemberSummary { user_id: m.user_id, email: m.email })
      .collect();
    Ok(HouseholdView { household, members })
  }

  // ── Interactions & preferences ──────────────────────────────────────────────

  pub async fn record_interaction(
    &self,
    user: &UserAccount,
    property_id: Uuid,
    kind: InteractionKind,
  ) -> Result<Interaction> {
    let interaction = self
      .store
      .record_interaction(NewInteraction {
        user_id: user.user_id,
        household_id: user.household_id,
        property_id,
        kind,
      })
      .await
      .map_err(ApiError::store)?;

    if let Some(household_id) = user.household_id {
      self.cache.invalidate_household(household_id).await;
    }
    Ok(interaction)
  }

  /// Store the caller's preferences and return the recomputed scope.
  pub async fn set_preferences(
    &self,
    user: &UserAccount,
    preferences: LocationPreference,
  ) -> Result<EffectiveScope> {
    let preferences = preferences.normalized();
    self
      .store
      .set_preferences(user.user_id, preferences.clone())
      .await
      .map_err(ApiError::store)?;

    if let Some(household_id) = user.household_id {
      self.cache.invalidate_household(household_id).await;
    }
    self.scope_of(user.household_id, &preferences).await
  }

  pub async fn scope(&self, user: &UserAccount) -> Result<EffectiveScope> {
    self.scope_of(user.household_id, &user.preferences).await
  }

  async fn scope_of(
    &self,
    household_id: Option<Uuid>,
    own: &LocationPreference,
  ) -> Result<EffectiveScope> {
    match household_id {
      None => Ok(effective_scope([own])),
      Some(household_id) => {
        let members = self
          .store
          .members_of(household_id)
          .await
          .map_err(ApiError::store)?;
        Ok(effective_scope(members.iter().map(|m| &m.preferences)))
      }
    }
  }

  // ── Decisions ───────────────────────────────────────────────────────────────

  /// Mutual likes and open disputes for the caller's household.
  ///
  /// Served from cache when possible. A view whose household was invalidated
  /// while it loaded is returned but not cached. A backing query that outlives
  /// `query_timeout` yields an empty, uncached view flagged as degraded.
  pub async fn decisions(
    &self,
    user: &UserAccount,
    include_properties: bool,
    window: Window,
  ) -> Result<DecisionsOutcome> {
    let Some(household_id) = user.household_id else {
      return Ok(DecisionsOutcome::empty());
    };

    let key = CacheKey { household_id, include_properties, window };
    if let Some(view) = self.cache.get(&key).await {
      debug!(%household_id, "decision cache hit");
      return Ok(DecisionsOutcome { view, cached: true, degraded: false });
    }

    let generation = self.cache.generation(household_id);
    let load = self.load_view(household_id, include_properties, window);
    match tokio::time::timeout(self.config.query_timeout, load).await {
      Ok(view) => {
        let view = Arc::new(view?);
        if !self.cache.insert_if_current(key, view.clone(), generation).await {
          debug!(%household_id, "household changed during load; view not cached");
        }
        Ok(DecisionsOutcome { view, cached: false, degraded: false })
      }
      Err(_) => {
        warn!(%household_id, timeout = ?self.config.query_timeout, "decision query timed out");
        Ok(DecisionsOutcome { view: Arc::default(), cached: false, degraded: true })
      }
    }
  }

  async fn classify_household(
    &self,
    household_id: Uuid,
    window: Window,
  ) -> Result<(Decisions, Vec<UserAccount>)> {
    let members = self
      .store
      .members_of(household_id)
      .await
      .map_err(ApiError::store)?;
    if members.len() < 2 {
      return Ok((Decisions::default(), members));
    }

    let member_ids: BTreeSet<Uuid> = members.iter().map(|m| m.user_id).collect();
    let interactions = self
      .store
      .latest_by_household(household_id, window.since(Utc::now()))
      .await
      .map_err(ApiError::store)?;
    let resolutions = self
      .store
      .resolutions_for(household_id)
      .await
      .map_err(ApiError::store)?;

    Ok((classify(&member_ids, &interactions, &resolutions), members))
  }

  async fn load_view(
    &self,
    household_id: Uuid,
    include_properties: bool,
    window: Window,
  ) -> Result<DecisionsView> {
    let (decisions, members) = self.classify_household(household_id, window).await?;
    if !include_properties {
      return Ok(DecisionsView::bare(decisions));
    }

    let ids: Vec<Uuid> = decisions.property_ids().into_iter().collect();
    let properties: BTreeMap<Uuid, _> = self
      .store
      .properties_by_ids(&ids)
      .await
      .map_err(ApiError::store)?
      .into_iter()
      .map(|p| (p.property_id, p))
      .collect();
    let scope = effective_scope(members.iter().map(|m| &m.preferences));

    Ok(DecisionsView::hydrated(decisions, &properties, &scope))
  }

  /// Suppress the current dispute on `property_id`.
  ///
  /// The check runs against a fresh, unwindowed classification. Resolving a
  /// dispute that is already suppressed is a successful no-op.
  pub async fn resolve_dispute(
    &self,
    user: &UserAccount,
    property_id: Uuid,
  ) -> Result<ResolveOutcome> {
    let household_id = user
      .household_id
      .ok_or(nestmatch_core::Error::NotInHousehold)?;
    let (decisions, _) = self.classify_household(household_id, Window::All).await?;

    if let Some(dispute) = decisions.disputed(property_id) {
      self
        .store
        .upsert_resolution(Resolution {
          household_id,
          property_id,
          resolved_by: user.user_id,
          resolved_at: Utc::now(),
          last_interaction_id: dispute.last_interaction_id,
        })
        .await
        .map_err(ApiError::store)?;
      self.cache.invalidate_household(household_id).await;
      info!(%household_id, %property_id, "dispute resolved");
      Ok(ResolveOutcome::Resolved)
    } else if decisions.is_resolved(property_id) {
      Ok(ResolveOutcome::AlreadyResolved)
    } else {
      Err(nestmatch_core::Error::NotDisputed.into())
    }
  }
}
