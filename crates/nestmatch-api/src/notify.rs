//! Invitation delivery hook.
//!
//! Delivery is fire-and-forget: the engine spawns the returned future and
//! never awaits it, so a slow or failing mailer cannot hold up an invite.

use std::{future::Future, pin::Pin};

use nestmatch_core::household::Invitation;

pub type Delivery = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub trait InviteNotifier: Send + Sync + 'static {
  fn invitation_created(&self, invitation: Invitation) -> Delivery;
}

/// Default notifier: records the delivery in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl InviteNotifier for LogNotifier {
  fn invitation_created(&self, invitation: Invitation) -> Delivery {
    Box::pin(async move {
      tracing::info!(
        household_id = %invitation.household_id,
        email = %invitation.invited_email,
        expires_at = %invitation.expires_at,
        "invitation ready for delivery"
      );
    })
  }
}
