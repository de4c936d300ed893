//! Outbound notification interface.
//!
//! Delivery (push, WhatsApp, email) belongs to the surrounding application.
//! The ledger hands notifications off and never waits on or retries them.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::model::{AffiliateId, CommissionKind, OrderId, PayoutId, PayoutStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    AffiliateRegistered {
        affiliate_id: AffiliateId,
    },
    CommissionCredited {
        affiliate_id: AffiliateId,
        order_id: OrderId,
        kind: CommissionKind,
        amount: Decimal,
    },
    PayoutRequested {
        affiliate_id: AffiliateId,
        payout_id: PayoutId,
        amount: Decimal,
    },
    PayoutResolved {
        affiliate_id: AffiliateId,
        payout_id: PayoutId,
        status: PayoutStatus,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Notifier that only logs. Used when no delivery channel is wired in.
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(?notification, "notification");
        Ok(())
    }
}

/// Hand a notification to `notifier` on a background task.
///
/// Failures are logged and dropped.
pub fn dispatch(notifier: &Arc<dyn Notifier>, notification: Notification) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(notification).await {
            warn!(error = %e, "notification dropped");
        }
    });
}
