//! Reconciliation job.
//!
//! Converges the cached balances back to what the ledger and the shop's
//! orders say, whatever happened in between: engine bugs, double fires,
//! deleted orders. Three passes:
//!
//! 1. prune ledger entries whose order no longer exists;
//! 2. rebuild every affiliate's cached balances from the remaining entries,
//!    its payout requests and its confirmed orders;
//! 3. detach self-parented nodes.
//!
//! A failure on one affiliate is logged and counted; the run continues.
//! Running the job on a consistent store changes nothing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{CommissionConfig, ResyncConfig};
use crate::error::ErrorKind;
use crate::interfaces::{AffiliateStore, LedgerStore, OrderSource, StorageError};
use crate::model::{Affiliate, AffiliateId, Position};

/// Structural problems found in the placement tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeAudit {
    /// Nodes whose parent is themselves.
    pub self_parented: Vec<AffiliateId>,
    /// Nodes whose parent does not exist.
    pub dangling_parents: Vec<AffiliateId>,
    /// Slots claimed by more than one child.
    pub slot_collisions: Vec<(AffiliateId, Position)>,
}

impl TreeAudit {
    pub fn is_clean(&self) -> bool {
        self.self_parented.is_empty()
            && self.dangling_parents.is_empty()
            && self.slot_collisions.is_empty()
    }
}

/// Inspect a full directory listing for structural problems.
pub fn audit_tree(affiliates: &[Affiliate]) -> TreeAudit {
    let known: HashSet<AffiliateId> = affiliates.iter().map(|a| a.id).collect();
    let mut audit = TreeAudit::default();
    let mut claims: HashMap<(AffiliateId, Position), usize> = HashMap::new();

    for a in affiliates {
        let Some(parent) = a.parent_id else {
            continue;
        };
        if parent == a.id {
            audit.self_parented.push(a.id);
            continue;
        }
        if !known.contains(&parent) {
            audit.dangling_parents.push(a.id);
        }
        if let Some(position) = a.position {
            *claims.entry((parent, position)).or_default() += 1;
        }
    }

    audit.slot_collisions = claims
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(slot, _)| slot)
        .collect();
    audit.slot_collisions.sort();
    audit
}

/// Counts from one resync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResyncSummary {
    pub dry_run: bool,
    /// Distinct orders referenced by the ledger.
    pub orders_checked: usize,
    /// Ledger orders that no longer exist in the shop.
    pub orphaned_orders: usize,
    pub transactions_pruned: u64,
    pub affiliates_rebuilt: usize,
    pub affiliates_failed: usize,
    pub self_parents_repaired: usize,
    /// Tree state before repairs.
    pub audit: TreeAudit,
}

#[derive(Debug, thiserror::Error)]
pub enum ResyncError {
    #[error("A resync is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ResyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResyncError::AlreadyRunning => ErrorKind::Conflict,
            ResyncError::Storage(e) => e.kind(),
        }
    }
}

/// Ledger reconciliation. At most one run at a time per job instance.
pub struct ResyncJob {
    affiliates: Arc<dyn AffiliateStore>,
    ledger: Arc<dyn LedgerStore>,
    orders: Arc<dyn OrderSource>,
    confirmed_statuses: Vec<String>,
    config: ResyncConfig,
    running: Mutex<()>,
}

impl ResyncJob {
    pub fn new(
        affiliates: Arc<dyn AffiliateStore>,
        ledger: Arc<dyn LedgerStore>,
        orders: Arc<dyn OrderSource>,
        commission: &CommissionConfig,
        config: ResyncConfig,
    ) -> Self {
        Self {
            affiliates,
            ledger,
            orders,
            confirmed_statuses: commission.confirmed_statuses.clone(),
            config,
            running: Mutex::new(()),
        }
    }

    /// Run all three passes. Fails fast with `AlreadyRunning` if another
    /// run holds the job.
    #[instrument(skip(self), fields(dry_run = self.config.dry_run))]
    pub async fn run(&self) -> Result<ResyncSummary, ResyncError> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("resync requested while one is running");
            return Err(ResyncError::AlreadyRunning);
        };

        let mut summary = ResyncSummary {
            dry_run: self.config.dry_run,
            ..ResyncSummary::default()
        };

        self.prune_orphans(&mut summary).await?;

        let directory = self.affiliates.list().await?;
        self.rebuild_all(&directory, &mut summary).await;

        summary.audit = audit_tree(&directory);
        self.repair_self_parents(&mut summary).await;

        info!(
            orders_checked = summary.orders_checked,
            orphaned_orders = summary.orphaned_orders,
            transactions_pruned = summary.transactions_pruned,
            affiliates_rebuilt = summary.affiliates_rebuilt,
            affiliates_failed = summary.affiliates_failed,
            self_parents_repaired = summary.self_parents_repaired,
            dangling_parents = summary.audit.dangling_parents.len(),
            slot_collisions = summary.audit.slot_collisions.len(),
            "resync finished"
        );
        Ok(summary)
    }

    /// Read-only structural check of the tree.
    pub async fn audit(&self) -> Result<TreeAudit, ResyncError> {
        let directory = self.affiliates.list().await?;
        Ok(audit_tree(&directory))
    }

    async fn prune_orphans(&self, summary: &mut ResyncSummary) -> Result<(), StorageError> {
        let referenced = self.ledger.order_ids().await?;
        let existing = self.orders.existing_ids(&referenced).await?;
        summary.orders_checked = referenced.len();

        for order_id in referenced.iter().filter(|id| !existing.contains(*id)) {
            summary.orphaned_orders += 1;
            if self.config.dry_run {
                debug!(%order_id, "would prune orphaned order");
                continue;
            }
            match self.ledger.prune_order(order_id).await {
                Ok(removed) => {
                    info!(%order_id, removed, "pruned transactions for deleted order");
                    summary.transactions_pruned += removed;
                }
                Err(e) => error!(%order_id, error = %e, "failed to prune order"),
            }
        }
        Ok(())
    }

    async fn rebuild_all(&self, directory: &[Affiliate], summary: &mut ResyncSummary) {
        if self.config.dry_run {
            return;
        }
        for affiliate in directory {
            match self.rebuild_one(affiliate).await {
                Ok(()) => summary.affiliates_rebuilt += 1,
                Err(e) => {
                    error!(affiliate_id = %affiliate.id, error = %e, "balance rebuild failed");
                    summary.affiliates_failed += 1;
                }
            }
        }
    }

    async fn rebuild_one(&self, affiliate: &Affiliate) -> Result<(), StorageError> {
        let stats = self
            .orders
            .stats_by_coupon(&affiliate.coupon_code, &self.confirmed_statuses)
            .await?;
        let rebuilt = self.ledger.rebuild_balances(affiliate.id, stats).await?;
        if rebuilt != affiliate.balances {
            debug!(affiliate_id = %affiliate.id, "cached balances corrected");
        }
        Ok(())
    }

    async fn repair_self_parents(&self, summary: &mut ResyncSummary) {
        if self.config.dry_run {
            return;
        }
        for id in &summary.audit.self_parented {
            match self.affiliates.detach_self_parent(*id).await {
                Ok(true) => {
                    warn!(affiliate_id = %id, "self-parented node detached");
                    summary.self_parents_repaired += 1;
                }
                Ok(false) => {}
                Err(e) => error!(affiliate_id = %id, error = %e, "self-parent repair failed"),
            }
        }
    }
}
