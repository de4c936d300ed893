//! In-process entry point.
//!
//! Wires the stores, configuration and services together so callers (request
//! handlers, the admin CLI, tests) get one object to drive.
//!
//! # Example
//!
//! ```ignore
//! use affiliate_ledger::config::Config;
//! use affiliate_ledger::facade::AffiliateLedger;
//!
//! let ledger = AffiliateLedger::builder(Config::load(None)?).build().await?;
//! let outcome = ledger.process_order_commissions("order-42").await?;
//! ```

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use crate::config::{Config, ConfigError};
use crate::error::ErrorKind;
use crate::interfaces::{
    AffiliateStore, LedgerStore, Notifier, SplitStore, StorageError, TracingNotifier,
};
use crate::model::{Affiliate, AffiliateId, CommissionTransaction, PayoutId, PayoutRequest, SplitConfig};
use crate::services::{
    CommissionEngine, CommissionError, CommissionOutcome, NewAffiliate, PayoutError,
    PayoutWorkflow, Placement, PlacementError, RegistrationError, RegistrationService,
    ResyncError, ResyncJob, ResyncSummary, TreeAudit, TreePlacement,
};
use crate::storage::{init_storage, Stores};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Storage(e) => e.kind(),
            LedgerError::Config(_) => ErrorKind::Validation,
        }
    }
}

/// Builder for [`AffiliateLedger`].
pub struct AffiliateLedgerBuilder {
    config: Config,
    stores: Option<Stores>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl AffiliateLedgerBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            stores: None,
            notifier: None,
        }
    }

    /// Use these stores instead of opening the configured backend.
    pub fn with_stores(mut self, stores: Stores) -> Self {
        self.stores = Some(stores);
        self
    }

    /// Deliver notifications here instead of only logging them.
    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Some(Arc::new(notifier));
        self
    }

    pub async fn build(self) -> Result<AffiliateLedger, LedgerError> {
        self.config.validate()?;

        let stores = match self.stores {
            Some(stores) => stores,
            None => init_storage(&self.config.storage).await?,
        };
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(TracingNotifier));

        Ok(AffiliateLedger::assemble(stores, self.config, notifier))
    }
}

/// Affiliate ledger with every service wired to one set of stores.
pub struct AffiliateLedger {
    stores: Stores,
    config: Config,
    placement: TreePlacement,
    registration: RegistrationService,
    commission: CommissionEngine,
    payouts: PayoutWorkflow,
    resync: ResyncJob,
}

impl AffiliateLedger {
    pub fn builder(config: Config) -> AffiliateLedgerBuilder {
        AffiliateLedgerBuilder::new(config)
    }

    fn assemble(stores: Stores, config: Config, notifier: Arc<dyn Notifier>) -> Self {
        let placement = TreePlacement::new(stores.affiliates.clone());
        let registration = RegistrationService::new(stores.affiliates.clone(), notifier.clone());
        let commission = CommissionEngine::new(
            stores.affiliates.clone(),
            stores.ledger.clone(),
            stores.orders.clone(),
            stores.products.clone(),
            notifier.clone(),
            config.commission.clone(),
        );
        let payouts = PayoutWorkflow::new(stores.payouts.clone(), notifier, config.payout.clone());
        let resync = ResyncJob::new(
            stores.affiliates.clone(),
            stores.ledger.clone(),
            stores.orders.clone(),
            &config.commission,
            config.resync.clone(),
        );

        Self {
            stores,
            config,
            placement,
            registration,
            commission,
            payouts,
            resync,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // Affiliates

    pub async fn register(&self, form: NewAffiliate) -> Result<Affiliate, RegistrationError> {
        self.registration.register(form).await
    }

    pub async fn approve(&self, id: AffiliateId) -> Result<(), RegistrationError> {
        self.registration.approve(id).await
    }

    pub async fn reject(&self, id: AffiliateId) -> Result<(), RegistrationError> {
        self.registration.reject(id).await
    }

    pub async fn upgrade_to_paid(&self, id: AffiliateId) -> Result<(), RegistrationError> {
        self.registration.upgrade_to_paid(id).await
    }

    pub async fn authenticate(
        &self,
        coupon_code: &str,
        password: &str,
    ) -> Result<Affiliate, RegistrationError> {
        self.registration.authenticate(coupon_code, password).await
    }

    pub async fn affiliate(&self, id: AffiliateId) -> Result<Option<Affiliate>, StorageError> {
        self.stores.affiliates.get(id).await
    }

    /// Where an affiliate referred by `referrer_id` would be placed now.
    pub async fn place(&self, referrer_id: Option<AffiliateId>) -> Result<Placement, PlacementError> {
        self.placement.place(referrer_id).await
    }

    // Commissions

    /// Split table in force: the latest published version, else the
    /// configured default.
    pub async fn current_splits(&self) -> Result<SplitConfig, StorageError> {
        Ok(self
            .stores
            .splits
            .current()
            .await?
            .unwrap_or_else(|| self.config.commission.splits.clone()))
    }

    /// Publish a new split table. The store assigns the version.
    pub async fn publish_splits(&self, splits: SplitConfig) -> Result<SplitConfig, LedgerError> {
        splits.validate().map_err(ConfigError::from)?;
        let published = self.stores.splits.publish(splits).await?;
        info!(version = published.version, "split table published");
        Ok(published)
    }

    /// Credit commissions for one order under the current split table.
    pub async fn process_order_commissions(
        &self,
        order_id: &str,
    ) -> Result<CommissionOutcome, CommissionError> {
        let splits = self.current_splits().await?;
        self.commission
            .process_order_commissions(order_id, &splits)
            .await
    }

    pub async fn transactions_for(
        &self,
        affiliate_id: AffiliateId,
    ) -> Result<Vec<CommissionTransaction>, StorageError> {
        self.stores.ledger.for_affiliate(affiliate_id).await
    }

    // Reconciliation

    pub async fn run_resync(&self) -> Result<ResyncSummary, ResyncError> {
        self.resync.run().await
    }

    pub async fn audit(&self) -> Result<TreeAudit, ResyncError> {
        self.resync.audit().await
    }

    // Payouts

    pub async fn request_payout(
        &self,
        affiliate_id: AffiliateId,
        amount: Decimal,
        upi_id: &str,
    ) -> Result<PayoutRequest, PayoutError> {
        self.payouts.request_payout(affiliate_id, amount, upi_id).await
    }

    pub async fn complete_payout(&self, id: PayoutId) -> Result<PayoutRequest, PayoutError> {
        self.payouts.complete_payout(id).await
    }

    pub async fn reject_payout(&self, id: PayoutId) -> Result<PayoutRequest, PayoutError> {
        self.payouts.reject_payout(id).await
    }

    pub async fn payout_history(
        &self,
        affiliate_id: AffiliateId,
    ) -> Result<Vec<PayoutRequest>, PayoutError> {
        self.payouts.history(affiliate_id).await
    }
}
