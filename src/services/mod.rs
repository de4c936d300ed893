//! Domain services over the store traits.

pub mod commission;
pub mod ledger;
pub mod payout;
pub mod placement;
pub mod registration;
pub mod resync;

pub use commission::{
    CommissionEngine, CommissionError, CommissionOutcome, CommissionReceipt, CreditedLevel,
    SkipReason,
};
pub use ledger::{rebuild_from, BalanceAggregator, Incremental, Rebuild};
pub use payout::{PayoutError, PayoutWorkflow};
pub use placement::{Placement, PlacementError, TreePlacement};
pub use registration::{NewAffiliate, Referrer, RegistrationError, RegistrationService};
pub use resync::{audit_tree, ResyncError, ResyncJob, ResyncSummary, TreeAudit};
