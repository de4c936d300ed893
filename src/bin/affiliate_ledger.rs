//! affiliate-ledger: admin entry point
//!
//! Runs the batch operations that have no request handler:
//!
//! ```text
//! affiliate-ledger resync               rebuild balances from the ledger
//! affiliate-ledger process-order <id>   credit commissions for one order
//! affiliate-ledger audit                report tree problems, change nothing
//! ```
//!
//! ## Configuration
//! - AFFILIATE_LEDGER_CONFIG: Path to YAML config (optional)
//! - AFFILIATE_LEDGER__*: Overrides, e.g. AFFILIATE_LEDGER__RESYNC__DRY_RUN=true
//! - AFFILIATE_LEDGER_LOG: Log filter (default: info)

use backon::Retryable;
use tracing::{error, info, warn};

use affiliate_ledger::config::Config;
use affiliate_ledger::services::{CommissionError, CommissionOutcome, ResyncError};
use affiliate_ledger::utils::bootstrap::init_tracing;
use affiliate_ledger::utils::retry::{admin_backoff, is_retryable};
use affiliate_ledger::AffiliateLedger;

const USAGE: &str = "usage: affiliate-ledger <resync | process-order <order-id> | audit>";

enum Command {
    Resync,
    ProcessOrder(String),
    Audit,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Option<Command> {
    let command = match args.next()?.as_str() {
        "resync" => Command::Resync,
        "process-order" => Command::ProcessOrder(args.next()?),
        "audit" => Command::Audit,
        _ => return None,
    };
    args.next().is_none().then_some(command)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let Some(command) = parse_args(std::env::args().skip(1)) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let config = Config::load(None)?;
    let ledger = AffiliateLedger::builder(config).build().await?;

    match command {
        Command::Resync => {
            let summary = (|| async { ledger.run_resync().await })
                .retry(admin_backoff())
                .when(|e| matches!(e, ResyncError::Storage(s) if is_retryable(s)))
                .notify(|e, delay| warn!(error = %e, ?delay, "resync blocked, retrying"))
                .await?;
            if summary.affiliates_failed > 0 {
                error!(failed = summary.affiliates_failed, "some affiliates were not rebuilt");
                std::process::exit(1);
            }
        }
        Command::ProcessOrder(order_id) => {
            let outcome = (|| async { ledger.process_order_commissions(&order_id).await })
                .retry(admin_backoff())
                .when(|e| matches!(e, CommissionError::Storage(s) if is_retryable(s)))
                .notify(|e, delay| warn!(error = %e, ?delay, "commit blocked, retrying"))
                .await?;
            match outcome {
                CommissionOutcome::Credited(receipt) => info!(
                    order_id = %receipt.order_id,
                    total = %receipt.total,
                    levels = receipt.credited.len(),
                    "commissions credited"
                ),
                CommissionOutcome::Skipped(reason) => info!(%order_id, %reason, "order skipped"),
            }
        }
        Command::Audit => {
            let audit = ledger.audit().await?;
            info!(
                self_parented = audit.self_parented.len(),
                dangling_parents = audit.dangling_parents.len(),
                slot_collisions = audit.slot_collisions.len(),
                "tree audit"
            );
            for id in &audit.self_parented {
                warn!(affiliate_id = %id, "self-parented");
            }
            for id in &audit.dangling_parents {
                warn!(affiliate_id = %id, "parent missing");
            }
            for (parent, position) in &audit.slot_collisions {
                warn!(parent_id = %parent, %position, "slot claimed twice");
            }
        }
    }

    Ok(())
}
