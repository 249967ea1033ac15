// Wallet balance reconciliation.
//
// A wallet's stored balance must equal the sum of its settled ledger
// entries. Payment webhooks and manual admin fixes have historically let
// the two diverge; this module recomputes the ledger sum, flags drift
// beyond a fixed epsilon, and applies corrective writes as CAS updates
// guarded by the wallet version read during the audit.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::{interval, Duration};

use crate::common_utils::get_current_timestamp_ms;
use crate::db::wallet_db::{TransactionRecord, WalletRecord};
use crate::db::WalletStore;

/// Tolerated stored-vs-calculated gap, absorbing float rounding from
/// years of client-side arithmetic. Anything above it is drift.
pub const DRIFT_EPSILON: f64 = 0.01;

/// Balance implied by the ledger: sum of settled transaction amounts.
/// Deposits are positive, withdrawals negative at insert time.
pub fn calculated_balance(txs: &[TransactionRecord]) -> f64 {
    txs.iter().filter(|t| t.is_settled()).map(|t| t.amount).sum()
}

/// Audit result for a single wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAudit {
    pub wallet_id: i64,
    pub user_id: i64,
    pub currency: String,
    pub stored_balance: f64,
    pub calculated_balance: f64,
    pub difference: f64,
    pub needs_sync: bool,
    /// Version read during the audit; guards the corrective write.
    pub version: i64,
}

impl WalletAudit {
    pub fn build(wallet: &WalletRecord, txs: &[TransactionRecord]) -> Self {
        let calculated = calculated_balance(txs);
        let difference = (calculated - wallet.balance).abs();
        Self {
            wallet_id: wallet.wallet_id,
            user_id: wallet.user_id,
            currency: wallet.currency.clone(),
            stored_balance: wallet.balance,
            calculated_balance: calculated,
            difference,
            needs_sync: difference > DRIFT_EPSILON,
            version: wallet.version,
        }
    }
}

/// A wallet whose ledger could not be read during an audit pass. The
/// wallet is reported, not silently skipped, and the rest of the pass
/// continues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAuditError {
    pub wallet_id: i64,
    pub error: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub audits: Vec<WalletAudit>,
    pub errors: Vec<WalletAuditError>,
    pub as_of: i64,
}

impl ReconciliationReport {
    pub fn drifted(&self) -> impl Iterator<Item = &WalletAudit> {
        self.audits.iter().filter(|a| a.needs_sync)
    }

    pub fn drifted_count(&self) -> usize {
        self.drifted().count()
    }

    pub fn is_clean(&self) -> bool {
        self.drifted_count() == 0 && self.errors.is_empty()
    }
}

/// Outcome of one corrective write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Applied,
    /// Another writer advanced the wallet version between audit and
    /// write. The calculated balance is stale; re-audit before retrying.
    Conflict,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SyncStats {
    pub applied: u64,
    pub conflicts: u64,
    pub failed: u64,
}

pub struct Reconciler {
    wallets: Arc<dyn WalletStore>,
}

impl Reconciler {
    pub fn new(wallets: Arc<dyn WalletStore>) -> Self {
        Self { wallets }
    }

    /// Audit every wallet belonging to one user.
    pub async fn audit_user(&self, user_id: i64) -> Result<ReconciliationReport> {
        let wallets = self.wallets.wallets_for_user(user_id).await?;
        Ok(self.audit_wallets(&wallets).await)
    }

    /// Audit every wallet on the platform (reconciliation service sweep).
    pub async fn audit_all(&self) -> Result<ReconciliationReport> {
        let wallets = self.wallets.all_wallets().await?;
        Ok(self.audit_wallets(&wallets).await)
    }

    async fn audit_wallets(&self, wallets: &[WalletRecord]) -> ReconciliationReport {
        let mut report = ReconciliationReport {
            as_of: get_current_timestamp_ms(),
            ..Default::default()
        };

        for wallet in wallets {
            match self.wallets.transactions_for_wallet(wallet.wallet_id).await {
                Ok(txs) => report.audits.push(WalletAudit::build(wallet, &txs)),
                Err(e) => {
                    log::error!(
                        "Failed to read ledger for wallet {}: {}",
                        wallet.wallet_id,
                        e
                    );
                    report.errors.push(WalletAuditError {
                        wallet_id: wallet.wallet_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Overwrite the stored balance with the calculated one, guarded by
    /// the version read during the audit.
    pub async fn sync_wallet(&self, audit: &WalletAudit) -> Result<SyncOutcome> {
        let applied = self
            .wallets
            .update_balance_checked(
                audit.wallet_id,
                audit.calculated_balance,
                audit.version,
                get_current_timestamp_ms(),
            )
            .await?;

        if applied {
            log::info!(
                "Synced wallet {}: {:.2} -> {:.2}",
                audit.wallet_id,
                audit.stored_balance,
                audit.calculated_balance
            );
            Ok(SyncOutcome::Applied)
        } else {
            log::error!(
                "Sync conflict on wallet {}: version {} no longer current, skipping",
                audit.wallet_id,
                audit.version
            );
            Ok(SyncOutcome::Conflict)
        }
    }

    /// Fix every drifted wallet in a report ("Fix All").
    pub async fn sync_all(&self, report: &ReconciliationReport) -> SyncStats {
        let mut stats = SyncStats::default();

        for audit in report.drifted() {
            match self.sync_wallet(audit).await {
                Ok(SyncOutcome::Applied) => stats.applied += 1,
                Ok(SyncOutcome::Conflict) => stats.conflicts += 1,
                Err(e) => {
                    log::error!("Sync failed for wallet {}: {}", audit.wallet_id, e);
                    stats.failed += 1;
                }
            }
        }

        stats
    }

    /// Run continuous reconciliation sweeps (for background task).
    pub async fn run_scanner(self: Arc<Self>, scan_interval_secs: u64, auto_fix: bool) {
        let mut ticker = interval(Duration::from_secs(scan_interval_secs));

        loop {
            ticker.tick().await;

            log::info!("Starting scheduled reconciliation...");
            match self.audit_all().await {
                Ok(report) => {
                    if report.is_clean() {
                        log::info!(
                            "Reconciliation PASSED: {} wallets consistent",
                            report.audits.len()
                        );
                    } else {
                        log::error!(
                            "Reconciliation FAILED: {} drifted, {} unreadable of {} wallets",
                            report.drifted_count(),
                            report.errors.len(),
                            report.audits.len() + report.errors.len()
                        );
                        for audit in report.drifted() {
                            log::warn!(
                                "Wallet {} [{}]: stored {:.2}, ledger {:.2} (diff {:.2})",
                                audit.wallet_id,
                                audit.currency,
                                audit.stored_balance,
                                audit.calculated_balance,
                                audit.difference
                            );
                        }
                        if auto_fix {
                            let stats = self.sync_all(&report).await;
                            log::info!(
                                "Auto-fix: {} applied, {} conflicts, {} failed",
                                stats.applied,
                                stats.conflicts,
                                stats.failed
                            );
                        }
                    }
                }
                Err(e) => log::error!("Reconciliation sweep error: {}", e),
            }
        }
    }
}
