// Reconciliation endpoints: audit, per-wallet sync, fix-all.
//
// Corrective writes only happen on explicit request; the audit itself
// never mutates anything.
use crate::api::{error_codes, error_response, success_response};
use crate::models::ApiResponse;
use crate::reconciler::{ReconciliationReport, Reconciler, SyncOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome summary for a fix-all request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixAllSummary {
    pub wallets_audited: usize,
    pub wallets_drifted: usize,
    pub applied: u64,
    pub conflicts: u64,
    pub failed: u64,
    pub as_of: i64,
}

pub struct ReconcileHandler {
    pub reconciler: Arc<Reconciler>,
}

impl ReconcileHandler {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self { reconciler }
    }

    fn parse_user_id(user_id: &str) -> Result<i64, ApiResponse<Option<ReconciliationReport>>> {
        user_id.parse().map_err(|_| {
            error_response(
                error_codes::INVALID_USER_ID,
                "Invalid user_id format".to_string(),
            )
        })
    }

    /// Read-only drift report for all of a user's wallets.
    pub async fn audit(&self, user_id: &str) -> ApiResponse<Option<ReconciliationReport>> {
        let uid = match Self::parse_user_id(user_id) {
            Ok(id) => id,
            Err(resp) => return resp,
        };

        match self.reconciler.audit_user(uid).await {
            Ok(report) => success_response(report),
            Err(e) => error_response(
                error_codes::DB_ERROR,
                format!("Failed to audit wallets: {}", e),
            ),
        }
    }

    /// Sync one wallet to its ledger ("Sync" button). Conflicts surface
    /// as errors; the caller re-audits and retries explicitly.
    pub async fn sync_wallet(
        &self,
        user_id: &str,
        wallet_id: &str,
    ) -> ApiResponse<Option<ReconciliationReport>> {
        let uid = match Self::parse_user_id(user_id) {
            Ok(id) => id,
            Err(resp) => return resp,
        };
        let wid: i64 = match wallet_id.parse() {
            Ok(id) => id,
            Err(_) => {
                return error_response(
                    error_codes::INVALID_WALLET_ID,
                    "Invalid wallet_id format".to_string(),
                );
            }
        };

        let report = match self.reconciler.audit_user(uid).await {
            Ok(report) => report,
            Err(e) => {
                return error_response(
                    error_codes::DB_ERROR,
                    format!("Failed to audit wallets: {}", e),
                );
            }
        };

        let audit = match report.audits.iter().find(|a| a.wallet_id == wid) {
            Some(a) => a,
            None => {
                return error_response(
                    error_codes::WALLET_NOT_FOUND,
                    format!("Wallet {} not found for user {}", wid, uid),
                );
            }
        };

        if !audit.needs_sync {
            return success_response(report.clone());
        }

        match self.reconciler.sync_wallet(audit).await {
            Ok(SyncOutcome::Applied) => success_response(report.clone()),
            Ok(SyncOutcome::Conflict) => error_response(
                error_codes::SYNC_CONFLICT,
                format!(
                    "Wallet {} changed during sync, re-run the audit",
                    wid
                ),
            ),
            Err(e) => error_response(
                error_codes::DB_ERROR,
                format!("Failed to sync wallet {}: {}", wid, e),
            ),
        }
    }

    /// Correct every drifted wallet of a user ("Fix All" button).
    pub async fn fix_all(&self, user_id: &str) -> ApiResponse<Option<FixAllSummary>> {
        let uid: i64 = match user_id.parse() {
            Ok(id) => id,
            Err(_) => {
                return error_response(
                    error_codes::INVALID_USER_ID,
                    "Invalid user_id format".to_string(),
                );
            }
        };

        let report = match self.reconciler.audit_user(uid).await {
            Ok(report) => report,
            Err(e) => {
                return error_response(
                    error_codes::DB_ERROR,
                    format!("Failed to audit wallets: {}", e),
                );
            }
        };

        let stats = self.reconciler.sync_all(&report).await;

        success_response(FixAllSummary {
            wallets_audited: report.audits.len(),
            wallets_drifted: report.drifted_count(),
            applied: stats.applied,
            conflicts: stats.conflicts,
            failed: stats.failed,
            as_of: report.as_of,
        })
    }
}
