use anyhow::{Context, Result};
use scylla::prepared_statement::PreparedStatement;
use scylla::{FromRow, Session};
use std::sync::Arc;

use crate::models::TransactionStatus;

/// Wallet row from wallets.
///
/// `version` increments on every balance write and guards the corrective
/// CAS update the reconciler performs.
#[derive(Debug, Clone, FromRow)]
pub struct WalletRecord {
    pub wallet_id: i64,
    pub user_id: i64,
    pub currency: String,
    pub balance: f64,
    pub version: i64,
    pub updated_at: i64,
}

/// Immutable ledger entry from transactions. Amounts are signed:
/// deposits positive, withdrawals negative.
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRecord {
    pub tx_id: i64,
    pub wallet_id: i64,
    pub user_id: i64,
    pub amount: f64,
    pub status: String,
    pub currency: String,
    pub created_at: i64,
}

impl TransactionRecord {
    pub fn status(&self) -> Option<TransactionStatus> {
        TransactionStatus::from_str(&self.status)
    }

    pub fn is_settled(&self) -> bool {
        self.status().map(|s| s.is_settled()).unwrap_or(false)
    }
}

// CQL Statements
const SELECT_WALLETS_BY_USER_CQL: &str = "
    SELECT wallet_id, user_id, currency, balance, version, updated_at
    FROM wallets
    WHERE user_id = ?
    ALLOW FILTERING
";

const SELECT_ALL_WALLETS_CQL: &str = "
    SELECT wallet_id, user_id, currency, balance, version, updated_at
    FROM wallets
";

const SELECT_TXS_BY_WALLET_CQL: &str = "
    SELECT tx_id, wallet_id, user_id, amount, status, currency, created_at
    FROM transactions
    WHERE wallet_id = ?
    ALLOW FILTERING
";

const INSERT_TX_CQL: &str = "
    INSERT INTO transactions (
        tx_id, wallet_id, user_id, amount, status, currency, created_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?)
";

const UPDATE_BALANCE_CHECKED_CQL: &str = "
    UPDATE wallets
    SET balance = ?, version = ?, updated_at = ?
    WHERE wallet_id = ?
    IF version = ?
";

/// DB operations for wallets and their transaction ledger
pub struct WalletDb {
    session: Arc<Session>,

    // The reconciliation scan reads the ledger once per wallet; prepared
    // to keep full-scan passes cheap.
    select_txs_stmt: PreparedStatement,
}

impl WalletDb {
    pub async fn new(session: Arc<Session>) -> Result<Self> {
        let select_txs_stmt = session
            .prepare(SELECT_TXS_BY_WALLET_CQL)
            .await
            .context("Failed to prepare transaction select statement")?;

        Ok(Self {
            session,
            select_txs_stmt,
        })
    }

    pub async fn wallets_for_user(&self, user_id: i64) -> Result<Vec<WalletRecord>> {
        let result = self
            .session
            .query(SELECT_WALLETS_BY_USER_CQL, (user_id,))
            .await
            .context("Failed to query wallets by user")?;

        let mut wallets = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                let record: WalletRecord =
                    row.into_typed().context("Failed to parse wallet row")?;
                wallets.push(record);
            }
        }

        Ok(wallets)
    }

    /// Every wallet on the platform, for full reconciliation sweeps.
    pub async fn all_wallets(&self) -> Result<Vec<WalletRecord>> {
        let result = self
            .session
            .query(SELECT_ALL_WALLETS_CQL, &[])
            .await
            .context("Failed to query all wallets")?;

        let mut wallets = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                let record: WalletRecord =
                    row.into_typed().context("Failed to parse wallet row")?;
                wallets.push(record);
            }
        }

        Ok(wallets)
    }

    pub async fn transactions_for_wallet(
        &self,
        wallet_id: i64,
    ) -> Result<Vec<TransactionRecord>> {
        let result = self
            .session
            .execute(&self.select_txs_stmt, (wallet_id,))
            .await
            .context("Failed to query transactions for wallet")?;

        let mut txs = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                let record: TransactionRecord =
                    row.into_typed().context("Failed to parse transaction row")?;
                txs.push(record);
            }
        }

        Ok(txs)
    }

    pub async fn insert_transaction(&self, record: &TransactionRecord) -> Result<()> {
        self.session
            .query(
                INSERT_TX_CQL,
                (
                    record.tx_id,
                    record.wallet_id,
                    record.user_id,
                    record.amount,
                    record.status.as_str(),
                    record.currency.as_str(),
                    record.created_at,
                ),
            )
            .await
            .context("Failed to insert transaction")?;
        Ok(())
    }

    /// Corrective balance write with CAS on the wallet version. Returns
    /// false when another writer advanced the version first; the caller
    /// must re-audit rather than retry the same write.
    pub async fn update_balance_checked(
        &self,
        wallet_id: i64,
        new_balance: f64,
        expected_version: i64,
        updated_at: i64,
    ) -> Result<bool> {
        let result = self
            .session
            .query(
                UPDATE_BALANCE_CHECKED_CQL,
                (
                    new_balance,
                    expected_version + 1,
                    updated_at,
                    wallet_id,
                    expected_version,
                ),
            )
            .await
            .context("Failed to update wallet balance")?;

        if let Some(rows) = result.rows {
            if let Some(row) = rows.into_iter().next() {
                if let Ok((applied,)) = row.into_typed::<(bool,)>() {
                    return Ok(applied);
                }
            }
        }

        Ok(false)
    }
}
