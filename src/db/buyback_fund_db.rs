use anyhow::{Context, Result};
use scylla::{FromRow, Session};
use std::sync::Arc;

/// Admin sub-wallet row. The buyback fund is the row with
/// wallet_type = 'buyback' for a given currency.
#[derive(Debug, Clone, FromRow)]
pub struct AdminSubWalletRecord {
    pub wallet_type: String,
    pub currency: String,
    pub balance: f64,
    pub updated_at: i64,
}

pub const BUYBACK_WALLET_TYPE: &str = "buyback";

// CQL Statements
const SELECT_FUND_CQL: &str = "
    SELECT wallet_type, currency, balance, updated_at
    FROM admin_sub_wallets
    WHERE wallet_type = ? AND currency = ?
    ALLOW FILTERING
";

const UPDATE_FUND_BALANCE_CQL: &str = "
    UPDATE admin_sub_wallets
    SET balance = ?, updated_at = ?
    WHERE wallet_type = ? AND currency = ?
    IF balance = ?
";

/// DB operations for the buyback fund pool
pub struct BuybackFundDb {
    session: Arc<Session>,
}

impl BuybackFundDb {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Current buyback fund balance for a currency. A missing row is an
    /// empty pool, not an error.
    pub async fn fund_balance(&self, currency: &str) -> Result<f64> {
        let result = self
            .session
            .query(SELECT_FUND_CQL, (BUYBACK_WALLET_TYPE, currency))
            .await
            .context("Failed to query buyback fund balance")?;

        if let Some(rows) = result.rows {
            if let Some(row) = rows.into_iter().next() {
                let record: AdminSubWalletRecord =
                    row.into_typed().context("Failed to parse fund row")?;
                return Ok(record.balance);
            }
        }

        Ok(0.0)
    }

    /// Conditional fund debit/credit: only applies while the balance is
    /// still the one the caller read. Admin top-ups land between reads,
    /// so a settlement pass must re-read on conflict.
    pub async fn update_fund_balance(
        &self,
        currency: &str,
        new_balance: f64,
        expected_balance: f64,
        updated_at: i64,
    ) -> Result<bool> {
        let result = self
            .session
            .query(
                UPDATE_FUND_BALANCE_CQL,
                (
                    new_balance,
                    updated_at,
                    BUYBACK_WALLET_TYPE,
                    currency,
                    expected_balance,
                ),
            )
            .await
            .context("Failed to update buyback fund balance")?;

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
