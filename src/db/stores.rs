// Store traits over the platform tables.
//
// Services hold `Arc<dyn ...Store>` instead of the concrete ScyllaDB
// repositories so settlement and reconciliation flows can run against
// in-memory stores in tests. The ScyllaDB types implement them by
// delegating to their inherent methods.

use anyhow::Result;
use async_trait::async_trait;

use super::buyback_fund_db::BuybackFundDb;
use super::sell_order_db::{SellOrderDb, SellOrderRecord};
use super::wallet_db::{TransactionRecord, WalletDb, WalletRecord};
use crate::models::SellOrderStatus;

/// Read and conditionally update sell orders in the buyback queue.
#[async_trait]
pub trait SellOrderStore: Send + Sync {
    async fn latest_open_order_for_user(&self, user_id: i64) -> Result<Option<SellOrderRecord>>;

    async fn open_orders(&self, currency: &str) -> Result<Vec<SellOrderRecord>>;

    /// Conditional fill update, guarded by the remaining quantity read
    /// during planning. Ok(false) means the order changed underneath.
    async fn update_order_fill(
        &self,
        order_id: i64,
        new_remaining: i64,
        new_status: SellOrderStatus,
        expected_remaining: i64,
        updated_at: i64,
    ) -> Result<bool>;
}

/// Read and conditionally debit the buyback fund.
#[async_trait]
pub trait FundStore: Send + Sync {
    async fn fund_balance(&self, currency: &str) -> Result<f64>;

    /// Conditional balance update, guarded by the balance read during
    /// planning. Ok(false) means an admin top-up or another settlement
    /// writer landed in between.
    async fn update_fund_balance(
        &self,
        currency: &str,
        new_balance: f64,
        expected_balance: f64,
        updated_at: i64,
    ) -> Result<bool>;
}

/// User wallets and their transaction ledgers.
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn wallets_for_user(&self, user_id: i64) -> Result<Vec<WalletRecord>>;

    async fn all_wallets(&self) -> Result<Vec<WalletRecord>>;

    async fn transactions_for_wallet(&self, wallet_id: i64) -> Result<Vec<TransactionRecord>>;

    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<()>;

    /// Conditional balance write, guarded by the wallet version read
    /// during the audit or payout. Ok(false) means another writer
    /// advanced the version.
    async fn update_balance_checked(
        &self,
        wallet_id: i64,
        new_balance: f64,
        expected_version: i64,
        updated_at: i64,
    ) -> Result<bool>;
}

#[async_trait]
impl SellOrderStore for SellOrderDb {
    async fn latest_open_order_for_user(&self, user_id: i64) -> Result<Option<SellOrderRecord>> {
        SellOrderDb::latest_open_order_for_user(self, user_id).await
    }

    async fn open_orders(&self, currency: &str) -> Result<Vec<SellOrderRecord>> {
        SellOrderDb::open_orders(self, currency).await
    }

    async fn update_order_fill(
        &self,
        order_id: i64,
        new_remaining: i64,
        new_status: SellOrderStatus,
        expected_remaining: i64,
        updated_at: i64,
    ) -> Result<bool> {
        SellOrderDb::update_order_fill(
            self,
            order_id,
            new_remaining,
            new_status,
            expected_remaining,
            updated_at,
        )
        .await
    }
}

#[async_trait]
impl FundStore for BuybackFundDb {
    async fn fund_balance(&self, currency: &str) -> Result<f64> {
        BuybackFundDb::fund_balance(self, currency).await
    }

    async fn update_fund_balance(
        &self,
        currency: &str,
        new_balance: f64,
        expected_balance: f64,
        updated_at: i64,
    ) -> Result<bool> {
        BuybackFundDb::update_fund_balance(self, currency, new_balance, expected_balance, updated_at)
            .await
    }
}

#[async_trait]
impl WalletStore for WalletDb {
    async fn wallets_for_user(&self, user_id: i64) -> Result<Vec<WalletRecord>> {
        WalletDb::wallets_for_user(self, user_id).await
    }

    async fn all_wallets(&self) -> Result<Vec<WalletRecord>> {
        WalletDb::all_wallets(self).await
    }

    async fn transactions_for_wallet(&self, wallet_id: i64) -> Result<Vec<TransactionRecord>> {
        WalletDb::transactions_for_wallet(self, wallet_id).await
    }

    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<()> {
        WalletDb::insert_transaction(self, record).await
    }

    async fn update_balance_checked(
        &self,
        wallet_id: i64,
        new_balance: f64,
        expected_version: i64,
        updated_at: i64,
    ) -> Result<bool> {
        WalletDb::update_balance_checked(self, wallet_id, new_balance, expected_version, updated_at)
            .await
    }
}
