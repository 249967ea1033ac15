// Settlement pass execution against an in-memory store: write ordering,
// CAS conflict handling, and ledger/order consistency.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use buyback::db::sell_order_db::SellOrderRecord;
use buyback::db::wallet_db::{TransactionRecord, WalletRecord};
use buyback::db::{FundStore, SellOrderStore, WalletStore};
use buyback::models::SellOrderStatus;
use buyback::settlement::FifoSettlement;

/// In-memory stand-in for the platform tables. The conditional updates
/// mirror the LWT semantics; `ops` records the call order so tests can
/// assert the payout write sequence.
#[derive(Default)]
struct MemoryStore {
    orders: Mutex<Vec<SellOrderRecord>>,
    fund: Mutex<f64>,
    wallets: Mutex<Vec<WalletRecord>>,
    txs: Mutex<Vec<TransactionRecord>>,
    ops: Mutex<Vec<&'static str>>,
    /// Simulate an admin top-up landing between the plan read and the
    /// debit: the fund CAS never applies.
    reject_fund_cas: bool,
    /// Simulate a concurrent wallet writer: the balance CAS never applies.
    reject_wallet_cas: bool,
}

impl MemoryStore {
    fn op(&self, name: &'static str) {
        self.ops.lock().unwrap().push(name);
    }

    fn op_index(&self, name: &str) -> Option<usize> {
        self.ops.lock().unwrap().iter().position(|o| *o == name)
    }
}

#[async_trait]
impl SellOrderStore for MemoryStore {
    async fn latest_open_order_for_user(&self, user_id: i64) -> Result<Option<SellOrderRecord>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.user_id == user_id && o.is_open())
            .max_by_key(|o| o.created_at)
            .cloned())
    }

    async fn open_orders(&self, currency: &str) -> Result<Vec<SellOrderRecord>> {
        let mut open: Vec<SellOrderRecord> = self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.is_open() && o.currency == currency)
            .cloned()
            .collect();
        open.sort_by_key(|o| o.fifo_position);
        Ok(open)
    }

    async fn update_order_fill(
        &self,
        order_id: i64,
        new_remaining: i64,
        new_status: SellOrderStatus,
        expected_remaining: i64,
        _updated_at: i64,
    ) -> Result<bool> {
        self.op("order_fill");
        let mut orders = self.orders.lock().unwrap();
        let order = orders.iter_mut().find(|o| o.order_id == order_id);
        match order {
            Some(o) if o.remaining_quantity == expected_remaining => {
                o.remaining_quantity = new_remaining;
                o.status = new_status.as_str().to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl FundStore for MemoryStore {
    async fn fund_balance(&self, _currency: &str) -> Result<f64> {
        Ok(*self.fund.lock().unwrap())
    }

    async fn update_fund_balance(
        &self,
        _currency: &str,
        new_balance: f64,
        expected_balance: f64,
        _updated_at: i64,
    ) -> Result<bool> {
        self.op("fund_cas");
        if self.reject_fund_cas {
            return Ok(false);
        }
        let mut fund = self.fund.lock().unwrap();
        if *fund == expected_balance {
            *fund = new_balance;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn wallets_for_user(&self, user_id: i64) -> Result<Vec<WalletRecord>> {
        self.op("wallet_lookup");
        Ok(self
            .wallets
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn all_wallets(&self) -> Result<Vec<WalletRecord>> {
        Ok(self.wallets.lock().unwrap().clone())
    }

    async fn transactions_for_wallet(&self, wallet_id: i64) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .txs
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.wallet_id == wallet_id)
            .cloned()
            .collect())
    }

    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<()> {
        self.op("tx_insert");
        self.txs.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn update_balance_checked(
        &self,
        wallet_id: i64,
        new_balance: f64,
        expected_version: i64,
        _updated_at: i64,
    ) -> Result<bool> {
        self.op("wallet_cas");
        if self.reject_wallet_cas {
            return Ok(false);
        }
        let mut wallets = self.wallets.lock().unwrap();
        let wallet = wallets.iter_mut().find(|w| w.wallet_id == wallet_id);
        match wallet {
            Some(w) if w.version == expected_version => {
                w.balance = new_balance;
                w.version += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn order(id: i64, user_id: i64, pos: i32, qty: i64, value: f64) -> SellOrderRecord {
    SellOrderRecord {
        order_id: id,
        user_id,
        quantity: qty,
        remaining_quantity: qty,
        total_sell_value: value,
        fifo_position: pos,
        status: "pending".to_string(),
        currency: "GHS".to_string(),
        created_at: 1702345678000,
    }
}

fn wallet(id: i64, user_id: i64) -> WalletRecord {
    WalletRecord {
        wallet_id: id,
        user_id,
        currency: "GHS".to_string(),
        balance: 0.0,
        version: 1,
        updated_at: 1702345678000,
    }
}

fn settlement_over(store: &Arc<MemoryStore>) -> FifoSettlement {
    FifoSettlement::new(store.clone(), store.clone(), store.clone())
}

#[tokio::test]
async fn test_pass_pays_and_completes_order() {
    let store = Arc::new(MemoryStore {
        orders: Mutex::new(vec![order(1, 42, 1, 10, 1_000.0)]),
        fund: Mutex::new(1_000.0),
        wallets: Mutex::new(vec![wallet(7, 42)]),
        ..Default::default()
    });

    let stats = settlement_over(&store).run_pass("GHS").await.unwrap();

    assert_eq!(stats.orders_completed, 1);
    assert_eq!(stats.conflicts, 0);
    assert_eq!(stats.total_paid_out, 1_000.0);

    assert_eq!(*store.fund.lock().unwrap(), 0.0);

    let txs = store.txs.lock().unwrap().clone();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].wallet_id, 7);
    assert_eq!(txs[0].amount, 1_000.0);
    assert_eq!(txs[0].status, "completed");

    let wallets = store.wallets.lock().unwrap().clone();
    assert_eq!(wallets[0].balance, 1_000.0);
    assert_eq!(wallets[0].version, 2);

    let orders = store.orders.lock().unwrap().clone();
    assert_eq!(orders[0].remaining_quantity, 0);
    assert_eq!(orders[0].status, "completed");
}

#[tokio::test]
async fn test_pass_writes_in_payout_order() {
    // Per payout: wallet resolved first, fund debited, ledger row
    // inserted, balance credited, order advanced last.
    let store = Arc::new(MemoryStore {
        orders: Mutex::new(vec![order(1, 42, 1, 10, 1_000.0)]),
        fund: Mutex::new(1_000.0),
        wallets: Mutex::new(vec![wallet(7, 42)]),
        ..Default::default()
    });

    settlement_over(&store).run_pass("GHS").await.unwrap();

    let lookup = store.op_index("wallet_lookup").unwrap();
    let fund_cas = store.op_index("fund_cas").unwrap();
    let tx_insert = store.op_index("tx_insert").unwrap();
    let wallet_cas = store.op_index("wallet_cas").unwrap();
    let order_fill = store.op_index("order_fill").unwrap();

    assert!(lookup < fund_cas);
    assert!(fund_cas < tx_insert);
    assert!(tx_insert < wallet_cas);
    assert!(wallet_cas < order_fill);
}

#[tokio::test]
async fn test_fund_conflict_leaves_order_open_and_ledger_empty() {
    // The fund balance moves between the plan read and the debit (admin
    // top-up). The order must stay open with nothing written: an order
    // marked settled here would never be paid, since the next pass only
    // scans open orders.
    let store = Arc::new(MemoryStore {
        orders: Mutex::new(vec![order(1, 42, 1, 10, 1_000.0)]),
        fund: Mutex::new(1_000.0),
        wallets: Mutex::new(vec![wallet(7, 42)]),
        reject_fund_cas: true,
        ..Default::default()
    });

    let stats = settlement_over(&store).run_pass("GHS").await.unwrap();

    assert_eq!(stats.conflicts, 1);
    assert_eq!(stats.orders_completed, 0);
    assert_eq!(stats.total_paid_out, 0.0);

    let orders = store.orders.lock().unwrap().clone();
    assert_eq!(orders[0].remaining_quantity, 10);
    assert_eq!(orders[0].status, "pending");
    assert!(orders[0].is_open());

    assert!(store.txs.lock().unwrap().is_empty());
    assert!(store.op_index("order_fill").is_none());
    assert!(store.op_index("tx_insert").is_none());
}

#[tokio::test]
async fn test_missing_wallet_aborts_before_any_write() {
    // No GHS wallet for the seller: the pass must stop before the fund
    // is touched, leaving the queue exactly as it found it.
    let store = Arc::new(MemoryStore {
        orders: Mutex::new(vec![order(1, 42, 1, 10, 1_000.0)]),
        fund: Mutex::new(1_000.0),
        ..Default::default()
    });

    let stats = settlement_over(&store).run_pass("GHS").await.unwrap();

    assert_eq!(stats.orders_completed, 0);
    assert_eq!(stats.total_paid_out, 0.0);

    assert_eq!(*store.fund.lock().unwrap(), 1_000.0);
    assert!(store.txs.lock().unwrap().is_empty());
    let orders = store.orders.lock().unwrap().clone();
    assert_eq!(orders[0].remaining_quantity, 10);
    assert!(store.op_index("fund_cas").is_none());
    assert!(store.op_index("order_fill").is_none());
}

#[tokio::test]
async fn test_wallet_credit_conflict_still_records_ledger() {
    // A concurrent wallet writer loses the balance credit, but the
    // ledger row and the order fill both land; the reconciler converges
    // the stored balance from the ledger.
    let store = Arc::new(MemoryStore {
        orders: Mutex::new(vec![order(1, 42, 1, 10, 1_000.0)]),
        fund: Mutex::new(1_000.0),
        wallets: Mutex::new(vec![wallet(7, 42)]),
        reject_wallet_cas: true,
        ..Default::default()
    });

    let stats = settlement_over(&store).run_pass("GHS").await.unwrap();

    assert_eq!(stats.orders_completed, 1);
    let txs = store.txs.lock().unwrap().clone();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].amount, 1_000.0);

    let wallets = store.wallets.lock().unwrap().clone();
    assert_eq!(wallets[0].balance, 0.0);

    let orders = store.orders.lock().unwrap().clone();
    assert_eq!(orders[0].status, "completed");
}

#[tokio::test]
async fn test_tx_ids_unique_across_back_to_back_passes() {
    // Two passes inside the same millisecond must not reuse a tx_id, or
    // the second ledger insert would overwrite the first row.
    let store = Arc::new(MemoryStore {
        orders: Mutex::new(vec![
            order(1, 42, 1, 10, 1_000.0),
            order(2, 43, 2, 10, 1_000.0),
        ]),
        fund: Mutex::new(1_000.0),
        wallets: Mutex::new(vec![wallet(7, 42), wallet(8, 43)]),
        ..Default::default()
    });

    let settlement = settlement_over(&store);
    settlement.run_pass("GHS").await.unwrap();

    // Fund only covered the first order; top it up and settle the second
    *store.fund.lock().unwrap() = 1_000.0;
    settlement.run_pass("GHS").await.unwrap();

    let txs = store.txs.lock().unwrap().clone();
    assert_eq!(txs.len(), 2);
    assert!(txs[1].tx_id > txs[0].tx_id);
}
