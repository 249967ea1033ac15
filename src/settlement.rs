// FIFO buyback settlement.
//
// Walks open sell orders in ascending FIFO position and pays them out of
// the buyback fund. Strict FIFO: when the fund cannot cover even one
// share of the next order, the pass stops there rather than skipping
// ahead to a cheaper order.
//
// Per payout the writes land in this order: resolve the seller wallet,
// debit the fund, insert the settled ledger transaction, credit the
// stored balance, advance the order. Money moves before the order is
// marked, so an abort mid-sequence leaves the order open for the next
// pass rather than settled without a payout; and the ledger row lands
// before the balance CAS, so a lost balance update leaves the ledger
// authoritative and the reconciler repairs the stored balance.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::time::{interval, Duration};

use crate::common_utils::get_current_timestamp_ms;
use crate::db::sell_order_db::SellOrderRecord;
use crate::db::wallet_db::TransactionRecord;
use crate::db::{FundStore, SellOrderStore, WalletStore};
use crate::models::{SellOrderStatus, TransactionStatus};

/// One planned payout against a sell order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedPayout {
    pub order_id: i64,
    pub user_id: i64,
    pub currency: String,
    pub settle_quantity: i64,
    pub payout_amount: f64,
    pub expected_remaining: i64,
    pub new_remaining: i64,
    pub new_status: SellOrderStatus,
}

/// Result of planning one settlement pass. Pure computation over a
/// snapshot; executing it is a separate step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementPlan {
    pub payouts: Vec<PlannedPayout>,
    pub fund_before: f64,
    pub fund_after: f64,
    /// True when the fund ran out before the queue was cleared.
    pub stopped_short: bool,
}

/// Plan payouts for the given open orders (ascending FIFO order) from the
/// available fund balance. Only whole shares settle.
pub fn plan_settlement(orders: &[SellOrderRecord], fund_balance: f64) -> SettlementPlan {
    let mut plan = SettlementPlan {
        payouts: Vec::new(),
        fund_before: fund_balance,
        fund_after: fund_balance,
        stopped_short: false,
    };

    let mut queue: Vec<&SellOrderRecord> = orders.iter().filter(|o| o.is_open()).collect();
    queue.sort_by_key(|o| o.fifo_position);

    for order in queue {
        let price = order.price_per_share();
        if price <= 0.0 || order.remaining_quantity <= 0 {
            // Malformed row; nothing to pay out
            continue;
        }

        let affordable = (plan.fund_after / price).floor() as i64;
        if affordable == 0 {
            plan.stopped_short = true;
            break;
        }

        let settle_quantity = affordable.min(order.remaining_quantity);
        let payout_amount = settle_quantity as f64 * price;
        let new_remaining = order.remaining_quantity - settle_quantity;

        plan.fund_after -= payout_amount;
        plan.payouts.push(PlannedPayout {
            order_id: order.order_id,
            user_id: order.user_id,
            currency: order.currency.clone(),
            settle_quantity,
            payout_amount,
            expected_remaining: order.remaining_quantity,
            new_remaining,
            new_status: if new_remaining == 0 {
                SellOrderStatus::Completed
            } else {
                SellOrderStatus::Partial
            },
        });

        if new_remaining > 0 {
            // Fund exhausted inside this order
            plan.stopped_short = true;
            break;
        }
    }

    plan
}

/// 64-bit ledger transaction id: 48 bits of milliseconds, 16-bit counter.
/// Same millisecond (or clock regression) increments instead.
struct TxIdGen {
    last_val: u64,
}

impl TxIdGen {
    fn new() -> Self {
        Self { last_val: 0 }
    }

    fn generate(&mut self) -> i64 {
        let now = get_current_timestamp_ms() as u64;
        let ts_part = now << 16;

        if ts_part > self.last_val {
            self.last_val = ts_part;
        } else {
            self.last_val = self.last_val.wrapping_add(1);
        }
        self.last_val as i64
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SettlementStats {
    pub orders_completed: u64,
    pub orders_partially_filled: u64,
    pub total_paid_out: f64,
    pub conflicts: u64,
}

pub struct FifoSettlement {
    orders: Arc<dyn SellOrderStore>,
    funds: Arc<dyn FundStore>,
    wallets: Arc<dyn WalletStore>,
    /// One generator for the service lifetime; per-pass generators could
    /// restart the counter inside the same millisecond and mint a
    /// colliding tx_id across back-to-back passes.
    id_gen: Mutex<TxIdGen>,
}

impl FifoSettlement {
    pub fn new(
        orders: Arc<dyn SellOrderStore>,
        funds: Arc<dyn FundStore>,
        wallets: Arc<dyn WalletStore>,
    ) -> Self {
        Self {
            orders,
            funds,
            wallets,
            id_gen: Mutex::new(TxIdGen::new()),
        }
    }

    /// One settlement pass for a currency. Reads a snapshot, plans, then
    /// applies payouts one at a time with CAS guards; any conflict aborts
    /// the rest of the pass and the next tick re-plans from fresh reads.
    pub async fn run_pass(&self, currency: &str) -> Result<SettlementStats> {
        let mut stats = SettlementStats::default();

        let fund_balance = self.funds.fund_balance(currency).await?;
        if fund_balance <= 0.0 {
            log::info!("Buyback fund [{}] is empty, nothing to settle", currency);
            return Ok(stats);
        }

        let open_orders = self.orders.open_orders(currency).await?;
        let plan = plan_settlement(&open_orders, fund_balance);
        if plan.payouts.is_empty() {
            if plan.stopped_short {
                log::info!(
                    "Fund [{}] ({:.2}) cannot cover one share of the next order, holding",
                    currency,
                    fund_balance
                );
            }
            return Ok(stats);
        }

        let mut fund_cursor = plan.fund_before;

        for payout in &plan.payouts {
            // 1. Resolve the seller wallet before anything is written. A
            // payout with nowhere to land aborts the pass here, fund
            // untouched and order still open.
            let wallets = self.wallets.wallets_for_user(payout.user_id).await?;
            let wallet = match wallets.into_iter().find(|w| w.currency == payout.currency) {
                Some(w) => w,
                None => {
                    log::error!(
                        "User {} has no {} wallet to receive the payout of order {}, aborting pass",
                        payout.user_id,
                        payout.currency,
                        payout.order_id
                    );
                    return Ok(stats);
                }
            };

            // 2. Debit the fund under CAS on the balance we read
            let new_fund = fund_cursor - payout.payout_amount;
            let applied = self
                .funds
                .update_fund_balance(
                    currency,
                    new_fund,
                    fund_cursor,
                    get_current_timestamp_ms(),
                )
                .await?;
            if !applied {
                log::error!(
                    "Fund [{}] changed since planning (expected {:.2}), aborting pass",
                    currency,
                    fund_cursor
                );
                stats.conflicts += 1;
                return Ok(stats);
            }
            fund_cursor = new_fund;

            // 3. Record the payout in the ledger
            let tx = TransactionRecord {
                tx_id: self.next_tx_id(),
                wallet_id: wallet.wallet_id,
                user_id: payout.user_id,
                amount: payout.payout_amount,
                status: TransactionStatus::Completed.as_str().to_string(),
                currency: payout.currency.clone(),
                created_at: get_current_timestamp_ms(),
            };
            self.wallets.insert_transaction(&tx).await?;

            // 4. Credit the stored balance. On conflict the ledger row
            // already holds the payout and the reconciler converges the
            // stored balance on its next sweep.
            let applied = self
                .wallets
                .update_balance_checked(
                    wallet.wallet_id,
                    wallet.balance + payout.payout_amount,
                    wallet.version,
                    get_current_timestamp_ms(),
                )
                .await?;
            if !applied {
                log::warn!(
                    "Wallet {} version moved during payout credit, leaving to reconciler",
                    wallet.wallet_id
                );
            }

            // 5. Advance the order, after the money has moved. An order
            // must never read as settled while no payout exists for it.
            let applied = self
                .orders
                .update_order_fill(
                    payout.order_id,
                    payout.new_remaining,
                    payout.new_status,
                    payout.expected_remaining,
                    get_current_timestamp_ms(),
                )
                .await?;
            if !applied {
                log::error!(
                    "Order {} changed after its payout was recorded (tx {}), aborting pass; review the order before it settles again",
                    payout.order_id,
                    tx.tx_id
                );
                stats.conflicts += 1;
                return Ok(stats);
            }

            stats.total_paid_out += payout.payout_amount;
            match payout.new_status {
                SellOrderStatus::Completed => stats.orders_completed += 1,
                _ => stats.orders_partially_filled += 1,
            }

            log::info!(
                "Settled {} shares of order {} for {:.2} {} (status {})",
                payout.settle_quantity,
                payout.order_id,
                payout.payout_amount,
                payout.currency,
                payout.new_status.as_str()
            );
        }

        Ok(stats)
    }

    fn next_tx_id(&self) -> i64 {
        self.id_gen.lock().unwrap_or_else(|e| e.into_inner()).generate()
    }

    /// Run periodic settlement passes (for background task).
    pub async fn run_scanner(self: Arc<Self>, currency: String, scan_interval_secs: u64) {
        let mut ticker = interval(Duration::from_secs(scan_interval_secs));

        loop {
            ticker.tick().await;

            match self.run_pass(&currency).await {
                Ok(stats) => {
                    if stats.total_paid_out > 0.0 {
                        log::info!(
                            "Settlement pass [{}]: {} completed, {} partial, {:.2} paid out",
                            currency,
                            stats.orders_completed,
                            stats.orders_partially_filled,
                            stats.total_paid_out
                        );
                    }
                }
                Err(e) => log::error!("Settlement pass failed for {}: {}", currency, e),
            }
        }
    }
}
