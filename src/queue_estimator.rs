// Queue position and wait-time estimation for pending share sell orders.
//
// An order's settlement delay depends on two figures read from the
// platform tables: the total sell value queued ahead of it (strict FIFO)
// and the buyback fund balance for its currency. The two reads are
// point-in-time and not mutually atomic; every snapshot carries an as-of
// timestamp so consumers can see how stale it is.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::{interval, Duration};

use crate::common_utils::get_current_timestamp_ms;
use crate::db::sell_order_db::SellOrderRecord;
use crate::db::{FundStore, SellOrderStore};

// Wait-time policy breakpoints (days). Hand-tuned business policy carried
// over unchanged from the original platform; confirm with stakeholders
// before touching.
pub const WAIT_DAYS_FUNDED: f64 = 3.0;
pub const WAIT_DAYS_PARTIAL_MAX: f64 = 7.0;
pub const WAIT_DAYS_WORST: f64 = 30.0;

/// Sum of total_sell_value over open orders strictly ahead of the given
/// FIFO position.
pub fn value_ahead(orders: &[SellOrderRecord], fifo_position: i32) -> f64 {
    orders
        .iter()
        .filter(|o| o.is_open() && o.fifo_position < fifo_position)
        .map(|o| o.total_sell_value)
        .sum()
}

/// Estimated days until settlement.
///
/// * fund empty -> 30 (checked first: with no money queued position is
///   irrelevant)
/// * fund covers everything ahead plus this order -> 3
/// * fund reaches into this order -> between 3 and 7, by coverage
/// * fund does not reach this order -> between 7 and 30, by coverage
///
/// Coverage is funds / (value_ahead + order_value). The result is always
/// within [3, 30] and never increases as funds grow.
pub fn estimate_wait_days(funds: f64, value_ahead: f64, order_value: f64) -> f64 {
    if funds <= 0.0 {
        return WAIT_DAYS_WORST;
    }

    let total_required = value_ahead + order_value;
    if funds >= total_required {
        return WAIT_DAYS_FUNDED;
    }

    let coverage = if total_required > 0.0 {
        funds / total_required
    } else {
        1.0
    };

    if funds >= value_ahead {
        // Fund reaches into this order
        WAIT_DAYS_FUNDED + (1.0 - coverage) * (WAIT_DAYS_PARTIAL_MAX - WAIT_DAYS_FUNDED)
    } else {
        // Fund exhausted before this order
        WAIT_DAYS_PARTIAL_MAX + (1.0 - coverage) * (WAIT_DAYS_WORST - WAIT_DAYS_PARTIAL_MAX)
    }
}

/// Point-in-time queue status for one user's active sell order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub order_id: i64,
    pub fifo_position: i32,
    pub quantity: i64,
    pub filled_quantity: i64,
    pub remaining_quantity: i64,
    pub total_sell_value: f64,
    pub currency: String,
    pub value_ahead: f64,
    pub buyback_funds: f64,
    pub estimated_wait_days: f64,
    /// Epoch millis at which the reads were taken.
    pub as_of: i64,
}

/// Authoritative queue status reader. All consumers go through this
/// instead of re-fetching and re-deriving per screen.
pub struct QueueStatusService {
    orders: Arc<dyn SellOrderStore>,
    funds: Arc<dyn FundStore>,
}

impl QueueStatusService {
    pub fn new(orders: Arc<dyn SellOrderStore>, funds: Arc<dyn FundStore>) -> Self {
        Self { orders, funds }
    }

    /// Queue status for a user's most recent open order. None means "no
    /// active order", a valid terminal display state.
    pub async fn snapshot_for_user(&self, user_id: i64) -> Result<Option<QueueSnapshot>> {
        let order = match self.orders.latest_open_order_for_user(user_id).await? {
            Some(order) => order,
            None => return Ok(None),
        };

        let open_orders = self.orders.open_orders(&order.currency).await?;
        let funds = self.funds.fund_balance(&order.currency).await?;

        let ahead = value_ahead(&open_orders, order.fifo_position);
        let wait = estimate_wait_days(funds, ahead, order.total_sell_value);

        Ok(Some(QueueSnapshot {
            order_id: order.order_id,
            fifo_position: order.fifo_position,
            quantity: order.quantity,
            filled_quantity: order.filled_quantity(),
            remaining_quantity: order.remaining_quantity,
            total_sell_value: order.total_sell_value,
            currency: order.currency.clone(),
            value_ahead: ahead,
            buyback_funds: funds,
            estimated_wait_days: wait,
            as_of: get_current_timestamp_ms(),
        }))
    }

    /// Aggregate queue health for a currency: open order count, queued
    /// value and fund coverage.
    pub async fn queue_depth(&self, currency: &str) -> Result<(usize, f64, f64)> {
        let open_orders = self.orders.open_orders(currency).await?;
        let queued_value: f64 = open_orders.iter().map(|o| o.remaining_value()).sum();
        let funds = self.funds.fund_balance(currency).await?;
        Ok((open_orders.len(), queued_value, funds))
    }

    /// Run continuous queue polling (for background task). Replaces the
    /// per-component 30-second refresh the frontend used to do.
    pub async fn run_poller(self: Arc<Self>, currency: String, poll_interval_secs: u64) {
        let mut ticker = interval(Duration::from_secs(poll_interval_secs));

        loop {
            ticker.tick().await;

            match self.queue_depth(&currency).await {
                Ok((count, queued_value, funds)) => {
                    let coverage = if queued_value > 0.0 {
                        funds / queued_value
                    } else {
                        1.0
                    };
                    log::info!(
                        "Queue [{}]: {} open orders, {:.2} queued, {:.2} in fund (coverage {:.0}%)",
                        currency,
                        count,
                        queued_value,
                        funds,
                        coverage * 100.0
                    );
                }
                Err(e) => log::error!("Queue poll failed for {}: {}", currency, e),
            }
        }
    }
}
