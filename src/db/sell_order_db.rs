use anyhow::{Context, Result};
use scylla::{FromRow, Session};
use std::sync::Arc;

use crate::models::SellOrderStatus;

/// Sell order row from share_sell_orders
#[derive(Debug, Clone, FromRow)]
pub struct SellOrderRecord {
    pub order_id: i64,
    pub user_id: i64,
    pub quantity: i64,
    pub remaining_quantity: i64,
    pub total_sell_value: f64,
    pub fifo_position: i32,
    pub status: String,
    pub currency: String,
    pub created_at: i64,
}

impl SellOrderRecord {
    pub fn status(&self) -> Option<SellOrderStatus> {
        SellOrderStatus::from_str(&self.status)
    }

    pub fn is_open(&self) -> bool {
        self.status().map(|s| s.is_open()).unwrap_or(false)
    }

    pub fn filled_quantity(&self) -> i64 {
        self.quantity - self.remaining_quantity
    }

    /// Per-share price implied by the order. Zero-quantity orders should
    /// not exist, but a malformed row must not divide by zero.
    pub fn price_per_share(&self) -> f64 {
        if self.quantity <= 0 {
            return 0.0;
        }
        self.total_sell_value / self.quantity as f64
    }

    /// Value of the still-unsettled part of the order.
    pub fn remaining_value(&self) -> f64 {
        self.price_per_share() * self.remaining_quantity as f64
    }
}

// CQL Statements
const SELECT_ORDERS_BY_USER_CQL: &str = "
    SELECT order_id, user_id, quantity, remaining_quantity,
           total_sell_value, fifo_position, status, currency, created_at
    FROM share_sell_orders
    WHERE user_id = ?
    ALLOW FILTERING
";

const SELECT_OPEN_ORDERS_CQL: &str = "
    SELECT order_id, user_id, quantity, remaining_quantity,
           total_sell_value, fifo_position, status, currency, created_at
    FROM share_sell_orders
    WHERE status IN ('pending', 'partial') AND currency = ?
    ALLOW FILTERING
";

const UPDATE_ORDER_FILL_CQL: &str = "
    UPDATE share_sell_orders
    SET remaining_quantity = ?, status = ?, updated_at = ?
    WHERE order_id = ?
    IF remaining_quantity = ?
";

/// DB operations for share sell orders
pub struct SellOrderDb {
    session: Arc<Session>,
}

impl SellOrderDb {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Most recent open order for a user, if any. The frontend only ever
    /// shows one active order per user, most-recent-first.
    pub async fn latest_open_order_for_user(
        &self,
        user_id: i64,
    ) -> Result<Option<SellOrderRecord>> {
        let result = self
            .session
            .query(SELECT_ORDERS_BY_USER_CQL, (user_id,))
            .await
            .context("Failed to query sell orders by user")?;

        let mut latest: Option<SellOrderRecord> = None;
        if let Some(rows) = result.rows {
            for row in rows {
                let record: SellOrderRecord =
                    row.into_typed().context("Failed to parse sell order row")?;
                if !record.is_open() {
                    continue;
                }
                match &latest {
                    Some(cur) if cur.created_at >= record.created_at => {}
                    _ => latest = Some(record),
                }
            }
        }

        Ok(latest)
    }

    /// All open orders for a currency, sorted ascending by FIFO position.
    pub async fn open_orders(&self, currency: &str) -> Result<Vec<SellOrderRecord>> {
        let result = self
            .session
            .query(SELECT_OPEN_ORDERS_CQL, (currency,))
            .await
            .context("Failed to query open sell orders")?;

        let mut orders = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                let record: SellOrderRecord =
                    row.into_typed().context("Failed to parse sell order row")?;
                orders.push(record);
            }
        }
        orders.sort_by_key(|o| o.fifo_position);

        Ok(orders)
    }

    /// Conditional fill update: only applies if remaining_quantity is still
    /// what the caller read. Returns false on conflict.
    pub async fn update_order_fill(
        &self,
        order_id: i64,
        new_remaining: i64,
        new_status: SellOrderStatus,
        expected_remaining: i64,
        updated_at: i64,
    ) -> Result<bool> {
        let result = self
            .session
            .query(
                UPDATE_ORDER_FILL_CQL,
                (
                    new_remaining,
                    new_status.as_str(),
                    updated_at,
                    order_id,
                    expected_remaining,
                ),
            )
            .await
            .context("Failed to update sell order fill")?;

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

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> SellOrderRecord {
        SellOrderRecord {
            order_id: 9001,
            user_id: 42,
            quantity: 200,
            remaining_quantity: 150,
            total_sell_value: 100_000.0,
            fifo_position: 7,
            status: "partial".to_string(),
            currency: "GHS".to_string(),
            created_at: 1702345678000,
        }
    }

    #[test]
    fn test_derived_order_figures() {
        let order = sample_order();
        assert!(order.is_open());
        assert_eq!(order.filled_quantity(), 50);
        assert_eq!(order.price_per_share(), 500.0);
        assert_eq!(order.remaining_value(), 75_000.0);
    }

    #[test]
    fn test_zero_quantity_row_is_harmless() {
        let mut order = sample_order();
        order.quantity = 0;
        order.remaining_quantity = 0;
        assert_eq!(order.price_per_share(), 0.0);
        assert_eq!(order.remaining_value(), 0.0);
    }
}
