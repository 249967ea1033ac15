use serde::{Deserialize, Serialize};

/// Sell order lifecycle status.
///
/// `pending` and `partial` orders are open: they hold a place in the
/// buyback queue and count toward the value queued ahead of later orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SellOrderStatus {
    Pending,
    Partial,
    Completed,
    Cancelled,
}

impl SellOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Partial => "partial",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "partial" => Some(Self::Partial),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Partial)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Ledger transaction status.
///
/// Canonical settled set is {completed, approved}: only those entries
/// count toward a wallet's calculated balance. Legacy call sites also
/// accepted "success"; that spelling is not a recognized status here and
/// parses to None, so such rows are skipped rather than miscounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Approved,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Approved => "approved",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "approved" => Some(Self::Approved),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Money has moved; the amount is part of the wallet's real balance.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Completed | Self::Approved)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Approved | Self::Failed)
    }
}
