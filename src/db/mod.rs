use anyhow::{Context, Result};
use scylla::{Session, SessionBuilder};
use std::sync::Arc;

use crate::configure::ScyllaDbConfig;

pub mod buyback_fund_db;
pub mod sell_order_db;
pub mod stores;
pub mod wallet_db;

pub use buyback_fund_db::BuybackFundDb;
pub use sell_order_db::SellOrderDb;
pub use stores::{FundStore, SellOrderStore, WalletStore};
pub use wallet_db::WalletDb;

/// Connect to ScyllaDB and switch to the platform keyspace.
///
/// The returned session is shared by all repositories.
pub async fn connect(config: &ScyllaDbConfig) -> Result<Arc<Session>> {
    let session: Session = SessionBuilder::new()
        .known_nodes(&config.hosts)
        .connection_timeout(std::time::Duration::from_millis(config.connection_timeout_ms))
        .build()
        .await
        .context("Failed to connect to ScyllaDB")?;

    session
        .query(format!("USE {}", config.keyspace), &[])
        .await
        .context("Failed to use platform keyspace")?;

    Ok(Arc::new(session))
}
