use buyback::configure;
use buyback::db::{self, BuybackFundDb, SellOrderDb, WalletDb};
use buyback::logger::setup_logger;
use buyback::settlement::FifoSettlement;
use clap::Parser;
use dotenv::dotenv;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(about = "Periodic FIFO buyback settlement passes")]
struct Args {
    /// Currency whose queue to settle
    #[arg(long, default_value = "GHS")]
    currency: String,

    /// Run exactly one pass and exit (for manual admin runs)
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    let args = Args::parse();

    let config = configure::load_service_config("settlement_config")
        .unwrap_or_else(|_| configure::load_config().expect("Failed to load config"));

    setup_logger(&config).expect("Failed to setup logger");

    let scylla_config = config.scylladb.as_ref().expect("ScyllaDB config missing");
    let session = db::connect(scylla_config)
        .await
        .expect("Failed to connect to DB");

    let orders = Arc::new(SellOrderDb::new(session.clone()));
    let funds = Arc::new(BuybackFundDb::new(session.clone()));
    let wallets = Arc::new(
        WalletDb::new(session)
            .await
            .expect("Failed to prepare wallet statements"),
    );
    let settlement = Arc::new(FifoSettlement::new(orders, funds, wallets));

    if args.once {
        match settlement.run_pass(&args.currency).await {
            Ok(stats) => log::info!(
                "Settlement pass done: {} completed, {} partial, {:.2} paid out",
                stats.orders_completed,
                stats.orders_partially_filled,
                stats.total_paid_out
            ),
            Err(e) => {
                log::error!("Settlement pass failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    log::info!(
        "Settlement service started for {} (every {}s)",
        args.currency,
        config.scan_interval_secs
    );

    settlement
        .run_scanner(args.currency, config.scan_interval_secs)
        .await;
}
