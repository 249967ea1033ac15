use buyback::configure;
use buyback::db::{self, BuybackFundDb, SellOrderDb};
use buyback::logger::setup_logger;
use buyback::queue_estimator::QueueStatusService;
use clap::Parser;
use dotenv::dotenv;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(about = "Background poller for sell order queue status")]
struct Args {
    /// Currency whose queue to poll
    #[arg(long, default_value = "GHS")]
    currency: String,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    let args = Args::parse();

    let config = configure::load_service_config("queue_status_config")
        .unwrap_or_else(|_| configure::load_config().expect("Failed to load config"));

    setup_logger(&config).expect("Failed to setup logger");

    let scylla_config = config.scylladb.as_ref().expect("ScyllaDB config missing");
    let session = db::connect(scylla_config)
        .await
        .expect("Failed to connect to DB");

    let orders = Arc::new(SellOrderDb::new(session.clone()));
    let funds = Arc::new(BuybackFundDb::new(session));
    let service = Arc::new(QueueStatusService::new(orders, funds));

    log::info!(
        "Queue status poller started for {} (every {}s)",
        args.currency,
        config.queue_poll_interval_secs
    );

    service
        .run_poller(args.currency, config.queue_poll_interval_secs)
        .await;
}
