use buyback::configure;
use buyback::db::{self, WalletDb};
use buyback::logger::setup_logger;
use buyback::reconciler::Reconciler;
use clap::Parser;
use dotenv::dotenv;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(about = "Periodic wallet balance reconciliation sweep")]
struct Args {
    /// Apply corrective CAS writes to drifted wallets (default: report only)
    #[arg(long)]
    fix: bool,

    /// Override the sweep interval from config (seconds)
    #[arg(long)]
    interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    let args = Args::parse();

    let config = configure::load_service_config("reconciliation_config")
        .unwrap_or_else(|_| configure::load_config().expect("Failed to load config"));

    setup_logger(&config).expect("Failed to setup logger");

    let scylla_config = config.scylladb.as_ref().expect("ScyllaDB config missing");
    let session = db::connect(scylla_config)
        .await
        .expect("Failed to connect to DB");

    let wallets = Arc::new(
        WalletDb::new(session)
            .await
            .expect("Failed to prepare wallet statements"),
    );
    let reconciler = Arc::new(Reconciler::new(wallets));

    let interval_secs = args.interval_secs.unwrap_or(config.scan_interval_secs);
    log::info!(
        "Reconciliation service started (every {}s, fix={})",
        interval_secs,
        args.fix
    );

    reconciler.run_scanner(interval_secs, args.fix).await;
}
