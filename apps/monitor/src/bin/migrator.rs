//! `zmonitor-migrate`: applies the local store's schema migrations
//! without starting the monitoring core.

use clap::Parser;
use tracing::info;
use zmon_observability::{init_tracing, LogFormat};
use zmon_store::Store;

#[derive(Parser, Debug)]
#[command(name = "zmonitor-migrate", about = "Apply Z Monitor store migrations")]
struct Cli {
    #[arg(long, env = "ZMON_DB_PATH", default_value = "zmonitor.db")]
    db_path: String,

    #[arg(long, env = "ZMON_STORE_SECRET")]
    store_secret: String,

    #[arg(long, env = "ZMON_DEVICE_ID", default_value = "")]
    device_id: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing("zmonitor_migrate", LogFormat::Compact);

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(async move {
        let salt = if cli.device_id.is_empty() { cli.db_path.as_bytes() } else { cli.device_id.as_bytes() };
        let key = zmon_crypto::derive_store_key(cli.store_secret.as_bytes(), salt);

        // `Store::connect` applies every pending migration as part of
        // opening the connection; there is no separate migration step.
        Store::connect(&cli.db_path, &key).await?;
        info!(path = %cli.db_path, "store schema is up to date");
        Ok(())
    })
}
