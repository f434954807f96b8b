//! `zmonitor`: the bedside monitoring core binary.

use std::fs;

use clap::Parser;
use tokio::sync::mpsc;
use zmon_config::Settings;
use zmon_crypto::{KeyHandle, RevocationList};
use zmon_journal::{Actor, Journal};
use zmon_models::{ActionKind, ActionOutcome, CertificateStatus};
use zmon_observability::{install_panic_hook, PanicReport};
use zmon_store::{ActionLogRepository, CertificatesRepository, Store};
use zmon_transport::TransportConfig;
use zmonitor_core::state::bridge_log_format;
use zmonitor_core::{AppState, Orchestrator, ShutdownSignal};

const CERT_EXPIRY_WARNING_DAYS: i64 = 30;
const CERT_EXPIRY_ERROR_DAYS: i64 = 7;

#[derive(Parser, Debug)]
#[command(name = "zmonitor", about = "Z Monitor bedside monitoring core")]
struct Cli {
    /// Path to a TOML file seeding the persisted settings row on first
    /// boot; ignored if the settings table already has a row.
    #[arg(long, env = "ZMON_SETTINGS_TOML")]
    settings_toml: Option<String>,

    /// Local encrypted store path, or `:memory:` for ephemeral runs.
    #[arg(long, env = "ZMON_DB_PATH", default_value = "zmonitor.db")]
    db_path: String,

    /// Passphrase the store's AES-256 encryption key is derived from.
    #[arg(long, env = "ZMON_STORE_SECRET")]
    store_secret: String,

    /// Control-socket path for the sensor ring handshake.
    #[arg(long, env = "ZMON_SENSOR_SOCKET", default_value = "/run/zmonitor/sensor.sock")]
    sensor_socket: String,

    /// Device ECDSA-P256 signing key, PKCS8 PEM.
    #[arg(long, env = "ZMON_DEVICE_KEY_PATH")]
    device_key_path: String,

    /// Device mTLS client certificate, PEM.
    #[arg(long, env = "ZMON_DEVICE_CERT_PATH")]
    device_cert_path: String,

    /// Trust anchor for the central dispatch server's certificate, PEM.
    #[arg(long, env = "ZMON_TRUST_ANCHOR_PATH")]
    trust_anchor_path: String,

    /// Central dispatch server address, `host:port`.
    #[arg(long, env = "ZMON_SERVER_ADDR")]
    server_addr: String,

    /// Expected hostname in the server's certificate, if it differs from
    /// the connection host in `server_addr`.
    #[arg(long, env = "ZMON_SERVER_NAME")]
    server_name: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.settings_toml {
        Some(path) => Settings::from_toml_str(&fs::read_to_string(path)?)?,
        None => Settings::default(),
    };
    if settings.device_id.is_empty() {
        settings.device_id = uuid::Uuid::new_v4().to_string();
    }
    settings.validate()?;

    zmon_observability::init_tracing("zmonitor", bridge_log_format(settings.log_format));

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(async_main(cli, settings))
}

async fn async_main(cli: Cli, settings: Settings) -> anyhow::Result<()> {
    let store_salt = settings.device_id.as_bytes();
    let encryption_key = zmon_crypto::derive_store_key(cli.store_secret.as_bytes(), store_salt);
    let store = Store::connect(&cli.db_path, &encryption_key).await?;

    install_forensic_panic_hook(store.clone());

    let device_key_pem = fs::read_to_string(&cli.device_key_path)?;
    let signing_key = KeyHandle::from_pkcs8_pem(&device_key_pem)?;

    let device_cert_pem = fs::read_to_string(&cli.device_cert_path)?;
    let trust_anchor_pem = fs::read_to_string(&cli.trust_anchor_path)?;

    let now_ms = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0);
    let cert_journal = Journal::new(ActionLogRepository::new(store.clone()));
    // No CRL source is wired up yet; an empty list means revocation checks
    // always pass. Expiry and chain/subject checks still run regardless.
    let revocation = RevocationList::default();
    let cert_record = match zmon_crypto::validate_certificate(&device_cert_pem, &trust_anchor_pem, &revocation, &settings.device_id, now_ms) {
        Ok(record) => record,
        Err(e) => {
            let _ = cert_journal
                .append(
                    ActionKind::SystemEvent("CERTIFICATE_REJECTED".into()),
                    "certificate",
                    &cli.device_cert_path,
                    serde_json::json!({"reason": e.to_string()}),
                    ActionOutcome::Failure,
                    &settings.device_id,
                    Actor::default(),
                )
                .await;
            anyhow::bail!("device certificate failed validation, refusing to start network context: {e}");
        }
    };

    CertificatesRepository::new(store.clone()).upsert(&cert_record).await?;
    if cert_record.status == CertificateStatus::Expiring {
        let remaining_days = (cert_record.not_after_ms.saturating_sub(now_ms) / 1_000 / 86_400) as i64;
        let (event, outcome) = if remaining_days <= CERT_EXPIRY_ERROR_DAYS {
            ("CERTIFICATE_EXPIRY_ERROR", ActionOutcome::Failure)
        } else {
            debug_assert!(remaining_days <= CERT_EXPIRY_WARNING_DAYS);
            ("CERTIFICATE_EXPIRY_WARNING", ActionOutcome::Success)
        };
        tracing::warn!(remaining_days, serial = %cert_record.serial, "device certificate nearing expiry");
        let _ = cert_journal
            .append(
                ActionKind::SystemEvent(event.into()),
                "certificate",
                &cert_record.serial,
                serde_json::json!({"remaining_days": remaining_days}),
                outcome,
                &settings.device_id,
                Actor::default(),
            )
            .await;
    }

    let tls_config = zmon_transport::build_client_config(device_cert_pem.as_bytes(), device_key_pem.as_bytes(), trust_anchor_pem.as_bytes())?;

    let thresholds = zmon_alarm_engine::ThresholdResolver::new();
    let state = AppState::new(settings, store, signing_key, thresholds, tls_config).await;

    let server_hostname = cli.server_name.as_deref().unwrap_or_else(|| {
        cli.server_addr.rsplit_once(':').map_or(cli.server_addr.as_str(), |(host, _)| host)
    });
    let transport_config = TransportConfig {
        server_addr: cli.server_addr.clone(),
        server_name: zmon_transport::server_name(server_hostname)?,
        wire_mode: zmon_transport::WireMode::Json,
        connect_timeout: std::time::Duration::from_secs(10),
        operation_timeout: std::time::Duration::from_secs(30),
    };

    tracing::info!(device_id = %state.device.device_id, "zmonitor starting");
    let orchestrator = Orchestrator::spawn(state, cli.sensor_socket, transport_config);

    let process_shutdown = ShutdownSignal::new();
    let ctrl_c_shutdown = process_shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("shutdown requested, signaling contexts in reverse order");
            ctrl_c_shutdown.trigger();
        }
    });

    process_shutdown.wait().await;
    orchestrator.shutdown();
    Ok(())
}

/// Forwards panic reports from any thread to the action journal before
/// the default panic hook runs. The hook itself must not
/// block, so the write happens on a detached background thread with its
/// own tiny runtime.
fn install_forensic_panic_hook(store: Store) {
    let (tx, mut rx) = mpsc::unbounded_channel::<PanicReport>();

    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(_) => return,
        };
        runtime.block_on(async move {
            let journal = Journal::new(ActionLogRepository::new(store));
            while let Some(report) = rx.recv().await {
                let details = serde_json::json!({
                    "thread": report.thread_name,
                    "location": report.location,
                    "message": report.message,
                });
                let _ = journal
                    .append(
                        ActionKind::SystemEvent("PANIC".into()),
                        "process",
                        &report.thread_name,
                        details,
                        ActionOutcome::Failure,
                        "unknown",
                        Actor::default(),
                    )
                    .await;
            }
        });
    });

    install_panic_hook(move |report| {
        let _ = tx.send(report);
    });
}
