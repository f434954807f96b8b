//! Delivery loop: dequeue sealed batches, transmit over a
//! persistent mTLS connection, reconcile server acknowledgements, retry
//! failed batches with capped exponential backoff, dead-letter after the
//! retry budget is exhausted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_rustls::{client::TlsStream, TlsConnector};
use tracing::{error, warn};

use zmon_journal::{Actor, Journal};
use zmon_models::{ActionKind, ActionOutcome, ErrorKind, TelemetryBatch, TelemetryStatus};
use zmon_telemetry_batcher::OutboundQueue;

use crate::codec::{BatchContainer, ServerAck, WireMode};
use crate::error::TransportError;

const MAX_RETRY_COUNT: u32 = 10;
const BASE_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const JITTER_FRACTION: f64 = 0.2;
/// Length prefix for the framed JSON/protobuf payload on the wire.
const FRAME_LEN_BYTES: usize = 4;

/// Outbound signals to the operator display and central dispatch.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Acknowledged { batch_id: String },
    Failed { batch_id: String },
}

async fn wait_for_flag(flag: &AtomicBool) {
    while !flag.load(Ordering::Acquire) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

pub fn backoff_duration(retry_count: u32) -> Duration {
    let exp = retry_count.saturating_sub(1).min(6);
    let base = BASE_BACKOFF.as_secs_f64() * 2f64.powi(exp as i32);
    let capped = base.min(MAX_BACKOFF.as_secs_f64());
    let jitter = rand::thread_rng().gen_range(-JITTER_FRACTION..=JITTER_FRACTION);
    let jittered = (capped * (1.0 + jitter)).max(0.0);
    Duration::from_secs_f64(jittered)
}

pub struct TransportConfig {
    pub server_addr: String,
    pub server_name: ServerName<'static>,
    pub wire_mode: WireMode,
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
}

pub struct DeliveryLoop {
    connector: TlsConnector,
    config: TransportConfig,
    queue: Arc<OutboundQueue>,
    journal: Journal,
    events: mpsc::UnboundedSender<TransportEvent>,
    /// Persistent connection, reused across batches and torn down only
    /// when a send or read on it fails.
    conn: Mutex<Option<TlsStream<TcpStream>>>,
}

impl DeliveryLoop {
    #[must_use]
    pub fn new(
        connector: TlsConnector,
        config: TransportConfig,
        queue: Arc<OutboundQueue>,
        journal: Journal,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self { connector, config, queue, journal, events, conn: Mutex::new(None) }
    }

    /// Runs until `shutdown` is set. The outbound queue is deliberately
    /// not drained on shutdown; this just stops dequeuing, leaving
    /// whatever is pending in the queue for the next boot.
    pub async fn run(&self, shutdown: Arc<AtomicBool>) {
        loop {
            let mut batch = tokio::select! {
                batch = self.queue.pop() => batch,
                _ = wait_for_flag(&shutdown) => return,
            };
            match self.deliver(&batch).await {
                Ok(()) => {
                    batch.status = TelemetryStatus::Acknowledged;
                    let _ = self.events.send(TransportEvent::Acknowledged { batch_id: batch.id.clone() });
                }
                Err(e) => {
                    batch.retry_count += 1;
                    warn!(batch_id = %batch.id, retry_count = batch.retry_count, error = %e, "batch delivery failed");
                    if batch.retry_count >= MAX_RETRY_COUNT {
                        batch.status = TelemetryStatus::Failed;
                        self.dead_letter(&batch).await;
                        let _ = self.events.send(TransportEvent::Failed { batch_id: batch.id.clone() });
                    } else {
                        let delay = backoff_duration(batch.retry_count);
                        let queue = Arc::clone(&self.queue);
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            queue.push(batch).await;
                        });
                    }
                }
            }
        }
    }

    /// Sends `batch` over the persistent connection, establishing one
    /// first if none is currently open. A failure at any point drops the
    /// held connection so the next delivery attempt reconnects from
    /// scratch rather than retrying on a stream already known to be bad.
    async fn deliver(&self, batch: &TelemetryBatch) -> Result<(), TransportError> {
        let container = BatchContainer::from_batch(batch);
        let mut guard = self.conn.lock().await;

        if guard.is_none() {
            let stream = tokio::time::timeout(self.config.connect_timeout, self.connect())
                .await
                .map_err(|_| TransportError::Timeout(self.config.connect_timeout))??;
            *guard = Some(stream);
        }

        let stream = guard.as_mut().expect("connection populated above");
        let result = match tokio::time::timeout(self.config.operation_timeout, self.send_and_await_ack(stream, &container)).await {
            Ok(inner) => inner,
            Err(_) => Err(TransportError::Timeout(self.config.operation_timeout)),
        };

        if result.is_err() {
            *guard = None;
        }
        result
    }

    async fn connect(&self) -> Result<TlsStream<TcpStream>, TransportError> {
        let tcp = TcpStream::connect(&self.config.server_addr)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        self.connector
            .connect(self.config.server_name.clone(), tcp)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))
    }

    async fn send_and_await_ack(
        &self,
        stream: &mut TlsStream<TcpStream>,
        container: &BatchContainer,
    ) -> Result<(), TransportError> {
        let payload = container.encode(self.config.wire_mode)?;
        write_frame(stream, &payload).await?;

        let response = read_frame(stream).await?;
        let ack = ServerAck::decode(&response)?;

        if !ack.is_success() {
            return Err(TransportError::ServerRejected(ack.status));
        }
        if !ack.acknowledged_ids.iter().any(|id| id == &container.payload.id) {
            return Err(TransportError::ServerRejected(format!(
                "server ack omitted batch {}",
                container.payload.id
            )));
        }
        Ok(())
    }

    async fn dead_letter(&self, batch: &TelemetryBatch) {
        let details = serde_json::json!({
            "batch_id": batch.id,
            "retry_count": batch.retry_count,
            "reason": "retry budget exhausted",
        });
        if let Err(e) = self
            .journal
            .append(
                ActionKind::SystemEvent("TELEMETRY_DEAD_LETTER".into()),
                "telemetry_batch",
                &batch.id,
                details,
                ActionOutcome::Failure,
                &batch.device_id,
                Actor::default(),
            )
            .await
        {
            error!(batch_id = %batch.id, error = %e, "failed to write dead-letter audit entry");
        }
    }
}

async fn write_frame<W: AsyncWriteExt + Unpin>(stream: &mut W, payload: &[u8]) -> Result<(), TransportError> {
    let len = u32::try_from(payload.len())
        .map_err(|_| TransportError::Connection("payload too large to frame".into()))?;
    stream
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| TransportError::Connection(e.to_string()))?;
    stream
        .write_all(payload)
        .await
        .map_err(|e| TransportError::Connection(e.to_string()))
}

async fn read_frame<R: AsyncReadExt + Unpin>(stream: &mut R) -> Result<Vec<u8>, TransportError> {
    let mut len_buf = [0u8; FRAME_LEN_BYTES];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| TransportError::Connection(e.to_string()))?;
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(|e| TransportError::Connection(e.to_string()))?;
    Ok(buf)
}

/// Maps a `TransportError` to the shared error taxonomy.
#[must_use]
pub fn error_kind(e: &TransportError) -> ErrorKind {
    e.kind()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps_at_sixty_seconds() {
        let first = backoff_duration(1).as_secs_f64();
        assert!((first - 1.0).abs() < 0.21, "first retry ~1s, got {first}");

        let capped = backoff_duration(20).as_secs_f64();
        assert!(capped <= 60.0 * 1.21, "backoff must cap near 60s, got {capped}");
    }

    #[test]
    fn backoff_never_goes_negative() {
        for retry in 1..=15 {
            assert!(backoff_duration(retry) > Duration::ZERO);
        }
    }
}
