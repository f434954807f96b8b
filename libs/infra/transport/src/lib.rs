//! mTLS client, wire codec, and retry/backoff delivery loop for telemetry
//! transport.

pub mod codec;
pub mod delivery;
pub mod error;
pub mod tls;

pub use codec::{BatchContainer, MessageType, ServerAck, WireMode, SCHEMA_VERSION};
pub use delivery::{backoff_duration, DeliveryLoop, TransportConfig, TransportEvent};
pub use error::TransportError;
pub use tls::{build_client_config, server_name};
