//! Sensor ingress: control-socket attach handshake and shared-memory ring
//! reader.

pub mod error;
pub mod events;
pub mod handshake;
pub mod header;
pub mod ring;
pub mod slot;
pub mod stall;

pub use error::SensorError;
pub use events::{RingEvent, SensorFaultKind};
pub use handshake::{attach, ControlRecord, HandshakeResult};
pub use ring::RingReader;
pub use stall::{SensorHealth, StallWatchdog};
