//! Z Monitor real-time monitoring core: library surface shared between
//! the `zmonitor` binary and its integration tests.

pub mod contexts;
pub mod orchestrator;
pub mod priority;
pub mod shutdown;
pub mod state;

pub use orchestrator::Orchestrator;
pub use shutdown::ShutdownSignal;
pub use state::AppState;
