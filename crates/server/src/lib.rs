//! HTTP harness for the wavedb image similarity database.
//!
//! Wraps one [`store::MemDb`] behind a reader-writer lock and exposes it
//! over a small JSON API: add/get/delete images, similarity queries, an
//! explicit save endpoint, and index diagnostics. Durability follows the
//! core's contract: nothing hits disk until `/api/v1/save` (or shutdown,
//! which flushes pending changes).
//!
//! The default bind point is `127.0.0.1:9548`; see [`config::ServerConfig`]
//! for file- and environment-based overrides.

pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::start_server;
pub use state::ServerState;
