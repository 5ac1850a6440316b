//! Heart Rate Bridge - live heart-rate telemetry for dashboards and AI agents.
//!
//! A paired phone posts a reading roughly once a second. The bridge keeps the
//! last 30 minutes per pairing code in memory and serves it two ways: a small
//! REST API, and an MCP tool endpoint that an agent can call to check on the
//! user mid-conversation.
//!
//! # Guarantees
//!
//! - **Short retention**: readings older than the TTL are never returned and
//!   are reclaimed by a background sweep
//! - **No persistence**: restarting the process forgets everything
//! - **Uniform validation**: both front ends reject exactly the same inputs
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Heart Rate Bridge                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │  REST API   │──▶│ Validation  │◀──│ MCP Tools   │        │
//! │  │ (/api/hr)   │   │ (pairing)   │   │   (/mcp)    │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │                           │                  │              │
//! │                           ▼                  ▼              │
//! │                    ┌─────────────┐   ┌─────────────┐        │
//! │                    │   Reading   │◀──│ Connection  │        │
//! │                    │    Store    │   │   Status    │        │
//! │                    └─────────────┘   └─────────────┘        │
//! │                           ▲                                 │
//! │                    ┌─────────────┐                          │
//! │                    │   Sweeper   │  (every 60s)             │
//! │                    └─────────────┘                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use heart_rate_bridge::{pairing, status, ReadingStore};
//!
//! let store = ReadingStore::default();
//! let code = pairing::generate();
//!
//! store.insert(&code, 72, 2);
//!
//! assert_eq!(store.latest(&code).map(|r| r.bpm), Some(72));
//! assert!(status::connection_status(&store, &code).connected);
//! ```

pub mod config;
pub mod pairing;
pub mod status;
pub mod store;
pub mod validation;

#[cfg(feature = "server")]
pub mod api;

#[cfg(feature = "server")]
pub mod mcp;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use status::{ConnectionState, ConnectionStatus};
pub use store::{
    Clock, HeartRateStats, ManualClock, Reading, ReadingStore, SharedReadingStore, SystemClock,
};
pub use validation::ValidationError;

#[cfg(feature = "server")]
pub use server::{run, RunningServer, ServerConfig};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
