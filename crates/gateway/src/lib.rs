//! Real-time audience voting gateway.
//!
//! Clients connect over WebSocket, submit votes for questions and answers,
//! and receive live-updated rankings as other participants vote.
//!
//! ## Architecture
//!
//! ```text
//! WebSocket clients
//!         ↓ (reader loop, one task per connection)
//! Handlers (vote ledger / ranking projector → ranked store)
//!         ↓
//! Broker (single control-loop task owning the registry)
//!         ↓ (bounded per-client queues, drop-on-full)
//! Writer loops → WebSocket clients
//! ```
//!
//! ## Consistency model
//!
//! - One standing answer per (session, question); a changed vote moves the
//!   previous choice instead of double-counting.
//! - Vote transitions are multi-step and non-transactional against the
//!   store; concurrent votes on the same pair can interleave.
//! - Broadcasts are best-effort snapshots: a slow client drops pushes and
//!   resynchronizes from the next one.

pub mod broker;
pub mod client;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod projector;
pub mod protocol;
pub mod session;
pub mod stats;
pub mod store;

pub use broker::{Broker, BrokerStats};
pub use client::ActiveClient;
pub use error::{GatewayError, Result};
pub use handlers::Handlers;
pub use ledger::VoteLedger;
pub use projector::RankingProjector;
pub use protocol::{Request, ServerPush};
pub use session::{create_router, AppState};
pub use stats::{StatReporter, DEFAULT_STATS_INTERVAL};
pub use store::TallyStore;
