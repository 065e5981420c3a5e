#![forbid(unsafe_code)]

//! Spaghetto Runtime
//!
//! Wraps the deterministic engine with persistence, replay,
//! autosave snapshots, demand and loan-market simulation, and
//! session management for the `spaghetto` binary.
//!
//! No bookkeeping rules live here — all transitions and invariants
//! are delegated to the engine. Randomness lives here only, and is
//! resolved into event payloads before the engine sees them.

pub mod error;
pub mod config;
pub mod proto_types;
pub mod proto_bridge;
pub mod event_store;
pub mod replay;
pub mod snapshot;
pub mod snapshot_codec;
pub mod drift;
pub mod demand;
pub mod loan_market;
pub mod prompt;
pub mod session;

pub use error::{Result, RuntimeError};
pub use session::{Session, SharedSession};
