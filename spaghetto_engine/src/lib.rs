#![forbid(unsafe_code)]

/// Engine v1 — Immutable. Behavioral changes require engine_v2.
pub const ENGINE_VERSION: u32 = 1;

pub mod error;
pub mod arithmetic;
pub mod domain;
pub mod inventory;
pub mod menu;
pub mod loans;
pub mod events;
pub mod transitions;
pub mod invariants;
pub mod hashing;
pub mod engine;

pub use engine::Engine;
pub use error::{EngineError, Result};
