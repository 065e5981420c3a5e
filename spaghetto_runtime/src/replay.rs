//! Replay orchestrator — rebuild state from the event log.
//!
//! Delegates all game logic to the engine.
//! No shortcuts, no cached state logic.

use spaghetto_engine::domain::GameState;
use spaghetto_engine::engine::Engine;
use spaghetto_engine::events::EventEnvelope;
use spaghetto_engine::hashing::canonical_hash;

use crate::error::Result;

/// Rebuild the game state from a sequence of events.
///
/// 1. Create a fresh engine
/// 2. Pass each event sequentially to the engine
/// 3. Return (final_state, canonical_hash)
pub fn rebuild_state(events: &[EventEnvelope]) -> Result<(GameState, String)> {
    let engine = rebuild_engine(events)?;
    let hash = canonical_hash(engine.state())?;
    Ok((engine.state().clone(), hash))
}

/// Rebuild a live engine positioned after the last event.
pub fn rebuild_engine(events: &[EventEnvelope]) -> Result<Engine> {
    let mut engine = Engine::new();
    engine.apply_sequence(events)?;
    tracing::debug!(events = events.len(), "replay complete");
    Ok(engine)
}

/// Rebuild state and return only the canonical hash.
pub fn rebuild_hash(events: &[EventEnvelope]) -> Result<String> {
    let (_, hash) = rebuild_state(events)?;
    Ok(hash)
}
