/// Spaghetto Engine — Engine
///
/// Top-level orchestrator. Delegates mutation to transitions,
/// validates via invariants.
///
/// Strict sequence enforcement, constants-first validation.
/// A rejected event leaves state and sequence untouched.

use tracing::debug;

use crate::domain::{GameState, TransitionResult};
use crate::error::{EngineError, Result};
use crate::events::{EventEnvelope, SCHEMA_VERSION};
use crate::invariants::validate_invariants;
use crate::transitions::apply_event as transition_apply;

/// Stateful engine wrapping the pure functional transition layer.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    state: GameState,
    last_sequence: u64,
    constants_initialized: bool,
}

impl Engine {
    /// Create a new engine holding a fresh game.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Sequence number of the last applied event (0 before any).
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn next_sequence(&self) -> u64 {
        self.last_sequence + 1
    }

    pub fn constants_initialized(&self) -> bool {
        self.constants_initialized
    }

    /// Reset to a fresh initial state.
    pub fn initialize_state(&mut self) -> &GameState {
        self.state = GameState::default();
        self.last_sequence = 0;
        self.constants_initialized = false;
        &self.state
    }

    /// Resume from a restored state at `sequence`.
    /// The state must already satisfy the invariants.
    pub fn resume(state: GameState, sequence: u64) -> Result<Self> {
        validate_invariants(&state)?;
        Ok(Self {
            state,
            last_sequence: sequence,
            constants_initialized: sequence > 0,
        })
    }

    /// Check an event against the ordering rules without applying it.
    pub fn check_event(&self, event: &EventEnvelope) -> Result<()> {
        // -- Schema version enforcement --
        if event.schema_version != SCHEMA_VERSION {
            return Err(EngineError::SchemaVersion {
                expected: SCHEMA_VERSION,
                found: event.schema_version,
            });
        }

        // -- Sequence enforcement --
        let expected = self.next_sequence();
        if event.sequence != expected {
            return Err(EngineError::Sequence {
                expected,
                found: event.sequence,
            });
        }

        // -- Constants-first enforcement --
        let is_constants = event.event_type() == "initialize_constants";
        if !self.constants_initialized && !is_constants {
            return Err(EngineError::Ordering(format!(
                "first event must be initialize_constants, got {:?}",
                event.event_type()
            )));
        }
        if self.constants_initialized && is_constants {
            return Err(EngineError::Ordering(
                "initialize_constants can only be the first event".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply a single event:
    ///   1. Validate schema version (must be 1)
    ///   2. Validate sequence (strictly increasing, no gaps)
    ///   3. Validate constants-first rule
    ///   4. Delegate to transitions::apply_event
    ///   5. Validate invariants on new state
    ///   6. Store and return
    pub fn apply_event(&mut self, event: &EventEnvelope) -> Result<(&GameState, TransitionResult)> {
        self.check_event(event)?;

        let (new_state, result) = transition_apply(&self.state, event)?;
        validate_invariants(&new_state)?;

        debug!(
            sequence = event.sequence,
            event_type = event.event_type(),
            balance = new_state.balance,
            "event applied"
        );

        self.state = new_state;
        self.last_sequence = event.sequence;
        self.constants_initialized = true;

        Ok((&self.state, result))
    }

    /// Apply an ordered sequence of events deterministically.
    /// Stops at the first rejected event.
    pub fn apply_sequence(&mut self, events: &[EventEnvelope]) -> Result<&GameState> {
        for event in events {
            self.apply_event(event)?;
        }
        Ok(&self.state)
    }

    /// Event-sourced reconstruction: reset and replay.
    pub fn replay(&mut self, events: &[EventEnvelope]) -> Result<&GameState> {
        self.initialize_state();
        self.apply_sequence(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GameConstants;
    use crate::events::GameEvent;

    fn constants(seq: u64) -> EventEnvelope {
        EventEnvelope::new(
            seq,
            0,
            GameEvent::InitializeConstants {
                constants: GameConstants::default(),
            },
        )
    }

    fn deposit(seq: u64, cents: i64) -> EventEnvelope {
        EventEnvelope::new(
            seq,
            0,
            GameEvent::Deposit {
                title: "Owner Deposit".into(),
                cents,
            },
        )
    }

    #[test]
    fn constants_must_come_first() {
        let mut engine = Engine::new();
        let err = engine.apply_event(&deposit(1, 100)).unwrap_err();
        assert!(matches!(err, EngineError::Ordering(_)));
        assert_eq!(engine.last_sequence(), 0);

        engine.apply_event(&constants(1)).unwrap();
        let err = engine.apply_event(&constants(2)).unwrap_err();
        assert!(matches!(err, EngineError::Ordering(_)));
    }

    #[test]
    fn sequence_gaps_are_rejected() {
        let mut engine = Engine::new();
        engine.apply_event(&constants(1)).unwrap();
        let err = engine.apply_event(&deposit(3, 100)).unwrap_err();
        assert_eq!(err, EngineError::Sequence { expected: 2, found: 3 });
        engine.apply_event(&deposit(2, 100)).unwrap();
        assert_eq!(engine.state().balance, 100);
    }

    #[test]
    fn schema_version_is_enforced() {
        let mut engine = Engine::new();
        let mut env = constants(1);
        env.schema_version = 2;
        assert!(matches!(
            engine.apply_event(&env).unwrap_err(),
            EngineError::SchemaVersion { expected: 1, found: 2 }
        ));
    }

    #[test]
    fn rejected_event_leaves_state_untouched() {
        let mut engine = Engine::new();
        engine
            .apply_sequence(&[constants(1), deposit(2, 500)])
            .unwrap();
        let before = engine.state().clone();
        let err = engine.apply_event(&deposit(3, -5)).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(engine.state(), &before);
        assert_eq!(engine.last_sequence(), 2);
    }

    #[test]
    fn replay_resets_first() {
        let events = [constants(1), deposit(2, 700)];
        let mut engine = Engine::new();
        engine.apply_sequence(&events).unwrap();
        let state = engine.replay(&events).unwrap().clone();
        assert_eq!(state.balance, 700);
        assert_eq!(engine.last_sequence(), 2);
    }

    #[test]
    fn resume_continues_the_sequence() {
        let mut engine = Engine::new();
        engine.apply_sequence(&[constants(1), deposit(2, 700)]).unwrap();
        let mut resumed = Engine::resume(engine.state().clone(), 2).unwrap();
        resumed.apply_event(&deposit(3, 300)).unwrap();
        assert_eq!(resumed.state().balance, 1_000);
    }
}
