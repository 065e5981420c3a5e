/// Golden determinism test — replays the frozen event stream
/// and asserts the resulting books match hand-computed values.
///
/// This test must NEVER be modified to match new behavior.
/// If it fails, the engine has been broken.

use std::fs;

use spaghetto_engine::engine::Engine;
use spaghetto_engine::events::EventEnvelope;
use spaghetto_engine::hashing::canonical_hash;
use spaghetto_engine::ENGINE_VERSION;

fn load_events(path: &str) -> Vec<EventEnvelope> {
    let data = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path, e));
    let arr: Vec<serde_json::Value> =
        serde_json::from_str(&data).expect("Failed to parse events JSON");
    arr.iter()
        .map(|v| EventEnvelope::from_value(v).expect("bad fixture event"))
        .collect()
}

#[test]
fn golden_replay_books_match() {
    let events = load_events("tests/golden/events.json");
    let mut engine = Engine::new();
    let state = engine.apply_sequence(&events).expect("golden replay failed");

    assert_eq!(state.balance, 487_400);
    assert_eq!(state.total_weeks, 4);
    assert_eq!(state.employee_count, 1);
    assert_eq!(state.transactions.len(), 14);

    assert_eq!(state.inventory.get("Spaghetti").unwrap().quantity().unwrap(), 5_500);
    assert_eq!(state.inventory.get("Egg").unwrap().quantity().unwrap(), 30);
    let guanciale = state.inventory.get("Guanciale").unwrap();
    assert_eq!(guanciale.quantity().unwrap(), 750);
    assert_eq!(guanciale.lots.len(), 1);
    assert_eq!(guanciale.lots[0].unit_cost, 50_000);

    let loan = &state.loans["Trattoria Fund"];
    assert_eq!(loan.outstanding, 88_000);
    assert_eq!(loan.remaining_weeks, 44);
    assert!(state.loan_offers.is_empty());

    assert_eq!(state.monthly_revenue(), 81_000);
    assert_eq!(
        state.transactions.last().unwrap().title,
        "Loan payment: Trattoria Fund"
    );
}

#[test]
fn golden_replay_is_deterministic() {
    let events = load_events("tests/golden/events.json");

    // Run 1
    let mut engine1 = Engine::new();
    engine1.apply_sequence(&events).unwrap();
    let h1 = canonical_hash(engine1.state()).unwrap();

    // Run 2
    let mut engine2 = Engine::new();
    engine2.replay(&events).unwrap();
    let h2 = canonical_hash(engine2.state()).unwrap();

    assert_eq!(
        h1, h2,
        "DETERMINISM FAILURE: Two replays of the same events produced different hashes.\n\
         Run 1: {}\n\
         Run 2: {}",
        h1, h2
    );
}

#[test]
fn golden_prefix_stops_at_rejected_event() {
    let mut events = load_events("tests/golden/events.json");
    // An order for a dish not on the menu rejects the whole week.
    events[9] = EventEnvelope::from_value(&serde_json::json!({
        "sequence": 10, "logical_time": 0, "schema_version": 1,
        "event": {"type": "advance_week", "orders": {"Cacio e Pepe": 1}}
    }))
    .unwrap();

    let mut engine = Engine::new();
    assert!(engine.apply_sequence(&events).is_err());
    assert_eq!(engine.last_sequence(), 9);
    assert_eq!(engine.state().total_weeks, 0);
}

#[test]
fn engine_version_is_one() {
    assert_eq!(ENGINE_VERSION, 1);
}
