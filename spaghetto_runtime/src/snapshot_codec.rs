//! Snapshot Codec — deterministic GameState encoder/decoder for save files.
//!
//! Pure codec layer. No side-effects, no timestamps, no envelope.
//!
//! - `encode_snapshot`:  GameState → JSON string
//! - `decode_snapshot`:  JSON string → GameState (strict, no defaults)
//! - `restore_snapshot`: decode + invariant validation
//! - `export_snapshot_to_file` / `import_snapshot_from_file`: file I/O
//! - `snapshot_hash`:    SHA-256 of the encoding (lowercase hex)

use std::fs;
use std::path::Path;

use spaghetto_engine::domain::GameState;
use spaghetto_engine::hashing::hex_digest;
use spaghetto_engine::invariants::try_validate_invariants;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// All possible snapshot codec failures.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// JSON serialization failed.
    #[error("SerializationError: {0}")]
    Serialization(String),
    /// JSON deserialization failed (malformed, missing fields, unknown fields).
    #[error("DeserializationError: {0}")]
    Deserialization(String),
    /// Loaded state violates engine invariants.
    #[error("InvariantViolation: {0}")]
    InvariantViolation(String),
    /// File I/O error.
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Encode a GameState to a JSON string.
///
/// BTreeMaps keep every keyed collection sorted, so identical states
/// always encode identically.
pub fn encode_snapshot(state: &GameState) -> Result<String, SnapshotError> {
    serde_json::to_string(state).map_err(|e| SnapshotError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Decode a JSON string into a GameState.
///
/// Strict deserialization: `deny_unknown_fields` on all types rejects
/// unexpected fields. Missing required fields cause failure.
/// No invariant validation — use `restore_snapshot` for validated loading.
pub fn decode_snapshot(json: &str) -> Result<GameState, SnapshotError> {
    serde_json::from_str::<GameState>(json)
        .map_err(|e| SnapshotError::Deserialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Restore (decode + validate)
// ---------------------------------------------------------------------------

/// Decode a JSON string and validate invariants immediately.
///
/// This is the safe entry point for loading a save file from disk.
pub fn restore_snapshot(json: &str) -> Result<GameState, SnapshotError> {
    let state = decode_snapshot(json)?;
    try_validate_invariants(&state).map_err(SnapshotError::InvariantViolation)?;
    Ok(state)
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

/// Export a GameState to a file as JSON.
///
/// Creates parent directories if needed.
pub fn export_snapshot_to_file(state: &GameState, path: &Path) -> Result<(), SnapshotError> {
    let json = encode_snapshot(state)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, json.as_bytes())?;
    Ok(())
}

/// Import a GameState from a JSON file.
///
/// Fails on malformed JSON, missing fields, or invariant violations.
pub fn import_snapshot_from_file(path: &Path) -> Result<GameState, SnapshotError> {
    let content = fs::read_to_string(path)?;
    restore_snapshot(&content)
}

// ---------------------------------------------------------------------------
// Hash
// ---------------------------------------------------------------------------

/// SHA-256 of the save-file encoding. Lowercase hex string.
///
/// This hashes the serde-derived JSON, not the canonical engine hash
/// (which binds `engine_version`). It identifies a save file's contents.
pub fn snapshot_hash(state: &GameState) -> Result<String, SnapshotError> {
    let json = encode_snapshot(state)?;
    Ok(hex_digest(json.as_bytes()))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use spaghetto_engine::domain::{Dish, Ingredient, Item, TransactionKind};

    /// Build a small valid GameState for testing.
    fn make_test_state() -> GameState {
        let mut state = GameState::default();
        state.record("Owner Deposit", 200_000, TransactionKind::Deposit).unwrap();
        state
            .inventory
            .add(&Item {
                name: "Rigatoni".into(),
                quantity: 5_000,
                unit: "gram".into(),
                price: 2_500,
            })
            .unwrap();
        state
            .dishes
            .add(Dish {
                name: "Rigatoni all'Amatriciana".into(),
                price: 1_600,
                ingredients: vec![Ingredient {
                    name: "Rigatoni".into(),
                    quantity: 120,
                    unit: "gram".into(),
                }],
            })
            .unwrap();
        state.employee_count = 2;
        state
    }

    #[test]
    fn roundtrip_produces_identical_json() {
        let state = make_test_state();
        let json1 = encode_snapshot(&state).unwrap();
        let decoded = decode_snapshot(&json1).unwrap();
        let json2 = encode_snapshot(&decoded).unwrap();
        assert_eq!(json1, json2, "Roundtrip must produce identical JSON");
    }

    #[test]
    fn dangling_ingredient_returns_invariant_violation() {
        let mut state = make_test_state();
        state.inventory.items.clear();
        let json = encode_snapshot(&state).unwrap();
        match restore_snapshot(&json).unwrap_err() {
            SnapshotError::InvariantViolation(msg) => {
                assert!(msg.contains("dish_ingredients"), "got: {}", msg);
            }
            other => panic!("Expected InvariantViolation, got: {:?}", other),
        }
    }

    #[test]
    fn unbalanced_ledger_returns_invariant_violation() {
        let mut state = make_test_state();
        state.balance += 1;
        let json = encode_snapshot(&state).unwrap();
        match restore_snapshot(&json).unwrap_err() {
            SnapshotError::InvariantViolation(msg) => assert!(msg.contains("ledger_balance")),
            other => panic!("Expected InvariantViolation, got: {:?}", other),
        }
    }

    #[test]
    fn file_roundtrip_matches() {
        let state = make_test_state();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saves").join("state.json");

        export_snapshot_to_file(&state, &path).unwrap();
        let imported = import_snapshot_from_file(&path).unwrap();
        assert_eq!(imported, state);

        let file_bytes = std::fs::read(&path).unwrap();
        assert_eq!(hex_digest(&file_bytes), snapshot_hash(&state).unwrap());
    }

    #[test]
    fn corrupted_file_returns_deserialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"{ not valid json !!!}").unwrap();

        match import_snapshot_from_file(&path).unwrap_err() {
            SnapshotError::Deserialization(_) => {}
            other => panic!("Expected DeserializationError, got: {:?}", other),
        }
    }

    #[test]
    fn missing_field_returns_deserialization_error() {
        let json = r#"{"balance":0}"#;
        assert!(matches!(
            decode_snapshot(json).unwrap_err(),
            SnapshotError::Deserialization(_)
        ));
    }

    #[test]
    fn unknown_field_returns_deserialization_error() {
        let mut v: serde_json::Value =
            serde_json::from_str(&encode_snapshot(&make_test_state()).unwrap()).unwrap();
        v["cheat_mode"] = serde_json::Value::Bool(true);
        assert!(decode_snapshot(&v.to_string()).is_err());
    }

    #[test]
    fn missing_file_returns_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = import_snapshot_from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SnapshotError::Io(_)));
    }

    #[test]
    fn hash_is_deterministic() {
        let state = make_test_state();
        let h1 = snapshot_hash(&state).unwrap();
        let h2 = snapshot_hash(&state).unwrap();
        assert_eq!(h1, h2, "Same state must produce same hash");
        assert_eq!(h1.len(), 64, "SHA-256 hex string must be 64 chars");
    }
}
