/// Spaghetto Engine — Canonical Hashing
///
/// Deterministic canonical serialization + SHA-256 hashing.
/// Produces byte-identical output across platforms.
///
/// Rules:
///   - engine_version first, then GameState fields in declaration order
///   - Maps (inventory, dishes, loans, offers) sorted by key (BTreeMap)
///   - Ledger and lots keep their stored order
///   - UTF-8 JSON, no whitespace, no float, no platform newline

use sha2::{Digest, Sha256};
use serde_json::{Map, Value};

use crate::domain::GameState;
use crate::error::{EngineError, Result};
use crate::ENGINE_VERSION;

/// Canonical serialization of GameState to UTF-8 JSON bytes.
/// Includes engine_version as the first field for identity binding.
pub fn canonical_serialize(state: &GameState) -> Result<Vec<u8>> {
    let obj = build_canonical_value(state)?;
    serde_json::to_vec(&obj).map_err(|e| EngineError::parse(e.to_string()))
}

/// SHA-256 of canonical serialization. Lowercase hex string.
pub fn canonical_hash(state: &GameState) -> Result<String> {
    let bytes = canonical_serialize(state)?;
    Ok(hex_digest(&bytes))
}

/// Lowercase hex SHA-256 of raw bytes.
pub fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
}

/// Parse canonical JSON back into a GameState.
/// Rejects documents written by a different engine version.
pub fn canonical_deserialize(bytes: &[u8]) -> Result<GameState> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| EngineError::parse(e.to_string()))?;
    let Value::Object(mut root) = value else {
        return Err(EngineError::parse("canonical state must be a JSON object"));
    };
    match root.remove("engine_version").and_then(|v| v.as_u64()) {
        Some(v) if v == ENGINE_VERSION as u64 => {}
        Some(v) => {
            return Err(EngineError::parse(format!(
                "engine version mismatch: expected {}, found {}",
                ENGINE_VERSION, v
            )))
        }
        None => return Err(EngineError::parse("missing engine_version")),
    }
    serde_json::from_value(Value::Object(root)).map_err(|e| EngineError::parse(e.to_string()))
}

/// Build the canonical serde_json::Value in strict field order.
///
/// serde_json::Map preserves insertion order (preserve_order feature),
/// and struct fields serialize in declaration order.
fn build_canonical_value(state: &GameState) -> Result<Value> {
    let fields = match serde_json::to_value(state) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return Err(EngineError::parse("game state did not serialize to an object")),
        Err(e) => return Err(EngineError::parse(e.to_string())),
    };

    // engine_version MUST be first — it is part of the engine identity.
    let mut root = Map::new();
    root.insert(
        "engine_version".to_string(),
        Value::Number((ENGINE_VERSION as u64).into()),
    );
    for (key, value) in fields {
        root.insert(key, value);
    }
    Ok(Value::Object(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Item, TransactionKind};

    fn sample() -> GameState {
        let mut s = GameState::default();
        s.record("Owner Deposit", 50_000, TransactionKind::Deposit).unwrap();
        for name in ["Tomato", "Basil", "Garlic"] {
            s.inventory
                .add(&Item {
                    name: name.into(),
                    quantity: 10,
                    unit: "piece".into(),
                    price: 250,
                })
                .unwrap();
        }
        s
    }

    #[test]
    fn engine_version_comes_first() {
        let bytes = canonical_serialize(&sample()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("{\"engine_version\":1,\"balance\":50000,"));
        assert!(!text.contains('\n'));
    }

    #[test]
    fn hash_is_stable_and_sensitive() {
        let a = sample();
        let b = sample();
        assert_eq!(canonical_hash(&a).unwrap(), canonical_hash(&b).unwrap());
        assert_eq!(canonical_hash(&a).unwrap().len(), 64);

        let mut c = sample();
        c.employee_count = 1;
        assert_ne!(canonical_hash(&a).unwrap(), canonical_hash(&c).unwrap());
    }

    #[test]
    fn canonical_round_trip() {
        let state = sample();
        let bytes = canonical_serialize(&state).unwrap();
        assert_eq!(canonical_deserialize(&bytes).unwrap(), state);

        let tampered = String::from_utf8(bytes)
            .unwrap()
            .replacen("\"engine_version\":1", "\"engine_version\":2", 1);
        assert!(canonical_deserialize(tampered.as_bytes()).is_err());
    }
}
