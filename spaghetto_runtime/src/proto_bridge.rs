//! Proto ↔ Engine conversion bridge.
//!
//! Converts between the protobuf log frame (proto_types.rs) and the
//! engine's typed EventEnvelope. The event body is stored as compact
//! JSON; the frame's `event_type` must agree with the body's tag.

use spaghetto_engine::events::{EventEnvelope, GameEvent};

use crate::error::{Result, RuntimeError};
use crate::proto_types::ProtoEventEnvelope;

/// Convert a log frame to the engine's EventEnvelope.
pub fn proto_to_engine(proto: &ProtoEventEnvelope) -> Result<EventEnvelope> {
    let event: GameEvent = serde_json::from_str(&proto.payload_json).map_err(|e| {
        RuntimeError::event_log(format!(
            "event {} has an unreadable payload: {}",
            proto.sequence, e
        ))
    })?;

    if event.event_type() != proto.event_type {
        return Err(RuntimeError::event_log(format!(
            "event {} is framed as {:?} but contains {:?}",
            proto.sequence,
            proto.event_type,
            event.event_type()
        )));
    }

    Ok(EventEnvelope {
        sequence: proto.sequence,
        logical_time: proto.logical_time,
        schema_version: proto.schema_version,
        event,
    })
}

/// Convert an engine EventEnvelope to a log frame.
///
/// Used for persisting events to the append-only binary log.
pub fn engine_to_proto(envelope: &EventEnvelope) -> Result<ProtoEventEnvelope> {
    let payload_json = serde_json::to_string(&envelope.event).map_err(|e| {
        RuntimeError::event_log(format!(
            "event {} could not be encoded: {}",
            envelope.sequence, e
        ))
    })?;

    Ok(ProtoEventEnvelope {
        sequence: envelope.sequence,
        logical_time: envelope.logical_time,
        schema_version: envelope.schema_version,
        event_type: envelope.event_type().to_string(),
        payload_json,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use spaghetto_engine::domain::Item;

    #[test]
    fn envelope_round_trips_through_frame() {
        let env = EventEnvelope::new(
            4,
            2,
            GameEvent::BuyItem {
                item: Item {
                    name: "Basil".into(),
                    quantity: 3,
                    unit: "bunch".into(),
                    price: 450,
                },
            },
        );
        let proto = engine_to_proto(&env).unwrap();
        assert_eq!(proto.event_type, "buy_item");
        assert_eq!(proto_to_engine(&proto).unwrap(), env);
    }

    #[test]
    fn mismatched_event_type_is_rejected() {
        let env = EventEnvelope::new(1, 0, GameEvent::HireEmployees { count: 1 });
        let mut proto = engine_to_proto(&env).unwrap();
        proto.event_type = "fire_employees".into();
        assert!(matches!(proto_to_engine(&proto), Err(RuntimeError::EventLog(_))));
    }

    #[test]
    fn garbage_payload_is_rejected() {
        let proto = ProtoEventEnvelope {
            sequence: 1,
            logical_time: 0,
            schema_version: 1,
            event_type: "deposit".into(),
            payload_json: "{not json".into(),
        };
        assert!(proto_to_engine(&proto).is_err());
    }
}
