//! Hand-written protobuf types for the event log.
//!
//! Uses prost derive macros for encode/decode without prost-build.
//! Field numbers are part of the on-disk format and must not change.

use prost::Message;

// ── Event Envelope ─────────────────────────────────────────────

/// One frame of the event log.
///
/// The event body travels as JSON (`payload_json`) tagged with its
/// `event_type`, so new event kinds never need new proto messages.
#[derive(Clone, PartialEq, Message)]
pub struct ProtoEventEnvelope {
    #[prost(uint64, tag = "1")]
    pub sequence: u64,
    #[prost(uint64, tag = "2")]
    pub logical_time: u64,
    #[prost(uint32, tag = "3")]
    pub schema_version: u32,
    #[prost(string, tag = "4")]
    pub event_type: String,
    #[prost(string, tag = "5")]
    pub payload_json: String,
}
