//! Pipeline run event protocol: `event_type` + payload + envelope.
//!
//! This crate defines the wire shape of a single run event and envelope injection.
//! It does not depend on trellis. Trellis bridges `EngineEvent` into `ProtocolEvent` and calls `to_json`.

pub mod envelope;
pub mod event;

pub use envelope::{to_json, Envelope, EnvelopeState};
pub use event::ProtocolEvent;
