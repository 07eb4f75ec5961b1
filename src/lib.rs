//! prevaldb - a strict, deterministic object-prevalence engine
//!
//! Keeps an arbitrary in-memory business object (the "prevalent system")
//! durable by journaling every state-changing command before it is applied
//! and by periodically writing full snapshots of the system to disk.
//! On restart the engine reconstructs the exact pre-shutdown state from the
//! newest readable snapshot plus every journal written after it.

pub mod engine;
pub mod journal;
pub mod naming;
pub mod recovery;
pub mod serializer;
pub mod snapshot;

pub use engine::{EngineBuilder, EngineError, PrevalenceEngine, Transaction};
pub use serializer::{JsonSerializer, SerializationError, Serializer, SerializerRegistry};
pub use snapshot::{SnapshotError, SnapshotManager};
