//! Serializer strategies and the suffix registry
//!
//! A serializer strategy turns the prevalent system into bytes and back.
//! Strategies are registered under a unique file suffix; a snapshot written
//! by the strategy registered under `xmlsnapshot` lives in a file named
//! `<21-digit sequence>.xmlsnapshot`.
//!
//! The registry preserves insertion order. The first-registered strategy is
//! the **primary** strategy: it is the only one ever used to write new
//! snapshots. Secondary strategies exist so that snapshots written by an
//! older configuration remain readable during a format migration.

mod errors;

pub use errors::{SerializationError, SerializationResult};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::naming::JOURNAL_SUFFIX;

/// A pluggable serialization strategy for the prevalent system.
///
/// Implementations must round-trip faithfully: `deserialize(serialize(s))`
/// must reconstruct a system that behaves identically to `s`.
pub trait Serializer<S>: Send + Sync {
    /// Encode the system to bytes.
    fn serialize(&self, system: &S) -> SerializationResult<Vec<u8>>;

    /// Decode a system from bytes.
    fn deserialize(&self, bytes: &[u8]) -> SerializationResult<S>;
}

/// Built-in JSON strategy for any serde-serializable system.
///
/// This is the default snapshot strategy and the in-memory strategy used
/// for the transient deep copy when nothing else is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Serializer<S> for JsonSerializer
where
    S: Serialize + DeserializeOwned,
{
    fn serialize(&self, system: &S) -> SerializationResult<Vec<u8>> {
        serde_json::to_vec(system).map_err(|e| SerializationError::encode("system as JSON", e))
    }

    fn deserialize(&self, bytes: &[u8]) -> SerializationResult<S> {
        serde_json::from_slice(bytes)
            .map_err(|e| SerializationError::decode("system from JSON", e))
    }
}

/// Insertion-ordered mapping from file suffix to serializer strategy.
///
/// Configured once before engine startup and immutable afterwards. The
/// first entry is the primary strategy.
pub struct SerializerRegistry<S> {
    entries: Vec<(String, Box<dyn Serializer<S>>)>,
}

impl<S> SerializerRegistry<S> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers a strategy under a suffix.
    ///
    /// The suffix must be non-empty, alphanumeric, not the reserved
    /// `journal` suffix, and not already registered.
    pub fn register(
        &mut self,
        suffix: impl Into<String>,
        strategy: impl Serializer<S> + 'static,
    ) -> SerializationResult<()> {
        self.register_boxed(suffix.into(), Box::new(strategy))
    }

    /// Registers an already-boxed strategy. Same validation as
    /// [`register`](Self::register).
    pub fn register_boxed(
        &mut self,
        suffix: String,
        strategy: Box<dyn Serializer<S>>,
    ) -> SerializationResult<()> {
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(SerializationError::message(format!(
                "invalid serializer suffix {:?}: must be non-empty and alphanumeric",
                suffix
            )));
        }
        if suffix == JOURNAL_SUFFIX {
            return Err(SerializationError::message(format!(
                "serializer suffix {:?} is reserved for the journal",
                suffix
            )));
        }
        if self.contains(&suffix) {
            return Err(SerializationError::message(format!(
                "serializer suffix {:?} is already registered",
                suffix
            )));
        }
        self.entries.push((suffix, strategy));
        Ok(())
    }

    /// Returns the primary (first-registered) strategy and its suffix.
    pub fn primary(&self) -> Option<(&str, &dyn Serializer<S>)> {
        self.entries
            .first()
            .map(|(suffix, strategy)| (suffix.as_str(), strategy.as_ref()))
    }

    /// Returns the strategy registered under a suffix, if any.
    pub fn get(&self, suffix: &str) -> Option<&dyn Serializer<S>> {
        self.entries
            .iter()
            .find(|(s, _)| s == suffix)
            .map(|(_, strategy)| strategy.as_ref())
    }

    /// Returns true if a strategy is registered under the suffix.
    pub fn contains(&self, suffix: &str) -> bool {
        self.entries.iter().any(|(s, _)| s == suffix)
    }

    /// Returns all registered suffixes in registration order.
    pub fn suffixes(&self) -> Vec<&str> {
        self.entries.iter().map(|(s, _)| s.as_str()).collect()
    }

    /// Returns true if no strategy is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of registered strategies.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<S> Default for SerializerRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
