//! Snapshot selection and recovery tests
//!
//! Covers the recovery contract end to end:
//! - bootstrap against an empty directory
//! - snapshot round-trip durability across reopen
//! - cross-format rejection of an unreadable newest snapshot
//! - multi-strategy read with primary-only write
//! - transient deep-copy isolation
//! - sequence monotonicity and superseded-journal deletion

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use prevaldb::{
    EngineBuilder, EngineError, JsonSerializer, PrevalenceEngine, SerializationError,
    Serializer, Transaction,
};

// =============================================================================
// Test Utilities
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct AppendTransaction {
    text: String,
}

impl AppendTransaction {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl Transaction<String> for AppendTransaction {
    fn apply(&self, system: &mut String) {
        system.push_str(&self.text);
    }
}

type StringEngine = PrevalenceEngine<String, AppendTransaction>;

/// An alternate snapshot format: a fixed header followed by JSON. Distinct
/// enough from the plain JSON strategy that reading one format with the
/// other fails.
struct AltSerializer;

const ALT_HEADER: &[u8] = b"ALT1";

impl Serializer<String> for AltSerializer {
    fn serialize(&self, system: &String) -> Result<Vec<u8>, SerializationError> {
        let mut bytes = ALT_HEADER.to_vec();
        let json = serde_json::to_vec(system)
            .map_err(|e| SerializationError::encode("alt snapshot", e))?;
        bytes.extend_from_slice(&json);
        Ok(bytes)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<String, SerializationError> {
        let rest = bytes
            .strip_prefix(ALT_HEADER)
            .ok_or_else(|| SerializationError::message("missing alt snapshot header"))?;
        serde_json::from_slice(rest).map_err(|e| SerializationError::decode("alt snapshot", e))
    }
}

fn create_engine(
    directory: &Path,
    suffix: &str,
    strategy: impl Serializer<String> + 'static,
) -> StringEngine {
    EngineBuilder::new("initial".to_string())
        .directory(directory)
        .serializer(suffix, strategy)
        .build_configured()
        .expect("engine should recover")
}

fn append_take_snapshot_and_close(engine: &StringEngine) {
    engine.execute(AppendTransaction::new(" one")).unwrap();
    engine.execute(AppendTransaction::new(" two")).unwrap();
    engine.take_snapshot().unwrap();
    engine.close().unwrap();
}

// =============================================================================
// Property 1: No-snapshot bootstrap
// =============================================================================

#[test]
fn test_no_existing_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let engine = create_engine(temp_dir.path(), "snapshot", JsonSerializer::new());
    assert_eq!(engine.query(|s| s.clone()), "initial");
    assert_eq!(engine.sequence(), 0);
}

// =============================================================================
// Property 2: Round-trip durability
// =============================================================================

fn check_roundtrip(suffix: &str, make: impl Fn() -> Box<dyn Serializer<String>>) {
    let temp_dir = TempDir::new().unwrap();

    let first: StringEngine = EngineBuilder::new("initial".to_string())
        .directory(temp_dir.path())
        .serializer(suffix, BoxedStrategy(make()))
        .build_configured()
        .unwrap();
    append_take_snapshot_and_close(&first);
    drop(first);

    // Snapshot carries sequence 2; the journal before it is superseded.
    let snapshot_name = format!("000000000000000000002.{}", suffix);
    assert!(temp_dir.path().join(&snapshot_name).exists());
    fs::remove_file(temp_dir.path().join("000000000000000000001.journal")).unwrap();

    let second: StringEngine = EngineBuilder::new("initial".to_string())
        .directory(temp_dir.path())
        .serializer(suffix, BoxedStrategy(make()))
        .build_configured()
        .unwrap();
    assert_eq!(second.query(|s| s.clone()), "initial one two");
    second.close().unwrap();
}

/// Adapter so a `Box<dyn Serializer>` can be registered as a strategy.
struct BoxedStrategy(Box<dyn Serializer<String>>);

impl Serializer<String> for BoxedStrategy {
    fn serialize(&self, system: &String) -> Result<Vec<u8>, SerializationError> {
        self.0.serialize(system)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<String, SerializationError> {
        self.0.deserialize(bytes)
    }
}

#[test]
fn test_roundtrip_json() {
    check_roundtrip("snapshot", || Box::new(JsonSerializer::new()));
}

#[test]
fn test_roundtrip_alternate_format() {
    check_roundtrip("altsnapshot", || Box::new(AltSerializer));
}

// =============================================================================
// Property 3: Cross-format rejection
// =============================================================================

#[test]
fn test_detect_existing_snapshot_from_unknown_strategy() {
    let temp_dir = TempDir::new().unwrap();

    let first = create_engine(temp_dir.path(), "altsnapshot", AltSerializer);
    append_take_snapshot_and_close(&first);
    drop(first);

    // Reopening with a configuration that only knows `snapshot` must
    // refuse to start rather than silently ignore the newer snapshot.
    let err = EngineBuilder::<String, AppendTransaction>::new("initial".to_string())
        .directory(temp_dir.path())
        .serializer("snapshot", JsonSerializer::new())
        .build_configured()
        .unwrap_err();

    let message = format!("{}", err);
    assert!(message.contains("000000000000000000002.altsnapshot"));
    assert!(message.ends_with("cannot be read; only [snapshot] supported"));
    assert!(matches!(err, EngineError::Recovery(_)));
}

// =============================================================================
// Property 4: Multi-strategy read, single-strategy write
// =============================================================================

#[test]
fn test_multiple_strategies_read_primary_writes() {
    let temp_dir = TempDir::new().unwrap();

    // History was written in the alternate format.
    let first = create_engine(temp_dir.path(), "altsnapshot", AltSerializer);
    append_take_snapshot_and_close(&first);
    drop(first);
    fs::remove_file(temp_dir.path().join("000000000000000000001.journal")).unwrap();

    // A registry with JSON primary and the alternate as secondary can
    // still read the historical snapshot...
    let second = EngineBuilder::new("initial".to_string())
        .directory(temp_dir.path())
        .serializer("snapshot", JsonSerializer::new())
        .serializer("altsnapshot", AltSerializer)
        .build_configured()
        .unwrap();
    assert_eq!(second.query(|s| s.clone()), "initial one two");

    // ...but any new snapshot is written by the primary, never the
    // secondary, even though the secondary was readable.
    second.execute(AppendTransaction::new(" three")).unwrap();
    second.take_snapshot().unwrap();
    second.close().unwrap();
    drop(second);

    assert!(temp_dir.path().join("000000000000000000003.snapshot").exists());
    assert!(!temp_dir.path().join("000000000000000000003.altsnapshot").exists());

    // The new snapshot is readable with the primary format alone.
    let third = create_engine(temp_dir.path(), "snapshot", JsonSerializer::new());
    assert_eq!(third.query(|s| s.clone()), "initial one two three");
    third.close().unwrap();
}

// =============================================================================
// Property 5: Transient isolation
// =============================================================================

#[test]
fn test_transient_engines_do_not_share_state() {
    let initial = String::from("initial");

    let first: StringEngine = EngineBuilder::new(initial.clone())
        .transient(true)
        .build()
        .unwrap();
    let second: StringEngine = EngineBuilder::new(initial)
        .transient(true)
        .build()
        .unwrap();

    assert_eq!(first.query(|s| s.clone()), "initial");
    second.execute(AppendTransaction::new(" added")).unwrap();

    assert_eq!(first.query(|s| s.clone()), "initial");
    assert_eq!(second.query(|s| s.clone()), "initial added");
}

#[test]
fn test_transient_engine_with_directory_still_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let engine: StringEngine = EngineBuilder::new("initial".to_string())
        .directory(temp_dir.path())
        .transient(true)
        .build()
        .unwrap();

    engine.execute(AppendTransaction::new(" added")).unwrap();
    assert_eq!(engine.query(|s| s.clone()), "initial added");
    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

// =============================================================================
// Property 6: Sequence monotonicity
// =============================================================================

#[test]
fn test_snapshot_supersedes_journals_and_old_journals_are_deletable() {
    let temp_dir = TempDir::new().unwrap();

    let engine = create_engine(temp_dir.path(), "snapshot", JsonSerializer::new());
    engine.execute(AppendTransaction::new(" one")).unwrap();
    engine.execute(AppendTransaction::new(" two")).unwrap();
    let snapshot_sequence = engine.take_snapshot().unwrap();
    engine.execute(AppendTransaction::new(" three")).unwrap();
    engine.close().unwrap();
    drop(engine);

    // The snapshot sequence is strictly greater than the journal file it
    // supersedes, and the live journal is strictly newer again.
    assert_eq!(snapshot_sequence, 2);
    assert!(temp_dir.path().join("000000000000000000001.journal").exists());
    assert!(temp_dir.path().join("000000000000000000002.snapshot").exists());
    assert!(temp_dir.path().join("000000000000000000003.journal").exists());

    // Deleting the fully-superseded journal must not affect reopen.
    fs::remove_file(temp_dir.path().join("000000000000000000001.journal")).unwrap();

    let reopened = create_engine(temp_dir.path(), "snapshot", JsonSerializer::new());
    assert_eq!(reopened.query(|s| s.clone()), "initial one two three");
    assert_eq!(reopened.sequence(), 3);
    reopened.close().unwrap();
}

#[test]
fn test_sequence_continues_across_reopen() {
    let temp_dir = TempDir::new().unwrap();

    let engine = create_engine(temp_dir.path(), "snapshot", JsonSerializer::new());
    engine.execute(AppendTransaction::new(" one")).unwrap();
    engine.close().unwrap();
    drop(engine);

    let reopened = create_engine(temp_dir.path(), "snapshot", JsonSerializer::new());
    assert_eq!(reopened.sequence(), 1);
    reopened.execute(AppendTransaction::new(" two")).unwrap();
    assert_eq!(reopened.sequence(), 2);
    reopened.close().unwrap();
    drop(reopened);

    let third = create_engine(temp_dir.path(), "snapshot", JsonSerializer::new());
    assert_eq!(third.query(|s| s.clone()), "initial one two");
}
