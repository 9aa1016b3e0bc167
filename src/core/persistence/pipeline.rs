//=========================================================================
// Persistence Pipeline
//=========================================================================
//
// Bridges live gameplay state and stored snapshots.
//
// Flow:
//   save(slot)  → capture() → providers → Snapshot → JSON → backend.write
//   load(slot)  → backend.read → JSON → Snapshot
//   restore(s)  → sub-documents → providers
//
// Missing providers degrade to defaults (capture) or are skipped
// (restore); neither is an error.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;

//=== Internal Dependencies ===============================================

use super::provider::{ProviderSlot, StateProvider};
use super::storage::{StorageBackend, StorageError};
use super::{PlayerState, Snapshot, SubDocument, WorldState};

//=== Constants ===========================================================

/// Directory (key prefix) that holds every slot.
pub const SAVE_DIRECTORY: &str = "saves";

/// File extension of stored snapshots.
pub const SNAPSHOT_EXTENSION: &str = "json";

//=== PersistenceError ====================================================

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("save slot '{slot}' not found")]
    SlotNotFound { slot: String },

    #[error("save slot '{slot}' is corrupt: {source}")]
    SlotCorrupt {
        slot: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not write save slot '{slot}': {source}")]
    StorageWriteFailed {
        slot: String,
        #[source]
        source: StorageError,
    },

    #[error("could not read save slot '{slot}': {source}")]
    StorageReadFailed {
        slot: String,
        #[source]
        source: StorageError,
    },

    #[error("invalid save slot name '{slot}': {reason}")]
    InvalidSlot { slot: String, reason: &'static str },

    #[error("snapshot for slot '{slot}' has a non-finite {field}")]
    NonFiniteValue { slot: String, field: &'static str },

    #[error("could not serialize snapshot for slot '{slot}': {source}")]
    Serialize {
        slot: String,
        #[source]
        source: serde_json::Error,
    },
}

//=== Slot Keys ===========================================================

/// Storage key for `slot`: `saves/<slot>.json`.
pub fn slot_key(slot: &str) -> Result<String, PersistenceError> {
    let invalid = |reason| PersistenceError::InvalidSlot {
        slot: slot.to_string(),
        reason,
    };

    if slot.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if slot.contains(['/', '\\']) {
        return Err(invalid("name contains a path separator"));
    }
    if slot.starts_with('.') {
        return Err(invalid("name starts with '.'"));
    }

    Ok(format!("{SAVE_DIRECTORY}/{slot}.{SNAPSHOT_EXTENSION}"))
}

//=== PersistencePipeline =================================================

/// Captures, restores, saves and loads snapshots.
///
/// Shared as `Arc<PersistencePipeline>`; every operation takes `&self`.
pub struct PersistencePipeline {
    storage: Arc<dyn StorageBackend>,
    app_version: String,
    player: ProviderSlot<PlayerState>,
    world: ProviderSlot<WorldState>,
}

impl PersistencePipeline {
    //--- Construction -----------------------------------------------------

    pub fn new(storage: Arc<dyn StorageBackend>, app_version: impl Into<String>) -> Self {
        Self {
            storage,
            app_version: app_version.into(),
            player: ProviderSlot::new(),
            world: ProviderSlot::new(),
        }
    }

    /// Version string stamped into every snapshot.
    pub fn app_version(&self) -> &str {
        &self.app_version
    }

    //--- Providers --------------------------------------------------------

    pub fn register_player(&self, provider: Arc<dyn StateProvider<PlayerState>>) {
        register(&self.player, provider);
    }

    pub fn register_world(&self, provider: Arc<dyn StateProvider<WorldState>>) {
        register(&self.world, provider);
    }

    pub fn unregister_player(&self) -> bool {
        self.player.unregister()
    }

    pub fn unregister_world(&self) -> bool {
        self.world.unregister()
    }

    /// Names of the sub-documents that currently have no provider.
    pub fn missing_providers(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.player.is_registered() {
            missing.push(PlayerState::NAME);
        }
        if !self.world.is_registered() {
            missing.push(WorldState::NAME);
        }
        missing
    }

    //--- Capture / Restore ------------------------------------------------

    /// Assembles a fresh snapshot from the registered providers.
    ///
    /// Absent providers contribute their sub-document's default.
    pub fn capture(&self) -> Snapshot {
        Snapshot::new(
            self.app_version.clone(),
            capture_or_default(&self.player),
            capture_or_default(&self.world),
        )
    }

    /// Hands each sub-document of `snapshot` to its provider.
    ///
    /// Returns the names of sub-documents that had no provider to receive
    /// them.
    pub fn restore(&self, snapshot: &Snapshot) -> Vec<&'static str> {
        let mut skipped = Vec::new();
        if !apply_or_skip(&self.player, snapshot.player()) {
            skipped.push(PlayerState::NAME);
        }
        if !apply_or_skip(&self.world, snapshot.world()) {
            skipped.push(WorldState::NAME);
        }
        skipped
    }

    /// Default snapshot for a new run on `seed`.
    pub fn new_game(&self, seed: u64) -> Snapshot {
        Snapshot::new_game(self.app_version.clone(), seed)
    }

    //--- Storage ----------------------------------------------------------

    /// Captures the current state and writes it to `slot`.
    ///
    /// On failure the previously stored snapshot for `slot` is untouched.
    pub fn save(&self, slot: &str) -> Result<Snapshot, PersistenceError> {
        let key = slot_key(slot)?;
        let snapshot = self.capture();
        self.write_to(slot, &key, &snapshot)?;
        Ok(snapshot)
    }

    /// Writes an already captured snapshot to `slot`.
    pub fn write(&self, slot: &str, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let key = slot_key(slot)?;
        self.write_to(slot, &key, snapshot)
    }

    /// Reads and parses the snapshot stored in `slot`.
    pub fn load(&self, slot: &str) -> Result<Snapshot, PersistenceError> {
        let key = slot_key(slot)?;

        let bytes = self.storage.read(&key).map_err(|source| match source {
            StorageError::NotFound(_) => PersistenceError::SlotNotFound {
                slot: slot.to_string(),
            },
            source => PersistenceError::StorageReadFailed {
                slot: slot.to_string(),
                source,
            },
        })?;

        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|source| PersistenceError::SlotCorrupt {
                slot: slot.to_string(),
                source,
            })?;

        info!(
            "Loaded slot '{}' (saved {}, version {})",
            slot,
            snapshot.saved_at(),
            snapshot.version()
        );
        Ok(snapshot)
    }

    //--- Internal Helpers -------------------------------------------------

    fn write_to(&self, slot: &str, key: &str, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        // JSON has no NaN or infinity; serde_json would write `null` and the
        // slot could never be read back.
        if let Some(field) = snapshot.non_finite_field() {
            warn!("Refusing to save slot '{}': {} is not finite", slot, field);
            return Err(PersistenceError::NonFiniteValue {
                slot: slot.to_string(),
                field,
            });
        }

        let text =
            serde_json::to_vec_pretty(snapshot).map_err(|source| PersistenceError::Serialize {
                slot: slot.to_string(),
                source,
            })?;

        self.storage
            .write(key, &text)
            .map_err(|source| PersistenceError::StorageWriteFailed {
                slot: slot.to_string(),
                source,
            })?;

        info!("Saved slot '{}' -> {}", slot, key);
        Ok(())
    }
}

fn register<D: SubDocument>(slot: &ProviderSlot<D>, provider: Arc<dyn StateProvider<D>>) {
    if slot.register(provider) {
        warn!("Replaced existing {} provider", D::NAME);
    } else {
        debug!("Registered {} provider", D::NAME);
    }
}

fn capture_or_default<D: SubDocument>(slot: &ProviderSlot<D>) -> D {
    slot.capture().unwrap_or_else(|| {
        warn!("No {} provider registered; capturing defaults", D::NAME);
        D::default()
    })
}

fn apply_or_skip<D: SubDocument>(slot: &ProviderSlot<D>, document: &D) -> bool {
    let applied = slot.apply(document);
    if !applied {
        warn!("No {} provider registered; skipping restore", D::NAME);
    }
    applied
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::persistence::{LocalFileStorage, MemoryStorage, StateCell};

    fn pipeline() -> (PersistencePipeline, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (PersistencePipeline::new(storage.clone(), "1.2.0"), storage)
    }

    fn player(name: &str, x: f32) -> PlayerState {
        PlayerState {
            name: name.to_string(),
            credits: 250.0,
            position: [x, 1.5, -4.0],
            rotation: [0.0, 0.7071, 0.0, 0.7071],
        }
    }

    #[test]
    fn slot_key_is_derived_from_name() {
        assert_eq!(slot_key("slotA").unwrap(), "saves/slotA.json");
        assert_eq!(slot_key("autosave").unwrap(), "saves/autosave.json");
    }

    #[test]
    fn slot_key_rejects_unsafe_names() {
        for bad in ["", "   ", "../escape", "a/b", "a\\b", ".hidden"] {
            assert!(
                matches!(slot_key(bad), Err(PersistenceError::InvalidSlot { .. })),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn capture_reads_registered_providers() {
        let (pipeline, _) = pipeline();
        let p = Arc::new(StateCell::new(player("Vega", 3.0)));
        let w = Arc::new(StateCell::new(WorldState {
            seed: 77,
            game_time: 360.0,
        }));
        pipeline.register_player(p);
        pipeline.register_world(w);

        let snapshot = pipeline.capture();
        assert_eq!(snapshot.version(), "1.2.0");
        assert_eq!(snapshot.player(), &player("Vega", 3.0));
        assert_eq!(snapshot.world().seed, 77);
        assert!(pipeline.missing_providers().is_empty());
    }

    #[test]
    fn capture_without_providers_uses_defaults() {
        let (pipeline, _) = pipeline();
        assert_eq!(pipeline.missing_providers(), vec!["player", "world"]);

        let snapshot = pipeline.capture();
        assert_eq!(snapshot.player(), &PlayerState::default());
        assert_eq!(snapshot.world(), &WorldState::default());
    }

    #[test]
    fn capture_then_restore_round_trips() {
        let (pipeline, _) = pipeline();
        let p = Arc::new(StateCell::new(player("Vega", 3.0)));
        let w = Arc::new(StateCell::new(WorldState {
            seed: 5,
            game_time: 12.0,
        }));
        pipeline.register_player(p.clone());
        pipeline.register_world(w.clone());

        let captured = pipeline.capture();
        assert!(pipeline.restore(&captured).is_empty());

        let again = pipeline.capture();
        assert!(again.same_state_as(&captured));
        assert_eq!(p.get(), *captured.player());
        assert_eq!(w.get(), *captured.world());
    }

    #[test]
    fn restore_overwrites_provider_state() {
        let (pipeline, _) = pipeline();
        let p = Arc::new(StateCell::new(player("Old", 0.0)));
        pipeline.register_player(p.clone());

        let snapshot = Snapshot::new("1.2.0", player("New", 9.0), WorldState::default());
        let skipped = pipeline.restore(&snapshot);

        assert_eq!(skipped, vec!["world"]);
        assert_eq!(p.get().name, "New");
        assert_eq!(p.get().position[0], 9.0);
    }

    #[test]
    fn unregistered_provider_is_no_longer_consulted() {
        let (pipeline, _) = pipeline();
        pipeline.register_player(Arc::new(StateCell::new(player("Gone", 1.0))));
        assert!(pipeline.unregister_player());
        assert!(!pipeline.unregister_player());

        assert_eq!(pipeline.capture().player(), &PlayerState::default());
    }

    #[test]
    fn save_then_load_round_trips_sub_documents() {
        let (pipeline, storage) = pipeline();
        pipeline.register_player(Arc::new(StateCell::new(player("Vega", 3.0))));
        pipeline.register_world(Arc::new(StateCell::new(WorldState {
            seed: 8,
            game_time: 99.5,
        })));

        let saved = pipeline.save("slotA").unwrap();
        assert!(storage.contains("saves/slotA.json"));

        let loaded = pipeline.load("slotA").unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.player(), &player("Vega", 3.0));
        assert_eq!(loaded.world().game_time, 99.5);
    }

    #[test]
    fn stored_document_is_pretty_json() {
        let (pipeline, storage) = pipeline();
        pipeline.save("diffable").unwrap();

        let text = String::from_utf8(storage.read("saves/diffable.json").unwrap()).unwrap();
        assert!(text.contains('\n'));
        assert!(text.contains("\"version\": \"1.2.0\""));
    }

    #[test]
    fn load_missing_slot_is_not_found() {
        let (pipeline, _) = pipeline();
        match pipeline.load("missing-slot") {
            Err(PersistenceError::SlotNotFound { slot }) => assert_eq!(slot, "missing-slot"),
            other => panic!("expected SlotNotFound, got {:?}", other),
        }
    }

    #[test]
    fn load_garbage_is_corrupt() {
        let (pipeline, storage) = pipeline();
        storage.write("saves/broken.json", b"{ not json").unwrap();

        assert!(matches!(
            pipeline.load("broken"),
            Err(PersistenceError::SlotCorrupt { .. })
        ));
    }

    #[test]
    fn failed_save_preserves_previous_snapshot_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalFileStorage::new(dir.path()));
        let pipeline = PersistencePipeline::new(storage.clone(), "1.2.0");
        let cell = Arc::new(StateCell::new(player("First", 1.0)));
        pipeline.register_player(cell.clone());

        let first = pipeline.save("slotA").unwrap();

        cell.set(player("Second", 2.0));
        std::fs::create_dir_all(dir.path().join("saves").join("slotA.json.tmp")).unwrap();

        assert!(matches!(
            pipeline.save("slotA"),
            Err(PersistenceError::StorageWriteFailed { .. })
        ));
        assert_eq!(pipeline.load("slotA").unwrap(), first);
    }

    #[test]
    fn non_finite_save_is_rejected_and_previous_slot_survives() {
        let (pipeline, storage) = pipeline();
        let cell = Arc::new(StateCell::new(player("Vega", 3.0)));
        pipeline.register_player(cell.clone());

        let good = pipeline.save("slotA").unwrap();
        let stored = storage.read("saves/slotA.json").unwrap();

        cell.update(|p| p.position[1] = f32::NEG_INFINITY);
        match pipeline.save("slotA") {
            Err(PersistenceError::NonFiniteValue { slot, field }) => {
                assert_eq!(slot, "slotA");
                assert_eq!(field, "player.position");
            }
            other => panic!("expected NonFiniteValue, got {:?}", other),
        }

        assert_eq!(storage.read("saves/slotA.json").unwrap(), stored);
        assert_eq!(pipeline.load("slotA").unwrap(), good);
    }

    #[test]
    fn non_finite_world_time_is_rejected_on_write() {
        let (pipeline, storage) = pipeline();
        let snapshot = Snapshot::new(
            "1.2.0",
            PlayerState::default(),
            WorldState {
                seed: 3,
                game_time: f64::INFINITY,
            },
        );

        assert!(matches!(
            pipeline.write("fresh", &snapshot),
            Err(PersistenceError::NonFiniteValue { field: "world.game_time", .. })
        ));
        assert!(!storage.contains("saves/fresh.json"));
    }

    #[test]
    fn write_stores_given_snapshot() {
        let (pipeline, _) = pipeline();
        let snapshot = pipeline.new_game(31337);
        pipeline.write("fresh", &snapshot).unwrap();

        let loaded = pipeline.load("fresh").unwrap();
        assert_eq!(loaded.world().seed, 31337);
        assert_eq!(loaded.version(), "1.2.0");
    }
}
