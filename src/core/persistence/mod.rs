//=========================================================================
// Persistence Module
//=========================================================================
//
// Snapshot capture/restore and slot-addressed storage.
//
// Architecture:
//   PersistencePipeline
//     ├─ providers: ProviderSlot<PlayerState>, ProviderSlot<WorldState>
//     └─ storage:   Arc<dyn StorageBackend>
//
//=========================================================================

//=== Module Declarations =================================================

mod pipeline;
mod provider;
mod snapshot;
mod storage;

//=== Public API ==========================================================

pub use pipeline::{slot_key, PersistenceError, PersistencePipeline, SAVE_DIRECTORY, SNAPSHOT_EXTENSION};
pub use provider::{StateCell, StateProvider};
pub use snapshot::{PlayerState, Snapshot, SubDocument, WorldState};
pub use storage::{LocalFileStorage, MemoryStorage, StorageBackend, StorageConfig, StorageError};
