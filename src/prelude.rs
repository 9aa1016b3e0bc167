//=========================================================================
// Prelude
//=========================================================================
//
// Convenience module that re-exports commonly used types and traits.
//
// Usage:
//   use aetheric_lifecycle::prelude::*;
//
//=========================================================================

//=== Public API ==========================================================

// Shell
pub use crate::shell::{Shell, ShellBuilder, ShellContext};

// Host commands
pub use crate::core::host_bridge::HostCommand;

// Lifecycle
pub use crate::core::lifecycle::{
    LifecycleConfig, LifecycleError, LifecycleStateMachine, RunState, StateEffects, TimeScale,
};

// Event bus
pub use crate::core::event_bus::{EventBus, EventKind, EventPayload, Listener, ListenerResult};

// Loading
pub use crate::core::loader::{
    ContentSource, LoadError, LoadOperation, LoadProgress, LoadSequencer, ResourceId,
    SimulatedContentSource,
};

// Persistence
pub use crate::core::persistence::{
    PersistenceError, PersistencePipeline, PlayerState, Snapshot, StateCell, StateProvider,
    StorageBackend, StorageConfig, WorldState,
};
