//=========================================================================
// Core Systems
//
// Lifecycle subsystems running on the control thread, plus the worker
// side of content loading.
//
// Responsibilities:
// - Publish/subscribe notifications between decoupled subsystems
// - Drive content loads off-thread with progress and gated activation
// - Capture, store and restore gameplay state
// - Own the canonical run state and its transitions
// - Receive host commands over a bounded channel
//
// Dependency order (leaves first):
//   event_bus → persistence → loader → lifecycle → host_bridge
//
//=========================================================================

//=== Module Declarations =================================================

pub mod event_bus;
pub mod host_bridge;
pub mod lifecycle;
pub mod loader;
pub mod persistence;

//=== Public API ==========================================================

pub use event_bus::{EventBus, EventKind, EventPayload, Listener, ListenerFailure, ListenerResult};
pub use host_bridge::HostCommand;
pub use lifecycle::{
    LifecycleConfig, LifecycleError, LifecycleStateMachine, PendingSnapshot, RunState,
    StateEffects, TimeScale,
};
pub use loader::{
    ContentSource, LoadError, LoadOperation, LoadProgress, LoadSequencer, ResourceId,
    SimulatedContentSource,
};
pub use persistence::{
    PersistenceError, PersistencePipeline, PlayerState, Snapshot, StateCell, StateProvider,
    StorageBackend, StorageConfig, WorldState,
};

//=== TickControl =========================================================

/// Control loop signal returned by per-tick collectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickControl {
    Continue,
    Exit,
}
