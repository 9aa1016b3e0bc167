//=========================================================================
// Event Topics and Payloads
//=========================================================================
//
// Topic keys for the event bus and the payload carried by one dispatch.
//
// Payloads are owned by the publisher and lent to listeners for the
// duration of a single dispatch (`&EventPayload`).
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::Arc;

//=== Internal Dependencies ===============================================

use crate::core::lifecycle::RunState;
use crate::core::loader::{LoadProgress, ResourceId};
use crate::core::persistence::Snapshot;

//=== EventKind ===========================================================

/// Notification topics listeners can subscribe to.
///
/// New topics may be added without breaking existing subscribers. Hosts
/// that need their own topics can use [`EventKind::Custom`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A content load was accepted by the sequencer. Payload: `Resource`.
    LoadStarted,

    /// The reported load fraction increased. Payload: `Progress`.
    LoadProgressed,

    /// A content load finished transfer and activation. Payload: `Resource`.
    ContentReady,

    /// A content load failed during transfer or activation. Payload: `Failure`.
    LoadFailed,

    /// The run state changed. Payload: `State`.
    StateChanged,

    /// Gameplay data is ready to be applied. Payload: `Snapshot`.
    DataReady,

    /// A snapshot was written to a slot. Payload: `Slot`.
    GameSaved,

    /// A slot was read and its gameplay load began. Payload: `Slot`.
    GameLoaded,

    /// Host-defined topic.
    Custom(&'static str),
}

//=== EventPayload ========================================================

/// Data handed to listeners alongside an [`EventKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    None,
    Resource(ResourceId),
    State(RunState),
    Progress(LoadProgress),
    Snapshot(Arc<Snapshot>),
    Slot(String),
    Failure { resource: ResourceId, reason: String },
}

impl EventPayload {
    /// Returns the resource carried by `Resource` or `Failure` payloads.
    pub fn resource(&self) -> Option<&ResourceId> {
        match self {
            Self::Resource(resource) | Self::Failure { resource, .. } => Some(resource),
            _ => None,
        }
    }

    /// Returns the run state carried by a `State` payload.
    pub fn state(&self) -> Option<RunState> {
        match self {
            Self::State(state) => Some(*state),
            _ => None,
        }
    }

    /// Returns the snapshot carried by a `Snapshot` payload.
    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match self {
            Self::Snapshot(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// Returns the progress carried by a `Progress` payload.
    pub fn progress(&self) -> Option<LoadProgress> {
        match self {
            Self::Progress(progress) => Some(*progress),
            _ => None,
        }
    }
}

impl Default for EventPayload {
    fn default() -> Self {
        Self::None
    }
}

//=========================================================================
// Tests
//=========================================================================
