//=========================================================================
// Loader Module
//=========================================================================
//
// Asynchronous content loading with progress reporting and a gated
// activation step.
//
// Components:
// - `progress`: observable `LoadProgress` and the activation threshold
// - `source`: `ContentSource` / `LoadOperation` capability + simulated impl
// - `sequencer`: `LoadSequencer`, the single-flight driver
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;

//=== Module Declarations =================================================

mod progress;
mod sequencer;
mod source;

//=== Public API ==========================================================

pub use progress::{LoadProgress, ACTIVATION_THRESHOLD};
pub use sequencer::{LoadHandle, LoadOutcome, LoadSequencer};
pub use source::{ContentSource, LoadError, LoadOperation, SimulatedContentSource};

//=== ResourceId ==========================================================

/// Name of a loadable content unit (a scene, a level, a menu).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ResourceId {
    fn from(name: String) -> Self {
        Self(name)
    }
}
