//=========================================================================
// Content Sources
//=========================================================================
//
// Capability boundary between the sequencer and whatever actually moves
// content into memory (asset streaming, scene construction, ...).
//
// A `ContentSource` opens one `LoadOperation` per load. The operation is
// moved to the sequencer's worker thread and driven there:
//
//   advance() → raw progress ... ≥ ACTIVATION_THRESHOLD → (gate) → activate()
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use thiserror::Error;

//=== Internal Dependencies ===============================================

use super::{ResourceId, ACTIVATION_THRESHOLD};

//=== LoadError ===========================================================

/// Failures raised while starting or running a content load.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    /// A load is already in flight on this sequencer.
    #[error("cannot load {requested}: {resource} is still loading")]
    AlreadyLoading {
        resource: ResourceId,
        requested: ResourceId,
    },

    /// The content source does not know the resource.
    #[error("unknown resource {0}")]
    UnknownResource(ResourceId),

    /// The transfer phase failed.
    #[error("transfer of {resource} failed: {reason}")]
    Transfer { resource: ResourceId, reason: String },

    /// Final activation failed.
    #[error("activation of {resource} failed: {reason}")]
    Activation { resource: ResourceId, reason: String },

    /// The worker thread disappeared without reporting an outcome.
    #[error("load worker for {0} stopped unexpectedly")]
    WorkerLost(ResourceId),

    /// The worker thread could not be started.
    #[error("could not start load worker for {resource}: {reason}")]
    Spawn { resource: ResourceId, reason: String },
}

//=== Capability Traits ===================================================

/// Opens load operations for named resources.
pub trait ContentSource: Send + Sync {
    /// Prepares a load of `resource`. Called on the control thread.
    fn open(&self, resource: &ResourceId) -> Result<Box<dyn LoadOperation>, LoadError>;
}

/// One in-flight load, driven on the worker thread.
pub trait LoadOperation: Send {
    /// Performs a slice of transfer work and returns raw progress in
    /// `[0, 1]`. The worker keeps calling this until the returned value
    /// reaches [`ACTIVATION_THRESHOLD`].
    fn advance(&mut self) -> Result<f32, LoadError>;

    /// Commits the loaded content. Only called once the sequencer has
    /// authorized activation.
    fn activate(&mut self) -> Result<(), LoadError>;
}

//=== SimulatedContentSource ==============================================

/// Content source that fakes transfer work with fixed-size sleeps.
///
/// Used by hosts without a real asset pipeline and by tests.
#[derive(Debug, Clone)]
pub struct SimulatedContentSource {
    steps: u32,
    step_delay: Duration,
    known: Option<HashSet<ResourceId>>,
}

impl SimulatedContentSource {
    /// Creates a source that needs `steps` transfer slices of `step_delay`
    /// each and accepts any resource name.
    pub fn new(steps: u32, step_delay: Duration) -> Self {
        Self {
            steps,
            step_delay,
            known: None,
        }
    }

    /// Restricts the source to the given resources.
    pub fn with_resources<I, R>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ResourceId>,
    {
        self.known = Some(resources.into_iter().map(Into::into).collect());
        self
    }
}

impl Default for SimulatedContentSource {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(20))
    }
}

impl ContentSource for SimulatedContentSource {
    fn open(&self, resource: &ResourceId) -> Result<Box<dyn LoadOperation>, LoadError> {
        if let Some(known) = &self.known {
            if !known.contains(resource) {
                return Err(LoadError::UnknownResource(resource.clone()));
            }
        }

        Ok(Box::new(SimulatedOperation {
            done: 0,
            steps: self.steps,
            step_delay: self.step_delay,
        }))
    }
}

struct SimulatedOperation {
    done: u32,
    steps: u32,
    step_delay: Duration,
}

impl LoadOperation for SimulatedOperation {
    fn advance(&mut self) -> Result<f32, LoadError> {
        if self.done >= self.steps {
            return Ok(ACTIVATION_THRESHOLD);
        }

        thread::sleep(self.step_delay);
        self.done += 1;
        Ok(ACTIVATION_THRESHOLD * (self.done as f32 / self.steps as f32))
    }

    fn activate(&mut self) -> Result<(), LoadError> {
        thread::sleep(self.step_delay);
        Ok(())
    }
}

//=========================================================================
// Tests
//=========================================================================
