//=========================================================================
// Load Sequencer
//=========================================================================
//
// Drives one content load at a time through two phases:
//
//   1. Transfer:   worker thread calls `advance()` until raw progress
//                  reaches ACTIVATION_THRESHOLD
//   2. Activation: worker parks on the grant channel until the
//                  sequencer authorizes it, then calls `activate()`
//
// Architecture:
// ```text
//  Control Thread:                         Worker Thread:
//  ┌──────────────────────────────┐       ┌──────────────────────┐
//  │ begin_load()                 │ spawn │ advance() loop       │
//  │   └─ publish LoadStarted     │──────>│   └─ Progress(raw)   │
//  │                              │       │ AwaitingActivation   │
//  │ poll() once per tick         │<──────│                      │
//  │   ├─ publish LoadProgressed  │ msgs  │ grant.recv()         │
//  │   ├─ grant activation ───────┼──────>│ activate()           │
//  │   └─ publish ContentReady    │<──────│   └─ Activated       │
//  └──────────────────────────────┘       └──────────────────────┘
// ```
//
// The worker never touches the bus or any orchestration state; every
// event is published from `poll()` on the control thread.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TryRecvError};
use log::{debug, error, info, warn};

//=== Internal Dependencies ===============================================

use super::source::{ContentSource, LoadError, LoadOperation};
use super::{LoadProgress, ResourceId, ACTIVATION_THRESHOLD};
use crate::core::event_bus::{EventBus, EventKind, EventPayload};

//=== Worker Protocol =====================================================

#[derive(Debug)]
enum WorkerMessage {
    Progress(f32),
    AwaitingActivation,
    Activated,
    Failed(LoadError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPhase {
    Transfer,
    AwaitingActivation,
    Activating,
}

//=== LoadHandle ==========================================================

/// Identifies one accepted load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadHandle {
    ticket: u64,
    resource: ResourceId,
}

impl LoadHandle {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn resource(&self) -> &ResourceId {
        &self.resource
    }
}

//=== LoadOutcome =========================================================

/// Terminal result of a load, returned once by [`LoadSequencer::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Ready(ResourceId),
    Failed { resource: ResourceId, error: LoadError },
}

//=== LoadSequencer =======================================================

struct ActiveLoad {
    handle: LoadHandle,
    messages: Receiver<WorkerMessage>,
    grant: Sender<()>,
    phase: LoadPhase,
}

/// Runs content loads with progress reporting and a gated activation step.
pub struct LoadSequencer {
    bus: Arc<EventBus>,
    source: Arc<dyn ContentSource>,
    progress: LoadProgress,
    active: Option<ActiveLoad>,
    hold_activation: bool,
    next_ticket: u64,
}

impl LoadSequencer {
    //--- Construction -----------------------------------------------------

    pub fn new(bus: Arc<EventBus>, source: Arc<dyn ContentSource>) -> Self {
        Self {
            bus,
            source,
            progress: LoadProgress::idle(),
            active: None,
            hold_activation: false,
            next_ticket: 1,
        }
    }

    //--- Load Control -----------------------------------------------------

    /// Starts loading `resource` on a worker thread.
    ///
    /// Returns immediately. Publishes `LoadStarted` before returning, so it
    /// always precedes any progress update for this load.
    pub fn begin_load(&mut self, resource: impl Into<ResourceId>) -> Result<LoadHandle, LoadError> {
        let resource = resource.into();

        if let Some(active) = &self.active {
            return Err(LoadError::AlreadyLoading {
                resource: active.handle.resource.clone(),
                requested: resource,
            });
        }

        let operation = self.source.open(&resource)?;

        let (message_tx, message_rx) = unbounded();
        let (grant_tx, grant_rx) = bounded(1);

        thread::Builder::new()
            .name(format!("load:{}", resource))
            .spawn(move || run_worker(operation, message_tx, grant_rx))
            .map_err(|err| LoadError::Spawn {
                resource: resource.clone(),
                reason: err.to_string(),
            })?;

        let handle = LoadHandle {
            ticket: self.next_ticket,
            resource,
        };
        self.next_ticket += 1;

        self.progress = LoadProgress::idle();
        self.active = Some(ActiveLoad {
            handle: handle.clone(),
            messages: message_rx,
            grant: grant_tx,
            phase: LoadPhase::Transfer,
        });

        info!("Loading {} (ticket {})", handle.resource, handle.ticket);
        self.bus.publish(
            EventKind::LoadStarted,
            &EventPayload::Resource(handle.resource.clone()),
        );

        Ok(handle)
    }

    /// Observes the in-flight load without blocking.
    ///
    /// Call once per control-loop tick. Returns the outcome exactly once,
    /// on the tick the load finishes or fails.
    pub fn poll(&mut self) -> Option<LoadOutcome> {
        let active = self.active.as_ref()?;

        let mut pending = Vec::new();
        let mut disconnected = false;
        loop {
            match active.messages.try_recv() {
                Ok(message) => pending.push(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        for message in pending {
            match message {
                WorkerMessage::Progress(raw) => self.record_progress(raw),
                WorkerMessage::AwaitingActivation => self.set_phase(LoadPhase::AwaitingActivation),
                WorkerMessage::Activated => {
                    let active = self.active.take()?;
                    return Some(self.finish_ready(active.handle.resource));
                }
                WorkerMessage::Failed(error) => {
                    let active = self.active.take()?;
                    return Some(self.finish_failed(active.handle.resource, error));
                }
            }
        }

        if disconnected {
            let active = self.active.take()?;
            let resource = active.handle.resource;
            let error = LoadError::WorkerLost(resource.clone());
            return Some(self.finish_failed(resource, error));
        }

        self.authorize_activation();
        None
    }

    //--- Activation Gate --------------------------------------------------

    /// Keeps the activation gate closed even after transfer completes.
    ///
    /// Lets an observer (a loading screen, a cutscene) choose the instant
    /// content goes live. Passing `false` reopens the gate; the next
    /// `poll()` then authorizes activation if transfer is done.
    pub fn hold_activation(&mut self, hold: bool) {
        self.hold_activation = hold;
    }

    /// Reopens the activation gate.
    pub fn allow_activation(&mut self) {
        self.hold_activation(false);
    }

    /// Returns true if transfer is done and activation is being held back.
    pub fn is_awaiting_activation(&self) -> bool {
        matches!(
            self.active.as_ref().map(|active| active.phase),
            Some(LoadPhase::AwaitingActivation)
        )
    }

    //--- Query API --------------------------------------------------------

    /// Progress of the current load, or of the last finished one.
    pub fn progress(&self) -> LoadProgress {
        self.progress
    }

    pub fn is_loading(&self) -> bool {
        self.active.is_some()
    }

    /// Resource of the in-flight load, if any.
    pub fn current_resource(&self) -> Option<&ResourceId> {
        self.active.as_ref().map(|active| &active.handle.resource)
    }

    //--- Internal Helpers -------------------------------------------------

    fn record_progress(&mut self, raw: f32) {
        if self.progress.record_transfer(raw) {
            self.bus.publish(
                EventKind::LoadProgressed,
                &EventPayload::Progress(self.progress),
            );
        }
    }

    fn set_phase(&mut self, phase: LoadPhase) {
        if let Some(active) = self.active.as_mut() {
            active.phase = phase;
        }
    }

    fn authorize_activation(&mut self) {
        if self.hold_activation {
            return;
        }

        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.phase != LoadPhase::AwaitingActivation {
            return;
        }

        debug!("Authorizing activation of {}", active.handle.resource);
        // The worker only disappears after reporting; a failed send surfaces
        // as a disconnect on the next poll.
        if active.grant.send(()).is_err() {
            warn!("Load worker for {} is gone", active.handle.resource);
        }
        active.phase = LoadPhase::Activating;
    }

    fn finish_ready(&mut self, resource: ResourceId) -> LoadOutcome {
        if self.progress.complete() {
            self.bus.publish(
                EventKind::LoadProgressed,
                &EventPayload::Progress(self.progress),
            );
        }

        info!("Content ready: {}", resource);
        self.bus.publish(
            EventKind::ContentReady,
            &EventPayload::Resource(resource.clone()),
        );

        LoadOutcome::Ready(resource)
    }

    fn finish_failed(&mut self, resource: ResourceId, error: LoadError) -> LoadOutcome {
        self.progress = LoadProgress::idle();

        error!("Load of {} failed: {}", resource, error);
        self.bus.publish(
            EventKind::LoadFailed,
            &EventPayload::Failure {
                resource: resource.clone(),
                reason: error.to_string(),
            },
        );

        LoadOutcome::Failed { resource, error }
    }
}

//=== Worker ==============================================================

// Sends are allowed to fail: a dropped sequencer simply stops listening.
fn run_worker(
    mut operation: Box<dyn LoadOperation>,
    messages: Sender<WorkerMessage>,
    grant: Receiver<()>,
) {
    loop {
        match operation.advance() {
            Ok(raw) => {
                let _ = messages.send(WorkerMessage::Progress(raw));
                if raw >= ACTIVATION_THRESHOLD {
                    break;
                }
            }
            Err(error) => {
                let _ = messages.send(WorkerMessage::Failed(error));
                return;
            }
        }
    }

    let _ = messages.send(WorkerMessage::AwaitingActivation);

    if grant.recv().is_err() {
        return;
    }

    let outcome = match operation.activate() {
        Ok(()) => WorkerMessage::Activated,
        Err(error) => WorkerMessage::Failed(error),
    };
    let _ = messages.send(outcome);
}

//=========================================================================
// Tests
//=========================================================================
