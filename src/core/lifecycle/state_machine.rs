//=========================================================================
// Lifecycle State Machine
//=========================================================================
//
// Owns the run state and the pending snapshot, turns host commands into
// transitions, and finalizes loads when the sequencer reports them.
//
// Tick:
//   sequencer.poll() → bus → notice queue → handle_notice() → apply_state()
//
// Every change of run state publishes `StateChanged`; requests that would
// not change it publish nothing.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;
use std::sync::Arc;

use log::{debug, error, info, warn};
use rand::Rng;
use thiserror::Error;

//=== Internal Dependencies ===============================================

use super::notice_queue::{Notice, NoticeQueue};
use super::{NoEffects, RunState, StateEffects};
use crate::core::event_bus::{EventBus, EventKind, EventPayload, Listener};
use crate::core::loader::{LoadError, LoadProgress, LoadSequencer, ResourceId};
use crate::core::persistence::{PersistenceError, PersistencePipeline, Snapshot};

//=== Configuration =======================================================

/// Resource names and slots the state machine works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Resource loaded for the main menu.
    pub menu_resource: ResourceId,
    /// Resource loaded for active play.
    pub gameplay_resource: ResourceId,
    /// Slot written by `exit_game()`.
    pub autosave_slot: String,
    /// Whether `boot()` loads the menu resource.
    pub load_menu_on_start: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            menu_resource: ResourceId::new("MainMenu"),
            gameplay_resource: ResourceId::new("GameScene"),
            autosave_slot: "autosave".to_string(),
            load_menu_on_start: true,
        }
    }
}

/// Produces world seeds for new games.
pub type SeedSource = Box<dyn FnMut() -> u64 + Send>;

/// Default seed source: uniform in `0..1_000_000`.
pub fn random_seed() -> u64 {
    rand::thread_rng().gen_range(0..1_000_000)
}

//=== Errors ==============================================================

/// Commands accepted by the state machine, named in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleCommand {
    Boot,
    StartNewGame,
    LoadGame,
    SaveGame,
    TogglePause,
    ReturnToMenu,
    ExitGame,
}

impl fmt::Display for LifecycleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boot => "boot",
            Self::StartNewGame => "start new game",
            Self::LoadGame => "load game",
            Self::SaveGame => "save game",
            Self::TogglePause => "toggle pause",
            Self::ReturnToMenu => "return to menu",
            Self::ExitGame => "exit game",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot {command} while {state}")]
    InvalidTransition {
        command: LifecycleCommand,
        state: RunState,
    },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

//=== PendingSnapshot =====================================================

/// Where a pending snapshot came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOrigin {
    NewGame,
    Slot(String),
}

/// Snapshot awaiting (or retained after) application by gameplay.
///
/// Published once via `DataReady` when play becomes active, then kept
/// for late readers until the next new/load request replaces it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSnapshot {
    snapshot: Arc<Snapshot>,
    origin: SnapshotOrigin,
    applied: bool,
}

impl PendingSnapshot {
    fn new(snapshot: Snapshot, origin: SnapshotOrigin) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            origin,
            applied: false,
        }
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    pub fn origin(&self) -> &SnapshotOrigin {
        &self.origin
    }

    /// True once the snapshot has been published via `DataReady`.
    pub fn is_applied(&self) -> bool {
        self.applied
    }
}

//=== LifecycleStateMachine ===============================================

/// Owner of the canonical [`RunState`].
pub struct LifecycleStateMachine {
    state: RunState,
    config: LifecycleConfig,
    bus: Arc<EventBus>,
    persistence: Arc<PersistencePipeline>,
    sequencer: LoadSequencer,
    notices: NoticeQueue,
    subscriptions: Vec<(EventKind, Listener)>,
    effects: Box<dyn StateEffects>,
    seed_source: SeedSource,
    pending: Option<PendingSnapshot>,
}

impl LifecycleStateMachine {
    //--- Construction -----------------------------------------------------

    /// Creates the machine in `MainMenu` and subscribes it to load events.
    pub fn new(
        config: LifecycleConfig,
        bus: Arc<EventBus>,
        persistence: Arc<PersistencePipeline>,
        sequencer: LoadSequencer,
    ) -> Self {
        let notices = NoticeQueue::new();
        let subscriptions = vec![
            (EventKind::ContentReady, notices.forwarder(Notice::content_ready)),
            (EventKind::LoadFailed, notices.forwarder(Notice::load_failed)),
        ];
        for (kind, listener) in &subscriptions {
            bus.subscribe(*kind, listener);
        }

        Self {
            state: RunState::MainMenu,
            config,
            bus,
            persistence,
            sequencer,
            notices,
            subscriptions,
            effects: Box::new(NoEffects),
            seed_source: Box::new(random_seed),
            pending: None,
        }
    }

    /// Replaces the state-entry side effects.
    pub fn with_effects(mut self, effects: impl StateEffects + 'static) -> Self {
        self.effects = Box::new(effects);
        self
    }

    /// Replaces the world seed source used by `start_new_game`.
    pub fn with_seed_source(mut self, seed_source: impl FnMut() -> u64 + Send + 'static) -> Self {
        self.seed_source = Box::new(seed_source);
        self
    }

    //--- Commands ---------------------------------------------------------

    /// Loads the menu resource if configured to do so at startup.
    pub fn boot(&mut self) -> Result<(), LifecycleError> {
        if !self.config.load_menu_on_start {
            debug!("Menu preload disabled; staying in {}", self.state);
            return Ok(());
        }

        self.require(LifecycleCommand::Boot, &[RunState::MainMenu])?;
        self.sequencer.begin_load(self.config.menu_resource.clone())?;
        self.apply_state(RunState::Loading);
        Ok(())
    }

    /// Starts a fresh run with default data and a new world seed.
    pub fn start_new_game(&mut self) -> Result<(), LifecycleError> {
        self.require(LifecycleCommand::StartNewGame, &[RunState::MainMenu])?;

        let seed = (self.seed_source)();
        let snapshot = self.persistence.new_game(seed);
        info!("Starting new game (seed {})", seed);

        self.begin_gameplay_load(snapshot, SnapshotOrigin::NewGame)
    }

    /// Resumes the run stored in `slot`.
    ///
    /// If the slot cannot be read the state stays `MainMenu` and the
    /// previous pending snapshot is kept.
    pub fn load_game(&mut self, slot: &str) -> Result<(), LifecycleError> {
        self.require(LifecycleCommand::LoadGame, &[RunState::MainMenu])?;

        let snapshot = self.persistence.load(slot).map_err(|err| {
            warn!("Load failed for slot '{}': {}", slot, err);
            err
        })?;

        self.begin_gameplay_load(snapshot, SnapshotOrigin::Slot(slot.to_string()))?;
        self.bus
            .publish(EventKind::GameLoaded, &EventPayload::Slot(slot.to_string()));
        Ok(())
    }

    /// Captures the current state into `slot`.
    pub fn save_game(&mut self, slot: &str) -> Result<Arc<Snapshot>, LifecycleError> {
        self.require(
            LifecycleCommand::SaveGame,
            &[
                RunState::MainMenu,
                RunState::Loading,
                RunState::Active,
                RunState::Paused,
            ],
        )?;

        let snapshot = Arc::new(self.persistence.save(slot)?);
        self.bus
            .publish(EventKind::GameSaved, &EventPayload::Slot(slot.to_string()));
        Ok(snapshot)
    }

    /// Flips between `Active` and `Paused`; does nothing in other states.
    ///
    /// Returns true if the state changed.
    pub fn toggle_pause(&mut self) -> bool {
        match self.state {
            RunState::Active => self.apply_state(RunState::Paused),
            RunState::Paused => self.apply_state(RunState::Active),
            other => {
                debug!("Ignoring pause toggle while {}", other);
                false
            }
        }
    }

    /// Leaves play and loads the main menu.
    pub fn return_to_menu(&mut self) -> Result<(), LifecycleError> {
        self.require(
            LifecycleCommand::ReturnToMenu,
            &[RunState::Active, RunState::Paused],
        )?;

        self.sequencer.begin_load(self.config.menu_resource.clone())?;
        self.apply_state(RunState::Loading);
        Ok(())
    }

    /// Autosaves (best effort) and enters `ShuttingDown`.
    pub fn exit_game(&mut self) {
        if self.state == RunState::ShuttingDown {
            return;
        }

        let slot = self.config.autosave_slot.clone();
        match self.persistence.save(&slot) {
            Ok(_) => {
                info!("Autosaved to '{}'", slot);
                self.bus
                    .publish(EventKind::GameSaved, &EventPayload::Slot(slot));
            }
            Err(err) => error!("Autosave before exit failed: {}", err),
        }

        self.apply_state(RunState::ShuttingDown);
    }

    //--- Update Loop ------------------------------------------------------

    /// Advances in-flight loads and applies queued load notifications.
    ///
    /// Call once per control-loop tick. Never blocks.
    pub fn tick(&mut self) -> RunState {
        if let Some(outcome) = self.sequencer.poll() {
            debug!("Load finished: {:?}", outcome);
        }

        if self.notices.is_empty() {
            return self.state;
        }

        for notice in self.notices.take() {
            self.handle_notice(notice);
        }

        self.state
    }

    //--- Query API --------------------------------------------------------

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// The snapshot of the latest new/load request, applied or not.
    ///
    /// Late subscribers read this instead of waiting for a replay of
    /// `DataReady`.
    pub fn pending_snapshot(&self) -> Option<&PendingSnapshot> {
        self.pending.as_ref()
    }

    pub fn load_progress(&self) -> LoadProgress {
        self.sequencer.progress()
    }

    /// Access to the sequencer, e.g. to hold the activation gate.
    pub fn sequencer_mut(&mut self) -> &mut LoadSequencer {
        &mut self.sequencer
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state == RunState::ShuttingDown
    }

    //--- Internal Helpers -------------------------------------------------

    fn require(&self, command: LifecycleCommand, allowed: &[RunState]) -> Result<(), LifecycleError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(LifecycleError::InvalidTransition {
                command,
                state: self.state,
            })
        }
    }

    fn begin_gameplay_load(
        &mut self,
        snapshot: Snapshot,
        origin: SnapshotOrigin,
    ) -> Result<(), LifecycleError> {
        let previous = self.pending.replace(PendingSnapshot::new(snapshot, origin));

        if let Err(err) = self.sequencer.begin_load(self.config.gameplay_resource.clone()) {
            self.pending = previous;
            return Err(err.into());
        }

        self.apply_state(RunState::Loading);
        Ok(())
    }

    fn handle_notice(&mut self, notice: Notice) {
        if self.state != RunState::Loading {
            debug!("Ignoring {:?} while {}", notice, self.state);
            return;
        }

        match notice {
            Notice::ContentReady(resource) if resource == self.config.gameplay_resource => {
                self.enter_active();
            }
            Notice::ContentReady(resource) if resource == self.config.menu_resource => {
                self.apply_state(RunState::MainMenu);
            }
            Notice::ContentReady(resource) => {
                debug!("Ignoring unrelated content {}", resource);
            }
            Notice::LoadFailed { resource, reason } => {
                error!("Could not load {}: {}; returning to menu", resource, reason);
                self.apply_state(RunState::MainMenu);
            }
        }
    }

    fn enter_active(&mut self) {
        self.apply_state(RunState::Active);

        let Some(pending) = self.pending.as_mut() else {
            warn!("Gameplay became active without pending data");
            return;
        };

        pending.applied = true;
        let snapshot = Arc::clone(&pending.snapshot);
        self.bus
            .publish(EventKind::DataReady, &EventPayload::Snapshot(snapshot));
    }

    /// Sets the run state. Returns false (and publishes nothing) if the
    /// state is unchanged.
    fn apply_state(&mut self, next: RunState) -> bool {
        if self.state == next {
            return false;
        }

        let previous = std::mem::replace(&mut self.state, next);
        info!("Run state: {} -> {}", previous, next);

        self.effects.on_enter(next);
        self.bus
            .publish(EventKind::StateChanged, &EventPayload::State(next));
        true
    }
}

impl Drop for LifecycleStateMachine {
    fn drop(&mut self) {
        for (kind, listener) in &self.subscriptions {
            self.bus.unsubscribe(*kind, listener);
        }
    }
}

//=========================================================================
// Tests
//=========================================================================
