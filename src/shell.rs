//=========================================================================
// Aetheric Shell
//
// Owning context and control loop for the lifecycle subsystems.
//
// Architecture:
// ```text
//     ShellBuilder  ──build()──>  Shell  ──run()/spawn()──>  [Control Loop]
//         │                         │
//         ├─ with_tps()             ├─ EventBus            (Arc, shared)
//         ├─ with_storage()         ├─ PersistencePipeline (Arc, shared)
//         ├─ with_content_source()  ├─ LifecycleStateMachine
//         └─ ...                    └─ CommandCollector ◄── Sender<HostCommand>
// ```
//
// Each tick:
//  1. Drains host commands (bounded)
//  2. Applies them to the state machine
//  3. Advances loads and applies load notices
//  4. Sleeps to keep the fixed tick rate
//
//=========================================================================

//=== External Dependencies ===============================================

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender};
use log::{debug, error, info, warn};

//=== Internal Dependencies ===============================================

use crate::core::host_bridge::{CommandCollector, HostCommand};
use crate::core::lifecycle::{
    LifecycleConfig, LifecycleError, LifecycleStateMachine, RunState, SeedSource, StateEffects,
    TimeScale,
};
use crate::core::loader::{ContentSource, LoadSequencer, ResourceId, SimulatedContentSource};
use crate::core::persistence::{PersistencePipeline, StorageConfig};
use crate::core::{EventBus, EventKind, Listener, TickControl};

//=== ShellBuilder ========================================================

/// Builder for configuring and constructing a [`Shell`].
///
/// # Default Values
///
/// - **TPS**: 60.0 (control loop ticks per second)
/// - **Command capacity**: 64 host commands
/// - **Storage**: files under the working directory
/// - **App version**: this crate's version
/// - **Resources**: `"MainMenu"` and `"GameScene"`
/// - **Autosave slot**: `"autosave"`
///
/// # Examples
///
/// ```no_run
/// use aetheric_lifecycle::{HostCommand, ShellBuilder, StorageConfig};
///
/// let shell = ShellBuilder::new()
///     .with_tps(30.0)
///     .with_storage(StorageConfig::local("./profile"))
///     .with_app_version("1.4.0")
///     .build();
///
/// let commands = shell.commands();
/// let handle = shell.spawn().unwrap();
///
/// commands.send(HostCommand::StartNewGame).unwrap();
/// // ...
/// commands.send(HostCommand::ExitGame).unwrap();
/// handle.join().unwrap();
/// ```
pub struct ShellBuilder {
    tps: f64,
    command_capacity: usize,
    storage: StorageConfig,
    app_version: String,
    config: LifecycleConfig,
    content_source: Option<Arc<dyn ContentSource>>,
    seed_source: Option<SeedSource>,
    effects: Option<Box<dyn StateEffects>>,
}

impl ShellBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            tps: 60.0,
            command_capacity: 64,
            storage: StorageConfig::default(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            config: LifecycleConfig::default(),
            content_source: None,
            seed_source: None,
            effects: None,
        }
    }

    /// Sets the target ticks per second for the control loop.
    ///
    /// Load progress and host commands are observed once per tick, so
    /// this bounds how quickly transitions complete.
    ///
    /// Default: 60.0
    ///
    /// # Panics
    ///
    /// Panics if `tps <= 0.0`.
    pub fn with_tps(mut self, tps: f64) -> Self {
        assert!(tps > 0.0, "TPS must be positive, got {}", tps);
        self.tps = tps;
        self
    }

    /// Sets the capacity of the host → shell command channel.
    ///
    /// Default: 64
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn with_command_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "Command capacity must be positive");
        self.command_capacity = capacity;
        self
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Version string stamped into every snapshot.
    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    pub fn with_menu_resource(mut self, resource: impl Into<ResourceId>) -> Self {
        self.config.menu_resource = resource.into();
        self
    }

    pub fn with_gameplay_resource(mut self, resource: impl Into<ResourceId>) -> Self {
        self.config.gameplay_resource = resource.into();
        self
    }

    /// Slot written on exit.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is empty.
    pub fn with_autosave_slot(mut self, slot: impl Into<String>) -> Self {
        let slot = slot.into();
        assert!(!slot.is_empty(), "Autosave slot must not be empty");
        self.config.autosave_slot = slot;
        self
    }

    /// Content source used for every load.
    ///
    /// Default: [`SimulatedContentSource::default`]
    pub fn with_content_source(mut self, source: impl ContentSource + 'static) -> Self {
        self.content_source = Some(Arc::new(source));
        self
    }

    /// World seed source for new games.
    pub fn with_seed_source(mut self, seed_source: impl FnMut() -> u64 + Send + 'static) -> Self {
        self.seed_source = Some(Box::new(seed_source));
        self
    }

    /// Extra state-entry effects, run after the shell's [`TimeScale`].
    pub fn with_state_effects(mut self, effects: impl StateEffects + 'static) -> Self {
        self.effects = Some(Box::new(effects));
        self
    }

    /// Whether `run()` starts by loading the menu resource.
    ///
    /// Default: true
    pub fn load_menu_on_start(mut self, enabled: bool) -> Self {
        self.config.load_menu_on_start = enabled;
        self
    }

    /// Builds the shell and every subsystem, in dependency order.
    pub fn build(self) -> Shell {
        info!(
            "Building shell (TPS: {}, commands: {}, version: {})",
            self.tps, self.command_capacity, self.app_version
        );

        //--- 1. Bus ---------------------------------------------------------
        let bus = Arc::new(EventBus::new());

        //--- 2. Persistence -------------------------------------------------
        let persistence = Arc::new(PersistencePipeline::new(
            self.storage.build(),
            self.app_version,
        ));

        //--- 3. Loader ------------------------------------------------------
        let source: Arc<dyn ContentSource> = match self.content_source {
            Some(source) => source,
            None => Arc::new(SimulatedContentSource::default()),
        };
        let sequencer = LoadSequencer::new(Arc::clone(&bus), source);

        //--- 4. State machine -----------------------------------------------
        let time_scale = TimeScale::new();
        let effects = ShellEffects {
            time_scale: time_scale.clone(),
            extra: self.effects,
        };

        let mut machine = LifecycleStateMachine::new(
            self.config,
            Arc::clone(&bus),
            Arc::clone(&persistence),
            sequencer,
        )
        .with_effects(effects);
        if let Some(seed_source) = self.seed_source {
            machine = machine.with_seed_source(seed_source);
        }

        //--- 5. Snapshot restore on DataReady -------------------------------
        let restore_listener = restore_on_data_ready(Arc::clone(&persistence));
        bus.subscribe(EventKind::DataReady, &restore_listener);

        //--- 6. Host commands -----------------------------------------------
        let (commands, receiver) = bounded(self.command_capacity);

        Shell {
            context: ShellContext {
                bus,
                persistence,
                time_scale,
            },
            machine,
            collector: CommandCollector::new(receiver),
            commands,
            restore_listener,
            tps: self.tps,
        }
    }
}

impl Default for ShellBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//=== ShellContext ========================================================

/// Shared handles for collaborators living outside the control loop.
///
/// Gameplay systems register their state providers on `persistence`,
/// UI subscribes to `bus`, and the simulation reads `time_scale`.
#[derive(Clone)]
pub struct ShellContext {
    pub bus: Arc<EventBus>,
    pub persistence: Arc<PersistencePipeline>,
    pub time_scale: TimeScale,
}

//=== Shell ===============================================================

/// Lifecycle shell runtime.
///
/// Create via [`ShellBuilder`]. Drive it either by calling [`Shell::tick`]
/// from an existing loop, or hand it to [`Shell::run`] / [`Shell::spawn`]
/// and talk to it over [`Shell::commands`].
pub struct Shell {
    context: ShellContext,
    machine: LifecycleStateMachine,
    collector: CommandCollector,
    commands: Sender<HostCommand>,
    restore_listener: Listener,
    tps: f64,
}

impl Shell {
    //--- Handles ----------------------------------------------------------

    pub fn context(&self) -> &ShellContext {
        &self.context
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.context.bus
    }

    pub fn persistence(&self) -> &Arc<PersistencePipeline> {
        &self.context.persistence
    }

    pub fn time_scale(&self) -> &TimeScale {
        &self.context.time_scale
    }

    /// Sender for host commands. Clone freely.
    pub fn commands(&self) -> Sender<HostCommand> {
        self.commands.clone()
    }

    pub fn state(&self) -> RunState {
        self.machine.state()
    }

    pub fn state_machine(&self) -> &LifecycleStateMachine {
        &self.machine
    }

    /// Direct command access for hosts driving the shell with `tick()`.
    pub fn state_machine_mut(&mut self) -> &mut LifecycleStateMachine {
        &mut self.machine
    }

    //--- Execution --------------------------------------------------------

    /// Starts the initial menu load (if enabled).
    pub fn boot(&mut self) -> Result<(), LifecycleError> {
        self.machine.boot()
    }

    /// Runs one control-loop iteration without sleeping.
    pub fn tick(&mut self) -> RunState {
        let control = self.collector.collect_tick();

        for command in self.collector.take_commands() {
            self.dispatch(command);
        }

        if control == TickControl::Exit && !self.machine.is_shutting_down() {
            info!("Host disconnected; shutting down");
            self.machine.exit_game();
        }

        self.machine.tick()
    }

    /// Boots, then ticks at the configured rate until `ShuttingDown`.
    pub fn run(mut self) {
        info!("Starting control loop (TPS: {})", self.tps);

        if let Err(err) = self.boot() {
            error!("Boot failed: {}", err);
        }

        let frame_duration = Duration::from_secs_f64(1.0 / self.tps);

        loop {
            let frame_start = Instant::now();

            if self.tick() == RunState::ShuttingDown {
                break;
            }

            let elapsed = frame_start.elapsed();
            if elapsed < frame_duration {
                thread::sleep(frame_duration - elapsed);
            }
        }

        info!("Control loop exited");
    }

    /// Runs the control loop on a dedicated thread.
    pub fn spawn(self) -> io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("lifecycle".into())
            .spawn(move || self.run())
    }

    //--- Internal Helpers -------------------------------------------------

    fn dispatch(&mut self, command: HostCommand) {
        debug!("Host command: {}", command);

        let result = match &command {
            HostCommand::StartNewGame => self.machine.start_new_game(),
            HostCommand::LoadGame(slot) => self.machine.load_game(slot),
            HostCommand::SaveGame(slot) => self.machine.save_game(slot).map(|_| ()),
            HostCommand::TogglePause => {
                self.machine.toggle_pause();
                Ok(())
            }
            HostCommand::ReturnToMenu => self.machine.return_to_menu(),
            HostCommand::ExitGame => {
                self.machine.exit_game();
                Ok(())
            }
        };

        if let Err(err) = result {
            warn!("Host command '{}' failed: {}", command, err);
        }
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        self.context
            .bus
            .unsubscribe(EventKind::DataReady, &self.restore_listener);
    }
}

//=== Support =============================================================

/// The shell's time scale followed by any host-provided effects.
struct ShellEffects {
    time_scale: TimeScale,
    extra: Option<Box<dyn StateEffects>>,
}

impl StateEffects for ShellEffects {
    fn on_enter(&mut self, state: RunState) {
        self.time_scale.on_enter(state);
        if let Some(extra) = self.extra.as_mut() {
            extra.on_enter(state);
        }
    }
}

/// Hands each published snapshot to the registered providers.
fn restore_on_data_ready(persistence: Arc<PersistencePipeline>) -> Listener {
    Listener::new(move |payload| {
        let snapshot = payload
            .snapshot()
            .ok_or_else(|| format!("unexpected payload {:?}", payload))?;

        let skipped = persistence.restore(snapshot);
        if !skipped.is_empty() {
            debug!("Restore skipped providers: {:?}", skipped);
        }
        Ok(())
    })
}

//=========================================================================
// Unit Tests
//=========================================================================
