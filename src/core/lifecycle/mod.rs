//=========================================================================
// Lifecycle Module
//=========================================================================
//
// Canonical run state of the application and the machine that moves it.
//
// States:
// ```text
//   MainMenu ──start/load──> Loading ──ContentReady(gameplay)──> Active
//      ^                        │                                 │  ^
//      └──ContentReady(menu)────┘<────────return_to_menu──────────┘  │
//                                                       toggle_pause │
//                                                                 Paused
//   any ──exit_game──> ShuttingDown
// ```
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

//=== Module Declarations =================================================

mod notice_queue;
mod state_machine;

//=== Public API ==========================================================

pub use state_machine::{
    random_seed, LifecycleCommand, LifecycleConfig, LifecycleError, LifecycleStateMachine,
    PendingSnapshot, SeedSource, SnapshotOrigin,
};

//=== RunState ============================================================

/// Canonical phase of the application lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunState {
    #[default]
    MainMenu,
    Loading,
    Active,
    Paused,
    /// Terminal for the process; never persisted.
    ShuttingDown,
}

impl RunState {
    /// Simulation speed the host should run at in this state.
    pub fn time_scale(self) -> f32 {
        match self {
            Self::MainMenu | Self::Loading | Self::Active => 1.0,
            Self::Paused => 0.0,
            Self::ShuttingDown => 0.5,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MainMenu => "main menu",
            Self::Loading => "loading",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::ShuttingDown => "shutting down",
        };
        f.write_str(name)
    }
}

//=== StateEffects ========================================================

/// Host-specific side effects applied on entry to each run state.
pub trait StateEffects: Send {
    fn on_enter(&mut self, state: RunState);
}

impl<T: StateEffects + ?Sized> StateEffects for Box<T> {
    fn on_enter(&mut self, state: RunState) {
        (**self).on_enter(state);
    }
}

/// No side effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEffects;

impl StateEffects for NoEffects {
    fn on_enter(&mut self, _state: RunState) {}
}

//=== TimeScale ===========================================================

/// Shared simulation speed, updated from [`RunState::time_scale`].
///
/// Clones observe the same value; hand one to the simulation and install
/// another as the state machine's effects.
#[derive(Debug, Clone)]
pub struct TimeScale {
    bits: Arc<AtomicU32>,
}

impl TimeScale {
    pub fn new() -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(1.0_f32.to_bits())),
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    fn set(&self, scale: f32) {
        self.bits.store(scale.to_bits(), Ordering::Relaxed);
    }
}

impl Default for TimeScale {
    fn default() -> Self {
        Self::new()
    }
}

impl StateEffects for TimeScale {
    fn on_enter(&mut self, state: RunState) {
        self.set(state.time_scale());
    }
}

//=========================================================================
// Tests
//=========================================================================
