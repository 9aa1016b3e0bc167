//=========================================================================
// Host Bridge Interface
//=========================================================================
//
// Host-to-shell command contract.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;

//=== HostCommand =========================================================

/// Lifecycle requests sent from a host thread to the shell.
///
/// Each maps onto one state machine command. Failures are logged by the
/// shell; the host observes results through bus events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    StartNewGame,
    LoadGame(String),
    SaveGame(String),
    TogglePause,
    ReturnToMenu,

    /// Autosave and shut down. Processed immediately; commands queued
    /// behind it in the same tick are dropped.
    ExitGame,
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartNewGame => f.write_str("start new game"),
            Self::LoadGame(slot) => write!(f, "load game '{}'", slot),
            Self::SaveGame(slot) => write!(f, "save game '{}'", slot),
            Self::TogglePause => f.write_str("toggle pause"),
            Self::ReturnToMenu => f.write_str("return to menu"),
            Self::ExitGame => f.write_str("exit game"),
        }
    }
}
