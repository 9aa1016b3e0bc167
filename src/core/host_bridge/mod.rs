//=========================================================================
// Host Bridge
//=========================================================================
//
// Bridges a host application (window layer, UI, test harness) with the
// lifecycle control loop.
//
// Components:
// - `interface`: Commands a host may send
// - `command_collector`: Control-side draining with a per-tick bound
//
//=========================================================================

//=== Module Declarations =================================================

pub(crate) mod command_collector;
pub(crate) mod interface;

//=== Public API ==========================================================

pub use interface::HostCommand;

//=== Internal API ========================================================

pub(crate) use command_collector::CommandCollector;
