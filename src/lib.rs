//=========================================================================
// Aetheric Lifecycle — Library Root
//
// This crate defines the public API surface of the Aetheric lifecycle
// shell.
//
// Responsibilities:
// - Expose the shell facade (`ShellBuilder`, `Shell`, `ShellContext`)
// - Expose the core subsystems for hosts that wire them by hand
// - Keep host-bridge internals (the command collector) crate-private
//
// Typical usage:
// ```no_run
// use aetheric_lifecycle::ShellBuilder;
//
// fn main() {
//     ShellBuilder::new().build().run();
// }
// ```
//
//=========================================================================

//--- Public Modules ------------------------------------------------------
//
// `core` contains the lifecycle subsystems (event bus, loader,
// persistence, state machine, host bridge). Most hosts only need the
// `Shell` facade and the prelude.
//
pub mod core;
pub mod prelude;

//--- Internal Modules ----------------------------------------------------
//
// `shell` builds and owns every subsystem and runs the control loop.
//
mod shell;

//--- Public Exports ------------------------------------------------------

pub use crate::core::host_bridge::HostCommand;
pub use crate::core::lifecycle::RunState;
pub use crate::core::persistence::StorageConfig;
pub use shell::{Shell, ShellBuilder, ShellContext};
