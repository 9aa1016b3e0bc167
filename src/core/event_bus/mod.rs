//=========================================================================
// Event Bus Module
//=========================================================================
//
// Decouples subsystems: publishers announce lifecycle transitions by
// topic, listeners react without knowing who published.
//
// Components:
// - `event`: topics (`EventKind`) and payloads (`EventPayload`)
// - `listener`: identity-comparable callback handles
// - `bus`: the registry and dispatch loop
//
//=========================================================================

//=== Module Declarations =================================================

mod bus;
mod event;
mod listener;

//=== Public API ==========================================================

pub use bus::EventBus;
pub use event::{EventKind, EventPayload};
pub use listener::{Listener, ListenerError, ListenerFailure, ListenerResult};
