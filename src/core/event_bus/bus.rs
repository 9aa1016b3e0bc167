//=========================================================================
// Event Bus
//=========================================================================
//
// Topic-keyed publish/subscribe registry for inter-system notifications.
//
// Architecture:
//   Systems → subscribe(kind, listener) → HashMap<EventKind, Vec<Listener>>
//                                              ↓
//   Publisher → publish(kind, &payload) → copy list → invoke each listener
//
// Pattern: lock → clone subscriber list → unlock → dispatch
//
// The lock is never held while listeners run, so a listener may
// subscribe, unsubscribe or publish from inside its own invocation.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{error, trace};

//=== Internal Dependencies ===============================================

use super::listener::{Listener, ListenerFailure};
use super::{EventKind, EventPayload};

//=== EventBus ============================================================

/// Publish/subscribe registry shared between subsystems.
///
/// Constructed once by the owning shell and handed out as `Arc<EventBus>`.
#[derive(Debug, Default)]
pub struct EventBus {
    listeners: Mutex<HashMap<EventKind, Vec<Listener>>>,
}

impl EventBus {
    /// Creates a new bus with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    //--- Subscriptions ----------------------------------------------------

    /// Registers `listener` for `kind`.
    ///
    /// Returns false if the same listener handle is already registered for
    /// this kind; the registry is left unchanged in that case.
    pub fn subscribe(&self, kind: EventKind, listener: &Listener) -> bool {
        let mut listeners = self.lock();
        let entry = listeners.entry(kind).or_default();

        if entry.iter().any(|existing| existing.same_as(listener)) {
            trace!("Listener already subscribed to {:?}", kind);
            return false;
        }

        entry.push(listener.clone());
        true
    }

    /// Removes `listener` from `kind`. Returns true if it was registered.
    pub fn unsubscribe(&self, kind: EventKind, listener: &Listener) -> bool {
        let mut listeners = self.lock();
        let Some(entry) = listeners.get_mut(&kind) else {
            return false;
        };

        let before = entry.len();
        entry.retain(|existing| !existing.same_as(listener));
        before != entry.len()
    }

    //--- Dispatch ---------------------------------------------------------

    /// Invokes every listener registered for `kind` at the moment of the call.
    ///
    /// Listeners run in registration order. A listener that returns an error
    /// or panics is logged and skipped; the remaining listeners still run
    /// and nothing is reported back to the publisher.
    pub fn publish(&self, kind: EventKind, payload: &EventPayload) {
        let snapshot: Vec<Listener> = match self.lock().get(&kind) {
            Some(entry) if !entry.is_empty() => entry.clone(),
            _ => return,
        };

        trace!("Publishing {:?} to {} listener(s)", kind, snapshot.len());

        for listener in &snapshot {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.invoke(payload)));

            let reason = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(panic_payload) => panic_message(panic_payload.as_ref()),
            };

            error!("{}", ListenerFailure { kind, reason });
        }
    }

    //--- Query API --------------------------------------------------------

    /// Returns the number of listeners registered for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.lock().get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Returns true if at least one listener is registered for `kind`.
    pub fn has_subscribers(&self, kind: EventKind) -> bool {
        self.subscriber_count(kind) > 0
    }

    /// Removes every listener registered for `kind`.
    pub fn clear(&self, kind: EventKind) {
        if let Some(entry) = self.lock().get_mut(&kind) {
            entry.clear();
        }
    }

    /// Removes every listener for every kind.
    pub fn clear_all(&self) {
        for entry in self.lock().values_mut() {
            entry.clear();
        }
    }

    //--- Internal Helpers -------------------------------------------------

    // A listener panic never happens under the lock, but a poisoned map is
    // still structurally valid, so recover it instead of propagating.
    fn lock(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<Listener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::core::lifecycle::RunState;

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> Listener {
        let log = Arc::clone(log);
        Listener::infallible(move |_| log.lock().unwrap().push(tag))
    }

    #[test]
    fn new_bus_has_no_subscribers() {
        let bus = EventBus::new();
        assert!(!bus.has_subscribers(EventKind::StateChanged));
        assert_eq!(bus.subscriber_count(EventKind::StateChanged), 0);

        // Publishing to an empty topic is a no-op.
        bus.publish(EventKind::StateChanged, &EventPayload::None);
    }

    #[test]
    fn publish_runs_listeners_in_registration_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(EventKind::StateChanged, &recorder(&log, "first"));
        bus.subscribe(EventKind::StateChanged, &recorder(&log, "second"));
        bus.subscribe(EventKind::StateChanged, &recorder(&log, "third"));

        bus.publish(EventKind::StateChanged, &EventPayload::State(RunState::Active));

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn listeners_receive_payload() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&seen);
        let listener = Listener::infallible(move |payload| {
            *sink.lock().unwrap() = payload.state();
        });
        bus.subscribe(EventKind::StateChanged, &listener);

        bus.publish(EventKind::StateChanged, &EventPayload::State(RunState::Paused));
        assert_eq!(*seen.lock().unwrap(), Some(RunState::Paused));
    }

    #[test]
    fn duplicate_subscription_is_a_no_op() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let listener = recorder(&log, "once");

        assert!(bus.subscribe(EventKind::ContentReady, &listener));
        assert!(!bus.subscribe(EventKind::ContentReady, &listener.clone()));
        assert_eq!(bus.subscriber_count(EventKind::ContentReady), 1);

        bus.publish(EventKind::ContentReady, &EventPayload::None);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn same_listener_may_join_several_kinds() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let listener = recorder(&log, "hit");

        assert!(bus.subscribe(EventKind::LoadStarted, &listener));
        assert!(bus.subscribe(EventKind::ContentReady, &listener));

        bus.publish(EventKind::LoadStarted, &EventPayload::None);
        bus.publish(EventKind::ContentReady, &EventPayload::None);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn separate_topics_do_not_cross() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(EventKind::LoadStarted, &recorder(&log, "load"));
        bus.subscribe(EventKind::Custom("hud"), &recorder(&log, "hud"));

        bus.publish(EventKind::Custom("hud"), &EventPayload::None);
        assert_eq!(*log.lock().unwrap(), vec!["hud"]);
    }

    #[test]
    fn unsubscribe_removes_listener() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let listener = recorder(&log, "gone");

        bus.subscribe(EventKind::DataReady, &listener);
        assert!(bus.unsubscribe(EventKind::DataReady, &listener));
        assert!(!bus.unsubscribe(EventKind::DataReady, &listener));
        assert!(!bus.unsubscribe(EventKind::GameSaved, &listener));

        bus.publish(EventKind::DataReady, &EventPayload::None);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn self_unsubscribe_during_dispatch_still_runs_everyone_once() {
        let bus = Arc::new(EventBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let slot: Arc<Mutex<Option<Listener>>> = Arc::new(Mutex::new(None));
        let quitter = {
            let bus = Arc::clone(&bus);
            let log = Arc::clone(&log);
            let slot = Arc::clone(&slot);
            Listener::infallible(move |_| {
                log.lock().unwrap().push("quitter");
                if let Some(me) = slot.lock().unwrap().as_ref() {
                    bus.unsubscribe(EventKind::StateChanged, me);
                }
            })
        };
        *slot.lock().unwrap() = Some(quitter.clone());

        bus.subscribe(EventKind::StateChanged, &recorder(&log, "before"));
        bus.subscribe(EventKind::StateChanged, &quitter);
        bus.subscribe(EventKind::StateChanged, &recorder(&log, "after"));

        bus.publish(EventKind::StateChanged, &EventPayload::None);
        assert_eq!(*log.lock().unwrap(), vec!["before", "quitter", "after"]);

        log.lock().unwrap().clear();
        bus.publish(EventKind::StateChanged, &EventPayload::None);
        assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);
    }

    #[test]
    fn listener_added_during_dispatch_waits_for_next_publish() {
        let bus = Arc::new(EventBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let late = recorder(&log, "late");

        let joiner = {
            let bus = Arc::clone(&bus);
            let late = late.clone();
            let log = Arc::clone(&log);
            Listener::infallible(move |_| {
                log.lock().unwrap().push("joiner");
                bus.subscribe(EventKind::StateChanged, &late);
            })
        };
        bus.subscribe(EventKind::StateChanged, &joiner);

        bus.publish(EventKind::StateChanged, &EventPayload::None);
        assert_eq!(*log.lock().unwrap(), vec!["joiner"]);

        bus.publish(EventKind::StateChanged, &EventPayload::None);
        assert_eq!(*log.lock().unwrap(), vec!["joiner", "joiner", "late"]);
    }

    #[test]
    fn failing_listener_does_not_stop_dispatch() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(EventKind::DataReady, &recorder(&log, "a"));
        bus.subscribe(
            EventKind::DataReady,
            &Listener::new(|_| Err("could not apply".into())),
        );
        bus.subscribe(EventKind::DataReady, &recorder(&log, "b"));

        bus.publish(EventKind::DataReady, &EventPayload::None);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn panicking_listener_is_isolated() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(
            EventKind::ContentReady,
            &Listener::infallible(|_| panic!("listener exploded")),
        );
        bus.subscribe(EventKind::ContentReady, &recorder(&log, "survivor"));

        bus.publish(EventKind::ContentReady, &EventPayload::None);
        assert_eq!(*log.lock().unwrap(), vec!["survivor"]);

        // The registry is still usable afterwards.
        assert_eq!(bus.subscriber_count(EventKind::ContentReady), 2);
    }

    #[test]
    fn clear_and_clear_all_drop_listeners() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(EventKind::LoadStarted, &recorder(&log, "a"));
        bus.subscribe(EventKind::ContentReady, &recorder(&log, "b"));

        bus.clear(EventKind::LoadStarted);
        assert!(!bus.has_subscribers(EventKind::LoadStarted));
        assert!(bus.has_subscribers(EventKind::ContentReady));

        bus.clear_all();
        assert!(!bus.has_subscribers(EventKind::ContentReady));
    }

    #[test]
    fn panic_message_extracts_text() {
        assert_eq!(panic_message(&"boom"), "panicked: boom");
        assert_eq!(panic_message(&String::from("bang")), "panicked: bang");
        assert_eq!(panic_message(&42_u8), "panicked");
    }
}
