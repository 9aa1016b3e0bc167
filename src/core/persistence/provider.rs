//=========================================================================
// State Providers
//=========================================================================
//
// Capability implemented by gameplay collaborators that own a section of
// the persisted state (the player controller, the world simulation, ...).
//
// Providers are shared as `Arc<dyn StateProvider<D>>` and take `&self`:
// the collaborator decides how its own state is synchronized.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::{Arc, Mutex, PoisonError, RwLock};

//=== Internal Dependencies ===============================================

use super::SubDocument;

//=== StateProvider =======================================================

/// Captures and applies one sub-document of the snapshot.
pub trait StateProvider<D: SubDocument>: Send + Sync {
    /// Returns the collaborator's current sub-document.
    fn capture_sub_document(&self) -> D;

    /// Replaces the collaborator's state with `document`.
    fn apply_sub_document(&self, document: &D);
}

//=== StateCell ===========================================================

/// Minimal provider that just holds its sub-document.
///
/// Handy for collaborators whose persisted state is plain data, and for
/// hosts that mirror state into the cell from elsewhere.
#[derive(Debug, Default)]
pub struct StateCell<D: SubDocument> {
    value: Mutex<D>,
}

impl<D: SubDocument> StateCell<D> {
    pub fn new(value: D) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    /// Returns a copy of the held document.
    pub fn get(&self) -> D {
        self.value.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, value: D) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }

    /// Mutates the held document in place.
    pub fn update(&self, f: impl FnOnce(&mut D)) {
        let mut value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *value);
    }
}

impl<D: SubDocument> StateProvider<D> for StateCell<D> {
    fn capture_sub_document(&self) -> D {
        self.get()
    }

    fn apply_sub_document(&self, document: &D) {
        self.set(document.clone());
    }
}

//=== ProviderSlot ========================================================

/// Registration point for the single provider of one sub-document.
pub(crate) struct ProviderSlot<D: SubDocument> {
    provider: RwLock<Option<Arc<dyn StateProvider<D>>>>,
}

impl<D: SubDocument> ProviderSlot<D> {
    pub(crate) fn new() -> Self {
        Self {
            provider: RwLock::new(None),
        }
    }

    /// Installs `provider`, returning true if it replaced another one.
    pub(crate) fn register(&self, provider: Arc<dyn StateProvider<D>>) -> bool {
        self.provider
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(provider)
            .is_some()
    }

    /// Removes the provider, returning true if one was installed.
    pub(crate) fn unregister(&self) -> bool {
        self.provider
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.current().is_some()
    }

    /// Captures from the provider, or `None` if none is installed.
    pub(crate) fn capture(&self) -> Option<D> {
        self.current().map(|provider| provider.capture_sub_document())
    }

    /// Applies `document`, returning false if no provider is installed.
    pub(crate) fn apply(&self, document: &D) -> bool {
        match self.current() {
            Some(provider) => {
                provider.apply_sub_document(document);
                true
            }
            None => false,
        }
    }

    // The lock is released before calling into the provider so a provider
    // may re-register itself from inside its own hooks.
    fn current(&self) -> Option<Arc<dyn StateProvider<D>>> {
        self.provider
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::persistence::{PlayerState, WorldState};

    #[test]
    fn state_cell_round_trips_document() {
        let cell = StateCell::new(WorldState {
            seed: 9,
            game_time: 12.5,
        });
        assert_eq!(cell.capture_sub_document().seed, 9);

        cell.apply_sub_document(&WorldState {
            seed: 10,
            game_time: 0.0,
        });
        assert_eq!(cell.get().seed, 10);

        cell.update(|world| world.game_time += 1.0);
        assert_eq!(cell.get().game_time, 1.0);
    }

    #[test]
    fn empty_slot_reports_absence() {
        let slot: ProviderSlot<PlayerState> = ProviderSlot::new();
        assert!(!slot.is_registered());
        assert_eq!(slot.capture(), None);
        assert!(!slot.apply(&PlayerState::default()));
    }

    #[test]
    fn register_replaces_previous_provider() {
        let slot: ProviderSlot<PlayerState> = ProviderSlot::new();
        let first = Arc::new(StateCell::new(PlayerState {
            name: "First".into(),
            ..PlayerState::default()
        }));
        let second = Arc::new(StateCell::new(PlayerState {
            name: "Second".into(),
            ..PlayerState::default()
        }));

        assert!(!slot.register(first));
        assert!(slot.register(second.clone()));
        assert_eq!(slot.capture().map(|p| p.name), Some("Second".to_string()));

        let applied = PlayerState {
            credits: 5.0,
            ..PlayerState::default()
        };
        assert!(slot.apply(&applied));
        assert_eq!(second.get().credits, 5.0);

        assert!(slot.unregister());
        assert!(!slot.unregister());
    }
}
