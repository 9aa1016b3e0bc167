//=========================================================================
// Listener Handle
//=========================================================================
//
// Shared, identity-comparable callback stored in the bus registry.
//
// Closures have no usable equality, so a listener's identity is the
// allocation behind its handle: clones of one `Listener` are "the same
// callback", two separately created listeners never are.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

//=== Internal Dependencies ===============================================

use super::{EventKind, EventPayload};

//=== Public API ==========================================================

/// Error type listeners may return to report a failed reaction.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by every listener invocation.
pub type ListenerResult = Result<(), ListenerError>;

type Callback = dyn Fn(&EventPayload) -> ListenerResult + Send + Sync;

//=== Listener ============================================================

/// Cloneable handle to a bus callback.
///
/// Keep a clone of the handle to unsubscribe later.
#[derive(Clone)]
pub struct Listener {
    callback: Arc<Callback>,
}

impl Listener {
    /// Wraps a fallible callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&EventPayload) -> ListenerResult + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Wraps a callback that cannot fail.
    pub fn infallible<F>(callback: F) -> Self
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        Self::new(move |payload| {
            callback(payload);
            Ok(())
        })
    }

    pub(super) fn invoke(&self, payload: &EventPayload) -> ListenerResult {
        (self.callback)(payload)
    }

    /// Returns true if both handles refer to the same callback.
    pub fn same_as(&self, other: &Listener) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("callback", &Arc::as_ptr(&self.callback))
            .finish()
    }
}

//=== ListenerFailure =====================================================

/// A listener failed during dispatch.
///
/// Never returned to publishers; the bus logs it and keeps dispatching.
#[derive(Debug, Error)]
#[error("listener failed while handling {kind:?}: {reason}")]
pub struct ListenerFailure {
    pub kind: EventKind,
    pub reason: String,
}

//=========================================================================
// Tests
//=========================================================================
