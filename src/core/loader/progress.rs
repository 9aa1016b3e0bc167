//=========================================================================
// Load Progress
//=========================================================================
//
// Observable progress of one content load.
//
// The transfer phase reports raw progress in [0, ACTIVATION_THRESHOLD];
// observers see it rescaled to [0, 1). Activation completes the load
// and pins the fraction at 1.0.
//
//=========================================================================

//=== Constants ===========================================================

/// Raw transfer progress at which the activation gate may open.
pub const ACTIVATION_THRESHOLD: f32 = 0.9;

//=== LoadProgress ========================================================

/// Monotonic load fraction in `[0, 1]` plus a completion flag.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoadProgress {
    fraction: f32,
    complete: bool,
}

impl LoadProgress {
    /// Progress of a load that has not reported anything yet.
    pub const fn idle() -> Self {
        Self {
            fraction: 0.0,
            complete: false,
        }
    }

    /// Progress of a finished load.
    pub const fn finished() -> Self {
        Self {
            fraction: 1.0,
            complete: true,
        }
    }

    pub fn fraction(&self) -> f32 {
        self.fraction
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Folds a raw transfer reading into the fraction.
    ///
    /// Returns true if the visible fraction increased. Readings that would
    /// move the fraction backwards (or are NaN) are ignored.
    pub(crate) fn record_transfer(&mut self, raw: f32) -> bool {
        if self.complete {
            return false;
        }

        let scaled = (raw / ACTIVATION_THRESHOLD).clamp(0.0, 1.0);
        if scaled > self.fraction {
            self.fraction = scaled;
            true
        } else {
            false
        }
    }

    /// Marks the load as complete. Returns true if this changed the
    /// progress, including a fraction already at 1.0 gaining the flag.
    pub(crate) fn complete(&mut self) -> bool {
        let changed = *self != Self::finished();
        *self = Self::finished();
        changed
    }
}

//=========================================================================
// Tests
//=========================================================================
