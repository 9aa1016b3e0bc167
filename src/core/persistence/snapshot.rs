//=========================================================================
// Snapshot Documents
//=========================================================================
//
// The persisted document and the sub-documents it is assembled from.
//
// Layout (pretty JSON on disk):
//   {
//     "saved_at": "<RFC 3339 UTC>",
//     "version":  "<producing application version>",
//     "player":   { ... PlayerState ... },
//     "world":    { ... WorldState ... }
//   }
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

//=== SubDocument =========================================================

/// A section of the snapshot owned by exactly one state provider.
///
/// `Default` is the value written when the owning provider is absent.
pub trait SubDocument:
    Serialize + DeserializeOwned + Clone + Default + PartialEq + Debug + Send + Sync + 'static
{
    /// Name used in logs and diagnostics.
    const NAME: &'static str;
}

//=== PlayerState =========================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerState {
    pub name: String,
    pub credits: f32,
    pub position: [f32; 3],
    /// Orientation quaternion as `[x, y, z, w]`.
    pub rotation: [f32; 4],
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            name: "Captain".to_string(),
            credits: 1000.0,
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl PlayerState {
    /// Name of the first field holding NaN or an infinity, if any.
    pub fn non_finite_field(&self) -> Option<&'static str> {
        if !self.credits.is_finite() {
            Some("player.credits")
        } else if !self.position.iter().all(|v| v.is_finite()) {
            Some("player.position")
        } else if !self.rotation.iter().all(|v| v.is_finite()) {
            Some("player.rotation")
        } else {
            None
        }
    }
}

impl SubDocument for PlayerState {
    const NAME: &'static str = "player";
}

//=== WorldState ==========================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldState {
    /// Seed for procedural world generation.
    pub seed: u64,
    /// Elapsed in-game time, in seconds.
    pub game_time: f64,
}

impl WorldState {
    /// Name of the first field holding NaN or an infinity, if any.
    pub fn non_finite_field(&self) -> Option<&'static str> {
        if self.game_time.is_finite() {
            None
        } else {
            Some("world.game_time")
        }
    }
}

impl SubDocument for WorldState {
    const NAME: &'static str = "world";
}

//=== Snapshot ============================================================

/// Immutable capture of gameplay state plus metadata.
///
/// There are no setters: a changed world means a new `Snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    saved_at: DateTime<Utc>,
    version: String,
    player: PlayerState,
    world: WorldState,
}

impl Snapshot {
    /// Assembles a snapshot stamped with the current time.
    pub fn new(version: impl Into<String>, player: PlayerState, world: WorldState) -> Self {
        Self {
            saved_at: Utc::now(),
            version: version.into(),
            player,
            world,
        }
    }

    /// Default state for a fresh run on the given world seed.
    pub fn new_game(version: impl Into<String>, seed: u64) -> Self {
        Self::new(
            version,
            PlayerState::default(),
            WorldState {
                seed,
                game_time: 0.0,
            },
        )
    }

    pub fn saved_at(&self) -> DateTime<Utc> {
        self.saved_at
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// First sub-document field that JSON cannot represent.
    pub fn non_finite_field(&self) -> Option<&'static str> {
        self.player
            .non_finite_field()
            .or_else(|| self.world.non_finite_field())
    }

    /// Returns true if both snapshots carry equal sub-documents,
    /// regardless of metadata.
    pub fn same_state_as(&self, other: &Snapshot) -> bool {
        self.player == other.player && self.world == other.world
    }
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_game_uses_defaults_and_seed() {
        let snapshot = Snapshot::new_game("0.3.1", 4242);

        assert_eq!(snapshot.version(), "0.3.1");
        assert_eq!(snapshot.player(), &PlayerState::default());
        assert_eq!(snapshot.player().name, "Captain");
        assert_eq!(snapshot.player().credits, 1000.0);
        assert_eq!(snapshot.world().seed, 4242);
        assert_eq!(snapshot.world().game_time, 0.0);
    }

    #[test]
    fn document_is_field_tagged_json() {
        let snapshot = Snapshot::new_game("1.0.0", 7);
        let text = serde_json::to_string_pretty(&snapshot).unwrap();

        for field in ["\"saved_at\"", "\"version\"", "\"player\"", "\"world\"", "\"seed\": 7"] {
            assert!(text.contains(field), "missing {field} in {text}");
        }

        let parsed: Snapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn partial_sub_documents_fill_defaults() {
        let text = r#"{
            "saved_at": "2026-01-02T03:04:05Z",
            "version": "0.1.0",
            "player": { "name": "Vega" },
            "world": {}
        }"#;

        let parsed: Snapshot = serde_json::from_str(text).unwrap();
        assert_eq!(parsed.player().name, "Vega");
        assert_eq!(parsed.player().credits, 1000.0);
        assert_eq!(parsed.world(), &WorldState::default());
    }

    #[test]
    fn non_finite_fields_are_named() {
        assert_eq!(Snapshot::new_game("1.0.0", 1).non_finite_field(), None);

        let fallen = PlayerState {
            position: [0.0, f32::NEG_INFINITY, 0.0],
            ..PlayerState::default()
        };
        let snapshot = Snapshot::new("1.0.0", fallen, WorldState::default());
        assert_eq!(snapshot.non_finite_field(), Some("player.position"));

        let world = WorldState {
            seed: 1,
            game_time: f64::NAN,
        };
        let snapshot = Snapshot::new("1.0.0", PlayerState::default(), world);
        assert_eq!(snapshot.non_finite_field(), Some("world.game_time"));
    }

    #[test]
    fn same_state_ignores_metadata() {
        let a = Snapshot::new("1.0.0", PlayerState::default(), WorldState::default());
        let b = Snapshot::new("2.0.0", PlayerState::default(), WorldState::default());
        assert!(a.same_state_as(&b));

        let moved = PlayerState {
            position: [1.0, 2.0, 3.0],
            ..PlayerState::default()
        };
        let c = Snapshot::new("1.0.0", moved, WorldState::default());
        assert!(!a.same_state_as(&c));
    }
}
