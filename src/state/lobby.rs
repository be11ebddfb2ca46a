//! Lobby listing snapshots.
//!
//! The server owns lobby membership; the client only ever sees the listing
//! broadcast in `UPDATE LOBBY` pushes. Each push replaces the whole list,
//! so a [`Lobby`] is an immutable value snapshot with no partial updates.

use serde::Serialize;

/// One lobby as advertised by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lobby {
    /// Unique lobby name.
    pub name: String,

    /// Players currently in the lobby.
    pub player_count: u32,

    /// Maximum players allowed.
    pub capacity: u32,
}

impl Lobby {
    pub fn new(name: String, player_count: u32, capacity: u32) -> Self {
        Self {
            name,
            player_count,
            capacity,
        }
    }

    /// Check if the lobby can take another player.
    pub fn has_room(&self) -> bool {
        self.player_count < self.capacity
    }

    /// Convert to JSON for display collaborators.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "player_count": self.player_count,
            "capacity": self.capacity
        })
    }
}
