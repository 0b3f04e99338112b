//! Player registry
//!
//! Owns every running player, keyed by id. Removing a player from the
//! registry drops its handle, which closes the engine and joins the owner
//! thread.

use crate::config::PlayerConfig;
use crate::engine::{DeviceEnumerator, MediaEngine};
use crate::error::RegistryError;
use crate::reactor::{self, PlayerHandle};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Arena of players indexed by id
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    config: PlayerConfig,
    players: BTreeMap<String, PlayerHandle>,
}

impl PlayerRegistry {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            players: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Create a player with the given id
    pub fn init<E: MediaEngine>(
        &mut self,
        id: &str,
        engine: E,
        enumerator: Arc<dyn DeviceEnumerator>,
    ) -> Result<&PlayerHandle, RegistryError> {
        if self.players.contains_key(id) {
            return Err(RegistryError::PlayerAlreadyExists(id.to_string()));
        }

        let handle = reactor::spawn(id, engine, enumerator, &self.config)?;
        Ok(self.players.entry(id.to_string()).or_insert(handle))
    }

    pub fn get(&self, id: &str) -> Result<&PlayerHandle, RegistryError> {
        self.players
            .get(id)
            .ok_or_else(|| RegistryError::PlayerNotFound(id.to_string()))
    }

    /// Close and remove one player
    pub fn dispose_player(&mut self, id: &str) -> Result<(), RegistryError> {
        let handle = self
            .players
            .remove(id)
            .ok_or_else(|| RegistryError::PlayerNotFound(id.to_string()))?;
        handle.shutdown();
        tracing::info!("Player {} removed", id);
        Ok(())
    }

    /// Close and remove every player; returns how many were removed
    pub fn dispose_all(&mut self) -> usize {
        let players = std::mem::take(&mut self.players);
        let count = players.len();
        for (_, handle) in players {
            handle.shutdown();
        }
        if count > 0 {
            tracing::info!("Removed {} players", count);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Player ids in sorted order
    pub fn ids(&self) -> Vec<&str> {
        self.players.keys().map(String::as_str).collect()
    }
}

impl Drop for PlayerRegistry {
    fn drop(&mut self) {
        self.dispose_all();
    }
}
