/// Request router between the JSON transport and the player registry
use crate::protocol::{self, HostError, Request};
use crossbeam_channel::{Receiver, Sender};
use lyra_playback::simulated::{SimulatedDevices, SimulatedEngine};
use lyra_playback::{DataSnapshot, PlaybackEvent, PlayerConfig, PlayerRegistry};
use serde_json::{json, Value};
use std::sync::Arc;
use std::thread;

pub struct Host {
    registry: PlayerRegistry,
    devices: Arc<SimulatedDevices>,
    out: Sender<Value>,
}

impl Host {
    pub fn new(config: PlayerConfig, devices: Arc<SimulatedDevices>, out: Sender<Value>) -> Self {
        Self {
            registry: PlayerRegistry::new(config),
            devices,
            out,
        }
    }

    pub fn player_count(&self) -> usize {
        self.registry.len()
    }

    /// Handle one input line and write its response
    pub fn handle_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                let id = request.id.clone();
                match self.handle(request) {
                    Ok(result) => protocol::success(&id, result),
                    Err(e) => {
                        tracing::debug!("Request failed: {}", e);
                        protocol::failure(&id, &e)
                    }
                }
            }
            Err(e) => protocol::failure(&Value::Null, &HostError::BadRequest(e.to_string())),
        };

        self.write(response);
    }

    fn handle(&mut self, request: Request) -> Result<Value, HostError> {
        match request.method.as_str() {
            "init" => {
                let player_id = require_player_id(&request)?;
                self.init(player_id)?;
                Ok(json!({}))
            }
            "disposePlayer" => {
                let player_id = require_player_id(&request)?;
                self.registry.dispose_player(player_id)?;
                Ok(json!({}))
            }
            "disposeAllPlayers" => {
                let count = self.registry.dispose_all();
                Ok(json!({"disposed": count}))
            }
            method => {
                let player = self.registry.get(require_player_id(&request)?)?;
                let reply = player.call(method, request.arguments)?;
                Ok(Value::Object(reply))
            }
        }
    }

    fn init(&mut self, player_id: &str) -> Result<(), HostError> {
        let devices = Arc::clone(&self.devices);
        let player = self
            .registry
            .init(player_id, SimulatedEngine::new(), devices)?;

        forward(
            player_id,
            player.playback_events().listen(),
            self.out.clone(),
            |id, event: &PlaybackEvent| protocol::playback_event(id, event),
        );
        forward(
            player_id,
            player.data_events().listen(),
            self.out.clone(),
            |id, snapshot: &DataSnapshot| protocol::data_event(id, snapshot),
        );

        tracing::info!("Player {} initialized", player_id);
        Ok(())
    }

    fn write(&self, line: Value) {
        if self.out.send(line).is_err() {
            tracing::warn!("Output closed, dropping response");
        }
    }
}

fn require_player_id(request: &Request) -> Result<&str, HostError> {
    request
        .player_id
        .as_deref()
        .ok_or_else(|| HostError::MissingPlayerId(request.method.clone()))
}

/// Relay a player's events to the output until the player goes away
fn forward<T, F>(player_id: &str, events: Receiver<T>, out: Sender<Value>, render: F)
where
    T: Send + 'static,
    F: Fn(&str, &T) -> Value + Send + 'static,
{
    let player_id = player_id.to_string();
    let spawned = thread::Builder::new()
        .name(format!("lyra-forward-{player_id}"))
        .spawn(move || {
            for event in events {
                if out.send(render(&player_id, &event)).is_err() {
                    break;
                }
            }
        });

    if let Err(e) = spawned {
        tracing::error!("Failed to start event forwarding: {}", e);
    }
}
