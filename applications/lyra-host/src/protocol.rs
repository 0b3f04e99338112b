/// Wire format of the line-delimited JSON transport
///
/// One request per input line, one response or event per output line.
use lyra_playback::{CommandError, DataSnapshot, PlaybackEvent, RegistryError};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Inbound request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Echoed back on the response
    #[serde(default)]
    pub id: Value,

    pub method: String,

    #[serde(default)]
    pub player_id: Option<String>,

    #[serde(default)]
    pub arguments: Value,
}

/// Failure reported on a response line
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Malformed request: {0}")]
    BadRequest(String),

    #[error("'{0}' requires a playerId")]
    MissingPlayerId(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl HostError {
    pub fn code(&self) -> String {
        match self {
            HostError::BadRequest(_) => "bad_request".to_string(),
            HostError::MissingPlayerId(_) => "player_id_missing".to_string(),
            HostError::Command(e) => e.code(),
            HostError::Registry(RegistryError::PlayerAlreadyExists(_)) => {
                "player_already_exists".to_string()
            }
            HostError::Registry(RegistryError::PlayerNotFound(_)) => "player_not_found".to_string(),
            HostError::Registry(RegistryError::Spawn(_)) => "player_spawn_failed".to_string(),
        }
    }
}

pub fn success(id: &Value, result: Value) -> Value {
    json!({"id": id, "result": result})
}

pub fn failure(id: &Value, error: &HostError) -> Value {
    json!({
        "id": id,
        "error": {"code": error.code(), "message": error.to_string()}
    })
}

pub fn playback_event(player_id: &str, event: &PlaybackEvent) -> Value {
    match event {
        PlaybackEvent::Snapshot(snapshot) => {
            json!({"event": "playback", "playerId": player_id, "data": snapshot})
        }
        PlaybackEvent::Error(error) => {
            json!({"event": "error", "playerId": player_id, "data": error})
        }
    }
}

pub fn data_event(player_id: &str, snapshot: &DataSnapshot) -> Value {
    json!({"event": "data", "playerId": player_id, "data": snapshot})
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyra_playback::PlatformError;

    #[test]
    fn request_defaults() {
        let request: Request = serde_json::from_str(r#"{"method": "disposeAllPlayers"}"#).unwrap();
        assert_eq!(request.id, Value::Null);
        assert!(request.player_id.is_none());
        assert_eq!(request.arguments, Value::Null);
    }

    #[test]
    fn error_codes_pass_through() {
        let err = HostError::from(CommandError::MissingDeviceId);
        assert_eq!(err.code(), "device_id_not_found");
        let line = failure(&json!(7), &err);
        assert_eq!(line["id"], 7);
        assert_eq!(line["error"]["code"], "device_id_not_found");
    }

    #[test]
    fn error_events_carry_code() {
        let event = PlaybackEvent::Error(PlatformError {
            code: "networkError".to_string(),
            message: "offline".to_string(),
        });
        let line = playback_event("p1", &event);
        assert_eq!(line["event"], "error");
        assert_eq!(line["data"]["code"], "networkError");
    }
}
