//! Method calls and command parsing
//!
//! A [`MethodCall`] is a method name plus a map of named arguments. Parsing
//! turns it into a typed [`Command`] and reports argument problems with the
//! method's error code, before anything touches the engine.

use crate::error::CommandError;
use crate::source::SourceDescription;
use crate::types::{LoopMode, ShuffleMode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Successful command payload
pub type Reply = Map<String, Value>;

/// Methods that are accepted and ignored because the platform has no
/// equivalent knob
pub const ACCEPTED_NOOPS: &[&str] = &[
    "setPitch",
    "setSkipSilence",
    "setAutomaticallyWaitsToMinimizeStalling",
    "setCanUseNetworkResourcesForLiveStreamingWhilePaused",
    "setPreferredPeakBitRate",
    "setAndroidAudioAttributes",
    "audioEffectSetEnabled",
    "androidLoudnessEnhancerSetTargetGain",
    "androidEqualizerGetParameters",
    "androidEqualizerBandSetGain",
];

/// Inbound request addressed to one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// A parsed player command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Load {
        source: SourceDescription,
        initial_index: Option<i64>,
        /// Microseconds
        initial_position: Option<i64>,
    },
    Play,
    Pause,
    SetVolume(f32),
    SetSpeed(f32),
    SetLoopMode(LoopMode),
    SetShuffleMode(ShuffleMode),
    SetShuffleOrder(SourceDescription),
    Seek {
        index: Option<i64>,
        /// Microseconds
        position: Option<i64>,
    },
    InsertAll {
        index: i64,
        children: Vec<SourceDescription>,
    },
    RemoveRange {
        start: i64,
        end: i64,
    },
    Move {
        from: i64,
        to: i64,
    },
    SetOutputDevice(String),
    Dispose,
    /// Recognised but unsupported; succeeds without effect
    Ignored(&'static str),
}

impl Command {
    /// Parse a method call
    pub fn parse(call: &MethodCall) -> Result<Self, CommandError> {
        let args = Args::new(&call.arguments);

        let command = match call.method.as_str() {
            "load" => Command::Load {
                source: args.source("load", "audioSource")?,
                initial_index: args.optional_int("load", "initialIndex")?,
                initial_position: args.optional_int("load", "initialPosition")?,
            },
            "play" => Command::Play,
            "pause" => Command::Pause,
            "setVolume" => Command::SetVolume(args.float("volume", "volume")?),
            "setSpeed" => Command::SetSpeed(args.float("speed", "speed")?),
            "setLoopMode" => {
                let code = args.int("loopMode", "loopMode")?;
                Command::SetLoopMode(LoopMode::from_code(code).ok_or_else(|| {
                    CommandError::InvalidArgument {
                        command: "loopMode",
                        name: "loopMode",
                        reason: format!("{code} is not one of 0, 1, 2"),
                    }
                })?)
            }
            "setShuffleMode" => {
                let code = args.int("shuffleMode", "shuffleMode")?;
                Command::SetShuffleMode(ShuffleMode::from_code(code).ok_or_else(|| {
                    CommandError::InvalidArgument {
                        command: "shuffleMode",
                        name: "shuffleMode",
                        reason: format!("{code} is not one of 0, 1"),
                    }
                })?)
            }
            "setShuffleOrder" => {
                Command::SetShuffleOrder(args.source("shuffleOrder", "audioSource")?)
            }
            "seek" => Command::Seek {
                index: args.optional_int("seek", "index")?,
                position: args.optional_int("seek", "position")?,
            },
            "concatenatingInsertAll" => {
                const COMMAND: &str = "concatenatingInsertAll";
                let index = args.int(COMMAND, "index")?;
                let children = args
                    .list(COMMAND, "children")?
                    .iter()
                    .map(SourceDescription::from_value)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|error| CommandError::Source {
                        command: COMMAND,
                        error,
                    })?;
                Command::InsertAll { index, children }
            }
            "concatenatingRemoveRange" => Command::RemoveRange {
                start: args.int("concatenatingRemoveRange", "startIndex")?,
                end: args.int("concatenatingRemoveRange", "endIndex")?,
            },
            "concatenatingMove" => Command::Move {
                from: args.int("concatenatingMove", "currentIndex")?,
                to: args.int("concatenatingMove", "newIndex")?,
            },
            "setOutputDevice" => match args.get("deviceID").and_then(Value::as_str) {
                Some(id) => Command::SetOutputDevice(id.to_string()),
                None => return Err(CommandError::MissingDeviceId),
            },
            "dispose" => Command::Dispose,
            other => match ACCEPTED_NOOPS.iter().find(|&&name| name == other) {
                Some(&name) => Command::Ignored(name),
                None => return Err(CommandError::NotImplemented(other.to_string())),
            },
        };

        Ok(command)
    }

    /// Method name this command was parsed from
    pub fn name(&self) -> &'static str {
        match self {
            Command::Load { .. } => "load",
            Command::Play => "play",
            Command::Pause => "pause",
            Command::SetVolume(_) => "setVolume",
            Command::SetSpeed(_) => "setSpeed",
            Command::SetLoopMode(_) => "setLoopMode",
            Command::SetShuffleMode(_) => "setShuffleMode",
            Command::SetShuffleOrder(_) => "setShuffleOrder",
            Command::Seek { .. } => "seek",
            Command::InsertAll { .. } => "concatenatingInsertAll",
            Command::RemoveRange { .. } => "concatenatingRemoveRange",
            Command::Move { .. } => "concatenatingMove",
            Command::SetOutputDevice(_) => "setOutputDevice",
            Command::Dispose => "dispose",
            Command::Ignored(name) => *name,
        }
    }
}

/// Named argument lookup over an optional map
struct Args<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Args<'a> {
    fn new(arguments: &'a Value) -> Self {
        Self {
            map: arguments.as_object(),
        }
    }

    /// Present and non-null argument
    fn get(&self, name: &str) -> Option<&'a Value> {
        self.map
            .and_then(|m| m.get(name))
            .filter(|v| !v.is_null())
    }

    fn require(&self, command: &'static str, name: &'static str) -> Result<&'a Value, CommandError> {
        self.get(name)
            .ok_or(CommandError::MissingArgument { command, name })
    }

    fn float(&self, command: &'static str, name: &'static str) -> Result<f32, CommandError> {
        let value = self.require(command, name)?;
        value
            .as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| invalid(command, name, "expected a number"))
    }

    fn int(&self, command: &'static str, name: &'static str) -> Result<i64, CommandError> {
        let value = self.require(command, name)?;
        value
            .as_i64()
            .ok_or_else(|| invalid(command, name, "expected an integer"))
    }

    fn optional_int(&self, command: &'static str, name: &'static str) -> Result<Option<i64>, CommandError> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| invalid(command, name, "expected an integer")),
        }
    }

    fn list(&self, command: &'static str, name: &'static str) -> Result<&'a Vec<Value>, CommandError> {
        self.require(command, name)?
            .as_array()
            .ok_or_else(|| invalid(command, name, "expected a list"))
    }

    fn source(&self, command: &'static str, name: &'static str) -> Result<SourceDescription, CommandError> {
        let value = self.require(command, name)?;
        SourceDescription::from_value(value).map_err(|error| CommandError::Source { command, error })
    }
}

fn invalid(command: &'static str, name: &'static str, reason: &str) -> CommandError {
    CommandError::InvalidArgument {
        command,
        name,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use serde_json::json;

    fn parse(method: &str, arguments: Value) -> Result<Command, CommandError> {
        Command::parse(&MethodCall::new(method, arguments))
    }

    #[test]
    fn parses_load_with_initial_position() {
        let command = parse(
            "load",
            json!({
                "audioSource": {"type": "progressive", "uri": "a"},
                "initialIndex": 0,
                "initialPosition": 1_500_000
            }),
        )
        .unwrap();

        match command {
            Command::Load {
                initial_index,
                initial_position,
                ..
            } => {
                assert_eq!(initial_index, Some(0));
                assert_eq!(initial_position, Some(1_500_000));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unsupported_load_source_is_a_load_error() {
        let err = parse("load", json!({"audioSource": {"type": "silence"}})).unwrap_err();
        assert_eq!(err.code(), "load_error");
        assert!(matches!(
            err,
            CommandError::Source {
                error: SourceError::UnsupportedSourceType(ref t),
                ..
            } if t == "silence"
        ));
    }

    #[test]
    fn missing_volume() {
        let err = parse("setVolume", json!({})).unwrap_err();
        assert_eq!(err.code(), "volume_error");
        assert_eq!(err.message(), "volume argument missing");
    }

    #[test]
    fn null_arguments_count_as_missing() {
        let err = parse("setSpeed", Value::Null).unwrap_err();
        assert_eq!(err.code(), "speed_error");
        let err = parse("setSpeed", json!({"speed": null})).unwrap_err();
        assert!(matches!(err, CommandError::MissingArgument { .. }));
    }

    #[test]
    fn loop_mode_codes() {
        assert_eq!(
            parse("setLoopMode", json!({"loopMode": 2})).unwrap(),
            Command::SetLoopMode(LoopMode::All)
        );
        let err = parse("setLoopMode", json!({"loopMode": 3})).unwrap_err();
        assert_eq!(err.code(), "loopMode_error");
        assert!(matches!(err, CommandError::InvalidArgument { .. }));
    }

    #[test]
    fn shuffle_mode_codes() {
        assert_eq!(
            parse("setShuffleMode", json!({"shuffleMode": 1})).unwrap(),
            Command::SetShuffleMode(ShuffleMode::All)
        );
        let err = parse("setShuffleMode", json!({"shuffleMode": -1})).unwrap_err();
        assert_eq!(err.code(), "shuffleMode_error");
    }

    #[test]
    fn seek_arguments_are_optional() {
        assert_eq!(
            parse("seek", json!({"position": 5})).unwrap(),
            Command::Seek {
                index: None,
                position: Some(5)
            }
        );
    }

    #[test]
    fn insert_all_parses_children() {
        let command = parse(
            "concatenatingInsertAll",
            json!({
                "index": 1,
                "children": [
                    {"type": "progressive", "uri": "x"},
                    {"type": "hls", "uri": "y"}
                ]
            }),
        )
        .unwrap();
        assert!(matches!(command, Command::InsertAll { index: 1, ref children } if children.len() == 2));
    }

    #[test]
    fn remove_range_requires_both_ends() {
        let err = parse("concatenatingRemoveRange", json!({"startIndex": 0})).unwrap_err();
        assert_eq!(err.code(), "concatenatingRemoveRange_error");
    }

    #[test]
    fn output_device_requires_id() {
        let err = parse("setOutputDevice", json!({})).unwrap_err();
        assert_eq!(err.code(), "device_id_not_found");
        assert_eq!(
            parse("setOutputDevice", json!({"deviceID": "abc"})).unwrap(),
            Command::SetOutputDevice("abc".to_string())
        );
    }

    #[test]
    fn platform_knobs_are_accepted() {
        for &name in ACCEPTED_NOOPS {
            let command = parse(name, json!({})).unwrap();
            assert_eq!(command, Command::Ignored(name));
            assert_eq!(command.name(), name);
        }
    }

    #[test]
    fn unknown_method_is_not_implemented() {
        let err = parse("fly", json!({})).unwrap_err();
        assert_eq!(err.code(), "not_implemented");
    }

    #[test]
    fn method_call_deserializes_without_arguments() {
        let call: MethodCall = serde_json::from_value(json!({"method": "play"})).unwrap();
        assert_eq!(call.arguments, Value::Null);
        assert_eq!(Command::parse(&call).unwrap(), Command::Play);
    }
}
