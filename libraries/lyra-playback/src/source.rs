//! Playable item model
//!
//! Parses declarative source descriptions and resolves them into
//! [`PlayableSource`] values the engine can open.
//!
//! Leaf types are `progressive`, `dash` and `hls`. `clipping` restricts a
//! leaf to a sub-range. `concatenating` and `looping` are playlist wrappers
//! and may nest to any depth.

use crate::error::SourceError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Leaf stream fields shared by every leaf type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescription {
    pub id: Option<String>,
    pub uri: String,
    pub headers: BTreeMap<String, String>,
}

/// Declarative description of an audio source tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescription {
    Progressive(StreamDescription),
    Dash(StreamDescription),
    Hls(StreamDescription),

    /// Sub-range of a leaf source, offsets in microseconds
    Clipping {
        id: Option<String>,
        child: Box<SourceDescription>,
        start: Option<i64>,
        end: Option<i64>,
    },

    /// Ordered list of children with a proposed shuffle order
    Concatenating {
        id: Option<String>,
        children: Vec<SourceDescription>,
        shuffle_order: Vec<i64>,
    },

    /// Child repeated `count` times
    Looping {
        id: Option<String>,
        child: Box<SourceDescription>,
        count: u32,
    },
}

impl SourceDescription {
    /// Parse a description from its structured map form
    pub fn from_value(value: &Value) -> Result<Self, SourceError> {
        let map = value.as_object().ok_or_else(|| SourceError::Malformed {
            kind: "audioSource".to_string(),
            reason: "expected a map".to_string(),
        })?;

        let kind = map
            .get("type")
            .and_then(Value::as_str)
            .ok_or(SourceError::MissingField("type"))?;
        let id = map.get("id").and_then(Value::as_str).map(str::to_string);

        match kind {
            "progressive" => Ok(SourceDescription::Progressive(stream(map, kind, id)?)),
            "dash" => Ok(SourceDescription::Dash(stream(map, kind, id)?)),
            "hls" => Ok(SourceDescription::Hls(stream(map, kind, id)?)),
            "clipping" => {
                let child = map.get("child").ok_or(SourceError::MissingField("child"))?;
                Ok(SourceDescription::Clipping {
                    id,
                    child: Box::new(Self::from_value(child)?),
                    start: optional_int(map, kind, "start")?,
                    end: optional_int(map, kind, "end")?,
                })
            }
            "concatenating" => {
                let children = map
                    .get("children")
                    .and_then(Value::as_array)
                    .ok_or(SourceError::MissingField("children"))?
                    .iter()
                    .map(Self::from_value)
                    .collect::<Result<Vec<_>, _>>()?;

                let shuffle_order = match map.get("shuffleOrder") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Array(values)) => values
                        .iter()
                        .map(|v| {
                            v.as_i64().ok_or_else(|| malformed(kind, "shuffleOrder must hold integers"))
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                    Some(_) => return Err(malformed(kind, "shuffleOrder must be a list")),
                };

                Ok(SourceDescription::Concatenating {
                    id,
                    children,
                    shuffle_order,
                })
            }
            "looping" => {
                let child = map.get("child").ok_or(SourceError::MissingField("child"))?;
                let count = optional_int(map, kind, "count")?.unwrap_or(1);
                let count = u32::try_from(count)
                    .map_err(|_| malformed(kind, "count must be a non-negative 32-bit integer"))?;
                Ok(SourceDescription::Looping {
                    id,
                    child: Box::new(Self::from_value(child)?),
                    count,
                })
            }
            other => Err(SourceError::UnsupportedSourceType(other.to_string())),
        }
    }

    /// Declared type name
    pub fn type_name(&self) -> &'static str {
        match self {
            SourceDescription::Progressive(_) => "progressive",
            SourceDescription::Dash(_) => "dash",
            SourceDescription::Hls(_) => "hls",
            SourceDescription::Clipping { .. } => "clipping",
            SourceDescription::Concatenating { .. } => "concatenating",
            SourceDescription::Looping { .. } => "looping",
        }
    }

    /// True for `concatenating` and `looping` wrappers
    pub fn is_playlist(&self) -> bool {
        matches!(
            self,
            SourceDescription::Concatenating { .. } | SourceDescription::Looping { .. }
        )
    }

    /// Number of queue items this description resolves to
    ///
    /// `None` when the count does not fit in a `usize`.
    pub fn item_count(&self) -> Option<usize> {
        match self {
            SourceDescription::Concatenating { children, .. } => children
                .iter()
                .try_fold(0usize, |total, child| total.checked_add(child.item_count()?)),
            SourceDescription::Looping { child, count, .. } => {
                child.item_count()?.checked_mul(*count as usize)
            }
            _ => Some(1),
        }
    }

    /// Item count, failing when it exceeds `max_items`
    pub fn bounded_item_count(&self, max_items: usize) -> Result<usize, SourceError> {
        self.item_count()
            .filter(|&count| count <= max_items)
            .ok_or(SourceError::TooManyItems {
                kind: self.type_name(),
                max: max_items,
            })
    }
}

fn malformed(kind: &str, reason: &str) -> SourceError {
    SourceError::Malformed {
        kind: kind.to_string(),
        reason: reason.to_string(),
    }
}

fn stream(
    map: &Map<String, Value>,
    kind: &str,
    id: Option<String>,
) -> Result<StreamDescription, SourceError> {
    let uri = map
        .get("uri")
        .and_then(Value::as_str)
        .ok_or(SourceError::MissingField("uri"))?
        .to_string();

    let headers = match map.get("headers") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(headers)) => headers
            .iter()
            .map(|(k, v)| {
                v.as_str()
                    .map(|v| (k.clone(), v.to_string()))
                    .ok_or_else(|| malformed(kind, "header values must be strings"))
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(malformed(kind, "headers must be a map")),
    };

    Ok(StreamDescription { id, uri, headers })
}

fn optional_int(
    map: &Map<String, Value>,
    kind: &str,
    key: &'static str,
) -> Result<Option<i64>, SourceError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| malformed(kind, &format!("{key} must be an integer"))),
    }
}

/// Adaptive streaming protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamProtocol {
    Dash,
    Hls,
}

/// A single resolved audio source
///
/// Never a playlist; a clip always wraps a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayableSource {
    Progressive {
        uri: String,
        headers: BTreeMap<String, String>,
    },
    Adaptive {
        uri: String,
        protocol: StreamProtocol,
        headers: BTreeMap<String, String>,
    },
    Clipped {
        child: Box<PlayableSource>,
        start: Duration,
        end: Option<Duration>,
    },
}

impl PlayableSource {
    /// Build a single playable source from a leaf or clip description
    pub fn build(description: &SourceDescription) -> Result<Self, SourceError> {
        match description {
            SourceDescription::Clipping {
                child, start, end, ..
            } => {
                let child = Self::build_leaf(child)?;
                let start = clip_offset(*start, "start")?.unwrap_or(Duration::ZERO);
                let end = clip_offset(*end, "end")?;

                if let Some(end) = end {
                    if end <= start {
                        return Err(SourceError::InvalidClipRange { start, end });
                    }
                }

                Ok(PlayableSource::Clipped {
                    child: Box::new(child),
                    start,
                    end,
                })
            }
            other => Self::build_leaf(other),
        }
    }

    fn build_leaf(description: &SourceDescription) -> Result<Self, SourceError> {
        match description {
            SourceDescription::Progressive(s) => Ok(PlayableSource::Progressive {
                uri: s.uri.clone(),
                headers: s.headers.clone(),
            }),
            SourceDescription::Dash(s) => Ok(PlayableSource::Adaptive {
                uri: s.uri.clone(),
                protocol: StreamProtocol::Dash,
                headers: s.headers.clone(),
            }),
            SourceDescription::Hls(s) => Ok(PlayableSource::Adaptive {
                uri: s.uri.clone(),
                protocol: StreamProtocol::Hls,
                headers: s.headers.clone(),
            }),
            other => Err(SourceError::UnsupportedSourceType(other.type_name().to_string())),
        }
    }

    /// Resolve a description of any shape into queue items in play order
    ///
    /// Playlist wrappers are flattened; `looping` repeats its child's items.
    /// Descriptions that expand to more than `max_items` are rejected before
    /// anything is built.
    pub fn resolve_all(
        description: &SourceDescription,
        max_items: usize,
    ) -> Result<Vec<Self>, SourceError> {
        let count = description.bounded_item_count(max_items)?;
        let mut out = Vec::with_capacity(count);
        Self::resolve_into(description, &mut out)?;
        Ok(out)
    }

    fn resolve_into(description: &SourceDescription, out: &mut Vec<Self>) -> Result<(), SourceError> {
        match description {
            SourceDescription::Concatenating { children, .. } => {
                for child in children {
                    Self::resolve_into(child, out)?;
                }
            }
            SourceDescription::Looping { child, count, .. } => {
                let mut items = Vec::new();
                Self::resolve_into(child, &mut items)?;
                if items.is_empty() {
                    return Ok(());
                }
                for _ in 0..*count {
                    out.extend(items.iter().cloned());
                }
            }
            leaf => out.push(Self::build(leaf)?),
        }
        Ok(())
    }

    /// URI of the underlying stream
    pub fn uri(&self) -> &str {
        match self {
            PlayableSource::Progressive { uri, .. } | PlayableSource::Adaptive { uri, .. } => uri,
            PlayableSource::Clipped { child, .. } => child.uri(),
        }
    }

    /// Request headers of the underlying stream
    pub fn headers(&self) -> &BTreeMap<String, String> {
        match self {
            PlayableSource::Progressive { headers, .. }
            | PlayableSource::Adaptive { headers, .. } => headers,
            PlayableSource::Clipped { child, .. } => child.headers(),
        }
    }

    /// Start offset into the underlying stream
    pub fn start_offset(&self) -> Duration {
        match self {
            PlayableSource::Clipped { start, .. } => *start,
            _ => Duration::ZERO,
        }
    }

    /// Playback window length, `None` meaning "to natural end"
    pub fn duration_limit(&self) -> Option<Duration> {
        match self {
            PlayableSource::Clipped {
                start,
                end: Some(end),
                ..
            } => Some(*end - *start),
            _ => None,
        }
    }
}

fn clip_offset(micros: Option<i64>, field: &str) -> Result<Option<Duration>, SourceError> {
    match micros {
        None => Ok(None),
        Some(us) => u64::try_from(us)
            .map(|us| Some(Duration::from_micros(us)))
            .map_err(|_| malformed("clipping", &format!("{field} must not be negative"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn progressive(uri: &str) -> Value {
        json!({"type": "progressive", "id": uri, "uri": uri})
    }

    #[test]
    fn parse_progressive_with_headers() {
        let desc = SourceDescription::from_value(&json!({
            "type": "progressive",
            "uri": "https://example.com/a.mp3",
            "headers": {"Authorization": "Bearer x"}
        }))
        .unwrap();

        let source = PlayableSource::build(&desc).unwrap();
        assert_eq!(source.uri(), "https://example.com/a.mp3");
        assert_eq!(source.headers().get("Authorization").unwrap(), "Bearer x");
    }

    #[test]
    fn dash_and_hls_are_adaptive() {
        for (kind, protocol) in [("dash", StreamProtocol::Dash), ("hls", StreamProtocol::Hls)] {
            let desc =
                SourceDescription::from_value(&json!({"type": kind, "uri": "u"})).unwrap();
            match PlayableSource::build(&desc).unwrap() {
                PlayableSource::Adaptive { protocol: p, .. } => assert_eq!(p, protocol),
                other => panic!("expected adaptive source, got {:?}", other),
            }
        }
    }

    #[test]
    fn unknown_type_is_unsupported() {
        let err = SourceDescription::from_value(&json!({"type": "silence", "duration": 10}))
            .unwrap_err();
        assert_eq!(err, SourceError::UnsupportedSourceType("silence".to_string()));
    }

    #[test]
    fn clip_window_spans_start_to_end() {
        let desc = SourceDescription::from_value(&json!({
            "type": "clipping",
            "child": progressive("a"),
            "start": 1_000_000,
            "end": 3_000_000
        }))
        .unwrap();

        let source = PlayableSource::build(&desc).unwrap();
        assert_eq!(source.start_offset(), Duration::from_secs(1));
        assert_eq!(source.duration_limit(), Some(Duration::from_micros(2_000_000)));
    }

    #[test]
    fn clip_defaults_to_start_of_stream() {
        let desc = SourceDescription::from_value(&json!({
            "type": "clipping",
            "child": progressive("a")
        }))
        .unwrap();

        let source = PlayableSource::build(&desc).unwrap();
        assert_eq!(source.start_offset(), Duration::ZERO);
        assert_eq!(source.duration_limit(), None);
    }

    #[test]
    fn clip_end_must_follow_start() {
        let desc = SourceDescription::from_value(&json!({
            "type": "clipping",
            "child": progressive("a"),
            "start": 2_000_000,
            "end": 2_000_000
        }))
        .unwrap();

        assert!(matches!(
            PlayableSource::build(&desc),
            Err(SourceError::InvalidClipRange { .. })
        ));
    }

    #[test]
    fn clip_of_playlist_is_rejected() {
        let desc = SourceDescription::from_value(&json!({
            "type": "clipping",
            "child": {"type": "concatenating", "children": [progressive("a")]}
        }))
        .unwrap();

        assert_eq!(
            PlayableSource::build(&desc),
            Err(SourceError::UnsupportedSourceType("concatenating".to_string()))
        );
    }

    #[test]
    fn clip_of_clip_is_rejected() {
        let desc = SourceDescription::from_value(&json!({
            "type": "clipping",
            "child": {"type": "clipping", "child": progressive("a")}
        }))
        .unwrap();

        assert_eq!(
            PlayableSource::build(&desc),
            Err(SourceError::UnsupportedSourceType("clipping".to_string()))
        );
    }

    #[test]
    fn nested_playlists_flatten_in_play_order() {
        let desc = SourceDescription::from_value(&json!({
            "type": "concatenating",
            "children": [
                progressive("a"),
                {"type": "looping", "count": 2, "child": {
                    "type": "concatenating",
                    "children": [progressive("b"), progressive("c")]
                }},
                progressive("d")
            ]
        }))
        .unwrap();

        assert_eq!(desc.item_count(), Some(6));
        let uris: Vec<String> = PlayableSource::resolve_all(&desc, 100)
            .unwrap()
            .iter()
            .map(|s| s.uri().to_string())
            .collect();
        assert_eq!(uris, vec!["a", "b", "c", "b", "c", "d"]);
    }

    #[test]
    fn missing_uri_is_reported() {
        let err = SourceDescription::from_value(&json!({"type": "progressive"})).unwrap_err();
        assert_eq!(err, SourceError::MissingField("uri"));
    }

    fn nested_loops(count: u64) -> SourceDescription {
        SourceDescription::from_value(&json!({
            "type": "looping",
            "count": count,
            "child": {"type": "looping", "count": count, "child": progressive("a")}
        }))
        .unwrap()
    }

    #[test]
    fn overflowing_loop_counts_are_rejected() {
        let desc = nested_loops(u64::from(u32::MAX));
        assert_eq!(desc.item_count(), None);
        assert_eq!(
            PlayableSource::resolve_all(&desc, 10_000),
            Err(SourceError::TooManyItems {
                kind: "looping",
                max: 10_000
            })
        );
    }

    #[test]
    fn item_limit_is_inclusive() {
        let desc = nested_loops(10);
        assert_eq!(desc.bounded_item_count(100), Ok(100));
        assert_eq!(PlayableSource::resolve_all(&desc, 100).unwrap().len(), 100);
        assert!(PlayableSource::resolve_all(&desc, 99).is_err());
    }

    #[test]
    fn looping_an_empty_playlist_yields_nothing() {
        let desc = SourceDescription::from_value(&json!({
            "type": "looping",
            "count": u32::MAX,
            "child": {"type": "concatenating", "children": []}
        }))
        .unwrap();

        assert_eq!(desc.item_count(), Some(0));
        assert!(PlayableSource::resolve_all(&desc, 10).unwrap().is_empty());
    }
}
