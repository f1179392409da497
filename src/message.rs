//! Wire protocol: the `{ "type": .., "message": .. }` envelope in both
//! directions.
//!
//! Inbound frames are parsed once at the boundary into a closed [`Request`]
//! union; unknown tags are a distinct variant rather than a parse failure so
//! the dispatch layer can log and drop them explicitly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Departure, Location, Mode, StopPoint};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message envelope: {0}")]
    MalformedEnvelope(#[from] serde_json::Error),
    #[error("missing payload for {tag} message")]
    MissingPayload { tag: &'static str },
}

/// A parsed inbound client request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Client reported its geolocation; resolve stops and start updates.
    Location(Location),
    /// Client asked to narrow updates to one mode id.
    Mode(String),
    /// A well-formed envelope with a tag this server does not know.
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    tag: String,
    #[serde(default)]
    message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LocationPayload {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct ModePayload {
    mode: String,
}

impl Request {
    /// Parses a raw text frame into a [`Request`].
    pub fn parse(text: &str) -> Result<Request, ProtocolError> {
        let envelope: RawEnvelope = serde_json::from_str(text)?;
        match envelope.tag.as_str() {
            "LOCATION" => {
                let payload = envelope
                    .message
                    .ok_or(ProtocolError::MissingPayload { tag: "LOCATION" })?;
                let payload: LocationPayload = serde_json::from_value(payload)?;
                Ok(Request::Location(payload.location))
            }
            "MODE" => {
                let payload = envelope
                    .message
                    .ok_or(ProtocolError::MissingPayload { tag: "MODE" })?;
                let payload: ModePayload = serde_json::from_value(payload)?;
                Ok(Request::Mode(payload.mode))
            }
            _ => Ok(Request::Unknown(envelope.tag)),
        }
    }
}

/// Outbound envelope. Serialized once and handed to the connection's write
/// task as a ready-to-send string.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    #[serde(rename = "type")]
    tag: &'static str,
    message: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopPointsResponse {
    pub stop_points: Vec<StopPoint>,
    pub modes: Vec<Mode>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeparturesResponse {
    pub stop_id: String,
    pub departures: Vec<Departure>,
}

/// Builds the `STATUS` acknowledgement frame.
pub fn status_frame(text: &str) -> Option<String> {
    serialize(Envelope {
        tag: "STATUS",
        message: text,
    })
}

/// Builds the `STOP_POINTS` frame sent after location resolution.
pub fn stop_points_frame(stop_points: Vec<StopPoint>, modes: Vec<Mode>) -> Option<String> {
    serialize(Envelope {
        tag: "STOP_POINTS",
        message: StopPointsResponse { stop_points, modes },
    })
}

/// Builds a `DEPARTURES` frame for one stop.
pub fn departures_frame(stop_id: &str, departures: &[Departure]) -> Option<String> {
    serialize(Envelope {
        tag: "DEPARTURES",
        message: DeparturesResponse {
            stop_id: stop_id.to_string(),
            departures: departures.to_vec(),
        },
    })
}

/// `None` means the frame must not be sent. The envelope types contain only
/// strings, bools, and enums, so this does not fail for any value the server
/// constructs, but a failure must never reach the client as an empty frame.
fn serialize<T: Serialize>(envelope: Envelope<T>) -> Option<String> {
    let tag = envelope.tag;
    match serde_json::to_string(&envelope) {
        Ok(json) => Some(json),
        Err(error) => {
            tracing::error!(tag, error = %error, "failed to serialize outbound frame");
            None
        }
    }
}
