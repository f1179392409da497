//! Domain model: transport modes, stop points, and normalized departures.
//!
//! Raw TfL payloads (see [`crate::datasource`]) are normalized here into the
//! display-ready values that go out on the wire. Deduplication compares
//! these normalized values, so every rule in this module is part of the
//! "has anything visibly changed" contract.

use serde::Serialize;

use crate::datasource::{TflArrivalPrediction, TflStopPoint};

/// A transport mode from TfL's fixed mode set.
///
/// Declaration order is the canonical order: it drives sorting of mode lists
/// and the "first available mode" pick when a session starts. Serializes as
/// the display name (`"Bus"`, `"Tube"`, ...); inbound mode ids are the
/// lowercase TfL identifiers and are resolved via [`Mode::from_mode_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Mode {
    Bus,
    Tube,
    #[serde(rename = "DLR")]
    Dlr,
    Overground,
    Tram,
    TflRail,
    RiverBus,
    NationalRail,
}

impl Mode {
    /// All modes in canonical order.
    pub const ALL: [Mode; 8] = [
        Mode::Bus,
        Mode::Tube,
        Mode::Dlr,
        Mode::Overground,
        Mode::Tram,
        Mode::TflRail,
        Mode::RiverBus,
        Mode::NationalRail,
    ];

    /// The lowercase TfL mode identifier, as seen in API responses and
    /// inbound `MODE` messages.
    pub fn id(&self) -> &'static str {
        match self {
            Mode::Bus => "bus",
            Mode::Tube => "tube",
            Mode::Dlr => "dlr",
            Mode::Overground => "overground",
            Mode::Tram => "tram",
            Mode::TflRail => "tflrail",
            Mode::RiverBus => "river-bus",
            Mode::NationalRail => "national-rail",
        }
    }

    /// Resolves a TfL mode id to a [`Mode`]. Unknown ids map to `None`.
    pub fn from_mode_id(id: &str) -> Option<Mode> {
        Mode::ALL.into_iter().find(|m| m.id() == id)
    }
}

/// A client-reported geolocation.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct Location {
    pub lat: f64,
    pub long: f64,
}

/// A physical transit stop near the client, with the modes it serves.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopPoint {
    pub name: String,
    pub stop_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicator: Option<String>,
    pub modes: Vec<Mode>,
}

impl StopPoint {
    /// Builds a display-ready stop point from a raw TfL place.
    ///
    /// Unknown mode ids from upstream are dropped; the remaining modes are
    /// sorted into canonical order.
    pub fn from_tfl(raw: &TflStopPoint) -> Self {
        let mut modes: Vec<Mode> = raw
            .modes
            .iter()
            .filter_map(|id| Mode::from_mode_id(id))
            .collect();
        modes.sort();
        modes.dedup();
        StopPoint {
            name: convert_station_name(&raw.common_name),
            stop_id: raw.naptan_id.clone(),
            indicator: raw.indicator.clone(),
            modes,
        }
    }
}

/// A normalized, display-ready prediction of one upcoming vehicle at a stop.
///
/// Structural equality over the full field set (and over ordered lists of
/// these) is what the dedup cache uses to decide whether a tick produced
/// genuinely new information.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Departure {
    pub line: String,
    pub destination: String,
    pub departure_time: String,
    pub mode: Option<Mode>,
    pub direction: String,
    pub platform: String,
    pub is_terminating: bool,
}

impl Departure {
    pub fn from_prediction(raw: &TflArrivalPrediction) -> Self {
        Departure {
            line: raw.line_name.clone(),
            destination: convert_station_name(&raw.destination_name),
            departure_time: format_arrival_time(raw.time_to_station),
            mode: Mode::from_mode_id(&raw.mode_name),
            direction: extract_direction(&raw.platform_name),
            platform: extract_platform(&raw.platform_name),
            is_terminating: raw.naptan_id == raw.destination_naptan_id,
        }
    }
}

/// Strips TfL station-name suffixes that add no information on a departures
/// board ("Oxford Circus Underground Station" -> "Oxford Circus").
fn convert_station_name(name: &str) -> String {
    [
        " Rail Station",
        " Underground Station",
        " DLR Station",
        " (London)",
    ]
    .iter()
    .fold(name.to_string(), |current, suffix| {
        current.replace(suffix, "")
    })
}

/// Seconds-to-arrival -> whole minutes, with `"Due"` at zero minutes.
fn format_arrival_time(arrival_in_seconds: i64) -> String {
    let minutes = arrival_in_seconds / 60;
    if minutes == 0 {
        "Due".to_string()
    } else {
        format!("{minutes} mins")
    }
}

/// The text before `" -"` in a TfL platform name is the direction
/// ("Westbound - Platform 2" -> "Westbound"); no separator means no
/// direction information.
fn extract_direction(platform_name: &str) -> String {
    match platform_name.find(" -") {
        Some(idx) => platform_name[..idx].to_string(),
        None => String::new(),
    }
}

/// The text after `" - "` is the platform. A bare value without the word
/// "Platform" (buses report just a stop letter) gets a `"Platform "` prefix.
fn extract_platform(platform_name: &str) -> String {
    match platform_name.find(" -") {
        Some(idx) => platform_name.get(idx + 3..).unwrap_or("").to_string(),
        None if !platform_name.contains("Platform") => {
            format!("Platform {platform_name}")
        }
        None => platform_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(overrides: impl FnOnce(&mut TflArrivalPrediction)) -> TflArrivalPrediction {
        let mut raw = TflArrivalPrediction {
            line_name: "Victoria".to_string(),
            station_name: "Oxford Circus Underground Station".to_string(),
            naptan_id: "940GZZLUOXC".to_string(),
            destination_name: "Brixton Underground Station".to_string(),
            destination_naptan_id: "940GZZLUBXN".to_string(),
            time_to_station: 120,
            mode_name: "tube".to_string(),
            platform_name: "Southbound - Platform 5".to_string(),
        };
        overrides(&mut raw);
        raw
    }

    fn departure_time_for(seconds: i64) -> String {
        Departure::from_prediction(&prediction(|p| p.time_to_station = seconds)).departure_time
    }

    #[test]
    fn mode_order_is_declaration_order() {
        let mut modes = vec![Mode::Tube, Mode::NationalRail, Mode::Bus];
        modes.sort();
        assert_eq!(modes, vec![Mode::Bus, Mode::Tube, Mode::NationalRail]);
    }

    #[test]
    fn mode_id_round_trip() {
        for mode in Mode::ALL {
            assert_eq!(Mode::from_mode_id(mode.id()), Some(mode));
        }
        assert_eq!(Mode::from_mode_id("cable-car"), None);
        assert_eq!(Mode::from_mode_id(""), None);
        assert_eq!(Mode::from_mode_id("Bus"), None, "ids are lowercase, not display names");
    }

    #[test]
    fn mode_serializes_as_display_name() {
        assert_eq!(serde_json::to_string(&Mode::Dlr).unwrap(), "\"DLR\"");
        assert_eq!(serde_json::to_string(&Mode::Bus).unwrap(), "\"Bus\"");
        assert_eq!(serde_json::to_string(&Mode::TflRail).unwrap(), "\"TflRail\"");
    }

    #[test]
    fn stop_point_sorts_and_drops_unknown_modes() {
        let raw = TflStopPoint {
            common_name: "Oxford Circus Underground Station".to_string(),
            naptan_id: "940GZZLUOXC".to_string(),
            indicator: None,
            modes: vec![
                "tube".to_string(),
                "walking".to_string(),
                "bus".to_string(),
            ],
        };
        let stop = StopPoint::from_tfl(&raw);
        assert_eq!(stop.name, "Oxford Circus");
        assert_eq!(stop.modes, vec![Mode::Bus, Mode::Tube]);
    }

    #[test]
    fn departure_normalizes_all_fields() {
        let dep = Departure::from_prediction(&prediction(|_| {}));
        assert_eq!(dep.line, "Victoria");
        assert_eq!(dep.destination, "Brixton");
        assert_eq!(dep.departure_time, "2 mins");
        assert_eq!(dep.mode, Some(Mode::Tube));
        assert_eq!(dep.direction, "Southbound");
        assert_eq!(dep.platform, "Platform 5");
        assert!(!dep.is_terminating);
    }

    #[test]
    fn arrival_time_rounds_down_to_whole_minutes() {
        assert_eq!(departure_time_for(0), "Due");
        assert_eq!(departure_time_for(59), "Due");
        assert_eq!(departure_time_for(60), "1 mins");
        assert_eq!(departure_time_for(119), "1 mins");
        assert_eq!(departure_time_for(600), "10 mins");
    }

    #[test]
    fn terminating_when_origin_equals_destination() {
        let dep = Departure::from_prediction(&prediction(|p| {
            p.destination_naptan_id = p.naptan_id.clone();
        }));
        assert!(dep.is_terminating);
    }

    #[test]
    fn bus_stop_letter_gets_platform_prefix() {
        let dep = Departure::from_prediction(&prediction(|p| {
            p.platform_name = "RG".to_string();
        }));
        assert_eq!(dep.direction, "");
        assert_eq!(dep.platform, "Platform RG");
    }

    #[test]
    fn platform_name_already_labelled_is_kept() {
        let dep = Departure::from_prediction(&prediction(|p| {
            p.platform_name = "Platform 2".to_string();
        }));
        assert_eq!(dep.direction, "");
        assert_eq!(dep.platform, "Platform 2");
    }

    #[test]
    fn direction_and_platform_split_on_separator() {
        let dep = Departure::from_prediction(&prediction(|p| {
            p.platform_name = "Westbound - Platform 2".to_string();
        }));
        assert_eq!(dep.direction, "Westbound");
        assert_eq!(dep.platform, "Platform 2");
    }

    #[test]
    fn station_suffixes_stripped_from_destination() {
        for (raw, expected) in [
            ("Stratford (London)", "Stratford"),
            ("Lewisham DLR Station", "Lewisham"),
            ("Clapham Junction Rail Station", "Clapham Junction"),
            ("Brixton Underground Station", "Brixton"),
            ("Oxford Circus", "Oxford Circus"),
        ] {
            let dep = Departure::from_prediction(&prediction(|p| {
                p.destination_name = raw.to_string();
            }));
            assert_eq!(dep.destination, expected);
        }
    }
}
