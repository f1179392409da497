//! Upstream transit data source: trait, raw TfL response types, and the
//! live TfL Unified API implementation.

mod tfl;

pub use tfl::TflApi;

use anyhow::Result;
use serde::Deserialize;

use crate::model::Location;

/// A raw stop-point descriptor from the TfL `/Place` endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TflStopPoint {
    pub common_name: String,
    pub naptan_id: String,
    #[serde(default)]
    pub indicator: Option<String>,
    #[serde(default)]
    pub modes: Vec<String>,
}

/// The `/Place` response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct TflStopPoints {
    #[serde(default)]
    pub places: Vec<TflStopPoint>,
}

/// A raw arrival prediction from `/StopPoint/{id}/Arrivals`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TflArrivalPrediction {
    pub line_name: String,
    pub station_name: String,
    pub naptan_id: String,
    pub destination_name: String,
    pub destination_naptan_id: String,
    pub time_to_station: i64,
    pub mode_name: String,
    #[serde(default)]
    pub platform_name: String,
}

/// Abstraction over the upstream transit data provider.
///
/// The live implementation is [`TflApi`]; tests substitute fakes to script
/// arrival sequences and count fetches.
#[async_trait::async_trait]
pub trait TransitDataSource: Send + Sync {
    /// Returns raw stop points within `radius_meters` of `location`.
    async fn fetch_nearby_stops(
        &self,
        location: Location,
        radius_meters: u32,
    ) -> Result<TflStopPoints>;

    /// Returns raw arrival predictions for one stop point.
    async fn fetch_arrivals(&self, stop_id: &str) -> Result<Vec<TflArrivalPrediction>>;
}
