//! Live TfL Unified API client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::{TflArrivalPrediction, TflStopPoints, TransitDataSource};
use crate::fetch::{HttpClient, fetch_json};
use crate::model::Location;

/// NaPTAN place types that can have live arrivals.
const TFL_STOP_TYPES: &str =
    "NaptanMetroStation,NaptanRailStation,NaptanPublicBusCoachTram,NaptanFerryPort";

/// TfL Unified API client over a pluggable [`HttpClient`].
///
/// `app_id`/`app_key` are appended to every request; TfL accepts empty
/// credentials at a reduced rate limit.
pub struct TflApi<C: HttpClient> {
    client: C,
    base_url: String,
    app_id: String,
    app_key: String,
}

impl<C: HttpClient> TflApi<C> {
    pub fn new(client: C, base_url: String, app_id: String, app_key: String) -> Self {
        Self {
            client,
            base_url,
            app_id,
            app_key,
        }
    }
}

#[async_trait]
impl<C: HttpClient> TransitDataSource for TflApi<C> {
    async fn fetch_nearby_stops(
        &self,
        location: Location,
        radius_meters: u32,
    ) -> Result<TflStopPoints> {
        let url = format!("{}/Place", self.base_url);
        let lat = location.lat.to_string();
        let lon = location.long.to_string();
        let radius = radius_meters.to_string();
        let query = [
            ("type", TFL_STOP_TYPES),
            ("lat", lat.as_str()),
            ("lon", lon.as_str()),
            ("radius", radius.as_str()),
            ("app_id", self.app_id.as_str()),
            ("app_key", self.app_key.as_str()),
        ];

        debug!(lat = location.lat, lon = location.long, radius_meters, "GET /Place");
        fetch_json(&self.client, &url, &query)
            .await
            .context("nearby stop search failed")
    }

    async fn fetch_arrivals(&self, stop_id: &str) -> Result<Vec<TflArrivalPrediction>> {
        let url = format!("{}/StopPoint/{}/Arrivals", self.base_url, stop_id);
        let query = [
            ("app_id", self.app_id.as_str()),
            ("app_key", self.app_key.as_str()),
        ];

        debug!(stop_id, "GET /StopPoint/{{id}}/Arrivals");
        fetch_json(&self.client, &url, &query)
            .await
            .with_context(|| format!("arrivals fetch failed for stop {stop_id}"))
    }
}
