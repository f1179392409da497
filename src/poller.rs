//! The per-stop polling task.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::datasource::TransitDataSource;
use crate::model::Departure;
use crate::session::DeparturesSession;

/// Polls arrivals for one stop until its generation is superseded.
///
/// The first tick fires immediately, then every `poll_interval`. Ticks are
/// strictly sequential for a given stop: the next fetch does not begin until
/// the previous tick's processing, including the dedup write, has finished.
/// A fetch failure is logged and retried on the next scheduled tick; it
/// never terminates the loop.
pub async fn poll_stop(
    session: Arc<DeparturesSession>,
    source: Arc<dyn TransitDataSource>,
    stop_id: String,
    generation: u64,
    poll_interval: Duration,
) {
    let mut ticks = tokio::time::interval(poll_interval.max(Duration::from_millis(1)));
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticks.tick().await;
        if session.current_generation() != generation {
            // Cancellation observed; exit without delivering anything.
            return;
        }

        match source.fetch_arrivals(&stop_id).await {
            Ok(predictions) => {
                let departures: Vec<Departure> =
                    predictions.iter().map(Departure::from_prediction).collect();
                session.deliver_if_changed(generation, &stop_id, departures);
            }
            Err(error) => {
                warn!(
                    connection_id = %session.connection_id(),
                    stop_id = %stop_id,
                    error = %error,
                    "arrivals fetch failed, retrying on next tick"
                );
            }
        }
    }
}
