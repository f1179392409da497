//! Per-connection departure-polling orchestrator.
//!
//! A [`DeparturesSession`] owns the stop points resolved for one connection
//! and the set of pollers currently feeding it. Cancellation is
//! generation-based: every `start_updates_for_mode` call bumps a counter and
//! pollers compare their tagged generation against it before fetching and
//! again before delivering, so a mode switch can never let a stale poller
//! push a frame.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::datasource::TransitDataSource;
use crate::message;
use crate::model::{Departure, Mode, StopPoint};
use crate::poller;

pub struct DeparturesSession {
    connection_id: String,
    stop_points: Vec<StopPoint>,
    /// Serialized frames to this connection's write task.
    outbound: mpsc::UnboundedSender<String>,
    /// Current poller generation. 0 = idle, never polled.
    generation: AtomicU64,
    /// Handles for the active generation's pollers.
    pollers: Mutex<Vec<JoinHandle<()>>>,
    /// Last delivered departure list per stop. Written only by the poller
    /// owning that stop in the current generation.
    dedup: Mutex<HashMap<String, Vec<Departure>>>,
}

impl DeparturesSession {
    pub fn new(
        connection_id: String,
        stop_points: Vec<StopPoint>,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            connection_id,
            stop_points,
            outbound,
            generation: AtomicU64::new(0),
            pollers: Mutex::new(Vec::new()),
            dedup: Mutex::new(HashMap::new()),
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn stop_points(&self) -> &[StopPoint] {
        &self.stop_points
    }

    /// Distinct modes offered across this session's stop points, in
    /// canonical order.
    pub fn available_modes(&self) -> Vec<Mode> {
        let mut modes: Vec<Mode> = self
            .stop_points
            .iter()
            .flat_map(|stop| stop.modes.iter().copied())
            .collect();
        modes.sort();
        modes.dedup();
        modes
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Starts a new poller generation for `mode`, cancelling any previous
    /// generation first.
    ///
    /// One poller is spawned per stop point serving `mode`; a stop set with
    /// no match is valid and simply starts nothing. Old pollers are
    /// invalidated by the generation bump before their handles are aborted,
    /// so an in-flight fetch from the previous generation can still complete
    /// but its result is discarded rather than delivered.
    pub fn start_updates_for_mode(
        self: &Arc<Self>,
        mode: Mode,
        source: &Arc<dyn TransitDataSource>,
        poll_interval: Duration,
    ) {
        let mut pollers = self.pollers.lock().unwrap();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        for handle in pollers.drain(..) {
            handle.abort();
        }

        let selected: Vec<String> = self
            .stop_points
            .iter()
            .filter(|stop| stop.modes.contains(&mode))
            .map(|stop| stop.stop_id.clone())
            .collect();

        info!(
            connection_id = %self.connection_id,
            mode = mode.id(),
            generation,
            stop_count = selected.len(),
            "starting departure updates"
        );

        for stop_id in selected {
            let handle = tokio::spawn(poller::poll_stop(
                Arc::clone(self),
                Arc::clone(source),
                stop_id,
                generation,
                poll_interval,
            ));
            pollers.push(handle);
        }
    }

    /// Cancels all pollers of the current generation. Safe to call when no
    /// pollers are active.
    pub fn stop_updates(&self) {
        let mut pollers = self.pollers.lock().unwrap();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if !pollers.is_empty() {
            debug!(
                connection_id = %self.connection_id,
                generation,
                cancelled = pollers.len(),
                "stopping departure updates"
            );
        }
        for handle in pollers.drain(..) {
            handle.abort();
        }
    }

    /// Records and pushes a freshly fetched departure list, unless the
    /// owning poller's generation has been superseded or the list is
    /// structurally identical to the last one delivered for this stop.
    pub(crate) fn deliver_if_changed(
        &self,
        generation: u64,
        stop_id: &str,
        departures: Vec<Departure>,
    ) {
        let mut cache = self.dedup.lock().unwrap();
        // A fetch that began under a valid generation but completed after a
        // mode switch must not deliver anything.
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        if cache.get(stop_id) == Some(&departures) {
            debug!(
                connection_id = %self.connection_id,
                stop_id,
                "departures unchanged, not sending"
            );
            return;
        }

        let Some(frame) = message::departures_frame(stop_id, &departures) else {
            return;
        };
        cache.insert(stop_id.to_string(), departures);
        drop(cache);

        if self.outbound.send(frame).is_err() {
            warn!(
                connection_id = %self.connection_id,
                stop_id,
                "failed to send departures, connection write channel closed"
            );
        } else {
            info!(connection_id = %self.connection_id, stop_id, "departures sent");
        }
    }
}
