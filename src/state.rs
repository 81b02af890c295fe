use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, DispatchSettings};
use crate::engine::Engine;
use crate::notify::{BroadcastFanout, Fanout};
use crate::observability::metrics::Metrics;
use crate::store::{DispatchStore, MemoryStore};

pub struct AppState {
    pub store: Arc<dyn DispatchStore>,
    pub fanout: Arc<dyn Fanout>,
    pub clock: Arc<dyn Clock>,
    pub engine: Engine,
    pub metrics: Metrics,
    pub settings: DispatchSettings,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self::with_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            config.dispatch.clone(),
            config.event_buffer_size,
        )
    }

    /// Wires the engine around a caller-supplied store and clock.
    pub fn with_parts(
        store: Arc<dyn DispatchStore>,
        clock: Arc<dyn Clock>,
        settings: DispatchSettings,
        event_buffer_size: usize,
    ) -> Self {
        let metrics = Metrics::new();
        let fanout: Arc<dyn Fanout> = Arc::new(BroadcastFanout::with_metrics(event_buffer_size, metrics.clone()));
        let engine = Engine::new(
            store.clone(),
            fanout.clone(),
            clock.clone(),
            metrics.clone(),
            settings.clone(),
        );

        Self {
            store,
            fanout,
            clock,
            engine,
            metrics,
            settings,
        }
    }
}
