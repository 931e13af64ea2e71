use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::booking::Booking;
use crate::models::event::TrackingEvent;
use crate::models::location::LiveLocation;
use crate::observability::metrics::Metrics;
use crate::routing::RouteChain;
use crate::routing::http::HttpRouteProvider;

pub struct AppState {
    pub config: Config,
    pub bookings: DashMap<Uuid, Booking>,
    pub locations: DashMap<Uuid, LiveLocation>,
    pub events_tx: broadcast::Sender<TrackingEvent>,
    pub route_chain: RouteChain<HttpRouteProvider>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        let providers = config
            .route_providers
            .iter()
            .map(|provider| HttpRouteProvider::new(provider, config.route_timeout))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| AppError::Internal(format!("routing provider setup failed: {err}")))?;
        let route_chain = RouteChain::new(providers, config.fallback_speed_kmh);

        Ok(Self {
            bookings: DashMap::new(),
            locations: DashMap::new(),
            events_tx,
            route_chain,
            metrics: Metrics::new(),
            config,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<TrackingEvent> {
        self.events_tx.subscribe()
    }
}
