//! Provider-side location publishing: bounded write rate, monotonic
//! timestamps, and a heartbeat that re-announces the latest sample so late
//! subscribers converge without waiting for the provider to move.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::event::TrackingEvent;
use crate::models::location::{GeoPoint, LiveLocation};
use crate::state::AppState;

#[derive(Debug)]
pub enum LocationWrite {
    Applied(LiveLocation),
    /// Arrived out of order; the stored sample is newer.
    Stale,
    /// Newer, but inside the minimum publish interval.
    RateLimited,
}

pub fn publish_location(
    state: &AppState,
    provider_id: Uuid,
    position: GeoPoint,
    recorded_at: Option<DateTime<Utc>>,
) -> LocationWrite {
    let recorded_at = recorded_at.unwrap_or_else(Utc::now);
    let min_interval = Duration::milliseconds(state.config.publish_min_interval_ms as i64);

    let location = if let Some(mut current) = state.locations.get_mut(&provider_id) {
        if recorded_at <= current.updated_at {
            state.metrics.stale_location_drops_total.inc();
            debug!(%provider_id, "dropped out-of-order location sample");
            return LocationWrite::Stale;
        }
        if recorded_at - current.updated_at < min_interval {
            return LocationWrite::RateLimited;
        }
        current.position = position;
        current.updated_at = recorded_at;
        current.clone()
    } else {
        let location = LiveLocation {
            provider_id,
            position,
            updated_at: recorded_at,
        };
        state.locations.insert(provider_id, location.clone());
        location
    };

    let _ = state.events_tx.send(TrackingEvent::Location {
        location: location.clone(),
    });
    LocationWrite::Applied(location)
}

/// Periodic re-announcement of every stored sample. Does not touch
/// `updated_at`; bumping it would defeat the staleness check above.
pub async fn run_location_heartbeat(state: Arc<AppState>) {
    info!("location heartbeat started");
    let mut ticker = tokio::time::interval(state.config.heartbeat_interval);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        for entry in state.locations.iter() {
            let _ = state.events_tx.send(TrackingEvent::Location {
                location: entry.value().clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::config::Config;

    fn test_state() -> AppState {
        AppState::new(Config::default()).expect("state")
    }

    fn point(lat: f64) -> GeoPoint {
        GeoPoint { lat, lng: 13.405 }
    }

    #[test]
    fn first_sample_is_applied() {
        let state = test_state();
        let provider = Uuid::new_v4();

        let write = publish_location(&state, provider, point(52.52), None);
        assert!(matches!(write, LocationWrite::Applied(_)));
        assert!(state.locations.contains_key(&provider));
    }

    #[test]
    fn out_of_order_sample_does_not_regress_the_record() {
        let state = test_state();
        let provider = Uuid::new_v4();
        let t1 = Utc::now();

        publish_location(&state, provider, point(52.52), Some(t1));
        let write = publish_location(
            &state,
            provider,
            point(40.0),
            Some(t1 - Duration::seconds(60)),
        );

        assert!(matches!(write, LocationWrite::Stale));
        let stored = state.locations.get(&provider).unwrap();
        assert_eq!(stored.updated_at, t1);
        assert!((stored.position.lat - 52.52).abs() < 1e-9);
    }

    #[test]
    fn samples_inside_the_publish_interval_are_dropped() {
        let state = test_state();
        let provider = Uuid::new_v4();
        let t1 = Utc::now();

        publish_location(&state, provider, point(52.52), Some(t1));
        let too_soon = publish_location(
            &state,
            provider,
            point(52.53),
            Some(t1 + Duration::milliseconds(500)),
        );
        assert!(matches!(too_soon, LocationWrite::RateLimited));

        let later = publish_location(
            &state,
            provider,
            point(52.53),
            Some(t1 + Duration::seconds(3)),
        );
        assert!(matches!(later, LocationWrite::Applied(_)));
    }

    #[test]
    fn applied_samples_are_broadcast() {
        let state = test_state();
        let provider = Uuid::new_v4();
        let mut rx = state.subscribe_events();

        publish_location(&state, provider, point(52.52), None);

        match rx.try_recv() {
            Ok(TrackingEvent::Location { location }) => {
                assert_eq!(location.provider_id, provider);
            }
            other => panic!("expected a location event, got {other:?}"),
        }
    }
}
