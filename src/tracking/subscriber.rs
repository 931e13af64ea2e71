//! Tracking-side consumption of location pushes, debounced to a minimum
//! inter-update interval. The gate lives here, independent of the transport:
//! a sample younger than the interval is dropped, not queued.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::models::event::TrackingEvent;
use crate::models::location::LiveLocation;

pub struct LocationWatch {
    events: BroadcastStream<TrackingEvent>,
    provider_id: Uuid,
    min_interval: Duration,
    last_yield: Option<Instant>,
}

impl LocationWatch {
    pub fn new(
        rx: broadcast::Receiver<TrackingEvent>,
        provider_id: Uuid,
        min_interval: Duration,
    ) -> Self {
        Self {
            events: BroadcastStream::new(rx),
            provider_id,
            min_interval,
            last_yield: None,
        }
    }

    /// Next sample for the watched provider. `None` once the channel closes.
    pub async fn next_location(&mut self) -> Option<LiveLocation> {
        while let Some(event) = self.events.next().await {
            // Lagged receivers skip ahead; the next sample supersedes anyway.
            let Ok(TrackingEvent::Location { location }) = event else {
                continue;
            };
            if location.provider_id != self.provider_id {
                continue;
            }

            let now = Instant::now();
            if let Some(last) = self.last_yield {
                if now.duration_since(last) < self.min_interval {
                    continue;
                }
            }
            self.last_yield = Some(now);
            return Some(location);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::location::GeoPoint;

    fn sample(provider_id: Uuid, lat: f64) -> TrackingEvent {
        TrackingEvent::Location {
            location: LiveLocation {
                provider_id,
                position: GeoPoint { lat, lng: 13.405 },
                updated_at: Utc::now(),
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_updates_are_debounced() {
        let (tx, rx) = broadcast::channel(16);
        let provider = Uuid::new_v4();
        let mut watch = LocationWatch::new(rx, provider, Duration::from_secs(3));

        tx.send(sample(provider, 52.51)).unwrap();
        tx.send(sample(provider, 52.52)).unwrap();

        let first = watch.next_location().await.unwrap();
        assert!((first.position.lat - 52.51).abs() < 1e-9);

        tokio::time::advance(Duration::from_secs(4)).await;
        tx.send(sample(provider, 52.53)).unwrap();

        // 52.52 arrived inside the interval and was dropped, not queued
        let second = watch.next_location().await.unwrap();
        assert!((second.position.lat - 52.53).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn other_providers_are_filtered_out() {
        let (tx, rx) = broadcast::channel(16);
        let watched = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut watch = LocationWatch::new(rx, watched, Duration::from_millis(0));

        tx.send(sample(other, 1.0)).unwrap();
        tx.send(sample(watched, 2.0)).unwrap();

        let received = watch.next_location().await.unwrap();
        assert_eq!(received.provider_id, watched);
        assert!((received.position.lat - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn closed_channel_ends_the_watch() {
        let (tx, rx) = broadcast::channel(16);
        let provider = Uuid::new_v4();
        let mut watch = LocationWatch::new(rx, provider, Duration::from_secs(1));

        drop(tx);
        assert!(watch.next_location().await.is_none());
    }
}
