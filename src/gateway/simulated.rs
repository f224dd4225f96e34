//! A provider set that replays a fixed track, used when no platform location
//! service is wired in.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{bail, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ProviderGateway, ReadingCallback};
use crate::config::{SimulationConfig, TrackPoint};
use crate::location::LocationReading;
use crate::util;

#[derive(Debug, Clone)]
struct SimulatedProvider {
    name: String,
    accuracy: f32,
}

#[derive(Default)]
struct Shared {
    last_known: BTreeMap<String, LocationReading>,
    subscription: Option<CancellationToken>,
}

pub struct SimulatedGateway {
    providers: Vec<SimulatedProvider>,
    track: Vec<TrackPoint>,
    step: Duration,
    shared: Arc<Mutex<Shared>>,
}

impl SimulatedGateway {
    pub fn new(config: &SimulationConfig) -> Self {
        let providers: Vec<SimulatedProvider> = config
            .providers
            .iter()
            .map(|p| SimulatedProvider {
                name: p.name.clone(),
                accuracy: p.accuracy,
            })
            .collect();

        let mut shared = Shared::default();
        if let Some(first) = config.track.first() {
            let now = util::now_millis();
            for provider in &providers {
                shared
                    .last_known
                    .insert(provider.name.clone(), fix(first, provider.accuracy, now));
            }
        }

        Self {
            providers,
            track: config.track.clone(),
            step: Duration::from_millis(config.step_ms),
            shared: Arc::new(Mutex::new(shared)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock_shared(&self.shared)
    }
}

fn lock_shared(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn fix(point: &TrackPoint, accuracy: f32, now_ms: i64) -> LocationReading {
    LocationReading::new(point.lat, point.lng, point.alt, accuracy, now_ms)
}

impl ProviderGateway for SimulatedGateway {
    fn list_providers(&self) -> BTreeSet<String> {
        self.providers.iter().map(|p| p.name.clone()).collect()
    }

    fn last_known_reading(&self, provider: &str) -> Option<LocationReading> {
        self.lock().last_known.get(provider).copied()
    }

    fn subscribe(
        &self,
        min_interval: Duration,
        min_distance_m: f32,
        callback: ReadingCallback,
    ) -> Result<()> {
        if self.track.is_empty() {
            bail!("Simulated track has no points");
        }

        let token = CancellationToken::new();
        if let Some(previous) = self.lock().subscription.replace(token.clone()) {
            previous.cancel();
        }

        let period = self.step.max(min_interval).max(Duration::from_millis(1));
        let providers = self.providers.clone();
        let track = self.track.clone();
        let shared = self.shared.clone();
        info!(
            "[GATEWAY] Replaying {} track points from {} providers every {:?}",
            track.len(),
            providers.len(),
            period
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            let mut delivered: BTreeMap<String, LocationReading> = BTreeMap::new();
            let mut index = 0;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let point = &track[index % track.len()];
                index += 1;
                let now = util::now_millis();

                for provider in &providers {
                    let reading = fix(point, provider.accuracy, now);
                    if let Some(previous) = delivered.get(&provider.name) {
                        if reading.distance_to(previous) < f64::from(min_distance_m) {
                            continue;
                        }
                    }
                    delivered.insert(provider.name.clone(), reading);
                    lock_shared(&shared)
                        .last_known
                        .insert(provider.name.clone(), reading);
                    debug!("[GATEWAY] {} delivered {:?}", provider.name, reading);
                    callback(reading);
                }
            }
            debug!("[GATEWAY] Replay stopped");
        });

        Ok(())
    }

    fn unsubscribe(&self) {
        if let Some(token) = self.lock().subscription.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulatedProviderConfig;

    fn config(track: Vec<TrackPoint>) -> SimulationConfig {
        SimulationConfig {
            step_ms: 1_000,
            providers: vec![
                SimulatedProviderConfig {
                    name: "network".into(),
                    accuracy: 20.0,
                },
                SimulatedProviderConfig {
                    name: "gps".into(),
                    accuracy: 2.0,
                },
            ],
            track,
        }
    }

    fn point(lat: f64, lng: f64) -> TrackPoint {
        TrackPoint { lat, lng, alt: 0.0 }
    }

    fn recorder() -> (ReadingCallback, Arc<Mutex<Vec<LocationReading>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ReadingCallback =
            Arc::new(move |reading: LocationReading| sink.lock().unwrap().push(reading));
        (callback, seen)
    }

    #[test]
    fn providers_are_seeded_with_first_point() {
        let gateway = SimulatedGateway::new(&config(vec![point(1.0, 2.0), point(3.0, 4.0)]));

        let names: Vec<_> = gateway.list_providers().into_iter().collect();
        assert_eq!(names, ["gps", "network"]);

        let gps = gateway.last_known_reading("gps").unwrap();
        assert_eq!((gps.latitude, gps.longitude, gps.accuracy), (1.0, 2.0, 2.0));
        assert!(gateway.last_known_reading("passive").is_none());
    }

    #[test]
    fn empty_track_has_no_last_known_reading() {
        let gateway = SimulatedGateway::new(&config(vec![]));
        assert!(gateway.last_known_reading("gps").is_none());
        let (callback, _) = recorder();
        assert!(gateway.subscribe(Duration::from_secs(1), 0.0, callback).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn replays_track_until_unsubscribed() {
        let gateway = SimulatedGateway::new(&config(vec![point(1.0, 1.0), point(2.0, 2.0)]));
        let (callback, seen) = recorder();

        gateway
            .subscribe(Duration::from_secs(5), 0.0, callback)
            .unwrap();
        // Ticks at 0s and 5s.
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        gateway.unsubscribe();
        tokio::time::sleep(Duration::from_secs(30)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0].latitude, 1.0);
        assert_eq!(seen[2].latitude, 2.0);
        assert_eq!(gateway.last_known_reading("gps").unwrap().latitude, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn suppresses_fixes_closer_than_min_distance() {
        let gateway = SimulatedGateway::new(&config(vec![point(1.0, 1.0)]));
        let (callback, seen) = recorder();

        gateway
            .subscribe(Duration::from_secs(1), 3.0, callback)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        gateway.unsubscribe();

        // Only the first fix per provider moves far enough.
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
