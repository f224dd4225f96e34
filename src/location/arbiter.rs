//! Rules for choosing which location reading to hold.
//!
//! Two decisions live here: picking the best last-known fix across all
//! providers when the reporter starts, and deciding whether a live update
//! should replace the reading currently held.

use serde::Deserialize;
use tracing::debug;

use super::reading::LocationReading;

/// How the startup selection judges whether the best candidate is recent
/// enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessCheck {
    /// Reject when `now - captured_at_ms > max_age_ms`.
    #[default]
    Age,
    /// Reject when the raw capture timestamp is below `max_age_ms`. Any
    /// realistic epoch timestamp passes, so this effectively disables the
    /// freshness check.
    LiteralTimestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
    pub max_age_ms: i64,
    pub min_accuracy: f32,
    pub freshness: FreshnessCheck,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            max_age_ms: 5_000,
            min_accuracy: 3.0,
            freshness: FreshnessCheck::Age,
        }
    }
}

/// Last-known reading of one provider, captured once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSnapshot {
    pub provider: String,
    pub reading: Option<LocationReading>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep,
    Replace,
}

/// Pick the most accurate last-known reading, or nothing when it is too
/// inaccurate or too old.
///
/// Ties on accuracy keep the first snapshot seen.
pub fn select_best(
    snapshots: &[ProviderSnapshot],
    now_ms: i64,
    policy: &SelectionPolicy,
) -> Option<LocationReading> {
    let mut best: Option<(&str, LocationReading)> = None;
    let mut best_accuracy = f32::MAX;

    for snapshot in snapshots {
        if let Some(reading) = snapshot.reading {
            if reading.accuracy < best_accuracy {
                best_accuracy = reading.accuracy;
                best = Some((snapshot.provider.as_str(), reading));
            }
        }
    }

    let (provider, reading) = best?;

    if reading.accuracy > policy.min_accuracy {
        debug!(
            "[SELECT] Best startup reading from {} rejected: accuracy {} worse than {}",
            provider, reading.accuracy, policy.min_accuracy
        );
        return None;
    }

    let stale = match policy.freshness {
        FreshnessCheck::Age => reading.age_ms(now_ms) > policy.max_age_ms,
        FreshnessCheck::LiteralTimestamp => reading.captured_at_ms < policy.max_age_ms,
    };
    if stale {
        debug!(
            "[SELECT] Best startup reading from {} rejected: age {}ms over {}ms ({:?})",
            provider,
            reading.age_ms(now_ms),
            policy.max_age_ms,
            policy.freshness
        );
        return None;
    }

    Some(reading)
}

/// Decide whether `incoming` should replace the `held` reading.
///
/// A strictly fresher reading only wins when it reports exactly the same
/// coordinates as the held one. A fresher fix at a different position is
/// discarded.
pub fn on_new_reading(
    held: Option<&LocationReading>,
    incoming: &LocationReading,
    now_ms: i64,
) -> Decision {
    let Some(held) = held else {
        return Decision::Replace;
    };

    let incoming_age = incoming.age_ms(now_ms);
    let held_age = held.age_ms(now_ms);

    if incoming_age > held_age {
        Decision::Keep
    } else if incoming_age < held_age && incoming.same_position(held) {
        Decision::Replace
    } else {
        Decision::Keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn reading(lat: f64, lng: f64, accuracy: f32, age_ms: i64) -> LocationReading {
        LocationReading::new(lat, lng, 0.0, accuracy, NOW - age_ms)
    }

    fn snapshot(provider: &str, reading: Option<LocationReading>) -> ProviderSnapshot {
        ProviderSnapshot {
            provider: provider.to_string(),
            reading,
        }
    }

    fn policy(max_age_ms: i64, min_accuracy: f32, freshness: FreshnessCheck) -> SelectionPolicy {
        SelectionPolicy {
            max_age_ms,
            min_accuracy,
            freshness,
        }
    }

    #[test]
    fn select_best_picks_lowest_accuracy() {
        let snapshots = vec![
            snapshot("network", Some(reading(1.0, 1.0, 10.0, 100))),
            snapshot("gps", Some(reading(2.0, 2.0, 3.0, 100))),
            snapshot("passive", Some(reading(3.0, 3.0, 7.0, 100))),
        ];

        let best = select_best(&snapshots, NOW, &policy(5_000, 20.0, FreshnessCheck::Age));
        assert_eq!(best, Some(reading(2.0, 2.0, 3.0, 100)));
    }

    #[test]
    fn select_best_rejects_when_all_too_inaccurate() {
        let snapshots = vec![
            snapshot("network", Some(reading(1.0, 1.0, 50.0, 0))),
            snapshot("gps", Some(reading(2.0, 2.0, 30.0, 0))),
        ];

        let best = select_best(&snapshots, NOW, &policy(5_000, 20.0, FreshnessCheck::Age));
        assert_eq!(best, None);
    }

    #[test]
    fn select_best_skips_absent_providers() {
        let snapshots = vec![
            snapshot("network", None),
            snapshot("gps", Some(reading(2.0, 2.0, 3.0, 0))),
        ];

        let best = select_best(&snapshots, NOW, &SelectionPolicy::default());
        assert_eq!(best, Some(reading(2.0, 2.0, 3.0, 0)));
        assert_eq!(
            select_best(&[snapshot("gps", None)], NOW, &SelectionPolicy::default()),
            None
        );
        assert_eq!(select_best(&[], NOW, &SelectionPolicy::default()), None);
    }

    #[test]
    fn select_best_ties_keep_first() {
        let snapshots = vec![
            snapshot("network", Some(reading(1.0, 1.0, 3.0, 0))),
            snapshot("gps", Some(reading(2.0, 2.0, 3.0, 0))),
        ];

        let best = select_best(&snapshots, NOW, &SelectionPolicy::default());
        assert_eq!(best, Some(reading(1.0, 1.0, 3.0, 0)));
    }

    #[test]
    fn age_check_rejects_old_best_candidate() {
        let snapshots = vec![
            snapshot("gps", Some(reading(2.0, 2.0, 1.0, 60_000))),
            snapshot("network", Some(reading(1.0, 1.0, 2.0, 0))),
        ];

        // The most accurate reading is stale, and only the winner is checked.
        let best = select_best(&snapshots, NOW, &policy(5_000, 3.0, FreshnessCheck::Age));
        assert_eq!(best, None);
    }

    #[test]
    fn age_check_accepts_boundary() {
        let snapshots = vec![snapshot("gps", Some(reading(2.0, 2.0, 1.0, 5_000)))];
        let best = select_best(&snapshots, NOW, &policy(5_000, 3.0, FreshnessCheck::Age));
        assert!(best.is_some());
    }

    #[test]
    fn literal_timestamp_check_accepts_any_recent_epoch() {
        let snapshots = vec![snapshot("gps", Some(reading(2.0, 2.0, 1.0, 60_000)))];
        let best = select_best(
            &snapshots,
            NOW,
            &policy(5_000, 3.0, FreshnessCheck::LiteralTimestamp),
        );
        assert_eq!(best, Some(reading(2.0, 2.0, 1.0, 60_000)));
    }

    #[test]
    fn literal_timestamp_check_rejects_tiny_timestamps() {
        let early = LocationReading::new(2.0, 2.0, 0.0, 1.0, 4_999);
        let snapshots = vec![snapshot("gps", Some(early))];
        let best = select_best(
            &snapshots,
            NOW,
            &policy(5_000, 3.0, FreshnessCheck::LiteralTimestamp),
        );
        assert_eq!(best, None);
    }

    #[test]
    fn nothing_held_always_replaces() {
        let incoming = reading(9.0, 9.0, 100.0, 1_000_000);
        assert_eq!(on_new_reading(None, &incoming, NOW), Decision::Replace);
    }

    #[test]
    fn fresher_same_position_replaces() {
        let held = reading(1.0, 1.0, 5.0, 10_000);
        let incoming = reading(1.0, 1.0, 5.0, 5_000);
        assert_eq!(on_new_reading(Some(&held), &incoming, NOW), Decision::Replace);
    }

    #[test]
    fn fresher_different_position_keeps() {
        let held = reading(1.0, 1.0, 5.0, 10_000);
        let incoming = reading(2.0, 2.0, 5.0, 5_000);
        assert_eq!(on_new_reading(Some(&held), &incoming, NOW), Decision::Keep);
    }

    #[test]
    fn staler_reading_keeps() {
        let held = reading(1.0, 1.0, 5.0, 5_000);
        let incoming = reading(1.0, 1.0, 1.0, 10_000);
        assert_eq!(on_new_reading(Some(&held), &incoming, NOW), Decision::Keep);
    }

    #[test]
    fn equal_age_keeps() {
        let held = reading(1.0, 1.0, 5.0, 5_000);
        let incoming = reading(1.0, 1.0, 1.0, 5_000);
        assert_eq!(on_new_reading(Some(&held), &incoming, NOW), Decision::Keep);
    }
}
