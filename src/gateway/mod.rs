pub mod simulated;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::location::LocationReading;

pub use simulated::SimulatedGateway;

/// Callback invoked for every live reading. May be called from any thread,
/// including from several threads at once.
pub type ReadingCallback = Arc<dyn Fn(LocationReading) + Send + Sync>;

/// Default minimum time between live updates requested from providers.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(5_000);

/// Default minimum movement in meters between live updates.
pub const DEFAULT_MIN_DISTANCE_M: f32 = 3.0;

/// Source of location readings, usually backed by the platform.
pub trait ProviderGateway: Send + Sync {
    /// Names of every provider the platform knows about.
    fn list_providers(&self) -> BTreeSet<String>;

    /// Last reading cached by `provider`, without waiting for a new fix.
    fn last_known_reading(&self, provider: &str) -> Option<LocationReading>;

    /// Start delivering live readings to `callback`.
    ///
    /// Providers should not deliver more often than `min_interval` or for
    /// movements smaller than `min_distance_m`.
    fn subscribe(
        &self,
        min_interval: Duration,
        min_distance_m: f32,
        callback: ReadingCallback,
    ) -> Result<()>;

    /// Stop live delivery. Safe to call without an active subscription.
    fn unsubscribe(&self);
}
