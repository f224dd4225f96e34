use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::state::{lock_state, ReportSettings, ReportingState, SharedState, StateSnapshot};
use super::transmitter::Transmit;
use crate::error::ReporterError;
use crate::gateway::{
    ProviderGateway, ReadingCallback, DEFAULT_MIN_DISTANCE_M, DEFAULT_MIN_INTERVAL,
};
use crate::location::{select_best, Decision, LocationReading, ProviderSnapshot, SelectionPolicy};
use crate::util;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReporterStatus {
    Stopped,
    Running,
    Stopping,
}

/// Outcome of the startup selection across all providers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartupSeed {
    Fresh(LocationReading),
    /// No provider had an accurate and recent enough reading. The reporter
    /// runs anyway and waits for live updates.
    NoFreshReading,
}

/// Rate limits requested from the gateway for live updates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubscriptionParams {
    pub min_interval: Duration,
    pub min_distance_m: f32,
}

impl Default for SubscriptionParams {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            min_distance_m: DEFAULT_MIN_DISTANCE_M,
        }
    }
}

struct Session {
    state: SharedState,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

enum Phase {
    Stopped,
    Running(Session),
    Stopping,
}

/// Tracks the best known location and periodically pushes it to a server.
pub struct Reporter<G: ?Sized, T: ?Sized> {
    gateway: Arc<G>,
    transmitter: Arc<T>,
    selection: SelectionPolicy,
    subscription: SubscriptionParams,
    phase: Mutex<Phase>,
}

impl<G, T> Reporter<G, T>
where
    G: ProviderGateway + ?Sized + 'static,
    T: Transmit + ?Sized + 'static,
{
    pub fn new(gateway: Arc<G>, transmitter: Arc<T>) -> Self {
        Self {
            gateway,
            transmitter,
            selection: SelectionPolicy::default(),
            subscription: SubscriptionParams::default(),
            phase: Mutex::new(Phase::Stopped),
        }
    }

    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_subscription(mut self, subscription: SubscriptionParams) -> Self {
        self.subscription = subscription;
        self
    }

    fn lock_phase(&self) -> MutexGuard<'_, Phase> {
        lock_phase(&self.phase)
    }

    pub fn status(&self) -> ReporterStatus {
        match *self.lock_phase() {
            Phase::Stopped => ReporterStatus::Stopped,
            Phase::Running(_) => ReporterStatus::Running,
            Phase::Stopping => ReporterStatus::Stopping,
        }
    }

    /// Current reading and pending flag, or `None` unless running.
    pub fn snapshot(&self) -> Option<StateSnapshot> {
        match &*self.lock_phase() {
            Phase::Running(session) => Some(lock_state(&session.state).snapshot()),
            _ => None,
        }
    }

    /// Seed the state from the providers' last known readings, subscribe to
    /// live updates and launch the send loop.
    ///
    /// Fails with [`ReporterError::NoRuntime`] outside a tokio runtime.
    pub fn start(&self, settings: ReportSettings) -> Result<StartupSeed, ReporterError> {
        let runtime = Handle::try_current().map_err(|_| ReporterError::NoRuntime)?;
        let mut phase = self.lock_phase();
        if !matches!(*phase, Phase::Stopped) {
            warn!("[REPORT] Start requested while already running");
            return Err(ReporterError::AlreadyRunning);
        }

        let providers = self.gateway.list_providers();
        if providers.is_empty() {
            error!("[REPORT] No location providers available");
            return Err(ReporterError::NoLocationService);
        }

        let snapshots: Vec<ProviderSnapshot> = providers
            .into_iter()
            .map(|provider| {
                let reading = self.gateway.last_known_reading(&provider);
                ProviderSnapshot { provider, reading }
            })
            .collect();
        let seed = select_best(&snapshots, util::now_millis(), &self.selection);
        match &seed {
            Some(reading) => info!("[REPORT] Seeded with last known reading {:?}", reading),
            None => info!("[REPORT] No fresh last known reading, waiting for updates"),
        }

        let state = ReportingState::shared(settings.clone(), seed);
        self.gateway
            .subscribe(
                self.subscription.min_interval,
                self.subscription.min_distance_m,
                update_handler(state.clone()),
            )
            .map_err(ReporterError::Subscription)?;

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(report_loop(
            state.clone(),
            self.transmitter.clone(),
            cancel.clone(),
        ));

        info!(
            "[REPORT] Will send location data every {} to {}",
            settings.interval, settings.target_url
        );
        *phase = Phase::Running(Session {
            state,
            cancel,
            handle,
        });

        Ok(match seed {
            Some(reading) => StartupSeed::Fresh(reading),
            None => StartupSeed::NoFreshReading,
        })
    }

    /// Stop the send loop and drop the reporting state. Returns without
    /// waiting out the current interval. Does nothing unless running.
    pub async fn stop(&self) {
        let session = {
            let mut phase = self.lock_phase();
            match std::mem::replace(&mut *phase, Phase::Stopping) {
                Phase::Running(session) => session,
                other => {
                    *phase = other;
                    debug!("[REPORT] Stop requested while not running");
                    return;
                }
            }
        };

        // Leaves the reporter restartable even if this future is dropped
        // before the loop has been joined.
        let _stopped = StoppedOnDrop(&self.phase);

        info!("[REPORT] Stopping reporter...");
        self.gateway.unsubscribe();
        session.cancel.cancel();
        if let Err(e) = session.handle.await {
            error!("[REPORT] Report loop join error: {}", e);
        }

        info!(
            "[REPORT] Reporter stopped, last location {}",
            lock_state(&session.state).describe_current()
        );
    }
}

fn lock_phase(phase: &Mutex<Phase>) -> MutexGuard<'_, Phase> {
    phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct StoppedOnDrop<'a>(&'a Mutex<Phase>);

impl Drop for StoppedOnDrop<'_> {
    fn drop(&mut self) {
        *lock_phase(self.0) = Phase::Stopped;
    }
}

fn update_handler(state: SharedState) -> ReadingCallback {
    Arc::new(move |reading: LocationReading| {
        let decision = lock_state(&state).offer(reading, util::now_millis());
        match decision {
            Decision::Replace => debug!("[REPORT] Accepted reading {:?}", reading),
            Decision::Keep => debug!("[REPORT] Discarded reading {:?}", reading),
        }
    })
}

async fn report_loop<T>(state: SharedState, transmitter: Arc<T>, cancel: CancellationToken)
where
    T: Transmit + ?Sized,
{
    let (interval, device_id, url) = {
        let state = lock_state(&state);
        let settings = state.settings();
        (
            settings.interval.duration(),
            settings.device_id.clone(),
            settings.target_url.clone(),
        )
    };

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let Some(reading) = lock_state(&state).take_pending() else {
            debug!("[REPORT] Nothing new to send");
            continue;
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("[REPORT] Send abandoned on shutdown");
                break;
            }
            result = transmitter.send(&reading, &device_id, &url) => {
                match result {
                    Ok(()) => info!("[REPORT] Sent {}", reading.describe(&device_id)),
                    Err(e) => error!("[REPORT] Failed to send location: {}", e),
                }
            }
        }
    }

    debug!("[REPORT] Report loop finished");
}
