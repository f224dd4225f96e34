use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{resolve_target_url, SendInterval};
use crate::location::{on_new_reading, Decision, LocationReading};
use crate::util::FALLBACK_DEVICE_ID;

/// Parameters supplied when the reporter is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSettings {
    pub interval: SendInterval,
    pub target_url: String,
    pub device_id: String,
}

impl ReportSettings {
    /// Builds settings, applying the default URL and device id when the
    /// supplied values are unusable.
    pub fn new(interval: SendInterval, target_url: Option<&str>, device_id: &str) -> Self {
        let device_id = if device_id.is_empty() {
            FALLBACK_DEVICE_ID
        } else {
            device_id
        };
        Self {
            interval,
            target_url: resolve_target_url(target_url),
            device_id: device_id.to_string(),
        }
    }
}

/// `current` and `pending` observed under one lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSnapshot {
    pub current: Option<LocationReading>,
    pub pending: bool,
}

/// The best known reading and whether it still has to be sent.
///
/// `pending` is only ever set together with `current`, so a pending state
/// always has a reading to send.
#[derive(Debug)]
pub struct ReportingState {
    current: Option<LocationReading>,
    pending: bool,
    settings: ReportSettings,
}

pub type SharedState = Arc<Mutex<ReportingState>>;

impl ReportingState {
    pub fn new(settings: ReportSettings, seed: Option<LocationReading>) -> Self {
        Self {
            pending: seed.is_some(),
            current: seed,
            settings,
        }
    }

    pub fn shared(settings: ReportSettings, seed: Option<LocationReading>) -> SharedState {
        Arc::new(Mutex::new(Self::new(settings, seed)))
    }

    /// Arbitrate `incoming` against the held reading and keep the winner.
    pub fn offer(&mut self, incoming: LocationReading, now_ms: i64) -> Decision {
        let decision = on_new_reading(self.current.as_ref(), &incoming, now_ms);
        if decision == Decision::Replace {
            self.current = Some(incoming);
            self.pending = true;
        }
        decision
    }

    /// Clear the pending flag, returning the reading that was due.
    pub fn take_pending(&mut self) -> Option<LocationReading> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        self.current
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            current: self.current,
            pending: self.pending,
        }
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    pub fn describe_current(&self) -> String {
        match &self.current {
            Some(reading) => reading.describe(&self.settings.device_id),
            None => "unknown location".to_string(),
        }
    }
}

/// The guarded data is plain values that every writer leaves consistent, so
/// a poisoned lock is still safe to use.
pub fn lock_state(state: &Mutex<ReportingState>) -> MutexGuard<'_, ReportingState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
