// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Radio event notification system.
//!
//! Observers register for one or more notification categories and receive
//! typed callbacks. A listener that panics is logged and skipped; delivery
//! to the remaining listeners continues.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::warn;

use crate::radio::freq::Freq;
use crate::request::ScanDirection;

use super::machine::OperatingState;

/// Unique identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Notification categories observers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListenerCategory {
    StateChanged,
    Started,
    Error,
    ScanResult,
    ForcedPause,
    ForcedReset,
    RdsData,
    SignalStrength,
    Stereo,
    ExtraCommand,
    AutomaticSwitch,
}

impl ListenerCategory {
    pub const ALL: [ListenerCategory; 11] = [
        Self::StateChanged,
        Self::Started,
        Self::Error,
        Self::ScanResult,
        Self::ForcedPause,
        Self::ForcedReset,
        Self::RdsData,
        Self::SignalStrength,
        Self::Stereo,
        Self::ExtraCommand,
        Self::AutomaticSwitch,
    ];
}

/// Event published by the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum Notification {
    StateChanged {
        old: OperatingState,
        new: OperatingState,
    },
    Started,
    Error,
    ScanResult {
        frequency: Option<Freq>,
        signal: Option<u8>,
        direction: ScanDirection,
        aborted: bool,
    },
    FullScanResult {
        frequencies: Vec<Freq>,
        signals: Vec<u8>,
        aborted: bool,
    },
    ForcedPause,
    ForcedReset {
        reason: u32,
    },
    RdsData {
        data: Vec<u8>,
    },
    SignalStrengthChanged(u8),
    StereoChanged(bool),
    ExtraCommand {
        command: String,
        args: Vec<String>,
    },
    AutomaticSwitch {
        frequency: Freq,
        reason: u32,
    },
}

impl Notification {
    pub fn category(&self) -> ListenerCategory {
        match self {
            Self::StateChanged { .. } => ListenerCategory::StateChanged,
            Self::Started => ListenerCategory::Started,
            Self::Error => ListenerCategory::Error,
            Self::ScanResult { .. } | Self::FullScanResult { .. } => ListenerCategory::ScanResult,
            Self::ForcedPause => ListenerCategory::ForcedPause,
            Self::ForcedReset { .. } => ListenerCategory::ForcedReset,
            Self::RdsData { .. } => ListenerCategory::RdsData,
            Self::SignalStrengthChanged(_) => ListenerCategory::SignalStrength,
            Self::StereoChanged(_) => ListenerCategory::Stereo,
            Self::ExtraCommand { .. } => ListenerCategory::ExtraCommand,
            Self::AutomaticSwitch { .. } => ListenerCategory::AutomaticSwitch,
        }
    }
}

/// Trait for components that want to receive radio events.
///
/// All methods have default no-op implementations, so listeners can
/// selectively override only the events they care about.
pub trait RadioListener: Send + Sync {
    /// Called when the reported operating state changes.
    fn on_state_changed(&self, _old: OperatingState, _new: OperatingState) {}

    /// Called once a start sequence has completed.
    fn on_started(&self) {}

    /// Called when the radio enters the error state.
    fn on_error(&self) {}

    /// Called when a single-station scan ends.
    fn on_scan_result(
        &self,
        _frequency: Option<Freq>,
        _signal: Option<u8>,
        _direction: ScanDirection,
        _aborted: bool,
    ) {
    }

    /// Called when a full scan ends. Both slices are in visiting order.
    fn on_full_scan_result(&self, _frequencies: &[Freq], _signals: &[u8], _aborted: bool) {}

    fn on_forced_pause(&self) {}

    /// Called when the radio returns to idle.
    fn on_forced_reset(&self, _reason: u32) {}

    fn on_rds_data(&self, _data: &[u8]) {}

    fn on_signal_strength_changed(&self, _value: u8) {}

    fn on_stereo_changed(&self, _stereo: bool) {}

    fn on_extra_command(&self, _command: &str, _args: &[String]) {}

    fn on_automatic_switch(&self, _frequency: Freq, _reason: u32) {}
}

struct Registration {
    id: ListenerId,
    categories: Vec<ListenerCategory>,
    listener: Arc<dyn RadioListener>,
}

/// Manages registered listeners and dispatches events.
///
/// Registration may happen from any thread while the tuner task emits.
#[derive(Default)]
pub struct RadioEventEmitter {
    listeners: RwLock<Vec<Registration>>,
}

impl RadioEventEmitter {
    /// Create a new event emitter with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for the given categories.
    /// Returns an ID that can be used to unregister the listener.
    pub fn register(
        &self,
        listener: Arc<dyn RadioListener>,
        categories: &[ListenerCategory],
    ) -> ListenerId {
        let id = ListenerId::new();
        let registration = Registration {
            id,
            categories: categories.to_vec(),
            listener,
        };
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(registration),
            Err(poisoned) => poisoned.into_inner().push(registration),
        }
        id
    }

    /// Register a listener for every category.
    pub fn register_all(&self, listener: Arc<dyn RadioListener>) -> ListenerId {
        self.register(listener, &ListenerCategory::ALL)
    }

    /// Unregister a listener by its ID.
    pub fn unregister(&self, id: ListenerId) {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.retain(|r| r.id != id),
            Err(poisoned) => poisoned.into_inner().retain(|r| r.id != id),
        }
    }

    /// Get the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        match self.listeners.read() {
            Ok(listeners) => listeners.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Deliver `notification` to every listener subscribed to its category.
    pub fn emit(&self, notification: &Notification) {
        let category = notification.category();
        // Deliver outside the lock so listeners may (un)register.
        let targets: Vec<(ListenerId, Arc<dyn RadioListener>)> = {
            let guard = match self.listeners.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard
                .iter()
                .filter(|r| r.categories.contains(&category))
                .map(|r| (r.id, r.listener.clone()))
                .collect()
        };

        for (id, listener) in targets {
            let delivered = catch_unwind(AssertUnwindSafe(|| {
                deliver(listener.as_ref(), notification)
            }));
            if delivered.is_err() {
                warn!("Listener {:?} failed on {:?} event", id, category);
            }
        }
    }
}

fn deliver(listener: &dyn RadioListener, notification: &Notification) {
    match notification {
        Notification::StateChanged { old, new } => listener.on_state_changed(*old, *new),
        Notification::Started => listener.on_started(),
        Notification::Error => listener.on_error(),
        Notification::ScanResult {
            frequency,
            signal,
            direction,
            aborted,
        } => listener.on_scan_result(*frequency, *signal, *direction, *aborted),
        Notification::FullScanResult {
            frequencies,
            signals,
            aborted,
        } => listener.on_full_scan_result(frequencies, signals, *aborted),
        Notification::ForcedPause => listener.on_forced_pause(),
        Notification::ForcedReset { reason } => listener.on_forced_reset(*reason),
        Notification::RdsData { data } => listener.on_rds_data(data),
        Notification::SignalStrengthChanged(value) => listener.on_signal_strength_changed(*value),
        Notification::StereoChanged(stereo) => listener.on_stereo_changed(*stereo),
        Notification::ExtraCommand { command, args } => listener.on_extra_command(command, args),
        Notification::AutomaticSwitch { frequency, reason } => {
            listener.on_automatic_switch(*frequency, *reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    struct TestListener {
        started: AtomicBool,
        state_changes: AtomicUsize,
    }

    impl TestListener {
        fn new() -> Self {
            Self {
                started: AtomicBool::new(false),
                state_changes: AtomicUsize::new(0),
            }
        }
    }

    impl RadioListener for TestListener {
        fn on_started(&self) {
            self.started.store(true, Ordering::Relaxed);
        }

        fn on_state_changed(&self, _old: OperatingState, _new: OperatingState) {
            self.state_changes.fetch_add(1, Ordering::Relaxed);
        }
    }

    struct PanickingListener;

    impl RadioListener for PanickingListener {
        fn on_started(&self) {
            panic!("listener failure");
        }
    }

    #[test]
    fn test_register_and_notify() {
        let emitter = RadioEventEmitter::new();
        let listener = Arc::new(TestListener::new());
        let id = emitter.register_all(listener.clone());

        assert_eq!(emitter.listener_count(), 1);

        emitter.emit(&Notification::Started);
        assert!(listener.started.load(Ordering::Relaxed));
        assert_eq!(listener.state_changes.load(Ordering::Relaxed), 0);

        emitter.emit(&Notification::StateChanged {
            old: OperatingState::Idle,
            new: OperatingState::Started,
        });
        assert_eq!(listener.state_changes.load(Ordering::Relaxed), 1);

        emitter.unregister(id);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn test_categories_filter_delivery() {
        let emitter = RadioEventEmitter::new();
        let listener = Arc::new(TestListener::new());
        emitter.register(listener.clone(), &[ListenerCategory::StateChanged]);

        emitter.emit(&Notification::Started);
        assert!(!listener.started.load(Ordering::Relaxed));
    }

    #[test]
    fn test_panicking_listener_does_not_stop_delivery() {
        let emitter = RadioEventEmitter::new();
        let first = Arc::new(TestListener::new());
        let second = Arc::new(TestListener::new());

        emitter.register_all(first.clone());
        emitter.register_all(Arc::new(PanickingListener));
        emitter.register_all(second.clone());

        emitter.emit(&Notification::Started);

        assert!(first.started.load(Ordering::Relaxed));
        assert!(second.started.load(Ordering::Relaxed));
        assert_eq!(emitter.listener_count(), 3);
    }

    #[test]
    fn test_notification_json() {
        let value = serde_json::to_value(Notification::SignalStrengthChanged(40)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "event": "signal-strength-changed", "data": 40 })
        );

        let value = serde_json::to_value(Notification::Started).unwrap();
        assert_eq!(value, serde_json::json!({ "event": "started" }));
    }

    #[test]
    fn test_full_scan_result_is_a_scan_result() {
        let notification = Notification::FullScanResult {
            frequencies: vec![],
            signals: vec![],
            aborted: false,
        };
        assert_eq!(notification.category(), ListenerCategory::ScanResult);
    }
}
