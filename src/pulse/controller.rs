//! PulseController - one pulse device's value, timer and notifications
//!
//! All state of a device sits behind a single mutex, so a value request and
//! the reversion timer firing never interleave. The timer is a spawned task
//! tagged with a generation number; a fire whose generation no longer matches
//! the pending slot (re-armed, cancelled or torn down in the meantime) is
//! dropped.
//!
//! Must be used from within a Tokio runtime, timers are spawned tasks.

use super::state::{PulseState, TimerAction};
use super::{Capability, DeviceDescription, PulseEvent, ON_PROPERTY};
use crate::config::PulseSettings;
use crate::notify::{Notification, NotificationSink};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Deadline used when `now + duration` does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// The single scheduled reversion of a device
struct PendingTimer {
    generation: u64,
    deadline: Instant,
    task: JoinHandle<()>,
}

struct Inner {
    state: PulseState,
    timer: Option<PendingTimer>,
    /// Incremented every time a timer is armed
    generation: u64,
    torn_down: bool,
}

impl Inner {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.task.abort();
            trace!(generation = timer.generation, "Reversion timer cancelled");
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

struct Shared {
    settings: PulseSettings,
    sink: Arc<dyn NotificationSink>,
    inner: Mutex<Inner>,
}

impl Shared {
    /// Timer callback: forced reversion to the rest value
    fn fire(&self, generation: u64) {
        let mut inner = self.inner.lock();

        if inner.torn_down {
            trace!(device = %self.settings.id, "Timer fired after teardown, ignoring");
            return;
        }
        match &inner.timer {
            Some(timer) if timer.generation == generation => {}
            _ => {
                trace!(device = %self.settings.id, generation, "Stale timer fire, ignoring");
                return;
            }
        }

        // Running inside the timer task itself, so detach instead of abort
        inner.timer = None;

        if inner.state.revert() {
            let value = inner.state.value();
            self.emit(value, inner.state.event_for(value));
        }
    }

    fn emit(&self, value: bool, event: PulseEvent) {
        let device_id = self.settings.id.clone();
        self.sink.notify(Notification::PropertyChanged {
            device_id: device_id.clone(),
            property: ON_PROPERTY,
            value,
        });
        self.sink.notify(Notification::Event { device_id, event });
    }
}

/// Controller for a single pulse device
///
/// Cloning yields another handle to the same device.
#[derive(Clone)]
pub struct PulseController {
    shared: Arc<Shared>,
}

impl PulseController {
    /// Create a resting controller
    pub fn new(settings: PulseSettings, sink: Arc<dyn NotificationSink>) -> Self {
        let state = PulseState::new(settings.invert, settings.extend_on_retrigger);
        debug!(
            device = %settings.id,
            name = %settings.name,
            rest = state.rest_value(),
            duration_ms = settings.duration.as_millis() as u64,
            extend = settings.extend_on_retrigger,
            "Pulse controller created"
        );

        Self {
            shared: Arc::new(Shared {
                settings,
                sink,
                inner: Mutex::new(Inner {
                    state,
                    timer: None,
                    generation: 0,
                    torn_down: false,
                }),
            }),
        }
    }

    /// Request a new value and return the resulting one
    ///
    /// Every effect (value update, timer change, notifications) has happened
    /// by the time this returns. After [`shutdown`](Self::shutdown) requests
    /// are ignored and the last value is returned.
    pub fn request_value(&self, requested: bool) -> bool {
        let mut inner = self.shared.inner.lock();

        if inner.torn_down {
            debug!(device = %self.shared.settings.id, requested, "Request after teardown ignored");
            return inner.state.value();
        }

        let step = inner.state.request(requested);
        match step.timer {
            TimerAction::Keep => {}
            TimerAction::Arm => self.arm(&mut inner),
            TimerAction::Cancel => inner.cancel_timer(),
        }

        if step.changed {
            self.shared.emit(step.value, inner.state.event_for(step.value));
        } else if step.timer == TimerAction::Arm {
            debug!(device = %self.shared.settings.id, "Retrigger extended pulse");
        }

        step.value
    }

    /// Cancel-then-schedule a full-duration reversion
    fn arm(&self, inner: &mut Inner) {
        inner.cancel_timer();
        inner.generation += 1;

        let generation = inner.generation;
        let now = Instant::now();
        let deadline = now
            .checked_add(self.shared.settings.duration)
            .unwrap_or_else(|| {
                warn!(device = %self.shared.settings.id, "Pulse duration out of range, clamping");
                now + FAR_FUTURE
            });
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);

        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(shared) = weak.upgrade() {
                shared.fire(generation);
            }
        });

        trace!(device = %self.shared.settings.id, generation, "Reversion timer armed");
        inner.timer = Some(PendingTimer {
            generation,
            deadline,
            task,
        });
    }

    /// Cancel any pending reversion and stop accepting requests
    pub fn shutdown(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.torn_down {
            return;
        }
        inner.torn_down = true;
        inner.cancel_timer();
        info!(device = %self.shared.settings.id, "Pulse controller torn down");
    }

    pub fn id(&self) -> &str {
        &self.shared.settings.id
    }

    pub fn name(&self) -> &str {
        &self.shared.settings.name
    }

    /// The value that counts as triggered
    pub fn on_value(&self) -> bool {
        !self.shared.settings.invert
    }

    /// Current externally observable value
    pub fn value(&self) -> bool {
        self.shared.inner.lock().state.value()
    }

    pub fn is_active(&self) -> bool {
        self.shared.inner.lock().state.is_active()
    }

    pub fn is_torn_down(&self) -> bool {
        self.shared.inner.lock().torn_down
    }

    /// When the pending reversion is due, if one is scheduled
    pub fn pending_deadline(&self) -> Option<Instant> {
        self.shared.inner.lock().timer.as_ref().map(|t| t.deadline)
    }

    pub fn describe(&self) -> DeviceDescription {
        let capability = Capability::OnOffSwitch;
        let inner = self.shared.inner.lock();
        DeviceDescription {
            id: self.shared.settings.id.clone(),
            name: self.shared.settings.name.clone(),
            capabilities: vec![capability],
            events: capability.events().to_vec(),
            on: inner.state.value(),
            active: inner.state.is_active(),
        }
    }
}

impl std::fmt::Debug for PulseController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseController")
            .field("settings", &self.shared.settings)
            .field("value", &self.value())
            .finish()
    }
}
