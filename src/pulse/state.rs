//! Pulse value state machine
//!
//! Pure decision logic with no timers attached: each request yields a
//! [`Step`] telling the owner whether the value changed and what to do with
//! the single reversion timer.
//!
//! ```text
//!              request(on)                 timer fired / request(rest)
//!  RESTING ────────────────────► ACTIVE ─────────────────────────────► RESTING
//!                                 │   ▲
//!                                 └───┘ request(on), extendOnRetrigger
//!                                       (re-arm, no notification)
//! ```

use super::PulseEvent;

/// What the owner must do with the reversion timer after a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Leave any pending timer untouched
    Keep,
    /// Cancel any pending timer and schedule a fresh full-duration one
    Arm,
    /// Cancel any pending timer
    Cancel,
}

/// Outcome of a single value request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Resulting value
    pub value: bool,
    /// Whether the value actually changed (notifications are due)
    pub changed: bool,
    pub timer: TimerAction,
}

/// Value state of one pulse device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseState {
    current: bool,
    on_value: bool,
    extend_on_retrigger: bool,
}

impl PulseState {
    /// Create a resting state. With `invert` set the rest value is `true`.
    pub fn new(invert: bool, extend_on_retrigger: bool) -> Self {
        let on_value = !invert;
        Self {
            current: !on_value,
            on_value,
            extend_on_retrigger,
        }
    }

    pub fn value(&self) -> bool {
        self.current
    }

    pub fn on_value(&self) -> bool {
        self.on_value
    }

    pub fn rest_value(&self) -> bool {
        !self.on_value
    }

    pub fn is_active(&self) -> bool {
        self.current == self.on_value
    }

    /// Event describing a transition into `value`
    pub fn event_for(&self, value: bool) -> PulseEvent {
        if value == self.on_value {
            PulseEvent::TurnedOn
        } else {
            PulseEvent::TurnedOff
        }
    }

    /// Apply an externally requested value
    pub fn request(&mut self, requested: bool) -> Step {
        if requested == self.current {
            let timer = if requested == self.on_value && self.extend_on_retrigger {
                TimerAction::Arm
            } else {
                TimerAction::Keep
            };
            return Step {
                value: self.current,
                changed: false,
                timer,
            };
        }

        self.current = requested;
        let timer = if requested == self.on_value {
            TimerAction::Arm
        } else {
            TimerAction::Cancel
        };

        Step {
            value: requested,
            changed: true,
            timer,
        }
    }

    /// Forced reversion when the timer fires
    ///
    /// Returns `true` if the value changed. Bypasses retrigger handling.
    pub fn revert(&mut self) -> bool {
        if self.current == self.on_value {
            self.current = !self.on_value;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_rest_value_follows_invert() {
        let normal = PulseState::new(false, false);
        assert!(!normal.value());
        assert!(normal.on_value());
        assert!(!normal.is_active());

        let inverted = PulseState::new(true, false);
        assert!(inverted.value());
        assert!(!inverted.on_value());
        assert!(!inverted.is_active());
    }

    #[test]
    fn test_rest_request_is_noop() {
        let mut state = PulseState::new(false, true);
        for _ in 0..3 {
            let step = state.request(false);
            assert_eq!(
                step,
                Step {
                    value: false,
                    changed: false,
                    timer: TimerAction::Keep
                }
            );
        }
    }

    #[test]
    fn test_trigger_arms_timer() {
        let mut state = PulseState::new(false, false);
        let step = state.request(true);
        assert!(step.changed);
        assert!(step.value);
        assert_eq!(step.timer, TimerAction::Arm);
        assert!(state.is_active());
        assert_eq!(state.event_for(step.value), PulseEvent::TurnedOn);
    }

    #[test]
    fn test_retrigger_depends_on_extend_flag() {
        let mut extending = PulseState::new(false, true);
        extending.request(true);
        let step = extending.request(true);
        assert!(!step.changed);
        assert_eq!(step.timer, TimerAction::Arm);

        let mut fixed = PulseState::new(false, false);
        fixed.request(true);
        let step = fixed.request(true);
        assert!(!step.changed);
        assert_eq!(step.timer, TimerAction::Keep);
    }

    #[test]
    fn test_forced_rest_cancels() {
        let mut state = PulseState::new(false, true);
        state.request(true);
        let step = state.request(false);
        assert!(step.changed);
        assert_eq!(step.timer, TimerAction::Cancel);
        assert_eq!(state.event_for(step.value), PulseEvent::TurnedOff);
    }

    #[test]
    fn test_inverted_device_triggers_on_false() {
        let mut state = PulseState::new(true, false);

        // true is the rest value for an inverted device
        assert_eq!(state.request(true).timer, TimerAction::Keep);

        let step = state.request(false);
        assert!(step.changed);
        assert_eq!(step.timer, TimerAction::Arm);
        assert_eq!(state.event_for(false), PulseEvent::TurnedOn);

        assert!(state.revert());
        assert!(state.value());
        assert_eq!(state.event_for(true), PulseEvent::TurnedOff);
    }

    #[test]
    fn test_revert_only_from_active() {
        let mut state = PulseState::new(false, false);
        assert!(!state.revert());

        state.request(true);
        assert!(state.revert());
        assert!(!state.value());
        assert!(!state.revert());
    }
}
