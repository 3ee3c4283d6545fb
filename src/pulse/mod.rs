//! Pulse devices: self-reverting on/off switches

pub mod controller;
pub mod state;

use serde::Serialize;

pub use controller::PulseController;
pub use state::{PulseState, Step, TimerAction};

/// Name of the single boolean property a pulse device exposes
pub const ON_PROPERTY: &str = "on";

/// Capabilities a device advertises to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Capability {
    OnOffSwitch,
}

impl Capability {
    /// Events a device with this capability can emit
    pub fn events(&self) -> &'static [PulseEvent] {
        match self {
            Capability::OnOffSwitch => &[PulseEvent::TurnedOn, PulseEvent::TurnedOff],
        }
    }
}

/// Semantic event emitted on every real transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PulseEvent {
    /// The device entered its active value
    TurnedOn,
    /// The device returned to its rest value
    TurnedOff,
}

impl PulseEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            PulseEvent::TurnedOn => "turnedOn",
            PulseEvent::TurnedOff => "turnedOff",
        }
    }
}

impl std::fmt::Display for PulseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of a device suitable for display or export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceDescription {
    pub id: String,
    pub name: String,
    pub capabilities: Vec<Capability>,
    pub events: Vec<PulseEvent>,
    pub on: bool,
    pub active: bool,
}
