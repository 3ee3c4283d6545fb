//! Pulse adapter
//!
//! Drives "pulse" actuators: on/off switches that fall back to their rest
//! value a fixed time after being triggered, with stable device identities
//! that stay compatible with the older name-derived ids.

pub mod adapter;
pub mod cli;
pub mod config;
pub mod notify;
pub mod pulse;
pub mod registry;

pub use adapter::{PulseAdapter, StartupReport};
pub use config::{AdapterConfig, PulseConfig, PulseSettings};
pub use notify::{Notification, NotificationSink};
pub use pulse::{PulseController, PulseEvent};
pub use registry::DeviceRegistry;
