//! Device registry
//!
//! Owns every live pulse device, keyed by its stable id. Devices enter and
//! leave only through [`DeviceRegistry::add`], [`DeviceRegistry::remove`] and
//! [`DeviceRegistry::unload`]; removal always tears the controller down.

pub mod identity;

use crate::config::PulseSettings;
use crate::notify::NotificationSink;
use crate::pulse::{DeviceDescription, PulseController};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub use identity::{assign_identities, legacy_hash, random_id, IdSource, IdentityAssignment};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown device '{0}'")]
    UnknownDevice(String),

    #[error("device id '{0}' is already registered")]
    DuplicateId(String),
}

/// A configured device and its running controller
#[derive(Debug)]
pub struct DeviceRecord {
    pub settings: PulseSettings,
    pub controller: PulseController,
}

/// Arena of live devices
pub struct DeviceRegistry {
    devices: BTreeMap<String, DeviceRecord>,
    sink: Arc<dyn NotificationSink>,
}

impl DeviceRegistry {
    /// Create an empty registry whose controllers report to `sink`
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            devices: BTreeMap::new(),
            sink,
        }
    }

    /// Instantiate a controller for `settings` and register it
    pub fn add(&mut self, settings: PulseSettings) -> Result<&DeviceRecord, RegistryError> {
        if self.devices.contains_key(&settings.id) {
            return Err(RegistryError::DuplicateId(settings.id));
        }

        let id = settings.id.clone();
        let controller = PulseController::new(settings.clone(), self.sink.clone());
        info!(device = %id, name = %settings.name, "Pulse device added");

        let record = self
            .devices
            .entry(id)
            .or_insert(DeviceRecord { settings, controller });
        Ok(&*record)
    }

    /// Tear down and unregister a device
    pub fn remove(&mut self, id: &str) -> Result<DeviceRecord, RegistryError> {
        let record = self
            .devices
            .remove(id)
            .ok_or_else(|| RegistryError::UnknownDevice(id.to_string()))?;

        record.controller.shutdown();
        info!(device = %id, "Pulse device removed");
        Ok(record)
    }

    /// Tear down every device
    pub fn unload(&mut self) {
        let count = self.devices.len();
        for record in self.devices.values() {
            record.controller.shutdown();
        }
        self.devices.clear();
        info!("Unloaded {} pulse device(s)", count);
    }

    pub fn get(&self, id: &str) -> Option<&DeviceRecord> {
        self.devices.get(id)
    }

    /// Look a device up by id, or by name when exactly one device has it
    pub fn resolve(&self, key: &str) -> Option<&DeviceRecord> {
        if let Some(record) = self.devices.get(key) {
            return Some(record);
        }

        let mut by_name = self.devices.values().filter(|r| r.settings.name == key);
        match (by_name.next(), by_name.next()) {
            (Some(record), None) => Some(record),
            _ => None,
        }
    }

    /// Actuation entry point: request a value on one device
    pub fn set_value(&self, id: &str, value: bool) -> Result<bool, RegistryError> {
        self.get(id)
            .map(|record| record.controller.request_value(value))
            .ok_or_else(|| RegistryError::UnknownDevice(id.to_string()))
    }

    pub fn value(&self, id: &str) -> Result<bool, RegistryError> {
        self.get(id)
            .map(|record| record.controller.value())
            .ok_or_else(|| RegistryError::UnknownDevice(id.to_string()))
    }

    /// Registered ids in sorted order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn describe_all(&self) -> Vec<DeviceDescription> {
        self.devices
            .values()
            .map(|record| record.controller.describe())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        for record in self.devices.values() {
            record.controller.shutdown();
        }
    }
}
