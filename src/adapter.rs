//! Pulse adapter - startup and teardown of all pulse devices
//!
//! Startup order matters: ids are assigned and persisted before any
//! controller exists, so two startups can never hand out different ids for
//! the same record.

use crate::config::{AdapterConfig, ConfigError, ConfigStore};
use crate::notify::NotificationSink;
use crate::registry::{assign_identities, DeviceRegistry, RegistryError};
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Why a configured pulse was not started
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Config(ConfigError),
    Registry(RegistryError),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Config(e) => write!(f, "{}", e),
            Rejection::Registry(e) => write!(f, "{}", e),
        }
    }
}

/// What happened during [`PulseAdapter::start`]
#[derive(Debug, Default)]
pub struct StartupReport {
    /// Ids of the devices now running
    pub started: Vec<String>,
    /// Pulses left out, by name
    pub rejected: Vec<(String, Rejection)>,
    /// Number of ids assigned during this startup
    pub assigned: usize,
    /// The seed document was copied into the store
    pub migrated: bool,
    /// Error from writing the updated document, if any
    pub persist_error: Option<String>,
}

/// Owner of the config document and of every running pulse device
pub struct PulseAdapter {
    config: AdapterConfig,
    registry: DeviceRegistry,
}

impl PulseAdapter {
    /// Load, identify, persist and instantiate every configured pulse
    ///
    /// `seed` is used when the store holds no document yet. Only a failure
    /// to read the store is fatal; everything else ends up in the report.
    pub async fn start(
        store: Arc<dyn ConfigStore>,
        seed: Option<AdapterConfig>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<(Self, StartupReport)> {
        let mut report = StartupReport::default();

        let loaded = store.load_config().await?;
        let mut config = match (loaded, seed) {
            (Some(config), _) => config,
            (None, Some(seed)) => {
                info!("No stored pulse config in {}, migrating seed", store.describe());
                report.migrated = true;
                seed
            }
            (None, None) => {
                warn!("No pulse config found in {}", store.describe());
                AdapterConfig::default()
            }
        };

        let assignment = assign_identities(std::mem::take(&mut config.pulses));
        report.assigned = assignment.assigned.len();
        let dirty = assignment.needs_persist() || report.migrated;
        config.pulses = assignment.configs;

        if dirty {
            match store.save_config(&config).await {
                Ok(()) => info!("Pulse config saved to {}", store.describe()),
                Err(e) => {
                    warn!(
                        "Failed to persist pulse config to {}: {:#}, continuing with in-memory ids",
                        store.describe(),
                        e
                    );
                    report.persist_error = Some(format!("{:#}", e));
                }
            }
        }

        let mut registry = DeviceRegistry::new(sink);
        for pulse in &config.pulses {
            let settings = match pulse.settings() {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Skipping pulse: {}", e);
                    report.rejected.push((pulse.name.clone(), Rejection::Config(e)));
                    continue;
                }
            };

            match registry.add(settings) {
                Ok(record) => report.started.push(record.settings.id.clone()),
                Err(e) => {
                    warn!("Skipping pulse '{}': {}", pulse.name, e);
                    report.rejected.push((pulse.name.clone(), Rejection::Registry(e)));
                }
            }
        }

        info!(
            "Pulse adapter started: {} running, {} rejected",
            report.started.len(),
            report.rejected.len()
        );

        Ok((Self { config, registry }, report))
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Request a value on a device and return the resulting value
    pub fn set_value(&self, id: &str, value: bool) -> Result<bool, RegistryError> {
        self.registry.set_value(id, value)
    }

    /// Tear down every device
    pub fn unload(&mut self) {
        self.registry.unload();
    }
}
