//! Stable device identity assignment
//!
//! Devices used to be identified by a digest of their display name. That
//! scheme is kept for every device that does not have a persisted id yet, so
//! previously known devices keep their identity. Once an id has been
//! persisted it is never recomputed, which means renaming a device no longer
//! changes its identity.
//!
//! Two devices that would get the same name-derived id (same name, or a name
//! whose digest equals an id already in use) cannot both have it: the later
//! one gets a random id instead.

use crate::config::PulseConfig;
use rand::RngCore;
use sha1::{Digest, Sha1};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Number of random bytes in a fallback id (same length as a SHA-1 digest)
pub const RANDOM_ID_BYTES: usize = 20;

/// Where an assigned id came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    /// Digest of the device name
    LegacyHash,
    /// Random fallback after a collision or an unusable name
    Random,
}

/// One id handed out during an assignment run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedId {
    /// Position of the config in the input list
    pub index: usize,
    pub id: String,
    pub source: IdSource,
}

/// Result of [`assign_identities`]
#[derive(Debug, Clone)]
pub struct IdentityAssignment {
    /// Every input config, in input order, each with an id
    pub configs: Vec<PulseConfig>,
    /// Ids assigned by this run (empty when nothing changed)
    pub assigned: Vec<AssignedId>,
}

impl IdentityAssignment {
    /// Whether the configs differ from the input and should be persisted
    pub fn needs_persist(&self) -> bool {
        !self.assigned.is_empty()
    }
}

/// Name-derived id of the historical scheme
///
/// Lowercase hex SHA-1 of the UTF-8 name. Names that are empty or only
/// whitespace have no usable digest.
pub fn legacy_hash(name: &str) -> Option<String> {
    if name.trim().is_empty() {
        return None;
    }
    Some(hex::encode(Sha1::digest(name.as_bytes())))
}

/// Fresh random id from the thread-local CSPRNG
pub fn random_id() -> String {
    random_id_with(&mut rand::thread_rng())
}

fn random_id_with<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; RANDOM_ID_BYTES];
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Give every config without a persisted id a stable unique one
///
/// Configs that already carry an id are returned untouched. Running this on
/// its own output is a no-op.
pub fn assign_identities(configs: Vec<PulseConfig>) -> IdentityAssignment {
    assign_identities_with(configs, &mut rand::thread_rng())
}

/// [`assign_identities`] with a caller supplied random source
pub fn assign_identities_with<R: RngCore + ?Sized>(
    mut configs: Vec<PulseConfig>,
    rng: &mut R,
) -> IdentityAssignment {
    let mut in_use: HashSet<String> = configs
        .iter()
        .filter_map(|c| c.assigned_id().map(str::to_string))
        .collect();

    let mut assigned = Vec::new();

    for (index, config) in configs.iter_mut().enumerate() {
        if config.assigned_id().is_some() {
            continue;
        }

        let (id, source) = match legacy_hash(&config.name) {
            Some(candidate) if !in_use.contains(&candidate) => (candidate, IdSource::LegacyHash),
            Some(_) => {
                warn!(
                    name = %config.name,
                    "Name-derived id already in use, assigning a random id"
                );
                (unused_random_id(&in_use, rng), IdSource::Random)
            }
            None => {
                warn!(index, "Pulse has no usable name, assigning a random id");
                (unused_random_id(&in_use, rng), IdSource::Random)
            }
        };

        debug!(name = %config.name, id = %id, ?source, "Assigned pulse id");
        in_use.insert(id.clone());
        config.id = Some(id.clone());
        assigned.push(AssignedId { index, id, source });
    }

    if !assigned.is_empty() {
        info!("Assigned ids to {} pulse device(s)", assigned.len());
    }

    IdentityAssignment { configs, assigned }
}

fn unused_random_id<R: RngCore + ?Sized>(in_use: &HashSet<String>, rng: &mut R) -> String {
    loop {
        let id = random_id_with(rng);
        if !in_use.contains(&id) {
            return id;
        }
    }
}
