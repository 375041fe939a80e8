// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Accessory identity and reconciliation.
//!
//! The registry maps stable accessory identities (uuids derived from
//! hardware identifiers) to the device's last known whereabouts. On
//! every discovery pass freshly found devices are reconciled against
//! the known records: a match refreshes the cached network address
//! (devices get new leases), a miss creates a record the caller must
//! register with the host exactly once. Registering the same uuid twice
//! is a fatal error in the host contract, so [`DeviceRegistry::resolve`]
//! is the only place records are created.

use std::collections::HashMap;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::DiscoveryError;
use crate::protocol::{DiscoveredDevice, DiscoveryOptions, Transport};
use crate::types::HardwareId;

/// Namespace for accessory uuid derivation.
///
/// Fixed for the lifetime of the library: changing it would change
/// every derived uuid and make hosts re-register every accessory.
const ACCESSORY_NAMESPACE: Uuid = Uuid::from_u128(0x9e40_8c7b_2a5f_4d17_b6e3_0a81_c2d4_5f66);

/// Derives the accessory uuid for a hardware identifier.
///
/// The derivation is deterministic: the same hardware identifier always
/// yields the same uuid, across calls and across process restarts. The
/// host keys its accessory cache on this uuid, so any instability here
/// would surface as duplicate registrations.
///
/// # Examples
///
/// ```
/// use plugbridge::registry::accessory_uuid;
/// use plugbridge::types::HardwareId;
///
/// let id: HardwareId = "a4:3b:0c:5d:2e:f1".parse().unwrap();
/// assert_eq!(accessory_uuid(&id), accessory_uuid(&id));
/// ```
#[must_use]
pub fn accessory_uuid(hardware_id: &HardwareId) -> Uuid {
    Uuid::new_v5(&ACCESSORY_NAMESPACE, hardware_id.as_bytes())
}

/// A known accessory and the device backing it.
///
/// Records are created on first discovery or restored from the host's
/// accessory cache. The uuid never changes; the cached address is
/// refreshed whenever the device is rediscovered elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AccessoryRecord {
    /// Stable accessory uuid, derived from the hardware identifier.
    pub uuid: Uuid,
    /// Display name shown by the host.
    pub display_name: String,
    /// Hardware identifier of the backing device.
    pub hardware_id: HardwareId,
    /// Network address the device was last seen at.
    pub cached_address: SocketAddr,
    /// When the device last answered a discovery probe.
    pub last_seen: DateTime<Utc>,
}

impl AccessoryRecord {
    /// Builds a record for a freshly discovered device.
    #[must_use]
    pub fn from_discovered(device: &DiscoveredDevice) -> Self {
        Self {
            uuid: accessory_uuid(&device.hardware_id),
            display_name: device.name.clone(),
            hardware_id: device.hardware_id,
            cached_address: device.address,
            last_seen: Utc::now(),
        }
    }
}

/// Outcome of reconciling a discovered device against known records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The device matched a known accessory.
    Existing {
        /// The up-to-date record.
        record: AccessoryRecord,
        /// Whether the cached network address was refreshed.
        address_changed: bool,
    },
    /// The device is new; the caller must register the record with the
    /// host exactly once.
    New(AccessoryRecord),
}

impl Resolution {
    /// Returns the record regardless of outcome.
    #[must_use]
    pub fn record(&self) -> &AccessoryRecord {
        match self {
            Self::Existing { record, .. } | Self::New(record) => record,
        }
    }

    /// Returns `true` if the device was previously unknown.
    #[must_use]
    pub fn is_new(&self) -> bool {
        matches!(self, Self::New(_))
    }
}

/// Registry of known accessories, keyed by uuid.
///
/// # Examples
///
/// ```
/// use plugbridge::registry::DeviceRegistry;
///
/// let registry = DeviceRegistry::new();
/// assert!(registry.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    records: RwLock<HashMap<Uuid, AccessoryRecord>>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Probes the network for devices.
    ///
    /// An empty result means the segment has no devices and is not an
    /// error; callers decide how to treat [`DiscoveryError::Timeout`]
    /// (the platform logs it and proceeds with an empty list).
    ///
    /// # Errors
    ///
    /// Propagates [`DiscoveryError`] from the transport.
    pub async fn discover<T: Transport>(
        &self,
        transport: &T,
        options: &DiscoveryOptions,
    ) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        tracing::debug!(
            broadcast = %options.broadcast_address(),
            timeout_ms = u64::try_from(options.timeout().as_millis()).unwrap_or(u64::MAX),
            "starting discovery probe"
        );

        let devices = transport.discover(options).await?;

        tracing::info!(count = devices.len(), "discovery probe completed");
        Ok(devices)
    }

    /// Reconciles a discovered device against the known records.
    ///
    /// Matching is by the uuid derived from the hardware identifier. On
    /// a match the cached address and last-seen timestamp are refreshed.
    /// On a miss a new record is created and returned as
    /// [`Resolution::New`]; the caller must register it with the host
    /// exactly once.
    pub fn resolve(&self, device: &DiscoveredDevice) -> Resolution {
        let uuid = accessory_uuid(&device.hardware_id);
        let mut records = self.records.write();

        if let Some(record) = records.get_mut(&uuid) {
            let address_changed = record.cached_address != device.address;
            if address_changed {
                tracing::info!(
                    %uuid,
                    old = %record.cached_address,
                    new = %device.address,
                    "device address changed, refreshing cache"
                );
                record.cached_address = device.address;
            }
            record.last_seen = Utc::now();

            return Resolution::Existing {
                record: record.clone(),
                address_changed,
            };
        }

        let record = AccessoryRecord::from_discovered(device);
        tracing::info!(%uuid, name = %record.display_name, "new accessory record");
        records.insert(uuid, record.clone());

        Resolution::New(record)
    }

    /// Seeds the registry with a record restored from the host's cache.
    ///
    /// Returns `false` if a record with the same uuid already exists
    /// (the restore is then ignored — discovery data wins).
    pub fn restore(&self, record: AccessoryRecord) -> bool {
        let mut records = self.records.write();
        if records.contains_key(&record.uuid) {
            return false;
        }
        tracing::info!(uuid = %record.uuid, name = %record.display_name, "restored accessory from cache");
        records.insert(record.uuid, record);
        true
    }

    /// Returns the record for an accessory uuid.
    #[must_use]
    pub fn get(&self, uuid: Uuid) -> Option<AccessoryRecord> {
        self.records.read().get(&uuid).cloned()
    }

    /// Returns a snapshot of all known records.
    #[must_use]
    pub fn records(&self) -> Vec<AccessoryRecord> {
        self.records.read().values().cloned().collect()
    }

    /// Returns the number of known accessories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns `true` if no accessories are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
