// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host platform integration.
//!
//! The [`Platform`] drives the accessory lifecycle against a host hub:
//! cached accessories are handed back through
//! [`Platform::restore_accessory`] first, then a discovery pass
//! ([`Platform::start`]) reconciles live devices against the known
//! records, registers new accessories with the host exactly once, and
//! binds each discovered plug to a [`PlugAccessory`] the host's
//! characteristic handlers call into.
//!
//! The host side is consumed through the [`AccessoryHost`] trait; this
//! library never touches the hub's accessory cache directly. It stores
//! the device's last known address in an opaque context blob the host
//! persists alongside each accessory.

mod accessory;

pub use accessory::{
    AccessoryInfo, Characteristic, CharacteristicBinding, CharacteristicError, PlugAccessory,
};

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::bridge::{BridgeConfig, StateBridge};
use crate::config::PlatformConfig;
use crate::error::{ConfigError, DiscoveryError, Error};
use crate::event::{AccessoryEvent, EventBus};
use crate::protocol::{DiscoveredDevice, Transport};
use crate::registry::{AccessoryRecord, DeviceRegistry, Resolution, accessory_uuid};
use crate::session::SessionManager;
use crate::types::{DeviceKind, HardwareId};

/// Default timeout for the startup discovery pass.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// The slice of the host's accessory persistence this library uses.
///
/// The host owns the accessory cache; registrations hand it a context
/// blob to persist, and restores hand the blob back. Implementations
/// must call [`Platform::restore_accessory`] for every cached accessory
/// before [`Platform::start`] runs, mirroring the host's
/// restore-then-ready startup order.
pub trait AccessoryHost {
    /// Registers a new accessory.
    ///
    /// The platform calls this exactly once per accessory uuid; the
    /// host treats a duplicate uuid as a fatal error.
    fn register_accessory(&self, record: &AccessoryRecord, context: &serde_json::Value);

    /// Persists a refreshed context blob for a known accessory.
    fn update_context(&self, uuid: Uuid, context: &serde_json::Value);
}

/// What this library stores in the host's opaque context blob.
///
/// Enough to find the device again after a restart without a fresh
/// discovery pass having run yet.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AccessoryContext {
    /// Hardware identifier of the backing device.
    pub hardware_id: HardwareId,
    /// Declared device kind.
    pub kind: DeviceKind,
    /// Network address the device was last seen at.
    pub last_address: SocketAddr,
}

impl AccessoryContext {
    /// Builds the context blob for a discovered device.
    #[must_use]
    pub fn from_discovered(device: &DiscoveredDevice) -> Self {
        Self {
            hardware_id: device.hardware_id,
            kind: device.kind.clone(),
            last_address: device.address,
        }
    }

    /// Serializes the context for the host to persist.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Deserializes a context blob handed back by the host.
    ///
    /// Returns `None` for blobs this library did not write (or wrote in
    /// an incompatible shape); callers skip those accessories.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Bridges discovered plugs into a host hub.
///
/// Generic over the vendor transport `T` and the host seam `H`.
pub struct Platform<T: Transport, H: AccessoryHost> {
    transport: Arc<T>,
    host: H,
    config: PlatformConfig,
    discovery_timeout: Duration,
    bridge_config: BridgeConfig,
    registry: DeviceRegistry,
    accessories: RwLock<HashMap<Uuid, Arc<PlugAccessory<T>>>>,
    events: EventBus,
}

impl<T: Transport, H: AccessoryHost> Platform<T, H> {
    /// Creates a platform from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid. No network
    /// call is made before validation passes.
    pub fn new(transport: T, host: H, config: PlatformConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        tracing::debug!(name = %config.name, "platform initialized");

        Ok(Self {
            transport: Arc::new(transport),
            host,
            config,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            bridge_config: BridgeConfig::default(),
            registry: DeviceRegistry::new(),
            accessories: RwLock::new(HashMap::new()),
            events: EventBus::new(),
        })
    }

    /// Sets the timeout for discovery passes.
    #[must_use]
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Sets the bridge configuration applied to every accessory.
    #[must_use]
    pub fn with_bridge_config(mut self, config: BridgeConfig) -> Self {
        self.bridge_config = config;
        self
    }

    /// Subscribes to accessory lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<AccessoryEvent> {
        self.events.subscribe()
    }

    /// Returns the accessory registry.
    #[must_use]
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Restores a cached accessory handed back by the host at startup.
    ///
    /// Seeds the registry with the persisted record so the next
    /// discovery pass matches the device instead of re-registering it.
    /// Returns `false` (and skips the accessory) when the context blob
    /// is not one this library wrote.
    pub fn restore_accessory(&self, display_name: &str, context: &serde_json::Value) -> bool {
        let Some(ctx) = AccessoryContext::from_value(context) else {
            tracing::warn!(%display_name, "ignoring cached accessory with foreign context blob");
            return false;
        };

        let record = AccessoryRecord {
            uuid: accessory_uuid(&ctx.hardware_id),
            display_name: display_name.to_string(),
            hardware_id: ctx.hardware_id,
            cached_address: ctx.last_address,
            last_seen: Utc::now(),
        };
        let uuid = record.uuid;
        let restored = self.registry.restore(record);

        if restored {
            self.events.publish(AccessoryEvent::Restored {
                uuid,
                display_name: display_name.to_string(),
            });
        }
        restored
    }

    /// Runs a discovery pass and reconciles the results.
    ///
    /// New devices are registered with the host exactly once; known
    /// devices get their cached address refreshed. Each supported device
    /// ends up bound to a [`PlugAccessory`] retrievable via
    /// [`Self::accessory`]. A discovery timeout is logged and treated as
    /// an empty result — the pass can simply be retried later.
    ///
    /// # Errors
    ///
    /// Returns `Error::Discovery` on transport failures other than the
    /// timeout.
    pub async fn start(&self) -> Result<(), Error> {
        let options = self.config.discovery_options(self.discovery_timeout);

        let devices = match self.registry.discover(&*self.transport, &options).await {
            Ok(devices) => devices,
            Err(DiscoveryError::Timeout(ms)) => {
                tracing::warn!(
                    timeout_ms = ms,
                    "discovery timed out with no responses, continuing without devices"
                );
                Vec::new()
            }
            Err(err) => return Err(err.into()),
        };

        for device in devices {
            if !device.kind.is_supported() {
                tracing::info!(
                    kind = %device.kind,
                    hardware_id = %device.hardware_id,
                    "skipping unsupported device"
                );
                continue;
            }

            self.adopt(&device);
        }

        Ok(())
    }

    /// Returns a bound accessory by uuid.
    #[must_use]
    pub fn accessory(&self, uuid: Uuid) -> Option<Arc<PlugAccessory<T>>> {
        self.accessories.read().get(&uuid).cloned()
    }

    /// Returns all bound accessories.
    #[must_use]
    pub fn accessories(&self) -> Vec<Arc<PlugAccessory<T>>> {
        self.accessories.read().values().cloned().collect()
    }

    /// Reconciles one discovered device and binds its accessory.
    fn adopt(&self, device: &DiscoveredDevice) {
        let context = AccessoryContext::from_discovered(device).to_value();

        let record = match self.registry.resolve(device) {
            Resolution::New(record) => {
                tracing::info!(
                    uuid = %record.uuid,
                    name = %record.display_name,
                    address = %record.cached_address,
                    "registering new accessory"
                );
                self.host.register_accessory(&record, &context);
                self.events.publish(AccessoryEvent::Registered {
                    uuid: record.uuid,
                    display_name: record.display_name.clone(),
                });
                record
            }
            Resolution::Existing {
                record,
                address_changed,
            } => {
                if address_changed {
                    self.host.update_context(record.uuid, &context);
                    self.events.publish(AccessoryEvent::AddressChanged {
                        uuid: record.uuid,
                        address: record.cached_address,
                    });
                }
                record
            }
        };

        let mut accessories = self.accessories.write();
        if let Some(existing) = accessories.get(&record.uuid) {
            // Already bound from an earlier pass; just keep its address
            // current.
            existing.refresh_address(record.cached_address);
            return;
        }

        let rediscovery = self.config.discovery_options(self.discovery_timeout);
        let sessions = SessionManager::new(self.transport.clone(), device.clone(), rediscovery);
        let bridge = StateBridge::new(sessions)
            .with_config(self.bridge_config.clone())
            .with_events(self.events.clone(), record.uuid);

        let accessory = Arc::new(PlugAccessory::new(record.clone(), device, bridge));
        accessories.insert(record.uuid, accessory);
    }
}

impl<T: Transport, H: AccessoryHost> std::fmt::Debug for Platform<T, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("name", &self.config.name)
            .field("known_accessories", &self.registry.len())
            .field("bound_accessories", &self.accessories.read().len())
            .finish_non_exhaustive()
    }
}
