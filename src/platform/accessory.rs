// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The plug accessory exposed to the host platform.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::bridge::{BridgeHealth, StateBridge};
use crate::config::StaticPlugConfig;
use crate::error::{DiscoveryError, Error, ValueError};
use crate::protocol::{DiscoveredDevice, DiscoveryOptions, Transport};
use crate::registry::AccessoryRecord;
use crate::session::SessionManager;
use crate::state::{Field, FieldUpdate, FieldValue};
use crate::types::DeviceKind;

/// A named, typed property of an accessory the host can GET and SET.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    /// Relay power on/off.
    On,
    /// Nightlight on/off.
    NightLight,
    /// Nightlight brightness (0-100).
    NightLightBrightness,
    /// Status indicator LED on/off.
    Indicator,
    /// Physical button lock.
    ChildLock,
}

impl Characteristic {
    /// Returns the characteristic name as presented to the host.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::On => "On",
            Self::NightLight => "NightLight",
            Self::NightLightBrightness => "NightLightBrightness",
            Self::Indicator => "Indicator",
            Self::ChildLock => "ChildLock",
        }
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A row of the accessory's dispatch table: the characteristic the host
/// addresses and the device state field it reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicBinding {
    /// The host-facing characteristic.
    pub characteristic: Characteristic,
    /// The state field backing it.
    pub field: Field,
}

/// Builds the dispatch table for a device kind.
///
/// Only capabilities the kind actually has are exposed; a host asking
/// for anything else gets [`CharacteristicError::Unsupported`].
fn bindings_for(kind: &DeviceKind) -> Vec<CharacteristicBinding> {
    let mut bindings = vec![
        CharacteristicBinding {
            characteristic: Characteristic::On,
            field: Field::Power,
        },
        CharacteristicBinding {
            characteristic: Characteristic::Indicator,
            field: Field::Indicator,
        },
    ];

    if kind.supports_nightlight() {
        bindings.push(CharacteristicBinding {
            characteristic: Characteristic::NightLight,
            field: Field::Nightlight,
        });
    }
    if kind.supports_brightness() {
        bindings.push(CharacteristicBinding {
            characteristic: Characteristic::NightLightBrightness,
            field: Field::NightlightBrightness,
        });
    }
    if kind.supports_child_lock() {
        bindings.push(CharacteristicBinding {
            characteristic: Characteristic::ChildLock,
            field: Field::ChildLock,
        });
    }

    bindings
}

/// Errors surfaced to the host's characteristic handlers.
///
/// Device-level failures are collapsed into [`NotResponding`] here so
/// the host shows the accessory as not responding instead of receiving
/// raw session errors; one unreachable plug must not destabilize the
/// host process or other accessories.
///
/// [`NotResponding`]: CharacteristicError::NotResponding
#[derive(Debug, Error)]
pub enum CharacteristicError {
    /// The device did not answer; the host should display the accessory
    /// as not responding.
    #[error("service communication failure")]
    NotResponding,

    /// The accessory does not expose this characteristic.
    #[error("characteristic {0} is not supported by this accessory")]
    Unsupported(Characteristic),

    /// The host supplied a value the characteristic cannot accept.
    #[error(transparent)]
    InvalidValue(#[from] ValueError),
}

/// Static description of the backing device, shown by the host in the
/// accessory information service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryInfo {
    /// Manufacturer string reported by the device.
    pub manufacturer: String,
    /// Model string reported by the device.
    pub model: String,
    /// Serial number; the hardware identifier.
    pub serial_number: String,
}

/// A smart plug accessory.
///
/// A plain struct plus a dispatch table — the host addresses
/// characteristics by name through [`handle_get`]/[`handle_set`], and
/// the table maps each characteristic to the state field it is backed
/// by.
///
/// [`handle_get`]: PlugAccessory::handle_get
/// [`handle_set`]: PlugAccessory::handle_set
#[derive(Debug)]
pub struct PlugAccessory<T: Transport> {
    record: AccessoryRecord,
    info: AccessoryInfo,
    kind: DeviceKind,
    bindings: Vec<CharacteristicBinding>,
    bridge: StateBridge<T>,
}

impl<T: Transport> PlugAccessory<T> {
    /// Creates an accessory for a resolved device.
    pub(crate) fn new(record: AccessoryRecord, device: &DiscoveredDevice, bridge: StateBridge<T>) -> Self {
        Self {
            record,
            info: AccessoryInfo {
                manufacturer: device.manufacturer.clone(),
                model: device.model.clone(),
                serial_number: device.hardware_id.to_string(),
            },
            kind: device.kind.clone(),
            bindings: bindings_for(&device.kind),
            bridge,
        }
    }

    /// Creates a standalone accessory for a statically addressed plug.
    ///
    /// The configuration is validated first; the plug is then probed
    /// directly at its configured address (no segment-wide discovery)
    /// and an accessory is built from whatever answered.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` before any network call if `name` or `ip`
    /// is missing, and `DiscoveryError::NoDeviceAt` if nothing answered
    /// at the configured address.
    pub async fn from_static(transport: Arc<T>, config: &StaticPlugConfig) -> Result<Self, Error> {
        config.validate()?;
        // Validated above, so the ip is present.
        let ip = config.ip.ok_or(crate::error::ConfigError::MissingField("ip"))?;

        let options = DiscoveryOptions::directed(ip);
        let mut devices = transport.discover(&options).await?;
        devices.retain(|d| d.address.ip() == ip);

        let Some(device) = devices.into_iter().next() else {
            return Err(DiscoveryError::NoDeviceAt(ip).into());
        };

        tracing::info!(
            name = %config.name,
            address = %device.address,
            kind = %device.kind,
            "static plug resolved"
        );

        let mut record = AccessoryRecord::from_discovered(&device);
        record.display_name = config.name.clone();

        let sessions = SessionManager::new(transport, device.clone(), options);
        let bridge = StateBridge::new(sessions);

        Ok(Self::new(record, &device, bridge))
    }

    /// Returns the accessory uuid.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.record.uuid
    }

    /// Returns the accessory record.
    #[must_use]
    pub fn record(&self) -> &AccessoryRecord {
        &self.record
    }

    /// Returns the accessory information service fields.
    #[must_use]
    pub fn info(&self) -> &AccessoryInfo {
        &self.info
    }

    /// Returns the kind of the backing device.
    #[must_use]
    pub fn kind(&self) -> &DeviceKind {
        &self.kind
    }

    /// Returns the dispatch table of exposed characteristics.
    #[must_use]
    pub fn characteristics(&self) -> &[CharacteristicBinding] {
        &self.bindings
    }

    /// Returns `true` if the accessory exposes a characteristic.
    #[must_use]
    pub fn supports(&self, characteristic: Characteristic) -> bool {
        self.binding(characteristic).is_some()
    }

    /// Returns the accessory's current health.
    #[must_use]
    pub fn health(&self) -> BridgeHealth {
        self.bridge.health()
    }

    /// Returns the bridge for direct state access beyond the
    /// characteristic surface (e.g. the auto-off timer).
    #[must_use]
    pub fn bridge(&self) -> &StateBridge<T> {
        &self.bridge
    }

    /// Updates the cached device address after a discovery pass
    /// observed the device elsewhere.
    pub fn refresh_address(&self, address: std::net::SocketAddr) {
        self.bridge.session_manager().set_address(address);
    }

    /// Handles a GET request from the host.
    ///
    /// Performs a fresh device read and returns the backing field's
    /// value.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` for characteristics this accessory does not
    /// expose, or `NotResponding` when the device could not be reached.
    pub async fn handle_get(
        &self,
        characteristic: Characteristic,
    ) -> Result<FieldValue, CharacteristicError> {
        let binding = self
            .binding(characteristic)
            .ok_or(CharacteristicError::Unsupported(characteristic))?;

        match self.bridge.read().await {
            Ok(state) => Ok(state.value_of(binding.field)),
            Err(err) => {
                tracing::warn!(
                    uuid = %self.record.uuid,
                    %characteristic,
                    error = %err,
                    "get failed, reporting not responding"
                );
                Err(CharacteristicError::NotResponding)
            }
        }
    }

    /// Handles a SET request from the host.
    ///
    /// Merges the single changed field into a freshly read full state
    /// and writes it back.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` or `InvalidValue` without touching the
    /// device, or `NotResponding` when the device could not be reached.
    pub async fn handle_set(
        &self,
        characteristic: Characteristic,
        value: FieldValue,
    ) -> Result<(), CharacteristicError> {
        let binding = self
            .binding(characteristic)
            .ok_or(CharacteristicError::Unsupported(characteristic))?;

        let update = FieldUpdate::from_value(binding.field, value)?;

        match self.bridge.write(update).await {
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::warn!(
                    uuid = %self.record.uuid,
                    %characteristic,
                    error = %err,
                    "set failed, reporting not responding"
                );
                Err(CharacteristicError::NotResponding)
            }
        }
    }

    fn binding(&self, characteristic: Characteristic) -> Option<CharacteristicBinding> {
        self.bindings
            .iter()
            .copied()
            .find(|b| b.characteristic == characteristic)
    }
}
