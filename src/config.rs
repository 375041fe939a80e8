// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration surface consumed from the host platform.
//!
//! The host hands configuration over as JSON. Both shapes here
//! deserialize leniently (missing fields become defaults or empties) and
//! are then validated with [`PlatformConfig::validate`] /
//! [`StaticPlugConfig::validate`], so a missing required field surfaces
//! as a [`ConfigError`] the operator can act on rather than a serde
//! parse error. Validation always happens before any network call.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::error::ConfigError;
use crate::protocol::DiscoveryOptions;

fn default_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_broadcast_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::BROADCAST)
}

/// Configuration for the dynamic platform.
///
/// Recognized options: `name` (required), `address` (default
/// `0.0.0.0`), `broadcastAddress` (default `255.255.255.255`).
///
/// # Examples
///
/// ```
/// use plugbridge::config::PlatformConfig;
///
/// let config: PlatformConfig = serde_json::from_str(
///     r#"{ "name": "Smart Plugs", "broadcastAddress": "192.168.1.255" }"#,
/// ).unwrap();
///
/// config.validate().unwrap();
/// assert_eq!(config.address.to_string(), "0.0.0.0");
/// assert_eq!(config.broadcast_address.to_string(), "192.168.1.255");
/// ```
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    /// Display name of the platform instance.
    #[serde(default)]
    pub name: String,
    /// Local address discovery probes bind to.
    #[serde(default = "default_address")]
    pub address: IpAddr,
    /// Address discovery probes are sent to.
    #[serde(default = "default_broadcast_address")]
    pub broadcast_address: IpAddr,
}

impl PlatformConfig {
    /// Deserializes and validates a config value handed over by the host.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Malformed` if the value does not
    /// deserialize, or the validation errors from [`Self::validate`].
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_value(value).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates required fields.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` if `name` is missing or empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingField("name"));
        }
        Ok(())
    }

    /// Builds discovery options from the configured addresses.
    #[must_use]
    pub fn discovery_options(&self, timeout: Duration) -> DiscoveryOptions {
        DiscoveryOptions::new()
            .with_scan_address(self.address)
            .with_broadcast_address(self.broadcast_address)
            .with_timeout(timeout)
    }
}

/// Configuration for a single statically addressed plug.
///
/// The static variant skips segment-wide discovery: the plug is probed
/// directly at its configured address. Both `name` and `ip` are
/// required.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StaticPlugConfig {
    /// Display name of the accessory.
    #[serde(default)]
    pub name: String,
    /// Static address of the plug.
    #[serde(default)]
    pub ip: Option<IpAddr>,
}

impl StaticPlugConfig {
    /// Deserializes and validates a config value handed over by the host.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Malformed` if the value does not
    /// deserialize, or the validation errors from [`Self::validate`].
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_value(value).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates required fields.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` if `name` or `ip` is missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingField("name"));
        }
        if self.ip.is_none() {
            return Err(ConfigError::MissingField("ip"));
        }
        Ok(())
    }
}
