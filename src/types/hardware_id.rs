// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stable hardware identifier for network devices.

use std::fmt;
use std::str::FromStr;

use crate::error::ValueError;

/// The stable, MAC-like identifier of a physical device.
///
/// A `HardwareId` is the sole notion of device identity in this library.
/// Network addresses change (DHCP leases, device reboots), but the
/// hardware identifier reported during discovery does not, so accessory
/// uuids are derived from it and devices are matched by it.
///
/// # Examples
///
/// ```
/// use plugbridge::types::HardwareId;
///
/// let id: HardwareId = "a4:3b:0c:5d:2e:f1".parse().unwrap();
/// assert_eq!(id.to_string(), "a4:3b:0c:5d:2e:f1");
/// assert_eq!(id.as_bytes().len(), 6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HardwareId([u8; 6]);

impl HardwareId {
    /// Creates a hardware identifier from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Returns the raw identifier bytes.
    ///
    /// This is the byte sequence accessory uuids are derived from.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for HardwareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for HardwareId {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');

        for byte in &mut bytes {
            let part = parts
                .next()
                .ok_or_else(|| ValueError::InvalidHardwareId(s.to_string()))?;
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| ValueError::InvalidHardwareId(s.to_string()))?;
        }

        if parts.next().is_some() {
            return Err(ValueError::InvalidHardwareId(s.to_string()));
        }

        Ok(Self(bytes))
    }
}

impl serde::Serialize for HardwareId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for HardwareId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
