// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device-kind discrimination for discovered devices.

use std::fmt;
use std::str::FromStr;

/// The kind of plug reported by discovery.
///
/// Discovery responses carry a declared kind code for each device; this
/// enum is keyed on that code. Kinds the library does not know how to
/// drive are preserved as [`DeviceKind::Unsupported`] so callers can log
/// and skip them rather than guess.
///
/// # Examples
///
/// ```
/// use plugbridge::types::DeviceKind;
///
/// let kind: DeviceKind = "sp4b".parse().unwrap();
/// assert_eq!(kind, DeviceKind::Sp4b);
/// assert!(kind.is_supported());
/// assert!(kind.supports_nightlight());
///
/// let other: DeviceKind = "rm4pro".parse().unwrap();
/// assert!(!other.is_supported());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// First-generation plug: power relay only.
    SpMini,
    /// Plug with nightlight and child lock.
    Sp4,
    /// Plug with nightlight, brightness control, and child lock.
    Sp4b,
    /// A kind this library does not drive.
    #[serde(untagged)]
    Unsupported(String),
}

impl DeviceKind {
    /// Returns the kind code as reported by discovery.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::SpMini => "spmini",
            Self::Sp4 => "sp4",
            Self::Sp4b => "sp4b",
            Self::Unsupported(code) => code,
        }
    }

    /// Returns `true` if this library can drive the device.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    /// Returns `true` if the device has a controllable nightlight.
    #[must_use]
    pub fn supports_nightlight(&self) -> bool {
        matches!(self, Self::Sp4 | Self::Sp4b)
    }

    /// Returns `true` if the nightlight brightness can be set.
    #[must_use]
    pub fn supports_brightness(&self) -> bool {
        matches!(self, Self::Sp4b)
    }

    /// Returns `true` if the device has a physical child lock.
    #[must_use]
    pub fn supports_child_lock(&self) -> bool {
        matches!(self, Self::Sp4 | Self::Sp4b)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "spmini" => Self::SpMini,
            "sp4" => Self::Sp4,
            "sp4b" => Self::Sp4b,
            other => Self::Unsupported(other.to_string()),
        })
    }
}
