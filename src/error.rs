// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `plugbridge` library.
//!
//! This module provides the error hierarchy for failures across the
//! library: configuration validation, device discovery, session
//! handling, and value constraints.
//!
//! Device-level errors (`SessionError`) are deliberately kept out of the
//! accessory-facing surface: the platform layer translates them into a
//! "not responding" characteristic result so a single unreachable plug
//! never takes down the rest of the platform.

use thiserror::Error;

use crate::types::HardwareId;

/// The main error type for this library.
///
/// This enum encompasses all possible errors that can occur when
/// bridging smart plugs into a host platform.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during configuration validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error occurred during device discovery.
    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Error occurred during a device session operation.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),
}

/// Errors raised while validating configuration.
///
/// Configuration errors are fatal at construction time: they are
/// reported to the operator and the accessory or platform is not
/// created. They always occur before any network call is made.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required configuration field is missing or empty.
    #[error("missing required config field: {0}")]
    MissingField(&'static str),

    /// The configuration could not be deserialized.
    #[error("malformed configuration: {0}")]
    Malformed(String),
}

/// Errors raised during device discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No responses arrived within the discovery timeout.
    ///
    /// Distinct from an empty result: an empty device list means the
    /// probe completed and the segment legitimately has no devices.
    #[error("discovery timed out after {0} ms")]
    Timeout(u64),

    /// No device answered at a statically configured address.
    #[error("no device answered at {0}")]
    NoDeviceAt(std::net::IpAddr),

    /// The underlying transport failed.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Errors raised while acquiring or using a device session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The device's network address did not respond.
    ///
    /// Also produced when a per-operation timeout expires, so the host's
    /// request thread is never left hanging.
    #[error("device {hardware_id} is unreachable")]
    DeviceUnreachable {
        /// Hardware identifier of the unreachable device.
        hardware_id: HardwareId,
    },

    /// The authentication handshake was rejected by the device.
    #[error("authentication rejected by device {hardware_id}")]
    AuthenticationFailed {
        /// Hardware identifier of the rejecting device.
        hardware_id: HardwareId,
    },

    /// The device acknowledged the request with an error.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The underlying transport failed.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl SessionError {
    /// Returns `true` if this error indicates the device did not respond.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::DeviceUnreachable { .. })
    }

    /// Returns `true` if this error indicates a rejected handshake.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}

/// Errors related to value validation and constraints.
///
/// These errors occur when attempting to create constrained types
/// with invalid values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u16,
        /// Maximum allowed value.
        max: u16,
        /// The actual value that was provided.
        actual: u16,
    },

    /// A hardware identifier string could not be parsed.
    #[error("invalid hardware identifier: {0}")]
    InvalidHardwareId(String),

    /// A value of the wrong primitive type was supplied for a field.
    #[error("wrong value type for field {field}: expected {expected}")]
    WrongType {
        /// The field the value was intended for.
        field: &'static str,
        /// Description of the expected type.
        expected: &'static str,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
