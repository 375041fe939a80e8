// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The vendor transport seam.
//!
//! This library does not implement the plug wire protocol (discovery
//! packet format, authentication handshake, encryption). Those live in
//! the vendor library, consumed here through two traits:
//!
//! - [`Transport`]: network-wide operations — probe a segment for
//!   devices, open an authenticated session to one of them.
//! - [`DeviceSession`]: an authenticated, time-bounded channel to one
//!   physical device — read the full state, write the full state.
//!
//! Components are generic over `T: Transport` rather than holding trait
//! objects, so a vendor binding (or an in-memory fake in tests) plugs in
//! without dynamic dispatch.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::{DiscoveryError, SessionError};
use crate::state::PlugState;
use crate::types::{DeviceKind, HardwareId};

/// Default discovery timeout.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// A device that answered a discovery probe.
///
/// The `hardware_id` is the device's identity and is immutable; the
/// `address` is whatever the device currently leases and may differ
/// between discovery passes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DiscoveredDevice {
    /// The device's current network address.
    pub address: SocketAddr,
    /// Stable hardware identifier.
    pub hardware_id: HardwareId,
    /// Declared device kind.
    pub kind: DeviceKind,
    /// Name the device announces itself with.
    pub name: String,
    /// Manufacturer string reported by the device.
    pub manufacturer: String,
    /// Model string reported by the device.
    pub model: String,
}

/// Options for a discovery probe.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use plugbridge::protocol::DiscoveryOptions;
///
/// let options = DiscoveryOptions::new()
///     .with_timeout(Duration::from_secs(10));
///
/// assert_eq!(options.scan_address().to_string(), "0.0.0.0");
/// assert_eq!(options.broadcast_address().to_string(), "255.255.255.255");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Local address to bind the probe socket to.
    scan_address: IpAddr,
    /// Address the probe is sent to.
    broadcast_address: IpAddr,
    /// How long to wait for responses.
    timeout: Duration,
}

impl DiscoveryOptions {
    /// Creates discovery options with default settings.
    ///
    /// Defaults: scan on `0.0.0.0`, probe `255.255.255.255`, 5 second
    /// timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options that probe a single known address.
    ///
    /// Used for statically configured plugs and for re-resolving a known
    /// device without waking the whole segment.
    #[must_use]
    pub fn directed(address: IpAddr) -> Self {
        Self {
            broadcast_address: address,
            ..Self::default()
        }
    }

    /// Sets the local address the probe socket binds to.
    #[must_use]
    pub fn with_scan_address(mut self, address: IpAddr) -> Self {
        self.scan_address = address;
        self
    }

    /// Sets the address the probe is sent to.
    #[must_use]
    pub fn with_broadcast_address(mut self, address: IpAddr) -> Self {
        self.broadcast_address = address;
        self
    }

    /// Sets how long to wait for responses.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the local scan address.
    #[must_use]
    pub fn scan_address(&self) -> IpAddr {
        self.scan_address
    }

    /// Returns the probe target address.
    #[must_use]
    pub fn broadcast_address(&self) -> IpAddr {
        self.broadcast_address
    }

    /// Returns the discovery timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            scan_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            broadcast_address: IpAddr::V4(Ipv4Addr::BROADCAST),
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}

/// Network-wide operations provided by the vendor library.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// The session type produced by a successful handshake.
    type Session: DeviceSession;

    /// Probes the network segment for devices.
    ///
    /// Returns an empty list when the probe completed but no devices
    /// exist on the segment — that is not an error.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError::Timeout` when nothing answered before
    /// the deadline, or `DiscoveryError::Transport` on socket failures.
    async fn discover(
        &self,
        options: &DiscoveryOptions,
    ) -> Result<Vec<DiscoveredDevice>, DiscoveryError>;

    /// Performs the authentication handshake with one device.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::DeviceUnreachable` if the device's address
    /// does not respond, or `SessionError::AuthenticationFailed` if the
    /// handshake is rejected.
    async fn authenticate(
        &self,
        device: &DiscoveredDevice,
    ) -> Result<Self::Session, SessionError>;
}

/// An authenticated, time-bounded channel to one physical device.
///
/// A session is owned exclusively by the component that acquired it and
/// is released by dropping it. Sessions are not assumed long-lived:
/// callers re-acquire before every operation rather than holding one
/// open.
#[allow(async_fn_in_trait)]
pub trait DeviceSession {
    /// Queries the device for its full state.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::DeviceUnreachable` if the device stopped
    /// responding.
    async fn get_state(&self) -> Result<PlugState, SessionError>;

    /// Writes a full state record to the device.
    ///
    /// The device requires every field; callers must merge partial
    /// updates against a freshly read state first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::DeviceUnreachable` if the device stopped
    /// responding, or `SessionError::Rejected` if it refused the write.
    async fn set_state(&self, state: &PlugState) -> Result<(), SessionError>;
}
