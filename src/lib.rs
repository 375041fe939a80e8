// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `plugbridge` - bridge network-discoverable smart plugs into a
//! smart-home hub platform.
//!
//! This library owns the glue between a hub's accessory model and a
//! vendor plug protocol: discovering devices on the local segment,
//! deriving stable accessory identities, keeping authenticated sessions
//! alive across address churn, and translating characteristic GET/SET
//! requests into whole-state device operations. The wire protocol
//! itself lives in a vendor library consumed through the
//! [`protocol::Transport`] seam.
//!
//! # Architecture
//!
//! - [`registry`]: resolves logical accessory identities (uuids derived
//!   deterministically from hardware identifiers) to live devices,
//!   reconciling cached accessories against fresh discovery results.
//! - [`session`]: owns the authenticated connection to one device —
//!   acquired per operation, re-resolved when the address stops
//!   responding.
//! - [`bridge`]: read/write with mandatory read-before-write merges,
//!   per-accessory serialization, and responsiveness tracking.
//! - [`platform`]: the host-facing surface — restore, discover,
//!   register exactly once, dispatch characteristics.
//!
//! # Session policy
//!
//! Plugs lease new addresses and reboot at will, so sessions are
//! re-acquired before every operation instead of held open. An
//! unresponsive cached address triggers a discovery probe restricted to
//! the device's hardware identifier before authentication is retried.
//! This costs a round trip per operation and buys immunity to address
//! churn; see [`session::SessionManager`] before changing it.
//!
//! # Quick Start
//!
//! ```ignore
//! use plugbridge::config::PlatformConfig;
//! use plugbridge::platform::{Characteristic, Platform};
//! use plugbridge::state::FieldValue;
//!
//! #[tokio::main]
//! async fn main() -> plugbridge::Result<()> {
//!     // `transport` is a vendor binding implementing `Transport`;
//!     // `host` implements `AccessoryHost` for your hub.
//!     let config = PlatformConfig::from_value(serde_json::json!({
//!         "name": "Smart Plugs",
//!         "broadcastAddress": "192.168.1.255",
//!     }))?;
//!
//!     let platform = Platform::new(transport, host, config)?;
//!     platform.start().await?;
//!
//!     for accessory in platform.accessories() {
//!         accessory
//!             .handle_set(Characteristic::On, FieldValue::Bool(true))
//!             .await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Static accessory
//!
//! A single plug at a fixed address can be driven without the platform:
//!
//! ```ignore
//! use plugbridge::config::StaticPlugConfig;
//! use plugbridge::platform::PlugAccessory;
//!
//! let config = StaticPlugConfig::from_value(serde_json::json!({
//!     "name": "Heater",
//!     "ip": "192.168.1.5",
//! }))?;
//! let accessory = PlugAccessory::from_static(transport, &config).await?;
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod event;
pub mod platform;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod state;
pub mod types;

pub use bridge::{BridgeConfig, BridgeHealth, StateBridge};
pub use config::{PlatformConfig, StaticPlugConfig};
pub use error::{ConfigError, DiscoveryError, Error, Result, SessionError, ValueError};
pub use event::{AccessoryEvent, EventBus};
pub use platform::{
    AccessoryContext, AccessoryHost, AccessoryInfo, Characteristic, CharacteristicError,
    Platform, PlugAccessory,
};
pub use protocol::{DeviceSession, DiscoveredDevice, DiscoveryOptions, Transport};
pub use registry::{AccessoryRecord, DeviceRegistry, Resolution, accessory_uuid};
pub use session::{RetryPolicy, SessionManager};
pub use state::{Field, FieldUpdate, FieldValue, PlugState};
pub use types::{Brightness, DeviceKind, HardwareId};
