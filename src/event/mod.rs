// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Accessory lifecycle events.
//!
//! The platform broadcasts an [`AccessoryEvent`] whenever an accessory
//! is registered, restored from cache, observed at a new address, or
//! changes health. Embedding applications subscribe through
//! [`Platform::subscribe`](crate::platform::Platform::subscribe).

mod event_bus;

pub use event_bus::EventBus;

use std::net::SocketAddr;

use uuid::Uuid;

use crate::bridge::BridgeHealth;

/// Events emitted by the platform.
///
/// All events carry the accessory uuid for targeted handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessoryEvent {
    /// A new accessory was registered with the host.
    Registered {
        /// The accessory uuid.
        uuid: Uuid,
        /// The accessory display name.
        display_name: String,
    },

    /// A cached accessory was restored at startup.
    Restored {
        /// The accessory uuid.
        uuid: Uuid,
        /// The accessory display name.
        display_name: String,
    },

    /// A known device was observed at a new network address.
    AddressChanged {
        /// The accessory uuid.
        uuid: Uuid,
        /// The device's new address.
        address: SocketAddr,
    },

    /// An accessory's responsiveness changed.
    HealthChanged {
        /// The accessory uuid.
        uuid: Uuid,
        /// The new health state.
        health: BridgeHealth,
    },
}

impl AccessoryEvent {
    /// Returns the accessory uuid associated with this event.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Registered { uuid, .. }
            | Self::Restored { uuid, .. }
            | Self::AddressChanged { uuid, .. }
            | Self::HealthChanged { uuid, .. } => *uuid,
        }
    }

    /// Returns `true` if this is a lifecycle event (registered/restored).
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Registered { .. } | Self::Restored { .. })
    }

    /// Returns `true` if this is a health event.
    #[must_use]
    pub fn is_health(&self) -> bool {
        matches!(self, Self::HealthChanged { .. })
    }
}
