// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read/write bridge between host requests and device sessions.
//!
//! A [`StateBridge`] translates the host's characteristic GET/SET
//! requests into session operations with two hard guarantees:
//!
//! - **Read-before-write.** The device's write operation requires all
//!   fields, so a write reads the current full state, merges the single
//!   changed field, and sends the result back in full. A partial or
//!   default-filled state would silently reset physical settings.
//! - **Per-accessory serialization.** At most one operation is in
//!   flight per accessory at a time; a write overlapping a read on the
//!   same device would risk merging against stale state. Operations on
//!   different accessories are independent.
//!
//! Every operation runs under a timeout; on expiry it fails with
//! `DeviceUnreachable` rather than hanging the host's request thread.

use std::time::Duration;

use uuid::Uuid;

use crate::error::SessionError;
use crate::event::{AccessoryEvent, EventBus};
use crate::protocol::{DeviceSession, Transport};
use crate::session::SessionManager;
use crate::state::{FieldUpdate, PlugState};

/// Default per-operation timeout.
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Consecutive unreachable failures before an accessory is reported
/// unresponsive.
const DEFAULT_UNRESPONSIVE_AFTER: u32 = 3;

/// Responsiveness of one logical accessory.
///
/// The steady state is `Bound`: every read/write re-enters session
/// acquisition, so "bound" means "the last operation reached the
/// device", not "a connection is open". An accessory that keeps failing
/// becomes `Unresponsive` but is never de-registered automatically —
/// removal is an explicit operator action, so a temporarily offline
/// device does not lose its host-side state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeHealth {
    /// No operation has been attempted yet.
    Unbound,
    /// The first session acquisition is in progress.
    Discovering,
    /// The last operation reached the device.
    Bound,
    /// Repeated operations failed to reach the device.
    Unresponsive,
}

impl BridgeHealth {
    /// Returns `true` if the last operation reached the device.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound)
    }

    /// Returns `true` if the accessory is reported unresponsive.
    #[must_use]
    pub fn is_unresponsive(&self) -> bool {
        matches!(self, Self::Unresponsive)
    }
}

/// Tuning knobs for a [`StateBridge`].
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Per-operation deadline.
    operation_timeout: Duration,
    /// Consecutive unreachable failures before reporting unresponsive.
    unresponsive_after: u32,
}

impl BridgeConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-operation deadline.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Sets how many consecutive unreachable failures flip the accessory
    /// to unresponsive.
    #[must_use]
    pub fn with_unresponsive_after(mut self, failures: u32) -> Self {
        self.unresponsive_after = failures.max(1);
        self
    }

    /// Returns the per-operation deadline.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Returns the unresponsive threshold.
    #[must_use]
    pub fn unresponsive_after(&self) -> u32 {
        self.unresponsive_after
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            unresponsive_after: DEFAULT_UNRESPONSIVE_AFTER,
        }
    }
}

/// Health bookkeeping guarded by one lock.
#[derive(Debug)]
struct HealthTracker {
    health: BridgeHealth,
    consecutive_unreachable: u32,
}

/// Bridges host read/write requests onto device sessions.
pub struct StateBridge<T: Transport> {
    sessions: SessionManager<T>,
    config: BridgeConfig,
    /// Serializes operations on this accessory.
    op_lock: tokio::sync::Mutex<()>,
    tracker: parking_lot::Mutex<HealthTracker>,
    /// Event sink for health transitions, when attached to a platform.
    events: Option<(EventBus, Uuid)>,
}

impl<T: Transport> StateBridge<T> {
    /// Creates a bridge over a session manager.
    #[must_use]
    pub fn new(sessions: SessionManager<T>) -> Self {
        Self {
            sessions,
            config: BridgeConfig::default(),
            op_lock: tokio::sync::Mutex::new(()),
            tracker: parking_lot::Mutex::new(HealthTracker {
                health: BridgeHealth::Unbound,
                consecutive_unreachable: 0,
            }),
            events: None,
        }
    }

    /// Sets the bridge configuration.
    #[must_use]
    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Attaches an event bus; health transitions are published under the
    /// given accessory uuid.
    #[must_use]
    pub fn with_events(mut self, bus: EventBus, uuid: Uuid) -> Self {
        self.events = Some((bus, uuid));
        self
    }

    /// Returns the current health of this accessory.
    #[must_use]
    pub fn health(&self) -> BridgeHealth {
        self.tracker.lock().health
    }

    /// Returns the session manager backing this bridge.
    #[must_use]
    pub fn session_manager(&self) -> &SessionManager<T> {
        &self.sessions
    }

    /// Reads the device's full state.
    ///
    /// Performs a fresh query through a newly acquired session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::DeviceUnreachable` when the device does
    /// not respond (or the operation deadline expires), or
    /// `SessionError::AuthenticationFailed` when the handshake is
    /// rejected.
    pub async fn read(&self) -> Result<PlugState, SessionError> {
        let _guard = self.op_lock.lock().await;
        self.mark_operation_started();

        let result = self
            .with_deadline(async {
                let session = self.sessions.acquire().await?;
                session.get_state().await
            })
            .await;

        self.track_outcome(result)
    }

    /// Writes a single field to the device.
    ///
    /// Reads the current full state first, merges the changed field, and
    /// sends the full record back; returns the merged state once the
    /// device acknowledges.
    ///
    /// # Errors
    ///
    /// Same as [`Self::read`], plus `SessionError::Rejected` when the
    /// device refuses the write.
    pub async fn write(&self, update: FieldUpdate) -> Result<PlugState, SessionError> {
        let _guard = self.op_lock.lock().await;
        self.mark_operation_started();

        let result = self
            .with_deadline(async {
                let session = self.sessions.acquire().await?;
                let current = session.get_state().await?;
                let merged = current.with(update);
                session.set_state(&merged).await?;

                tracing::debug!(
                    hardware_id = %self.sessions.hardware_id(),
                    field = %update.field(),
                    "field written"
                );
                Ok(merged)
            })
            .await;

        self.track_outcome(result)
    }

    /// Runs an operation under the configured deadline, mapping expiry
    /// to `DeviceUnreachable`.
    async fn with_deadline(
        &self,
        op: impl Future<Output = Result<PlugState, SessionError>>,
    ) -> Result<PlugState, SessionError> {
        let timeout = self.config.operation_timeout();
        match tokio::time::timeout(timeout, op).await {
            Ok(result) => result,
            Err(_) => {
                let hardware_id = self.sessions.hardware_id();
                tracing::warn!(
                    %hardware_id,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "operation deadline expired"
                );
                Err(SessionError::DeviceUnreachable { hardware_id })
            }
        }
    }

    /// Moves a fresh accessory into `Discovering` on its first
    /// operation.
    fn mark_operation_started(&self) {
        let mut tracker = self.tracker.lock();
        if tracker.health == BridgeHealth::Unbound {
            tracker.health = BridgeHealth::Discovering;
            drop(tracker);
            self.publish_health(BridgeHealth::Discovering);
        }
    }

    /// Updates health bookkeeping from an operation outcome.
    fn track_outcome(
        &self,
        result: Result<PlugState, SessionError>,
    ) -> Result<PlugState, SessionError> {
        let transition = {
            let mut tracker = self.tracker.lock();
            let next = match &result {
                Ok(_) => {
                    tracker.consecutive_unreachable = 0;
                    BridgeHealth::Bound
                }
                Err(err) if err.is_unreachable() => {
                    tracker.consecutive_unreachable += 1;
                    if tracker.consecutive_unreachable >= self.config.unresponsive_after() {
                        BridgeHealth::Unresponsive
                    } else {
                        tracker.health
                    }
                }
                Err(err) if err.is_auth_failure() => BridgeHealth::Unresponsive,
                Err(_) => tracker.health,
            };

            if next == tracker.health {
                None
            } else {
                tracker.health = next;
                Some(next)
            }
        };

        if let Some(health) = transition {
            tracing::info!(
                hardware_id = %self.sessions.hardware_id(),
                ?health,
                "accessory health changed"
            );
            self.publish_health(health);
        }

        result
    }

    fn publish_health(&self, health: BridgeHealth) {
        if let Some((bus, uuid)) = &self.events {
            bus.publish(AccessoryEvent::HealthChanged {
                uuid: *uuid,
                health,
            });
        }
    }
}

impl<T: Transport> std::fmt::Debug for StateBridge<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateBridge")
            .field("hardware_id", &self.sessions.hardware_id())
            .field("health", &self.health())
            .finish_non_exhaustive()
    }
}
