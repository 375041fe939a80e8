// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session lifecycle for one physical device.
//!
//! A [`SessionManager`] owns the authenticated connection to a single
//! plug: acquire, re-acquire on failure, release (by dropping the
//! session). Sessions are not assumed long-lived — every operation
//! acquires a fresh one. The device's address can change between calls
//! (DHCP churn, reboots), so on an unreachable address the manager
//! re-resolves the device with a discovery probe restricted to its known
//! hardware identifier before authenticating again. This trades a little
//! latency per operation for robustness; see the crate docs before
//! replacing it with a persistent connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::SessionError;
use crate::protocol::{DiscoveredDevice, DiscoveryOptions, Transport};
use crate::types::HardwareId;

/// Backoff policy applied between authentication attempts.
///
/// After a rejected handshake the manager waits before the next attempt
/// instead of hammering the device. Delays grow exponentially up to a
/// cap; a successful acquisition resets the sequence.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use plugbridge::session::RetryPolicy;
///
/// let policy = RetryPolicy::new()
///     .with_initial_delay(Duration::from_millis(500))
///     .with_max_delay(Duration::from_secs(30));
///
/// assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(500));
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts before giving up (None = unlimited).
    max_attempts: Option<u32>,
    /// Delay before the first retry.
    initial_delay: Duration,
    /// Cap on the delay between retries.
    max_delay: Duration,
    /// Multiplier for exponential backoff.
    backoff_multiplier: f32,
}

impl RetryPolicy {
    /// Creates a policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the cap on the delay between retries.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay for a given retry attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay.min(self.max_delay);
        }

        let multiplier = self
            .backoff_multiplier
            .powi(i32::try_from(attempt).unwrap_or(i32::MAX));

        // Safe: initial_delay is seconds/minutes in practice
        #[allow(clippy::cast_precision_loss)]
        let delay_ms = self.initial_delay.as_millis() as f32 * multiplier;

        // Safe: delay_ms is positive and within practical bounds
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay = Duration::from_millis(delay_ms as u64);

        delay.min(self.max_delay)
    }

    /// Returns `true` if another attempt should be made.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

/// Owns the session lifecycle for one physical device.
///
/// The manager tracks the device's last known whereabouts and hands out
/// a freshly authenticated session per operation. It is the only holder
/// of sessions for its device; callers release a session by dropping it.
#[derive(Debug)]
pub struct SessionManager<T: Transport> {
    transport: Arc<T>,
    /// Current device descriptor; the address is refreshed on
    /// re-resolution.
    device: Mutex<DiscoveredDevice>,
    /// Options for the targeted re-resolution probe.
    rediscovery: DiscoveryOptions,
    retry: RetryPolicy,
    /// Consecutive rejected handshakes since the last success.
    auth_failures: AtomicU32,
}

impl<T: Transport> SessionManager<T> {
    /// Creates a manager for a discovered device.
    ///
    /// `rediscovery` is used when the cached address stops responding:
    /// a probe with these options re-resolves the device by hardware
    /// identifier.
    #[must_use]
    pub fn new(transport: Arc<T>, device: DiscoveredDevice, rediscovery: DiscoveryOptions) -> Self {
        Self {
            transport,
            device: Mutex::new(device),
            rediscovery,
            retry: RetryPolicy::default(),
            auth_failures: AtomicU32::new(0),
        }
    }

    /// Sets the backoff policy for rejected handshakes.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Returns the hardware identifier of the managed device.
    #[must_use]
    pub fn hardware_id(&self) -> HardwareId {
        self.device.lock().hardware_id
    }

    /// Returns the device's last known address.
    #[must_use]
    pub fn cached_address(&self) -> std::net::SocketAddr {
        self.device.lock().address
    }

    /// Updates the cached address.
    ///
    /// Called when a discovery pass elsewhere observed the device at a
    /// new address, saving the next operation a failed attempt at the
    /// stale one.
    pub fn set_address(&self, address: std::net::SocketAddr) {
        let mut device = self.device.lock();
        if device.address != address {
            tracing::debug!(
                hardware_id = %device.hardware_id,
                old = %device.address,
                new = %address,
                "cached address updated"
            );
            device.address = address;
        }
    }

    /// Acquires an authenticated session.
    ///
    /// Authenticates at the cached address; if that address does not
    /// respond, re-resolves the device with a targeted discovery probe
    /// and authenticates once more at its new address.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::DeviceUnreachable` when the device cannot
    /// be found at any address, or `SessionError::AuthenticationFailed`
    /// when the handshake is rejected (after which a backoff delay gates
    /// the next attempt).
    pub async fn acquire(&self) -> Result<T::Session, SessionError> {
        self.backoff_gate().await?;

        let device = self.device.lock().clone();
        match self.transport.authenticate(&device).await {
            Ok(session) => {
                self.auth_failures.store(0, Ordering::Relaxed);
                Ok(session)
            }
            Err(err) if err.is_unreachable() => self.reacquire().await,
            Err(err) => {
                self.note_auth_outcome(&err);
                Err(err)
            }
        }
    }

    /// Re-resolves the device's address and authenticates there.
    async fn reacquire(&self) -> Result<T::Session, SessionError> {
        let hardware_id = self.hardware_id();
        tracing::debug!(%hardware_id, "cached address unresponsive, re-resolving device");

        let devices = self
            .transport
            .discover(&self.rediscovery)
            .await
            .map_err(|err| {
                tracing::warn!(%hardware_id, error = %err, "re-resolution probe failed");
                SessionError::DeviceUnreachable { hardware_id }
            })?;

        let Some(found) = devices.into_iter().find(|d| d.hardware_id == hardware_id) else {
            return Err(SessionError::DeviceUnreachable { hardware_id });
        };

        tracing::info!(%hardware_id, address = %found.address, "device re-resolved");
        {
            let mut device = self.device.lock();
            device.address = found.address;
        }

        match self.transport.authenticate(&found).await {
            Ok(session) => {
                self.auth_failures.store(0, Ordering::Relaxed);
                Ok(session)
            }
            Err(err) => {
                self.note_auth_outcome(&err);
                Err(err)
            }
        }
    }

    /// Applies the backoff delay owed from previous rejected handshakes.
    async fn backoff_gate(&self) -> Result<(), SessionError> {
        let failures = self.auth_failures.load(Ordering::Relaxed);
        if failures == 0 {
            return Ok(());
        }

        if !self.retry.should_retry(failures) {
            return Err(SessionError::AuthenticationFailed {
                hardware_id: self.hardware_id(),
            });
        }

        let delay = self.retry.delay_for_attempt(failures - 1);
        tracing::debug!(
            hardware_id = %self.hardware_id(),
            failures,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "backing off before next authentication attempt"
        );
        tokio::time::sleep(delay).await;
        Ok(())
    }

    fn note_auth_outcome(&self, err: &SessionError) {
        if err.is_auth_failure() {
            let failures = self.auth_failures.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(
                hardware_id = %self.hardware_id(),
                failures,
                "authentication rejected"
            );
        }
    }
}
