// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests driving the platform against a scriptable
//! in-memory transport.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use plugbridge::config::{PlatformConfig, StaticPlugConfig};
use plugbridge::error::{DiscoveryError, Error, SessionError};
use plugbridge::platform::{
    AccessoryHost, Characteristic, CharacteristicError, Platform, PlugAccessory,
};
use plugbridge::protocol::{
    DeviceSession, DiscoveredDevice, DiscoveryOptions, Transport,
};
use plugbridge::registry::{AccessoryRecord, accessory_uuid};
use plugbridge::state::{FieldValue, PlugState};
use plugbridge::types::{Brightness, DeviceKind, HardwareId};
use plugbridge::{AccessoryEvent, BridgeConfig, BridgeHealth};
use uuid::Uuid;

// ============================================================================
// Fake transport
// ============================================================================

#[derive(Debug, Default)]
struct FakeNet {
    devices: Vec<FakeDevice>,
    discover_calls: u32,
    fail_discovery_with_timeout: bool,
}

#[derive(Debug)]
struct FakeDevice {
    descriptor: DiscoveredDevice,
    state: PlugState,
    reachable: bool,
    reject_auth: bool,
    auth_attempts: u32,
    response_delay: Option<Duration>,
    op_log: Vec<&'static str>,
}

/// Scriptable stand-in for the vendor library.
#[derive(Debug, Clone, Default)]
struct FakeTransport {
    net: Arc<Mutex<FakeNet>>,
}

impl FakeTransport {
    fn new() -> Self {
        Self::default()
    }

    fn add_plug(&self, hardware_id: &str, address: &str, kind: DeviceKind) -> DiscoveredDevice {
        let descriptor = DiscoveredDevice {
            address: address.parse().unwrap(),
            hardware_id: hardware_id.parse().unwrap(),
            kind,
            name: format!("Plug {hardware_id}"),
            manufacturer: "Acme".to_string(),
            model: "SP4B-EU".to_string(),
        };
        self.net.lock().unwrap().devices.push(FakeDevice {
            descriptor: descriptor.clone(),
            state: initial_state(),
            reachable: true,
            reject_auth: false,
            auth_attempts: 0,
            response_delay: None,
            op_log: Vec::new(),
        });
        descriptor
    }

    fn with_device<R>(&self, hardware_id: HardwareId, f: impl FnOnce(&mut FakeDevice) -> R) -> R {
        let mut net = self.net.lock().unwrap();
        let device = net
            .devices
            .iter_mut()
            .find(|d| d.descriptor.hardware_id == hardware_id)
            .expect("unknown fake device");
        f(device)
    }

    fn move_to(&self, hardware_id: HardwareId, address: &str) {
        let address: SocketAddr = address.parse().unwrap();
        self.with_device(hardware_id, |d| d.descriptor.address = address);
    }

    fn set_reachable(&self, hardware_id: HardwareId, reachable: bool) {
        self.with_device(hardware_id, |d| d.reachable = reachable);
    }

    fn set_reject_auth(&self, hardware_id: HardwareId, reject: bool) {
        self.with_device(hardware_id, |d| d.reject_auth = reject);
    }

    fn set_response_delay(&self, hardware_id: HardwareId, delay: Option<Duration>) {
        self.with_device(hardware_id, |d| d.response_delay = delay);
    }

    fn fail_discovery_with_timeout(&self, fail: bool) {
        self.net.lock().unwrap().fail_discovery_with_timeout = fail;
    }

    fn state_of(&self, hardware_id: HardwareId) -> PlugState {
        self.with_device(hardware_id, |d| d.state)
    }

    fn op_log(&self, hardware_id: HardwareId) -> Vec<&'static str> {
        self.with_device(hardware_id, |d| d.op_log.clone())
    }

    fn auth_attempts(&self, hardware_id: HardwareId) -> u32 {
        self.with_device(hardware_id, |d| d.auth_attempts)
    }

    fn discover_calls(&self) -> u32 {
        self.net.lock().unwrap().discover_calls
    }
}

impl Transport for FakeTransport {
    type Session = FakeSession;

    async fn discover(
        &self,
        options: &DiscoveryOptions,
    ) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        let mut net = self.net.lock().unwrap();
        net.discover_calls += 1;

        if net.fail_discovery_with_timeout {
            return Err(DiscoveryError::Timeout(
                u64::try_from(options.timeout().as_millis()).unwrap(),
            ));
        }

        let broadcast = options.broadcast_address();
        let everyone = broadcast == "255.255.255.255".parse::<IpAddr>().unwrap();

        Ok(net
            .devices
            .iter()
            .filter(|d| d.reachable)
            .filter(|d| everyone || d.descriptor.address.ip() == broadcast)
            .map(|d| d.descriptor.clone())
            .collect())
    }

    async fn authenticate(
        &self,
        device: &DiscoveredDevice,
    ) -> Result<Self::Session, SessionError> {
        let mut net = self.net.lock().unwrap();
        let Some(found) = net
            .devices
            .iter_mut()
            .find(|d| d.descriptor.hardware_id == device.hardware_id)
        else {
            return Err(SessionError::DeviceUnreachable {
                hardware_id: device.hardware_id,
            });
        };

        found.auth_attempts += 1;

        // A stale address means the handshake packets go nowhere.
        if !found.reachable || found.descriptor.address != device.address {
            return Err(SessionError::DeviceUnreachable {
                hardware_id: device.hardware_id,
            });
        }
        if found.reject_auth {
            return Err(SessionError::AuthenticationFailed {
                hardware_id: device.hardware_id,
            });
        }

        Ok(FakeSession {
            net: self.net.clone(),
            hardware_id: device.hardware_id,
        })
    }
}

struct FakeSession {
    net: Arc<Mutex<FakeNet>>,
    hardware_id: HardwareId,
}

impl FakeSession {
    fn with_device<R>(&self, f: impl FnOnce(&mut FakeDevice) -> R) -> R {
        let mut net = self.net.lock().unwrap();
        let device = net
            .devices
            .iter_mut()
            .find(|d| d.descriptor.hardware_id == self.hardware_id)
            .expect("unknown fake device");
        f(device)
    }
}

impl DeviceSession for FakeSession {
    async fn get_state(&self) -> Result<PlugState, SessionError> {
        let (reachable, delay, state) = self.with_device(|d| {
            d.op_log.push("get");
            (d.reachable, d.response_delay, d.state)
        });

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if !reachable {
            return Err(SessionError::DeviceUnreachable {
                hardware_id: self.hardware_id,
            });
        }
        Ok(state)
    }

    async fn set_state(&self, state: &PlugState) -> Result<(), SessionError> {
        let reachable = self.with_device(|d| {
            if d.reachable {
                d.op_log.push("set");
                d.state = *state;
            }
            d.reachable
        });

        if !reachable {
            return Err(SessionError::DeviceUnreachable {
                hardware_id: self.hardware_id,
            });
        }
        Ok(())
    }
}

fn initial_state() -> PlugState {
    PlugState {
        power: false,
        nightlight: true,
        indicator: true,
        nightlight_brightness: Brightness::new(40).unwrap(),
        max_work_time: 0,
        child_lock: false,
    }
}

// ============================================================================
// Recording host
// ============================================================================

#[derive(Debug, Default)]
struct RecordingHost {
    registrations: Mutex<Vec<(Uuid, String, serde_json::Value)>>,
    context_updates: Mutex<Vec<(Uuid, serde_json::Value)>>,
}

impl RecordingHost {
    fn registration_count(&self) -> usize {
        self.registrations.lock().unwrap().len()
    }

    fn context_update_count(&self) -> usize {
        self.context_updates.lock().unwrap().len()
    }
}

/// Shareable host handle. The orphan rule forbids implementing the
/// crate's `AccessoryHost` trait directly on `Arc<RecordingHost>` from
/// this external test crate, so the shared `Arc` is wrapped in a local
/// newtype that carries the impl.
#[derive(Debug, Clone)]
struct SharedHost(Arc<RecordingHost>);

impl AccessoryHost for SharedHost {
    fn register_accessory(&self, record: &AccessoryRecord, context: &serde_json::Value) {
        self.0.registrations.lock().unwrap().push((
            record.uuid,
            record.display_name.clone(),
            context.clone(),
        ));
    }

    fn update_context(&self, uuid: Uuid, context: &serde_json::Value) {
        self.0
            .context_updates
            .lock()
            .unwrap()
            .push((uuid, context.clone()));
    }
}

fn platform_config() -> PlatformConfig {
    PlatformConfig::from_value(serde_json::json!({ "name": "Smart Plugs" })).unwrap()
}

fn build_platform(
    transport: &FakeTransport,
) -> (Platform<FakeTransport, SharedHost>, Arc<RecordingHost>) {
    let host = Arc::new(RecordingHost::default());
    let platform =
        Platform::new(transport.clone(), SharedHost(host.clone()), platform_config()).unwrap();
    (platform, host)
}

// ============================================================================
// Identity and registration
// ============================================================================

#[tokio::test]
async fn discovered_plug_is_registered_once() {
    let transport = FakeTransport::new();
    let descriptor = transport.add_plug("a4:3b:0c:5d:2e:f1", "192.168.1.40:80", DeviceKind::Sp4b);
    let (platform, host) = build_platform(&transport);

    platform.start().await.unwrap();
    platform.start().await.unwrap();

    assert_eq!(host.registration_count(), 1);
    let expected = accessory_uuid(&descriptor.hardware_id);
    assert!(platform.accessory(expected).is_some());
}

#[tokio::test]
async fn same_device_resolves_to_same_uuid_across_passes() {
    let transport = FakeTransport::new();
    let descriptor = transport.add_plug("a4:3b:0c:5d:2e:f1", "192.168.1.40:80", DeviceKind::Sp4b);
    let (platform, host) = build_platform(&transport);

    platform.start().await.unwrap();
    let first = host.registrations.lock().unwrap()[0].0;

    platform.start().await.unwrap();

    assert_eq!(first, accessory_uuid(&descriptor.hardware_id));
    assert_eq!(host.registration_count(), 1);
    assert_eq!(platform.registry().len(), 1);
}

#[tokio::test]
async fn unsupported_device_kind_is_skipped() {
    let transport = FakeTransport::new();
    transport.add_plug(
        "a4:3b:0c:5d:2e:f1",
        "192.168.1.40:80",
        DeviceKind::Unsupported("rm4pro".to_string()),
    );
    let (platform, host) = build_platform(&transport);

    platform.start().await.unwrap();

    assert_eq!(host.registration_count(), 0);
    assert!(platform.accessories().is_empty());
}

#[tokio::test]
async fn registration_emits_event() {
    let transport = FakeTransport::new();
    let descriptor = transport.add_plug("a4:3b:0c:5d:2e:f1", "192.168.1.40:80", DeviceKind::Sp4b);
    let (platform, _host) = build_platform(&transport);
    let mut events = platform.subscribe();

    platform.start().await.unwrap();

    let event = events.recv().await.unwrap();
    assert_eq!(
        event,
        AccessoryEvent::Registered {
            uuid: accessory_uuid(&descriptor.hardware_id),
            display_name: descriptor.name.clone(),
        }
    );
}

// ============================================================================
// Discovery edge cases
// ============================================================================

#[tokio::test]
async fn empty_segment_yields_empty_result_not_error() {
    let transport = FakeTransport::new();
    let (platform, host) = build_platform(&transport);

    platform.start().await.unwrap();

    assert_eq!(host.registration_count(), 0);
    assert!(platform.accessories().is_empty());
}

#[tokio::test]
async fn discovery_timeout_is_not_fatal() {
    let transport = FakeTransport::new();
    transport.fail_discovery_with_timeout(true);
    let (platform, host) = build_platform(&transport);

    platform.start().await.unwrap();
    assert_eq!(host.registration_count(), 0);

    // The next trigger simply retries.
    transport.fail_discovery_with_timeout(false);
    transport.add_plug("a4:3b:0c:5d:2e:f1", "192.168.1.40:80", DeviceKind::Sp4b);
    platform.start().await.unwrap();
    assert_eq!(host.registration_count(), 1);
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn missing_name_fails_before_any_network_call() {
    let transport = FakeTransport::new();
    let host = Arc::new(RecordingHost::default());

    let config: PlatformConfig = serde_json::from_value(serde_json::json!({})).unwrap();
    let result = Platform::new(transport.clone(), SharedHost(host), config);

    assert!(result.is_err());
    assert_eq!(transport.discover_calls(), 0);
}

#[tokio::test]
async fn static_plug_missing_ip_fails_before_any_network_call() {
    let transport = Arc::new(FakeTransport::new());

    let config: StaticPlugConfig =
        serde_json::from_value(serde_json::json!({ "name": "Heater" })).unwrap();
    let result = PlugAccessory::from_static(transport.clone(), &config).await;

    assert!(matches!(result, Err(Error::Config(_))));
    assert_eq!(transport.discover_calls(), 0);
}

#[tokio::test]
async fn static_plug_binds_at_fixed_address() {
    let transport = Arc::new(FakeTransport::new());
    transport.add_plug("a4:3b:0c:5d:2e:f1", "192.168.1.5:80", DeviceKind::Sp4b);
    // Another device on the segment must not be picked up.
    transport.add_plug("a4:3b:0c:5d:2e:f2", "192.168.1.6:80", DeviceKind::Sp4b);

    let config = StaticPlugConfig::from_value(serde_json::json!({
        "name": "Heater",
        "ip": "192.168.1.5",
    }))
    .unwrap();

    let accessory = PlugAccessory::from_static(transport.clone(), &config)
        .await
        .unwrap();

    assert_eq!(accessory.record().display_name, "Heater");
    assert_eq!(
        accessory.record().cached_address.to_string(),
        "192.168.1.5:80"
    );
    assert_eq!(accessory.info().serial_number, "a4:3b:0c:5d:2e:f1");
    assert!(accessory.supports(Characteristic::NightLight));

    let value = accessory.handle_get(Characteristic::On).await.unwrap();
    assert_eq!(value, FieldValue::Bool(false));
}

#[tokio::test]
async fn static_plug_with_no_device_at_address_fails() {
    let transport = Arc::new(FakeTransport::new());
    transport.add_plug("a4:3b:0c:5d:2e:f1", "192.168.1.5:80", DeviceKind::Sp4b);

    let config = StaticPlugConfig::from_value(serde_json::json!({
        "name": "Heater",
        "ip": "192.168.1.99",
    }))
    .unwrap();

    let result = PlugAccessory::from_static(transport, &config).await;
    assert!(matches!(
        result,
        Err(Error::Discovery(DiscoveryError::NoDeviceAt(_)))
    ));
}

// ============================================================================
// State merge semantics
// ============================================================================

#[tokio::test]
async fn set_merges_against_fresh_state_without_resetting_other_fields() {
    let transport = FakeTransport::new();
    let descriptor = transport.add_plug("a4:3b:0c:5d:2e:f1", "192.168.1.40:80", DeviceKind::Sp4b);
    let (platform, _host) = build_platform(&transport);
    platform.start().await.unwrap();

    let accessory = platform
        .accessory(accessory_uuid(&descriptor.hardware_id))
        .unwrap();

    accessory
        .handle_set(Characteristic::On, FieldValue::Bool(true))
        .await
        .unwrap();

    let written = transport.state_of(descriptor.hardware_id);
    assert!(written.power);
    // Every other field keeps its pre-write value.
    assert!(written.nightlight);
    assert!(written.indicator);
    assert_eq!(written.nightlight_brightness.value(), 40);
    assert_eq!(written.max_work_time, 0);
    assert!(!written.child_lock);

    // Read-back observes the write, on the characteristic surface and
    // on the full state.
    let value = accessory.handle_get(Characteristic::On).await.unwrap();
    assert_eq!(value, FieldValue::Bool(true));

    let state = accessory.bridge().read().await.unwrap();
    assert!(state.power);
    assert!(state.nightlight);
}

#[tokio::test]
async fn set_rejects_invalid_value_without_touching_device() {
    let transport = FakeTransport::new();
    let descriptor = transport.add_plug("a4:3b:0c:5d:2e:f1", "192.168.1.40:80", DeviceKind::Sp4b);
    let (platform, _host) = build_platform(&transport);
    platform.start().await.unwrap();

    let accessory = platform
        .accessory(accessory_uuid(&descriptor.hardware_id))
        .unwrap();

    let result = accessory
        .handle_set(Characteristic::NightLightBrightness, FieldValue::Number(130))
        .await;

    assert!(matches!(result, Err(CharacteristicError::InvalidValue(_))));
    assert!(transport.op_log(descriptor.hardware_id).is_empty());
}

#[tokio::test]
async fn basic_plug_rejects_nightlight_characteristic() {
    let transport = FakeTransport::new();
    let descriptor = transport.add_plug("a4:3b:0c:5d:2e:f1", "192.168.1.40:80", DeviceKind::SpMini);
    let (platform, _host) = build_platform(&transport);
    platform.start().await.unwrap();

    let accessory = platform
        .accessory(accessory_uuid(&descriptor.hardware_id))
        .unwrap();

    let result = accessory.handle_get(Characteristic::NightLight).await;
    assert!(matches!(result, Err(CharacteristicError::Unsupported(_))));
}

// ============================================================================
// Serialization of same-accessory operations
// ============================================================================

#[tokio::test(start_paused = true)]
async fn concurrent_writes_on_one_accessory_never_interleave() {
    let transport = FakeTransport::new();
    let descriptor = transport.add_plug("a4:3b:0c:5d:2e:f1", "192.168.1.40:80", DeviceKind::Sp4b);
    let (platform, _host) = build_platform(&transport);
    platform.start().await.unwrap();

    let accessory = platform
        .accessory(accessory_uuid(&descriptor.hardware_id))
        .unwrap();

    // Slow reads widen the window in which an unserialized write pair
    // would both read before either writes.
    transport.set_response_delay(descriptor.hardware_id, Some(Duration::from_millis(50)));

    let a = {
        let accessory = accessory.clone();
        tokio::spawn(async move {
            accessory
                .handle_set(Characteristic::On, FieldValue::Bool(true))
                .await
        })
    };
    let b = {
        let accessory = accessory.clone();
        tokio::spawn(async move {
            accessory
                .handle_set(Characteristic::NightLight, FieldValue::Bool(false))
                .await
        })
    };

    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    // Each write completes its read-merge-write before the next starts.
    assert_eq!(
        transport.op_log(descriptor.hardware_id),
        vec!["get", "set", "get", "set"]
    );

    // Neither update was lost to a stale merge.
    let written = transport.state_of(descriptor.hardware_id);
    assert!(written.power);
    assert!(!written.nightlight);
}

// ============================================================================
// Address churn
// ============================================================================

#[tokio::test]
async fn rediscovery_after_address_change_updates_cache_without_new_registration() {
    let transport = FakeTransport::new();
    let descriptor = transport.add_plug("a4:3b:0c:5d:2e:f1", "192.168.1.40:80", DeviceKind::Sp4b);
    let (platform, host) = build_platform(&transport);
    let mut events = platform.subscribe();

    platform.start().await.unwrap();
    let uuid = accessory_uuid(&descriptor.hardware_id);

    // New DHCP lease between passes.
    transport.move_to(descriptor.hardware_id, "192.168.1.77:80");
    platform.start().await.unwrap();

    assert_eq!(host.registration_count(), 1);
    assert_eq!(host.context_update_count(), 1);

    let record = platform.registry().get(uuid).unwrap();
    assert_eq!(record.uuid, uuid);
    assert_eq!(record.cached_address.to_string(), "192.168.1.77:80");

    // Registered, then AddressChanged.
    assert!(events.recv().await.unwrap().is_lifecycle());
    assert_eq!(
        events.recv().await.unwrap(),
        AccessoryEvent::AddressChanged {
            uuid,
            address: "192.168.1.77:80".parse().unwrap(),
        }
    );
}

#[tokio::test]
async fn stale_address_triggers_targeted_reacquire() {
    let transport = FakeTransport::new();
    let descriptor = transport.add_plug("a4:3b:0c:5d:2e:f1", "192.168.1.40:80", DeviceKind::Sp4b);
    let (platform, _host) = build_platform(&transport);
    platform.start().await.unwrap();

    let accessory = platform
        .accessory(accessory_uuid(&descriptor.hardware_id))
        .unwrap();

    // The device moves without a discovery pass noticing.
    transport.move_to(descriptor.hardware_id, "192.168.1.77:80");

    // The operation re-resolves the device by hardware id and succeeds.
    let value = accessory.handle_get(Characteristic::On).await.unwrap();
    assert_eq!(value, FieldValue::Bool(false));

    // One failed handshake at the stale address, one good one after
    // re-resolution.
    assert_eq!(transport.auth_attempts(descriptor.hardware_id), 2);

    // The session layer remembers where the device went.
    assert_eq!(
        accessory
            .bridge()
            .session_manager()
            .cached_address()
            .to_string(),
        "192.168.1.77:80"
    );
}

#[tokio::test]
async fn restored_accessory_is_matched_not_reregistered() {
    let transport = FakeTransport::new();
    let descriptor = transport.add_plug("a4:3b:0c:5d:2e:f1", "192.168.1.40:80", DeviceKind::Sp4b);
    let (platform, host) = build_platform(&transport);

    // The host replays the cached accessory before discovery runs,
    // with the address the device had last time the process ran.
    let context = serde_json::json!({
        "hardware_id": "a4:3b:0c:5d:2e:f1",
        "kind": "sp4b",
        "last_address": "192.168.1.12:80",
    });
    assert!(platform.restore_accessory("Bedroom plug", &context));

    platform.start().await.unwrap();

    // Matched by uuid: no new registration, address refreshed.
    assert_eq!(host.registration_count(), 0);
    assert_eq!(host.context_update_count(), 1);

    let record = platform
        .registry()
        .get(accessory_uuid(&descriptor.hardware_id))
        .unwrap();
    assert_eq!(record.display_name, "Bedroom plug");
    assert_eq!(record.cached_address.to_string(), "192.168.1.40:80");
}

#[tokio::test]
async fn foreign_context_blob_is_skipped_on_restore() {
    let transport = FakeTransport::new();
    let (platform, _host) = build_platform(&transport);

    let context = serde_json::json!({ "host": "192.168.1.40" });
    assert!(!platform.restore_accessory("Mystery", &context));
    assert!(platform.registry().is_empty());
}

// ============================================================================
// Failure handling and health
// ============================================================================

#[tokio::test(start_paused = true)]
async fn operation_timeout_maps_to_not_responding() {
    let transport = FakeTransport::new();
    let descriptor = transport.add_plug("a4:3b:0c:5d:2e:f1", "192.168.1.40:80", DeviceKind::Sp4b);
    let host = Arc::new(RecordingHost::default());
    let platform = Platform::new(transport.clone(), SharedHost(host), platform_config())
        .unwrap()
        .with_bridge_config(
            BridgeConfig::new().with_operation_timeout(Duration::from_secs(2)),
        );
    platform.start().await.unwrap();

    let accessory = platform
        .accessory(accessory_uuid(&descriptor.hardware_id))
        .unwrap();

    // The device answers far too late.
    transport.set_response_delay(descriptor.hardware_id, Some(Duration::from_secs(60)));

    let result = accessory.handle_get(Characteristic::On).await;
    assert!(matches!(result, Err(CharacteristicError::NotResponding)));
}

#[tokio::test]
async fn repeated_unreachable_flips_unresponsive_without_deregistration() {
    let transport = FakeTransport::new();
    let descriptor = transport.add_plug("a4:3b:0c:5d:2e:f1", "192.168.1.40:80", DeviceKind::Sp4b);
    let (platform, _host) = build_platform(&transport);
    platform.start().await.unwrap();

    let uuid = accessory_uuid(&descriptor.hardware_id);
    let accessory = platform.accessory(uuid).unwrap();
    let mut events = platform.subscribe();

    transport.set_reachable(descriptor.hardware_id, false);

    for _ in 0..3 {
        let result = accessory.handle_get(Characteristic::On).await;
        assert!(matches!(result, Err(CharacteristicError::NotResponding)));
    }
    assert_eq!(accessory.health(), BridgeHealth::Unresponsive);

    // Reported, never de-registered: removal is an operator action.
    assert!(platform.registry().get(uuid).is_some());
    assert!(platform.accessory(uuid).is_some());

    let health_events: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .filter(AccessoryEvent::is_health)
        .collect();
    assert!(health_events.contains(&AccessoryEvent::HealthChanged {
        uuid,
        health: BridgeHealth::Unresponsive,
    }));

    // The device coming back heals the accessory on the next operation.
    transport.set_reachable(descriptor.hardware_id, true);
    accessory.handle_get(Characteristic::On).await.unwrap();
    assert_eq!(accessory.health(), BridgeHealth::Bound);
}

#[tokio::test(start_paused = true)]
async fn auth_rejection_marks_unresponsive_and_backs_off() {
    let transport = FakeTransport::new();
    let descriptor = transport.add_plug("a4:3b:0c:5d:2e:f1", "192.168.1.40:80", DeviceKind::Sp4b);
    let (platform, _host) = build_platform(&transport);
    platform.start().await.unwrap();

    let accessory = platform
        .accessory(accessory_uuid(&descriptor.hardware_id))
        .unwrap();

    transport.set_reject_auth(descriptor.hardware_id, true);

    let result = accessory.handle_get(Characteristic::On).await;
    assert!(matches!(result, Err(CharacteristicError::NotResponding)));
    assert_eq!(accessory.health(), BridgeHealth::Unresponsive);

    // One handshake per operation: a rejection is not retried in a loop.
    assert_eq!(transport.auth_attempts(descriptor.hardware_id), 1);

    // The next operation waits out the backoff, then tries exactly once
    // more.
    let result = accessory.handle_get(Characteristic::On).await;
    assert!(matches!(result, Err(CharacteristicError::NotResponding)));
    assert_eq!(transport.auth_attempts(descriptor.hardware_id), 2);

    // Acceptance resets the failure streak.
    transport.set_reject_auth(descriptor.hardware_id, false);
    accessory.handle_get(Characteristic::On).await.unwrap();
    assert_eq!(accessory.health(), BridgeHealth::Bound);
}
