// ── Device inventory hub ──
//
// One hub per (network, device class). Owns discovery of that slice of
// the fleet and its class-specific telemetry. Discovery replaces the
// device list wholesale; telemetry merges per serial so a single
// device's failure leaves only that slot absent.
//
// Discovery is self-rate-limited: an in-flight flag plus a minimum
// interval between completed passes protect against pathological
// re-entry from multiple timers, independent of the shared RateLimiter.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::{ArcSwap, ArcSwapOption};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::batch::run_batched;
use crate::cache::{ResponseCache, TtlTier};
use crate::call::ApiCall;
use crate::error::CoreError;
use crate::limiter::priority;
use crate::model::{
    sensor_capabilities_for_model, sensor_capabilities_from_readings, Device, DeviceClass,
    DeviceTelemetry, Network, SensorCapability, TelemetryKind,
};
use crate::retry::{run_with_retry, RetryStrategy};

use super::SharedResources;

/// Hub lifecycle, observable via `state()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubState {
    Uninitialized,
    Discovering,
    Ready,
    Refreshing,
    Unloaded,
}

/// What a `discover()` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// A fresh device snapshot was applied.
    Completed { devices: usize },
    /// Another discovery was in flight or the minimum interval had not
    /// elapsed; no underlying call was issued.
    Skipped,
}

/// Per-refresh accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetrySummary {
    /// Metrics fetched from the dashboard this pass.
    pub fetched: usize,
    /// Metrics served from the response cache.
    pub cache_hits: usize,
    /// Devices skipped because the status feed says they are down.
    pub skipped_offline: usize,
    /// Metric fetches that failed and were left absent.
    pub failed: usize,
}

pub struct DeviceInventoryHub {
    network: Network,
    class: DeviceClass,
    shared: Arc<SharedResources>,
    devices: ArcSwap<Vec<Arc<Device>>>,
    telemetry: DashMap<String, DeviceTelemetry>,
    capabilities: DashMap<String, BTreeSet<SensorCapability>>,
    /// Network-level class config (SSIDs for wireless hubs).
    network_config: ArcSwapOption<Value>,
    state: watch::Sender<HubState>,
    discovering: AtomicBool,
    last_discovery: Mutex<Option<Instant>>,
    telemetry_failures: AtomicU64,
}

impl DeviceInventoryHub {
    pub fn new(network: Network, class: DeviceClass, shared: Arc<SharedResources>) -> Arc<Self> {
        let (state, _) = watch::channel(HubState::Uninitialized);
        Arc::new(Self {
            network,
            class,
            shared,
            devices: ArcSwap::from_pointee(Vec::new()),
            telemetry: DashMap::new(),
            capabilities: DashMap::new(),
            network_config: ArcSwapOption::empty(),
            state,
            discovering: AtomicBool::new(false),
            last_discovery: Mutex::new(None),
            telemetry_failures: AtomicU64::new(0),
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn class(&self) -> DeviceClass {
        self.class
    }

    /// The most recent full discovery snapshot.
    pub fn devices(&self) -> Arc<Vec<Arc<Device>>> {
        self.devices.load_full()
    }

    pub fn device_count(&self) -> usize {
        self.devices.load().len()
    }

    pub fn telemetry(&self, serial: &str) -> Option<DeviceTelemetry> {
        self.telemetry.get(serial).map(|t| t.clone())
    }

    /// Resolved capability set for a sensor serial.
    pub fn capabilities(&self, serial: &str) -> Option<BTreeSet<SensorCapability>> {
        self.capabilities.get(serial).map(|c| c.clone())
    }

    /// Network-level class configuration (SSIDs for wireless hubs).
    pub fn network_config(&self) -> Option<Arc<Value>> {
        self.network_config.load_full()
    }

    pub fn state(&self) -> HubState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<HubState> {
        self.state.subscribe()
    }

    pub fn telemetry_failures(&self) -> u64 {
        self.telemetry_failures.load(Ordering::Relaxed)
    }

    // ── Discovery ────────────────────────────────────────────────────

    /// Seed the hub from an already-fetched inventory listing.
    ///
    /// Counts as a completed discovery: the snapshot is replaced and
    /// the minimum-interval clock starts.
    pub(crate) fn seed_devices(&self, devices: Vec<Device>) {
        self.apply_snapshot(devices.into_iter().map(Arc::new).collect());
        *self
            .last_discovery
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        self.state.send_replace(HubState::Ready);
    }

    /// List this network's devices and replace the snapshot.
    ///
    /// A no-op if a discovery is already in flight or the previous one
    /// completed less than `min_discovery_interval` ago.
    pub async fn discover(&self) -> Result<DiscoveryOutcome, CoreError> {
        if !self.begin_discovery() {
            return Ok(DiscoveryOutcome::Skipped);
        }

        self.state.send_replace(HubState::Discovering);
        let result = self.discover_inner().await;
        self.discovering.store(false, Ordering::Release);
        self.state.send_replace(HubState::Ready);

        match result {
            Ok(count) => {
                *self
                    .last_discovery
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
                info!(
                    network = %self.network.id,
                    class = %self.class,
                    devices = count,
                    "discovery complete"
                );
                Ok(DiscoveryOutcome::Completed { devices: count })
            }
            // Previous snapshot stays in place; the next timer tick
            // retries because only completed passes arm the interval.
            Err(err) => Err(err),
        }
    }

    fn begin_discovery(&self) -> bool {
        let recent = self
            .last_discovery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some_and(|last| last.elapsed() < self.shared.config.min_discovery_interval);
        if recent {
            debug!(
                network = %self.network.id,
                class = %self.class,
                "skipping discovery inside minimum interval"
            );
            return false;
        }

        if self.discovering.swap(true, Ordering::AcqRel) {
            debug!(
                network = %self.network.id,
                class = %self.class,
                "discovery already in flight"
            );
            return false;
        }
        true
    }

    async fn discover_inner(&self) -> Result<usize, CoreError> {
        let fetch = {
            let client = Arc::clone(&self.shared.client);
            let network_id = self.network.id.clone();
            move || {
                let client = Arc::clone(&client);
                let network_id = network_id.clone();
                async move {
                    client
                        .list_network_devices(&network_id)
                        .await
                        .map_err(CoreError::from)
                }
            }
        };

        let infos = run_with_retry("list_network_devices", &RetryStrategy::discovery(), || {
            self.shared
                .limiter
                .submit(priority::DISCOVERY, fetch.clone())
        })
        .await?;

        let devices: Vec<Arc<Device>> = infos
            .into_iter()
            .filter(|info| info.network_id == self.network.id)
            .filter_map(|info| {
                let class = DeviceClass::from_product_type(&info.product_type)?;
                (class == self.class).then_some(info)
            })
            .map(|info| {
                let status = self
                    .shared
                    .statuses
                    .status_of(&info.serial)
                    .unwrap_or(crate::model::DeviceStatus::Unknown);
                let last_seen = self.shared.statuses.last_seen(&info.serial);
                let mut device = Device::from_info(info, self.class, status);
                device.last_seen = last_seen;
                Arc::new(device)
            })
            .collect();

        let count = devices.len();
        self.apply_snapshot(devices);
        Ok(count)
    }

    /// Replace the device list wholesale and drop state for serials no
    /// longer present.
    fn apply_snapshot(&self, devices: Vec<Arc<Device>>) {
        let serials: BTreeSet<&str> = devices.iter().map(|d| d.serial.as_str()).collect();
        self.telemetry.retain(|serial, _| serials.contains(serial.as_str()));
        self.capabilities
            .retain(|serial, _| serials.contains(serial.as_str()));

        if self.class == DeviceClass::Sensor {
            for device in &devices {
                // Static fallback until live readings resolve the set.
                self.capabilities
                    .entry(device.serial.clone())
                    .or_insert_with(|| sensor_capabilities_for_model(&device.model));
            }
        }

        self.devices.store(Arc::new(devices));
    }

    // ── Telemetry refresh ────────────────────────────────────────────

    /// Fetch class-specific telemetry for reachable devices.
    ///
    /// Cache is consulted per metric first; misses go through the batch
    /// executor with each call pre-wrapped in rate limiting and retry.
    /// A total class-wide failure degrades this hub to "no telemetry"
    /// without touching the device list and without raising.
    pub async fn refresh_telemetry(&self) -> Result<TelemetrySummary, CoreError> {
        let mut summary = TelemetrySummary::default();
        let devices = self.devices.load_full();
        if devices.is_empty() {
            return Ok(summary);
        }

        let mut reachable = Vec::with_capacity(devices.len());
        for device in devices.iter() {
            let status = self.shared.statuses.effective_status(&device.serial);
            if status.is_reachable() {
                reachable.push(Arc::clone(device));
            } else {
                debug!(
                    serial = %device.serial,
                    status = %status,
                    "skipping offline device"
                );
                summary.skipped_offline += 1;
            }
        }

        if reachable.is_empty() {
            return Ok(summary);
        }

        self.state.send_replace(HubState::Refreshing);
        let result = match self.class {
            DeviceClass::Sensor => self.refresh_sensor_readings(&reachable, &mut summary).await,
            DeviceClass::Wireless => {
                self.refresh_network_config().await;
                self.refresh_per_device(&reachable, &mut summary).await
            }
            DeviceClass::Switch => self.refresh_per_device(&reachable, &mut summary).await,
        };
        self.state.send_replace(HubState::Ready);

        if let Err(err) = result {
            warn!(
                network = %self.network.id,
                class = %self.class,
                error = %err,
                "telemetry unavailable for this class"
            );
        }
        Ok(summary)
    }

    /// Sensors: one organization-level call covers every reachable
    /// serial, so the cache entry is network-scoped.
    async fn refresh_sensor_readings(
        &self,
        reachable: &[Arc<Device>],
        summary: &mut TelemetrySummary,
    ) -> Result<(), CoreError> {
        let key = ResponseCache::key(
            &self.network.id,
            TelemetryKind::SensorReadings.as_ref(),
            None,
        );

        if let Some(payload) = self.shared.cache.get(&key) {
            summary.cache_hits += 1;
            self.merge_sensor_readings(reachable, &payload);
            return Ok(());
        }

        let serials: Vec<String> = reachable.iter().map(|d| d.serial.clone()).collect();
        let call = {
            let client = Arc::clone(&self.shared.client);
            let org_id = self.shared.config.organization_id.clone();
            ApiCall::new("latest_sensor_readings", move || {
                let client = Arc::clone(&client);
                let org_id = org_id.clone();
                let serials = serials.clone();
                async move {
                    client
                        .latest_sensor_readings(&org_id, &serials)
                        .await
                        .map_err(CoreError::from)
                }
            })
        }
        .with_rate_limit(Arc::clone(&self.shared.limiter), priority::TELEMETRY)
        .with_retry(RetryStrategy::realtime());

        match call.invoke().await {
            Ok(payload) => {
                self.shared
                    .cache
                    .put_tier(key, payload.clone(), TtlTier::Standard);
                summary.fetched += 1;
                self.merge_sensor_readings(reachable, &payload);
                Ok(())
            }
            Err(err) => {
                summary.failed += 1;
                self.telemetry_failures.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    fn merge_sensor_readings(&self, reachable: &[Arc<Device>], payload: &Value) {
        let owned: BTreeSet<&str> = reachable.iter().map(|d| d.serial.as_str()).collect();
        let entries = payload.as_array().map(Vec::as_slice).unwrap_or_default();

        for entry in entries {
            let Some(serial) = entry.get("serial").and_then(|s| s.as_str()) else {
                continue;
            };
            if !owned.contains(serial) {
                continue;
            }
            let readings = entry.get("readings").cloned().unwrap_or(Value::Null);

            let live = sensor_capabilities_from_readings(&readings);
            if !live.is_empty() {
                self.capabilities.insert(serial.to_owned(), live);
            }

            self.telemetry
                .entry(serial.to_owned())
                .or_default()
                .merge(TelemetryKind::SensorReadings, readings);
        }
    }

    /// Wireless/switch: one call per (device, metric kind), batched.
    async fn refresh_per_device(
        &self,
        reachable: &[Arc<Device>],
        summary: &mut TelemetrySummary,
    ) -> Result<(), CoreError> {
        let mut slots: Vec<(String, TelemetryKind, String)> = Vec::new();
        let mut calls: Vec<ApiCall> = Vec::new();

        for device in reachable {
            for &kind in self.class.telemetry_kinds() {
                let key = ResponseCache::key(&device.serial, kind.as_ref(), None);
                if let Some(hit) = self.shared.cache.get(&key) {
                    summary.cache_hits += 1;
                    self.telemetry
                        .entry(device.serial.clone())
                        .or_default()
                        .merge(kind, hit);
                } else {
                    slots.push((device.serial.clone(), kind, key));
                    calls.push(
                        self.telemetry_call(kind, &device.serial)
                            .with_rate_limit(
                                Arc::clone(&self.shared.limiter),
                                priority::TELEMETRY,
                            )
                            .with_retry(RetryStrategy::realtime()),
                    );
                }
            }
        }

        if calls.is_empty() {
            return Ok(());
        }

        let outcomes = run_batched(
            &calls,
            self.shared.config.batch_size,
            self.shared.config.inter_batch_delay,
        )
        .await;

        let mut last_err = None;
        for ((serial, kind, key), outcome) in slots.into_iter().zip(outcomes) {
            match outcome {
                Ok(value) => {
                    self.shared
                        .cache
                        .put_tier(key, value.clone(), cache_tier(kind));
                    self.telemetry.entry(serial).or_default().merge(kind, value);
                    summary.fetched += 1;
                }
                Err(err) => {
                    warn!(
                        serial = %serial,
                        kind = %kind,
                        error = %err,
                        "telemetry fetch failed; leaving metric absent"
                    );
                    summary.failed += 1;
                    self.telemetry_failures.fetch_add(1, Ordering::Relaxed);
                    last_err = Some(err);
                }
            }
        }

        // Partial failures are isolated above; only a fully failed pass
        // counts as the class being unavailable.
        match last_err {
            Some(err) if summary.fetched == 0 && summary.cache_hits == 0 => Err(err),
            _ => Ok(()),
        }
    }

    /// SSID configuration is near-static; the cache layer makes this a
    /// no-op for most refresh cycles.
    async fn refresh_network_config(&self) {
        let key = ResponseCache::key(&self.network.id, "ssids", None);
        let ttl = self.shared.cache.ttl(TtlTier::Long);

        let call = {
            let client = Arc::clone(&self.shared.client);
            let network_id = self.network.id.clone();
            ApiCall::new("wireless_ssids", move || {
                let client = Arc::clone(&client);
                let network_id = network_id.clone();
                async move {
                    client
                        .wireless_ssids(&network_id)
                        .await
                        .map_err(CoreError::from)
                }
            })
        }
        .with_rate_limit(Arc::clone(&self.shared.limiter), priority::BACKGROUND)
        .with_retry(RetryStrategy::static_data())
        .with_cache(Arc::clone(&self.shared.cache), key, ttl);

        match call.invoke().await {
            Ok(config) => self.network_config.store(Some(Arc::new(config))),
            Err(err) => warn!(
                network = %self.network.id,
                error = %err,
                "SSID configuration fetch failed; keeping previous"
            ),
        }
    }

    fn telemetry_call(&self, kind: TelemetryKind, serial: &str) -> ApiCall {
        let client = Arc::clone(&self.shared.client);
        let serial = serial.to_owned();
        let timespan = self.shared.config.telemetry_timespan.as_secs();
        let name = format!("{kind}:{serial}");

        match kind {
            TelemetryKind::ConnectionStats => ApiCall::new(name, move || {
                let client = Arc::clone(&client);
                let serial = serial.clone();
                async move {
                    client
                        .wireless_connection_stats(&serial, timespan)
                        .await
                        .map_err(CoreError::from)
                }
            }),
            TelemetryKind::LatencyStats => ApiCall::new(name, move || {
                let client = Arc::clone(&client);
                let serial = serial.clone();
                async move {
                    client
                        .wireless_latency_stats(&serial, timespan)
                        .await
                        .map_err(CoreError::from)
                }
            }),
            TelemetryKind::PortStatuses => ApiCall::new(name, move || {
                let client = Arc::clone(&client);
                let serial = serial.clone();
                async move {
                    client
                        .switch_port_statuses(&serial, timespan)
                        .await
                        .map_err(CoreError::from)
                }
            }),
            TelemetryKind::SensorReadings => {
                // Sensors take the org-level path in refresh_sensor_readings.
                let org_id = self.shared.config.organization_id.clone();
                ApiCall::new(name, move || {
                    let client = Arc::clone(&client);
                    let org_id = org_id.clone();
                    let serial = serial.clone();
                    async move {
                        client
                            .latest_sensor_readings(&org_id, &[serial])
                            .await
                            .map_err(CoreError::from)
                    }
                })
            }
        }
    }

    /// Mark the hub unloaded. Its periodic timer is owned and cancelled
    /// by the FleetHub.
    pub fn unload(&self) {
        self.state.send_replace(HubState::Unloaded);
    }
}

fn cache_tier(kind: TelemetryKind) -> TtlTier {
    match kind {
        TelemetryKind::ConnectionStats | TelemetryKind::LatencyStats => TtlTier::Extended,
        TelemetryKind::SensorReadings | TelemetryKind::PortStatuses => TtlTier::Standard,
    }
}
