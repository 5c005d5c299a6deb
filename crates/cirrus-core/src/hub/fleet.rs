// ── Fleet hub and tiered refresh scheduler ──
//
// Owns one organization's view: the network list, the per-(network,
// class) inventory hubs, the org-wide status feed, and three
// independently-paced refresh loops (static / semi-static / dynamic)
// for organization-wide aggregates. Each tier keeps its own freshness
// clock; a failed fetch keeps the previous snapshot in place.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::{DateTime, Utc};
use cirrus_api::{DashboardClient, OrganizationInfo, TransportConfig};
use dashmap::DashMap;
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, IntoEnumIterator};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::batch::run_batched;
use crate::call::ApiCall;
use crate::config::FleetConfig;
use crate::error::CoreError;
use crate::limiter::priority;
use crate::model::{Device, DeviceClass, DeviceStatus, Network, Organization, RefreshTier};
use crate::retry::{run_with_retry, RetryStrategy};

use super::inventory::DeviceInventoryHub;
use super::SharedResources;

/// Fleet lifecycle, observable via `state()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FleetState {
    Setup,
    Ready,
    Unloaded,
}

/// Freshness record for one refresh tier. The timestamp advances only
/// after a pass completes, success or handled failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierStatus {
    pub last_updated: Option<DateTime<Utc>>,
    /// Fetches that failed in the most recent pass.
    pub failed_fetches: usize,
    /// Passes completed since construction.
    pub passes: u64,
}

/// Organization-wide aggregate snapshots, grouped by refresh tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum OrgAggregate {
    /// Licensing/entitlement summary.
    LicensesOverview,
    /// Per-device memory utilization history.
    MemoryUsageHistory,
    /// Ethernet/power status for wireless devices.
    EthernetStatuses,
    /// Active alert counts by severity and category.
    AlertsOverview,
    /// Client-count and usage overview.
    ClientsOverview,
    /// Short-range Bluetooth client counts.
    BluetoothClientsOverview,
}

impl OrgAggregate {
    pub fn tier(self) -> RefreshTier {
        match self {
            Self::LicensesOverview => RefreshTier::Static,
            Self::MemoryUsageHistory | Self::EthernetStatuses => RefreshTier::SemiStatic,
            Self::AlertsOverview | Self::ClientsOverview | Self::BluetoothClientsOverview => {
                RefreshTier::Dynamic
            }
        }
    }
}

struct TierClocks {
    static_data: watch::Sender<TierStatus>,
    semi_static: watch::Sender<TierStatus>,
    dynamic: watch::Sender<TierStatus>,
}

impl TierClocks {
    fn new() -> Self {
        let (static_data, _) = watch::channel(TierStatus::default());
        let (semi_static, _) = watch::channel(TierStatus::default());
        let (dynamic, _) = watch::channel(TierStatus::default());
        Self {
            static_data,
            semi_static,
            dynamic,
        }
    }

    fn sender(&self, tier: RefreshTier) -> &watch::Sender<TierStatus> {
        match tier {
            RefreshTier::Static => &self.static_data,
            RefreshTier::SemiStatic => &self.semi_static,
            RefreshTier::Dynamic => &self.dynamic,
        }
    }
}

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc`. Call [`setup()`](Self::setup) to
/// validate credentials, build the initial snapshot, and start the
/// background refresh loops; [`unload()`](Self::unload) to tear them
/// down.
#[derive(Clone)]
pub struct FleetHub {
    inner: Arc<FleetInner>,
}

struct FleetInner {
    shared: Arc<SharedResources>,
    organization: ArcSwapOption<Organization>,
    networks: ArcSwap<Vec<Network>>,
    hubs: DashMap<(String, DeviceClass), Arc<DeviceInventoryHub>>,
    aggregates: DashMap<OrgAggregate, Arc<Value>>,
    tiers: TierClocks,
    state: watch::Sender<FleetState>,
    cancel: CancellationToken,
    unloaded: AtomicBool,
    task_handles: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl FleetHub {
    /// Build a fleet hub and its shared resources. Does not call the
    /// dashboard -- `setup()` does.
    pub fn new(config: FleetConfig) -> Result<Self, CoreError> {
        let shared = SharedResources::new(config)?;
        Ok(Self::with_shared(shared))
    }

    /// Build a fleet hub around externally constructed resources.
    pub fn with_shared(shared: Arc<SharedResources>) -> Self {
        let (state, _) = watch::channel(FleetState::Setup);
        Self {
            inner: Arc::new(FleetInner {
                shared,
                organization: ArcSwapOption::empty(),
                networks: ArcSwap::from_pointee(Vec::new()),
                hubs: DashMap::new(),
                aggregates: DashMap::new(),
                tiers: TierClocks::new(),
                state,
                cancel: CancellationToken::new(),
                unloaded: AtomicBool::new(false),
                task_handles: tokio::sync::Mutex::new(Vec::new()),
            }),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn shared(&self) -> &Arc<SharedResources> {
        &self.inner.shared
    }

    pub fn organization(&self) -> Option<Arc<Organization>> {
        self.inner.organization.load_full()
    }

    pub fn networks(&self) -> Arc<Vec<Network>> {
        self.inner.networks.load_full()
    }

    pub fn hubs(&self) -> Vec<Arc<DeviceInventoryHub>> {
        self.inner
            .hubs
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn hub(&self, network_id: &str, class: DeviceClass) -> Option<Arc<DeviceInventoryHub>> {
        self.inner
            .hubs
            .get(&(network_id.to_owned(), class))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// The most recent snapshot of an organization-wide aggregate.
    pub fn aggregate(&self, agg: OrgAggregate) -> Option<Arc<Value>> {
        self.inner.aggregates.get(&agg).map(|v| Arc::clone(v.value()))
    }

    pub fn state(&self) -> FleetState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<FleetState> {
        self.inner.state.subscribe()
    }

    pub fn tier_status(&self, tier: RefreshTier) -> watch::Receiver<TierStatus> {
        self.inner.tiers.sender(tier).subscribe()
    }

    pub fn tier_last_updated(&self, tier: RefreshTier) -> Option<DateTime<Utc>> {
        self.inner.tiers.sender(tier).borrow().last_updated
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Validate credentials, mirror the organization, run one pass of
    /// every refresh tier, create the device class hubs, and start the
    /// background loops.
    ///
    /// Returns a terminal error when the credentials are rejected and a
    /// retryable "not ready" error when the dashboard is unreachable; a
    /// fresh instance that returns `Ok` always has a non-empty snapshot.
    pub async fn setup(&self) -> Result<(), CoreError> {
        self.inner.shared.limiter.start().await;

        let organization = self
            .fetch_organization(&RetryStrategy::setup(), priority::SETUP)
            .await
            .map_err(CoreError::into_setup_error)?;
        info!(org = %organization.id, name = %organization.name, "organization resolved");
        self.inner.organization.store(Some(Arc::new(organization)));

        self.refresh_networks()
            .await
            .map_err(CoreError::into_setup_error)?;

        // Initial pass of every tier before returning, so consumers
        // never observe an empty snapshot. Tier-internal failures are
        // handled (logged, counted), not raised.
        self.force_refresh_all_tiers().await;

        self.create_device_class_hubs()
            .await
            .map_err(CoreError::into_setup_error)?;

        self.spawn_tier_tasks().await;
        self.inner.state.send_replace(FleetState::Ready);
        info!(
            networks = self.inner.networks.load().len(),
            hubs = self.inner.hubs.len(),
            "fleet hub ready"
        );
        Ok(())
    }

    /// Cancel the periodic loops, drain the rate limiter's worker pool,
    /// and mark every hub unloaded. Idempotent.
    pub async fn unload(&self) {
        if self.inner.unloaded.swap(true, Ordering::AcqRel) {
            return;
        }

        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        self.inner.shared.limiter.stop().await;
        for entry in self.inner.hubs.iter() {
            entry.value().unload();
        }
        self.inner.state.send_replace(FleetState::Unloaded);
        info!("fleet hub unloaded");
    }

    // ── Hub management ───────────────────────────────────────────────

    /// Instantiate one inventory hub per (network, device class) pair
    /// with at least one matching device, and seed each hub with the
    /// inventory slice already fetched.
    ///
    /// Existing hubs are kept and re-seeded; returns how many hubs were
    /// newly created.
    pub async fn create_device_class_hubs(&self) -> Result<usize, CoreError> {
        let infos = self.list_organization_devices().await?;
        let networks = self.inner.networks.load_full();
        let by_id: BTreeMap<&str, &Network> =
            networks.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut grouped: BTreeMap<(String, DeviceClass), Vec<Device>> = BTreeMap::new();
        for info in infos {
            let Some(class) = DeviceClass::from_product_type(&info.product_type) else {
                continue;
            };
            if !self.inner.shared.config.classes.enabled(class) {
                continue;
            }
            if !by_id.contains_key(info.network_id.as_str()) {
                continue;
            }

            let network_id = info.network_id.clone();
            let status = self
                .inner
                .shared
                .statuses
                .status_of(&info.serial)
                .unwrap_or(DeviceStatus::Unknown);
            let last_seen = self.inner.shared.statuses.last_seen(&info.serial);
            let mut device = Device::from_info(info, class, status);
            device.last_seen = last_seen;
            grouped.entry((network_id, class)).or_default().push(device);
        }

        let mut created = 0;
        for ((network_id, class), devices) in grouped {
            let key = (network_id.clone(), class);
            let hub = if let Some(existing) = self.inner.hubs.get(&key) {
                Arc::clone(existing.value())
            } else {
                let Some(network) = by_id.get(network_id.as_str()) else {
                    continue;
                };
                let hub = DeviceInventoryHub::new(
                    (*network).clone(),
                    class,
                    Arc::clone(&self.inner.shared),
                );
                self.inner.hubs.insert(key, Arc::clone(&hub));
                self.spawn_hub_tasks(Arc::clone(&hub)).await;
                created += 1;
                info!(
                    network = %network_id,
                    class = %class,
                    devices = devices.len(),
                    "created device class hub"
                );
                hub
            };
            hub.seed_devices(devices);
        }
        Ok(created)
    }

    // ── Tier refresh ─────────────────────────────────────────────────

    /// Run all three tier refreshes immediately.
    pub async fn force_refresh_all_tiers(&self) {
        for tier in RefreshTier::iter() {
            self.refresh_tier(tier).await;
        }
    }

    /// One pass of one tier. Failures are logged and counted; the
    /// previous snapshot stays in place. The tier's freshness clock
    /// advances once the whole fetch set has completed.
    async fn refresh_tier(&self, tier: RefreshTier) {
        let mut failed = 0;
        match tier {
            RefreshTier::Static => failed += self.refresh_identity().await,
            RefreshTier::SemiStatic => failed += self.refresh_status_feed().await,
            RefreshTier::Dynamic => {}
        }
        failed += self.refresh_aggregates(tier).await;

        if tier == RefreshTier::Dynamic {
            let evicted = self.inner.shared.cache.sweep();
            if evicted > 0 {
                debug!(evicted, "swept expired cache entries");
            }
        }

        self.inner.tiers.sender(tier).send_modify(|status| {
            status.last_updated = Some(Utc::now());
            status.failed_fetches = failed;
            status.passes += 1;
        });
        debug!(%tier, failed, "tier refresh complete");
    }

    /// Refresh the organization display name and the network list.
    /// Identity stays fixed; only the name and the network set change.
    async fn refresh_identity(&self) -> usize {
        let mut failed = 0;
        match self
            .fetch_organization(&RetryStrategy::static_data(), priority::BACKGROUND)
            .await
        {
            Ok(organization) => self.inner.organization.store(Some(Arc::new(organization))),
            Err(err) => {
                warn!(error = %err, "organization refresh failed; keeping previous");
                failed += 1;
            }
        }

        if let Err(err) = self.refresh_networks().await {
            warn!(error = %err, "network list refresh failed; keeping previous");
            failed += 1;
        }
        failed
    }

    /// Refresh the org-wide device status feed consulted by every hub.
    async fn refresh_status_feed(&self) -> usize {
        let fetch = {
            let client = Arc::clone(&self.inner.shared.client);
            let org_id = self.inner.shared.config.organization_id.clone();
            move || {
                let client = Arc::clone(&client);
                let org_id = org_id.clone();
                async move {
                    client
                        .list_device_statuses(&org_id)
                        .await
                        .map_err(CoreError::from)
                }
            }
        };

        match run_with_retry("list_device_statuses", &RetryStrategy::static_data(), || {
            self.inner
                .shared
                .limiter
                .submit(priority::BACKGROUND, fetch.clone())
        })
        .await
        {
            Ok(statuses) => {
                debug!(devices = statuses.len(), "status feed refreshed");
                self.inner.shared.statuses.apply(&statuses);
                0
            }
            Err(err) => {
                warn!(error = %err, "status feed refresh failed; keeping previous");
                1
            }
        }
    }

    /// Fetch this tier's aggregate set through the batch executor, each
    /// call pre-wrapped in rate limiting and retry.
    async fn refresh_aggregates(&self, tier: RefreshTier) -> usize {
        let aggregates: Vec<OrgAggregate> =
            OrgAggregate::iter().filter(|a| a.tier() == tier).collect();
        if aggregates.is_empty() {
            return 0;
        }

        let calls: Vec<ApiCall> = aggregates.iter().map(|a| self.aggregate_call(*a)).collect();
        let outcomes = run_batched(
            &calls,
            self.inner.shared.config.batch_size,
            self.inner.shared.config.inter_batch_delay,
        )
        .await;

        let mut failed = 0;
        for (agg, outcome) in aggregates.into_iter().zip(outcomes) {
            match outcome {
                Ok(value) => {
                    self.inner.aggregates.insert(agg, Arc::new(value));
                }
                Err(err) => {
                    warn!(
                        aggregate = %agg,
                        error = %err,
                        "aggregate refresh failed; keeping previous snapshot"
                    );
                    failed += 1;
                }
            }
        }
        failed
    }

    fn aggregate_call(&self, agg: OrgAggregate) -> ApiCall {
        let client = Arc::clone(&self.inner.shared.client);
        let org_id = self.inner.shared.config.organization_id.clone();

        ApiCall::new(agg.as_ref(), move || {
            let client = Arc::clone(&client);
            let org_id = org_id.clone();
            async move {
                let result = match agg {
                    OrgAggregate::LicensesOverview => client.licenses_overview(&org_id).await,
                    OrgAggregate::MemoryUsageHistory => client.memory_usage_history(&org_id).await,
                    OrgAggregate::EthernetStatuses => client.ethernet_statuses(&org_id).await,
                    OrgAggregate::AlertsOverview => client.alerts_overview(&org_id).await,
                    OrgAggregate::ClientsOverview => client.clients_overview(&org_id).await,
                    OrgAggregate::BluetoothClientsOverview => {
                        client.bluetooth_clients_overview(&org_id).await
                    }
                };
                result.map_err(CoreError::from)
            }
        })
        .with_rate_limit(Arc::clone(&self.inner.shared.limiter), priority::BACKGROUND)
        .with_retry(tier_retry_strategy(agg.tier()))
    }

    // ── Inventory fetches ────────────────────────────────────────────

    async fn fetch_organization(
        &self,
        strategy: &RetryStrategy,
        prio: u8,
    ) -> Result<Organization, CoreError> {
        let fetch = {
            let client = Arc::clone(&self.inner.shared.client);
            let org_id = self.inner.shared.config.organization_id.clone();
            move || {
                let client = Arc::clone(&client);
                let org_id = org_id.clone();
                async move { client.get_organization(&org_id).await.map_err(CoreError::from) }
            }
        };

        let info = run_with_retry("get_organization", strategy, || {
            self.inner.shared.limiter.submit(prio, fetch.clone())
        })
        .await?;
        Ok(organization_from_info(
            info,
            &self.inner.shared.config.base_url,
        ))
    }

    async fn refresh_networks(&self) -> Result<(), CoreError> {
        let fetch = {
            let client = Arc::clone(&self.inner.shared.client);
            let org_id = self.inner.shared.config.organization_id.clone();
            move || {
                let client = Arc::clone(&client);
                let org_id = org_id.clone();
                async move { client.list_networks(&org_id).await.map_err(CoreError::from) }
            }
        };

        let infos = run_with_retry("list_networks", &RetryStrategy::discovery(), || {
            self.inner
                .shared
                .limiter
                .submit(priority::DISCOVERY, fetch.clone())
        })
        .await?;

        let org_id = &self.inner.shared.config.organization_id;
        let networks: Vec<Network> = infos
            .into_iter()
            .filter(|info| &info.organization_id == org_id)
            .map(|info| Network {
                id: info.id,
                name: info.name,
                organization_id: info.organization_id,
            })
            .collect();

        debug!(count = networks.len(), "network list refreshed");
        self.inner.networks.store(Arc::new(networks));
        Ok(())
    }

    async fn list_organization_devices(&self) -> Result<Vec<cirrus_api::DeviceInfo>, CoreError> {
        let fetch = {
            let client = Arc::clone(&self.inner.shared.client);
            let org_id = self.inner.shared.config.organization_id.clone();
            move || {
                let client = Arc::clone(&client);
                let org_id = org_id.clone();
                async move { client.list_devices(&org_id).await.map_err(CoreError::from) }
            }
        };

        run_with_retry("list_devices", &RetryStrategy::discovery(), || {
            self.inner
                .shared
                .limiter
                .submit(priority::DISCOVERY, fetch.clone())
        })
        .await
    }

    // ── Background tasks ─────────────────────────────────────────────

    async fn spawn_tier_tasks(&self) {
        if self.inner.unloaded.load(Ordering::Acquire) {
            return;
        }
        let mut handles = self.inner.task_handles.lock().await;
        for tier in RefreshTier::iter() {
            let fleet = self.clone();
            let interval = self.inner.shared.config.tier_intervals.interval(tier);
            let cancel = self.inner.cancel.clone();
            handles.push(tokio::spawn(tier_task(fleet, tier, interval, cancel)));
        }
    }

    async fn spawn_hub_tasks(&self, hub: Arc<DeviceInventoryHub>) {
        if self.inner.unloaded.load(Ordering::Acquire) {
            return;
        }
        let config = &self.inner.shared.config;
        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(discovery_task(
            Arc::clone(&hub),
            config.discovery_interval,
            self.inner.cancel.clone(),
        )));
        handles.push(tokio::spawn(telemetry_task(
            hub,
            config.scan_interval,
            self.inner.cancel.clone(),
        )));
    }
}

fn tier_retry_strategy(tier: RefreshTier) -> RetryStrategy {
    match tier {
        // Fast cycles prefer staleness over blocking the next tick.
        RefreshTier::Dynamic => RetryStrategy::realtime(),
        RefreshTier::Static | RefreshTier::SemiStatic => RetryStrategy::static_data(),
    }
}

fn organization_from_info(info: OrganizationInfo, fallback: &Url) -> Organization {
    let base_url = info
        .url
        .as_deref()
        .and_then(|u| Url::parse(u).ok())
        .unwrap_or_else(|| fallback.clone());
    Organization {
        id: info.id,
        name: info.name,
        base_url,
    }
}

/// Periodically run one tier's refresh pass.
async fn tier_task(
    fleet: FleetHub,
    tier: RefreshTier,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await; // setup already ran the first pass

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => fleet.refresh_tier(tier).await,
        }
    }
}

/// Periodically re-discover one hub's device list. The hub's own
/// in-flight flag and minimum interval absorb overlapping timers.
async fn discovery_task(
    hub: Arc<DeviceInventoryHub>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(err) = hub.discover().await {
                    warn!(
                        network = %hub.network().id,
                        class = %hub.class(),
                        error = %err,
                        "periodic discovery failed"
                    );
                }
            }
        }
    }
}

/// Periodically refresh one hub's telemetry.
async fn telemetry_task(
    hub: Arc<DeviceInventoryHub>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(err) = hub.refresh_telemetry().await {
                    warn!(
                        network = %hub.network().id,
                        class = %hub.class(),
                        error = %err,
                        "periodic telemetry refresh failed"
                    );
                }
            }
        }
    }
}

// ── Configuration validation ─────────────────────────────────────────

/// Check a configuration against the dashboard for an interactive flow:
/// fail fast, no shared limiter, terminal/retryable translation applied.
///
/// Returns the resolved organization so the host can show its name.
pub async fn validate_config(config: &FleetConfig) -> Result<Organization, CoreError> {
    let transport = TransportConfig {
        timeout: config.timeout,
    };
    let client = DashboardClient::new(config.base_url.clone(), &config.api_key, &transport)?;

    let info = run_with_retry(
        "validate_config",
        &RetryStrategy::config_validation(),
        || {
            let client = &client;
            let org_id = config.organization_id.as_str();
            async move { client.get_organization(org_id).await.map_err(CoreError::from) }
        },
    )
    .await
    .map_err(CoreError::into_setup_error)?;

    Ok(organization_from_info(info, &config.base_url))
}
