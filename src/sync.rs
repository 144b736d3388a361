/// Handoff between the popup and the detached window
///
/// The two surfaces never share memory. Before one yields to the other it
/// writes a `SyncState` snapshot plus a `last_sync_mode`/`last_sync_time`
/// marker; the other reads them once at startup. Liveness markers keep at
/// most one window of each kind alive.
use serde::{Deserialize, Serialize};

use crate::cache::CacheStore;
use crate::error::StorageError;
use crate::storage::{Clock, KeyValueStorage};
use crate::transaction::{InstanceMarker, SurfaceKind, SyncState};

pub const LAST_SYNC_MODE_KEY: &str = "last_sync_mode";
pub const LAST_SYNC_TIME_KEY: &str = "last_sync_time";

fn state_key(kind: SurfaceKind) -> String {
    format!("sync_state_{}", kind.as_str())
}

fn instance_key(kind: SurfaceKind) -> String {
    format!("instance_{}", kind.as_str())
}

fn seen_key(kind: SurfaceKind) -> String {
    format!("instance_{}_seen", kind.as_str())
}

/// Write the snapshot a surface leaves behind when it hands over control
pub async fn publish_handoff<S: KeyValueStorage>(
    storage: &S,
    kind: SurfaceKind,
    state: &SyncState,
    now: f64,
) -> Result<(), StorageError> {
    let snapshot = SyncState {
        timestamp: now,
        ..state.clone()
    };

    storage.set_json(&state_key(kind), &snapshot).await?;
    storage.set_json(LAST_SYNC_MODE_KEY, &kind).await?;
    storage.set_json(LAST_SYNC_TIME_KEY, &now).await?;

    log::info!(
        "Published {} handoff with {} transactions",
        kind.as_str(),
        snapshot.transactions.len()
    );
    Ok(())
}

/// Forget every handoff snapshot, so cleared data is not restored on the
/// next start
pub async fn clear_handoffs<S: KeyValueStorage>(storage: &S) -> Result<(), StorageError> {
    let keys = vec![
        state_key(SurfaceKind::Popup),
        state_key(SurfaceKind::Detached),
        LAST_SYNC_MODE_KEY.to_string(),
        LAST_SYNC_TIME_KEY.to_string(),
    ];
    storage.remove(&keys).await
}

/// Handoff published by the other surface after `since`, for a surface that
/// is already running and has just regained focus
pub async fn newer_handoff<S: KeyValueStorage>(storage: &S, kind: SurfaceKind, since: f64) -> Option<SyncState> {
    let last_mode: Option<SurfaceKind> = read_or_log(storage, LAST_SYNC_MODE_KEY).await;
    if last_mode != Some(kind.other()) {
        return None;
    }

    read_snapshot(storage, kind.other())
        .await
        .filter(|state| state.timestamp > since)
}

/// Where a surface's starting state came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSource {
    /// Snapshot left by the other surface
    Foreign,
    /// This surface's own last snapshot
    Own,
    /// Generic transaction cache
    Cache,
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitialState {
    pub source: SyncSource,
    pub state: SyncState,
}

/// Pick the starting state for a surface: the other surface's handoff,
/// then this surface's own snapshot, then the cache, then nothing.
pub async fn resolve_initial_state<S, P, C>(
    storage: &S,
    cache: &CacheStore<P, C>,
    kind: SurfaceKind,
) -> InitialState
where
    S: KeyValueStorage,
    P: KeyValueStorage,
    C: Clock,
{
    let last_mode: Option<SurfaceKind> = read_or_log(storage, LAST_SYNC_MODE_KEY).await;

    if let Some(mode) = last_mode.filter(|mode| *mode == kind.other()) {
        if let Some(state) = read_snapshot(storage, mode).await {
            log::info!("Adopting {} handoff", mode.as_str());
            return InitialState {
                source: SyncSource::Foreign,
                state,
            };
        }
    }

    if let Some(state) = read_snapshot(storage, kind).await {
        return InitialState {
            source: SyncSource::Own,
            state,
        };
    }

    if let Some(transactions) = cache.get(None).await {
        return InitialState {
            source: SyncSource::Cache,
            state: SyncState::with_transactions(transactions, 0.0),
        };
    }

    InitialState {
        source: SyncSource::Empty,
        state: SyncState::default(),
    }
}

/// A snapshot is only worth adopting when it carries transactions
async fn read_snapshot<S: KeyValueStorage>(storage: &S, kind: SurfaceKind) -> Option<SyncState> {
    read_or_log::<S, SyncState>(storage, &state_key(kind))
        .await
        .filter(|state| !state.transactions.is_empty())
}

async fn read_or_log<S, T>(storage: &S, key: &str) -> Option<T>
where
    S: KeyValueStorage,
    T: serde::de::DeserializeOwned,
{
    match storage.get_json(key).await {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Ignoring unreadable {}: {}", key, e);
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LivenessConfig {
    pub poll_interval_ms: u32,
    pub max_age_ms: f64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        LivenessConfig {
            poll_interval_ms: 1_000,
            max_age_ms: 30_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Current,
    Superseded,
}

/// Liveness markers, one per surface kind
pub struct InstanceRegistry<S, C> {
    storage: S,
    clock: C,
    config: LivenessConfig,
}

impl<S: KeyValueStorage, C: Clock> InstanceRegistry<S, C> {
    pub fn new(storage: S, clock: C, config: LivenessConfig) -> Self {
        InstanceRegistry { storage, clock, config }
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    /// Claim the slot for `kind`, displacing whatever instance held it
    pub async fn register(&self, kind: SurfaceKind) -> Result<InstanceMarker, StorageError> {
        let marker = InstanceMarker {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: self.clock.now_ms(),
        };
        self.storage.set_json(&instance_key(kind), &marker).await?;
        self.storage.set_json(&seen_key(kind), &marker).await?;
        log::debug!("Registered {} instance {}", kind.as_str(), marker.id);
        Ok(marker)
    }

    /// Check that `marker` still owns the slot and record that it is alive.
    ///
    /// Only `register` writes the ownership key. The heartbeat stamps the
    /// separate seen key, so it can never undo a newer registration.
    /// Storage errors count as still current so a flaky read never closes
    /// a window.
    pub async fn heartbeat(&self, kind: SurfaceKind, marker: &InstanceMarker) -> Liveness {
        let owner: Option<InstanceMarker> = match self.storage.get_json(&instance_key(kind)).await {
            Ok(owner) => owner,
            Err(e) => {
                log::warn!("Liveness check failed: {}", e);
                return Liveness::Current;
            }
        };

        if owner.is_some_and(|owner| owner.id != marker.id) {
            log::info!("{} instance {} superseded", kind.as_str(), marker.id);
            return Liveness::Superseded;
        }

        let seen = InstanceMarker {
            id: marker.id.clone(),
            timestamp: self.clock.now_ms(),
        };
        if let Err(e) = self.storage.set_json(&seen_key(kind), &seen).await {
            log::warn!("Heartbeat write failed: {}", e);
        }
        Liveness::Current
    }

    /// Whether some instance of `kind` has checked in recently
    pub async fn has_live_instance(&self, kind: SurfaceKind) -> bool {
        let seen: Option<InstanceMarker> = read_or_log(&self.storage, &seen_key(kind)).await;
        let now = self.clock.now_ms();
        seen.is_some_and(|seen| now - seen.timestamp <= self.config.max_age_ms)
    }

    /// Give up the slot if `marker` still holds it
    pub async fn release(&self, kind: SurfaceKind, marker: &InstanceMarker) {
        let mut doomed = Vec::new();
        for key in [instance_key(kind), seen_key(kind)] {
            let stored: Option<InstanceMarker> = read_or_log(&self.storage, &key).await;
            if stored.is_some_and(|stored| stored.id == marker.id) {
                doomed.push(key);
            }
        }

        if doomed.is_empty() {
            return;
        }
        if let Err(e) = self.storage.remove(&doomed).await {
            log::warn!("Could not release instance marker: {}", e);
        }
    }
}
