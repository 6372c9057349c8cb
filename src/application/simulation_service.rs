// Simulation service - Job list polling, NC program upload and loading into playback
use crate::application::background::TaskHandle;
use crate::application::dashboard_api::{ApiError, DashboardApi};
use crate::application::live_service::CANNOT_CONNECT;
use crate::application::mesh_cache::MeshCache;
use crate::application::playback_service::{PlaybackFrame, PlaybackService};
use crate::domain::dashboard::PanelState;
use crate::domain::simulation::{SimulationCache, SimulationRecord};
use anyhow::Context;
use bytes::Bytes;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct ListState {
    cache: SimulationCache,
    error: Option<String>,
    /// Generation of the newest response seen, successful or not
    seen_generation: u64,
}

pub struct SimulationService {
    api: Arc<dyn DashboardApi>,
    playback: Arc<PlaybackService>,
    meshes: MeshCache,
    precision: RangeInclusive<f64>,
    issued: AtomicU64,
    list: Mutex<ListState>,
}

impl SimulationService {
    pub fn new(
        api: Arc<dyn DashboardApi>,
        playback: Arc<PlaybackService>,
        precision: RangeInclusive<f64>,
    ) -> Self {
        Self {
            meshes: MeshCache::new(api.clone()),
            api,
            playback,
            precision,
            issued: AtomicU64::new(0),
            list: Mutex::new(ListState {
                cache: SimulationCache::default(),
                error: None,
                seen_generation: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ListState> {
        self.list.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Refresh the job list. Returns `true` if the cache was replaced.
    pub async fn poll_once(&self) -> bool {
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.api.list_simulations().await;

        let mut list = self.lock();
        if generation <= list.seen_generation {
            tracing::debug!("Dropping stale simulation list (generation {})", generation);
            return false;
        }
        list.seen_generation = generation;

        match result {
            Ok(records) => {
                tracing::debug!("Simulation list has {} jobs", records.len());
                list.error = None;
                list.cache.apply(generation, records)
            }
            Err(ApiError::Malformed(reason)) => {
                tracing::warn!("Ignoring malformed simulation list: {}", reason);
                false
            }
            Err(e) => {
                tracing::warn!("Simulation list failed: {}", e);
                list.error = Some(CANNOT_CONNECT.to_string());
                false
            }
        }
    }

    pub fn panel(&self) -> PanelState<Vec<SimulationRecord>> {
        let list = self.lock();
        if let Some(error) = &list.error {
            return PanelState::Error(error.clone());
        }
        if !list.cache.is_loaded() {
            return PanelState::Loading;
        }
        PanelState::Ready(list.cache.records().to_vec())
    }

    pub fn record(&self, id: i64) -> Option<SimulationRecord> {
        self.lock().cache.find(id).cloned()
    }

    /// Clamp a requested precision into the accepted range.
    pub fn clamp_precision(&self, precision: f64) -> f64 {
        if precision.is_nan() {
            return *self.precision.start();
        }
        precision.clamp(*self.precision.start(), *self.precision.end())
    }

    /// Send an NC program to the backend. The job shows up as not finished on
    /// a later poll. Returns the precision actually requested.
    pub async fn upload(&self, file_name: &str, content: Bytes, precision: f64) -> anyhow::Result<f64> {
        let precision = self.clamp_precision(precision);
        tracing::info!(
            "Uploading {} ({} bytes) at precision {}",
            file_name,
            content.len(),
            precision
        );
        self.api
            .upload_simulation(file_name, content, precision)
            .await
            .with_context(|| format!("Failed to upload {}", file_name))?;
        Ok(precision)
    }

    /// Load a finished job into playback.
    pub async fn load(&self, id: i64) -> anyhow::Result<PlaybackFrame> {
        let record = self
            .record(id)
            .with_context(|| format!("Unknown simulation {}", id))?;
        if !record.can_load() {
            anyhow::bail!("Simulation {} is not finished yet", id);
        }

        let samples = self
            .api
            .simulation_data(id)
            .await
            .with_context(|| format!("Failed to fetch data for simulation {}", id))?;

        Ok(self.playback.load(id, samples))
    }

    pub async fn mesh(&self, path: &str) -> Result<Bytes, ApiError> {
        self.meshes.get(path).await
    }

    /// Forget the list and cached meshes, e.g. when the view is left.
    pub fn reset(&self) {
        let mut list = self.lock();
        list.cache = SimulationCache::default();
        list.error = None;
        list.seen_generation = self.issued.load(Ordering::SeqCst);
        self.meshes.clear();
    }

    pub fn spawn_polling(self: &Arc<Self>, every: Duration) -> TaskHandle {
        let service = Arc::clone(self);
        TaskHandle::every("simulation-poll", every, move || {
            let service = Arc::clone(&service);
            async move {
                service.poll_once().await;
            }
        })
    }
}
