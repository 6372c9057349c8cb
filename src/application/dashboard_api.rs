// Port for the telemetry/simulation backend
use crate::domain::channel::{Channel, TelemetryModel};
use crate::domain::sample::Sample;
use crate::domain::simulation::SimulationRecord;
use crate::domain::telemetry::{TimeSeriesPoint, Timespan};
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Failures talking to the backend. Panels render all of these the same way;
/// the variants exist for logging.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("cannot connect to backend: {0}")]
    Transport(String),
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// Latest reading of every live channel, flattened into one sample
    async fn live_snapshot(&self) -> Result<Sample, ApiError>;

    /// History of one channel over a named window
    async fn timed_data(
        &self,
        model: TelemetryModel,
        channel: Channel,
        timespan: Timespan,
    ) -> Result<Vec<TimeSeriesPoint>, ApiError>;

    /// Latest single reading of one channel
    async fn current_value(
        &self,
        model: TelemetryModel,
        channel: Channel,
    ) -> Result<Option<TimeSeriesPoint>, ApiError>;

    async fn list_simulations(&self) -> Result<Vec<SimulationRecord>, ApiError>;

    /// Full per-sample series of one simulation job
    async fn simulation_data(&self, simulation_id: i64) -> Result<Vec<Sample>, ApiError>;

    /// Upload an NC program. Processing happens asynchronously on the backend.
    async fn upload_simulation(
        &self,
        file_name: &str,
        content: Bytes,
        precision: f64,
    ) -> Result<(), ApiError>;

    /// Raw bytes of a mesh fragment referenced by a simulation sample
    async fn fetch_mesh(&self, path: &str) -> Result<Bytes, ApiError>;
}

#[cfg(test)]
pub mod fake {
    //! In-memory backend for service tests.
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    #[derive(Default)]
    pub struct FakeApi {
        pub offline: std::sync::atomic::AtomicBool,
        pub snapshots: Mutex<Vec<Sample>>,
        /// Held back until the sender fires, one per snapshot request
        pub snapshot_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
        pub snapshot_calls: AtomicUsize,
        pub history: Mutex<Vec<TimeSeriesPoint>>,
        pub current: Mutex<Option<TimeSeriesPoint>>,
        pub simulations: Mutex<Vec<SimulationRecord>>,
        pub simulation_samples: Mutex<HashMap<i64, Vec<Sample>>>,
        pub uploads: Mutex<Vec<(String, usize, f64)>>,
        pub meshes: Mutex<HashMap<String, Bytes>>,
        pub mesh_fetches: AtomicUsize,
    }

    impl FakeApi {
        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        /// Gate the next snapshot request. The response is picked when the
        /// request arrives but only returned once the sender fires.
        pub fn gate_snapshot(&self) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.snapshot_gates.lock().unwrap().push_back(rx);
            tx
        }

        fn check(&self) -> Result<(), ApiError> {
            if self.offline.load(Ordering::SeqCst) {
                Err(ApiError::Transport("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DashboardApi for FakeApi {
        async fn live_snapshot(&self) -> Result<Sample, ApiError> {
            self.check()?;
            let snapshot = {
                let mut snapshots = self.snapshots.lock().unwrap();
                (!snapshots.is_empty()).then(|| snapshots.remove(0))
            };
            let gate = self.snapshot_gates.lock().unwrap().pop_front();
            self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            snapshot.ok_or_else(|| ApiError::Malformed("no snapshot".to_string()))
        }

        async fn timed_data(
            &self,
            _model: TelemetryModel,
            _channel: Channel,
            _timespan: Timespan,
        ) -> Result<Vec<TimeSeriesPoint>, ApiError> {
            self.check()?;
            Ok(self.history.lock().unwrap().clone())
        }

        async fn current_value(
            &self,
            _model: TelemetryModel,
            _channel: Channel,
        ) -> Result<Option<TimeSeriesPoint>, ApiError> {
            self.check()?;
            Ok(self.current.lock().unwrap().clone())
        }

        async fn list_simulations(&self) -> Result<Vec<SimulationRecord>, ApiError> {
            self.check()?;
            Ok(self.simulations.lock().unwrap().clone())
        }

        async fn simulation_data(&self, simulation_id: i64) -> Result<Vec<Sample>, ApiError> {
            self.check()?;
            self.simulation_samples
                .lock()
                .unwrap()
                .get(&simulation_id)
                .cloned()
                .ok_or(ApiError::Status {
                    status: 404,
                    body: "not found".to_string(),
                })
        }

        async fn upload_simulation(
            &self,
            file_name: &str,
            content: Bytes,
            precision: f64,
        ) -> Result<(), ApiError> {
            self.check()?;
            self.uploads
                .lock()
                .unwrap()
                .push((file_name.to_string(), content.len(), precision));
            Ok(())
        }

        async fn fetch_mesh(&self, path: &str) -> Result<Bytes, ApiError> {
            self.check()?;
            self.mesh_fetches.fetch_add(1, Ordering::SeqCst);
            self.meshes
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| ApiError::Malformed(format!("no mesh at {}", path)))
        }
    }
}
