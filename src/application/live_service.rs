// Live data service - Polls the latest machine reading and keeps the 3D view state
use crate::application::background::TaskHandle;
use crate::application::dashboard_api::{ApiError, DashboardApi};
use crate::domain::channel::Channel;
use crate::domain::dashboard::PanelState;
use crate::domain::rig::{CoordinateMapper, RigGeometry, RigPose};
use crate::domain::sample::{Sample, SampleSequence};
use crate::domain::trace::{ColorRanges, ColorScale, PathTrace, TraceStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CANNOT_CONNECT: &str = "cannot connect";

#[derive(Debug, Clone)]
pub struct LiveOptions {
    pub geometry: RigGeometry,
    pub ranges: ColorRanges,
    pub capacity: usize,
    pub trace_lift: f64,
    pub trace_channel: Channel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveView {
    pub latest: Sample,
    pub pose: RigPose,
    pub trace: PathTrace,
    pub trace_channel: Channel,
    pub scale: ColorScale,
    pub samples: usize,
}

struct LiveState {
    sequence: SampleSequence,
    mapper: CoordinateMapper,
    trace_channel: Channel,
    scale: ColorScale,
    trace: PathTrace,
    error: Option<String>,
    applied_generation: u64,
}

impl LiveState {
    fn rebuild_trace(&mut self, ranges: &ColorRanges, lift: f64) {
        self.scale = ranges.scale_for(self.trace_channel, &self.sequence);
        let style = TraceStyle {
            channel: self.trace_channel,
            scale: self.scale,
            lift,
        };
        self.trace = PathTrace::build(&self.sequence, &style);
    }
}

pub struct LiveService {
    api: Arc<dyn DashboardApi>,
    options: LiveOptions,
    issued: AtomicU64,
    state: Mutex<LiveState>,
}

impl LiveService {
    pub fn new(api: Arc<dyn DashboardApi>, options: LiveOptions) -> Self {
        let state = Self::fresh_state(&options);
        Self {
            api,
            options,
            issued: AtomicU64::new(0),
            state: Mutex::new(state),
        }
    }

    fn fresh_state(options: &LiveOptions) -> LiveState {
        LiveState {
            sequence: SampleSequence::rolling(options.capacity),
            mapper: CoordinateMapper::new(options.geometry),
            trace_channel: options.trace_channel,
            scale: ColorScale::new(0.0, 1.0),
            trace: PathTrace::default(),
            error: None,
            applied_generation: 0,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LiveState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fetch one snapshot and fold it into the view. Returns `true` if the
    /// response was applied, `false` if it was stale or malformed.
    pub async fn poll_once(&self) -> bool {
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.api.live_snapshot().await;

        let mut state = self.lock();
        if generation <= state.applied_generation {
            tracing::debug!(
                "Dropping stale live snapshot (generation {}, applied {})",
                generation,
                state.applied_generation
            );
            return false;
        }

        match result {
            Ok(sample) => {
                state.applied_generation = generation;
                state.error = None;
                state.mapper.update(&sample);
                state.sequence.push(sample);
                state.rebuild_trace(&self.options.ranges, self.options.trace_lift);
                tracing::debug!("Live sequence now holds {} samples", state.sequence.len());
                true
            }
            Err(ApiError::Malformed(reason)) => {
                // Keep whatever is on screen
                tracing::warn!("Ignoring malformed live snapshot: {}", reason);
                false
            }
            Err(e) => {
                state.applied_generation = generation;
                tracing::warn!("Live snapshot failed: {}", e);
                state.error = Some(CANNOT_CONNECT.to_string());
                false
            }
        }
    }

    pub fn panel(&self) -> PanelState<LiveView> {
        let state = self.lock();
        if let Some(error) = &state.error {
            return PanelState::Error(error.clone());
        }
        match state.sequence.last() {
            None => PanelState::Loading,
            Some(latest) => PanelState::Ready(LiveView {
                latest: latest.clone(),
                pose: state.mapper.pose(),
                trace: state.trace.clone(),
                trace_channel: state.trace_channel,
                scale: state.scale,
                samples: state.sequence.len(),
            }),
        }
    }

    pub fn set_trace_channel(&self, channel: Channel) {
        let mut state = self.lock();
        if state.trace_channel != channel {
            state.trace_channel = channel;
            state.rebuild_trace(&self.options.ranges, self.options.trace_lift);
        }
    }

    /// Drop all live state, e.g. when the view is left.
    pub fn reset(&self) {
        let mut state = self.lock();
        let applied = state.applied_generation.max(self.issued.load(Ordering::SeqCst));
        *state = Self::fresh_state(&self.options);
        // Responses to requests issued before the reset are stale
        state.applied_generation = applied;
    }

    pub fn spawn_polling(self: &Arc<Self>, every: Duration) -> TaskHandle {
        let service = Arc::clone(self);
        TaskHandle::every("live-poll", every, move || {
            let service = Arc::clone(&service);
            async move {
                service.poll_once().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dashboard_api::fake::FakeApi;

    fn options() -> LiveOptions {
        LiveOptions {
            geometry: RigGeometry::default(),
            ranges: ColorRanges::following_error_defaults(),
            capacity: 4,
            trace_lift: 230.0,
            trace_channel: Channel::XFollDist,
        }
    }

    fn reading(t: i64, x: f64) -> Sample {
        Sample::new(t)
            .with("XCurrPos", x)
            .with("YCurrPos", 0.0)
            .with("ZCurrPos", 0.0)
            .with("XFollDist", 0.0)
    }

    #[tokio::test]
    async fn test_panel_loading_then_ready() {
        let api = Arc::new(FakeApi::default());
        let service = LiveService::new(api.clone(), options());
        assert!(matches!(service.panel(), PanelState::Loading));

        api.snapshots.lock().unwrap().extend([reading(1, 1.0), reading(2, 2.0)]);
        assert!(service.poll_once().await);
        assert!(service.poll_once().await);

        let panel = service.panel();
        let view = panel.ready().expect("ready");
        assert_eq!(view.samples, 2);
        assert_eq!(view.latest.time_ms, 2);
        assert_eq!(view.pose.axis, 552.0);
        assert_eq!(view.trace.len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_shows_error_and_recovers() {
        let api = Arc::new(FakeApi::default());
        let service = LiveService::new(api.clone(), options());

        api.set_offline(true);
        assert!(!service.poll_once().await);
        assert_eq!(service.panel(), PanelState::Error(CANNOT_CONNECT.to_string()));

        api.set_offline(false);
        api.snapshots.lock().unwrap().push(reading(1, 1.0));
        assert!(service.poll_once().await);
        assert!(service.panel().ready().is_some());
    }

    #[tokio::test]
    async fn test_malformed_snapshot_keeps_loading() {
        let api = Arc::new(FakeApi::default());
        let service = LiveService::new(api, options());
        assert!(!service.poll_once().await);
        assert!(matches!(service.panel(), PanelState::Loading));
    }

    #[tokio::test]
    async fn test_sequence_is_capped() {
        let api = Arc::new(FakeApi::default());
        let service = LiveService::new(api.clone(), options());
        api.snapshots
            .lock()
            .unwrap()
            .extend((0..10).map(|i| reading(i, i as f64)));
        for _ in 0..10 {
            service.poll_once().await;
        }
        let view = service.panel().ready().cloned().unwrap();
        assert_eq!(view.samples, 4);
        assert_eq!(view.trace.len(), 3);
    }

    async fn wait_for_requests(api: &FakeApi, n: usize) {
        while api.snapshot_calls.load(std::sync::atomic::Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_older_response_arriving_last_is_dropped() {
        let api = Arc::new(FakeApi::default());
        let service = Arc::new(LiveService::new(api.clone(), options()));
        api.snapshots.lock().unwrap().extend([reading(1, 1.0), reading(2, 2.0)]);
        let older_gate = api.gate_snapshot();
        let newer_gate = api.gate_snapshot();

        let older = tokio::spawn({
            let service = service.clone();
            async move { service.poll_once().await }
        });
        wait_for_requests(&api, 1).await;
        let newer = tokio::spawn({
            let service = service.clone();
            async move { service.poll_once().await }
        });
        wait_for_requests(&api, 2).await;

        newer_gate.send(()).unwrap();
        assert!(newer.await.unwrap());
        older_gate.send(()).unwrap();
        assert!(!older.await.unwrap());

        let view = service.panel().ready().cloned().unwrap();
        assert_eq!(view.latest.time_ms, 2);
        assert_eq!(view.samples, 1);
        assert_eq!(view.pose.axis, 552.0);
    }

    #[tokio::test]
    async fn test_response_issued_before_reset_is_dropped() {
        let api = Arc::new(FakeApi::default());
        let service = Arc::new(LiveService::new(api.clone(), options()));
        api.snapshots.lock().unwrap().push(reading(1, 1.0));
        let gate = api.gate_snapshot();

        let in_flight = tokio::spawn({
            let service = service.clone();
            async move { service.poll_once().await }
        });
        wait_for_requests(&api, 1).await;
        service.reset();

        gate.send(()).unwrap();
        assert!(!in_flight.await.unwrap());
        assert!(matches!(service.panel(), PanelState::Loading));

        api.snapshots.lock().unwrap().push(reading(2, 2.0));
        assert!(service.poll_once().await);
        assert_eq!(service.panel().ready().map(|v| v.latest.time_ms), Some(2));
    }

    #[tokio::test]
    async fn test_reset_returns_to_loading() {
        let api = Arc::new(FakeApi::default());
        let service = LiveService::new(api.clone(), options());
        api.snapshots.lock().unwrap().push(reading(1, 1.0));
        service.poll_once().await;

        service.reset();
        assert!(matches!(service.panel(), PanelState::Loading));
    }
}
