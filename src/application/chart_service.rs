// Chart service - History windows extended by polling the latest reading
use crate::application::background::TaskHandle;
use crate::application::dashboard_api::DashboardApi;
use crate::application::live_service::CANNOT_CONNECT;
use crate::domain::dashboard::PanelState;
use crate::domain::telemetry::{ChartKey, ChartWindow};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct ChartService {
    api: Arc<dyn DashboardApi>,
    max_points: usize,
    charts: Mutex<HashMap<ChartKey, PanelState<ChartWindow>>>,
}

impl ChartService {
    pub fn new(api: Arc<dyn DashboardApi>, max_points: usize) -> Self {
        Self {
            api,
            max_points,
            charts: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ChartKey, PanelState<ChartWindow>>> {
        self.charts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed (or re-seed) a chart from its history window.
    pub async fn open(&self, key: ChartKey) -> PanelState<ChartWindow> {
        self.lock().insert(key, PanelState::Loading);

        let state = match self.api.timed_data(key.model, key.channel, key.timespan).await {
            Ok(history) => {
                tracing::debug!(
                    "Loaded {} points for {}/{} over {}",
                    history.len(),
                    key.model,
                    key.channel,
                    key.timespan.as_str()
                );
                PanelState::Ready(ChartWindow::seeded(key, history, self.max_points))
            }
            Err(e) => {
                tracing::warn!("History fetch for {}/{} failed: {}", key.model, key.channel, e);
                PanelState::Error(CANNOT_CONNECT.to_string())
            }
        };

        let mut charts = self.lock();
        // Closed while the request was in flight
        if !charts.contains_key(&key) {
            return state;
        }
        charts.insert(key, state.clone());
        state
    }

    /// Append the latest reading to a ready chart. Returns `true` if a point
    /// was added.
    pub async fn refresh(&self, key: ChartKey) -> bool {
        let ready = self.lock().get(&key).is_some_and(|state| state.ready().is_some());
        if !ready {
            return false;
        }

        match self.api.current_value(key.model, key.channel).await {
            Ok(Some(point)) => self
                .lock()
                .get_mut(&key)
                .and_then(|state| state.ready_mut())
                .map(|window| window.append(point))
                .unwrap_or(false),
            Ok(None) => false,
            Err(e) => {
                // The history already on screen stays; the next poll retries
                tracing::warn!("Latest value for {}/{} failed: {}", key.model, key.channel, e);
                false
            }
        }
    }

    pub async fn refresh_all(&self) {
        let keys: Vec<ChartKey> = self.lock().keys().copied().collect();
        for key in keys {
            self.refresh(key).await;
        }
    }

    pub fn get(&self, key: &ChartKey) -> Option<PanelState<ChartWindow>> {
        self.lock().get(key).cloned()
    }

    pub fn close(&self, key: &ChartKey) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn spawn_polling(self: &Arc<Self>, every: Duration) -> TaskHandle {
        let service = Arc::clone(self);
        TaskHandle::every("chart-poll", every, move || {
            let service = Arc::clone(&service);
            async move {
                service.refresh_all().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dashboard_api::fake::FakeApi;
    use crate::domain::channel::{Channel, TelemetryModel};
    use crate::domain::telemetry::{TimeSeriesPoint, Timespan};

    fn key() -> ChartKey {
        ChartKey {
            model: TelemetryModel::Drive,
            channel: Channel::S1ActTrq,
            timespan: Timespan::ThirtyMinutes,
        }
    }

    #[tokio::test]
    async fn test_open_then_refresh_appends() {
        let api = Arc::new(FakeApi::default());
        *api.history.lock().unwrap() = (0..5).map(|i| TimeSeriesPoint::new(i, 1.0)).collect();
        let service = ChartService::new(api.clone(), 500);

        let state = service.open(key()).await;
        assert_eq!(state.ready().map(|w| w.points.len()), Some(5));

        *api.current.lock().unwrap() = Some(TimeSeriesPoint::new(10, 2.0));
        assert!(service.refresh(key()).await);
        // Same reading again is not a new point
        assert!(!service.refresh(key()).await);

        let window = service.get(&key()).unwrap();
        assert_eq!(window.ready().unwrap().points.len(), 6);
    }

    #[tokio::test]
    async fn test_open_failure_is_error_state() {
        let api = Arc::new(FakeApi::default());
        api.set_offline(true);
        let service = ChartService::new(api, 500);

        let state = service.open(key()).await;
        assert_eq!(state.ready().map(|w| w.points.len()), None);
        assert!(matches!(service.get(&key()), Some(PanelState::Error(_))));
        assert!(!service.refresh(key()).await);
    }

    #[tokio::test]
    async fn test_history_is_downsampled_to_cap() {
        let api = Arc::new(FakeApi::default());
        *api.history.lock().unwrap() = (0..2000).map(|i| TimeSeriesPoint::new(i, 1.0)).collect();
        let service = ChartService::new(api, 500);

        let state = service.open(key()).await;
        assert!(state.ready().unwrap().points.len() <= 500);
    }

    #[tokio::test]
    async fn test_close_removes_chart() {
        let api = Arc::new(FakeApi::default());
        let service = ChartService::new(api, 500);
        service.open(key()).await;
        assert!(service.close(&key()));
        assert!(service.get(&key()).is_none());
    }
}
