// Dashboard shell - Active view, widget placement and per-view background tasks
use crate::application::background::TaskHandle;
use crate::application::chart_service::ChartService;
use crate::application::live_service::LiveService;
use crate::application::playback_service::PlaybackService;
use crate::application::simulation_service::SimulationService;
use crate::domain::dashboard::{View, Widget, WidgetBoard, WidgetKey, WidgetKind};
use crate::domain::telemetry::ChartKey;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct PollIntervals {
    pub live: Duration,
    pub charts: Duration,
    pub simulations: Duration,
}

struct ShellState {
    view: Option<View>,
    widgets: WidgetBoard,
    tasks: Vec<TaskHandle>,
}

pub struct ShellService {
    live: Arc<LiveService>,
    charts: Arc<ChartService>,
    simulations: Arc<SimulationService>,
    playback: Arc<PlaybackService>,
    intervals: PollIntervals,
    state: Mutex<ShellState>,
}

fn chart_key(kind: &WidgetKind) -> Option<ChartKey> {
    match *kind {
        WidgetKind::Chart {
            model,
            channel,
            timespan,
        } => Some(ChartKey {
            model,
            channel,
            timespan,
        }),
        WidgetKind::Stat { .. } => None,
    }
}

impl ShellService {
    pub fn new(
        live: Arc<LiveService>,
        charts: Arc<ChartService>,
        simulations: Arc<SimulationService>,
        playback: Arc<PlaybackService>,
        intervals: PollIntervals,
    ) -> Self {
        Self {
            live,
            charts,
            simulations,
            playback,
            intervals,
            state: Mutex::new(ShellState {
                view: None,
                widgets: WidgetBoard::new(),
                tasks: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ShellState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn view(&self) -> Option<View> {
        self.lock().view
    }

    /// Switch views. Everything owned by the previous view is torn down:
    /// pollers are cancelled, widgets and cached state are dropped, playback
    /// is paused.
    pub fn navigate(&self, view: View) {
        let mut state = self.lock();
        let previous = state.view;
        state.tasks.clear();
        state.widgets.clear();

        match previous {
            Some(View::LiveData) => {
                self.live.reset();
                self.charts.clear();
            }
            Some(View::Simulation) => {
                self.playback.pause();
                self.simulations.reset();
            }
            None => {}
        }

        state.tasks = match view {
            View::LiveData => vec![
                self.live.spawn_polling(self.intervals.live),
                self.charts.spawn_polling(self.intervals.charts),
            ],
            View::Simulation => vec![self.simulations.spawn_polling(self.intervals.simulations)],
        };
        state.view = Some(view);

        tracing::info!(
            "Switched view {} -> {} ({} background tasks)",
            previous.map(|v| v.as_str()).unwrap_or("none"),
            view.as_str(),
            state.tasks.len()
        );
    }

    pub fn widgets(&self) -> Vec<Widget> {
        self.lock().widgets.widgets().to_vec()
    }

    /// Place a widget. Chart widgets start loading their history right away.
    pub async fn add_widget(&self, name: String, kind: WidgetKind) -> WidgetKey {
        let key = self.lock().widgets.add(name, kind);
        if let Some(chart) = chart_key(&kind) {
            self.charts.open(chart).await;
        }
        key
    }

    /// Remove exactly the widget with `key`. The chart behind it is closed
    /// when no other widget still shows it.
    pub fn remove_widget(&self, key: WidgetKey) -> bool {
        let mut state = self.lock();
        let Some(kind) = state
            .widgets
            .widgets()
            .iter()
            .find(|w| w.key == key)
            .map(|w| w.kind)
        else {
            return false;
        };
        state.widgets.remove(key);

        if let Some(chart) = chart_key(&kind) {
            let still_shown = state
                .widgets
                .widgets()
                .iter()
                .any(|w| chart_key(&w.kind) == Some(chart));
            if !still_shown {
                self.charts.close(&chart);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dashboard_api::fake::FakeApi;
    use crate::application::live_service::LiveOptions;
    use crate::application::playback_service::PlaybackOptions;
    use crate::domain::channel::{Channel, TelemetryModel};
    use crate::domain::playback::EndBehavior;
    use crate::domain::rig::RigGeometry;
    use crate::domain::telemetry::Timespan;
    use crate::domain::trace::ColorRanges;

    fn shell(api: Arc<FakeApi>) -> (ShellService, Arc<ChartService>) {
        let live = Arc::new(LiveService::new(
            api.clone(),
            LiveOptions {
                geometry: RigGeometry::default(),
                ranges: ColorRanges::default(),
                capacity: 16,
                trace_lift: 230.0,
                trace_channel: Channel::XFollDist,
            },
        ));
        let charts = Arc::new(ChartService::new(api.clone(), 100));
        let playback = Arc::new(PlaybackService::new(PlaybackOptions {
            tick_interval: Duration::from_millis(40),
            geometry: RigGeometry::default(),
            ranges: ColorRanges::default(),
            trace_lift: 230.0,
            trace_channel: Channel::XFollDist,
            end: EndBehavior::Loop,
        }));
        let simulations = Arc::new(SimulationService::new(api, playback.clone(), 0.05..=2.0));
        let intervals = PollIntervals {
            live: Duration::from_secs(3),
            charts: Duration::from_secs(3),
            simulations: Duration::from_secs(5),
        };
        (
            ShellService::new(live, charts.clone(), simulations, playback, intervals),
            charts,
        )
    }

    fn chart() -> WidgetKind {
        WidgetKind::Chart {
            model: TelemetryModel::Drive,
            channel: Channel::XFollDist,
            timespan: Timespan::OneHour,
        }
    }

    fn chart_key_of() -> ChartKey {
        chart_key(&chart()).unwrap()
    }

    #[tokio::test]
    async fn test_same_name_widgets_removed_independently() {
        let (shell, charts) = shell(Arc::new(FakeApi::default()));
        let a = shell.add_widget("X Error".to_string(), chart()).await;
        let b = shell.add_widget("X Error".to_string(), chart()).await;

        assert!(shell.remove_widget(a));
        let left = shell.widgets();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].key, b);
        // Still shown by the second widget
        assert!(charts.get(&chart_key_of()).is_some());

        assert!(shell.remove_widget(b));
        assert!(charts.get(&chart_key_of()).is_none());
        assert!(!shell.remove_widget(b));
    }

    #[tokio::test]
    async fn test_navigation_resets_widgets() {
        let (shell, charts) = shell(Arc::new(FakeApi::default()));
        shell.navigate(View::LiveData);
        shell.add_widget("X Error".to_string(), chart()).await;
        assert_eq!(shell.widgets().len(), 1);

        shell.navigate(View::Simulation);
        assert_eq!(shell.view(), Some(View::Simulation));
        assert!(shell.widgets().is_empty());
        assert!(charts.get(&chart_key_of()).is_none());
    }
}
