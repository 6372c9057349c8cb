// Application state for HTTP handlers
use crate::application::chart_service::ChartService;
use crate::application::live_service::LiveService;
use crate::application::playback_service::PlaybackService;
use crate::application::shell_service::ShellService;
use crate::application::simulation_service::SimulationService;
use std::sync::Arc;

pub struct AppState {
    pub shell: ShellService,
    pub live: Arc<LiveService>,
    pub charts: Arc<ChartService>,
    pub simulations: Arc<SimulationService>,
    pub playback: Arc<PlaybackService>,
    /// Precision sent with uploads that do not name one
    pub default_precision: f64,
}
