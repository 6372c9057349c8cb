// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::chart_service::ChartService;
use crate::application::dashboard_api::DashboardApi;
use crate::application::live_service::{LiveOptions, LiveService};
use crate::application::playback_service::{PlaybackOptions, PlaybackService};
use crate::application::shell_service::{PollIntervals, ShellService};
use crate::application::simulation_service::SimulationService;
use crate::domain::dashboard::View;
use crate::infrastructure::config::load_app_config;
use crate::infrastructure::http_api::HttpDashboardApi;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_app_config()?;
    let geometry = config.rig.geometry();
    let ranges = config.trace.color_ranges()?;
    let trace_channel = config.trace.channel()?;

    // Backend client (infrastructure layer)
    let api: Arc<dyn DashboardApi> = Arc::new(HttpDashboardApi::new(&config.api)?);

    // Create services (application layer)
    let live = Arc::new(LiveService::new(
        api.clone(),
        LiveOptions {
            geometry,
            ranges: ranges.clone(),
            capacity: config.live.capacity,
            trace_lift: config.trace.lift,
            trace_channel,
        },
    ));
    let charts = Arc::new(ChartService::new(api.clone(), config.charts.max_points));
    let playback = Arc::new(PlaybackService::new(PlaybackOptions {
        tick_interval: config.playback.tick_interval(),
        geometry,
        ranges,
        trace_lift: config.trace.lift,
        trace_channel,
        end: config.playback.end.into(),
    }));
    let simulations = Arc::new(SimulationService::new(
        api,
        playback.clone(),
        config.upload.precision_range()?,
    ));
    let shell = ShellService::new(
        live.clone(),
        charts.clone(),
        simulations.clone(),
        playback.clone(),
        PollIntervals {
            live: config.polling.live(),
            charts: config.polling.charts(),
            simulations: config.polling.simulations(),
        },
    );
    shell.navigate(View::LiveData);

    // Create application state
    let state = Arc::new(AppState {
        shell,
        live,
        charts,
        simulations,
        playback,
        default_precision: config.upload.default_precision,
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(handlers::health_check))
        .route("/live", get(handlers::get_live))
        .route("/live/trace", post(handlers::set_live_trace))
        .route("/charts", get(handlers::get_chart))
        .route("/widgets", get(handlers::list_widgets).post(handlers::add_widget))
        .route("/widgets/:key", delete(handlers::remove_widget))
        .route("/view", get(handlers::current_view))
        .route("/view/:view", post(handlers::navigate))
        .route("/simulations", get(handlers::list_simulations))
        .route("/simulations/upload", post(handlers::upload_simulation))
        .route("/simulations/:id/load", post(handlers::load_simulation))
        .route("/meshes/*path", get(handlers::get_mesh))
        .route("/playback", get(handlers::get_playback))
        .route("/playback/play", post(handlers::play))
        .route("/playback/pause", post(handlers::pause))
        .route("/playback/scrub", post(handlers::scrub))
        .route("/playback/seek", post(handlers::seek))
        .route("/playback/trace", get(handlers::get_trace))
        .route("/playback/series", get(handlers::get_series))
        .route("/playback/samples/:index", get(handlers::get_sample))
        .route("/playback/stream", get(handlers::stream_playback))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = config.server.bind;
    tracing::info!("Starting cnc-dashboard on {} (backend {})", addr, config.api.base_url);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
