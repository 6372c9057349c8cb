// HTTP request handlers
use crate::application::dashboard_api::ApiError;
use crate::domain::channel::{Channel, TelemetryModel};
use crate::domain::dashboard::{View, WidgetKey, WidgetKind};
use crate::domain::telemetry::{ChartKey, Timespan};
use crate::infrastructure::view_mapper::{
    chart_to_dto, frame_to_dto, live_to_dto, panel_to_dto, playback_trace_to_dto, sample_values,
    series_to_dto, simulation_to_dto, widget_to_dto, ChartDto, FrameDto, LiveDto, PanelDto,
    SeriesDto, SimulationDto, TraceDto, WidgetDto,
};
use crate::presentation::app_state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::Stream;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

type HandlerError = (StatusCode, String);

fn bad_request(message: impl ToString) -> HandlerError {
    (StatusCode::BAD_REQUEST, message.to_string())
}

fn parse_channel(field: &str) -> Result<Channel, HandlerError> {
    field.parse().map_err(bad_request)
}

/// `model` defaults to the table the channel lives in.
fn parse_model(model: Option<&str>, channel: Channel) -> Result<TelemetryModel, HandlerError> {
    match model {
        Some(model) => model.parse().map_err(bad_request),
        None => Ok(channel.model()),
    }
}

fn parse_timespan(timespan: Option<&str>) -> Result<Timespan, HandlerError> {
    match timespan {
        Some(timespan) => timespan.parse().map_err(bad_request),
        None => Ok(Timespan::default()),
    }
}

#[derive(Deserialize)]
pub struct ChannelQuery {
    pub channel: Option<String>,
}

#[derive(Deserialize)]
pub struct TraceQuery {
    pub channel: Option<String>,
    #[serde(default)]
    pub upto_cursor: bool,
}

#[derive(Deserialize)]
pub struct ChartQuery {
    pub model: Option<String>,
    pub field: String,
    pub timespan: Option<String>,
}

#[derive(Deserialize)]
pub struct NewWidget {
    pub name: String,
    pub kind: String,
    pub model: Option<String>,
    pub field: String,
    pub timespan: Option<String>,
}

#[derive(Deserialize)]
pub struct UploadQuery {
    pub file_name: String,
    pub precision: Option<f64>,
}

/// Read as a float so huge, negative or fractional positions still parse and
/// can be clamped by the driver.
#[derive(Deserialize)]
pub struct ScrubQuery {
    pub index: f64,
}

impl ScrubQuery {
    /// Saturating conversion; NaN lands on 0.
    pub fn position(&self) -> i64 {
        self.index as i64
    }
}

#[derive(Deserialize)]
pub struct SeekQuery {
    pub elapsed_ms: f64,
}

impl SeekQuery {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms.max(0.0) as u64)
    }
}

#[derive(Deserialize)]
pub struct SeriesQuery {
    pub channel: String,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Live panel: latest snapshot, rig pose and trace
pub async fn get_live(State(state): State<Arc<AppState>>) -> Json<PanelDto<LiveDto>> {
    Json(panel_to_dto(state.live.panel(), live_to_dto))
}

/// Recolour the live trace by another channel
pub async fn set_live_trace(
    Query(query): Query<ChannelQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<PanelDto<LiveDto>>, HandlerError> {
    let field = query
        .channel
        .ok_or_else(|| bad_request("missing channel"))?;
    state.live.set_trace_channel(parse_channel(&field)?);
    Ok(Json(panel_to_dto(state.live.panel(), live_to_dto)))
}

/// Chart panel of a chart widget. Charts are opened and closed with their
/// widgets, so a key no widget shows is a 404.
pub async fn get_chart(
    Query(query): Query<ChartQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<PanelDto<ChartDto>>, HandlerError> {
    let channel = parse_channel(&query.field)?;
    let key = ChartKey {
        model: parse_model(query.model.as_deref(), channel)?,
        channel,
        timespan: parse_timespan(query.timespan.as_deref())?,
    };

    let panel = state.charts.get(&key).ok_or((
        StatusCode::NOT_FOUND,
        format!(
            "no chart widget shows {}/{} over {}",
            key.model,
            key.channel,
            key.timespan.as_str()
        ),
    ))?;
    Ok(Json(panel_to_dto(panel, chart_to_dto)))
}

pub async fn list_widgets(State(state): State<Arc<AppState>>) -> Json<Vec<WidgetDto>> {
    Json(state.shell.widgets().into_iter().map(widget_to_dto).collect())
}

pub async fn add_widget(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewWidget>,
) -> Result<(StatusCode, Json<WidgetDto>), HandlerError> {
    let channel = parse_channel(&request.field)?;
    let model = parse_model(request.model.as_deref(), channel)?;
    let kind = match request.kind.as_str() {
        "chart" => WidgetKind::Chart {
            model,
            channel,
            timespan: parse_timespan(request.timespan.as_deref())?,
        },
        "stat" => WidgetKind::Stat { model, channel },
        other => return Err(bad_request(format!("unknown widget kind '{}'", other))),
    };

    let key = state.shell.add_widget(request.name, kind).await;
    let widget = state
        .shell
        .widgets()
        .into_iter()
        .find(|w| w.key == key)
        .ok_or((StatusCode::CONFLICT, format!("widget {} was removed", key)))?;
    Ok((StatusCode::CREATED, Json(widget_to_dto(widget))))
}

pub async fn remove_widget(
    Path(key): Path<u64>,
    State(state): State<Arc<AppState>>,
) -> StatusCode {
    if state.shell.remove_widget(WidgetKey(key)) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub async fn current_view(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "view": state.shell.view().map(|v| v.as_str()) }))
}

pub async fn navigate(
    Path(view): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let view: View = view.parse().map_err(bad_request)?;
    state.shell.navigate(view);
    Ok(Json(serde_json::json!({ "view": view.as_str() })))
}

pub async fn list_simulations(
    State(state): State<Arc<AppState>>,
) -> Json<PanelDto<Vec<SimulationDto>>> {
    Json(panel_to_dto(state.simulations.panel(), |records| {
        records.into_iter().map(simulation_to_dto).collect()
    }))
}

/// Upload an NC program as the raw request body
pub async fn upload_simulation(
    Query(query): Query<UploadQuery>,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), HandlerError> {
    if body.is_empty() {
        return Err(bad_request("empty upload"));
    }
    let precision = query.precision.unwrap_or(state.default_precision);

    match state
        .simulations
        .upload(&query.file_name, body, precision)
        .await
    {
        Ok(precision) => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "file_name": query.file_name, "precision": precision })),
        )),
        Err(e) => {
            tracing::error!("Upload of {} failed: {:#}", query.file_name, e);
            Err((StatusCode::BAD_GATEWAY, format!("{:#}", e)))
        }
    }
}

pub async fn load_simulation(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<FrameDto>, HandlerError> {
    let record = state
        .simulations
        .record(id)
        .ok_or((StatusCode::NOT_FOUND, format!("unknown simulation {}", id)))?;
    if !record.can_load() {
        return Err((
            StatusCode::CONFLICT,
            format!("simulation {} is {}", id, record.status.as_str()),
        ));
    }

    match state.simulations.load(id).await {
        Ok(frame) => Ok(Json(frame_to_dto(frame))),
        Err(e) => {
            tracing::error!("Loading simulation {} failed: {:#}", id, e);
            Err((StatusCode::BAD_GATEWAY, format!("{:#}", e)))
        }
    }
}

/// Mesh fragment referenced by a simulation sample
pub async fn get_mesh(
    Path(path): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, HandlerError> {
    match state.simulations.mesh(&path).await {
        Ok(mesh) => Ok(([(header::CONTENT_TYPE, "model/stl")], mesh).into_response()),
        Err(ApiError::Status { status: 404, .. }) => {
            Err((StatusCode::NOT_FOUND, format!("no mesh at {}", path)))
        }
        Err(e) => {
            tracing::warn!("Mesh {} unavailable: {}", path, e);
            Err((StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}

pub async fn get_playback(State(state): State<Arc<AppState>>) -> Json<FrameDto> {
    Json(frame_to_dto(state.playback.frame()))
}

pub async fn play(State(state): State<Arc<AppState>>) -> Json<FrameDto> {
    Json(frame_to_dto(state.playback.play()))
}

pub async fn pause(State(state): State<Arc<AppState>>) -> Json<FrameDto> {
    Json(frame_to_dto(state.playback.pause()))
}

pub async fn scrub(
    Query(query): Query<ScrubQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<FrameDto> {
    Json(frame_to_dto(state.playback.scrub(query.position())))
}

/// Position the cursor from elapsed replay time
pub async fn seek(
    Query(query): Query<SeekQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<FrameDto> {
    Json(frame_to_dto(state.playback.seek_clock(query.elapsed())))
}

/// Whole-run trace, or only the part played so far with `upto_cursor=true`
pub async fn get_trace(
    Query(query): Query<TraceQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<TraceDto>, HandlerError> {
    let channel = query.channel.as_deref().map(parse_channel).transpose()?;
    let view = if query.upto_cursor {
        state.playback.trace_to_cursor(channel)
    } else {
        state.playback.trace(channel)
    };
    Ok(Json(playback_trace_to_dto(view)))
}

/// One column of the loaded run against time since its first sample
pub async fn get_series(
    Query(query): Query<SeriesQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<SeriesDto> {
    let series = state.playback.series(&query.channel);
    Json(series_to_dto(query.channel, series))
}

/// Channel values of one loaded sample
pub async fn get_sample(
    Path(index): Path<usize>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, f64>>, HandlerError> {
    let sample = state
        .playback
        .sample_at(index)
        .ok_or((StatusCode::NOT_FOUND, format!("no sample at {}", index)))?;
    Ok(Json(sample_values(&sample)))
}

/// Server-sent stream of playback frames. The current frame is sent first,
/// then every change.
pub async fn stream_playback(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut frames = state.playback.subscribe();

    let stream = async_stream::stream! {
        loop {
            let frame = frame_to_dto(frames.borrow_and_update().clone());
            match Event::default().event("frame").json_data(&frame) {
                Ok(event) => yield Ok::<Event, Infallible>(event),
                Err(e) => tracing::warn!("Failed to encode playback frame: {}", e),
            }
            if frames.changed().await.is_err() {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
