// Mapper to convert view models to JSON wire types
use crate::application::live_service::LiveView;
use crate::application::playback_service::{PlaybackFrame, TraceView};
use crate::domain::channel::Channel;
use crate::domain::dashboard::{PanelState, Widget, WidgetKind};
use crate::domain::playback::PlaybackStatus;
use crate::domain::rig::RigPose;
use crate::domain::sample::Sample;
use crate::domain::simulation::SimulationRecord;
use crate::domain::telemetry::ChartWindow;
use crate::domain::trace::{ColorScale, PathTrace, Point3};
use serde::Serialize;
use std::collections::BTreeMap;

/// Panel wrapper: `{"state":"loading"}`, `{"state":"error","data":"..."}`
/// or `{"state":"ready","data":{...}}`.
#[derive(Debug, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "lowercase")]
pub enum PanelDto<T> {
    Loading,
    Error(String),
    Ready(T),
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PoseDto {
    pub bridge: f64,
    pub axis: f64,
    pub spindle: f64,
}

#[derive(Debug, Serialize)]
pub struct SegmentDto {
    pub from: [f64; 3],
    pub to: [f64; 3],
    pub color: String,
}

#[derive(Debug, Serialize)]
pub struct LegendDto {
    pub channel: &'static str,
    pub unit: &'static str,
    pub min: f64,
    pub max: f64,
    pub min_color: String,
    pub max_color: String,
}

#[derive(Debug, Serialize)]
pub struct TraceDto {
    pub legend: LegendDto,
    pub segments: Vec<SegmentDto>,
}

#[derive(Debug, Serialize)]
pub struct LiveDto {
    pub time_ms: i64,
    pub values: BTreeMap<String, f64>,
    pub pose: PoseDto,
    pub trace: TraceDto,
    pub samples: usize,
}

#[derive(Debug, Serialize)]
pub struct ChartPointDto {
    pub t: i64,
    pub v: f64,
}

#[derive(Debug, Serialize)]
pub struct ChartDto {
    pub model: &'static str,
    pub field: &'static str,
    pub name: &'static str,
    pub unit: &'static str,
    pub timespan: &'static str,
    pub max_points: usize,
    pub points: Vec<ChartPointDto>,
}

#[derive(Debug, Serialize)]
pub struct SeriesDto {
    pub channel: String,
    pub points: Vec<ChartPointDto>,
}

#[derive(Debug, Serialize)]
pub struct WidgetDto {
    pub key: u64,
    pub name: String,
    pub kind: &'static str,
    pub model: &'static str,
    pub field: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timespan: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct SimulationDto {
    pub id: i64,
    pub name: String,
    pub time_ms: i64,
    pub precision: Option<f64>,
    pub status: &'static str,
    pub can_load: bool,
}

#[derive(Debug, Serialize)]
pub struct FrameDto {
    pub simulation_id: Option<i64>,
    pub status: &'static str,
    pub len: usize,
    pub cursor: Option<usize>,
    pub time_ms: Option<i64>,
    pub pose: Option<PoseDto>,
    pub mesh_path: Option<String>,
}

pub fn panel_to_dto<T, U>(panel: PanelState<T>, map: impl FnOnce(T) -> U) -> PanelDto<U> {
    match panel {
        PanelState::Loading => PanelDto::Loading,
        PanelState::Error(message) => PanelDto::Error(message),
        PanelState::Ready(value) => PanelDto::Ready(map(value)),
    }
}

pub fn pose_to_dto(pose: RigPose) -> PoseDto {
    PoseDto {
        bridge: pose.bridge,
        axis: pose.axis,
        spindle: pose.spindle,
    }
}

fn point(p: Point3) -> [f64; 3] {
    [p.x, p.y, p.z]
}

fn legend(channel: Channel, scale: ColorScale) -> LegendDto {
    LegendDto {
        channel: channel.key(),
        unit: channel.unit(),
        min: scale.min,
        max: scale.max,
        min_color: scale.color(scale.min).to_hex(),
        max_color: scale.color(scale.max).to_hex(),
    }
}

fn trace_to_dto(channel: Channel, scale: ColorScale, trace: PathTrace) -> TraceDto {
    TraceDto {
        legend: legend(channel, scale),
        segments: trace
            .segments
            .into_iter()
            .map(|s| SegmentDto {
                from: point(s.from),
                to: point(s.to),
                color: s.color.to_hex(),
            })
            .collect(),
    }
}

/// Every numeric value of a sample. Catalogue channels use their canonical
/// key; anything else keeps the name it arrived with.
pub fn sample_values(sample: &Sample) -> BTreeMap<String, f64> {
    sample
        .fields()
        .map(|(name, value)| {
            let key = Channel::from_key(name).map_or(name, |c| c.key());
            (key.to_string(), value)
        })
        .collect()
}

pub fn live_to_dto(view: LiveView) -> LiveDto {
    LiveDto {
        time_ms: view.latest.time_ms,
        values: sample_values(&view.latest),
        pose: pose_to_dto(view.pose),
        trace: trace_to_dto(view.trace_channel, view.scale, view.trace),
        samples: view.samples,
    }
}

pub fn chart_to_dto(window: ChartWindow) -> ChartDto {
    let key = window.key;
    ChartDto {
        model: key.model.as_str(),
        field: key.channel.key(),
        name: key.channel.display_name(),
        unit: key.channel.unit(),
        timespan: key.timespan.as_str(),
        max_points: window.max_points(),
        points: window
            .points
            .into_iter()
            .map(|p| ChartPointDto { t: p.time_ms, v: p.value })
            .collect(),
    }
}

pub fn widget_to_dto(widget: Widget) -> WidgetDto {
    let (kind, model, timespan) = match widget.kind {
        WidgetKind::Chart { model, timespan, .. } => ("chart", model, Some(timespan.as_str())),
        WidgetKind::Stat { model, .. } => ("stat", model, None),
    };
    WidgetDto {
        key: widget.key.0,
        name: widget.name,
        kind,
        model: model.as_str(),
        field: widget.kind.channel().key(),
        timespan,
    }
}

pub fn simulation_to_dto(record: SimulationRecord) -> SimulationDto {
    SimulationDto {
        id: record.id,
        name: record.display_name(),
        time_ms: record.time_ms,
        precision: record.precision,
        status: record.status.as_str(),
        can_load: record.can_load(),
    }
}

pub fn frame_to_dto(frame: PlaybackFrame) -> FrameDto {
    FrameDto {
        simulation_id: frame.simulation_id,
        status: match frame.status {
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Stopped => "stopped",
        },
        len: frame.len,
        cursor: frame.cursor,
        time_ms: frame.time_ms,
        pose: frame.pose.map(pose_to_dto),
        mesh_path: frame.mesh_path,
    }
}

pub fn series_to_dto(channel: String, series: Vec<(i64, f64)>) -> SeriesDto {
    SeriesDto {
        channel,
        points: series
            .into_iter()
            .map(|(t, v)| ChartPointDto { t, v })
            .collect(),
    }
}

pub fn playback_trace_to_dto(view: TraceView) -> TraceDto {
    trace_to_dto(view.channel, view.scale, view.trace)
}
