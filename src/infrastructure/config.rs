use crate::domain::channel::Channel;
use crate::domain::playback::EndBehavior;
use crate::domain::rig::{AxisTransform, RigGeometry};
use crate::domain::trace::{ColorRanges, ColorScale};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub polling: PollingSettings,
    #[serde(default)]
    pub live: LiveSettings,
    #[serde(default)]
    pub charts: ChartSettings,
    #[serde(default)]
    pub playback: PlaybackSettings,
    #[serde(default)]
    pub upload: UploadSettings,
    #[serde(default)]
    pub rig: RigSettings,
    #[serde(default)]
    pub trace: TraceSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingSettings {
    pub live_ms: u64,
    pub charts_ms: u64,
    pub simulations_ms: u64,
}

impl PollingSettings {
    pub fn live(&self) -> Duration {
        Duration::from_millis(self.live_ms.max(1))
    }

    pub fn charts(&self) -> Duration {
        Duration::from_millis(self.charts_ms.max(1))
    }

    pub fn simulations(&self) -> Duration {
        Duration::from_millis(self.simulations_ms.max(1))
    }
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            live_ms: 3_000,
            charts_ms: 3_000,
            simulations_ms: 5_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LiveSettings {
    /// Samples kept in the rolling live sequence
    pub capacity: usize,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self { capacity: 600 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChartSettings {
    pub max_points: usize,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self { max_points: 500 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PlaybackSettings {
    pub tick_ms: u64,
    pub end: EndSetting,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            tick_ms: 40,
            end: EndSetting::default(),
        }
    }
}

impl PlaybackSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EndSetting {
    #[default]
    Loop,
    Clamp,
}

impl From<EndSetting> for EndBehavior {
    fn from(value: EndSetting) -> Self {
        match value {
            EndSetting::Loop => EndBehavior::Loop,
            EndSetting::Clamp => EndBehavior::Clamp,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UploadSettings {
    pub min_precision: f64,
    pub max_precision: f64,
    pub default_precision: f64,
}

fn default_precision() -> f64 {
    0.5
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            min_precision: 0.05,
            max_precision: 2.0,
            default_precision: default_precision(),
        }
    }
}

impl UploadSettings {
    pub fn precision_range(&self) -> anyhow::Result<RangeInclusive<f64>> {
        if !(self.min_precision > 0.0 && self.min_precision <= self.max_precision) {
            anyhow::bail!(
                "Invalid upload precision range {}..={}",
                self.min_precision,
                self.max_precision
            );
        }
        Ok(self.min_precision..=self.max_precision)
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct AxisSetting {
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub offset: f64,
}

impl From<AxisSetting> for AxisTransform {
    fn from(value: AxisSetting) -> Self {
        AxisTransform::new(value.invert, value.offset)
    }
}

impl From<AxisTransform> for AxisSetting {
    fn from(value: AxisTransform) -> Self {
        Self {
            invert: value.invert,
            offset: value.offset,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RigSettings {
    pub bridge: AxisSetting,
    pub axis: AxisSetting,
    pub spindle: AxisSetting,
}

impl Default for RigSettings {
    fn default() -> Self {
        let geometry = RigGeometry::default();
        Self {
            bridge: geometry.bridge.into(),
            axis: geometry.axis.into(),
            spindle: geometry.spindle.into(),
        }
    }
}

impl RigSettings {
    pub fn geometry(&self) -> RigGeometry {
        RigGeometry {
            bridge: self.bridge.into(),
            axis: self.axis.into(),
            spindle: self.spindle.into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RangeSetting {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TraceSettings {
    pub lift: f64,
    pub channel: String,
    /// Colour ranges keyed by channel name
    pub ranges: HashMap<String, RangeSetting>,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            lift: 230.0,
            channel: Channel::XFollDist.key().to_string(),
            ranges: HashMap::new(),
        }
    }
}

impl TraceSettings {
    pub fn channel(&self) -> anyhow::Result<Channel> {
        self.channel.parse().map_err(anyhow::Error::msg)
    }

    /// Following-error legend ranges, overridden by anything configured.
    pub fn color_ranges(&self) -> anyhow::Result<ColorRanges> {
        let defaults = ColorRanges::following_error_defaults();
        let mut ranges: HashMap<Channel, ColorScale> = Channel::ALL
            .into_iter()
            .filter_map(|c| defaults.get(c).map(|scale| (c, scale)))
            .collect();

        for (name, range) in &self.ranges {
            let channel: Channel = name.parse().map_err(anyhow::Error::msg)?;
            if range.max <= range.min {
                anyhow::bail!(
                    "Colour range for {} is empty ({}..{})",
                    channel,
                    range.min,
                    range.max
                );
            }
            ranges.insert(channel, ColorScale::new(range.min, range.max));
        }

        Ok(ColorRanges::new(ranges))
    }
}

pub fn load_app_config() -> anyhow::Result<AppConfig> {
    load_app_config_from("config/dashboard")
}

/// Read `<path>.toml` (optional) and `DASHBOARD__SECTION__KEY` environment
/// overrides.
pub fn load_app_config_from(path: &str) -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix("DASHBOARD")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Build a URL with percent-encoded query parameters
pub fn build_url(base: &str, path: &str, params: &[(&str, &str)]) -> String {
    let mut url = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    for (i, (key, value)) in params.iter().enumerate() {
        url.push(if i == 0 { '?' } else { '&' });
        url.push_str(&urlencoding::encode(key));
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    }
    url
}
