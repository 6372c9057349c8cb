// Chart-facing telemetry domain models
use super::channel::{Channel, TelemetryModel};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesPoint {
    pub time_ms: i64,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(time_ms: i64, value: f64) -> Self {
        Self { time_ms, value }
    }
}

/// Named history windows the backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Timespan {
    ThirtyMinutes,
    #[default]
    OneHour,
    OneDay,
    OneMonth,
}

impl Timespan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timespan::ThirtyMinutes => "30min",
            Timespan::OneHour => "1hr",
            Timespan::OneDay => "1day",
            Timespan::OneMonth => "1month",
        }
    }

    pub fn duration(&self) -> Duration {
        const MINUTE: u64 = 60;
        match self {
            Timespan::ThirtyMinutes => Duration::from_secs(30 * MINUTE),
            Timespan::OneHour => Duration::from_secs(60 * MINUTE),
            Timespan::OneDay => Duration::from_secs(24 * 60 * MINUTE),
            Timespan::OneMonth => Duration::from_secs(30 * 24 * 60 * MINUTE),
        }
    }
}

impl FromStr for Timespan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "30min" => Ok(Timespan::ThirtyMinutes),
            "1hr" => Ok(Timespan::OneHour),
            "1day" => Ok(Timespan::OneDay),
            "1month" => Ok(Timespan::OneMonth),
            other => Err(format!("unknown timespan '{}'", other)),
        }
    }
}

/// Identifies one chart series on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChartKey {
    pub model: TelemetryModel,
    pub channel: Channel,
    pub timespan: Timespan,
}

/// Points of one chart, seeded from history and extended by polling.
#[derive(Debug, Clone)]
pub struct ChartWindow {
    pub key: ChartKey,
    pub points: Vec<TimeSeriesPoint>,
    max_points: usize,
}

impl ChartWindow {
    pub fn seeded(key: ChartKey, history: Vec<TimeSeriesPoint>, max_points: usize) -> Self {
        let max_points = max_points.max(1);
        Self {
            key,
            points: downsample_points(history, max_points),
            max_points,
        }
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    /// Append the latest reading. Readings not newer than the last point are
    /// ignored. Points older than the timespan are dropped, as is the oldest
    /// point once the cap is reached.
    pub fn append(&mut self, point: TimeSeriesPoint) -> bool {
        if let Some(last) = self.points.last() {
            if point.time_ms <= last.time_ms {
                return false;
            }
        }
        if self.points.len() >= self.max_points {
            let excess = self.points.len() + 1 - self.max_points;
            self.points.drain(..excess);
        }

        let span_ms = i64::try_from(self.key.timespan.duration().as_millis()).unwrap_or(i64::MAX);
        let cutoff = point.time_ms.saturating_sub(span_ms);
        let expired = self.points.iter().take_while(|p| p.time_ms < cutoff).count();
        self.points.drain(..expired);

        self.points.push(point);
        true
    }
}

/// Downsample time series points using bucket averaging
pub fn downsample_points(points: Vec<TimeSeriesPoint>, max_points: usize) -> Vec<TimeSeriesPoint> {
    if points.is_empty() || max_points == 0 || points.len() <= max_points {
        return points;
    }

    let bucket_size = (points.len() as f64 / max_points as f64).ceil() as usize;
    let mut downsampled = Vec::with_capacity(max_points);

    for chunk in points.chunks(bucket_size) {
        // Middle point's timestamp, average value
        let mid_idx = chunk.len() / 2;
        let avg_value = chunk.iter().map(|p| p.value).sum::<f64>() / chunk.len() as f64;

        downsampled.push(TimeSeriesPoint::new(chunk[mid_idx].time_ms, avg_value));
    }

    downsampled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ChartKey {
        ChartKey {
            model: TelemetryModel::Cnc,
            channel: Channel::XCurrPos,
            timespan: Timespan::OneHour,
        }
    }

    #[test]
    fn test_timespan_round_trip_names() {
        for name in ["30min", "1hr", "1day", "1month"] {
            let ts: Timespan = name.parse().unwrap();
            assert_eq!(ts.as_str(), name);
        }
        assert!("2hr".parse::<Timespan>().is_err());
        assert_eq!(Timespan::OneDay.duration(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_downsample_caps_and_keeps_order() {
        let points: Vec<TimeSeriesPoint> = (0..1000)
            .map(|i| TimeSeriesPoint::new(i, i as f64))
            .collect();
        let out = downsample_points(points, 150);

        assert!(out.len() <= 150);
        assert!(out.windows(2).all(|w| w[0].time_ms < w[1].time_ms));
        // First bucket covers 0..7 -> average 3
        assert_eq!(out[0].value, 3.0);
    }

    #[test]
    fn test_downsample_leaves_short_series_alone() {
        let points = vec![TimeSeriesPoint::new(1, 1.0), TimeSeriesPoint::new(2, 2.0)];
        assert_eq!(downsample_points(points.clone(), 10), points);
    }

    #[test]
    fn test_window_append_rolls_and_rejects_stale() {
        let history = (0..3).map(|i| TimeSeriesPoint::new(i, 0.0)).collect();
        let mut window = ChartWindow::seeded(key(), history, 3);

        assert!(!window.append(TimeSeriesPoint::new(2, 9.0)));
        assert!(window.append(TimeSeriesPoint::new(3, 9.0)));

        assert_eq!(window.points.len(), 3);
        assert_eq!(window.points[0].time_ms, 1);
        assert_eq!(window.points[2].value, 9.0);
    }

    #[test]
    fn test_window_append_drops_points_outside_timespan() {
        let thirty_minutes = ChartKey {
            timespan: Timespan::ThirtyMinutes,
            ..key()
        };
        let history = vec![TimeSeriesPoint::new(0, 1.0), TimeSeriesPoint::new(60_000, 2.0)];
        let mut window = ChartWindow::seeded(thirty_minutes, history, 100);

        assert!(window.append(TimeSeriesPoint::new(30 * 60_000 + 1, 3.0)));
        assert_eq!(
            window.points.iter().map(|p| p.time_ms).collect::<Vec<_>>(),
            vec![60_000, 1_800_001]
        );
    }
}
