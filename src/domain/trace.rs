// Path trace construction and colour mapping
use super::channel::Channel;
use super::sample::{Sample, SampleSequence};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Linear green → red gradient between `min` and `max`, clamped outside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub min: f64,
    pub max: f64,
}

impl ColorScale {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Normalized position in `[0, 1]`. A degenerate range maps to 0.
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span.is_nan() || span <= 0.0 || !value.is_finite() {
            return 0.0;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }

    pub fn color(&self, value: f64) -> Rgb {
        let t = self.normalize(value);
        let r = (255.0 * t).floor() as u8;
        let g = (255.0 * (1.0 - t)).floor() as u8;
        Rgb::new(r, g, 0)
    }

    /// Range spanning every value of `channel` in the sequence.
    pub fn fit(sequence: &SampleSequence, channel: Channel) -> Option<Self> {
        let (min, max) = sequence
            .iter()
            .filter_map(|s| s.get(channel))
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;
        Some(Self::new(min, max))
    }
}

/// Configured colour ranges per channel. Channels without a configured range
/// are fitted to the data being drawn.
#[derive(Debug, Clone, Default)]
pub struct ColorRanges {
    ranges: HashMap<Channel, ColorScale>,
}

impl ColorRanges {
    pub fn new(ranges: HashMap<Channel, ColorScale>) -> Self {
        Self { ranges }
    }

    /// Legend ranges of the following-error channels.
    pub fn following_error_defaults() -> Self {
        Self::new(HashMap::from([
            (Channel::XFollDist, ColorScale::new(-2.16, 2.05)),
            (Channel::YFollDist, ColorScale::new(3.46, 3.90)),
            (Channel::ZFollDist, ColorScale::new(-4.42, 4.25)),
        ]))
    }

    pub fn get(&self, channel: Channel) -> Option<ColorScale> {
        self.ranges.get(&channel).copied()
    }

    pub fn scale_for(&self, channel: Channel, sequence: &SampleSequence) -> ColorScale {
        self.get(channel)
            .or_else(|| ColorScale::fit(sequence, channel))
            .unwrap_or(ColorScale::new(0.0, 1.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub from: Point3,
    pub to: Point3,
    pub color: Rgb,
}

/// Which channel colours the trace and over what range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceStyle {
    pub channel: Channel,
    pub scale: ColorScale,
    /// Vertical lift applied to machine Z so the trace sits on the bed.
    pub lift: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathTrace {
    pub segments: Vec<Segment>,
}

impl PathTrace {
    /// Scene point for a sample: `(x, z + lift, -y)`. `None` if any position
    /// channel is missing.
    pub fn scene_point(sample: &Sample, lift: f64) -> Option<Point3> {
        let x = sample.get(Channel::XCurrPos)?;
        let y = sample.get(Channel::YCurrPos)?;
        let z = sample.get(Channel::ZCurrPos)?;
        Some(Point3 {
            x,
            y: z + lift,
            z: -y,
        })
    }

    pub fn build(sequence: &SampleSequence, style: &TraceStyle) -> Self {
        Self::build_until(sequence, style, sequence.len())
    }

    /// Trace over the first `end` samples of the sequence.
    pub fn build_until(sequence: &SampleSequence, style: &TraceStyle, end: usize) -> Self {
        let mut segments = Vec::new();
        let mut previous: Option<Point3> = None;
        let mut last_value: Option<f64> = None;

        for sample in sequence.iter().take(end) {
            if let Some(v) = sample.get(style.channel) {
                last_value = Some(v);
            }
            let Some(point) = Self::scene_point(sample, style.lift) else {
                continue;
            };
            if let Some(from) = previous {
                let color = style.scale.color(last_value.unwrap_or(style.scale.min));
                segments.push(Segment {
                    from,
                    to: point,
                    color,
                });
            }
            previous = Some(point);
        }

        Self { segments }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
