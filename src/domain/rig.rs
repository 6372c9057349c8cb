// Rig pose and coordinate mapping
use super::channel::Channel;
use super::sample::Sample;

/// Linear transform from a raw axis value to a joint offset:
/// `offset + raw` or `offset - raw`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisTransform {
    pub invert: bool,
    pub offset: f64,
}

impl AxisTransform {
    pub const fn new(invert: bool, offset: f64) -> Self {
        Self { invert, offset }
    }

    pub fn apply(&self, raw: f64) -> f64 {
        if self.invert {
            self.offset - raw
        } else {
            self.offset + raw
        }
    }
}

/// Transforms for the three moving joints of the rig.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigGeometry {
    /// Bridge travels along the machine Y axis.
    pub bridge: AxisTransform,
    /// Axis carriage travels along X on the bridge.
    pub axis: AxisTransform,
    /// Spindle carriage travels along Z on the axis carriage.
    pub spindle: AxisTransform,
}

impl Default for RigGeometry {
    fn default() -> Self {
        // Offsets place each mesh's origin at machine zero.
        Self {
            bridge: AxisTransform::new(false, -450.0),
            axis: AxisTransform::new(false, 550.0),
            spindle: AxisTransform::new(false, -250.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigPose {
    pub bridge: f64,
    pub axis: f64,
    pub spindle: f64,
}

impl RigPose {
    /// Pose with every axis at raw zero.
    pub fn neutral(geometry: &RigGeometry) -> Self {
        Self {
            bridge: geometry.bridge.apply(0.0),
            axis: geometry.axis.apply(0.0),
            spindle: geometry.spindle.apply(0.0),
        }
    }
}

/// Maps samples to rig poses, keeping the last good value per joint so a
/// sample with a missing channel never yields a broken pose.
#[derive(Debug, Clone)]
pub struct CoordinateMapper {
    geometry: RigGeometry,
    pose: RigPose,
}

impl CoordinateMapper {
    pub fn new(geometry: RigGeometry) -> Self {
        Self {
            geometry,
            pose: RigPose::neutral(&geometry),
        }
    }

    pub fn pose(&self) -> RigPose {
        self.pose
    }

    /// Pure mapping. Joints whose channel is absent fall back to `previous`.
    pub fn map(geometry: &RigGeometry, sample: &Sample, previous: RigPose) -> RigPose {
        RigPose {
            bridge: sample
                .get(Channel::YCurrPos)
                .map(|v| geometry.bridge.apply(v))
                .unwrap_or(previous.bridge),
            axis: sample
                .get(Channel::XCurrPos)
                .map(|v| geometry.axis.apply(v))
                .unwrap_or(previous.axis),
            spindle: sample
                .get(Channel::ZCurrPos)
                .map(|v| geometry.spindle.apply(v))
                .unwrap_or(previous.spindle),
        }
    }

    pub fn update(&mut self, sample: &Sample) -> RigPose {
        let pose = Self::map(&self.geometry, sample, self.pose);
        if pose != self.pose {
            tracing::trace!(
                "Rig pose bridge={:.3} axis={:.3} spindle={:.3}",
                pose.bridge,
                pose.axis,
                pose.spindle
            );
        }
        self.pose = pose;
        pose
    }
}
