// Channel and telemetry model definitions
use std::fmt;
use std::str::FromStr;

/// Backend table a channel is stored in. Sent as the `model=` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryModel {
    Cnc,
    Drive,
    Auxiliary,
    Prog,
    Tool,
    Wcs,
}

impl TelemetryModel {
    pub const ALL: [TelemetryModel; 6] = [
        TelemetryModel::Cnc,
        TelemetryModel::Drive,
        TelemetryModel::Auxiliary,
        TelemetryModel::Prog,
        TelemetryModel::Tool,
        TelemetryModel::Wcs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryModel::Cnc => "cnc",
            TelemetryModel::Drive => "drive",
            TelemetryModel::Auxiliary => "auxiliary",
            TelemetryModel::Prog => "prog",
            TelemetryModel::Tool => "tool",
            TelemetryModel::Wcs => "wcs",
        }
    }
}

impl fmt::Display for TelemetryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TelemetryModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| format!("unknown telemetry model '{}'", s))
    }
}

/// What kind of quantity a channel carries. Drives unit labels and which
/// colour range a trace uses by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Position,
    FollowingError,
    Torque,
    Speed,
    Feed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    XCurrPos,
    YCurrPos,
    ZCurrPos,
    XFollDist,
    YFollDist,
    ZFollDist,
    S1ActTrq,
    S1Actrev,
    Actfeed,
    PredOriginS1ActTrq,
    PredOriginXActTrq,
    PredOriginYActTrq,
    PredOriginZActTrq,
}

impl Channel {
    pub const ALL: [Channel; 13] = [
        Channel::XCurrPos,
        Channel::YCurrPos,
        Channel::ZCurrPos,
        Channel::XFollDist,
        Channel::YFollDist,
        Channel::ZFollDist,
        Channel::S1ActTrq,
        Channel::S1Actrev,
        Channel::Actfeed,
        Channel::PredOriginS1ActTrq,
        Channel::PredOriginXActTrq,
        Channel::PredOriginYActTrq,
        Channel::PredOriginZActTrq,
    ];

    /// Canonical key as the backend spells the column.
    pub fn key(&self) -> &'static str {
        match self {
            Channel::XCurrPos => "XCurrPos",
            Channel::YCurrPos => "YCurrPos",
            Channel::ZCurrPos => "ZCurrPos",
            Channel::XFollDist => "XFollDist",
            Channel::YFollDist => "YFollDist",
            Channel::ZFollDist => "ZFollDist",
            Channel::S1ActTrq => "S1ActTrq",
            Channel::S1Actrev => "S1Actrev",
            Channel::Actfeed => "Actfeed",
            Channel::PredOriginS1ActTrq => "PredOriginS1ActTrq",
            Channel::PredOriginXActTrq => "PredOriginXActTrq",
            Channel::PredOriginYActTrq => "PredOriginYActTrq",
            Channel::PredOriginZActTrq => "PredOriginZActTrq",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Channel::XCurrPos => "X Position",
            Channel::YCurrPos => "Y Position",
            Channel::ZCurrPos => "Z Position",
            Channel::XFollDist => "X Error",
            Channel::YFollDist => "Y Error",
            Channel::ZFollDist => "Z Error",
            Channel::S1ActTrq => "Spindle Torque",
            Channel::S1Actrev => "Spindle Speed",
            Channel::Actfeed => "Feed",
            Channel::PredOriginS1ActTrq => "Predicted Spindle Torque",
            Channel::PredOriginXActTrq => "Predicted X Torque",
            Channel::PredOriginYActTrq => "Predicted Y Torque",
            Channel::PredOriginZActTrq => "Predicted Z Torque",
        }
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            Channel::XCurrPos | Channel::YCurrPos | Channel::ZCurrPos => ChannelKind::Position,
            Channel::XFollDist | Channel::YFollDist | Channel::ZFollDist => {
                ChannelKind::FollowingError
            }
            Channel::S1ActTrq
            | Channel::PredOriginS1ActTrq
            | Channel::PredOriginXActTrq
            | Channel::PredOriginYActTrq
            | Channel::PredOriginZActTrq => ChannelKind::Torque,
            Channel::S1Actrev => ChannelKind::Speed,
            Channel::Actfeed => ChannelKind::Feed,
        }
    }

    pub fn unit(&self) -> &'static str {
        match self.kind() {
            ChannelKind::Position | ChannelKind::FollowingError => "mm",
            ChannelKind::Torque => "%",
            ChannelKind::Speed => "rpm",
            ChannelKind::Feed => "mm/min",
        }
    }

    /// Table the live backend keeps this channel in.
    pub fn model(&self) -> TelemetryModel {
        match self {
            Channel::XCurrPos
            | Channel::YCurrPos
            | Channel::ZCurrPos
            | Channel::S1Actrev
            | Channel::Actfeed => TelemetryModel::Cnc,
            Channel::XFollDist
            | Channel::YFollDist
            | Channel::ZFollDist
            | Channel::S1ActTrq
            | Channel::PredOriginS1ActTrq
            | Channel::PredOriginXActTrq
            | Channel::PredOriginYActTrq
            | Channel::PredOriginZActTrq => TelemetryModel::Drive,
        }
    }

    /// Case-insensitive lookup (`xcurrpos` and `XCurrPos` are the same column).
    pub fn from_key(key: &str) -> Option<Channel> {
        Self::ALL
            .into_iter()
            .find(|c| c.key().eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::from_key(s).ok_or_else(|| format!("unknown channel '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_lookup_ignores_case() {
        assert_eq!(Channel::from_key("xcurrpos"), Some(Channel::XCurrPos));
        assert_eq!(Channel::from_key("YFOLLDIST"), Some(Channel::YFollDist));
        assert_eq!(Channel::from_key("S1ActTrq"), Some(Channel::S1ActTrq));
        assert_eq!(Channel::from_key("nope"), None);
    }

    #[test]
    fn test_channel_metadata() {
        assert_eq!(Channel::ZFollDist.display_name(), "Z Error");
        assert_eq!(Channel::ZFollDist.unit(), "mm");
        assert_eq!(Channel::XCurrPos.model(), TelemetryModel::Cnc);
        assert_eq!(Channel::S1ActTrq.model(), TelemetryModel::Drive);
    }

    #[test]
    fn test_model_parse() {
        assert_eq!("Drive".parse::<TelemetryModel>(), Ok(TelemetryModel::Drive));
        assert!("bogus".parse::<TelemetryModel>().is_err());
        assert_eq!(TelemetryModel::Wcs.to_string(), "wcs");
    }
}
