// Dashboard shell domain model
use super::channel::{Channel, TelemetryModel};
use super::telemetry::Timespan;
use std::fmt;
use std::str::FromStr;

/// The three states any data-driven panel can be in.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelState<T> {
    Loading,
    Error(String),
    Ready(T),
}

impl<T> PanelState<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            PanelState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn ready_mut(&mut self) -> Option<&mut T> {
        match self {
            PanelState::Ready(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> Default for PanelState<T> {
    fn default() -> Self {
        PanelState::Loading
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    LiveData,
    Simulation,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::LiveData => "live",
            View::Simulation => "simulation",
        }
    }
}

impl FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(View::LiveData),
            "simulation" => Ok(View::Simulation),
            other => Err(format!("unknown view '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WidgetKey(pub u64);

impl fmt::Display for WidgetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Chart {
        model: TelemetryModel,
        channel: Channel,
        timespan: Timespan,
    },
    Stat {
        model: TelemetryModel,
        channel: Channel,
    },
}

impl WidgetKind {
    pub fn channel(&self) -> Channel {
        match self {
            WidgetKind::Chart { channel, .. } | WidgetKind::Stat { channel, .. } => *channel,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub key: WidgetKey,
    pub name: String,
    pub kind: WidgetKind,
}

/// In-memory list of active widgets. Keys are never reused within a board.
#[derive(Debug, Clone, Default)]
pub struct WidgetBoard {
    widgets: Vec<Widget>,
    next_key: u64,
}

impl WidgetBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn add(&mut self, name: impl Into<String>, kind: WidgetKind) -> WidgetKey {
        let key = WidgetKey(self.next_key);
        self.next_key += 1;
        self.widgets.push(Widget {
            key,
            name: name.into(),
            kind,
        });
        key
    }

    pub fn remove(&mut self, key: WidgetKey) -> bool {
        let before = self.widgets.len();
        self.widgets.retain(|w| w.key != key);
        self.widgets.len() != before
    }

    /// Drop every widget. The key counter keeps counting.
    pub fn clear(&mut self) {
        self.widgets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(channel: Channel) -> WidgetKind {
        WidgetKind::Stat {
            model: channel.model(),
            channel,
        }
    }

    #[test]
    fn test_remove_by_key_with_duplicate_names() {
        let mut board = WidgetBoard::new();
        let first = board.add("X Position", stat(Channel::XCurrPos));
        let second = board.add("X Position", stat(Channel::XCurrPos));
        assert_ne!(first, second);

        assert!(board.remove(first));
        assert_eq!(board.len(), 1);
        assert_eq!(board.widgets()[0].key, second);
        assert!(!board.remove(first));
    }

    #[test]
    fn test_keys_not_reused_after_clear() {
        let mut board = WidgetBoard::new();
        let a = board.add("a", stat(Channel::S1ActTrq));
        board.clear();
        let b = board.add("a", stat(Channel::S1ActTrq));
        assert!(b > a);
    }

    #[test]
    fn test_view_parse() {
        assert_eq!("live".parse::<View>(), Ok(View::LiveData));
        assert_eq!("simulation".parse::<View>(), Ok(View::Simulation));
        assert!("settings".parse::<View>().is_err());
    }
}
