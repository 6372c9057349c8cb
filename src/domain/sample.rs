// Sample and sample sequence domain models
use super::channel::Channel;
use std::collections::{HashMap, VecDeque};

/// One telemetry or simulation record.
///
/// Values are looked up by lowercased name; the name as the backend spelled
/// it is kept alongside for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub time_ms: i64,
    values: HashMap<String, (String, f64)>,
    pub mesh_path: Option<String>,
}

impl Sample {
    pub fn new(time_ms: i64) -> Self {
        Self {
            time_ms,
            values: HashMap::new(),
            mesh_path: None,
        }
    }

    #[cfg(test)]
    pub fn with(mut self, key: &str, value: f64) -> Self {
        self.insert(key, value);
        self
    }

    #[cfg(test)]
    pub fn with_mesh_path(mut self, path: impl Into<String>) -> Self {
        self.mesh_path = Some(path.into());
        self
    }

    /// Either backend spelling of a name hits the same entry; the last
    /// spelling inserted is the one reported by `fields`.
    pub fn insert(&mut self, key: &str, value: f64) {
        self.values
            .insert(key.to_ascii_lowercase(), (key.to_string(), value));
    }

    /// Value of a known channel. Non-finite values count as missing.
    pub fn get(&self, channel: Channel) -> Option<f64> {
        self.get_raw(channel.key())
    }

    pub fn get_raw(&self, key: &str) -> Option<f64> {
        self.values
            .get(&key.to_ascii_lowercase())
            .map(|(_, v)| *v)
            .filter(|v| v.is_finite())
    }

    /// Every finite value under its raw name, in no particular order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.values
            .values()
            .filter(|(_, v)| v.is_finite())
            .map(|(name, v)| (name.as_str(), *v))
    }
}

/// Ordered, time-indexed samples.
///
/// `Fixed` sequences come from simulation playback and never change after
/// loading. `Rolling` sequences back live mode: append-only, the oldest
/// sample is evicted once `capacity` is reached.
#[derive(Debug, Clone)]
pub enum SampleSequence {
    Fixed(Vec<Sample>),
    Rolling {
        samples: VecDeque<Sample>,
        capacity: usize,
    },
}

impl SampleSequence {
    pub fn fixed(samples: Vec<Sample>) -> Self {
        SampleSequence::Fixed(samples)
    }

    pub fn rolling(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        SampleSequence::Rolling {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SampleSequence::Fixed(samples) => samples.len(),
            SampleSequence::Rolling { samples, .. } => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        match self {
            SampleSequence::Fixed(samples) => samples.get(index),
            SampleSequence::Rolling { samples, .. } => samples.get(index),
        }
    }

    pub fn first(&self) -> Option<&Sample> {
        self.get(0)
    }

    pub fn last(&self) -> Option<&Sample> {
        if self.is_empty() {
            return None;
        }
        self.get(self.len() - 1)
    }

    /// Append to a rolling sequence. Returns `false` for fixed sequences,
    /// which are never mutated after loading.
    pub fn push(&mut self, sample: Sample) -> bool {
        match self {
            SampleSequence::Fixed(_) => false,
            SampleSequence::Rolling { samples, capacity } => {
                if samples.len() == *capacity {
                    samples.pop_front();
                }
                samples.push_back(sample);
                true
            }
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &Sample> + '_> {
        match self {
            SampleSequence::Fixed(samples) => Box::new(samples.iter()),
            SampleSequence::Rolling { samples, .. } => Box::new(samples.iter()),
        }
    }
}

impl Default for SampleSequence {
    fn default() -> Self {
        SampleSequence::Fixed(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_lookup_is_case_insensitive() {
        let sample = Sample::new(0).with("xcurrpos", 12.5).with("YFollDist", 3.5);
        assert_eq!(sample.get(Channel::XCurrPos), Some(12.5));
        assert_eq!(sample.get(Channel::YFollDist), Some(3.5));
        assert_eq!(sample.get(Channel::ZCurrPos), None);
    }

    #[test]
    fn test_non_finite_values_are_missing() {
        let sample = Sample::new(0).with("XCurrPos", f64::NAN);
        assert_eq!(sample.get(Channel::XCurrPos), None);
    }

    #[test]
    fn test_fields_keep_raw_names() {
        let sample = Sample::new(0)
            .with("ChipThickness", 0.12)
            .with("xcurrpos", 1.0)
            .with("Area", f64::INFINITY);

        let mut fields: Vec<(&str, f64)> = sample.fields().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        assert_eq!(fields, vec![("ChipThickness", 0.12), ("xcurrpos", 1.0)]);
        assert_eq!(sample.get_raw("chipthickness"), Some(0.12));
    }

    #[test]
    fn test_rolling_sequence_evicts_oldest() {
        let mut seq = SampleSequence::rolling(2);
        assert!(seq.push(Sample::new(1)));
        assert!(seq.push(Sample::new(2)));
        assert!(seq.push(Sample::new(3)));

        assert_eq!(seq.len(), 2);
        assert_eq!(seq.get(0).map(|s| s.time_ms), Some(2));
        assert_eq!(seq.last().map(|s| s.time_ms), Some(3));
    }

    #[test]
    fn test_fixed_sequence_rejects_push() {
        let mut seq = SampleSequence::fixed(vec![Sample::new(1)]);
        assert!(!seq.push(Sample::new(2)));
        assert_eq!(seq.len(), 1);
    }
}
