// Simulation job domain models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationStatus {
    NotFinished,
    Finished,
}

impl SimulationStatus {
    pub fn from_finished(finished: bool) -> Self {
        if finished {
            SimulationStatus::Finished
        } else {
            SimulationStatus::NotFinished
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationStatus::NotFinished => "not finished",
            SimulationStatus::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRecord {
    pub id: i64,
    pub time_ms: i64,
    pub source_file: Option<String>,
    pub precision: Option<f64>,
    pub status: SimulationStatus,
}

impl SimulationRecord {
    /// Only finished jobs have data worth loading.
    pub fn can_load(&self) -> bool {
        self.status == SimulationStatus::Finished
    }

    /// File name without the upload directory.
    pub fn display_name(&self) -> String {
        match &self.source_file {
            Some(path) => path
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(path)
                .to_string(),
            None => format!("Simulation {}", self.id),
        }
    }
}

/// Client-side mirror of the backend job list.
///
/// Each poll carries the generation it was issued with; a response that was
/// issued before the one currently shown is dropped, so the newest request
/// always wins regardless of arrival order.
#[derive(Debug, Clone, Default)]
pub struct SimulationCache {
    records: Vec<SimulationRecord>,
    applied_generation: Option<u64>,
}

impl SimulationCache {
    pub fn records(&self) -> &[SimulationRecord] {
        &self.records
    }

    pub fn is_loaded(&self) -> bool {
        self.applied_generation.is_some()
    }

    pub fn find(&self, id: i64) -> Option<&SimulationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Replace the cache if `generation` is newer than what is applied.
    pub fn apply(&mut self, generation: u64, records: Vec<SimulationRecord>) -> bool {
        if self.applied_generation.is_some_and(|g| g >= generation) {
            return false;
        }
        self.applied_generation = Some(generation);
        self.records = records;
        true
    }
}
