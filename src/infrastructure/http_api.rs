// HTTP client for the CNC telemetry/simulation backend
use crate::application::dashboard_api::{ApiError, DashboardApi};
use crate::domain::channel::{Channel, TelemetryModel};
use crate::domain::sample::Sample;
use crate::domain::simulation::{SimulationRecord, SimulationStatus};
use crate::domain::telemetry::{TimeSeriesPoint, Timespan};
use crate::infrastructure::config::{build_url, ApiSettings};
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Map, Value};

const TIMESTAMP_KEYS: [&str; 2] = ["Timestamp", "timestamp"];
const MESH_PATH_KEYS: [&str; 2] = ["stlPath", "stl_path"];

#[derive(Debug, Clone)]
pub struct HttpDashboardApi {
    base_url: String,
    client: reqwest::Client,
}

/// Job record as the backend lists it
#[derive(Debug, Deserialize)]
struct SimulationDto {
    #[serde(rename = "sim_ID", alias = "id", alias = "ID")]
    id: i64,
    #[serde(rename = "Timestamp", alias = "timestamp", default)]
    timestamp: i64,
    #[serde(rename = "nc_file", alias = "source_file", default)]
    source_file: Option<String>,
    #[serde(default)]
    precision: Option<f64>,
    #[serde(default)]
    finished: bool,
}

impl From<SimulationDto> for SimulationRecord {
    fn from(dto: SimulationDto) -> Self {
        SimulationRecord {
            id: dto.id,
            time_ms: dto.timestamp,
            source_file: dto.source_file.filter(|f| !f.is_empty()),
            precision: dto.precision,
            status: SimulationStatus::from_finished(dto.finished),
        }
    }
}

fn transport_error(error: reqwest::Error) -> ApiError {
    if error.is_decode() {
        ApiError::Malformed(error.to_string())
    } else {
        ApiError::Transport(error.to_string())
    }
}

impl HttpDashboardApi {
    pub fn new(settings: &ApiSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> String {
        build_url(&self.base_url, path, params)
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        Ok(response)
    }

    async fn get_json(&self, url: &str) -> Result<Value, ApiError> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        Self::checked(response)
            .await?
            .json::<Value>()
            .await
            .map_err(transport_error)
    }
}

#[async_trait]
impl DashboardApi for HttpDashboardApi {
    async fn live_snapshot(&self) -> Result<Sample, ApiError> {
        let body = self.get_json(&self.url("live-data/get-all", &[])).await?;
        flatten_snapshot(&body, chrono::Utc::now().timestamp_millis())
    }

    async fn timed_data(
        &self,
        model: TelemetryModel,
        channel: Channel,
        timespan: Timespan,
    ) -> Result<Vec<TimeSeriesPoint>, ApiError> {
        let url = self.url(
            "debug/get-timedData/",
            &[
                ("model", model.as_str()),
                ("field", channel.key()),
                ("timespan", timespan.as_str()),
            ],
        );
        let body = self.get_json(&url).await?;
        parse_rows(&body, channel.key())
    }

    async fn current_value(
        &self,
        model: TelemetryModel,
        channel: Channel,
    ) -> Result<Option<TimeSeriesPoint>, ApiError> {
        let url = self.url(
            "debug/get-cur/",
            &[("model", model.as_str()), ("field", channel.key())],
        );
        let body = self.get_json(&url).await?;
        parse_current(&body, channel.key())
    }

    async fn list_simulations(&self) -> Result<Vec<SimulationRecord>, ApiError> {
        let body = self
            .get_json(&self.url("simulation-API/get-simulation", &[]))
            .await?;
        let jobs: Vec<SimulationDto> =
            serde_json::from_value(body).map_err(|e| ApiError::Malformed(e.to_string()))?;
        Ok(jobs.into_iter().map(SimulationRecord::from).collect())
    }

    async fn simulation_data(&self, simulation_id: i64) -> Result<Vec<Sample>, ApiError> {
        let id = simulation_id.to_string();
        let url = self.url(
            "simulation-API/get-simulationData",
            &[("simulation", id.as_str())],
        );
        let body = self.get_json(&url).await?;
        parse_simulation_samples(&body)
    }

    async fn upload_simulation(
        &self,
        file_name: &str,
        content: Bytes,
        precision: f64,
    ) -> Result<(), ApiError> {
        let precision = precision.to_string();
        let url = self.url(
            "simulation-API/upload-simulation",
            &[("precision", precision.as_str())],
        );
        let part = reqwest::multipart::Part::stream(content).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        Self::checked(response).await?;
        Ok(())
    }

    async fn fetch_mesh(&self, path: &str) -> Result<Bytes, ApiError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        tracing::debug!("GET {}", url);
        let response = self.client.get(&url).send().await.map_err(transport_error)?;
        Self::checked(response)
            .await?
            .bytes()
            .await
            .map_err(transport_error)
    }
}

fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

fn parse_time_string(text: &str) -> Option<i64> {
    if let Ok(ms) = text.trim().parse::<i64>() {
        return Some(ms);
    }
    if let Ok(time) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(time.timestamp_millis());
    }
    chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|t| t.and_utc().timestamp_millis())
}

/// Epoch milliseconds of a row: `Timestamp`/`timestamp`, else an ISO `x`.
fn row_timestamp(row: &Map<String, Value>) -> Option<i64> {
    for key in TIMESTAMP_KEYS {
        match row.get(key) {
            Some(Value::Number(n)) => {
                if let Some(ms) = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)) {
                    return Some(ms);
                }
            }
            Some(Value::String(s)) => {
                if let Some(ms) = parse_time_string(s) {
                    return Some(ms);
                }
            }
            _ => {}
        }
    }
    match row.get("x")? {
        Value::String(s) => parse_time_string(s),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// Value of `field` in a row, matched case-insensitively, else `y`.
fn row_value(row: &Map<String, Value>, field: &str) -> Option<f64> {
    row.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(field))
        .and_then(|(_, value)| as_number(value))
        .or_else(|| row.get("y").and_then(as_number))
}

fn row_point(row: &Value, field: &str) -> Option<TimeSeriesPoint> {
    let row = row.as_object()?;
    Some(TimeSeriesPoint::new(row_timestamp(row)?, row_value(row, field)?))
}

/// Chart history rows, oldest first. Rows without a time or value are dropped.
pub fn parse_rows(body: &Value, field: &str) -> Result<Vec<TimeSeriesPoint>, ApiError> {
    let rows = body
        .as_array()
        .ok_or_else(|| ApiError::Malformed("expected an array of rows".to_string()))?;

    let mut points: Vec<TimeSeriesPoint> = rows.iter().filter_map(|r| row_point(r, field)).collect();
    if points.len() < rows.len() {
        tracing::debug!(
            "Dropped {} unusable rows for {}",
            rows.len() - points.len(),
            field
        );
    }
    points.sort_by_key(|p| p.time_ms);
    Ok(points)
}

/// Latest reading. The backend answers with a row, a one-element array, or
/// nothing at all.
pub fn parse_current(body: &Value, field: &str) -> Result<Option<TimeSeriesPoint>, ApiError> {
    match body {
        Value::Null => Ok(None),
        Value::Object(_) => Ok(row_point(body, field)),
        Value::Array(rows) => Ok(rows.iter().filter_map(|r| row_point(r, field)).max_by_key(|p| p.time_ms)),
        _ => Err(ApiError::Malformed("expected a row".to_string())),
    }
}

fn insert_fields(sample: &mut Sample, fields: &Map<String, Value>) {
    for (key, value) in fields {
        if TIMESTAMP_KEYS.contains(&key.as_str()) {
            continue;
        }
        match value {
            Value::Bool(b) => sample.insert(key, if *b { 1.0 } else { 0.0 }),
            other => {
                if let Some(v) = as_number(other) {
                    sample.insert(key, v);
                }
            }
        }
    }
}

/// Merge the per-model objects of a live snapshot into one sample. The
/// newest model timestamp wins; `now_ms` is used when none is present.
pub fn flatten_snapshot(body: &Value, now_ms: i64) -> Result<Sample, ApiError> {
    let models = body
        .as_object()
        .ok_or_else(|| ApiError::Malformed("expected an object of models".to_string()))?;

    let time_ms = models
        .values()
        .filter_map(Value::as_object)
        .filter_map(row_timestamp)
        .max()
        .unwrap_or(now_ms);

    let mut sample = Sample::new(time_ms);
    for (model, fields) in models {
        match fields.as_object() {
            Some(fields) => insert_fields(&mut sample, fields),
            None => tracing::debug!("Skipping non-object model {}", model),
        }
    }
    Ok(sample)
}

/// Per-sample series of a simulation job, in backend order.
pub fn parse_simulation_samples(body: &Value) -> Result<Vec<Sample>, ApiError> {
    let rows = body
        .as_array()
        .ok_or_else(|| ApiError::Malformed("expected an array of samples".to_string()))?;

    Ok(rows
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|row| {
            let mut sample = Sample::new(row_timestamp(row)?);
            insert_fields(&mut sample, row);
            sample.mesh_path = MESH_PATH_KEYS
                .iter()
                .find_map(|k| row.get(*k).and_then(Value::as_str))
                .filter(|p| !p.is_empty())
                .map(str::to_string);
            Some(sample)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rows_accept_both_timestamp_shapes() {
        let body = json!([
            { "Timestamp": 2000, "XFollDist": 0.5 },
            { "x": "1970-01-01T00:00:01Z", "y": "0.25" },
            { "timestamp": 3000, "xfolldist": null },
            { "Timestamp": 4000, "xfolldist": 1.5 }
        ]);

        let points = parse_rows(&body, "XFollDist").unwrap();
        assert_eq!(
            points,
            vec![
                TimeSeriesPoint::new(1000, 0.25),
                TimeSeriesPoint::new(2000, 0.5),
                TimeSeriesPoint::new(4000, 1.5),
            ]
        );
    }

    #[test]
    fn test_rows_must_be_an_array() {
        assert!(matches!(
            parse_rows(&json!({"error": "nope"}), "XFollDist"),
            Err(ApiError::Malformed(_))
        ));
    }

    #[test]
    fn test_current_value_shapes() {
        let row = json!({ "Timestamp": 10, "S1ActTrq": 4.0 });
        assert_eq!(
            parse_current(&row, "s1acttrq").unwrap(),
            Some(TimeSeriesPoint::new(10, 4.0))
        );
        assert_eq!(parse_current(&Value::Null, "s1acttrq").unwrap(), None);
        assert_eq!(
            parse_current(&json!([row, { "Timestamp": 20, "S1ActTrq": 5.0 }]), "S1ActTrq").unwrap(),
            Some(TimeSeriesPoint::new(20, 5.0))
        );
    }

    #[test]
    fn test_snapshot_flattens_models() {
        let body = json!({
            "cnc": { "Timestamp": 1_000, "XCurrPos": 12.5, "YCurrPos": "3.0", "Running": true },
            "drive": { "Timestamp": 1_200, "XFollDist": -0.2 },
            "tool": "offline"
        });

        let sample = flatten_snapshot(&body, 99).unwrap();
        assert_eq!(sample.time_ms, 1_200);
        assert_eq!(sample.get(Channel::XCurrPos), Some(12.5));
        assert_eq!(sample.get(Channel::YCurrPos), Some(3.0));
        assert_eq!(sample.get(Channel::XFollDist), Some(-0.2));
        assert_eq!(sample.get_raw("running"), Some(1.0));
        assert_eq!(sample.get_raw("timestamp"), None);
    }

    #[test]
    fn test_snapshot_without_timestamp_uses_now() {
        let sample = flatten_snapshot(&json!({ "cnc": { "ZCurrPos": 1.0 } }), 42).unwrap();
        assert_eq!(sample.time_ms, 42);
        assert!(flatten_snapshot(&json!([1, 2]), 42).is_err());
    }

    #[test]
    fn test_simulation_samples_keep_mesh_paths() {
        let body = json!([
            { "Timestamp": 0, "XCurrPos": 1.0, "stlPath": "media/stl/0.stl" },
            { "Timestamp": 10, "XCurrPos": 2.0, "stlPath": null },
            { "XCurrPos": 3.0 }
        ]);

        let samples = parse_simulation_samples(&body).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].mesh_path.as_deref(), Some("media/stl/0.stl"));
        assert_eq!(samples[1].mesh_path, None);
        assert_eq!(samples[1].get(Channel::XCurrPos), Some(2.0));
    }

    #[test]
    fn test_simulation_list_dto() {
        let jobs: Vec<SimulationDto> = serde_json::from_value(json!([
            { "sim_ID": 3, "Timestamp": 1_675_368_600_000i64, "nc_file": "nc_files/part.nc", "finished": true },
            { "sim_ID": 4, "Timestamp": 1_675_368_700_000i64, "nc_file": "", "csv_file": null }
        ]))
        .unwrap();

        let records: Vec<SimulationRecord> = jobs.into_iter().map(SimulationRecord::from).collect();
        assert_eq!(records[0].status, SimulationStatus::Finished);
        assert_eq!(records[0].display_name(), "part.nc");
        assert_eq!(records[1].status, SimulationStatus::NotFinished);
        assert_eq!(records[1].source_file, None);
    }
}
