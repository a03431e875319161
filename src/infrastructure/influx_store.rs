// InfluxQL-over-HTTP implementation of the telemetry backing store
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Datelike;
use serde::Deserialize;

use crate::application::telemetry_store::TelemetryStore;
use crate::domain::series::{MotorId, SeriesFilter, TelemetryPoint};
use crate::infrastructure::config::StoreSettings;

#[derive(Debug, Clone)]
pub struct InfluxStore {
    host: String,
    token: String,
    database: String,
    retention_policy: String,
    measurement: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResponse {
    results: Vec<InfluxQLResult>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResult {
    #[serde(default)]
    series: Option<Vec<InfluxQLSeries>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLSeries {
    #[allow(dead_code)]
    name: String,
    columns: Vec<String>,
    values: Vec<Vec<serde_json::Value>>,
}

impl InfluxStore {
    pub fn new(settings: StoreSettings) -> Self {
        Self {
            host: settings.host.trim_end_matches('/').to_string(),
            token: settings.token,
            database: settings.database,
            retention_policy: settings.retention_policy,
            measurement: settings.measurement,
            client: reqwest::Client::new(),
        }
    }

    fn build_query_url(&self, query: &str) -> String {
        let encoded_query = urlencoding::encode(query);
        format!(
            "{}/query?db={}&rp={}&q={}",
            self.host, self.database, self.retention_policy, encoded_query
        )
    }

    async fn execute_query(&self, query: &str) -> Result<InfluxQLResponse> {
        let url = self.build_query_url(query);
        tracing::debug!(query, "executing store query");

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .context("failed to send request to the backing store")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("store query failed with status {}: {}", status, body);
        }

        let data = response
            .json::<InfluxQLResponse>()
            .await
            .context("failed to parse store response")?;

        if let Some(result) = data.results.first() {
            if let Some(error) = &result.error {
                anyhow::bail!("store query error: {}", error);
            }
        }

        Ok(data)
    }

    async fn distinct_tag_values(&self, key: &str, predicate: Option<String>) -> Result<Vec<String>> {
        let mut query = format!(
            "SHOW TAG VALUES FROM {} WITH KEY = {}",
            self.measurement, key
        );
        if let Some(predicate) = predicate {
            query.push_str(" WHERE ");
            query.push_str(&predicate);
        }
        let response = self.execute_query(&query).await?;

        // SHOW TAG VALUES rows are [key, value]; only the value matters.
        let mut values = Vec::new();
        if let Some(result) = response.results.first() {
            if let Some(series) = &result.series {
                for s in series {
                    for value_row in &s.values {
                        if value_row.len() >= 2 {
                            if let Some(value) = value_row[1].as_str() {
                                values.push(value.to_string());
                            }
                        }
                    }
                }
            }
        }

        Ok(values)
    }

    fn rows_query(&self, id: &MotorId, filter: &SeriesFilter) -> String {
        let mut query = format!(
            "SELECT sample_id, amps, amps_avg, amp_limit, running, runtime_min FROM {} \
             WHERE zone = '{}' AND line = '{}' AND motor = '{}'",
            self.measurement,
            escape_tag(&id.zone),
            escape_tag(&id.line),
            escape_tag(&id.motor),
        );
        if let Some(week) = &filter.week {
            query.push_str(&format!(" AND week = '{}'", escape_tag(week)));
        }
        if let Some(from) = &filter.from {
            query.push_str(&format!(" AND time >= '{}'", from.to_rfc3339()));
        }
        if let Some(to) = &filter.to {
            query.push_str(&format!(" AND time <= '{}'", to.to_rfc3339()));
        }
        query
    }

    fn decode_rows(series: &InfluxQLSeries, filter: &SeriesFilter) -> Vec<TelemetryPoint> {
        let column = |name: &str| series.columns.iter().position(|c| c == name);
        let Some(time_idx) = column("time") else {
            return Vec::new();
        };
        let Some(id_idx) = column("sample_id") else {
            return Vec::new();
        };
        let amps_idx = column("amps");
        let avg_idx = column("amps_avg");
        let limit_idx = column("amp_limit");
        let running_idx = column("running");
        let runtime_idx = column("runtime_min");

        let number = |row: &[serde_json::Value], idx: Option<usize>| -> f64 {
            idx.and_then(|i| row.get(i)).and_then(|v| v.as_f64()).unwrap_or(0.0)
        };

        let mut points = Vec::new();
        for row in &series.values {
            let timestamp = row
                .get(time_idx)
                .and_then(|v| v.as_str())
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&chrono::Utc));
            let id = row.get(id_idx).and_then(|v| v.as_i64());
            let (Some(timestamp), Some(id)) = (timestamp, id) else {
                tracing::debug!("skipping malformed telemetry row");
                continue;
            };

            // Day-of-week has no InfluxQL predicate, so it is applied
            // here after timestamp decoding.
            if let Some(day) = filter.day {
                if timestamp.weekday() != day {
                    continue;
                }
            }

            let running = running_idx
                .and_then(|i| row.get(i))
                .map(|v| v.as_bool().unwrap_or_else(|| v.as_f64().unwrap_or(0.0) != 0.0))
                .unwrap_or(false);

            points.push(TelemetryPoint::new(
                id,
                timestamp,
                number(row, amps_idx),
                running,
                number(row, avg_idx),
                number(row, limit_idx),
                runtime_idx
                    .and_then(|i| row.get(i))
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0),
            ));
        }
        points
    }
}

/// Tag values are free-form strings used inside single-quoted InfluxQL
/// literals; quotes and backslashes must not terminate the literal.
fn escape_tag(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl TelemetryStore for InfluxStore {
    async fn list_zones(&self) -> Result<Vec<String>> {
        self.distinct_tag_values("zone", None).await
    }

    async fn list_lines(&self, zone: &str) -> Result<Vec<String>> {
        self.distinct_tag_values("line", Some(format!("zone = '{}'", escape_tag(zone))))
            .await
    }

    async fn list_motors(&self, zone: &str, line: &str) -> Result<Vec<String>> {
        self.distinct_tag_values(
            "motor",
            Some(format!(
                "zone = '{}' AND line = '{}'",
                escape_tag(zone),
                escape_tag(line)
            )),
        )
        .await
    }

    async fn list_weeks(&self) -> Result<Vec<String>> {
        self.distinct_tag_values("week", None).await
    }

    async fn fetch_rows(
        &self,
        id: &MotorId,
        filter: &SeriesFilter,
    ) -> Result<Vec<TelemetryPoint>> {
        let query = self.rows_query(id, filter);
        let response = self.execute_query(&query).await?;

        let mut points = Vec::new();
        if let Some(result) = response.results.first() {
            if let Some(series) = &result.series {
                for s in series {
                    points.extend(Self::decode_rows(s, filter));
                }
            }
        }

        tracing::debug!(motor = %id, rows = points.len(), "fetched telemetry rows");
        Ok(points)
    }
}
