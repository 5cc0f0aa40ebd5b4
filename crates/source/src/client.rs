//! HTTP client for the eskom-calendar API.
//!
//! Read-only queries against `https://eskom-calendar-api.shuttleapp.rs`:
//! `/outages/{area}`, `/fuzzy_search/{query}`, `/list_areas`. Every request
//! carries the configured timeout; exceeding it is reported as
//! [`SourceError::Timeout`] and handled like any other fetch failure.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use tracing::debug;

use shed_core::config::SourceConfig;
use shed_core::OutageWindow;

use crate::error::SourceError;
use crate::traits::OutageSource;

/// One outage row as the API reports it. Upstream spells the end
/// timestamp `finsh`; that is not a typo on our side.
#[derive(Debug, Deserialize)]
struct WireOutage {
    #[serde(default)]
    area_name: Option<String>,
    start: DateTime<FixedOffset>,
    finsh: DateTime<FixedOffset>,
}

/// Outage source backed by the eskom-calendar HTTP API.
pub struct EskomCalendarClient {
    base_url: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl EskomCalendarClient {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
            client,
        })
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value, SourceError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, "fetching from outage source");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url,
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))
    }

    fn classify(&self, err: reqwest::Error) -> SourceError {
        if err.is_timeout() {
            SourceError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            SourceError::Http(err)
        }
    }
}

#[async_trait::async_trait]
impl OutageSource for EskomCalendarClient {
    async fn fetch_windows(&self, area: &str) -> Result<Vec<OutageWindow>, SourceError> {
        let value = self.get_json(&format!("outages/{}", area)).await?;
        let rows: Vec<WireOutage> = serde_json::from_value(value)
            .map_err(|e| SourceError::Parse(format!("outages for {}: {}", area, e)))?;

        Ok(rows
            .into_iter()
            .map(|row| OutageWindow {
                area: row.area_name.unwrap_or_else(|| area.to_string()),
                start: row.start.with_timezone(&Utc),
                end: row.finsh.with_timezone(&Utc),
            })
            .collect())
    }

    async fn fuzzy_search(&self, query: &str) -> Result<Vec<String>, SourceError> {
        let value = self.get_json(&format!("fuzzy_search/{}", query)).await?;
        Ok(extract_area_names(&value))
    }

    async fn list_areas(&self) -> Result<Vec<String>, SourceError> {
        let value = self.get_json("list_areas").await?;
        Ok(extract_area_names(&value))
    }
}

/// Pull area names out of the loosely-shaped search/list responses.
///
/// Accepts a bare array of strings, an array of objects carrying a
/// `name`/`area_name` field, or an object wrapping either under `areas`.
fn extract_area_names(value: &serde_json::Value) -> Vec<String> {
    let array = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(map) => match map.get("areas").and_then(|v| v.as_array()) {
            Some(items) => items,
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    array
        .iter()
        .filter_map(|item| match item {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(obj) => obj
                .get("name")
                .or_else(|| obj.get("area_name"))
                .and_then(|v| v.as_str())
                .map(String::from),
            _ => None,
        })
        .collect()
}
