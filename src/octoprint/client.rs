//! OctoPrint REST client
//!
//! One snapshot = `GET /api/job` + `GET /api/printer?exclude=sd,state`,
//! issued concurrently. The job call is mandatory; the temperature call
//! degrades to null temperatures when no printer is attached.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::error::BridgeError;
use crate::models::{JobResponse, Snapshot, StatusFields, Temperatures};

/// Source of printer status snapshots
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<Snapshot, BridgeError>;
}

/// HTTP client for the OctoPrint status API
pub struct OctoPrintClient {
    http_client: Client,
    job_url: Url,
    printer_url: Url,
    api_key: String,
}

impl OctoPrintClient {
    pub fn new(base_url: &Url, api_key: String, timeout: Duration) -> Result<Self, BridgeError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| BridgeError::ConfigError(format!("HTTP client: {}", e)))?;

        let job_url = base_url.join("api/job")?;
        let mut printer_url = base_url.join("api/printer")?;
        printer_url.set_query(Some("exclude=sd,state"));

        Ok(Self {
            http_client,
            job_url,
            printer_url,
            api_key,
        })
    }

    async fn get_job(&self) -> Result<JobResponse, BridgeError> {
        let response = self
            .http_client
            .get(self.job_url.clone())
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?
            .error_for_status()?;

        response
            .json::<JobResponse>()
            .await
            .map_err(|e| BridgeError::FetchError(format!("malformed job response: {}", e)))
    }

    async fn get_temperatures(&self) -> Result<Temperatures, BridgeError> {
        let response = self
            .http_client
            .get(self.printer_url.clone())
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        // 409 Conflict means OctoPrint has no printer connected
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                "[OctoPrint] Octoprint not connected to printer (HTTP {})",
                status.as_u16()
            );
            return Ok(Temperatures::default());
        }

        let body = response.text().await?;
        let temperatures = parse_temperatures(&body);
        if let Err(e) = check_temperatures(&temperatures) {
            tracing::warn!("[OctoPrint] Octoprint not connected to printer: {}", e);
        }

        Ok(temperatures)
    }
}

#[async_trait]
impl SnapshotSource for OctoPrintClient {
    async fn fetch(&self) -> Result<Snapshot, BridgeError> {
        let (job, temperatures) = tokio::join!(self.get_job(), self.get_temperatures());
        Ok(build_snapshot(job?, temperatures?))
    }
}

/// Read bed/tool0 actual temperatures; anything missing or unparsable is `None`
pub fn parse_temperatures(body: &str) -> Temperatures {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return Temperatures::default(),
    };

    Temperatures {
        bed: value
            .pointer("/temperature/bed/actual")
            .and_then(Value::as_f64),
        tool0: value
            .pointer("/temperature/tool0/actual")
            .and_then(Value::as_f64),
    }
}

/// `PartialData` naming the missing temperatures, if any
pub fn check_temperatures(temperatures: &Temperatures) -> Result<(), BridgeError> {
    let missing: Vec<&str> = [
        ("temperature.bed", temperatures.bed.is_none()),
        ("temperature.tool0", temperatures.tool0.is_none()),
    ]
    .into_iter()
    .filter_map(|(name, absent)| absent.then_some(name))
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(BridgeError::PartialData(format!(
            "missing {}",
            missing.join(", ")
        )))
    }
}

pub fn build_snapshot(job: JobResponse, temperatures: Temperatures) -> Snapshot {
    let progress = job.progress.completion.unwrap_or(0.0) as i64;

    Snapshot::from(StatusFields {
        printer_status: job.state,
        file_name: job.job.file.name,
        elapsed_time: job.progress.print_time,
        estimated_time: job.job.estimated_print_time,
        b_temp: temperatures.bed,
        e_temp: temperatures.tool0,
        file_size: job.job.file.size,
        file_pos: job.progress.filepos,
        progress,
    })
}
