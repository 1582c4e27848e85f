//! Coverage report handling
//!
//! Parses lcov tracefiles, checks them against minimum percentages and
//! forwards them to a remote coverage service.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::configs::pipeline::UploadConfig;
use crate::configs::tasks::CoverageCheckConfig;
use crate::events::{EventPayload, Listener};
use crate::types::{PipewrightError, PipewrightResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Counter {
    pub found: u64,
    pub hit: u64,
}

impl Counter {
    /// Percentage covered; nothing to cover counts as fully covered
    pub fn percent(&self) -> f64 {
        if self.found == 0 {
            100.0
        } else {
            self.hit as f64 * 100.0 / self.found as f64
        }
    }
}

/// Totals across every source file of an lcov report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageSummary {
    pub files: usize,
    pub lines: Counter,
    pub functions: Counter,
    pub branches: Counter,
}

impl CoverageSummary {
    pub fn parse_lcov(content: &str) -> PipewrightResult<Self> {
        let mut summary = CoverageSummary::default();

        for (index, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            let Some((tag, value)) = line.split_once(':') else {
                continue;
            };

            let counter = match tag {
                "SF" => {
                    summary.files += 1;
                    continue;
                }
                "LF" => &mut summary.lines.found,
                "LH" => &mut summary.lines.hit,
                "FNF" => &mut summary.functions.found,
                "FNH" => &mut summary.functions.hit,
                "BRF" => &mut summary.branches.found,
                "BRH" => &mut summary.branches.hit,
                _ => continue,
            };

            let invalid = |reason: String| {
                PipewrightError::Config(format!(
                    "Invalid lcov record on line {} ('{}'): {}",
                    index + 1,
                    line,
                    reason
                ))
            };
            let count = value
                .trim()
                .parse::<u64>()
                .map_err(|e| invalid(e.to_string()))?;
            *counter = counter
                .checked_add(count)
                .ok_or_else(|| invalid("count overflows the report total".to_string()))?;
        }

        Ok(summary)
    }

    /// Compare against thresholds, returning one message per metric below its minimum
    pub fn check(&self, thresholds: &CoverageCheckConfig) -> Vec<String> {
        [
            ("lines", thresholds.lines, self.lines),
            ("functions", thresholds.functions, self.functions),
            ("branches", thresholds.branches, self.branches),
        ]
        .into_iter()
        .filter_map(|(metric, minimum, counter)| {
            let minimum = minimum?;
            let actual = counter.percent();
            (actual < minimum).then(|| {
                format!(
                    "{} coverage {:.2}% is below the {:.2}% threshold",
                    metric, actual, minimum
                )
            })
        })
        .collect()
    }
}

/// Event listener that submits an lcov report to a coverage service
pub struct CoverageUploader {
    client: reqwest::Client,
    config: UploadConfig,
}

impl CoverageUploader {
    pub fn new(config: UploadConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn repo_token(&self) -> Option<String> {
        let var = self.config.token_env.as_deref()?;
        match std::env::var(var) {
            Ok(token) => Some(token),
            Err(_) => {
                warn!(variable = var, "coverage upload token variable is not set");
                None
            }
        }
    }

    fn request_body(&self, payload: &EventPayload, summary: &CoverageSummary) -> serde_json::Value {
        json!({
            "service_name": self.config.service_name.as_deref().unwrap_or("pipewright"),
            "repo_token": self.repo_token(),
            "format": "lcov",
            "source_task": payload.source_task,
            "report": payload.body,
            "summary": summary,
        })
    }
}

#[async_trait]
impl Listener for CoverageUploader {
    fn name(&self) -> &str {
        "coverage-upload"
    }

    async fn handle(&self, payload: EventPayload) -> PipewrightResult<()> {
        let summary = CoverageSummary::parse_lcov(&payload.body)?;
        let body = self.request_body(&payload, &summary);

        let response = self
            .client
            .post(&self.config.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                PipewrightError::Integration(format!(
                    "Failed to submit lcov report to {}: {}",
                    self.config.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PipewrightError::Integration(format!(
                "Failed to submit lcov report to {}: HTTP {} {}",
                self.config.url,
                status,
                detail.trim()
            )));
        }

        info!(
            url = %self.config.url,
            files = summary.files,
            lines = %format!("{:.2}%", summary.lines.percent()),
            "submitted lcov report"
        );
        Ok(())
    }
}
