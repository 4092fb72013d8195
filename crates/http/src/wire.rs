//! JSON shapes of the analysis backend and their conversion into domain types.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sift_core::{
    AnalysisReport, AnalysisRequest, AnalysisResult, CheckStatus, Dataset, DatasetFormat,
    DatasetId, FetchError, KaggleDataset, Narrative, Plot, QaReview, QualityCheck,
    TokenUsageSnapshot, VisualizationInsight, Visualizations,
};

const SUCCESS_STATUS: &str = "success";

#[derive(Debug, Serialize)]
pub struct AnalyzeBody<'a> {
    pub query: &'a str,
    pub dataset: DatasetRef<'a>,
}

#[derive(Debug, Serialize)]
pub struct DatasetRef<'a> {
    pub id: &'a str,
}

impl<'a> From<&'a AnalysisRequest> for AnalyzeBody<'a> {
    fn from(request: &'a AnalysisRequest) -> Self {
        Self {
            query: request.query(),
            dataset: DatasetRef {
                id: request.dataset_id().as_str(),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisResponse {
    pub status: String,
    pub message: String,
    pub error: Option<String>,
    pub narrative: Option<NarrativeWire>,
    pub visualizations: Option<VisualizationsWire>,
    pub qa_review: Option<QaReviewWire>,
    pub warnings: Option<Vec<String>>,
    /// Either a full usage snapshot or a `{total, remaining}` summary,
    /// depending on the backend version.
    pub token_usage: Option<Value>,
}

impl AnalysisResponse {
    pub fn into_result(self) -> AnalysisResult {
        if self.status != SUCCESS_STATUS {
            let message = self
                .error
                .filter(|error| !error.trim().is_empty())
                .unwrap_or(self.message);
            return AnalysisResult::Error { message };
        }

        let token_usage = self
            .token_usage
            .and_then(|raw| serde_json::from_value::<TokenUsageWire>(raw).ok())
            .filter(|usage| usage.daily_limit > 0)
            .and_then(|usage| usage.into_snapshot().ok());

        AnalysisResult::Success(AnalysisReport {
            narrative: self.narrative.map(Narrative::from).unwrap_or_default(),
            visualizations: self
                .visualizations
                .map(Visualizations::from)
                .unwrap_or_default(),
            qa_review: self.qa_review.map(QaReview::from).unwrap_or_default(),
            warnings: self.warnings.unwrap_or_default(),
            token_usage,
        })
    }
}

/// Older backends send the narrative as plain text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum NarrativeWire {
    Text(String),
    Structured(NarrativeBody),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NarrativeBody {
    pub executive_summary: String,
    pub key_findings: Vec<String>,
    pub business_implications: Vec<String>,
    pub recommendations: Vec<String>,
    pub visualization_insights: Vec<InsightWire>,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InsightWire {
    #[serde(rename = "type")]
    pub kind: String,
    pub column: Option<String>,
    pub name: Option<String>,
    pub insight: String,
}

impl From<NarrativeWire> for Narrative {
    fn from(wire: NarrativeWire) -> Self {
        match wire {
            NarrativeWire::Text(executive_summary) => Self {
                executive_summary,
                ..Self::default()
            },
            NarrativeWire::Structured(body) => Self {
                executive_summary: body.executive_summary,
                key_findings: body.key_findings,
                business_implications: body.business_implications,
                recommendations: body.recommendations,
                visualization_insights: body
                    .visualization_insights
                    .into_iter()
                    .map(|insight| VisualizationInsight {
                        kind: insight.kind,
                        column: insight.column,
                        name: insight.name,
                        insight: insight.insight,
                    })
                    .collect(),
                next_steps: body.next_steps,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VisualizationsWire {
    pub plots: Vec<PlotWire>,
    pub summary: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PlotWire {
    #[serde(rename = "type")]
    pub kind: String,
    pub column: Option<String>,
    pub name: Option<String>,
    #[serde(alias = "data")]
    pub plot_data: Value,
}

impl From<VisualizationsWire> for Visualizations {
    fn from(wire: VisualizationsWire) -> Self {
        Self {
            plots: wire
                .plots
                .into_iter()
                .map(|plot| Plot {
                    kind: plot.kind,
                    column: plot.column,
                    name: plot.name,
                    data: match plot.plot_data {
                        Value::String(encoded) => encoded,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    },
                })
                .collect(),
            summary: wire.summary,
            recommendations: wire.recommendations,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QaReviewWire {
    pub validation_status: String,
    pub quality_checks: Vec<QualityCheckWire>,
    pub improvement_suggestions: Vec<String>,
    pub clarity_score: f64,
    pub accuracy_score: f64,
    pub actionability_score: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QualityCheckWire {
    pub aspect: String,
    pub status: String,
    pub comments: String,
}

impl From<QaReviewWire> for QaReview {
    fn from(wire: QaReviewWire) -> Self {
        Self {
            validation_status: wire.validation_status,
            quality_checks: wire
                .quality_checks
                .into_iter()
                .map(|check| QualityCheck {
                    aspect: check.aspect,
                    status: check_status(&check.status),
                    comments: check.comments,
                })
                .collect(),
            improvement_suggestions: wire.improvement_suggestions,
            clarity_score: wire.clarity_score,
            accuracy_score: wire.accuracy_score,
            actionability_score: wire.actionability_score,
        }
    }
}

fn check_status(raw: &str) -> CheckStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "passed" | "pass" => CheckStatus::Passed,
        "failed" | "fail" => CheckStatus::Failed,
        _ => CheckStatus::Warning,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TokenUsageWire {
    pub current_usage: u64,
    pub daily_limit: u64,
    pub remaining_tokens: Option<u64>,
    pub usage_by_agent: BTreeMap<String, u64>,
    pub last_reset: Option<String>,
}

impl TokenUsageWire {
    pub fn into_snapshot(self) -> Result<TokenUsageSnapshot, FetchError> {
        let last_reset = match self.last_reset.as_deref() {
            Some(raw) => parse_timestamp(raw)?,
            None => NaiveDateTime::default(),
        };

        let mut snapshot = TokenUsageSnapshot::new(
            self.current_usage,
            self.daily_limit,
            self.usage_by_agent,
            last_reset,
        );
        if let Some(remaining) = self.remaining_tokens {
            snapshot.remaining_tokens = remaining;
        }
        Ok(snapshot)
    }
}

/// Accepts RFC 3339 as well as the naive ISO form Python's `isoformat()`
/// produces.
fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, FetchError> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|error| FetchError::request(None, format!("invalid timestamp {raw:?}: {error}")))
}

#[derive(Debug, Deserialize)]
pub struct DatasetWire {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(rename = "lastUpdated", default)]
    pub last_updated: String,
}

impl From<DatasetWire> for Dataset {
    fn from(wire: DatasetWire) -> Self {
        Self {
            id: DatasetId::new(wire.id),
            name: wire.name,
            description: wire.description,
            format: DatasetFormat::parse(&wire.kind),
            size: wire.size,
            columns: wire.columns.unwrap_or_default(),
            last_updated: wire.last_updated,
        }
    }
}

/// Upload responses come either bare or wrapped with a message.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UploadResponse {
    Wrapped { dataset: DatasetWire },
    Bare(DatasetWire),
}

impl From<UploadResponse> for Dataset {
    fn from(response: UploadResponse) -> Self {
        match response {
            UploadResponse::Wrapped { dataset } | UploadResponse::Bare(dataset) => dataset.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KaggleDatasetWire {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub file_count: u32,
}

impl From<KaggleDatasetWire> for KaggleDataset {
    fn from(wire: KaggleDatasetWire) -> Self {
        Self {
            id: wire.id,
            title: wire.title,
            description: wire.description.unwrap_or_default(),
            size: wire.size,
            last_updated: wire.last_updated.unwrap_or_default(),
            download_count: wire.download_count,
            file_count: wire.file_count,
        }
    }
}

/// FastAPI error body. `detail` is a string for handled errors and a list
/// of field errors for request validation failures.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub detail: Value,
}

impl ErrorBody {
    pub fn message(&self) -> String {
        match &self.detail {
            Value::String(message) => message.clone(),
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        }
    }
}
