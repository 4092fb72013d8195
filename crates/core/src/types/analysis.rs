use serde::Serialize;

use super::{dataset::DatasetId, usage::TokenUsageSnapshot};

/// A submitted analysis. Fields are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AnalysisRequest {
    query: String,
    dataset_id: DatasetId,
}

impl AnalysisRequest {
    pub fn new(query: impl Into<String>, dataset_id: DatasetId) -> Self {
        Self {
            query: query.into().trim().to_string(),
            dataset_id,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn dataset_id(&self) -> &DatasetId {
        &self.dataset_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisResult {
    Success(AnalysisReport),
    Error { message: String },
}

impl AnalysisResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            Self::Success(report) => &report.warnings,
            Self::Error { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub narrative: Narrative,
    pub visualizations: Visualizations,
    pub qa_review: QaReview,
    /// Advisory only; a report with warnings is still a success.
    pub warnings: Vec<String>,
    pub token_usage: Option<TokenUsageSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Narrative {
    pub executive_summary: String,
    pub key_findings: Vec<String>,
    pub business_implications: Vec<String>,
    pub recommendations: Vec<String>,
    pub visualization_insights: Vec<VisualizationInsight>,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VisualizationInsight {
    pub kind: String,
    pub column: Option<String>,
    pub name: Option<String>,
    pub insight: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Visualizations {
    pub plots: Vec<Plot>,
    pub summary: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plot {
    pub kind: String,
    pub column: Option<String>,
    pub name: Option<String>,
    /// Encoded image payload as produced by the backend.
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QaReview {
    pub validation_status: String,
    pub quality_checks: Vec<QualityCheck>,
    pub improvement_suggestions: Vec<String>,
    pub clarity_score: f64,
    pub accuracy_score: f64,
    pub actionability_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityCheck {
    pub aspect: String,
    pub status: CheckStatus,
    pub comments: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Passed,
    Warning,
    Failed,
}

impl QaReview {
    pub fn failed_checks(&self) -> impl Iterator<Item = &QualityCheck> {
        self.quality_checks
            .iter()
            .filter(|check| check.status == CheckStatus::Failed)
    }
}
