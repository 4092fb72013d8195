use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    backend::AnalysisBackend,
    coordinator::RequestCoordinator,
    monitor::TickStream,
    types::{EntryStatus, RequestKey, Resource, TokenUsageSnapshot, WARNING_THRESHOLD_PERCENT},
};

pub const DEFAULT_WARNING_THRESHOLD: f64 = WARNING_THRESHOLD_PERCENT;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub snapshot: TokenUsageSnapshot,
    pub usage_percentage: f64,
    pub warning: bool,
}

impl UsageReport {
    pub fn from_snapshot(snapshot: TokenUsageSnapshot, threshold: f64) -> Self {
        Self {
            usage_percentage: snapshot.usage_percentage(),
            warning: snapshot.exceeds(threshold),
            snapshot,
        }
    }
}

/// Polls the daily token budget and publishes the latest [`UsageReport`].
///
/// A failed poll keeps the previous report, warning included.
pub struct TokenBudgetMonitor<B> {
    backend: Arc<B>,
    requests: Arc<RequestCoordinator<Resource>>,
    threshold: f64,
    reports: watch::Sender<Option<UsageReport>>,
}

impl<B> TokenBudgetMonitor<B>
where
    B: AnalysisBackend + 'static,
{
    pub fn new(backend: Arc<B>, requests: Arc<RequestCoordinator<Resource>>) -> Self {
        let (reports, _) = watch::channel(None);
        Self {
            backend,
            requests,
            threshold: DEFAULT_WARNING_THRESHOLD,
            reports,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<UsageReport>> {
        self.reports.subscribe()
    }

    pub fn latest(&self) -> Option<UsageReport> {
        self.reports.borrow().clone()
    }

    pub fn is_warning(&self) -> bool {
        self.reports
            .borrow()
            .as_ref()
            .is_some_and(|report| report.warning)
    }

    /// Fetches usage once, bypassing the cache, and returns the report now
    /// in effect. A failed poll is not retried until the next call.
    pub async fn poll_once(&self) -> Option<UsageReport> {
        let backend = Arc::clone(&self.backend);
        let handle = self.requests.poll(RequestKey::token_usage(), move || {
            let backend = Arc::clone(&backend);
            async move { backend.token_usage().await.map(Resource::TokenUsage) }
        });

        let entry = match handle.await {
            Ok(entry) => entry,
            Err(_) => {
                debug!("token usage poll superseded");
                return self.latest();
            }
        };

        if entry.status == EntryStatus::Error {
            if let Some(error) = &entry.error {
                warn!(%error, "token usage poll failed, keeping last report");
            }
            return self.latest();
        }

        let Some(snapshot) = entry.value.and_then(Resource::into_token_usage) else {
            warn!("token usage entry held an unexpected resource");
            return self.latest();
        };

        let report = UsageReport::from_snapshot(snapshot, self.threshold);
        if report.warning {
            warn!(
                usage = report.snapshot.current_usage,
                limit = report.snapshot.daily_limit,
                percentage = report.usage_percentage,
                "token usage above warning threshold"
            );
        } else {
            debug!(percentage = report.usage_percentage, "token usage polled");
        }

        self.reports.send_replace(Some(report.clone()));
        Some(report)
    }

    /// Polls on every tick until the stream ends.
    pub async fn run<T>(&self, mut ticks: T)
    where
        T: TickStream,
    {
        info!(threshold = self.threshold, "token budget monitor started");
        while ticks.next().await.is_some() {
            self.poll_once().await;
        }
        info!("token budget monitor stopped");
    }
}
