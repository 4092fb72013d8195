use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    error::FetchError,
    types::{AnalysisResult, CacheEntry, EntryStatus, PipelineState, RequestKey, Resource},
};

use super::core::SessionCell;

const GENERIC_FAILURE: &str = "Failed to analyze data";
const BACKEND_FAILURE: &str = "Analysis failed";

/// An analysis request issued for one pipeline session.
///
/// The request runs on its own task and applies its result to the pipeline
/// whether or not the submission is awaited; dropping it only stops the
/// caller from waiting.
pub struct Submission {
    cell: Arc<SessionCell>,
    task: JoinHandle<PipelineState>,
}

impl Submission {
    /// Spawns the task that awaits `pending` and applies it to the session
    /// numbered `session`. Must be called within a tokio runtime.
    pub(super) fn spawn(
        cell: Arc<SessionCell>,
        session: u64,
        key: RequestKey,
        pending: BoxFuture<'static, CacheEntry<Resource>>,
    ) -> Self {
        let task = tokio::spawn({
            let cell = Arc::clone(&cell);
            async move {
                let entry = pending.await;
                apply(&cell, session, &key, &entry)
            }
        });
        Self { cell, task }
    }

    /// Waits for the response to be applied and returns the pipeline state
    /// afterwards. A response for an abandoned session leaves the state as
    /// the newer session set it.
    pub async fn settle(self) -> PipelineState {
        match self.task.await {
            Ok(state) => state,
            Err(error) => {
                warn!(%error, "analysis task ended without a response");
                self.cell.session.lock().state.clone()
            }
        }
    }
}

fn apply(
    cell: &SessionCell,
    session: u64,
    key: &RequestKey,
    entry: &CacheEntry<Resource>,
) -> PipelineState {
    let mut current = cell.session.lock();
    if current.generation != session || !current.state.is_requesting() {
        debug!(%key, "analysis session abandoned, dropping response");
        return current.state.clone();
    }

    let next = settled_state(entry);
    info!(%key, state = next.name(), "analysis settled");
    cell.transition(&mut current, next.clone());
    next
}

fn settled_state(entry: &CacheEntry<Resource>) -> PipelineState {
    if entry.status == EntryStatus::Error {
        return PipelineState::Failed(failure_message(entry.error.as_ref()));
    }

    match entry.value.clone().and_then(Resource::into_analysis) {
        Some(AnalysisResult::Success(report)) => PipelineState::Succeeded(Arc::new(report)),
        Some(AnalysisResult::Error { message }) if !message.trim().is_empty() => {
            PipelineState::Failed(format!("{BACKEND_FAILURE}: {}", message.trim()))
        }
        Some(AnalysisResult::Error { .. }) => PipelineState::Failed(BACKEND_FAILURE.to_string()),
        None => PipelineState::Failed(GENERIC_FAILURE.to_string()),
    }
}

fn failure_message(error: Option<&FetchError>) -> String {
    match error {
        Some(FetchError::Request { message, .. }) if !message.trim().is_empty() => {
            message.clone()
        }
        Some(FetchError::Request { .. }) => BACKEND_FAILURE.to_string(),
        Some(FetchError::Transient(_)) | None => GENERIC_FAILURE.to_string(),
    }
}
