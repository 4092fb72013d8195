use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{
    backend::AnalysisBackend,
    coordinator::RequestCoordinator,
    error::{Error, StateError},
    pipeline::Submission,
    types::{DatasetId, PipelineState, RequestKey, Resource},
    validation::validate_submission,
};

pub(super) struct Session {
    pub query: String,
    pub dataset: Option<DatasetId>,
    pub state: PipelineState,
    /// Bumped whenever the inputs change, so late responses for an older
    /// session can be recognised and dropped.
    pub generation: u64,
}

pub(super) struct SessionCell {
    pub session: Mutex<Session>,
    state_tx: watch::Sender<PipelineState>,
}

impl SessionCell {
    pub fn transition(&self, session: &mut Session, next: PipelineState) {
        debug!(from = session.state.name(), to = next.name(), "pipeline transition");
        session.state = next.clone();
        self.state_tx.send_replace(next);
    }

    fn restart(&self, session: &mut Session, reason: &'static str) {
        session.generation += 1;
        if !matches!(session.state, PipelineState::Idle) {
            debug!(reason, "restarting analysis session");
            self.transition(session, PipelineState::Idle);
        }
    }
}

/// Drives one analysis session: query and dataset inputs, validation, the
/// request itself, and the resulting [`PipelineState`].
pub struct AnalysisPipeline<B> {
    backend: Arc<B>,
    requests: Arc<RequestCoordinator<Resource>>,
    cell: Arc<SessionCell>,
}

impl<B> AnalysisPipeline<B>
where
    B: AnalysisBackend + 'static,
{
    pub fn new(backend: Arc<B>, requests: Arc<RequestCoordinator<Resource>>) -> Self {
        let (state_tx, _) = watch::channel(PipelineState::Idle);
        Self {
            backend,
            requests,
            cell: Arc::new(SessionCell {
                session: Mutex::new(Session {
                    query: String::new(),
                    dataset: None,
                    state: PipelineState::Idle,
                    generation: 0,
                }),
                state_tx,
            }),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.cell.session.lock().state.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.cell.state_tx.subscribe()
    }

    pub fn query(&self) -> String {
        self.cell.session.lock().query.clone()
    }

    pub fn dataset(&self) -> Option<DatasetId> {
        self.cell.session.lock().dataset.clone()
    }

    /// Edits the query. Any change other than surrounding whitespace ends the
    /// current session and returns the pipeline to idle.
    pub fn set_query(&self, query: impl Into<String>) {
        let query = query.into();
        let mut session = self.cell.session.lock();
        let changed = session.query.trim() != query.trim();
        session.query = query;
        if changed {
            self.cell.restart(&mut session, "query changed");
        }
    }

    pub fn select_dataset(&self, dataset: Option<DatasetId>) {
        let mut session = self.cell.session.lock();
        if session.dataset != dataset {
            session.dataset = dataset;
            self.cell.restart(&mut session, "dataset changed");
        }
    }

    /// Drops the current result and returns to idle, keeping the inputs.
    pub fn reset(&self) {
        let mut session = self.cell.session.lock();
        self.cell.restart(&mut session, "reset");
    }

    /// Validates the inputs and issues the analysis request.
    ///
    /// Invalid inputs move the pipeline to [`PipelineState::Invalid`] without
    /// contacting the backend. The response is applied by a spawned task, so
    /// the returned [`Submission`] only needs awaiting to observe the result.
    /// Must be called within a tokio runtime.
    pub fn submit(&self) -> Result<Submission, Error> {
        let mut session = self.cell.session.lock();
        if session.state.is_requesting() {
            return Err(StateError::AlreadyRequesting.into());
        }
        let can_request = session.state.can_request();

        let request = match validate_submission(&session.query, session.dataset.as_ref()) {
            Ok(request) => request,
            Err(reason) => {
                self.cell
                    .transition(&mut session, PipelineState::Invalid(reason));
                return Err(reason.into());
            }
        };

        if !can_request {
            return Err(StateError::SessionSettled.into());
        }

        self.cell.transition(&mut session, PipelineState::Requesting);
        let generation = session.generation;
        drop(session);

        let key = RequestKey::analyze(&request);
        info!(%key, "analysis requested");

        let backend = Arc::clone(&self.backend);
        let perform = move || {
            let backend = Arc::clone(&backend);
            let request = request.clone();
            async move { backend.analyze(&request).await.map(Resource::Analysis) }
        };
        let pending = self.requests.fetch_latest(key.clone(), perform);

        Ok(Submission::spawn(
            Arc::clone(&self.cell),
            generation,
            key,
            pending,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::mock::{MockBackend, report},
        cache::CacheStore,
        error::{FetchError, ValidationError},
        types::{AnalysisResult, DEFAULT_RETENTION, StalenessPolicy},
    };

    fn pipeline(backend: MockBackend) -> (Arc<MockBackend>, AnalysisPipeline<MockBackend>) {
        let backend = Arc::new(backend);
        let store = Arc::new(CacheStore::new(DEFAULT_RETENTION));
        let requests = Arc::new(RequestCoordinator::new(store, StalenessPolicy::default()));
        (Arc::clone(&backend), AnalysisPipeline::new(backend, requests))
    }

    fn ready(pipeline: &AnalysisPipeline<MockBackend>, query: &str, dataset: &str) {
        pipeline.set_query(query);
        pipeline.select_dataset(Some(DatasetId::new(dataset)));
    }

    #[tokio::test]
    async fn empty_query_is_invalid_without_request() {
        let (backend, pipeline) = pipeline(MockBackend::default());
        pipeline.select_dataset(Some(DatasetId::new("ds1")));

        let err = pipeline.submit().err().expect("submission rejected");
        assert!(matches!(
            err,
            Error::Validation(ValidationError::EmptyQuery)
        ));
        assert_eq!(
            pipeline.state(),
            PipelineState::Invalid(ValidationError::EmptyQuery)
        );
        assert_eq!(backend.calls("analyze"), 0);
    }

    #[tokio::test]
    async fn missing_dataset_is_invalid() {
        let (backend, pipeline) = pipeline(MockBackend::default());
        pipeline.set_query("trend analysis");

        assert!(pipeline.submit().is_err());
        assert_eq!(
            pipeline.state(),
            PipelineState::Invalid(ValidationError::NoDatasetSelected)
        );
        assert_eq!(backend.calls("analyze"), 0);

        pipeline.set_query("another question");
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn successful_analysis() {
        let (backend, pipeline) = pipeline(MockBackend::default());
        let gate = backend.gate_analysis("trend analysis");
        ready(&pipeline, "trend analysis", "ds1");
        let mut states = pipeline.subscribe();

        let submission = pipeline.submit().expect("submitted");
        assert_eq!(pipeline.state(), PipelineState::Requesting);
        assert_eq!(*states.borrow_and_update(), PipelineState::Requesting);

        gate.send(Ok(AnalysisResult::Success(report("Revenue grew 12%"))))
            .expect("gate open");
        let settled = submission.settle().await;

        let expected = PipelineState::Succeeded(Arc::new(report("Revenue grew 12%")));
        assert_eq!(settled, expected);
        assert_eq!(pipeline.state(), expected);
        assert_eq!(*states.borrow(), expected);
        assert_eq!(backend.calls("analyze:trend analysis@ds1"), 1);
    }

    #[tokio::test]
    async fn input_change_abandons_request() {
        let (backend, pipeline) = pipeline(MockBackend::default());
        let gate = backend.gate_analysis("first question");
        ready(&pipeline, "first question", "ds1");

        let submission = pipeline.submit().expect("submitted");
        pipeline.set_query("second question");
        assert_eq!(pipeline.state(), PipelineState::Idle);

        gate.send(Ok(AnalysisResult::Success(report("late"))))
            .expect("gate open");
        assert_eq!(submission.settle().await, PipelineState::Idle);
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn dropped_submission_still_settles() {
        let (backend, pipeline) = pipeline(MockBackend::default());
        backend.push_analysis(
            "trend analysis",
            Ok(AnalysisResult::Success(report("Revenue grew 12%"))),
        );
        ready(&pipeline, "trend analysis", "ds1");
        let mut states = pipeline.subscribe();

        drop(pipeline.submit().expect("submitted"));
        let settled = states
            .wait_for(PipelineState::is_settled)
            .await
            .expect("pipeline alive")
            .clone();

        assert_eq!(
            settled,
            PipelineState::Succeeded(Arc::new(report("Revenue grew 12%")))
        );
        assert_eq!(backend.calls("analyze:trend analysis@ds1"), 1);
        assert_eq!(pipeline.requests.in_flight_count(), 0);
        assert!(matches!(
            pipeline.submit(),
            Err(Error::State(StateError::SessionSettled))
        ));
    }

    #[tokio::test]
    async fn dataset_change_abandons_request() {
        let (backend, pipeline) = pipeline(MockBackend::default());
        let gate = backend.gate_analysis("trend analysis");
        ready(&pipeline, "trend analysis", "ds1");

        let submission = pipeline.submit().expect("submitted");
        pipeline.select_dataset(Some(DatasetId::new("ds2")));
        assert_eq!(pipeline.state(), PipelineState::Idle);

        gate.send(Ok(AnalysisResult::Success(report("late"))))
            .expect("gate open");
        assert_eq!(submission.settle().await, PipelineState::Idle);
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert_eq!(pipeline.dataset(), Some(DatasetId::new("ds2")));
    }

    #[tokio::test]
    async fn whitespace_edits_keep_session() {
        let (backend, pipeline) = pipeline(MockBackend::default());
        backend.push_analysis(
            "trend analysis",
            Ok(AnalysisResult::Success(report("ok"))),
        );
        ready(&pipeline, "trend analysis", "ds1");

        let submission = pipeline.submit().expect("submitted");
        pipeline.set_query("trend analysis  ");
        assert!(pipeline.state().is_requesting());
        assert!(matches!(
            submission.settle().await,
            PipelineState::Succeeded(_)
        ));
    }

    #[tokio::test]
    async fn failures_become_messages() {
        let (backend, pipeline) = pipeline(MockBackend::default());
        backend.push_analysis(
            "too big",
            Err(FetchError::request(Some(413), "Dataset exceeds token budget")),
        );
        backend.push_analysis("flaky", Err(FetchError::transient("connection reset")));
        backend.push_analysis("flaky", Err(FetchError::transient("connection reset")));
        backend.push_analysis(
            "refused",
            Ok(AnalysisResult::Error {
                message: "quota exhausted".to_string(),
            }),
        );

        ready(&pipeline, "too big", "ds1");
        let state = pipeline.submit().expect("submitted").settle().await;
        assert_eq!(
            state,
            PipelineState::Failed("Dataset exceeds token budget".to_string())
        );

        pipeline.set_query("flaky");
        let state = pipeline.submit().expect("submitted").settle().await;
        assert_eq!(
            state,
            PipelineState::Failed("Failed to analyze data".to_string())
        );
        assert_eq!(backend.calls("analyze:flaky"), 2);

        pipeline.set_query("refused");
        let state = pipeline.submit().expect("submitted").settle().await;
        assert_eq!(
            state,
            PipelineState::Failed("Analysis failed: quota exhausted".to_string())
        );
    }

    #[tokio::test]
    async fn warnings_are_kept_on_success() {
        let (backend, pipeline) = pipeline(MockBackend::default());
        let mut with_warnings = report("Mostly fine");
        with_warnings.warnings = vec!["3 rows dropped".to_string()];
        backend.push_analysis(
            "summary",
            Ok(AnalysisResult::Success(with_warnings.clone())),
        );
        ready(&pipeline, "summary", "ds1");

        match pipeline.submit().expect("submitted").settle().await {
            PipelineState::Succeeded(report) => {
                assert_eq!(report.warnings, vec!["3 rows dropped".to_string()]);
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_and_settled_submissions() {
        let (backend, pipeline) = pipeline(MockBackend::default());
        let gate = backend.gate_analysis("trend analysis");
        ready(&pipeline, "trend analysis", "ds1");

        let submission = pipeline.submit().expect("submitted");
        assert!(matches!(
            pipeline.submit(),
            Err(Error::State(StateError::AlreadyRequesting))
        ));

        gate.send(Ok(AnalysisResult::Success(report("done"))))
            .expect("gate open");
        submission.settle().await;
        assert!(matches!(
            pipeline.submit(),
            Err(Error::State(StateError::SessionSettled))
        ));

        // Same inputs after a reset are served from the cache.
        pipeline.reset();
        let state = pipeline.submit().expect("submitted").settle().await;
        assert_eq!(
            state,
            PipelineState::Succeeded(Arc::new(report("done")))
        );
        assert_eq!(backend.calls("analyze"), 1);
    }
}
