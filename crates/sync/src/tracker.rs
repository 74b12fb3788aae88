// crates/sync/src/tracker.rs
//! Per-presentation analysis job tracking.
//!
//! [`StatusTracker::ensure_tracking`] is the single entry point every
//! refresh trigger funnels through. An in-flight set, checked and inserted
//! in one synchronous critical section, guarantees at most one status fetch
//! per presentation at any instant. While a job reports `pending` or
//! `processing`, the poll loop re-checks on a fixed interval, keeping the
//! id in the set across the delay.
//!
//! A 404 from the status endpoint is "no record yet", not an error: the
//! tracker falls back to the `has-results` probe to tell "finished long
//! ago" from "never started". Transient failures release the slot and stop;
//! the coordinator's backstop pass is the retry path.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use podium_client::ClientError;
use podium_types::{AnalysisPhase, AnalysisStatus, PresentationId};

use crate::backend::CoachBackend;
use crate::cache::ResultCache;
use crate::events::SyncEvent;
use crate::scheduler::Scheduler;

pub struct StatusTracker {
    backend: Arc<dyn CoachBackend>,
    cache: Arc<ResultCache>,
    scheduler: Scheduler,
    events: broadcast::Sender<SyncEvent>,
    /// Presentations with a live poll loop. The mutex-equivalent that
    /// decides who fetches.
    in_flight: Mutex<HashSet<PresentationId>>,
    poll_interval: Duration,
}

impl StatusTracker {
    pub fn new(
        backend: Arc<dyn CoachBackend>,
        cache: Arc<ResultCache>,
        scheduler: Scheduler,
        events: broadcast::Sender<SyncEvent>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            backend,
            cache,
            scheduler,
            events,
            in_flight: Mutex::new(HashSet::new()),
            poll_interval,
        }
    }

    /// Start tracking a presentation's analysis job. Idempotent: a no-op
    /// when a poll loop for this id is already live.
    pub fn ensure_tracking(self: &Arc<Self>, id: PresentationId) {
        if self.scheduler.is_shut_down() {
            return;
        }
        // Check-and-insert in one synchronous critical section; there is
        // no suspension point between the membership test and the insert.
        {
            let mut in_flight = match self.in_flight.lock() {
                Ok(guard) => guard,
                Err(e) => {
                    error!("in-flight set lock poisoned: {e}");
                    return;
                }
            };
            if !in_flight.insert(id) {
                return;
            }
        }

        let tracker = Arc::clone(self);
        self.scheduler.spawn(async move {
            tracker.poll_loop(id).await;
        });
    }

    /// Manual retry: the only path out of a terminal `error` phase.
    pub fn retry(self: &Arc<Self>, id: PresentationId) {
        self.cache.invalidate_presentation(id);
        self.ensure_tracking(id);
    }

    /// Whether a poll loop for this id is currently live.
    pub fn is_tracking(&self, id: PresentationId) -> bool {
        match self.in_flight.lock() {
            Ok(guard) => guard.contains(&id),
            Err(e) => {
                error!("in-flight set lock poisoned: {e}");
                false
            }
        }
    }

    async fn poll_loop(self: Arc<Self>, id: PresentationId) {
        loop {
            match self.backend.analysis_status(id).await {
                Ok(status) => {
                    self.store_status(id, status);
                    if status.phase.is_in_flight() {
                        if !self.scheduler.sleep(self.poll_interval).await {
                            break;
                        }
                        continue;
                    }
                    if status.phase == AnalysisPhase::Completed {
                        self.fetch_result(id).await;
                    }
                    break;
                }
                Err(ClientError::NotFoundYet) => {
                    self.probe(id).await;
                    break;
                }
                Err(e) if e.is_transient() => {
                    // No flicker to an error phase; the cached status
                    // stands and the backstop pass retries later.
                    warn!(presentation_id = id, error = %e, "status poll failed; will retry on next pass");
                    break;
                }
                Err(e) => {
                    warn!(presentation_id = id, error = %e, "status poll failed");
                    break;
                }
            }
        }
        self.release(id);
    }

    /// No status record exists. The job may never have started, or it
    /// finished long enough ago that only results remain.
    async fn probe(&self, id: PresentationId) {
        match self.backend.has_results(id).await {
            Ok(true) => {
                self.store_status(id, AnalysisStatus::completed());
                self.fetch_result(id).await;
            }
            Ok(false) => {
                self.store_status(id, AnalysisStatus::not_started());
            }
            Err(e) => {
                warn!(presentation_id = id, error = %e, "has-results probe failed");
                // Record that we checked and learned nothing.
                self.store_status(id, AnalysisStatus::unknown());
            }
        }
    }

    async fn fetch_result(&self, id: PresentationId) {
        match self.backend.analysis_result(id).await {
            Ok(Some(result)) => {
                self.cache.put_result(id, result);
                let _ = self.events.send(SyncEvent::ResultReady { presentation_id: id });
            }
            Ok(None) => {
                debug!(presentation_id = id, "result not materialized yet");
            }
            Err(e) => {
                warn!(presentation_id = id, error = %e, "result fetch failed");
            }
        }
    }

    fn store_status(&self, id: PresentationId, status: AnalysisStatus) {
        if self.cache.put_status(id, status) {
            let _ = self.events.send(SyncEvent::StatusChanged { presentation_id: id, status });
        }
    }

    fn release(&self, id: PresentationId) {
        match self.in_flight.lock() {
            Ok(mut guard) => {
                guard.remove(&id);
            }
            Err(e) => error!("in-flight set lock poisoned during release: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use podium_types::{AnalysisResult, Notification, Presentation, TopicId};

    /// One scripted response of the status endpoint.
    #[derive(Clone)]
    enum Scripted {
        Status(AnalysisStatus),
        NotFound,
        Transient,
    }

    /// Backend fake: pops scripted status responses per id (the last one
    /// sticks) and counts every call.
    struct ScriptedBackend {
        scripts: Mutex<HashMap<PresentationId, VecDeque<Scripted>>>,
        has_results: Mutex<HashMap<PresentationId, bool>>,
        results: Mutex<HashMap<PresentationId, AnalysisResult>>,
        status_calls: Mutex<HashMap<PresentationId, usize>>,
        result_calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(HashMap::new()),
                has_results: Mutex::new(HashMap::new()),
                results: Mutex::new(HashMap::new()),
                status_calls: Mutex::new(HashMap::new()),
                result_calls: AtomicUsize::new(0),
            })
        }

        fn script(&self, id: PresentationId, responses: Vec<Scripted>) {
            self.scripts.lock().unwrap().insert(id, responses.into());
        }

        fn set_result(&self, id: PresentationId, result: AnalysisResult) {
            self.results.lock().unwrap().insert(id, result);
        }

        fn set_has_results(&self, id: PresentationId, value: bool) {
            self.has_results.lock().unwrap().insert(id, value);
        }

        fn status_calls(&self, id: PresentationId) -> usize {
            self.status_calls.lock().unwrap().get(&id).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl CoachBackend for ScriptedBackend {
        async fn analysis_status(
            &self,
            id: PresentationId,
        ) -> Result<AnalysisStatus, ClientError> {
            *self.status_calls.lock().unwrap().entry(id).or_insert(0) += 1;
            let scripted = {
                let mut scripts = self.scripts.lock().unwrap();
                let queue = scripts.entry(id).or_default();
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            };
            match scripted {
                Some(Scripted::Status(status)) => Ok(status),
                Some(Scripted::NotFound) | None => Err(ClientError::NotFoundYet),
                Some(Scripted::Transient) => {
                    Err(ClientError::Server { status: 503, body: "overloaded".into() })
                }
            }
        }

        async fn analysis_result(
            &self,
            id: PresentationId,
        ) -> Result<Option<AnalysisResult>, ClientError> {
            self.result_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.results.lock().unwrap().get(&id).cloned())
        }

        async fn has_results(&self, id: PresentationId) -> Result<bool, ClientError> {
            Ok(self.has_results.lock().unwrap().get(&id).copied().unwrap_or(false))
        }

        async fn presentations(&self, _topic: TopicId) -> Result<Vec<Presentation>, ClientError> {
            Ok(Vec::new())
        }

        async fn notifications(
            &self,
            _page: u32,
            _size: u32,
        ) -> Result<Vec<Notification>, ClientError> {
            Ok(Vec::new())
        }
    }

    fn status(phase: AnalysisPhase) -> AnalysisStatus {
        AnalysisStatus { phase, progress: 0 }
    }

    fn sample_result(id: PresentationId) -> AnalysisResult {
        AnalysisResult {
            presentation_id: id,
            overall_score: 92.0,
            voice_score: 90.0,
            pace_score: 94.0,
            pitch_score: 89.0,
            pronunciation_score: 95.0,
            created_at: chrono::Utc::now(),
        }
    }

    fn tracker_with(backend: Arc<ScriptedBackend>) -> (Arc<StatusTracker>, Scheduler) {
        let scheduler = Scheduler::new();
        let tracker = Arc::new(StatusTracker::new(
            backend,
            Arc::new(ResultCache::new()),
            scheduler.clone(),
            broadcast::channel(64).0,
            Duration::from_secs(10),
        ));
        (tracker, scheduler)
    }

    /// Let spawned poll loops run; under the paused clock this also fires
    /// any timer due within `ms`.
    async fn settle(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn pending_job_polls_to_completion_with_one_result_fetch() {
        let backend = ScriptedBackend::new();
        backend.script(1, vec![
            Scripted::Status(status(AnalysisPhase::Pending)),
            Scripted::Status(status(AnalysisPhase::Completed)),
        ]);
        backend.set_result(1, sample_result(1));

        let (tracker, _scheduler) = tracker_with(Arc::clone(&backend));
        tracker.ensure_tracking(1);

        settle(10).await;
        assert_eq!(backend.status_calls(1), 1);
        assert_eq!(tracker.cache.status(1).unwrap().phase, AnalysisPhase::Pending);
        assert!(tracker.is_tracking(1));

        // The re-poll fires after the fixed interval and finds completion.
        settle(11_000).await;
        assert_eq!(backend.status_calls(1), 2);
        assert_eq!(backend.result_calls.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.cache.status(1).unwrap().phase, AnalysisPhase::Completed);
        assert!(tracker.cache.result(1).is_some());
        assert!(!tracker.is_tracking(1));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_ensure_tracking_issues_one_fetch() {
        let backend = ScriptedBackend::new();
        backend.script(1, vec![Scripted::Status(status(AnalysisPhase::Processing))]);

        let (tracker, _scheduler) = tracker_with(Arc::clone(&backend));
        tracker.ensure_tracking(1);
        tracker.ensure_tracking(1);
        tracker.ensure_tracking(1);

        settle(10).await;
        assert_eq!(backend.status_calls(1), 1);

        // Still deduplicated while the id waits out the re-poll delay.
        tracker.ensure_tracking(1);
        settle(10).await;
        assert_eq!(backend.status_calls(1), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_status_probes_has_results_true_path() {
        let backend = ScriptedBackend::new();
        backend.script(1, vec![Scripted::NotFound]);
        backend.set_has_results(1, true);
        backend.set_result(1, sample_result(1));

        let (tracker, _scheduler) = tracker_with(Arc::clone(&backend));
        tracker.ensure_tracking(1);
        settle(10).await;

        assert_eq!(tracker.cache.status(1).unwrap().phase, AnalysisPhase::Completed);
        assert!(tracker.cache.result(1).is_some());
        assert!(!tracker.is_tracking(1));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_status_probes_has_results_false_path() {
        let backend = ScriptedBackend::new();
        backend.script(1, vec![Scripted::NotFound]);

        let (tracker, _scheduler) = tracker_with(Arc::clone(&backend));
        tracker.ensure_tracking(1);
        settle(10).await;

        // "Checked, nothing yet" — stored, not absent.
        assert_eq!(tracker.cache.status(1).unwrap().phase, AnalysisPhase::NotStarted);
        assert!(!tracker.is_tracking(1));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_releases_the_slot_without_an_error_phase() {
        let backend = ScriptedBackend::new();
        backend.script(1, vec![
            Scripted::Status(status(AnalysisPhase::Processing)),
            Scripted::Transient,
            Scripted::Status(status(AnalysisPhase::Processing)),
        ]);

        let (tracker, _scheduler) = tracker_with(Arc::clone(&backend));
        tracker.ensure_tracking(1);
        settle(10).await;
        settle(11_000).await;

        // The failure did not regress the displayed status...
        assert_eq!(tracker.cache.status(1).unwrap().phase, AnalysisPhase::Processing);
        // ...and the slot is free for the next trigger.
        assert!(!tracker.is_tracking(1));

        tracker.ensure_tracking(1);
        settle(10).await;
        assert_eq!(backend.status_calls(1), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_escapes_a_terminal_error() {
        let backend = ScriptedBackend::new();
        backend.script(1, vec![Scripted::Status(status(AnalysisPhase::Error))]);

        let (tracker, _scheduler) = tracker_with(Arc::clone(&backend));
        tracker.ensure_tracking(1);
        settle(10).await;
        assert_eq!(tracker.cache.status(1).unwrap().phase, AnalysisPhase::Error);

        backend.script(1, vec![Scripted::Status(status(AnalysisPhase::Pending))]);
        tracker.retry(1);
        settle(10).await;
        assert_eq!(tracker.cache.status(1).unwrap().phase, AnalysisPhase::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_status_with_unmaterialized_result_is_not_an_error() {
        let backend = ScriptedBackend::new();
        backend.script(1, vec![Scripted::Status(status(AnalysisPhase::Completed))]);
        // No result set: analysis_result returns Ok(None).

        let (tracker, _scheduler) = tracker_with(Arc::clone(&backend));
        tracker.ensure_tracking(1);
        settle(10).await;

        assert_eq!(tracker.cache.status(1).unwrap().phase, AnalysisPhase::Completed);
        assert!(tracker.cache.result(1).is_none());
        assert!(!tracker.is_tracking(1));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_repoll() {
        let backend = ScriptedBackend::new();
        backend.script(1, vec![Scripted::Status(status(AnalysisPhase::Processing))]);

        let (tracker, scheduler) = tracker_with(Arc::clone(&backend));
        tracker.ensure_tracking(1);
        settle(10).await;
        assert_eq!(backend.status_calls(1), 1);

        scheduler.shutdown();
        settle(60_000).await;
        assert_eq!(backend.status_calls(1), 1);
    }
}
