//! Background token analysis.
//!
//! The coordinator runs the external tokenizer on a worker thread. The worker
//! never touches editor state: it reads a snapshot and hands results back
//! through the [`UiHandle`] so every mutation happens on the interaction
//! thread.
//!
//! Lifecycle:
//! 1. `detect_tokens` moves `Idle -> Running` and spawns the worker
//! 2. Worker reads the text snapshot through the queue and posts a status
//! 3. Worker tokenizes, then posts one batch: status + `Reconciling`, then
//!    reconcile and finish
//! 4. `finish` returns to `Idle` and records the outcome
//!
//! The worker thread is joined lazily by [`AnalysisCoordinator::reap`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use smol_str::SmolStr;

use crate::error::EditorError;
use crate::external::Tokenizer;
use crate::filter::TokenFilter;
use crate::queue::UiHandle;
use crate::store::AnnotationStore;
use crate::text::TextBuffer;
use crate::types::{Range, Token};

pub const STATUS_ANALYZING: &str = "Analyzing…";
pub const STATUS_RECONCILING: &str = "Updating tags…";

/// Coordinator state machine states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnalysisState {
    #[default]
    Idle,
    /// Tokenizer running off the interaction thread.
    Running,
    /// Results being applied to the store.
    Reconciling,
}

impl AnalysisState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true while direct edits must be refused.
    pub fn is_busy(&self) -> bool {
        !self.is_idle()
    }
}

/// Outcome of the last finished pass: anchors added, or the reported failure.
pub type AnalysisOutcome = Result<usize, EditorError>;

/// Interaction-thread state the worker calls back into.
pub trait AnalysisHost: 'static {
    fn coordinator(&self) -> &AnalysisCoordinator;

    fn coordinator_mut(&mut self) -> &mut AnalysisCoordinator;

    /// Full text the tokenizer should see.
    fn snapshot_text(&self) -> String;

    /// Apply a fresh token pass. Returns the number of anchors added.
    fn reconcile(&mut self, tokens: Vec<Token>) -> usize;

    fn set_status(&mut self, status: &str);
}

/// A spawned worker thread.
///
/// The thread yields `true` once it has posted its final batch.
struct Worker {
    handle: JoinHandle<bool>,
    queue_closed: Box<dyn Fn() -> bool>,
}

/// Runs at most one analysis pass at a time.
pub struct AnalysisCoordinator {
    tokenizer: Arc<dyn Tokenizer>,
    state: AnalysisState,
    worker: Option<Worker>,
    last_outcome: Option<AnalysisOutcome>,
}

impl std::fmt::Debug for AnalysisCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisCoordinator")
            .field("state", &self.state)
            .field("worker", &self.worker.is_some())
            .field("last_outcome", &self.last_outcome)
            .finish()
    }
}

impl AnalysisCoordinator {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            tokenizer,
            state: AnalysisState::Idle,
            worker: None,
            last_outcome: None,
        }
    }

    pub fn state(&self) -> AnalysisState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state.is_busy()
    }

    pub fn last_outcome(&self) -> Option<&AnalysisOutcome> {
        self.last_outcome.as_ref()
    }

    /// Start a pass on a worker thread.
    ///
    /// Rejected with [`EditorError::AnalysisRunning`] while a pass is in
    /// flight; the running pass is left alone.
    pub fn detect_tokens<H: AnalysisHost>(&mut self, ui: &UiHandle<H>) -> Result<(), EditorError> {
        self.reap();
        if self.state.is_busy() {
            tracing::warn!(state = ?self.state, "analysis already running, ignoring request");
            return Err(EditorError::AnalysisRunning);
        }
        // The previous pass already reported; its thread may still be
        // signalling the host.
        if let Some(previous) = self.worker.take() {
            if previous.handle.join().is_err() {
                tracing::error!("previous analysis worker panicked after reporting");
            }
        }

        let watched = ui.clone();
        let ui = ui.clone();
        let tokenizer = self.tokenizer.clone();
        let handle = thread::Builder::new()
            .name("gloss-analysis".into())
            .spawn(move || run_worker(ui, tokenizer))
            .map_err(|e| EditorError::Tokenizer(format!("failed to spawn analysis worker: {e}")))?;

        tracing::info!("analysis started");
        self.state = AnalysisState::Running;
        self.worker = Some(Worker {
            handle,
            queue_closed: Box::new(move || watched.is_closed()),
        });
        Ok(())
    }

    /// Join a finished worker.
    ///
    /// A worker that panicked, gave up before posting its final batch, or
    /// posted into a queue nobody drains any more never reports, so the pass
    /// is failed here and the buffer unlocked.
    pub fn reap(&mut self) {
        let Some(worker) = self.worker.take_if(|w| w.handle.is_finished()) else {
            return;
        };
        let queue_closed = (worker.queue_closed)();
        let joined = worker.handle.join();
        if !self.state.is_busy() {
            return;
        }
        match joined {
            Err(_) => {
                tracing::error!("analysis worker panicked");
                self.finish(Err(EditorError::Tokenizer(
                    "analysis worker exited without reporting".into(),
                )));
            }
            Ok(false) => self.finish(Err(EditorError::QueueClosed)),
            Ok(true) if queue_closed => self.finish(Err(EditorError::QueueClosed)),
            // The final batch is still waiting in the queue.
            Ok(true) => {}
        }
    }

    fn begin_reconcile(&mut self) {
        self.state = AnalysisState::Reconciling;
    }

    /// Return to `Idle` and record how the pass ended.
    pub fn finish(&mut self, outcome: AnalysisOutcome) {
        match &outcome {
            Ok(added) => tracing::info!(added, "analysis finished"),
            Err(e) => tracing::error!(error = %e, "analysis failed"),
        }
        self.state = AnalysisState::Idle;
        self.last_outcome = Some(outcome);
    }
}

type HostCall<H> = Box<dyn FnOnce(&mut H) + Send>;

/// Returns whether the final batch was posted.
fn run_worker<H: AnalysisHost>(ui: UiHandle<H>, tokenizer: Arc<dyn Tokenizer>) -> bool {
    let text = match ui.call(|host: &mut H| host.snapshot_text()) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(error = %e, "interaction side gone before analysis began");
            return false;
        }
    };

    drop(ui.enqueue(|host: &mut H| host.set_status(STATUS_ANALYZING)));
    ui.signal();

    let batch: Vec<HostCall<H>> = match tokenizer.tokenize(&text) {
        Ok(tokens) => {
            tracing::debug!(tokens = tokens.len(), "tokenizer returned");
            vec![
                Box::new(|host: &mut H| {
                    host.set_status(STATUS_RECONCILING);
                    host.coordinator_mut().begin_reconcile();
                }) as HostCall<H>,
                Box::new(move |host: &mut H| {
                    let outcome = Ok(host.reconcile(tokens));
                    host.set_status(&describe_outcome(&outcome));
                    host.coordinator_mut().finish(outcome);
                }),
            ]
        }
        Err(e) => {
            let outcome = Err(EditorError::tokenizer(e));
            vec![Box::new(move |host: &mut H| {
                host.set_status(&describe_outcome(&outcome));
                host.coordinator_mut().finish(outcome);
            }) as HostCall<H>]
        }
    };
    // Nothing waits on the batch: the interaction thread may be joining us.
    drop(ui.enqueue_batch(batch));
    ui.signal();
    !ui.is_closed()
}

/// Apply one token pass to `store`.
///
/// Stale anchors are swept first. Each token passing `translatable` is
/// anchored at its offsets; tokens that no longer line up with the text are
/// skipped with a warning and tokens overlapping an existing anchor are
/// skipped quietly. Returns the number of anchors added.
pub fn reconcile_tokens<B: TextBuffer>(
    store: &mut AnnotationStore<B>,
    mut tokens: Vec<Token>,
    translatable: &TokenFilter,
) -> usize {
    let swept = store.remove_stale_anchors();
    if swept > 0 {
        tracing::debug!(swept, "swept stale anchors before reconcile");
    }

    tokens.sort_by_key(|t| t.sequence_index);
    let mut added = 0;
    for (i, token) in tokens.iter().enumerate() {
        if !translatable.matches(token) {
            continue;
        }
        let range = Range::from_offsets(token.start_offset, token.length);
        match store.buffer().slice(range) {
            Ok(found) if found == token.text => {}
            Ok(found) => {
                tracing::warn!(%range, expected = %token.text, %found, "token text mismatch, skipping");
                continue;
            }
            Err(e) => {
                tracing::warn!(%range, token = %token.text, error = %e, "token out of bounds, skipping");
                continue;
            }
        }

        let next = tokens.get(i + 1).cloned();
        match store.add_anchor(token.clone(), next, range) {
            Ok(id) => {
                tracing::debug!(tag = %id, %range, token = %token.text, "anchored token");
                added += 1;
            }
            Err(EditorError::Overlap { existing, .. }) => {
                tracing::debug!(%range, existing = %existing, "token already anchored, skipping");
            }
            Err(e) => {
                tracing::warn!(%range, error = %e, "failed to anchor token");
            }
        }
    }
    added
}

/// Summary line for a status bar.
pub fn describe_outcome(outcome: &AnalysisOutcome) -> SmolStr {
    match outcome {
        Ok(1) => SmolStr::new_static("1 tag added"),
        Ok(n) => smol_str::format_smolstr!("{n} tags added"),
        Err(e) => smol_str::format_smolstr!("Analysis failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::queue::UiTaskQueue;
    use crate::types::TagId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn sample_tokens() -> Vec<Token> {
        vec![
            Token::new("魔王", 0, "NOUN", "魔王", 0),
            Token::new("を", 2, "ADP", "を", 1),
            Token::new("倒した", 3, "VERB", "倒す", 2),
        ]
    }

    struct TestHost {
        coordinator: AnalysisCoordinator,
        store: AnnotationStore,
        statuses: Vec<String>,
    }

    impl TestHost {
        fn new(text: &str, tokenizer: impl Tokenizer + 'static) -> Self {
            Self {
                coordinator: AnalysisCoordinator::new(Arc::new(tokenizer)),
                store: AnnotationStore::from_str(text),
                statuses: Vec::new(),
            }
        }
    }

    impl AnalysisHost for TestHost {
        fn coordinator(&self) -> &AnalysisCoordinator {
            &self.coordinator
        }

        fn coordinator_mut(&mut self) -> &mut AnalysisCoordinator {
            &mut self.coordinator
        }

        fn snapshot_text(&self) -> String {
            self.store.text()
        }

        fn reconcile(&mut self, tokens: Vec<Token>) -> usize {
            reconcile_tokens(&mut self.store, tokens, &TokenFilter::including(["NOUN", "VERB"]))
        }

        fn set_status(&mut self, status: &str) {
            self.statuses.push(status.to_owned());
        }
    }

    fn run_until_idle(queue: &mut UiTaskQueue<TestHost>, host: &mut TestHost) {
        for _ in 0..5000 {
            queue.drain(host);
            host.coordinator_mut().reap();
            if !host.coordinator().is_locked() {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("analysis did not finish");
    }

    #[test]
    fn test_state_default() {
        assert_eq!(AnalysisState::default(), AnalysisState::Idle);
        assert!(!AnalysisState::Idle.is_busy());
        assert!(AnalysisState::Running.is_busy());
        assert!(AnalysisState::Reconciling.is_busy());
    }

    #[test]
    fn test_reconcile_tokens_anchors_translatable() {
        let mut store = AnnotationStore::from_str("魔王を倒した");
        let added = reconcile_tokens(&mut store, sample_tokens(), &TokenFilter::including(["VERB"]));
        assert_eq!(added, 1);
        let anchors = store.anchors();
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].1, Range::from(3..6));
        assert_eq!(anchors[0].2.token.lemma, "倒す");
        assert!(anchors[0].2.is_final());
    }

    #[test]
    fn test_reconcile_records_next_token() {
        let mut store = AnnotationStore::from_str("魔王を倒した");
        let mut tokens = sample_tokens();
        tokens.reverse();
        reconcile_tokens(&mut store, tokens, &TokenFilter::including(["NOUN"]));
        let anchors = store.anchors();
        let next = anchors[0].2.next.as_ref().map(|t| t.text.as_str());
        assert_eq!(next, Some("を"));
    }

    #[test]
    fn test_reconcile_skips_mismatched_tokens() {
        let mut store = AnnotationStore::from_str("魔王を倒した");
        let tokens = vec![
            Token::new("勇者", 0, "NOUN", "勇者", 0),
            Token::new("倒したい", 3, "VERB", "倒す", 1),
        ];
        assert_eq!(
            reconcile_tokens(&mut store, tokens, &TokenFilter::including(["NOUN", "VERB"])),
            0
        );
        assert_eq!(store.anchor_count(), 0);
    }

    #[test]
    fn test_reconcile_twice_keeps_anchor_set() {
        let mut store = AnnotationStore::from_str("魔王を倒した");
        let filter = TokenFilter::including(["NOUN", "VERB"]);
        assert_eq!(reconcile_tokens(&mut store, sample_tokens(), &filter), 2);
        let before: Vec<(TagId, Range)> = store.anchors().iter().map(|(id, r, _)| (*id, *r)).collect();

        assert_eq!(reconcile_tokens(&mut store, sample_tokens(), &filter), 0);
        assert_eq!(store.remove_stale_anchors(), 0);
        let after: Vec<(TagId, Range)> = store.anchors().iter().map(|(id, r, _)| (*id, *r)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_background_pass() {
        let mut queue = UiTaskQueue::new();
        let mut host = TestHost::new("魔王を倒した", |_: &str| -> Result<Vec<Token>, BoxError> {
            Ok(sample_tokens())
        });

        host.coordinator_mut().detect_tokens(&queue.handle()).unwrap();
        assert!(host.coordinator().is_locked());
        run_until_idle(&mut queue, &mut host);

        assert_eq!(host.coordinator().last_outcome(), Some(&Ok(2)));
        assert_eq!(host.store.anchors().len(), 2);
        assert_eq!(
            host.statuses,
            vec![STATUS_ANALYZING, STATUS_RECONCILING, "2 tags added"]
        );
    }

    #[test]
    fn test_tokenizer_failure_leaves_store_untouched() {
        let mut queue = UiTaskQueue::new();
        let mut host = TestHost::new("魔王を倒した", |_: &str| -> Result<Vec<Token>, BoxError> {
            Err("analyzer crashed".into())
        });

        host.coordinator_mut().detect_tokens(&queue.handle()).unwrap();
        run_until_idle(&mut queue, &mut host);

        assert_eq!(
            host.coordinator().last_outcome(),
            Some(&Err(EditorError::Tokenizer("analyzer crashed".into())))
        );
        assert_eq!(host.store.anchor_count(), 0);
        assert!(!host.coordinator().is_locked());
    }

    #[test]
    fn test_panicking_worker_unlocks() {
        let mut queue = UiTaskQueue::new();
        let mut host = TestHost::new("abc", |_: &str| -> Result<Vec<Token>, BoxError> {
            panic!("tokenizer blew up")
        });

        host.coordinator_mut().detect_tokens(&queue.handle()).unwrap();
        run_until_idle(&mut queue, &mut host);

        assert!(matches!(
            host.coordinator().last_outcome(),
            Some(Err(EditorError::Tokenizer(_)))
        ));
    }

    #[test]
    fn test_second_detect_is_rejected() {
        let mut queue = UiTaskQueue::new();
        let mut host = TestHost::new("魔王を倒した", |_: &str| -> Result<Vec<Token>, BoxError> {
            Ok(sample_tokens())
        });
        let ui = queue.handle();

        host.coordinator_mut().detect_tokens(&ui).unwrap();
        assert_eq!(
            host.coordinator_mut().detect_tokens(&ui),
            Err(EditorError::AnalysisRunning)
        );
        assert_eq!(host.store.anchor_count(), 0);

        run_until_idle(&mut queue, &mut host);
        assert_eq!(host.store.anchors().len(), 2);

        // Idle again, so a new pass is accepted.
        host.coordinator_mut().detect_tokens(&ui).unwrap();
        run_until_idle(&mut queue, &mut host);
        assert_eq!(host.coordinator().last_outcome(), Some(&Ok(0)));
    }

    #[test]
    fn test_dropped_queue_unlocks() {
        let queue: UiTaskQueue<TestHost> = UiTaskQueue::new();
        let mut host = TestHost::new("魔王を倒した", |_: &str| -> Result<Vec<Token>, BoxError> {
            Ok(sample_tokens())
        });

        host.coordinator_mut().detect_tokens(&queue.handle()).unwrap();
        drop(queue);
        for _ in 0..5000 {
            host.coordinator_mut().reap();
            if !host.coordinator().is_locked() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }

        assert!(!host.coordinator().is_locked());
        assert_eq!(
            host.coordinator().last_outcome(),
            Some(&Err(EditorError::QueueClosed))
        );
        assert_eq!(host.store.anchor_count(), 0);

        let mut queue = UiTaskQueue::new();
        host.coordinator_mut().detect_tokens(&queue.handle()).unwrap();
        run_until_idle(&mut queue, &mut host);
        assert_eq!(host.coordinator().last_outcome(), Some(&Ok(2)));
    }

    #[test]
    fn test_one_worker_alive_across_passes() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (active.clone(), peak.clone());
        // A slow wake-up hook keeps each worker busy after it has reported.
        let mut queue = UiTaskQueue::with_notifier(move || {
            let now = a.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            a.fetch_sub(1, Ordering::SeqCst);
        });
        let mut host = TestHost::new("魔王を倒した", |_: &str| -> Result<Vec<Token>, BoxError> {
            Ok(sample_tokens())
        });

        for _ in 0..2 {
            host.coordinator_mut().detect_tokens(&queue.handle()).unwrap();
            run_until_idle(&mut queue, &mut host);
        }

        assert_eq!(host.coordinator().last_outcome(), Some(&Ok(0)));
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_describe_outcome() {
        assert_eq!(describe_outcome(&Ok(1)), "1 tag added");
        assert_eq!(describe_outcome(&Ok(3)), "3 tags added");
        assert_eq!(
            describe_outcome(&Err(EditorError::Tokenizer("boom".into()))),
            "Analysis failed: tokenizer failed: boom"
        );
    }
}
