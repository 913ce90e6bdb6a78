//! Interaction-thread owner of the buffer and everything attached to it.
//!
//! [`Editor`] is what a host UI drives: it routes edits, analysis requests,
//! clicks and picks to the right component and refuses direct edits while an
//! analysis pass holds the buffer.

use std::sync::Arc;

use crate::analysis::{
    AnalysisCoordinator, AnalysisHost, AnalysisOutcome, AnalysisState, describe_outcome,
    reconcile_tokens,
};
use crate::error::EditorError;
use crate::external::{Dictionary, Tokenizer};
use crate::filter::Settings;
use crate::queue::UiHandle;
use crate::selection::{CandidatePrompt, Candidates, SelectionController};
use crate::store::{Anchor, AnnotationStore};
use crate::substitute::SubstitutionEngine;
use crate::types::{Position, Range, TagId, Token};

pub struct Editor {
    store: AnnotationStore,
    selection: SelectionController,
    substitution: SubstitutionEngine,
    coordinator: AnalysisCoordinator,
    settings: Settings,
    dictionary: Box<dyn Dictionary>,
    status: String,
}

impl Editor {
    pub fn new(
        tokenizer: Arc<dyn Tokenizer>,
        dictionary: Box<dyn Dictionary>,
        settings: Settings,
    ) -> Self {
        Self {
            store: AnnotationStore::default(),
            selection: SelectionController::new(),
            substitution: SubstitutionEngine::new(settings.word_start.clone()),
            coordinator: AnalysisCoordinator::new(tokenizer),
            settings,
            dictionary,
            status: String::new(),
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.store.reset(text);
        self
    }

    fn ensure_unlocked(&self) -> Result<(), EditorError> {
        if self.is_locked() {
            tracing::warn!("edit rejected while analysis runs");
            return Err(EditorError::Locked);
        }
        Ok(())
    }

    /// Drop the selection cache once its anchor is gone.
    fn sync_selection(&mut self) {
        if self.selection.candidates().is_some() && self.store.current_selection().is_none() {
            self.selection.reset();
        }
    }

    /// Replace the whole content, dropping every tag.
    pub fn set_text(&mut self, text: &str) -> Result<(), EditorError> {
        self.ensure_unlocked()?;
        self.store.reset(text);
        self.selection.reset();
        Ok(())
    }

    pub fn text(&self) -> String {
        self.store.text()
    }

    pub fn len_chars(&self) -> usize {
        self.store.buffer().len_chars()
    }

    pub fn insert(&mut self, at: Position, text: &str) -> Result<Range, EditorError> {
        self.ensure_unlocked()?;
        self.store.insert(at, text)
    }

    pub fn delete(&mut self, range: Range) -> Result<(), EditorError> {
        self.ensure_unlocked()?;
        self.store.delete(range)?;
        self.sync_selection();
        Ok(())
    }

    /// Start a background analysis pass.
    pub fn detect_tokens(&mut self, ui: &UiHandle<Editor>) -> Result<(), EditorError> {
        self.coordinator.detect_tokens(ui)
    }

    /// Join a finished analysis worker. Call once per host tick.
    pub fn reap(&mut self) {
        let was_locked = self.coordinator.is_locked();
        self.coordinator.reap();
        if was_locked && !self.coordinator.is_locked() {
            if let Some(outcome) = self.coordinator.last_outcome() {
                self.status = describe_outcome(outcome).to_string();
            }
        }
    }

    pub fn is_locked(&self) -> bool {
        self.coordinator.is_locked()
    }

    pub fn analysis_state(&self) -> AnalysisState {
        self.coordinator.state()
    }

    pub fn last_outcome(&self) -> Option<&AnalysisOutcome> {
        self.coordinator.last_outcome()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn anchors(&self) -> Vec<(TagId, Range, &Anchor)> {
        self.store.anchors()
    }

    /// Hit-test a click.
    pub fn anchor_at(&self, at: Position) -> Option<(TagId, Range)> {
        self.store.anchor_at(at)
    }

    /// Activate anchor `tag` and return its candidates.
    pub fn activate(&mut self, tag: TagId) -> Result<&Candidates, EditorError> {
        self.selection.activate(
            &mut self.store,
            tag,
            &self.settings,
            self.dictionary.as_ref(),
        )
    }

    pub fn current_selection(&self) -> Option<(TagId, Range)> {
        self.selection.current_selection(&self.store)
    }

    pub fn candidates(&self) -> Option<&Candidates> {
        self.selection.candidates()
    }

    pub fn prompt(&self) -> CandidatePrompt {
        self.selection.prompt()
    }

    /// Substitute `replacement` into anchor `tag`. No-op unless `tag` is the
    /// live selection.
    pub fn apply(&mut self, tag: TagId, replacement: &str) -> Result<Option<Range>, EditorError> {
        self.ensure_unlocked()?;
        self.substitution.apply(&mut self.store, tag, replacement)
    }

    /// Apply candidate `index` of the current selection.
    pub fn pick(&mut self, index: usize) -> Result<Option<Range>, EditorError> {
        let Some(candidates) = self.selection.candidates() else {
            return Ok(None);
        };
        let tag = candidates.tag;
        let Some(replacement) = candidates.get(index).map(str::to_owned) else {
            return Ok(None);
        };
        self.apply(tag, &replacement)
    }
}

impl AnalysisHost for Editor {
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
        let added = reconcile_tokens(&mut self.store, tokens, &self.settings.translatable);
        self.sync_selection();
        added
    }

    fn set_status(&mut self, status: &str) {
        status.clone_into(&mut self.status);
    }
}
