//! Everything a session holds about the document being annotated.

use cody_core::{CodeRule, Document, DocumentContent, DocumentId, Recommender};
use cody_store::{AnnotationStore, DocumentCatalog, LabelCatalog, SuggestionNotice};

use crate::EditTrigger;

/// Identifies one selection of a document. Every in-flight fetch carries the
/// ticket it was issued under and commits only while it is still current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub document: DocumentId,
    pub epoch: u64,
}

/// Outcome of the most recent remote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Saved,
    Failed,
}

/// Point-in-time copy of the session flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionFlags {
    /// A document switch or a post-write barrier refresh is running.
    pub busy: bool,
    pub rule_engine_busy: bool,
    pub model_engine_busy: bool,
    /// Set by any failed remote call, cleared only on acknowledgement.
    pub connectivity_degraded: bool,
    pub edit_counter: u32,
    pub last_write: Option<WriteOutcome>,
}

#[derive(Debug, Default)]
pub struct Workspace {
    pub(crate) annotations: AnnotationStore,
    pub(crate) labels: LabelCatalog,
    pub(crate) documents: DocumentCatalog,
    pub(crate) content: DocumentContent,
    pub(crate) code_rule: Option<CodeRule>,
    pub(crate) target: Option<DocumentId>,
    pub(crate) epoch: u64,
    /// Epoch of the switch in progress.
    pub(crate) switching: Option<u64>,
    pub(crate) refreshing: bool,
    /// Requests issued per engine and not yet ingested, queued ones included.
    pub(crate) rule_engine_pending: u32,
    pub(crate) model_engine_pending: u32,
    pub(crate) degraded: bool,
    pub(crate) last_write: Option<WriteOutcome>,
    pub(crate) edits: EditTrigger,
}

impl Workspace {
    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    pub fn labels(&self) -> &LabelCatalog {
        &self.labels
    }

    pub fn documents(&self) -> &DocumentCatalog {
        &self.documents
    }

    pub fn content(&self) -> &DocumentContent {
        &self.content
    }

    /// The last code rule fetched for the current document.
    pub fn code_rule(&self) -> Option<&CodeRule> {
        self.code_rule.as_ref()
    }

    pub fn target(&self) -> Option<DocumentId> {
        self.target
    }

    /// Catalog entry of the selected document, once the catalog knows it.
    pub fn current_document(&self) -> Option<&Document> {
        self.target.and_then(|id| self.documents.get(id))
    }

    pub fn notice(&self) -> Option<SuggestionNotice> {
        self.annotations.notice()
    }

    pub fn flags(&self) -> SessionFlags {
        SessionFlags {
            busy: self.switching.is_some() || self.refreshing,
            rule_engine_busy: self.rule_engine_pending > 0,
            model_engine_busy: self.model_engine_pending > 0,
            connectivity_degraded: self.degraded,
            edit_counter: self.edits.count(),
            last_write: self.last_write,
        }
    }

    pub(crate) fn ticket(&self) -> Option<Ticket> {
        self.target.map(|document| Ticket {
            document,
            epoch: self.epoch,
        })
    }

    pub(crate) fn is_current(&self, ticket: Ticket) -> bool {
        self.ticket() == Some(ticket)
    }

    /// Point the session at `document` and enter the switching state.
    /// Annotations and labels stay until the new batches arrive.
    pub(crate) fn begin_switch(&mut self, document: DocumentId) -> Ticket {
        self.epoch += 1;
        self.target = Some(document);
        self.switching = Some(self.epoch);
        self.refreshing = false;
        self.code_rule = None;
        Ticket {
            document,
            epoch: self.epoch,
        }
    }

    /// Leave the switching state unless a newer switch has taken over.
    pub(crate) fn finish_switch(&mut self, ticket: Ticket) {
        if self.switching == Some(ticket.epoch) {
            self.switching = None;
        }
    }

    /// Drop the selected document, for instance after it was deleted.
    pub(crate) fn close(&mut self) {
        self.epoch += 1;
        self.target = None;
        self.switching = None;
        self.refreshing = false;
        self.code_rule = None;
        self.content = DocumentContent::default();
        self.annotations.clear();
        self.labels.reset();
    }

    pub(crate) fn engine_started(&mut self, source: Recommender) {
        *self.pending_mut(source) += 1;
    }

    pub(crate) fn engine_finished(&mut self, source: Recommender) {
        let pending = self.pending_mut(source);
        *pending = pending.saturating_sub(1);
    }

    fn pending_mut(&mut self, source: Recommender) -> &mut u32 {
        match source {
            Recommender::RuleEngine => &mut self.rule_engine_pending,
            Recommender::ModelEngine => &mut self.model_engine_pending,
        }
    }
}
