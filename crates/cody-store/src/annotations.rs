//! Canonical annotation set of the current document.
//!
//! Manual work, rule-engine suggestions and model suggestions live in one
//! list. Each recommender's batch is authoritative only for its own confidence
//! band (see [`Recommender::owns`]), so merging one engine's batch never
//! touches the other engine's suggestions or the annotator's own spans.
//!
//! Every mutation is a single `&mut self` call: callers never observe a
//! half-merged list.

use std::collections::{HashMap, HashSet};
use std::fmt;

use cody_core::wire;
use cody_core::{Annotation, AnnotationDraft, Provenance, Recommender};
use serde_json::Value;
use tracing::{debug, info};

use crate::StoreError;

/// Transient message describing how a full reload changed the suggestion count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionNotice {
    /// The store had no suggestions before the reload.
    WelcomeBack(usize),
    Removed(usize),
    Created(usize),
}

impl SuggestionNotice {
    /// `None` when the count did not change.
    pub fn compute(old_suggested: usize, new_suggested: usize) -> Option<Self> {
        if old_suggested == 0 {
            return Some(Self::WelcomeBack(new_suggested));
        }
        match new_suggested.cmp(&old_suggested) {
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Less => Some(Self::Removed(old_suggested - new_suggested)),
            std::cmp::Ordering::Greater => Some(Self::Created(new_suggested - old_suggested)),
        }
    }
}

impl fmt::Display for SuggestionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WelcomeBack(n) => {
                write!(f, "Welcome back! [{n}] automated suggestion(s) so far!")
            }
            Self::Removed(n) => write!(f, "Removed [{n}] old suggestion(s)"),
            Self::Created(n) => write!(f, "Created [{n}] new suggestion(s)"),
        }
    }
}

/// What a [`AnnotationStore::merge_suggestions`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Records outside the source's band that were kept as they were.
    pub retained: usize,
    /// The source's previous suggestions that were dropped.
    pub replaced: usize,
    /// Incoming suggestions now in the store.
    pub added: usize,
    /// Incoming records outside the source's band.
    pub out_of_band: usize,
    /// Incoming suggestions whose id is already held by a retained record.
    pub collisions: usize,
    /// Rows that failed to parse.
    pub malformed: usize,
}

#[derive(Debug, Default)]
pub struct AnnotationStore {
    records: Vec<Annotation>,
    notice: Option<SuggestionNotice>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Reads ──

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.records.iter()
    }

    pub fn get(&self, annotation_id: &str) -> Option<&Annotation> {
        self.records.iter().find(|a| a.annotation_id == annotation_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count(&self, provenance: Provenance) -> usize {
        self.records
            .iter()
            .filter(|a| a.provenance() == provenance)
            .count()
    }

    pub fn suggested(&self) -> usize {
        self.records
            .iter()
            .filter(|a| a.provenance().is_suggested())
            .count()
    }

    /// Notice computed by the last [`replace_all`](Self::replace_all).
    pub fn notice(&self) -> Option<SuggestionNotice> {
        self.notice
    }

    /// Hand the notice to the caller and clear it.
    pub fn take_notice(&mut self) -> Option<SuggestionNotice> {
        self.notice.take()
    }

    // ── Batch ingestion ──

    /// Replace the whole store with a server batch (full document load).
    ///
    /// A response that is not a batch leaves the store untouched.
    pub fn replace_all(&mut self, batch: &Value) -> Result<usize, StoreError> {
        let parsed = wire::parse_annotations(batch)?;
        let old_suggested = self.suggested();
        let records = dedupe(parsed.records);
        let new_suggested = records.iter().filter(|a| a.is_recommendation).count();

        self.records = records;
        self.notice = SuggestionNotice::compute(old_suggested, new_suggested);
        info!(
            total = self.records.len(),
            old_suggested,
            new_suggested,
            skipped = parsed.skipped.len(),
            "replaced annotation store"
        );
        Ok(self.records.len())
    }

    /// Absorb one recommender's batch.
    ///
    /// Keeps every record outside `source`'s confidence band, drops the
    /// source's previous suggestions, and appends the batch's in-band
    /// suggestions in batch order. Applying the same batch twice leaves the
    /// store as applying it once.
    pub fn merge_suggestions(
        &mut self,
        source: Recommender,
        batch: &Value,
    ) -> Result<MergeOutcome, StoreError> {
        let parsed = wire::parse_annotations(batch)?;
        let mut outcome = MergeOutcome {
            malformed: parsed.skipped.len(),
            ..MergeOutcome::default()
        };

        let total_incoming = parsed.records.len();
        let incoming: Vec<Annotation> = parsed
            .records
            .into_iter()
            .filter(|a| a.is_recommendation && source.owns(a.confidence))
            .collect();
        outcome.out_of_band = total_incoming - incoming.len();

        let before = self.records.len();
        self.records.retain(|a| !source.owns(a.confidence));
        outcome.retained = self.records.len();
        outcome.replaced = before - outcome.retained;

        let taken: HashSet<String> = self
            .records
            .iter()
            .map(|a| a.annotation_id.clone())
            .collect();
        for suggestion in dedupe(incoming) {
            if taken.contains(&suggestion.annotation_id) {
                debug!(id = %suggestion.annotation_id, "suggestion collides with retained record");
                outcome.collisions += 1;
                continue;
            }
            self.records.push(suggestion);
            outcome.added += 1;
        }

        info!(
            source = source.as_str(),
            retained = outcome.retained,
            replaced = outcome.replaced,
            added = outcome.added,
            "merged suggestions"
        );
        Ok(outcome)
    }

    /// Drop every suggestion of one recommender. Returns how many went.
    pub fn remove_all_suggestions(&mut self, source: Recommender) -> usize {
        let before = self.records.len();
        self.records.retain(|a| !source.owns(a.confidence));
        let removed = before - self.records.len();
        info!(source = source.as_str(), removed, "removed suggestions");
        removed
    }

    // ── Single-record edits ──

    pub fn insert_manual(&mut self, draft: AnnotationDraft) -> Result<(), StoreError> {
        if self.get(&draft.annotation_id).is_some() {
            return Err(StoreError::DuplicateAnnotation(draft.annotation_id));
        }
        self.records.push(Annotation::from(draft));
        Ok(())
    }

    /// Relabel one record. Any suggestion collapses to manual work.
    pub fn update_label(&mut self, annotation_id: &str, label: &str) -> Result<(), StoreError> {
        let ann = self.get_mut(annotation_id)?;
        ann.label = label.to_string();
        ann.collapse_to_manual();
        Ok(())
    }

    pub fn delete(&mut self, annotation_id: &str) -> Result<Annotation, StoreError> {
        let index = self
            .records
            .iter()
            .position(|a| a.annotation_id == annotation_id)
            .ok_or_else(|| StoreError::UnknownAnnotation(annotation_id.to_string()))?;
        Ok(self.records.remove(index))
    }

    /// Accept a suggestion as-is: keep the label, drop the suggestion markers.
    pub fn demote_to_manual(&mut self, annotation_id: &str) -> Result<(), StoreError> {
        self.get_mut(annotation_id)?.collapse_to_manual();
        Ok(())
    }

    // ── Label-wide edits ──

    /// Rename a label on every record carrying it. Provenance is unchanged.
    pub fn relabel_all(&mut self, old: &str, new: &str) -> usize {
        let mut changed = 0;
        for ann in self.records.iter_mut().filter(|a| a.label == old) {
            ann.label = new.to_string();
            changed += 1;
        }
        changed
    }

    /// Drop every record carrying `label`.
    pub fn remove_label(&mut self, label: &str) -> usize {
        let before = self.records.len();
        self.records.retain(|a| a.label != label);
        before - self.records.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.notice = None;
    }

    fn get_mut(&mut self, annotation_id: &str) -> Result<&mut Annotation, StoreError> {
        self.records
            .iter_mut()
            .find(|a| a.annotation_id == annotation_id)
            .ok_or_else(|| StoreError::UnknownAnnotation(annotation_id.to_string()))
    }
}

/// Collapse duplicate ids: the first position wins, the last record's content.
fn dedupe(records: Vec<Annotation>) -> Vec<Annotation> {
    let mut out: Vec<Annotation> = Vec::with_capacity(records.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for record in records {
        match index.get(&record.annotation_id) {
            Some(&i) => out[i] = record,
            None => {
                index.insert(record.annotation_id.clone(), out.len());
                out.push(record);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ann(id: &str, label: &str, confidence: Option<f64>) -> Annotation {
        Annotation {
            conversation_ref: "c1".into(),
            attribute_ref: "a1".into(),
            annotation_id: id.into(),
            text_ref: "1".into(),
            span_start: 0,
            span_length: 4,
            label: label.into(),
            is_recommendation: confidence.is_some(),
            match_highlight: confidence.map(|_| json!("hit")),
            confidence,
        }
    }

    fn batch(records: &[Annotation]) -> Value {
        Value::Array(records.iter().map(wire::annotation_row).collect())
    }

    fn ids(store: &AnnotationStore) -> Vec<String> {
        store.iter().map(|a| a.annotation_id.clone()).collect()
    }

    fn loaded(records: &[Annotation]) -> AnnotationStore {
        let mut store = AnnotationStore::new();
        store.replace_all(&batch(records)).unwrap();
        store
    }

    #[test]
    fn welcome_back_on_first_load() {
        let mut store = AnnotationStore::new();
        store
            .replace_all(&batch(&[
                ann("1", "price", Some(1.0)),
                ann("2", "price", Some(0.4)),
                ann("3", "brand", Some(1.0)),
                ann("4", "brand", None),
            ]))
            .unwrap();
        assert_eq!(store.notice(), Some(SuggestionNotice::WelcomeBack(3)));
        assert_eq!(
            store.notice().unwrap().to_string(),
            "Welcome back! [3] automated suggestion(s) so far!"
        );
    }

    #[test]
    fn no_notice_when_suggestion_count_is_unchanged() {
        let three = [
            ann("1", "price", Some(1.0)),
            ann("2", "price", Some(0.4)),
            ann("3", "brand", Some(0.9)),
        ];
        let mut store = loaded(&three);
        store.replace_all(&batch(&three)).unwrap();
        assert_eq!(store.notice(), None);
    }

    #[test]
    fn notice_reports_removed_suggestions() {
        let mut store = loaded(&[
            ann("1", "price", Some(1.0)),
            ann("2", "price", Some(0.4)),
            ann("3", "brand", Some(0.9)),
        ]);
        store
            .replace_all(&batch(&[ann("1", "price", Some(1.0))]))
            .unwrap();
        assert_eq!(store.notice(), Some(SuggestionNotice::Removed(2)));
        assert_eq!(
            store.notice().unwrap().to_string(),
            "Removed [2] old suggestion(s)"
        );
    }

    #[test]
    fn notice_reports_created_suggestions() {
        let mut store = loaded(&[
            ann("1", "price", Some(1.0)),
            ann("2", "price", Some(0.4)),
            ann("3", "brand", Some(0.9)),
        ]);
        store
            .replace_all(&batch(&[
                ann("1", "price", Some(1.0)),
                ann("2", "price", Some(0.4)),
                ann("3", "brand", Some(0.9)),
                ann("4", "brand", Some(0.2)),
                ann("5", "brand", Some(1.0)),
            ]))
            .unwrap();
        assert_eq!(store.notice(), Some(SuggestionNotice::Created(2)));
        assert_eq!(store.take_notice().unwrap().to_string(), "Created [2] new suggestion(s)");
        assert_eq!(store.notice(), None);
    }

    #[test]
    fn invalid_batch_leaves_store_untouched() {
        let mut store = loaded(&[ann("1", "price", None)]);
        let err = store.replace_all(&json!("Error with fetching annotations")).unwrap_err();
        assert!(matches!(err, StoreError::Wire(_)));
        assert_eq!(ids(&store), vec!["1"]);
    }

    #[test]
    fn replace_all_collapses_duplicate_ids() {
        let store = loaded(&[
            ann("1", "price", None),
            ann("2", "brand", None),
            ann("1", "quality", None),
        ]);
        assert_eq!(ids(&store), vec!["1", "2"]);
        assert_eq!(store.get("1").unwrap().label, "quality");
    }

    #[test]
    fn rule_merge_keeps_manual_and_model_records() {
        let mut store = loaded(&[
            ann("m1", "price", None),
            ann("r1", "price", Some(1.0)),
            ann("ml1", "brand", Some(0.6)),
        ]);
        let outcome = store
            .merge_suggestions(
                Recommender::RuleEngine,
                &batch(&[
                    ann("r2", "price", Some(1.0)),
                    // model-band records in a rule batch are ignored
                    ann("ml9", "brand", Some(0.3)),
                ]),
            )
            .unwrap();

        assert_eq!(ids(&store), vec!["m1", "ml1", "r2"]);
        assert_eq!(outcome.retained, 2);
        assert_eq!(outcome.replaced, 1);
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.out_of_band, 1);
    }

    #[test]
    fn model_merge_keeps_manual_and_rule_records() {
        let mut store = loaded(&[
            ann("m1", "price", None),
            ann("r1", "price", Some(1.0)),
            ann("ml1", "brand", Some(0.6)),
        ]);
        store
            .merge_suggestions(
                Recommender::ModelEngine,
                &batch(&[ann("ml2", "brand", Some(0.8)), ann("ml3", "price", Some(0.1))]),
            )
            .unwrap();
        assert_eq!(ids(&store), vec!["m1", "r1", "ml2", "ml3"]);
    }

    #[test]
    fn model_merge_is_idempotent() {
        let mut store = loaded(&[ann("m1", "price", None), ann("r1", "price", Some(1.0))]);
        let suggestions = batch(&[ann("ml2", "brand", Some(0.8)), ann("ml3", "price", Some(0.1))]);

        store
            .merge_suggestions(Recommender::ModelEngine, &suggestions)
            .unwrap();
        let once: Vec<Annotation> = store.iter().cloned().collect();
        store
            .merge_suggestions(Recommender::ModelEngine, &suggestions)
            .unwrap();
        let twice: Vec<Annotation> = store.iter().cloned().collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn rule_and_model_merges_commute() {
        let start = [
            ann("m1", "price", None),
            ann("r0", "price", Some(1.0)),
            ann("ml0", "brand", Some(0.5)),
        ];
        let rules = batch(&[ann("r1", "price", Some(1.0)), ann("r2", "brand", Some(1.0))]);
        let model = batch(&[ann("ml1", "brand", Some(0.7))]);

        let mut a = loaded(&start);
        a.merge_suggestions(Recommender::RuleEngine, &rules).unwrap();
        a.merge_suggestions(Recommender::ModelEngine, &model).unwrap();

        let mut b = loaded(&start);
        b.merge_suggestions(Recommender::ModelEngine, &model).unwrap();
        b.merge_suggestions(Recommender::RuleEngine, &rules).unwrap();

        let mut ids_a = ids(&a);
        let mut ids_b = ids(&b);
        ids_a.sort();
        ids_b.sort();
        assert_eq!(ids_a, ids_b);

        // every rule record came from the rule batch, every model record from
        // the model batch, the manual record survived both
        for store in [&a, &b] {
            for rec in store.iter() {
                match rec.provenance() {
                    Provenance::RuleSuggested => {
                        assert!(["r1", "r2"].contains(&rec.annotation_id.as_str()))
                    }
                    Provenance::ModelSuggested => assert_eq!(rec.annotation_id, "ml1"),
                    Provenance::Manual => assert_eq!(rec.annotation_id, "m1"),
                }
            }
            assert_eq!(store.get("m1").unwrap(), &start[0]);
        }
    }

    #[test]
    fn suggestion_cannot_take_a_manual_id() {
        let mut store = loaded(&[ann("7", "price", None)]);
        let outcome = store
            .merge_suggestions(
                Recommender::ModelEngine,
                &batch(&[ann("7", "brand", Some(0.9))]),
            )
            .unwrap();
        assert_eq!(outcome.collisions, 1);
        assert_eq!(store.get("7").unwrap().label, "price");
        assert_eq!(store.get("7").unwrap().provenance(), Provenance::Manual);
    }

    #[test]
    fn merge_rejects_non_batch_without_touching_store() {
        let mut store = loaded(&[ann("r1", "price", Some(1.0))]);
        assert!(
            store
                .merge_suggestions(Recommender::RuleEngine, &json!({"message": "nope"}))
                .is_err()
        );
        assert_eq!(ids(&store), vec!["r1"]);
    }

    #[test]
    fn remove_model_suggestions_only() {
        let mut store = loaded(&[
            ann("m1", "price", None),
            ann("r1", "price", Some(1.0)),
            ann("ml1", "brand", Some(0.6)),
            ann("ml2", "brand", Some(0.2)),
        ]);
        assert_eq!(store.remove_all_suggestions(Recommender::ModelEngine), 2);
        assert_eq!(ids(&store), vec!["m1", "r1"]);
    }

    #[test]
    fn label_update_collapses_provenance() {
        let mut store = loaded(&[ann("ml1", "brand", Some(0.7))]);
        store.update_label("ml1", "price").unwrap();
        let rec = store.get("ml1").unwrap();
        assert_eq!(rec.label, "price");
        assert_eq!(rec.confidence, None);
        assert_eq!(rec.provenance(), Provenance::Manual);
        assert_eq!(rec.match_highlight, None);
        assert!(!rec.is_recommendation);
    }

    #[test]
    fn demote_keeps_label() {
        let mut store = loaded(&[ann("ml1", "brand", Some(0.7))]);
        store.demote_to_manual("ml1").unwrap();
        let rec = store.get("ml1").unwrap();
        assert_eq!(rec.label, "brand");
        assert_eq!(rec.provenance(), Provenance::Manual);
    }

    #[test]
    fn unknown_ids_are_errors() {
        let mut store = AnnotationStore::new();
        assert_eq!(
            store.update_label("x", "price"),
            Err(StoreError::UnknownAnnotation("x".into()))
        );
        assert!(store.delete("x").is_err());
        assert!(store.demote_to_manual("x").is_err());
    }

    #[test]
    fn manual_insert_and_delete() {
        let mut store = AnnotationStore::new();
        let draft = AnnotationDraft {
            conversation_ref: "c1".into(),
            attribute_ref: "a1".into(),
            annotation_id: "tmp-1".into(),
            text_ref: "3".into(),
            span_start: 2,
            span_length: 6,
            label: "price".into(),
        };
        store.insert_manual(draft.clone()).unwrap();
        assert_eq!(
            store.insert_manual(draft),
            Err(StoreError::DuplicateAnnotation("tmp-1".into()))
        );
        assert_eq!(store.count(Provenance::Manual), 1);
        let removed = store.delete("tmp-1").unwrap();
        assert_eq!(removed.label, "price");
        assert!(store.is_empty());
    }

    #[test]
    fn relabel_and_remove_by_label() {
        let mut store = loaded(&[
            ann("1", "price", None),
            ann("2", "price", Some(1.0)),
            ann("3", "brand", None),
        ]);
        assert_eq!(store.relabel_all("price", "cost"), 2);
        assert_eq!(store.get("2").unwrap().provenance(), Provenance::RuleSuggested);
        assert_eq!(store.remove_label("cost"), 2);
        assert_eq!(ids(&store), vec!["3"]);
    }
}
