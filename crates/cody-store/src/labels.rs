//! Ordered codebook of the current document, plus the code rules the rule
//! engine evaluates for each label.

use std::collections::HashMap;

use cody_core::wire;
use cody_core::{CodeRule, Label};
use serde_json::Value;
use tracing::info;

use crate::StoreError;

/// Labels shown before any document is selected.
pub fn placeholder_labels() -> Vec<Label> {
    vec![
        Label::new("No document selected", "#FFAB91"),
        Label::new("Please select or upload a document", "#80CBC4"),
    ]
}

/// Label order is user significant (drag-reorder) and is only changed by
/// [`replace`](Self::replace) and [`reorder`](Self::reorder).
#[derive(Debug)]
pub struct LabelCatalog {
    labels: Vec<Label>,
    rules: HashMap<String, String>,
}

impl Default for LabelCatalog {
    fn default() -> Self {
        Self {
            labels: placeholder_labels(),
            rules: HashMap::new(),
        }
    }
}

impl LabelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }

    pub fn get(&self, text: &str) -> Option<&Label> {
        self.labels.iter().find(|l| l.text == text)
    }

    pub fn contains(&self, text: &str) -> bool {
        self.get(text).is_some()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn rule(&self, text: &str) -> Option<&str> {
        self.rules.get(text).map(String::as_str)
    }

    /// Replace the whole catalog with a server batch.
    ///
    /// Rules sent alongside the labels replace the known rules; a label whose
    /// row carries no rule keeps the rule fetched earlier.
    pub fn replace(&mut self, batch: &Value) -> Result<usize, StoreError> {
        let parsed = wire::parse_labels(batch)?;
        let mut labels = Vec::with_capacity(parsed.records.len());
        let mut rules = HashMap::new();
        for row in parsed.records {
            if labels.iter().any(|l: &Label| l.text == row.label.text) {
                continue;
            }
            let rule = row.rule.or_else(|| self.rules.remove(&row.label.text));
            if let Some(rule) = rule {
                rules.insert(row.label.text.clone(), rule);
            }
            labels.push(row.label);
        }
        self.labels = labels;
        self.rules = rules;
        info!(count = self.labels.len(), "replaced label catalog");
        Ok(self.labels.len())
    }

    /// Append labels not yet in the catalog. Returns how many were added.
    pub fn push(&mut self, labels: &[Label]) -> usize {
        let mut added = 0;
        for label in labels {
            if !self.contains(&label.text) {
                self.labels.push(label.clone());
                added += 1;
            }
        }
        added
    }

    /// Adopt a user-supplied order. The new list replaces the old one.
    pub fn reorder(&mut self, labels: &[Label]) -> Result<(), StoreError> {
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].iter().any(|l| l.text == label.text) {
                return Err(StoreError::DuplicateLabel(label.text.clone()));
            }
        }
        self.rules.retain(|text, _| labels.iter().any(|l| &l.text == text));
        self.labels = labels.to_vec();
        Ok(())
    }

    /// Rename a label in place. Renaming onto an existing label merges the two:
    /// the old entry disappears and the existing one keeps its position.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), StoreError> {
        let index = self
            .labels
            .iter()
            .position(|l| l.text == old)
            .ok_or_else(|| StoreError::UnknownLabel(old.to_string()))?;
        if old == new {
            return Ok(());
        }

        let rule = self.rules.remove(old);
        if self.contains(new) {
            self.labels.remove(index);
        } else {
            self.labels[index].text = new.to_string();
        }
        if let Some(rule) = rule {
            self.rules.entry(new.to_string()).or_insert(rule);
        }
        Ok(())
    }

    pub fn remove(&mut self, text: &str) -> Result<Label, StoreError> {
        let index = self
            .labels
            .iter()
            .position(|l| l.text == text)
            .ok_or_else(|| StoreError::UnknownLabel(text.to_string()))?;
        self.rules.remove(text);
        Ok(self.labels.remove(index))
    }

    pub fn set_rule(&mut self, rule: &CodeRule) {
        self.rules.insert(rule.label.clone(), rule.body.clone());
    }

    /// Back to the placeholder labels shown without a document.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
