//! Annotation records and the confidence bands that classify them.
//!
//! The server never sends an explicit provenance field. Provenance is derived
//! from `confidence`: `None` is manual work, exactly `1.0` comes from the rule
//! engine, anything below `1.0` from the model.

use serde_json::Value;

/// Origin classification of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    Manual,
    RuleSuggested,
    ModelSuggested,
}

impl Provenance {
    /// Classify a confidence value into its band.
    pub fn from_confidence(confidence: Option<f64>) -> Self {
        match confidence {
            None => Self::Manual,
            Some(c) if c >= 1.0 => Self::RuleSuggested,
            Some(_) => Self::ModelSuggested,
        }
    }

    pub fn is_suggested(&self) -> bool {
        !matches!(self, Self::Manual)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::RuleSuggested => "rule",
            Self::ModelSuggested => "model",
        }
    }
}

/// The two recommendation engines that feed suggestion batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recommender {
    /// Deterministic code-rule engine ("CR"), confidence exactly 1.
    RuleEngine,
    /// Probabilistic model ("ML"), confidence below 1.
    ModelEngine,
}

impl Recommender {
    /// Whether `confidence` falls inside the band this recommender is
    /// authoritative for. Manual records (`None`) belong to neither.
    pub fn owns(&self, confidence: Option<f64>) -> bool {
        match (self, confidence) {
            (_, None) => false,
            (Self::RuleEngine, Some(c)) => c == 1.0,
            (Self::ModelEngine, Some(c)) => c < 1.0,
        }
    }

    pub fn provenance(&self) -> Provenance {
        match self {
            Self::RuleEngine => Provenance::RuleSuggested,
            Self::ModelEngine => Provenance::ModelSuggested,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleEngine => "rule-engine",
            Self::ModelEngine => "model-engine",
        }
    }
}

/// A labelled span inside a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub conversation_ref: String,
    pub attribute_ref: String,
    /// Unique within the document. Provisional on client-side creation.
    pub annotation_id: String,
    /// The section text the span points into (the wire `id` field).
    pub text_ref: String,
    pub span_start: u64,
    pub span_length: u64,
    pub label: String,
    pub is_recommendation: bool,
    /// Marker data carried by suggestions only.
    pub match_highlight: Option<Value>,
    pub confidence: Option<f64>,
}

impl Annotation {
    pub fn provenance(&self) -> Provenance {
        Provenance::from_confidence(self.confidence)
    }

    /// Drop every suggestion marker. Provenance becomes [`Provenance::Manual`].
    pub fn collapse_to_manual(&mut self) {
        self.is_recommendation = false;
        self.confidence = None;
        self.match_highlight = None;
    }
}

/// A span the annotator has just drawn, before the server has seen it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationDraft {
    pub conversation_ref: String,
    pub attribute_ref: String,
    pub annotation_id: String,
    pub text_ref: String,
    pub span_start: u64,
    pub span_length: u64,
    pub label: String,
}

impl From<AnnotationDraft> for Annotation {
    fn from(draft: AnnotationDraft) -> Self {
        Self {
            conversation_ref: draft.conversation_ref,
            attribute_ref: draft.attribute_ref,
            annotation_id: draft.annotation_id,
            text_ref: draft.text_ref,
            span_start: draft.span_start,
            span_length: draft.span_length,
            label: draft.label,
            is_recommendation: false,
            match_highlight: None,
            confidence: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_bands() {
        assert_eq!(Provenance::from_confidence(None), Provenance::Manual);
        assert_eq!(
            Provenance::from_confidence(Some(1.0)),
            Provenance::RuleSuggested
        );
        assert_eq!(
            Provenance::from_confidence(Some(0.7)),
            Provenance::ModelSuggested
        );
    }

    #[test]
    fn recommender_bands_are_disjoint() {
        for c in [None, Some(0.0), Some(0.3), Some(0.999), Some(1.0)] {
            let rule = Recommender::RuleEngine.owns(c);
            let model = Recommender::ModelEngine.owns(c);
            assert!(!(rule && model), "{c:?} claimed by both engines");
        }
        assert!(!Recommender::RuleEngine.owns(None));
        assert!(!Recommender::ModelEngine.owns(None));
    }

    #[test]
    fn collapse_clears_markers() {
        let mut ann = Annotation {
            conversation_ref: "c1".into(),
            attribute_ref: "a1".into(),
            annotation_id: "17".into(),
            text_ref: "4".into(),
            span_start: 3,
            span_length: 9,
            label: "price".into(),
            is_recommendation: true,
            match_highlight: Some(Value::String("cheap".into())),
            confidence: Some(0.7),
        };
        ann.collapse_to_manual();
        assert_eq!(ann.provenance(), Provenance::Manual);
        assert!(!ann.is_recommendation);
        assert!(ann.match_highlight.is_none());
        assert!(ann.confidence.is_none());
    }

    #[test]
    fn draft_becomes_manual_annotation() {
        let draft = AnnotationDraft {
            conversation_ref: "c1".into(),
            attribute_ref: "a1".into(),
            annotation_id: "tmp-1".into(),
            text_ref: "2".into(),
            span_start: 0,
            span_length: 5,
            label: "quality".into(),
        };
        let ann = Annotation::from(draft);
        assert_eq!(ann.provenance(), Provenance::Manual);
        assert_eq!(ann.annotation_id, "tmp-1");
    }
}
