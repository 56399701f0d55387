//! Codebook entries ("codes") and their rule bodies.

/// Label reserved by the server for unclassified spans. It has no code rule
/// and never triggers model retraining.
pub const DEFAULT_LABEL: &str = "default";

/// One entry of a document's codebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub text: String,
    /// CSS-style colour, e.g. `#FFAB91`.
    pub color: String,
}

impl Label {
    pub fn new(text: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: color.into(),
        }
    }
}

/// The rule body the rule engine evaluates for one label.
///
/// Opaque to the client; the server normalises query keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRule {
    pub label: String,
    pub body: String,
    /// The server generated this rule because the label had none.
    pub generated: bool,
}
