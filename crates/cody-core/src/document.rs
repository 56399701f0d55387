//! Documents available to the annotator and their rendered content.

use chrono::{DateTime, Utc};
use serde_json::Value;

pub type DocumentId = i64;

/// How a document was uploaded. Determines how the server split it into
/// conversations and attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    /// Plain text, one section per sentence.
    Text,
    /// `;`-separated rows of conversation, attribute, section.
    Csv,
    /// LadderBot interview export.
    LadderBot,
    Unknown(i64),
}

impl InputType {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Text,
            1 => Self::Csv,
            2 => Self::LadderBot,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Text => 0,
            Self::Csv => 1,
            Self::LadderBot => 2,
            Self::Unknown(code) => *code,
        }
    }
}

/// Catalog entry for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub owner: i64,
    pub last_modified: Option<DateTime<Utc>>,
    pub input_type: InputType,
    pub unit_of_analysis: Option<String>,
}

/// The text of one attribute inside one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub conversation: String,
    pub attribute: String,
    pub text: String,
}

/// Rendered document content, in server order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentContent {
    pub sections: Vec<Section>,
}

impl DocumentContent {
    /// Sections belonging to one conversation.
    pub fn conversation<'a>(&'a self, conversation: &'a str) -> impl Iterator<Item = &'a Section> {
        self.sections
            .iter()
            .filter(move |s| s.conversation == conversation)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// A document to upload.
///
/// `content` is passed through untouched: a string for text and CSV input,
/// the interview JSON for LadderBot exports.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub name: String,
    pub input_type: InputType,
    pub unit_of_analysis: String,
    pub content: Value,
}
