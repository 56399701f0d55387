//! Translation between the server's positional JSON rows and the named types
//! of this crate.
//!
//! The server answers every list endpoint with an array of arrays. This module
//! is the only place that indexes into those rows, so a change of wire shape
//! stays local to it. Malformed rows inside a batch are logged and skipped;
//! only a response that is not a batch at all is an error.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::warn;

use crate::{
    Annotation, AnnotationDraft, CodeRule, Document, DocumentContent, InputType, Label,
    NewDocument, Section,
};

/// conversation, attribute, annotationID, id, start, length, label,
/// isRecommendation, matchHighlight, confidence
pub const ANNOTATION_FIELDS: usize = 10;
/// text, color, and an optional code rule
pub const LABEL_FIELDS: usize = 2;
/// id, name, owner, lastChanged, inputType, unitOfAnalysis
pub const DOCUMENT_FIELDS: usize = 6;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum WireError {
    #[error("expected an array of records, got {0}")]
    NotABatch(&'static str),

    #[error("record {index}: expected an array, got {found}")]
    NotARecord { index: usize, found: &'static str },

    #[error("record {index}: expected at least {expected} fields, got {actual}")]
    Arity {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("record {index}: field `{field}` has unexpected value {value}")]
    Field {
        index: usize,
        field: &'static str,
        value: String,
    },

    #[error("record {index}: confidence {value} outside [0, 1]")]
    Confidence { index: usize, value: f64 },

    #[error("unexpected {what} payload: {found}")]
    Shape { what: &'static str, found: String },
}

/// Outcome of parsing one batch: the usable records plus what was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub skipped: Vec<WireError>,
}

/// A codebook row: the label and, when the server sent one, its rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRow {
    pub label: Label,
    pub rule: Option<String>,
}

// ── Batches ──

pub fn parse_annotations(value: &Value) -> Result<Parsed<Annotation>, WireError> {
    parse_rows(value, "annotations", parse_annotation_row)
}

pub fn parse_labels(value: &Value) -> Result<Parsed<LabelRow>, WireError> {
    parse_rows(value, "labels", parse_label_row)
}

pub fn parse_documents(value: &Value) -> Result<Parsed<Document>, WireError> {
    parse_rows(value, "documents", parse_document_row)
}

fn parse_rows<T>(
    value: &Value,
    what: &'static str,
    parse: impl Fn(usize, &Value) -> Result<T, WireError>,
) -> Result<Parsed<T>, WireError> {
    let rows = value
        .as_array()
        .ok_or_else(|| WireError::NotABatch(kind(value)))?;

    let mut parsed = Parsed {
        records: Vec::with_capacity(rows.len()),
        skipped: Vec::new(),
    };
    for (index, row) in rows.iter().enumerate() {
        match parse(index, row) {
            Ok(record) => parsed.records.push(record),
            Err(err) => {
                warn!(batch = what, %err, "skipping malformed record");
                parsed.skipped.push(err);
            }
        }
    }
    Ok(parsed)
}

// ── Rows ──

pub fn parse_annotation_row(index: usize, value: &Value) -> Result<Annotation, WireError> {
    let f = fields(index, value, ANNOTATION_FIELDS)?;
    Ok(Annotation {
        conversation_ref: text(index, "conversation", &f[0])?,
        attribute_ref: text(index, "attribute", &f[1])?,
        annotation_id: text(index, "annotationID", &f[2])?,
        text_ref: text(index, "id", &f[3])?,
        span_start: offset(index, "start", &f[4])?,
        span_length: offset(index, "length", &f[5])?,
        label: text(index, "label", &f[6])?,
        is_recommendation: flag(index, "isRecommendation", &f[7])?,
        match_highlight: match &f[8] {
            Value::Null => None,
            other => Some(other.clone()),
        },
        confidence: confidence(index, &f[9])?,
    })
}

fn parse_label_row(index: usize, value: &Value) -> Result<LabelRow, WireError> {
    let f = fields(index, value, LABEL_FIELDS)?;
    let rule = match f.get(2) {
        None | Some(Value::Null) => None,
        Some(v) => Some(text(index, "codeRule", v)?),
    };
    Ok(LabelRow {
        label: Label {
            text: text(index, "text", &f[0])?,
            color: text(index, "color", &f[1])?,
        },
        rule,
    })
}

fn parse_document_row(index: usize, value: &Value) -> Result<Document, WireError> {
    let f = fields(index, value, DOCUMENT_FIELDS)?;
    let id = integer(index, "id", &f[0])?;
    let owner = integer(index, "owner", &f[2])?;
    let last_modified = match &f[3] {
        Value::Null => None,
        v => Some(timestamp(index, v)?),
    };
    let input_type = InputType::from_code(integer(index, "inputType", &f[4])?);
    let unit_of_analysis = match &f[5] {
        Value::Null => None,
        v => Some(text(index, "unitOfAnalysis", v)?),
    };
    Ok(Document {
        id,
        name: text(index, "name", &f[1])?,
        owner,
        last_modified,
        input_type,
        unit_of_analysis,
    })
}

/// Parse `{conversation: {attribute: text}}`, keeping server order.
pub fn parse_document_content(value: &Value) -> Result<DocumentContent, WireError> {
    let conversations = value.as_object().ok_or_else(|| WireError::Shape {
        what: "document content",
        found: kind(value).to_string(),
    })?;

    let mut content = DocumentContent::default();
    for (conversation, attributes) in conversations {
        let attributes = attributes.as_object().ok_or_else(|| WireError::Shape {
            what: "conversation",
            found: format!("{conversation}: {}", kind(attributes)),
        })?;
        for (attribute, body) in attributes {
            let text = match body {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => {
                    return Err(WireError::Shape {
                        what: "attribute text",
                        found: format!("{conversation}/{attribute}: {}", kind(other)),
                    });
                }
            };
            content.sections.push(Section {
                conversation: conversation.clone(),
                attribute: attribute.clone(),
                text,
            });
        }
    }
    Ok(content)
}

/// Parse the code-rule answer `[[rule], generated]`.
///
/// `null` (the reserved default label) and a missing rule body yield `None`.
pub fn parse_code_rule(label: &str, value: &Value) -> Result<Option<CodeRule>, WireError> {
    let shape = || WireError::Shape {
        what: "code rule",
        found: value.to_string(),
    };
    let parts = match value {
        Value::Null => return Ok(None),
        Value::Array(parts) if parts.len() >= 2 => parts,
        _ => return Err(shape()),
    };

    let body = match &parts[0] {
        Value::Array(tuple) => tuple.first().cloned().unwrap_or(Value::Null),
        other => other.clone(),
    };
    let body = match body {
        Value::Null => return Ok(None),
        Value::String(s) => s,
        _ => return Err(shape()),
    };
    let generated = flag(1, "generated", &parts[1])?;

    Ok(Some(CodeRule {
        label: label.to_string(),
        body,
        generated,
    }))
}

// ── Outgoing bodies ──

pub fn annotation_body(draft: &AnnotationDraft) -> Value {
    json!({
        "conversation": draft.conversation_ref,
        "attribute": draft.attribute_ref,
        "annotationID": draft.annotation_id,
        "id": draft.text_ref,
        "start": draft.span_start,
        "length": draft.span_length,
        "label": draft.label,
    })
}

pub fn label_body(label: &Label) -> Value {
    json!({ "text": label.text, "color": label.color })
}

pub fn labels_body(labels: &[Label]) -> Value {
    Value::Array(labels.iter().map(label_body).collect())
}

pub fn new_document_body(doc: &NewDocument) -> Value {
    json!({
        "name": doc.name,
        "settings": {
            "type": doc.input_type.code(),
            "uoa": doc.unit_of_analysis,
        },
        "content": doc.content,
    })
}

// ── Row builders (the inverse of the parsers, used by test doubles and caches) ──

pub fn annotation_row(ann: &Annotation) -> Value {
    json!([
        ann.conversation_ref,
        ann.attribute_ref,
        ann.annotation_id,
        ann.text_ref,
        ann.span_start,
        ann.span_length,
        ann.label,
        u8::from(ann.is_recommendation),
        ann.match_highlight,
        ann.confidence,
    ])
}

pub fn label_row(label: &Label, rule: Option<&str>) -> Value {
    json!([label.text, label.color, rule])
}

pub fn document_row(doc: &Document) -> Value {
    json!([
        doc.id,
        doc.name,
        doc.owner,
        doc.last_modified.map(|t| t.timestamp() as f64),
        doc.input_type.code(),
        doc.unit_of_analysis,
    ])
}

// ── Field helpers ──

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn fields(index: usize, value: &Value, expected: usize) -> Result<&[Value], WireError> {
    let row = value.as_array().ok_or(WireError::NotARecord {
        index,
        found: kind(value),
    })?;
    if row.len() < expected {
        return Err(WireError::Arity {
            index,
            expected,
            actual: row.len(),
        });
    }
    Ok(row.as_slice())
}

fn invalid(index: usize, field: &'static str, value: &Value) -> WireError {
    WireError::Field {
        index,
        field,
        value: value.to_string(),
    }
}

/// Identifiers arrive as strings or numbers depending on the column.
fn text(index: usize, field: &'static str, value: &Value) -> Result<String, WireError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(invalid(index, field, other)),
    }
}

fn integer(index: usize, field: &'static str, value: &Value) -> Result<i64, WireError> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| invalid(index, field, value))
}

fn offset(index: usize, field: &'static str, value: &Value) -> Result<u64, WireError> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| invalid(index, field, value))
}

fn flag(index: usize, field: &'static str, value: &Value) -> Result<bool, WireError> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => Some(false),
            Some(f) if f == 1.0 => Some(true),
            _ => None,
        },
        _ => None,
    }
    .ok_or_else(|| invalid(index, field, value))
}

fn confidence(index: usize, value: &Value) -> Result<Option<f64>, WireError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            let c = n.as_f64().ok_or_else(|| invalid(index, "confidence", value))?;
            if (0.0..=1.0).contains(&c) {
                Ok(Some(c))
            } else {
                Err(WireError::Confidence { index, value: c })
            }
        }
        other => Err(invalid(index, "confidence", other)),
    }
}

fn timestamp(index: usize, value: &Value) -> Result<DateTime<Utc>, WireError> {
    let secs = value
        .as_f64()
        .ok_or_else(|| invalid(index, "lastChanged", value))?;
    let whole = secs.trunc() as i64;
    let nanos = (secs.fract() * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    DateTime::from_timestamp(whole, nanos).ok_or_else(|| invalid(index, "lastChanged", value))
}
