//! Core types shared across Cody: annotations and their provenance, the
//! codebook, documents, and the single translation point for server rows.

pub mod annotation;
pub mod document;
pub mod label;
pub mod wire;

pub use annotation::{Annotation, AnnotationDraft, Provenance, Recommender};
pub use document::{Document, DocumentContent, DocumentId, InputType, NewDocument, Section};
pub use label::{CodeRule, DEFAULT_LABEL, Label};
pub use wire::WireError;
