//! Client-side state for the document being annotated: the merged annotation
//! set, the codebook, and the document catalog. Synchronous and I/O free; the
//! session layer owns the single instance and serialises access to it.

mod error;
pub use error::StoreError;

pub mod annotations;
pub mod documents;
pub mod labels;

pub use annotations::{AnnotationStore, MergeOutcome, SuggestionNotice};
pub use documents::DocumentCatalog;
pub use labels::{LabelCatalog, placeholder_labels};
