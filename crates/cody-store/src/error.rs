use cody_core::WireError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("no annotation with id {0}")]
    UnknownAnnotation(String),

    #[error("annotation id {0} is already taken")]
    DuplicateAnnotation(String),

    #[error("no label named {0:?}")]
    UnknownLabel(String),

    #[error("label {0:?} already exists")]
    DuplicateLabel(String),

    #[error("malformed batch: {0}")]
    Wire(#[from] WireError),
}
