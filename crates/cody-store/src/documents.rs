//! The documents the signed-in user can open.

use cody_core::wire;
use cody_core::{Document, DocumentId};
use serde_json::Value;
use tracing::info;

use crate::StoreError;

#[derive(Debug, Default)]
pub struct DocumentCatalog {
    documents: Vec<Document>,
}

impl DocumentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the catalog with a server batch. Rows with an id already seen
    /// are dropped.
    pub fn replace(&mut self, batch: &Value) -> Result<usize, StoreError> {
        let parsed = wire::parse_documents(batch)?;
        let mut documents: Vec<Document> = Vec::with_capacity(parsed.records.len());
        for doc in parsed.records {
            if !documents.iter().any(|d| d.id == doc.id) {
                documents.push(doc);
            }
        }
        self.documents = documents;
        info!(count = self.documents.len(), "replaced document catalog");
        Ok(self.documents.len())
    }

    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
