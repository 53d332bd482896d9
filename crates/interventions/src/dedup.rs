//! Stable identity of "this kind of issue on this document".

use std::fmt;

/// `"{document_type}:{document_id}:{issue_type}"`.
///
/// Derived only from immutable subject fields; never from title or
/// description.
pub fn dedup_key(document_type: &str, document_id: i64, issue_type: &str) -> String {
    format!("{document_type}:{document_id}:{issue_type}")
}

/// A dedup key split back into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    pub document_type: String,
    pub document_id: i64,
    pub issue_type: String,
}

impl DedupKey {
    pub fn new(
        document_type: impl Into<String>,
        document_id: i64,
        issue_type: impl Into<String>,
    ) -> Self {
        DedupKey {
            document_type: document_type.into(),
            document_id,
            issue_type: issue_type.into(),
        }
    }

    /// Parse a key produced by [`dedup_key`].
    ///
    /// Splits on the first two `:`, so issue types may contain `:` but
    /// document types may not.
    pub fn parse(key: &str) -> Option<Self> {
        let (document_type, rest) = key.split_once(':')?;
        let (id, issue_type) = rest.split_once(':')?;
        if document_type.is_empty() || issue_type.is_empty() {
            return None;
        }
        Some(DedupKey {
            document_type: document_type.to_string(),
            document_id: id.parse().ok()?,
            issue_type: issue_type.to_string(),
        })
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&dedup_key(
            &self.document_type,
            self.document_id,
            &self.issue_type,
        ))
    }
}
