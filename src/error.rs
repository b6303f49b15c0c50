//! Error types for metadata loading and compilation
//!
//! Only document acquisition and raw XML parsing are fatal. Everything below
//! that layer (unknown scalar types, dangling navigation targets, unresolved
//! operation bindings) degrades by omission inside the compiler and never
//! surfaces as an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    /// Reading a local metadata document failed.
    #[error("failed to read metadata document: {0}")]
    Io(#[from] std::io::Error),

    /// Fetching the metadata document from the service failed.
    #[error("failed to fetch metadata document: {0}")]
    Http(#[from] reqwest::Error),

    /// The metadata endpoint answered with a non-success status code.
    #[error("metadata endpoint returned HTTP {0}")]
    Status(reqwest::StatusCode),

    /// The document bytes were not valid UTF-8.
    #[error("metadata document is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// The document bytes were not well-formed XML.
    #[error("failed to parse metadata document: {0}")]
    Parse(#[from] roxmltree::Error),
}

impl MetadataError {
    /// True for failures acquiring the document (I/O, network, HTTP status),
    /// as opposed to failures understanding its bytes.
    pub fn is_retrieval(&self) -> bool {
        matches!(
            self,
            MetadataError::Io(_) | MetadataError::Http(_) | MetadataError::Status(_)
        )
    }
}
