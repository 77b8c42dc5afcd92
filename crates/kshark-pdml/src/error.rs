//! Error types for PDML document reading

use quick_xml::events::attributes::AttrError;
use thiserror::Error;

use crate::reader::{MAX_DOCUMENT_LEN, MAX_NESTING};

/// Errors that can occur while turning a PDML byte stream into packet documents
///
/// None of these are fatal to a capture session: the offending document is
/// consumed and the reader continues with the next one.
#[derive(Debug, Error)]
pub enum PdmlError {
    /// The XML inside a packet document is malformed
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An attribute could not be parsed
    #[error("malformed attribute: {0}")]
    Attribute(#[from] AttrError),

    /// The document does not start with a `<packet>` element
    #[error("unexpected element <{0}> outside of a packet")]
    UnexpectedElement(String),

    /// A closing tag does not match the innermost open element
    #[error("mismatched closing tag </{found}>, expected </{expected}>")]
    MismatchedEnd { expected: String, found: String },

    /// The document ended before `</packet>`
    #[error("incomplete packet document")]
    Incomplete,

    /// Elements follow the closing `</packet>` tag
    #[error("unexpected content after </packet>")]
    TrailingContent,

    /// A partial document grew past the size limit without closing
    #[error("packet document exceeds {MAX_DOCUMENT_LEN} bytes ({0} bytes buffered)")]
    DocumentTooLarge(usize),

    /// Elements nest deeper than the packet model allows
    #[error("elements nested deeper than {MAX_NESTING} levels")]
    TooDeep,
}
