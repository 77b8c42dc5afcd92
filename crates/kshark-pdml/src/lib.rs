//! PDML Packet Document Library
//!
//! This crate turns the PDML (Packet Details Markup Language) stream written
//! by `tshark -T pdml` into discrete packet documents:
//!
//! - [`PdmlReader`]: a streaming reader that cuts the byte stream at packet
//!   boundaries and handles partial data
//! - [`Packet`] / [`FieldNode`]: the field tree of one packet, one node per
//!   `<proto>` or `<field>` element, attributes kept in document order
//!
//! Interpreting the tree (which protocol matters, how fields flatten) is left
//! to the consumer.
//!
//! # Example
//!
//! ```rust
//! use kshark_pdml::PdmlReader;
//!
//! let mut reader = PdmlReader::new();
//! reader.push_bytes(b"<pdml><packet><proto name=\"geninfo\">");
//! assert!(reader.next_packet().is_none());
//!
//! reader.push_bytes(b"<field name=\"num\" show=\"1\"/></proto></packet>");
//! let packet = reader.next_packet().unwrap().unwrap();
//! assert_eq!(packet.proto("geninfo").unwrap().fields.len(), 1);
//! ```

pub mod error;
pub mod node;
pub mod reader;

pub use error::PdmlError;
pub use node::{Attributes, FieldNode, Packet, HIDDEN};
pub use reader::{parse_packet, PdmlReader, MAX_DOCUMENT_LEN, MAX_NESTING};
