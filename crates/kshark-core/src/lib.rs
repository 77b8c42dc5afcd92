//! Request/Response Correlation Engine
//!
//! This crate turns tshark packet documents into a log of request/response
//! pairs for one protocol of interest (Kafka by default).
//!
//! # Architecture
//!
//! Each packet document flows through three stages:
//!
//! - **Selection** ([`ProtocolSelector`]): find the frame metadata and the
//!   protocol layer; packets without the protocol are dropped
//! - **Normalization** ([`Normalizer`]): flatten the layer's field tree into a
//!   [`Record`] keyed by field meaning
//! - **Correlation** ([`Correlator`]): append requests, attach responses to the
//!   request they reference, record unmatched responses as orphans
//!
//! The correlator owns the [`OrderedLog`] and reports every mutation as a
//! [`LogEvent`] through an injected [`EventSink`], so a terminal viewer, a
//! line printer and a test can all observe the same engine.
//!
//! Ingestion is single-threaded: one document is fully processed before the
//! next, and viewers read the log between documents.
//!
//! # Example
//!
//! ```rust
//! use kshark_core::{Correlator, Ingested, PacketView, Record};
//!
//! let mut corr: Correlator = Correlator::default();
//!
//! let request = PacketView::new(5, "10:00:00", Record::new()).with_request_key("3");
//! let response = PacketView::new(7, "10:00:01", Record::new()).with_request_frame(5);
//!
//! assert_eq!(corr.ingest(request), Ingested::Request { index: 0 });
//! assert_eq!(corr.ingest(response), Ingested::Matched { index: 0 });
//! assert_eq!(corr.pending_len(), 0);
//! ```

pub mod correlator;
pub mod error;
pub mod events;
pub mod log;
pub mod normalize;
pub mod record;
pub mod selector;
pub mod session;
pub mod view;

pub use correlator::{Correlator, Ingested};
pub use error::ShapeError;
pub use events::{EventSink, LogEvent, NullSink};
pub use log::{OrderedLog, Pair, PairState};
pub use normalize::{normalize, normalize_name, Normalizer, DEFAULT_PROTOCOL, MAX_DEPTH};
pub use record::{Record, Value};
pub use selector::{find_nested_field, ProtocolSelector, SelectorConfig};
pub use session::Session;
pub use view::PacketView;
