//! Protocol selection and frame metadata extraction
//!
//! Picks the protocol of interest out of a packet document, tags it with the
//! frame number and capture time from tshark's `geninfo` layer, and looks up
//! the markers that tell requests from responses.

use kshark_pdml::{FieldNode, Packet};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::ShapeError;
use crate::normalize::{Normalizer, DEFAULT_PROTOCOL, MAX_DEPTH};
use crate::view::PacketView;

/// Names the selector looks for in a packet document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Layer carrying frame metadata
    pub frame_info_proto: String,
    /// Frame number field within the metadata layer
    pub frame_number_field: String,
    /// Capture timestamp field within the metadata layer
    pub frame_time_field: String,
    /// Protocol of interest
    pub protocol: String,
    /// Field whose presence marks a request
    pub request_key_field: String,
    /// Field holding a response's back-reference to its request frame
    pub request_frame_field: String,
}

impl SelectorConfig {
    /// Configuration for a protocol whose dissector follows the
    /// `<proto>.request_key` / `<proto>.request_frame` convention
    pub fn for_protocol(protocol: &str) -> Self {
        Self {
            frame_info_proto: "geninfo".to_string(),
            frame_number_field: "num".to_string(),
            frame_time_field: "timestamp".to_string(),
            protocol: protocol.to_string(),
            request_key_field: format!("{}.request_key", protocol),
            request_frame_field: format!("{}.request_frame", protocol),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self::for_protocol(DEFAULT_PROTOCOL)
    }
}

/// Extracts the protocol-of-interest view from packet documents
#[derive(Debug, Clone)]
pub struct ProtocolSelector {
    config: SelectorConfig,
    normalizer: Normalizer,
}

impl ProtocolSelector {
    pub fn new(config: SelectorConfig) -> Self {
        let normalizer = Normalizer::new(&config.protocol);
        Self { config, normalizer }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Select and normalize the protocol of interest
    ///
    /// Returns `Ok(None)` when the packet does not carry the protocol, and a
    /// [`ShapeError`] when the frame metadata is missing.
    pub fn select(&self, packet: &Packet) -> Result<Option<PacketView>, ShapeError> {
        let config = &self.config;

        let frame_info = packet
            .proto(&config.frame_info_proto)
            .ok_or_else(|| ShapeError::MissingProto(config.frame_info_proto.clone()))?;
        let frame_show = self.required_show(frame_info, &config.frame_number_field)?;
        let frame = frame_show
            .trim()
            .parse::<u64>()
            .map_err(|_| ShapeError::InvalidFrameNumber(frame_show.to_string()))?;
        let frame_time = self
            .required_show(frame_info, &config.frame_time_field)?
            .to_string();

        let Some(proto) = packet.proto(&config.protocol) else {
            trace!(frame, "no {} layer, dropping packet", config.protocol);
            return Ok(None);
        };

        let request_key = find_nested_field(proto, &config.request_key_field)
            .and_then(|f| f.attrs.show())
            .filter(|show| !show.is_empty())
            .map(str::to_string);

        let request_frame = find_nested_field(proto, &config.request_frame_field)
            .and_then(|f| f.attrs.show())
            .filter(|show| !show.is_empty())
            .and_then(|show| match show.trim().parse::<u64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(frame, "ignoring unparsable request frame {:?}", show);
                    None
                }
            });

        Ok(Some(PacketView {
            frame,
            frame_time,
            showname: proto.attrs.showname().map(str::to_string),
            request_key,
            request_frame,
            record: self.normalizer.normalize(proto),
        }))
    }

    /// Display value of a required metadata field (empty when the field has no `show`)
    fn required_show<'a>(&self, proto: &'a FieldNode, field: &str) -> Result<&'a str, ShapeError> {
        proto
            .field(field)
            .map(|f| f.attrs.show().unwrap_or_default())
            .ok_or_else(|| ShapeError::MissingField {
                proto: self.config.frame_info_proto.clone(),
                field: field.to_string(),
            })
    }
}

impl Default for ProtocolSelector {
    fn default() -> Self {
        Self::new(SelectorConfig::default())
    }
}

/// Find a field among a subtree's direct fields, descending through the first
/// nested protocol subtree at each level until one matches
pub fn find_nested_field<'a>(proto: &'a FieldNode, name: &str) -> Option<&'a FieldNode> {
    let mut current = proto;
    for _ in 0..=MAX_DEPTH {
        if let Some(field) = current.field(name) {
            return Some(field);
        }
        current = current.protos.first()?;
    }
    None
}
