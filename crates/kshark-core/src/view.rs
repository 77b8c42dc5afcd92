//! Per-packet protocol view

use serde::{Serialize, Serializer};

use crate::record::{Record, Value};

/// The protocol-of-interest layer of one packet, normalized and tagged
/// with its frame metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketView {
    /// Capture frame number (unique per session)
    pub frame: u64,
    /// Capture timestamp as displayed by tshark
    pub frame_time: String,
    /// Display name of the protocol layer, e.g. `Kafka (Fetch v11 Request)`
    pub showname: Option<String>,
    /// Present on requests
    pub request_key: Option<String>,
    /// Present on responses: frame number of the request being answered
    pub request_frame: Option<u64>,
    /// Normalized protocol fields
    pub record: Record,
}

impl PacketView {
    /// Create a view with no request/response markers
    pub fn new(frame: u64, frame_time: impl Into<String>, record: Record) -> Self {
        Self {
            frame,
            frame_time: frame_time.into(),
            showname: None,
            request_key: None,
            request_frame: None,
            record,
        }
    }

    /// Builder: mark as a request
    pub fn with_request_key(mut self, key: impl Into<String>) -> Self {
        self.request_key = Some(key.into());
        self
    }

    /// Builder: mark as a response to `frame`
    pub fn with_request_frame(mut self, frame: u64) -> Self {
        self.request_frame = Some(frame);
        self
    }

    /// Builder: set the layer display name
    pub fn with_showname(mut self, showname: impl Into<String>) -> Self {
        self.showname = Some(showname.into());
        self
    }

    /// Whether this packet is request-shaped
    pub fn is_request(&self) -> bool {
        self.request_key.is_some()
    }

    /// Frame metadata followed by the normalized fields
    ///
    /// Normalized fields win over metadata keys of the same name, keeping the
    /// metadata key's position.
    pub fn display_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("frame", frame_value(self.frame));
        record.insert("frameTime", self.frame_time.as_str());
        if let Some(showname) = &self.showname {
            record.insert("showname", showname.as_str());
        }
        if let Some(key) = &self.request_key {
            record.insert("request_key", key.as_str());
        }
        if let Some(frame) = self.request_frame {
            record.insert("request_frame", frame_value(frame));
        }
        for (key, value) in self.record.iter() {
            record.insert(key, value.clone());
        }
        record
    }
}

fn frame_value(frame: u64) -> Value {
    i64::try_from(frame)
        .map(Value::Int)
        .unwrap_or_else(|_| Value::Str(frame.to_string()))
}

impl Serialize for PacketView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.display_record().serialize(serializer)
    }
}
