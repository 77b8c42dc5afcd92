//! Streaming PDML document reader
//!
//! `tshark -T pdml` writes one long XML document:
//!
//! ```text
//! <?xml version="1.0"?>
//! <pdml version="0" creator="wireshark/4.2.2">
//! <packet>
//!   <proto name="geninfo" ...>
//!     <field name="num" show="1" .../>
//!   </proto>
//!   ...
//! </packet>
//! <packet>...</packet>
//! ```
//!
//! The reader never waits for `</pdml>`. It cuts the stream at `</packet>`
//! boundaries and parses each `<packet>` element as its own document, so a
//! live capture yields packets as soon as tshark flushes them.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::trace;

use crate::error::PdmlError;
use crate::node::{Attributes, FieldNode, Packet};

/// Largest partial document kept while waiting for `</packet>`
pub const MAX_DOCUMENT_LEN: usize = 16 * 1024 * 1024;

/// Deepest proto/field nesting accepted inside one packet
pub const MAX_NESTING: usize = 256;

const PACKET_OPEN: &[u8] = b"<packet";
const PACKET_CLOSE: &[u8] = b"</packet>";

/// Streaming PDML reader
pub struct PdmlReader {
    buffer: Vec<u8>,
    /// Offset below which the buffer is known not to contain `</packet>`
    scanned: usize,
}

impl PdmlReader {
    /// Create a new reader
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64 * 1024),
            scanned: 0,
        }
    }

    /// Push raw stream bytes into the reader's buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract the next complete packet document
    ///
    /// Returns `None` when more data is needed. A malformed document is
    /// consumed and reported as `Some(Err(..))`; the next call continues with
    /// the following document.
    pub fn next_packet(&mut self) -> Option<Result<Packet, PdmlError>> {
        let Some(start) = find_packet_start(&self.buffer) else {
            // Keep a tail that may hold the beginning of a split "<packet"
            let keep = self.buffer.len().min(PACKET_OPEN.len());
            let discard = self.buffer.len() - keep;
            self.buffer.drain(..discard);
            self.scanned = 0;
            return None;
        };

        if start > 0 {
            self.buffer.drain(..start);
            self.scanned = self.scanned.saturating_sub(start);
        }

        let search_from = self.scanned.saturating_sub(PACKET_CLOSE.len());
        match find(&self.buffer[search_from..], PACKET_CLOSE) {
            Some(pos) => {
                let end = search_from + pos + PACKET_CLOSE.len();
                let document: Vec<u8> = self.buffer.drain(..end).collect();
                self.scanned = 0;
                trace!("PDML document boundary after {} bytes", document.len());
                Some(parse_packet(&document))
            }
            None if self.buffer.len() > MAX_DOCUMENT_LEN => {
                let len = self.buffer.len();
                self.clear();
                Some(Err(PdmlError::DocumentTooLarge(len)))
            }
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }

    /// Number of bytes waiting for a document boundary
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the internal buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }
}

impl Default for PdmlReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Position of the next `<packet>` or `<packet ...>` opening tag
fn find_packet_start(buf: &[u8]) -> Option<usize> {
    let mut from = 0;
    while let Some(pos) = find(&buf[from..], PACKET_OPEN) {
        let at = from + pos;
        match buf.get(at + PACKET_OPEN.len()) {
            Some(b'>') => return Some(at),
            Some(b) if b.is_ascii_whitespace() => return Some(at),
            Some(_) => from = at + 1,
            None => return None,
        }
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Proto,
    Field,
}

impl ElementKind {
    fn tag(self) -> &'static str {
        match self {
            ElementKind::Proto => "proto",
            ElementKind::Field => "field",
        }
    }
}

/// Builds a [`Packet`] from a sequence of open/close element events
#[derive(Default)]
struct TreeBuilder {
    packet: Option<Packet>,
    stack: Vec<(ElementKind, FieldNode)>,
    /// Depth inside an element the model has no place for
    ignored_depth: usize,
    finished: bool,
}

impl TreeBuilder {
    fn open(&mut self, tag: &[u8], attrs: Attributes) -> Result<(), PdmlError> {
        if self.finished {
            return Err(PdmlError::TrailingContent);
        }
        if self.ignored_depth > 0 {
            self.ignored_depth += 1;
            return Ok(());
        }
        if self.packet.is_none() {
            if tag == b"packet" {
                self.packet = Some(Packet::default());
                return Ok(());
            }
            return Err(PdmlError::UnexpectedElement(
                String::from_utf8_lossy(tag).into_owned(),
            ));
        }

        if self.stack.len() >= MAX_NESTING && matches!(tag, b"proto" | b"field") {
            return Err(PdmlError::TooDeep);
        }
        match tag {
            b"proto" => self.stack.push((ElementKind::Proto, FieldNode::new(attrs))),
            b"field" => self.stack.push((ElementKind::Field, FieldNode::new(attrs))),
            _ => self.ignored_depth = 1,
        }
        Ok(())
    }

    fn close(&mut self, tag: &[u8]) -> Result<(), PdmlError> {
        if self.ignored_depth > 0 {
            self.ignored_depth -= 1;
            return Ok(());
        }

        let expected = match self.stack.last() {
            Some((kind, _)) => kind.tag(),
            None => "packet",
        };
        if tag != expected.as_bytes() {
            return Err(PdmlError::MismatchedEnd {
                expected: expected.to_string(),
                found: String::from_utf8_lossy(tag).into_owned(),
            });
        }

        let Some((kind, node)) = self.stack.pop() else {
            self.finished = true;
            return Ok(());
        };

        match (self.stack.last_mut(), kind) {
            (Some((_, parent)), ElementKind::Field) => parent.fields.push(node),
            (Some((_, parent)), ElementKind::Proto) => parent.protos.push(node),
            (None, ElementKind::Proto) => {
                if let Some(packet) = self.packet.as_mut() {
                    packet.protos.push(node);
                }
            }
            // Loose fields directly under <packet> carry no protocol layer
            (None, ElementKind::Field) => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<Packet, PdmlError> {
        match self.packet {
            Some(packet) if self.finished => Ok(packet),
            _ => Err(PdmlError::Incomplete),
        }
    }
}

fn read_attributes(element: &BytesStart<'_>) -> Result<Attributes, PdmlError> {
    let mut attrs = Attributes::new();
    for attr in element.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

/// Parse one complete `<packet>...</packet>` document
pub fn parse_packet(document: &[u8]) -> Result<Packet, PdmlError> {
    let mut reader = Reader::from_reader(document);
    let mut builder = TreeBuilder::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(element) => {
                let attrs = read_attributes(&element)?;
                builder.open(element.name().as_ref(), attrs)?;
            }
            Event::Empty(element) => {
                let attrs = read_attributes(&element)?;
                let name = element.name();
                builder.open(name.as_ref(), attrs)?;
                builder.close(name.as_ref())?;
            }
            Event::End(element) => builder.close(element.name().as_ref())?,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKET: &str = r#"<packet>
  <proto name="geninfo" pos="0" showname="General information" size="120">
    <field name="num" pos="0" show="12" showname="Number" value="c" size="120"/>
    <field name="timestamp" pos="0" show="Jan  4, 2024 10:00:00.000000000 UTC" showname="Captured Time" size="120"/>
  </proto>
  <proto name="kafka" showname="Kafka (Metadata v9 Request)" size="54" pos="66">
    <field name="kafka.len" showname="Length: 50" size="4" pos="66" show="50" value="00000032"/>
    <field name="kafka.request_key" showname="API Key: Metadata (3)" size="2" pos="70" show="3" value="0003"/>
  </proto>
</packet>"#;

    #[test]
    fn test_parse_complete_packet() {
        let packet = parse_packet(PACKET.as_bytes()).unwrap();
        assert_eq!(packet.protos.len(), 2);

        let geninfo = packet.proto("geninfo").unwrap();
        assert_eq!(geninfo.field("num").unwrap().attrs.show(), Some("12"));

        let kafka = packet.proto("kafka").unwrap();
        assert_eq!(kafka.attrs.showname(), Some("Kafka (Metadata v9 Request)"));
        assert_eq!(kafka.fields.len(), 2);
        assert_eq!(
            kafka.field("kafka.request_key").unwrap().attrs.show(),
            Some("3")
        );
    }

    #[test]
    fn test_nested_fields_and_protos() {
        let doc = br#"<packet><proto name="kafka">
            <field name="kafka.topic" showname="Topic">
              <field name="kafka.topic_name" showname="Topic Name: orders"/>
              <proto name="kafka" showname="Decompressed">
                <field name="kafka.offset" showname="Offset: 7"/>
              </proto>
            </field>
        </proto></packet>"#;

        let packet = parse_packet(doc).unwrap();
        let topic = packet.proto("kafka").unwrap().field("kafka.topic").unwrap();
        assert_eq!(topic.fields.len(), 1);
        assert_eq!(topic.protos.len(), 1);
        assert_eq!(topic.protos[0].fields[0].name(), Some("kafka.offset"));
    }

    #[test]
    fn test_unescapes_attribute_values() {
        let doc = br#"<packet><proto name="kafka"><field name="kafka.client_id" showname="Client Id: a&amp;b &lt;c&gt;"/></proto></packet>"#;
        let packet = parse_packet(doc).unwrap();
        let field = &packet.protos[0].fields[0];
        assert_eq!(field.attrs.showname(), Some("Client Id: a&b <c>"));
    }

    #[test]
    fn test_unknown_elements_are_ignored() {
        let doc = br#"<packet><proto name="kafka"><note><field name="x"/></note><field name="y"/></proto></packet>"#;
        let packet = parse_packet(doc).unwrap();
        let kafka = &packet.protos[0];
        assert_eq!(kafka.fields.len(), 1);
        assert_eq!(kafka.fields[0].name(), Some("y"));
    }

    #[test]
    fn test_mismatched_tags_fail() {
        let doc = br#"<packet><proto name="kafka"><field name="x"></proto></field></packet>"#;
        assert!(parse_packet(doc).is_err());
    }

    #[test]
    fn test_truncated_document_fails() {
        let doc = br#"<packet><proto name="kafka">"#;
        assert!(matches!(parse_packet(doc), Err(PdmlError::Incomplete)));
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| {
            let mut doc = String::from("<packet>");
            doc.push_str(&"<field name=\"x\">".repeat(depth));
            doc.push_str(&"</field>".repeat(depth));
            doc.push_str("</packet>");
            doc
        };

        let packet = parse_packet(nested(MAX_NESTING).as_bytes()).unwrap();
        assert!(packet.protos.is_empty());
        assert!(matches!(
            parse_packet(nested(MAX_NESTING + 1).as_bytes()),
            Err(PdmlError::TooDeep)
        ));
    }

    #[test]
    fn test_streaming_skips_preamble() {
        let mut reader = PdmlReader::new();
        reader.push_bytes(b"<?xml version=\"1.0\"?>\n<pdml version=\"0\" creator=\"wireshark\">\n");
        assert!(reader.next_packet().is_none());

        reader.push_bytes(PACKET.as_bytes());
        let packet = reader.next_packet().unwrap().unwrap();
        assert!(packet.proto("kafka").is_some());
        assert!(reader.next_packet().is_none());
    }

    #[test]
    fn test_streaming_partial_data() {
        let mut reader = PdmlReader::new();
        let (head, tail) = PACKET.as_bytes().split_at(150);

        reader.push_bytes(head);
        assert!(reader.next_packet().is_none());

        reader.push_bytes(tail);
        assert!(reader.next_packet().unwrap().is_ok());
    }

    #[test]
    fn test_streaming_split_open_tag() {
        let mut reader = PdmlReader::new();
        reader.push_bytes(b"<pdml>\n<pac");
        assert!(reader.next_packet().is_none());
        reader.push_bytes(b"ket><proto name=\"kafka\"/></packet>");
        let packet = reader.next_packet().unwrap().unwrap();
        assert_eq!(packet.protos.len(), 1);
    }

    #[test]
    fn test_streaming_split_close_tag() {
        let mut reader = PdmlReader::new();
        reader.push_bytes(b"<packet><proto name=\"kafka\"/></pack");
        assert!(reader.next_packet().is_none());
        reader.push_bytes(b"et>");
        assert!(reader.next_packet().unwrap().is_ok());
    }

    #[test]
    fn test_streaming_multiple_packets() {
        let mut reader = PdmlReader::new();
        let mut data = String::from("<pdml>");
        data.push_str(PACKET);
        data.push_str(PACKET);
        data.push_str("</pdml>");
        reader.push_bytes(data.as_bytes());

        assert!(reader.next_packet().unwrap().is_ok());
        assert!(reader.next_packet().unwrap().is_ok());
        assert!(reader.next_packet().is_none());
    }

    #[test]
    fn test_streaming_recovers_after_malformed_document() {
        let mut reader = PdmlReader::new();
        reader.push_bytes(b"<packet><proto name=\"kafka\"><field></proto></packet>");
        reader.push_bytes(PACKET.as_bytes());

        assert!(reader.next_packet().unwrap().is_err());
        assert!(reader.next_packet().unwrap().is_ok());
    }

    #[test]
    fn test_pdml_root_is_not_mistaken_for_packet() {
        let mut reader = PdmlReader::new();
        reader.push_bytes(b"<packets-note/><packet><proto name=\"a\"/></packet>");
        let packet = reader.next_packet().unwrap().unwrap();
        assert_eq!(packet.protos[0].name(), Some("a"));
    }
}
