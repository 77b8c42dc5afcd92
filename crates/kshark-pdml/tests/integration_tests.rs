//! Integration tests for the PDML reader
//!
//! These tests verify:
//! - Realistic tshark output splits into the same packets regardless of chunking
//! - Oversized partial documents are discarded
//! - Runaway element nesting is rejected without exhausting the stack
//! - The reader keeps working after errors

use kshark_pdml::{parse_packet, Packet, PdmlError, PdmlReader, MAX_DOCUMENT_LEN, MAX_NESTING};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    pub fn packet(frame: u32) -> String {
        format!(
            r#"<packet>
  <proto name="geninfo" pos="0" showname="General information" size="74">
    <field name="num" pos="0" show="{frame}" showname="Number" value="{frame:x}" size="74"/>
    <field name="timestamp" pos="0" show="Jan  4, 2024 10:00:00.{frame:09} UTC" showname="Captured Time" size="74"/>
  </proto>
  <proto name="kafka" showname="Kafka (Fetch v11 Request)" size="20" pos="54">
    <field name="kafka.request_key" showname="API Key: Fetch (1)" size="2" pos="58" show="1" value="0001"/>
    <field name="kafka.client_id" showname="Client ID: &quot;app&quot; &amp; co" size="4" pos="60" show="&quot;app&quot; &amp; co"/>
  </proto>
</packet>
"#
        )
    }

    pub fn stream(frames: &[u32]) -> String {
        let mut out = String::from(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<?xml-stylesheet type=\"text/xsl\" href=\"pdml2html.xsl\"?>\n<pdml version=\"0\" creator=\"wireshark/4.2.0\">\n",
        );
        for frame in frames {
            out.push_str(&packet(*frame));
        }
        out.push_str("</pdml>\n");
        out
    }

    pub fn frame_of(packet: &Packet) -> String {
        packet
            .proto("geninfo")
            .and_then(|p| p.field("num"))
            .and_then(|f| f.attrs.show())
            .unwrap_or_default()
            .to_string()
    }

    pub fn read_all(reader: &mut PdmlReader, chunks: &[&[u8]]) -> Vec<Result<Packet, PdmlError>> {
        let mut out = Vec::new();
        for chunk in chunks {
            reader.push_bytes(chunk);
            while let Some(result) = reader.next_packet() {
                out.push(result);
            }
        }
        out
    }
}

// ============================================================================
// Stream Tests
// ============================================================================

mod stream_tests {
    use super::*;

    #[test]
    fn whole_stream_at_once() {
        let stream = helpers::stream(&[1, 2, 3]);
        let mut reader = PdmlReader::new();
        let packets = helpers::read_all(&mut reader, &[stream.as_bytes()]);

        let frames: Vec<String> = packets
            .iter()
            .map(|p| helpers::frame_of(p.as_ref().unwrap()))
            .collect();
        assert_eq!(frames, vec!["1", "2", "3"]);
    }

    #[test]
    fn entities_are_decoded() {
        let packet = parse_packet(helpers::packet(1).as_bytes()).unwrap();
        let client_id = packet.proto("kafka").and_then(|p| p.field("kafka.client_id")).unwrap();
        assert_eq!(client_id.attrs.show(), Some("\"app\" & co"));
        assert_eq!(client_id.attrs.showname(), Some("Client ID: \"app\" & co"));
    }

    #[test]
    fn oversized_document_is_discarded() {
        let mut reader = PdmlReader::new();
        reader.push_bytes(b"<packet>");
        reader.push_bytes(&vec![b' '; MAX_DOCUMENT_LEN]);

        match reader.next_packet() {
            Some(Err(PdmlError::DocumentTooLarge(len))) => assert!(len > MAX_DOCUMENT_LEN),
            other => panic!("expected DocumentTooLarge, got {:?}", other),
        }
        assert_eq!(reader.buffered_len(), 0);

        // The next document still parses
        let next = helpers::packet(9);
        let packets = helpers::read_all(&mut reader, &[next.as_bytes()]);
        assert_eq!(packets.len(), 1);
        assert_eq!(helpers::frame_of(packets[0].as_ref().unwrap()), "9");
    }

    #[test]
    fn deeply_nested_document_is_rejected() {
        let depth = 200_000;
        let mut deep = String::from("<packet><proto name=\"kafka\">");
        deep.push_str(&"<field name=\"x\">".repeat(depth));
        deep.push_str(&"</field>".repeat(depth));
        deep.push_str("</proto></packet>");
        assert!(deep.len() < MAX_DOCUMENT_LEN);

        assert!(matches!(parse_packet(deep.as_bytes()), Err(PdmlError::TooDeep)));

        // The reader drops the document and continues with the next one
        let mut reader = PdmlReader::new();
        let next = helpers::packet(9);
        let packets = helpers::read_all(&mut reader, &[deep.as_bytes(), next.as_bytes()]);
        assert_eq!(packets.len(), 2);
        assert!(matches!(packets[0], Err(PdmlError::TooDeep)));
        assert_eq!(helpers::frame_of(packets[1].as_ref().unwrap()), "9");
    }

    #[test]
    fn nesting_at_the_limit_is_accepted() {
        let mut doc = String::from("<packet><proto name=\"kafka\">");
        doc.push_str(&"<field name=\"x\">".repeat(MAX_NESTING - 1));
        doc.push_str(&"</field>".repeat(MAX_NESTING - 1));
        doc.push_str("</proto></packet>");

        let packet = parse_packet(doc.as_bytes()).unwrap();
        let mut depth = 0;
        let mut node = packet.proto("kafka");
        while let Some(current) = node {
            depth += 1;
            node = current.fields.first();
        }
        assert_eq!(depth, MAX_NESTING);
    }

    #[test]
    fn malformed_document_between_good_ones() {
        let stream = format!(
            "{}<packet><proto name=\"x\"><field></proto></packet>{}",
            helpers::packet(1),
            helpers::packet(2)
        );
        let mut reader = PdmlReader::new();
        let packets = helpers::read_all(&mut reader, &[stream.as_bytes()]);

        assert_eq!(packets.len(), 3);
        assert!(packets[0].is_ok());
        assert!(packets[1].is_err());
        assert_eq!(helpers::frame_of(packets[2].as_ref().unwrap()), "2");
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn chunking_does_not_change_packets(
            frames in prop::collection::vec(1u32..100_000, 1..8),
            chunk_size in 1usize..512,
        ) {
            let stream = helpers::stream(&frames);
            let chunks: Vec<&[u8]> = stream.as_bytes().chunks(chunk_size).collect();

            let mut reader = PdmlReader::new();
            let packets = helpers::read_all(&mut reader, &chunks);

            prop_assert_eq!(packets.len(), frames.len());
            for (packet, frame) in packets.iter().zip(&frames) {
                let packet = packet.as_ref().unwrap();
                prop_assert_eq!(helpers::frame_of(packet), frame.to_string());
                prop_assert_eq!(packet, &parse_packet(helpers::packet(*frame).as_bytes()).unwrap());
            }
        }
    }
}
