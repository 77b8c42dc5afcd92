//! Packet ingestion session
//!
//! Wires the selector to the correlator: one packet document in, at most one
//! log mutation out.

use kshark_pdml::Packet;

use crate::correlator::{Correlator, Ingested};
use crate::error::ShapeError;
use crate::events::{EventSink, LogEvent};
use crate::selector::{ProtocolSelector, SelectorConfig};

/// One capture session's ingestion state
pub struct Session<S = Vec<LogEvent>> {
    selector: ProtocolSelector,
    correlator: Correlator<S>,
}

impl<S: EventSink> Session<S> {
    pub fn new(config: SelectorConfig, sink: S) -> Self {
        Self {
            selector: ProtocolSelector::new(config),
            correlator: Correlator::new(sink),
        }
    }

    /// Ingest one packet document
    ///
    /// Returns `Ok(None)` for packets without the protocol of interest. A
    /// [`ShapeError`] leaves the log untouched.
    pub fn ingest_packet(&mut self, packet: &Packet) -> Result<Option<Ingested>, ShapeError> {
        let Some(view) = self.selector.select(packet)? else {
            return Ok(None);
        };
        Ok(Some(self.correlator.ingest(view)))
    }

    /// Reset the log for a fresh view of the same capture
    pub fn clear(&mut self) {
        self.correlator.clear();
    }

    pub fn selector(&self) -> &ProtocolSelector {
        &self.selector
    }

    pub fn correlator(&self) -> &Correlator<S> {
        &self.correlator
    }

    pub fn correlator_mut(&mut self) -> &mut Correlator<S> {
        &mut self.correlator
    }
}

impl Default for Session<Vec<LogEvent>> {
    fn default() -> Self {
        Self::new(SelectorConfig::default(), Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kshark_pdml::{Attributes, FieldNode};

    fn node(attrs: &[(&str, &str)]) -> FieldNode {
        FieldNode::new(attrs.iter().copied().collect::<Attributes>())
    }

    fn packet(frame: &str, kafka: Option<FieldNode>) -> Packet {
        let geninfo = node(&[("name", "geninfo")])
            .with_field(node(&[("name", "num"), ("show", frame)]))
            .with_field(node(&[("name", "timestamp"), ("show", "t")]));
        Packet {
            protos: std::iter::once(geninfo).chain(kafka).collect(),
        }
    }

    #[test]
    fn test_ingest_packets() {
        let mut session: Session = Session::default();

        let req = node(&[("name", "kafka")])
            .with_field(node(&[("name", "kafka.request_key"), ("show", "1")]));
        let resp = node(&[("name", "kafka")])
            .with_field(node(&[("name", "kafka.request_frame"), ("show", "1")]));

        assert_eq!(
            session.ingest_packet(&packet("1", Some(req))),
            Ok(Some(Ingested::Request { index: 0 }))
        );
        assert_eq!(session.ingest_packet(&packet("2", None)), Ok(None));
        assert_eq!(
            session.ingest_packet(&packet("3", Some(resp))),
            Ok(Some(Ingested::Matched { index: 0 }))
        );
        assert_eq!(session.correlator().pairs().len(), 1);
    }

    #[test]
    fn test_shape_error_leaves_log_untouched() {
        let mut session: Session = Session::default();
        let bad = Packet {
            protos: vec![node(&[("name", "kafka")])],
        };

        assert!(session.ingest_packet(&bad).is_err());
        assert!(session.correlator().pairs().is_empty());
        assert!(session.correlator_mut().drain_events().is_empty());
    }
}
