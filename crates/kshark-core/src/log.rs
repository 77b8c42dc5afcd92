//! Ordered request/response log
//!
//! The log only grows: pairs are appended, and the one permitted mutation of
//! an existing pair is attaching its response. Alongside the pairs it keeps
//! the viewer's selection, which follows the tail while the viewer is
//! looking at the newest entry and stays put otherwise.

use serde::Serialize;

use crate::view::PacketView;

/// Correlation state of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    /// Request seen, response still outstanding
    RequestOnly,
    /// Request and response both seen
    Matched,
    /// Response whose request was never seen (or already answered)
    ResponseOnly,
}

impl PairState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestOnly => "pending",
            Self::Matched => "matched",
            Self::ResponseOnly => "orphan",
        }
    }
}

/// One log entry; at least one side is always populated
///
/// Sides are only reachable through accessors: a pair is built from one side
/// and the log may later fill in a missing response, nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pair {
    #[serde(rename = "requestPacket", skip_serializing_if = "Option::is_none")]
    request: Option<PacketView>,
    #[serde(rename = "responsePacket", skip_serializing_if = "Option::is_none")]
    response: Option<PacketView>,
}

impl Pair {
    /// A request awaiting its response
    pub fn from_request(request: PacketView) -> Self {
        Self {
            request: Some(request),
            response: None,
        }
    }

    /// A response with no known request
    pub fn orphan(response: PacketView) -> Self {
        Self {
            request: None,
            response: Some(response),
        }
    }

    pub fn request(&self) -> Option<&PacketView> {
        self.request.as_ref()
    }

    pub fn response(&self) -> Option<&PacketView> {
        self.response.as_ref()
    }

    pub fn state(&self) -> PairState {
        match (&self.request, &self.response) {
            (Some(_), Some(_)) => PairState::Matched,
            (None, Some(_)) => PairState::ResponseOnly,
            // Construction guarantees a populated side
            (_, None) => PairState::RequestOnly,
        }
    }

    /// One-line summary: request frame, response frame, request time and name
    ///
    /// Frames are right-aligned in 8 columns; absent values print as `*`.
    pub fn title(&self) -> String {
        let frame = |view: &Option<PacketView>| {
            view.as_ref()
                .map(|v| v.frame.to_string())
                .unwrap_or_else(|| "*".to_string())
        };
        let (time, name) = match &self.request {
            Some(req) => (
                req.frame_time.as_str(),
                req.showname.as_deref().unwrap_or_default(),
            ),
            None => ("*", "*"),
        };
        format!(
            "{:>8} {:>8} {} {}",
            frame(&self.request),
            frame(&self.response),
            time,
            name
        )
    }
}

/// Append-only sequence of pairs plus the viewer selection
#[derive(Debug, Clone, Default)]
pub struct OrderedLog {
    pairs: Vec<Pair>,
    selected: usize,
}

impl OrderedLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn get(&self, index: usize) -> Option<&Pair> {
        self.pairs.get(index)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Index of the selected pair (0 when the log is empty)
    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_pair(&self) -> Option<&Pair> {
        self.pairs.get(self.selected)
    }

    /// Move the selection, clamped to the last entry
    pub fn select(&mut self, index: usize) {
        self.selected = index.min(self.pairs.len().saturating_sub(1));
    }

    /// Append a pair and apply the tail-follow rule; returns its index
    pub(crate) fn push(&mut self, pair: Pair) -> usize {
        self.pairs.push(pair);
        let index = self.pairs.len() - 1;
        // Follow only if the selection was on the previous last entry
        if self.selected + 1 == index {
            self.selected = index;
        }
        index
    }

    /// Attach a response to a pair that has none
    ///
    /// Gives the response back if the index is out of range or the pair
    /// already holds a response.
    pub(crate) fn attach_response(
        &mut self,
        index: usize,
        response: PacketView,
    ) -> Result<(), PacketView> {
        match self.pairs.get_mut(index) {
            Some(pair) if pair.response.is_none() => {
                pair.response = Some(response);
                Ok(())
            }
            _ => Err(response),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.pairs.clear();
        self.selected = 0;
    }
}
