//! Field tree normalization
//!
//! Flattens a PDML protocol subtree into a [`Record`] keyed by what the
//! fields mean rather than where they sit in the document:
//!
//! - `<field name="kafka.api_version" showname="API Version: 9"/>` becomes
//!   `api_version: 9`
//! - a field with children becomes a nested record under its normalized name
//! - hidden fields disappear
//!
//! The input tree is never modified.

use kshark_pdml::FieldNode;
use tracing::warn;

use crate::record::{Record, Value};

/// Protocol whose field names are shortened by default
pub const DEFAULT_PROTOCOL: &str = "kafka";

/// Nesting limit for the field tree
pub const MAX_DEPTH: usize = 64;

/// Element attributes that describe layout rather than content
const STRUCTURAL_ATTRIBUTES: &[&str] = &["name", "pos", "size", "value"];

/// Normalize a field name using the default protocol namespace
///
/// `kafka.correlation.id` becomes `correlation_id`.
pub fn normalize_name(name: &str) -> String {
    Normalizer::new(DEFAULT_PROTOCOL).normalize_name(name)
}

/// Normalize a subtree using the default protocol namespace
pub fn normalize(node: &FieldNode) -> Record {
    Normalizer::new(DEFAULT_PROTOCOL).normalize(node)
}

/// Flattens PDML field trees for one protocol namespace
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Prefix stripped from field names, e.g. `kafka.`
    prefix: String,
    max_depth: usize,
}

impl Normalizer {
    /// Create a normalizer for the given protocol namespace
    pub fn new(protocol: &str) -> Self {
        Self {
            prefix: format!("{}.", protocol),
            max_depth: MAX_DEPTH,
        }
    }

    /// Override the nesting limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Strip one leading namespace prefix, then turn remaining dots into underscores
    pub fn normalize_name(&self, name: &str) -> String {
        name.strip_prefix(self.prefix.as_str())
            .unwrap_or(name)
            .replace('.', "_")
    }

    /// Flatten one subtree into a record
    pub fn normalize(&self, node: &FieldNode) -> Record {
        self.normalize_node(node, false, 0)
    }

    fn normalize_node(&self, node: &FieldNode, drop_show: bool, depth: usize) -> Record {
        let mut record = Record::new();

        if depth > self.max_depth {
            warn!(
                "field tree deeper than {} levels, truncating at {:?}",
                self.max_depth,
                node.name()
            );
            return record;
        }

        for (key, value) in node.attrs.iter() {
            if STRUCTURAL_ATTRIBUTES.contains(&key) || (drop_show && key == "show") {
                continue;
            }
            record.insert(key, value);
        }

        // Fields of wrapped protocol subtrees come ahead of the node's own
        let fields = node
            .protos
            .iter()
            .flat_map(|proto| proto.fields.iter())
            .chain(node.fields.iter());

        for field in fields {
            let attrs = &field.attrs;
            if attrs.is_empty() || attrs.is_hidden() {
                continue;
            }

            let name = non_empty(attrs.name());

            if let Some((label, text)) = non_empty(attrs.showname()).and_then(split_label) {
                let key = match name {
                    Some(name) => self.normalize_name(name),
                    None => label.to_string(),
                };
                record.insert(key, Value::parse_scalar(text));
                continue;
            }

            let pos = attrs.pos().unwrap_or_default();
            let (key, drop_child_show) = match (name, non_empty(attrs.show())) {
                (Some(name), _) => (self.normalize_name(name), false),
                (None, Some(show)) => (format!("{}_{}", show, pos), true),
                (None, None) => (format!("_{}", pos), false),
            };
            let nested = self.normalize_node(field, drop_child_show, depth + 1);
            record.insert(key, nested);
        }

        record
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_PROTOCOL)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Split a `Label: value` display label
///
/// The label is everything before the first colon and must not be empty;
/// whitespace after the colon is skipped. Multi-line labels do not split.
fn split_label(showname: &str) -> Option<(&str, &str)> {
    let (label, text) = showname.split_once(':')?;
    if label.is_empty() || text.contains(['\n', '\r']) {
        return None;
    }
    Some((label, text.trim_start()))
}
