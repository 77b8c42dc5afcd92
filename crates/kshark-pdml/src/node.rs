//! PDML field tree model
//!
//! A PDML packet is a list of `<proto>` elements, each holding `<field>`
//! elements that may nest further fields or whole protocol subtrees
//! (decompressed or reassembled payloads). Both element kinds map onto
//! [`FieldNode`]; only their position in the tree differs.

/// Attribute value tshark uses to mark a field as hidden
pub const HIDDEN: &str = "yes";

/// Ordered attribute set of a PDML element
///
/// Attributes keep document order. Inserting an existing key replaces its
/// value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    /// Create an empty attribute set
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an attribute value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing any previous value for the same key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Remove an attribute, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Iterate over attributes in document order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `name` attribute (dissector field name, e.g. `kafka.api_key`)
    pub fn name(&self) -> Option<&str> {
        self.get("name")
    }

    /// The `show` attribute (display value)
    pub fn show(&self) -> Option<&str> {
        self.get("show")
    }

    /// The `showname` attribute (display label, usually `Label: value`)
    pub fn showname(&self) -> Option<&str> {
        self.get("showname")
    }

    /// The `pos` attribute (byte offset in the frame)
    pub fn pos(&self) -> Option<&str> {
        self.get("pos")
    }

    /// Whether tshark marked this element hidden
    pub fn is_hidden(&self) -> bool {
        self.get("hide") == Some(HIDDEN)
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

/// One dissected field or protocol subtree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldNode {
    /// Element attributes
    pub attrs: Attributes,
    /// Child `<field>` elements, in document order
    pub fields: Vec<FieldNode>,
    /// Nested `<proto>` elements, in document order
    pub protos: Vec<FieldNode>,
}

impl FieldNode {
    /// Create a node with the given attributes and no children
    pub fn new(attrs: Attributes) -> Self {
        Self {
            attrs,
            fields: Vec::new(),
            protos: Vec::new(),
        }
    }

    /// Builder: append a child field
    pub fn with_field(mut self, field: FieldNode) -> Self {
        self.fields.push(field);
        self
    }

    /// Builder: append a nested protocol subtree
    pub fn with_proto(mut self, proto: FieldNode) -> Self {
        self.protos.push(proto);
        self
    }

    /// The node's `name` attribute
    pub fn name(&self) -> Option<&str> {
        self.attrs.name()
    }

    /// Find a direct child field by its `name` attribute
    pub fn field(&self, name: &str) -> Option<&FieldNode> {
        self.fields.iter().find(|f| f.name() == Some(name))
    }
}

/// One `<packet>` document: the protocol layers of a single captured frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    /// Top-level protocol subtrees, outermost layer first
    pub protos: Vec<FieldNode>,
}

impl Packet {
    /// Find a top-level protocol subtree by its `name` attribute
    pub fn proto(&self, name: &str) -> Option<&FieldNode> {
        self.protos.iter().find(|p| p.name() == Some(name))
    }
}
