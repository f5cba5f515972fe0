//! Flattening of instrument report markup into key/value field sets.
//!
//! Reports are shallow: a root element with one `<Header>` of leaf fields
//! and an optional record container whose children are leaf-field records.
//!
//! ```xml
//! <SystemUsageReport>
//!   <Header><Total_Tests>15</Total_Tests>…</Header>
//!   <AssayRecords>
//!     <AssayRecord><Assay>Flu A/B</Assay><Lot_Number>--</Lot_Number></AssayRecord>
//!   </AssayRecords>
//! </SystemUsageReport>
//! ```

use std::collections::BTreeMap;

use roxmltree::{Document, Node};

use crate::error::ParseError;

/// Leaf fields of one markup element. Lookups ignore ASCII case; values are
/// trimmed and empty values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<String, String>);

impl Fields {
    /// Build from raw header key/value pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut fields = Fields::default();
        for (key, value) in pairs {
            fields.insert(key.as_ref(), value.as_ref());
        }
        fields
    }

    fn insert(&mut self, key: &str, value: &str) {
        let value = value.trim();
        if !value.is_empty() {
            self.0.insert(key.to_ascii_lowercase(), value.to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str, ParseError> {
        self.get(key).ok_or_else(|| ParseError::MissingField {
            field: key.to_string(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn from_element(node: Node<'_, '_>) -> Self {
        let mut fields = Fields::default();
        for child in node.children().filter(Node::is_element) {
            fields.insert(child.tag_name().name(), child.text().unwrap_or_default());
        }
        fields
    }
}

/// A report reduced to its header fields and record field sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    pub header: Fields,
    pub records: Vec<Fields>,
}

impl ReportDocument {
    /// Parse `content`, reading `<Header>` and the children of the
    /// `record_container` element (both direct children of the root).
    ///
    /// A missing container yields no records; a missing header is an error.
    pub fn parse(content: &str, record_container: &str) -> Result<Self, ParseError> {
        let doc = Document::parse(content)?;
        let root = doc.root_element();

        let header = child_element(root, "Header")
            .map(Fields::from_element)
            .ok_or(ParseError::MissingElement { element: "Header" })?;

        let records = child_element(root, record_container)
            .map(|container| {
                container
                    .children()
                    .filter(Node::is_element)
                    .map(Fields::from_element)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self { header, records })
    }
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .filter(Node::is_element)
        .find(|child| child.tag_name().name().eq_ignore_ascii_case(name))
}
