//! Secondary index definitions.

use rkyv::{Archive, Deserialize, Serialize};

/// A non-unique composite index whose entries are ordered by field values.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name (unique within schema).
    pub name: String,
    /// Indexed entity.
    pub entity: String,
    /// Indexed fields, most significant first.
    pub fields: Vec<String>,
}

impl IndexDef {
    /// Create an index over the given fields.
    pub fn new(
        name: impl Into<String>,
        entity: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}
