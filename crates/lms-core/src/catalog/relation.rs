//! Relation definitions between entities.

use rkyv::{Archive, Deserialize, Serialize};

/// Behavior when a referenced entity is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum DeleteBehavior {
    /// Delete related entities.
    Cascade,
    /// Prevent deletion if related entities exist.
    Restrict,
}

/// Restricts which parent rows a foreign key may point at.
///
/// The referenced row's `field` must hold one of `allowed`.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct TargetRule {
    /// Field on the referenced entity.
    pub field: String,
    /// Accepted values of that field.
    pub allowed: Vec<String>,
}

impl TargetRule {
    /// Create a rule accepting the given values.
    pub fn new(field: impl Into<String>, allowed: &[&str]) -> Self {
        Self {
            field: field.into(),
            allowed: allowed.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Check whether a value is accepted.
    pub fn allows(&self, value: &str) -> bool {
        self.allowed.iter().any(|a| a == value)
    }
}

/// A many-to-one relation: `from_entity.from_field` references `to_entity`.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relation name (unique within schema).
    pub name: String,
    /// Source (child) entity name.
    pub from_entity: String,
    /// Foreign key field on the source entity.
    pub from_field: String,
    /// Target (parent) entity name.
    pub to_entity: String,
    /// Field on the target entity (its identity).
    pub to_field: String,
    /// Delete behavior.
    pub on_delete: DeleteBehavior,
    /// Optional constraint on acceptable parent rows.
    pub target_rule: Option<TargetRule>,
}

impl RelationDef {
    /// Create a restricting relation from `from_entity.from_field` to `to_entity.id`.
    pub fn new(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_field: impl Into<String>,
        to_entity: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.into(),
            from_field: from_field.into(),
            to_entity: to_entity.into(),
            to_field: "id".to_string(),
            on_delete: DeleteBehavior::Restrict,
            target_rule: None,
        }
    }

    /// Set delete behavior.
    pub fn with_on_delete(mut self, on_delete: DeleteBehavior) -> Self {
        self.on_delete = on_delete;
        self
    }

    /// Shorthand for `with_on_delete(DeleteBehavior::Cascade)`.
    pub fn cascade(self) -> Self {
        self.with_on_delete(DeleteBehavior::Cascade)
    }

    /// Attach a target rule.
    pub fn with_target_rule(mut self, rule: TargetRule) -> Self {
        self.target_rule = Some(rule);
        self
    }

    /// Check whether deleting the parent cascades to this relation's rows.
    pub fn is_cascade(&self) -> bool {
        self.on_delete == DeleteBehavior::Cascade
    }
}
