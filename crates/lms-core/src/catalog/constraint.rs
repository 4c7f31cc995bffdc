//! Constraint definitions for entities.

use lms_proto::Value;
use rkyv::{Archive, Deserialize, Serialize};

/// A built-in rule evaluated against a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum CheckRule {
    /// The value looks like an e-mail address.
    Email,
    /// The string is not blank.
    NonEmpty,
    /// The number is zero or greater.
    NonNegative,
}

impl CheckRule {
    /// Evaluate the rule. Null values pass; nullability is checked elsewhere.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if value.is_null() {
            return Ok(());
        }
        match self {
            CheckRule::Email => match value.as_str() {
                Some(s) if is_email(s) => Ok(()),
                Some(s) => Err(format!("'{}' is not a valid e-mail address", s)),
                None => Err("expected a string".to_string()),
            },
            CheckRule::NonEmpty => match value {
                Value::String(s) if !s.trim().is_empty() => Ok(()),
                Value::String(_) => Err("must not be empty".to_string()),
                _ => Err("expected a string".to_string()),
            },
            CheckRule::NonNegative => match value.as_f64() {
                Some(n) if n >= 0.0 => Ok(()),
                Some(n) => Err(format!("{} is negative", n)),
                None => Err("expected a number".to_string()),
            },
        }
    }
}

fn is_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// A constraint definition.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum ConstraintDef {
    /// Uniqueness constraint (single or composite).
    Unique {
        /// Constraint name.
        name: String,
        /// Entity this constraint applies to.
        entity: String,
        /// Fields that must be unique together.
        fields: Vec<String>,
    },
    /// Field-level check rule.
    Check {
        /// Constraint name.
        name: String,
        /// Entity this constraint applies to.
        entity: String,
        /// Field the rule inspects.
        field: String,
        /// Rule to evaluate.
        rule: CheckRule,
    },
}

impl ConstraintDef {
    /// Create a unique constraint on a single field.
    pub fn unique(
        name: impl Into<String>,
        entity: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        ConstraintDef::Unique {
            name: name.into(),
            entity: entity.into(),
            fields: vec![field.into()],
        }
    }

    /// Create a composite unique constraint.
    pub fn unique_composite(
        name: impl Into<String>,
        entity: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        ConstraintDef::Unique {
            name: name.into(),
            entity: entity.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a check constraint.
    pub fn check(
        name: impl Into<String>,
        entity: impl Into<String>,
        field: impl Into<String>,
        rule: CheckRule,
    ) -> Self {
        ConstraintDef::Check {
            name: name.into(),
            entity: entity.into(),
            field: field.into(),
            rule,
        }
    }

    /// Get the constraint name.
    pub fn name(&self) -> &str {
        match self {
            ConstraintDef::Unique { name, .. } => name,
            ConstraintDef::Check { name, .. } => name,
        }
    }

    /// Get the entity this constraint applies to.
    pub fn entity(&self) -> &str {
        match self {
            ConstraintDef::Unique { entity, .. } => entity,
            ConstraintDef::Check { entity, .. } => entity,
        }
    }

    /// Fields the constraint reads.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ConstraintDef::Unique { fields, .. } => fields.iter().map(String::as_str).collect(),
            ConstraintDef::Check { field, .. } => vec![field.as_str()],
        }
    }

    /// Check if this is a unique constraint.
    pub fn is_unique(&self) -> bool {
        matches!(self, ConstraintDef::Unique { .. })
    }

    /// Check if this is a check constraint.
    pub fn is_check(&self) -> bool {
        matches!(self, ConstraintDef::Check { .. })
    }
}
