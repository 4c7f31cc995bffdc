//! Constraint validation logic.
//!
//! The ConstraintValidator checks a write against the schema (types,
//! required fields, check rules, foreign keys, target rules, unique keys) and
//! queues the matching index maintenance into the write's transaction.

use std::collections::HashSet;

use crate::catalog::{ConstraintDef, DeleteBehavior, EntityDef, FieldType, ScalarType, SchemaBundle};
use crate::codec::get_field;
use crate::error::{ConstraintError, Error};
use crate::storage::{RowKey, StoreRead, Transaction};
use lms_proto::{EntityId, FieldValue, Value};

use super::{OrderedIndex, ReferenceIndex, UniqueIndex};

static NULL: Value = Value::Null;

/// Whether check rules run for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckMode {
    /// Evaluate check rules.
    #[default]
    Enforce,
    /// Skip check rules (fixture data). Types, references and uniqueness still apply.
    Skip,
}

/// Constraint validator for one schema snapshot.
pub struct ConstraintValidator<'a> {
    schema: &'a SchemaBundle,
}

impl<'a> ConstraintValidator<'a> {
    /// Create a validator over a schema.
    pub fn new(schema: &'a SchemaBundle) -> Self {
        Self { schema }
    }

    /// Look up an entity definition.
    pub fn entity(&self, name: &str) -> Result<&'a EntityDef, Error> {
        self.schema
            .get_entity(name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    /// Validate a new row and return it normalized in declaration order.
    pub fn validate_insert(
        &self,
        reader: &impl StoreRead,
        entity: &str,
        id: EntityId,
        data: &[FieldValue],
        mode: CheckMode,
    ) -> Result<Vec<(String, Value)>, Error> {
        let def = self.entity(entity)?;
        let row = normalize(def, &[], data)?;
        let all: HashSet<&str> = def.fields.iter().map(|f| f.name.as_str()).collect();

        self.check_row(reader, def, id, &row, &all, mode)?;
        Ok(row)
    }

    /// Validate changes to an existing row and return the merged row.
    ///
    /// Rules, references and unique keys are re-checked only for fields whose
    /// value changes.
    pub fn validate_update(
        &self,
        reader: &impl StoreRead,
        entity: &str,
        id: EntityId,
        before: &[(String, Value)],
        changes: &[FieldValue],
        mode: CheckMode,
    ) -> Result<Vec<(String, Value)>, Error> {
        let def = self.entity(entity)?;
        let row = normalize(def, before, changes)?;
        {
            let changed: HashSet<&str> = row
                .iter()
                .filter(|(name, value)| value_of(before, name) != value)
                .map(|(name, _)| name.as_str())
                .collect();
            self.check_row(reader, def, id, &row, &changed, mode)?;
        }
        Ok(row)
    }

    /// Check that no RESTRICT relation still references the row.
    ///
    /// Dependents listed in `planned` are being deleted by the same operation
    /// and do not block.
    pub fn validate_delete(
        &self,
        reader: &impl StoreRead,
        entity: &str,
        id: EntityId,
        planned: &HashSet<RowKey>,
    ) -> Result<(), Error> {
        self.entity(entity)?;

        for relation in self.schema.relations_to(entity) {
            if relation.on_delete != DeleteBehavior::Restrict {
                continue;
            }
            let count = ReferenceIndex::dependents(reader, &relation.name, id)?
                .into_iter()
                .filter(|child| !planned.contains(&RowKey::new(relation.from_entity.as_str(), *child)))
                .count();
            if count > 0 {
                return Err(ConstraintError::RestrictViolation {
                    constraint: relation.name.clone(),
                    entity: entity.to_string(),
                    referencing_entity: relation.from_entity.clone(),
                    count,
                }
                .into());
            }
        }

        Ok(())
    }

    /// Queue unique claims, reference links and ordered entries for a row.
    pub fn index_row(
        &self,
        tx: &mut Transaction<'_>,
        entity: &str,
        id: EntityId,
        row: &[(String, Value)],
    ) {
        for constraint in self.schema.constraints_for(entity) {
            if let ConstraintDef::Unique { name, fields, .. } = constraint {
                let values = values_of(row, fields);
                if values.iter().all(|v| !v.is_null()) {
                    UniqueIndex::new(entity, name, fields).claim(tx, &values, id);
                }
            }
        }
        for relation in self.schema.relations_from(entity) {
            if let Some(parent) = value_of(row, &relation.from_field).as_i64() {
                ReferenceIndex::link(tx, &relation.name, parent, id);
            }
        }
        for index in self.schema.indexes_for(entity) {
            OrderedIndex::new(index).insert(tx, row, id);
        }
    }

    /// Queue removal of everything [`index_row`](Self::index_row) wrote.
    pub fn unindex_row(
        &self,
        tx: &mut Transaction<'_>,
        entity: &str,
        id: EntityId,
        row: &[(String, Value)],
    ) {
        for constraint in self.schema.constraints_for(entity) {
            if let ConstraintDef::Unique { name, fields, .. } = constraint {
                let values = values_of(row, fields);
                if values.iter().all(|v| !v.is_null()) {
                    UniqueIndex::new(entity, name, fields).release(tx, &values);
                }
            }
        }
        for relation in self.schema.relations_from(entity) {
            if let Some(parent) = value_of(row, &relation.from_field).as_i64() {
                ReferenceIndex::unlink(tx, &relation.name, parent, id);
            }
        }
        for index in self.schema.indexes_for(entity) {
            OrderedIndex::new(index).remove(tx, row, id);
        }
    }

    fn check_row(
        &self,
        reader: &impl StoreRead,
        def: &EntityDef,
        id: EntityId,
        row: &[(String, Value)],
        touched: &HashSet<&str>,
        mode: CheckMode,
    ) -> Result<(), Error> {
        let constraints = self.schema.constraints_for(&def.name);

        if mode == CheckMode::Enforce {
            for constraint in &constraints {
                if let ConstraintDef::Check {
                    name, field, rule, ..
                } = constraint
                {
                    if !touched.contains(field.as_str()) {
                        continue;
                    }
                    rule.check(value_of(row, field)).map_err(|message| {
                        ConstraintError::CheckViolation {
                            constraint: name.clone(),
                            entity: def.name.clone(),
                            field: field.clone(),
                            message,
                        }
                    })?;
                }
            }
        }

        for relation in self.schema.relations_from(&def.name) {
            if !touched.contains(relation.from_field.as_str()) {
                continue;
            }
            let Some(parent_id) = value_of(row, &relation.from_field).as_i64() else {
                continue;
            };
            let parent = reader
                .read_row(&relation.to_entity, parent_id)?
                .ok_or_else(|| ConstraintError::ForeignKeyViolation {
                    constraint: relation.name.clone(),
                    entity: def.name.clone(),
                    field: relation.from_field.clone(),
                    referenced_entity: relation.to_entity.clone(),
                    id: parent_id,
                })?;

            if let Some(rule) = &relation.target_rule {
                let actual = get_field(&parent.data, &rule.field)?.unwrap_or(Value::Null);
                let accepted = actual.as_str().is_some_and(|s| rule.allows(s));
                if !accepted {
                    return Err(ConstraintError::TargetRuleViolation {
                        constraint: relation.name.clone(),
                        entity: def.name.clone(),
                        field: relation.from_field.clone(),
                        referenced_entity: relation.to_entity.clone(),
                        rule_field: rule.field.clone(),
                        allowed: rule.allowed.clone(),
                        actual: actual.to_string(),
                    }
                    .into());
                }
            }
        }

        // A parent may not leave the set its existing dependents require.
        for relation in self.schema.relations_to(&def.name) {
            let Some(rule) = &relation.target_rule else {
                continue;
            };
            if !touched.contains(rule.field.as_str()) {
                continue;
            }
            let value = value_of(row, &rule.field);
            if value.as_str().is_some_and(|s| rule.allows(s)) {
                continue;
            }
            if ReferenceIndex::count(reader, &relation.name, id)? > 0 {
                return Err(ConstraintError::TargetRuleViolation {
                    constraint: relation.name.clone(),
                    entity: relation.from_entity.clone(),
                    field: relation.from_field.clone(),
                    referenced_entity: def.name.clone(),
                    rule_field: rule.field.clone(),
                    allowed: rule.allowed.clone(),
                    actual: value.to_string(),
                }
                .into());
            }
        }

        for constraint in &constraints {
            if let ConstraintDef::Unique { name, fields, .. } = constraint {
                if !fields.iter().any(|f| touched.contains(f.as_str())) {
                    continue;
                }
                let values = values_of(row, fields);
                if values.iter().any(|v| v.is_null()) {
                    continue;
                }
                let index = UniqueIndex::new(&def.name, name, fields);
                if !index.check_unique(reader, &values, Some(id))? {
                    return Err(index.violation(&values).into());
                }
            }
        }

        Ok(())
    }
}

fn value_of<'r>(row: &'r [(String, Value)], field: &str) -> &'r Value {
    row.iter()
        .find(|(name, _)| name == field)
        .map(|(_, v)| v)
        .unwrap_or(&NULL)
}

fn values_of<'r>(row: &'r [(String, Value)], fields: &[String]) -> Vec<&'r Value> {
    fields.iter().map(|f| value_of(row, f)).collect()
}

/// Merge `changes` over `base` and type-check the result in declaration order.
fn normalize(
    def: &EntityDef,
    base: &[(String, Value)],
    changes: &[FieldValue],
) -> Result<Vec<(String, Value)>, Error> {
    for change in changes {
        if def.get_field(&change.field).is_none() {
            return Err(ConstraintError::UnknownField {
                entity: def.name.clone(),
                field: change.field.clone(),
            }
            .into());
        }
    }

    let mut row = Vec::with_capacity(def.fields.len());
    for field in &def.fields {
        let value = match changes.iter().rev().find(|c| c.field == field.name) {
            Some(change) => change.value.clone(),
            None => match base.iter().find(|(name, _)| *name == field.name) {
                Some((_, value)) => value.clone(),
                None if matches!(field.field_type, FieldType::ArrayScalar(_)) => {
                    Value::StringArray(Vec::new())
                }
                None => Value::Null,
            },
        };

        if value.is_null() {
            if field.required {
                return Err(ConstraintError::MissingField {
                    entity: def.name.clone(),
                    field: field.name.clone(),
                }
                .into());
            }
            row.push((field.name.clone(), value));
            continue;
        }

        if !field.field_type.accepts(&value) {
            return Err(ConstraintError::TypeMismatch {
                entity: def.name.clone(),
                field: field.name.clone(),
                expected: field.field_type.describe(),
                actual: value.type_name().to_string(),
            }
            .into());
        }

        if let (Some(variants), Some(s)) = (field.field_type.variants(), value.as_str()) {
            if !variants.iter().any(|v| v == s) {
                return Err(ConstraintError::InvalidEnumValue {
                    entity: def.name.clone(),
                    field: field.name.clone(),
                    value: s.to_string(),
                }
                .into());
            }
        }

        row.push((field.name.clone(), widen(&field.field_type, value)));
    }

    Ok(row)
}

/// Store integers at the declared width.
fn widen(field_type: &FieldType, value: Value) -> Value {
    let scalar = match field_type {
        FieldType::Scalar(s) | FieldType::OptionalScalar(s) => *s,
        _ => return value,
    };
    match (scalar, value) {
        (ScalarType::Int64, Value::Int32(i)) => Value::Int64(i64::from(i)),
        (ScalarType::Float64, Value::Int32(i)) => Value::Float64(f64::from(i)),
        (ScalarType::Float64, Value::Int64(i)) => Value::Float64(i as f64),
        (_, value) => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CheckRule, FieldDef, IndexDef, RelationDef, TargetRule};
    use crate::codec::encode_entity;
    use crate::storage::{Record, StorageConfig, StorageEngine};

    fn schema() -> SchemaBundle {
        let user = EntityDef::new("User")
            .with_field(FieldDef::scalar("email", ScalarType::String))
            .with_field(FieldDef::new(
                "role",
                FieldType::enum_type("Role", &["ADMIN", "TEACHER", "STUDENT"]),
            ));
        let course = EntityDef::new("Course")
            .with_field(FieldDef::scalar("title", ScalarType::String))
            .with_field(FieldDef::scalar("teacherId", ScalarType::Int64).with_index());
        let lesson = EntityDef::new("Lesson")
            .with_field(FieldDef::scalar("courseId", ScalarType::Int64).with_index())
            .with_field(FieldDef::scalar("orderIndex", ScalarType::Int32))
            .with_field(FieldDef::new(
                "attachments",
                FieldType::array_scalar(ScalarType::String),
            ))
            .with_field(FieldDef::optional_scalar("weight", ScalarType::Float64));

        SchemaBundle::new(1)
            .with_entity(user)
            .with_entity(course)
            .with_entity(lesson)
            .with_relation(
                RelationDef::new("course_teacher", "Course", "teacherId", "User")
                    .with_target_rule(TargetRule::new("role", &["TEACHER", "ADMIN"])),
            )
            .with_relation(RelationDef::new("lesson_course", "Lesson", "courseId", "Course").cascade())
            .with_constraint(ConstraintDef::unique("user_email", "User", "email"))
            .with_constraint(ConstraintDef::check("user_email_format", "User", "email", CheckRule::Email))
            .with_constraint(ConstraintDef::check("course_title", "Course", "title", CheckRule::NonEmpty))
            .with_index(IndexDef::new("lesson_order", "Lesson", ["courseId", "orderIndex"]))
    }

    fn setup_test_env() -> (StorageEngine, SchemaBundle) {
        (
            StorageEngine::open(StorageConfig::temporary()).unwrap(),
            schema(),
        )
    }

    fn user(email: &str, role: &str) -> Vec<FieldValue> {
        vec![FieldValue::new("email", email), FieldValue::new("role", role)]
    }

    fn insert(
        engine: &StorageEngine,
        schema: &SchemaBundle,
        entity: &str,
        data: Vec<FieldValue>,
    ) -> Result<EntityId, Error> {
        let validator = ConstraintValidator::new(schema);
        let mut tx = engine.transaction();
        let id = tx.allocate_id(entity)?;
        let row = validator.validate_insert(&tx, entity, id, &data, CheckMode::Enforce)?;
        validator.index_row(&mut tx, entity, id, &row);
        tx.put(entity, id, Record::new(encode_entity(&row)?));
        tx.commit()?;
        Ok(id)
    }

    #[test]
    fn test_insert_normalizes_row() {
        let (engine, schema) = setup_test_env();
        let teacher = insert(&engine, &schema, "User", user("t@x.com", "TEACHER")).unwrap();
        let course = insert(
            &engine,
            &schema,
            "Course",
            vec![FieldValue::new("title", "Rust"), FieldValue::new("teacherId", teacher)],
        )
        .unwrap();

        let validator = ConstraintValidator::new(&schema);
        let row = validator
            .validate_insert(
                &engine,
                "Lesson",
                1,
                &[
                    FieldValue::new("orderIndex", 0),
                    FieldValue::new("courseId", Value::Int32(course as i32)),
                    FieldValue::new("weight", 2),
                ],
                CheckMode::Enforce,
            )
            .unwrap();

        assert_eq!(
            row,
            vec![
                ("courseId".to_string(), Value::Int64(course)),
                ("orderIndex".to_string(), Value::Int32(0)),
                ("attachments".to_string(), Value::StringArray(vec![])),
                ("weight".to_string(), Value::Float64(2.0)),
            ]
        );
    }

    #[test]
    fn test_shape_errors() {
        let (engine, schema) = setup_test_env();
        let validator = ConstraintValidator::new(&schema);

        let missing = validator.validate_insert(
            &engine,
            "User",
            1,
            &[FieldValue::new("email", "a@x.com")],
            CheckMode::Enforce,
        );
        assert!(matches!(
            missing,
            Err(Error::ConstraintViolation(ConstraintError::MissingField { ref field, .. })) if field == "role"
        ));

        let unknown = validator.validate_insert(
            &engine,
            "User",
            1,
            &[FieldValue::new("nickname", "x")],
            CheckMode::Enforce,
        );
        assert!(matches!(
            unknown,
            Err(Error::ConstraintViolation(ConstraintError::UnknownField { .. }))
        ));

        let mismatch = validator.validate_insert(
            &engine,
            "User",
            1,
            &[FieldValue::new("email", 5i64), FieldValue::new("role", "ADMIN")],
            CheckMode::Enforce,
        );
        assert!(matches!(
            mismatch,
            Err(Error::ConstraintViolation(ConstraintError::TypeMismatch { .. }))
        ));

        let bad_enum = validator.validate_insert(&engine, "User", 1, &user("a@x.com", "JANITOR"), CheckMode::Enforce);
        assert!(matches!(
            bad_enum,
            Err(Error::ConstraintViolation(ConstraintError::InvalidEnumValue { .. }))
        ));

        assert!(matches!(
            validator.validate_insert(&engine, "Room", 1, &[], CheckMode::Enforce),
            Err(Error::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_check_rules_and_skip_mode() {
        let (engine, schema) = setup_test_env();
        let validator = ConstraintValidator::new(&schema);

        let enforced = validator.validate_insert(&engine, "User", 1, &user("admin", "ADMIN"), CheckMode::Enforce);
        assert!(matches!(
            enforced,
            Err(Error::ConstraintViolation(ConstraintError::CheckViolation { .. }))
        ));

        let skipped = validator.validate_insert(&engine, "User", 1, &user("admin", "ADMIN"), CheckMode::Skip);
        assert!(skipped.is_ok());
    }

    #[test]
    fn test_foreign_key_and_target_rule() {
        let (engine, schema) = setup_test_env();
        let student = insert(&engine, &schema, "User", user("s@x.com", "STUDENT")).unwrap();

        let missing_parent = insert(
            &engine,
            &schema,
            "Course",
            vec![FieldValue::new("title", "Rust"), FieldValue::new("teacherId", 99i64)],
        );
        assert!(matches!(
            missing_parent,
            Err(Error::ConstraintViolation(ConstraintError::ForeignKeyViolation { id: 99, .. }))
        ));

        let wrong_role = insert(
            &engine,
            &schema,
            "Course",
            vec![FieldValue::new("title", "Rust"), FieldValue::new("teacherId", student)],
        );
        match wrong_role {
            Err(Error::ConstraintViolation(ConstraintError::TargetRuleViolation { actual, .. })) => {
                assert_eq!(actual, "STUDENT")
            }
            other => panic!("expected TargetRuleViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_parent_update_keeps_target_rule() {
        let (engine, schema) = setup_test_env();
        let teacher = insert(&engine, &schema, "User", user("t@x.com", "TEACHER")).unwrap();
        let idle = insert(&engine, &schema, "User", user("i@x.com", "TEACHER")).unwrap();
        insert(
            &engine,
            &schema,
            "Course",
            vec![FieldValue::new("title", "Rust"), FieldValue::new("teacherId", teacher)],
        )
        .unwrap();

        let validator = ConstraintValidator::new(&schema);
        let before = |email: &str| {
            vec![
                ("email".to_string(), Value::from(email)),
                ("role".to_string(), Value::from("TEACHER")),
            ]
        };

        let demoted = validator.validate_update(
            &engine,
            "User",
            teacher,
            &before("t@x.com"),
            &[FieldValue::new("role", "STUDENT")],
            CheckMode::Enforce,
        );
        match demoted {
            Err(Error::ConstraintViolation(ConstraintError::TargetRuleViolation {
                entity,
                actual,
                ..
            })) => {
                assert_eq!(entity, "Course");
                assert_eq!(actual, "STUDENT");
            }
            other => panic!("expected TargetRuleViolation, got {:?}", other),
        }

        // Another allowed role is fine, and so is any role without dependents.
        assert!(validator
            .validate_update(
                &engine,
                "User",
                teacher,
                &before("t@x.com"),
                &[FieldValue::new("role", "ADMIN")],
                CheckMode::Enforce,
            )
            .is_ok());
        assert!(validator
            .validate_update(
                &engine,
                "User",
                idle,
                &before("i@x.com"),
                &[FieldValue::new("role", "STUDENT")],
                CheckMode::Enforce,
            )
            .is_ok());
    }

    #[test]
    fn test_unique_insert_and_update() {
        let (engine, schema) = setup_test_env();
        let first = insert(&engine, &schema, "User", user("a@x.com", "STUDENT")).unwrap();
        insert(&engine, &schema, "User", user("b@x.com", "STUDENT")).unwrap();

        let duplicate = insert(&engine, &schema, "User", user("a@x.com", "TEACHER"));
        assert!(matches!(
            duplicate,
            Err(Error::ConstraintViolation(ConstraintError::UniqueViolation { .. }))
        ));

        let validator = ConstraintValidator::new(&schema);
        let before = vec![
            ("email".to_string(), Value::from("a@x.com")),
            ("role".to_string(), Value::from("STUDENT")),
        ];

        // Keeping its own e-mail is fine.
        let same = validator.validate_update(
            &engine,
            "User",
            first,
            &before,
            &[FieldValue::new("role", "TEACHER")],
            CheckMode::Enforce,
        );
        assert!(same.is_ok());

        let taken = validator.validate_update(
            &engine,
            "User",
            first,
            &before,
            &[FieldValue::new("email", "b@x.com")],
            CheckMode::Enforce,
        );
        assert!(matches!(
            taken,
            Err(Error::ConstraintViolation(ConstraintError::UniqueViolation { .. }))
        ));
    }

    #[test]
    fn test_update_skips_checks_on_untouched_fields() {
        let (engine, schema) = setup_test_env();
        let validator = ConstraintValidator::new(&schema);
        let before = vec![
            ("email".to_string(), Value::from("admin")),
            ("role".to_string(), Value::from("ADMIN")),
        ];

        let result = validator.validate_update(
            &engine,
            "User",
            1,
            &before,
            &[FieldValue::new("role", "ADMIN")],
            CheckMode::Enforce,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_delete_restrict_and_planned() {
        let (engine, schema) = setup_test_env();
        let teacher = insert(&engine, &schema, "User", user("t@x.com", "TEACHER")).unwrap();
        let course = insert(
            &engine,
            &schema,
            "Course",
            vec![FieldValue::new("title", "Rust"), FieldValue::new("teacherId", teacher)],
        )
        .unwrap();

        let validator = ConstraintValidator::new(&schema);
        let err = validator
            .validate_delete(&engine, "User", teacher, &HashSet::new())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ConstraintViolation(ConstraintError::RestrictViolation { count: 1, .. })
        ));

        let planned: HashSet<RowKey> = [RowKey::new("Course", course)].into_iter().collect();
        assert!(validator
            .validate_delete(&engine, "User", teacher, &planned)
            .is_ok());

        // Cascade relations never block.
        assert!(validator
            .validate_delete(&engine, "Course", course, &HashSet::new())
            .is_ok());
    }

    #[test]
    fn test_unindex_row_releases_everything() {
        let (engine, schema) = setup_test_env();
        let id = insert(&engine, &schema, "User", user("a@x.com", "TEACHER")).unwrap();
        let validator = ConstraintValidator::new(&schema);
        let row = vec![
            ("email".to_string(), Value::from("a@x.com")),
            ("role".to_string(), Value::from("TEACHER")),
        ];

        let mut tx = engine.transaction();
        validator.unindex_row(&mut tx, "User", id, &row);
        tx.remove("User", id);
        tx.commit().unwrap();

        assert!(insert(&engine, &schema, "User", user("a@x.com", "TEACHER")).is_ok());
    }
}
