//! Mutation executor for handling write operations.
//!
//! Every call runs under the database write gate and lands in exactly one
//! storage transaction: validation reads, cascade planning, row writes and
//! index maintenance either all commit or none do.

use tracing::{debug, warn};

use lms_core::{
    decode_entity, encode_entity, CheckMode, ConstraintError, ConstraintValidator, Record,
    Transaction,
};
use lms_proto::{EntityId, FieldValue, Mutation, MutationBatch, MutationResult};

use crate::cascade::CascadeExecutor;
use crate::database::Database;
use crate::error::Error;

/// Executes mutation operations against the database.
pub struct MutationExecutor<'a> {
    database: &'a Database,
    mode: CheckMode,
}

/// Write operations inside one open transaction.
///
/// Reads through the context see earlier writes of the same call.
pub struct WriteContext<'a> {
    database: &'a Database,
    validator: ConstraintValidator<'a>,
    tx: Transaction<'a>,
    mode: CheckMode,
}

impl<'a> MutationExecutor<'a> {
    /// Create a new mutation executor.
    pub fn new(database: &'a Database) -> Self {
        Self {
            database,
            mode: CheckMode::Enforce,
        }
    }

    /// Set whether check rules run (fixture loads skip them).
    pub fn with_check_mode(mut self, mode: CheckMode) -> Self {
        self.mode = mode;
        self
    }

    /// Execute a single mutation.
    pub fn execute(&self, mutation: &Mutation) -> Result<MutationResult, Error> {
        self.run(|ctx| ctx.apply(mutation))
    }

    /// Execute a batch of mutations atomically.
    pub fn execute_batch(&self, batch: &MutationBatch) -> Result<MutationResult, Error> {
        if batch.is_empty() {
            return Ok(MutationResult::affected(0));
        }

        self.run(|ctx| {
            let mut total = MutationResult::default();
            for mutation in &batch.mutations {
                total.merge(ctx.apply(mutation)?);
            }
            Ok(total)
        })
    }

    /// Run `f` in one transaction under the write gate and commit its writes.
    ///
    /// Nothing is written if `f` fails.
    pub fn run<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut WriteContext<'a>) -> Result<T, Error>,
    {
        let _gate = self.database.write_gate();

        let mut ctx = WriteContext {
            database: self.database,
            validator: ConstraintValidator::new(self.database.schema()),
            tx: self.database.storage().transaction(),
            mode: self.mode,
        };

        match f(&mut ctx) {
            Ok(value) => {
                let ops = ctx.tx.operation_count();
                ctx.tx.commit()?;
                debug!(ops, "mutation committed");
                Ok(value)
            }
            Err(e) => {
                ctx.tx.rollback();
                Err(e)
            }
        }
    }
}

impl<'a> WriteContext<'a> {
    /// Apply one mutation.
    pub fn apply(&mut self, mutation: &Mutation) -> Result<MutationResult, Error> {
        match mutation {
            Mutation::Insert { entity, id, data } => {
                self.insert(entity, *id, data).map(MutationResult::inserted)
            }
            Mutation::Update { entity, id, data } => {
                self.update(entity, *id, data)?;
                Ok(MutationResult::affected(1))
            }
            Mutation::Delete { entity, id } => {
                let cascaded = self.delete(entity, *id)?;
                Ok(MutationResult::affected(1).with_cascaded(cascaded))
            }
        }
    }

    /// Insert a row, allocating its id unless one is given.
    pub fn insert(
        &mut self,
        entity: &str,
        id: Option<EntityId>,
        data: &[FieldValue],
    ) -> Result<EntityId, Error> {
        self.validator.entity(entity)?;

        let id = match id {
            Some(id) => {
                if self.tx.exists(entity, id)? {
                    return Err(ConstraintError::UniqueViolation {
                        constraint: format!("{}_pkey", entity.to_lowercase()),
                        entity: entity.to_string(),
                        fields: vec!["id".to_string()],
                        value: id.to_string(),
                    }
                    .into());
                }
                self.tx.advance_sequence(entity, id)?;
                id
            }
            None => self.tx.allocate_id(entity)?,
        };

        let row = self
            .validator
            .validate_insert(&self.tx, entity, id, data, self.mode)?;
        let record = Record::new(encode_entity(&row)?);

        self.tx.put(entity, id, record);
        self.validator.index_row(&mut self.tx, entity, id, &row);
        Ok(id)
    }

    /// Apply field changes to an existing row.
    pub fn update(
        &mut self,
        entity: &str,
        id: EntityId,
        data: &[FieldValue],
    ) -> Result<(), Error> {
        self.validator.entity(entity)?;

        let record = self
            .tx
            .get(entity, id)?
            .ok_or_else(|| Error::not_found(entity, id))?;
        let before = decode_entity(&record.data)?;
        let row = self
            .validator
            .validate_update(&self.tx, entity, id, &before, data, self.mode)?;

        self.validator.unindex_row(&mut self.tx, entity, id, &before);
        self.validator.index_row(&mut self.tx, entity, id, &row);
        self.tx.put(entity, id, record.revise(encode_entity(&row)?));
        Ok(())
    }

    /// Delete a row and everything that cascades from it.
    ///
    /// Returns the cascaded rows as (entity, id).
    pub fn delete(&mut self, entity: &str, id: EntityId) -> Result<Vec<(String, EntityId)>, Error> {
        self.validator.entity(entity)?;

        if !self.tx.exists(entity, id)? {
            return Err(Error::not_found(entity, id));
        }

        let plan = CascadeExecutor::new(self.database.schema())
            .plan_delete(&self.tx, entity, id)
            .inspect_err(|e| warn!(entity, id, error = %e, "delete rejected"))?;

        for key in plan.rows() {
            let Some(record) = self.tx.get(&key.entity, key.id)? else {
                continue;
            };
            let row = decode_entity(&record.data)?;
            self.validator
                .unindex_row(&mut self.tx, &key.entity, key.id, &row);
            self.tx.remove(key.entity.as_str(), key.id);
        }

        Ok(plan.cascaded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lms_proto::Value;

    fn setup_test_db() -> Database {
        Database::open_temporary().unwrap()
    }

    fn user(email: &str, role: &str) -> Vec<FieldValue> {
        vec![
            FieldValue::new("email", email),
            FieldValue::new("passwordHash", "x"),
            FieldValue::new("firstName", "F"),
            FieldValue::new("lastName", "L"),
            FieldValue::new("role", role),
        ]
    }

    fn course(teacher: EntityId) -> Vec<FieldValue> {
        vec![
            FieldValue::new("title", "Rust"),
            FieldValue::new("description", ""),
            FieldValue::new("category", "programming"),
            FieldValue::new("status", "DRAFT"),
            FieldValue::new("teacherId", teacher),
        ]
    }

    #[test]
    fn test_insert() {
        let db = setup_test_db();
        let executor = MutationExecutor::new(&db);

        let result = executor
            .execute(&Mutation::insert("User", user("a@x.com", "TEACHER")))
            .unwrap();
        assert_eq!(result.affected, 1);
        assert_eq!(result.inserted_ids, vec![1]);

        let second = executor
            .execute(&Mutation::insert("User", user("b@x.com", "STUDENT")))
            .unwrap();
        assert_eq!(second.inserted_ids, vec![2]);
    }

    #[test]
    fn test_insert_with_explicit_id() {
        let db = setup_test_db();
        let executor = MutationExecutor::new(&db);

        executor
            .execute(&Mutation::insert_with_id("User", 1, user("a@x.com", "ADMIN")))
            .unwrap();
        let err = executor
            .execute(&Mutation::insert_with_id("User", 1, user("c@x.com", "ADMIN")))
            .unwrap_err();
        assert!(err.is_unique_violation());

        // Allocation continues after the explicit id.
        let next = executor
            .execute(&Mutation::insert("User", user("b@x.com", "STUDENT")))
            .unwrap();
        assert_eq!(next.inserted_ids, vec![2]);
    }

    #[test]
    fn test_update() {
        let db = setup_test_db();
        let executor = MutationExecutor::new(&db);
        executor
            .execute(&Mutation::insert("User", user("a@x.com", "TEACHER")))
            .unwrap();

        executor
            .execute(&Mutation::update(
                "User",
                1,
                vec![FieldValue::new("email", "new@x.com")],
            ))
            .unwrap();

        let record = db.storage().get("User", 1).unwrap().unwrap();
        let row = decode_entity(&record.data).unwrap();
        assert!(row.contains(&("email".to_string(), Value::from("new@x.com"))));

        // The old address is free again.
        executor
            .execute(&Mutation::insert("User", user("a@x.com", "STUDENT")))
            .unwrap();
    }

    #[test]
    fn test_update_missing() {
        let db = setup_test_db();
        let err = MutationExecutor::new(&db)
            .execute(&Mutation::update("User", 9, vec![]))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_nonexistent() {
        let db = setup_test_db();
        let err = MutationExecutor::new(&db)
            .execute(&Mutation::delete("Course", 3))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_unknown_entity() {
        let db = setup_test_db();
        let err = MutationExecutor::new(&db)
            .execute(&Mutation::insert("Invoice", vec![]))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownEntity(name) if name == "Invoice"));
    }

    #[test]
    fn test_batch_is_atomic() {
        let db = setup_test_db();
        let executor = MutationExecutor::new(&db);

        let batch = MutationBatch::from_mutations(vec![
            Mutation::insert("User", user("t@x.com", "TEACHER")),
            Mutation::insert("Course", course(1)),
            Mutation::insert("User", user("t@x.com", "STUDENT")),
        ]);
        let err = executor.execute_batch(&batch).unwrap_err();
        assert!(err.is_unique_violation());

        assert_eq!(db.storage().count_entity("User").unwrap(), 0);
        assert_eq!(db.storage().count_entity("Course").unwrap(), 0);
        assert_eq!(db.storage().current_sequence("User").unwrap(), 0);
    }

    #[test]
    fn test_batch_reads_own_writes() {
        let db = setup_test_db();
        let executor = MutationExecutor::new(&db);

        let batch = MutationBatch::from_mutations(vec![
            Mutation::insert("User", user("t@x.com", "TEACHER")),
            Mutation::insert("Course", course(1)),
        ]);
        let result = executor.execute_batch(&batch).unwrap();
        assert_eq!(result.affected, 2);
        assert_eq!(result.inserted_ids, vec![1, 1]);
    }

    #[test]
    fn test_run_with_generated_ids() {
        let db = setup_test_db();
        let executor = MutationExecutor::new(&db);

        let (teacher, course_id) = executor
            .run(|ctx| {
                let teacher = ctx.insert("User", None, &user("t@x.com", "TEACHER"))?;
                let course_id = ctx.insert("Course", None, &course(teacher))?;
                Ok((teacher, course_id))
            })
            .unwrap();

        assert!(db.storage().exists("User", teacher).unwrap());
        assert!(db.storage().exists("Course", course_id).unwrap());
    }

    #[test]
    fn test_restrict_keeps_rows() {
        let db = setup_test_db();
        let executor = MutationExecutor::new(&db);
        executor
            .execute_batch(&MutationBatch::from_mutations(vec![
                Mutation::insert("User", user("t@x.com", "TEACHER")),
                Mutation::insert("Course", course(1)),
            ]))
            .unwrap();

        let err = executor.execute(&Mutation::delete("User", 1)).unwrap_err();
        assert!(err.is_referential());
        assert!(db.storage().exists("User", 1).unwrap());
        assert!(db.storage().exists("Course", 1).unwrap());
    }

    #[test]
    fn test_skip_mode_bypasses_checks() {
        let db = setup_test_db();

        let err = MutationExecutor::new(&db)
            .execute(&Mutation::insert("User", user("not-an-email", "ADMIN")))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        MutationExecutor::new(&db)
            .with_check_mode(CheckMode::Skip)
            .execute(&Mutation::insert("User", user("not-an-email", "ADMIN")))
            .unwrap();
    }
}
