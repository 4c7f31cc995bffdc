//! Persistence gateway.
//!
//! [`PersistenceGateway`] is the seam the outer layers program against.
//! [`Gateway`] implements it over the sled-backed [`Database`]: reads go
//! straight to storage, writes go through the [`MutationExecutor`] so each
//! call is validated and committed as one transaction. [`AsyncGateway`] runs
//! the same operations on tokio's blocking pool.

use std::cmp::Ordering;
use std::sync::Arc;

use lms_core::catalog::OrderDirection;
use lms_core::{decode_entity, encode_sort_key, OrderedIndex, Record, ReferenceIndex, UniqueIndex};
use lms_proto::{EntityId, EntityRow, FieldValue, Mutation, MutationBatch, MutationResult, Value};

use crate::config::ServerConfig;
use crate::database::{Database, SharedDatabase};
use crate::error::Error;
use crate::model::{
    Assignment, Course, CourseDetailDto, Enrollment, Entity, Grade, Lesson, NewCourse,
    NewEnrollment, NewEntity, NewLesson, Submission, User,
};
use crate::mutation::MutationExecutor;
use crate::registry::{entities, LESSON_ORDER_INDEX, USER_EMAIL_UNIQUE};

/// Create, read, update, delete and list operations over entity rows.
pub trait PersistenceGateway {
    /// Insert a row and return its allocated id.
    fn create(&self, entity: &str, fields: Vec<FieldValue>) -> Result<EntityId, Error>;

    /// Fetch one row.
    fn get(&self, entity: &str, id: EntityId) -> Result<EntityRow, Error>;

    /// Change fields of a row and return the updated row.
    fn update(&self, entity: &str, id: EntityId, fields: Vec<FieldValue>)
        -> Result<EntityRow, Error>;

    /// Delete a row and everything that cascades from it.
    fn delete(&self, entity: &str, id: EntityId) -> Result<MutationResult, Error>;

    /// List all rows of an entity in its default order (id order otherwise).
    fn list(&self, entity: &str) -> Result<Vec<EntityRow>, Error>;

    /// List rows through an ordered index, filtered by leading field values.
    fn list_by_index(&self, index: &str, prefix: &[Value]) -> Result<Vec<EntityRow>, Error>;
}

/// Sled-backed gateway.
#[derive(Clone)]
pub struct Gateway {
    database: SharedDatabase,
}

impl Gateway {
    /// Wrap an open database.
    pub fn new(database: SharedDatabase) -> Self {
        Self { database }
    }

    /// Open the database described by `config`.
    pub fn open(config: &ServerConfig) -> Result<Self, Error> {
        Ok(Self::new(Arc::new(Database::open(config)?)))
    }

    /// Open a throwaway database.
    pub fn open_temporary() -> Result<Self, Error> {
        Ok(Self::new(Arc::new(Database::open_temporary()?)))
    }

    /// The underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Executor for custom transactional writes.
    pub fn executor(&self) -> MutationExecutor<'_> {
        MutationExecutor::new(&self.database)
    }

    /// Apply several mutations atomically.
    pub fn execute_batch(&self, batch: &MutationBatch) -> Result<MutationResult, Error> {
        self.executor().execute_batch(batch)
    }

    /// Insert a typed entity.
    pub fn insert<N: NewEntity>(&self, new: N) -> Result<N::Output, Error> {
        let id = self.create(<N::Output as Entity>::NAME, new.into_fields())?;
        self.fetch(id)
    }

    /// Fetch a typed entity.
    pub fn fetch<T: Entity>(&self, id: EntityId) -> Result<T, Error> {
        T::from_row(&self.get(T::NAME, id)?)
    }

    /// Fetch all rows of a typed entity.
    pub fn fetch_all<T: Entity>(&self) -> Result<Vec<T>, Error> {
        self.list(T::NAME)?.iter().map(T::from_row).collect()
    }

    /// Write back every field of a typed entity.
    pub fn save<T: Entity>(&self, entity: &T) -> Result<T, Error> {
        let row = self.update(T::NAME, entity.id(), entity.to_fields())?;
        T::from_row(&row)
    }

    /// Delete a typed entity.
    pub fn remove<T: Entity>(&self, id: EntityId) -> Result<MutationResult, Error> {
        self.delete(T::NAME, id)
    }

    /// Rows of `T` referencing `parent` through `relation`, in id order.
    pub fn children<T: Entity>(&self, relation: &str, parent: EntityId) -> Result<Vec<T>, Error> {
        ReferenceIndex::dependents(self.database.storage(), relation, parent)?
            .into_iter()
            .map(|id| self.fetch(id))
            .collect()
    }

    /// Look up a user by e-mail address.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let fields = ["email".to_string()];
        let email = Value::from(email);
        let owner = UniqueIndex::new(entities::USER, USER_EMAIL_UNIQUE, &fields)
            .lookup(self.database.storage(), &[&email])?;
        owner.map(|id| self.fetch(id)).transpose()
    }

    /// Lessons of a course ordered by `orderIndex`.
    pub fn lessons_for_course(&self, course_id: EntityId) -> Result<Vec<Lesson>, Error> {
        self.list_by_index(LESSON_ORDER_INDEX, &[Value::Int64(course_id)])?
            .iter()
            .map(Lesson::from_row)
            .collect()
    }

    /// Assignments of a course.
    pub fn assignments_for_course(&self, course_id: EntityId) -> Result<Vec<Assignment>, Error> {
        self.children("assignment_course", course_id)
    }

    /// Submissions for an assignment.
    pub fn submissions_for_assignment(
        &self,
        assignment_id: EntityId,
    ) -> Result<Vec<Submission>, Error> {
        self.children("submission_assignment", assignment_id)
    }

    /// Enrollments of a student.
    pub fn enrollments_for_student(&self, student_id: EntityId) -> Result<Vec<Enrollment>, Error> {
        self.children("enrollment_student", student_id)
    }

    /// Courses taught by a user.
    pub fn courses_for_teacher(&self, teacher_id: EntityId) -> Result<Vec<Course>, Error> {
        self.children("course_teacher", teacher_id)
    }

    /// Enroll a student in a course.
    pub fn enroll(&self, student_id: EntityId, course_id: EntityId) -> Result<Enrollment, Error> {
        self.insert(NewEnrollment::new(student_id, course_id))
    }

    /// Record a grade on a submission.
    pub fn grade_submission(&self, submission_id: EntityId, grade: Grade) -> Result<Submission, Error> {
        let row = self.update(entities::SUBMISSION, submission_id, grade.into_fields())?;
        Submission::from_row(&row)
    }

    /// A course with its ordered lessons and its assignments.
    pub fn course_detail(&self, course_id: EntityId) -> Result<CourseDetailDto, Error> {
        Ok(CourseDetailDto {
            course: self.fetch(course_id)?,
            lessons: self.lessons_for_course(course_id)?,
            assignments: self.assignments_for_course(course_id)?,
        })
    }

    /// Create a course and its lessons in one transaction.
    ///
    /// Each lesson's `course_id` is replaced with the new course's id.
    pub fn create_course_with_lessons(
        &self,
        course: NewCourse,
        lessons: Vec<NewLesson>,
    ) -> Result<CourseDetailDto, Error> {
        let course_id = self.executor().run(|ctx| {
            let course_id = ctx.insert(entities::COURSE, None, &course.into_fields())?;
            for mut lesson in lessons {
                lesson.course_id = course_id;
                ctx.insert(entities::LESSON, None, &lesson.into_fields())?;
            }
            Ok(course_id)
        })?;
        self.course_detail(course_id)
    }

    /// Row counts per entity.
    pub fn stats(&self) -> Result<Vec<(&'static str, usize)>, Error> {
        let mut counts = Vec::with_capacity(entities::ALL.len());
        for entity in entities::ALL {
            counts.push((entity, self.database.storage().count_entity(entity)?));
        }
        Ok(counts)
    }

    fn row(&self, entity: &str, id: EntityId, record: Record) -> Result<EntityRow, Error> {
        Ok(EntityRow {
            entity: entity.to_string(),
            id,
            fields: decode_entity(&record.data)?,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    fn require_entity(&self, entity: &str) -> Result<&lms_core::EntityDef, Error> {
        self.database
            .schema()
            .get_entity(entity)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))
    }
}

impl PersistenceGateway for Gateway {
    fn create(&self, entity: &str, fields: Vec<FieldValue>) -> Result<EntityId, Error> {
        let result = self.executor().execute(&Mutation::insert(entity, fields))?;
        result
            .inserted_ids
            .first()
            .copied()
            .ok_or_else(|| Error::Database(format!("insert into {} returned no id", entity)))
    }

    fn get(&self, entity: &str, id: EntityId) -> Result<EntityRow, Error> {
        self.require_entity(entity)?;
        let record = self
            .database
            .storage()
            .get(entity, id)?
            .ok_or_else(|| Error::not_found(entity, id))?;
        self.row(entity, id, record)
    }

    fn update(
        &self,
        entity: &str,
        id: EntityId,
        fields: Vec<FieldValue>,
    ) -> Result<EntityRow, Error> {
        self.executor()
            .execute(&Mutation::update(entity, id, fields))?;
        self.get(entity, id)
    }

    fn delete(&self, entity: &str, id: EntityId) -> Result<MutationResult, Error> {
        self.executor().execute(&Mutation::delete(entity, id))
    }

    fn list(&self, entity: &str) -> Result<Vec<EntityRow>, Error> {
        let def = self.require_entity(entity)?;

        let mut rows = self
            .database
            .storage()
            .scan_entity(entity)
            .map(|entry| {
                let (id, record) = entry?;
                self.row(entity, id, record)
            })
            .collect::<Result<Vec<_>, Error>>()?;

        if !def.default_order.is_empty() {
            rows.sort_by(|a, b| {
                def.default_order
                    .iter()
                    .map(|order| {
                        let ka = encode_sort_key(a.get(&order.field));
                        let kb = encode_sort_key(b.get(&order.field));
                        match order.direction {
                            OrderDirection::Asc => ka.cmp(&kb),
                            OrderDirection::Desc => kb.cmp(&ka),
                        }
                    })
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or_else(|| a.id.cmp(&b.id))
            });
        }

        Ok(rows)
    }

    fn list_by_index(&self, index: &str, prefix: &[Value]) -> Result<Vec<EntityRow>, Error> {
        let def = self
            .database
            .schema()
            .get_index(index)
            .ok_or_else(|| Error::UnknownIndex(index.to_string()))?;

        OrderedIndex::new(def)
            .scan(self.database.storage(), prefix)?
            .into_iter()
            .map(|id| self.get(&def.entity, id))
            .collect()
    }
}

/// Async facade over [`Gateway`].
///
/// Each call runs on the blocking pool as one transaction, so a caller that
/// drops the future sees the write either fully committed or not at all.
#[derive(Clone)]
pub struct AsyncGateway {
    inner: Gateway,
}

impl AsyncGateway {
    pub fn new(inner: Gateway) -> Self {
        Self { inner }
    }

    /// The blocking gateway.
    pub fn blocking(&self) -> &Gateway {
        &self.inner
    }

    async fn run<T, F>(&self, f: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(Gateway) -> Result<T, Error> + Send + 'static,
    {
        let gateway = self.inner.clone();
        tokio::task::spawn_blocking(move || f(gateway))
            .await
            .map_err(|e| Error::Database(format!("blocking task failed: {}", e)))?
    }

    pub async fn create(&self, entity: &str, fields: Vec<FieldValue>) -> Result<EntityId, Error> {
        let entity = entity.to_string();
        self.run(move |g| g.create(&entity, fields)).await
    }

    pub async fn get(&self, entity: &str, id: EntityId) -> Result<EntityRow, Error> {
        let entity = entity.to_string();
        self.run(move |g| g.get(&entity, id)).await
    }

    pub async fn update(
        &self,
        entity: &str,
        id: EntityId,
        fields: Vec<FieldValue>,
    ) -> Result<EntityRow, Error> {
        let entity = entity.to_string();
        self.run(move |g| g.update(&entity, id, fields)).await
    }

    pub async fn delete(&self, entity: &str, id: EntityId) -> Result<MutationResult, Error> {
        let entity = entity.to_string();
        self.run(move |g| g.delete(&entity, id)).await
    }

    pub async fn list(&self, entity: &str) -> Result<Vec<EntityRow>, Error> {
        let entity = entity.to_string();
        self.run(move |g| g.list(&entity)).await
    }

    pub async fn list_by_index(
        &self,
        index: &str,
        prefix: Vec<Value>,
    ) -> Result<Vec<EntityRow>, Error> {
        let index = index.to_string();
        self.run(move |g| g.list_by_index(&index, &prefix)).await
    }

    pub async fn execute_batch(&self, batch: MutationBatch) -> Result<MutationResult, Error> {
        self.run(move |g| g.execute_batch(&batch)).await
    }

    pub async fn insert<N>(&self, new: N) -> Result<N::Output, Error>
    where
        N: NewEntity + Send + 'static,
        N::Output: Send + 'static,
    {
        self.run(move |g| g.insert(new)).await
    }

    pub async fn fetch<T: Entity + Send + 'static>(&self, id: EntityId) -> Result<T, Error> {
        self.run(move |g| g.fetch(id)).await
    }

    pub async fn lessons_for_course(&self, course_id: EntityId) -> Result<Vec<Lesson>, Error> {
        self.run(move |g| g.lessons_for_course(course_id)).await
    }

    pub async fn create_course_with_lessons(
        &self,
        course: NewCourse,
        lessons: Vec<NewLesson>,
    ) -> Result<CourseDetailDto, Error> {
        self.run(move |g| g.create_course_with_lessons(course, lessons))
            .await
    }
}

impl From<Gateway> for AsyncGateway {
    fn from(inner: Gateway) -> Self {
        Self::new(inner)
    }
}
