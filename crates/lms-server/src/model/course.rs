use chrono::{DateTime, Utc};
use lms_proto::{EntityId, EntityRow, FieldValue};
use serde::{Deserialize, Serialize};

use super::{
    parse_enum, row_created, row_updated, Assignment, CourseStatus, Entity, Lesson, NewEntity,
};
use crate::error::Error;
use crate::registry::entities;

/// A course owned by one teacher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: EntityId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub status: CourseStatus,
    pub teacher_id: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a new course.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub category: String,
    pub status: CourseStatus,
    pub teacher_id: EntityId,
}

/// A course with its lessons (in order) and assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetailDto {
    #[serde(flatten)]
    pub course: Course,
    pub lessons: Vec<Lesson>,
    pub assignments: Vec<Assignment>,
}

impl NewCourse {
    /// Draft course with an empty description.
    pub fn draft(title: impl Into<String>, category: impl Into<String>, teacher_id: EntityId) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            category: category.into(),
            status: CourseStatus::Draft,
            teacher_id,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the status.
    pub fn with_status(mut self, status: CourseStatus) -> Self {
        self.status = status;
        self
    }
}

impl Entity for Course {
    const NAME: &'static str = entities::COURSE;

    fn id(&self) -> EntityId {
        self.id
    }

    fn from_row(row: &EntityRow) -> Result<Self, Error> {
        Ok(Self {
            id: row.id,
            title: row.string("title")?,
            description: row.string("description")?,
            category: row.string("category")?,
            status: parse_enum(row, "status")?,
            teacher_id: row.int("teacherId")?,
            created_at: row_created(row),
            updated_at: row_updated(row),
        })
    }

    fn to_fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::new("title", self.title.as_str()),
            FieldValue::new("description", self.description.as_str()),
            FieldValue::new("category", self.category.as_str()),
            FieldValue::new("status", self.status),
            FieldValue::new("teacherId", self.teacher_id),
        ]
    }
}

impl NewEntity for NewCourse {
    type Output = Course;

    fn into_fields(self) -> Vec<FieldValue> {
        vec![
            FieldValue::new("title", self.title),
            FieldValue::new("description", self.description),
            FieldValue::new("category", self.category),
            FieldValue::new("status", self.status),
            FieldValue::new("teacherId", self.teacher_id),
        ]
    }
}
