use chrono::{DateTime, Utc};
use lms_proto::{EntityId, EntityRow, FieldValue};
use serde::{Deserialize, Serialize};

use super::{from_micros, opt_timestamp_value, Entity, NewEntity};
use crate::error::Error;
use crate::registry::entities;

/// Graded work attached to a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: EntityId,
    pub course_id: EntityId,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub max_score: i32,
    pub attachments: Vec<String>,
}

/// Input for a new assignment.
#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub course_id: EntityId,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub max_score: i32,
    pub attachments: Vec<String>,
}

impl NewAssignment {
    pub fn new(course_id: EntityId, title: impl Into<String>, max_score: i32) -> Self {
        Self {
            course_id,
            title: title.into(),
            description: None,
            due_date: None,
            max_score,
            attachments: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn due(mut self, at: DateTime<Utc>) -> Self {
        self.due_date = Some(at);
        self
    }
}

impl Entity for Assignment {
    const NAME: &'static str = entities::ASSIGNMENT;

    fn id(&self) -> EntityId {
        self.id
    }

    fn from_row(row: &EntityRow) -> Result<Self, Error> {
        Ok(Self {
            id: row.id,
            course_id: row.int("courseId")?,
            title: row.string("title")?,
            description: row.opt_string("description")?,
            due_date: row.opt_timestamp("dueDate")?.map(from_micros),
            max_score: row.int("maxScore")? as i32,
            attachments: row.strings("attachments")?,
        })
    }

    fn to_fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::new("courseId", self.course_id),
            FieldValue::new("title", self.title.as_str()),
            FieldValue::new("description", self.description.clone()),
            FieldValue::new("dueDate", opt_timestamp_value(self.due_date)),
            FieldValue::new("maxScore", self.max_score),
            FieldValue::new("attachments", self.attachments.clone()),
        ]
    }
}

impl NewEntity for NewAssignment {
    type Output = Assignment;

    fn into_fields(self) -> Vec<FieldValue> {
        vec![
            FieldValue::new("courseId", self.course_id),
            FieldValue::new("title", self.title),
            FieldValue::new("description", self.description),
            FieldValue::new("dueDate", opt_timestamp_value(self.due_date)),
            FieldValue::new("maxScore", self.max_score),
            FieldValue::new("attachments", self.attachments),
        ]
    }
}
