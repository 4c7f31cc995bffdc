use lms_proto::{EntityId, EntityRow, FieldValue};
use serde::{Deserialize, Serialize};

use super::{Entity, NewEntity};
use crate::error::Error;
use crate::registry::entities;

/// One lesson of a course, positioned by `order_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: EntityId,
    pub course_id: EntityId,
    pub title: String,
    pub order_index: i32,
    pub content: Option<String>,
    pub attachments: Vec<String>,
}

/// Input for a new lesson.
#[derive(Debug, Clone)]
pub struct NewLesson {
    pub course_id: EntityId,
    pub title: String,
    pub order_index: i32,
    pub content: Option<String>,
    pub attachments: Vec<String>,
}

impl NewLesson {
    pub fn new(course_id: EntityId, title: impl Into<String>, order_index: i32) -> Self {
        Self {
            course_id,
            title: title.into(),
            order_index,
            content: None,
            attachments: Vec::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_attachment(mut self, file: impl Into<String>) -> Self {
        self.attachments.push(file.into());
        self
    }
}

impl Entity for Lesson {
    const NAME: &'static str = entities::LESSON;

    fn id(&self) -> EntityId {
        self.id
    }

    fn from_row(row: &EntityRow) -> Result<Self, Error> {
        Ok(Self {
            id: row.id,
            course_id: row.int("courseId")?,
            title: row.string("title")?,
            order_index: row.int("orderIndex")? as i32,
            content: row.opt_string("content")?,
            attachments: row.strings("attachments")?,
        })
    }

    fn to_fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::new("courseId", self.course_id),
            FieldValue::new("title", self.title.as_str()),
            FieldValue::new("orderIndex", self.order_index),
            FieldValue::new("content", self.content.clone()),
            FieldValue::new("attachments", self.attachments.clone()),
        ]
    }
}

impl NewEntity for NewLesson {
    type Output = Lesson;

    fn into_fields(self) -> Vec<FieldValue> {
        vec![
            FieldValue::new("courseId", self.course_id),
            FieldValue::new("title", self.title),
            FieldValue::new("orderIndex", self.order_index),
            FieldValue::new("content", self.content),
            FieldValue::new("attachments", self.attachments),
        ]
    }
}
