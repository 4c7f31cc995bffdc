use chrono::{DateTime, Utc};
use lms_proto::{EntityId, EntityRow, FieldValue, Value};
use serde::{Deserialize, Serialize};

use super::{from_micros, opt_timestamp_value, timestamp_value, Entity, NewEntity};
use crate::error::Error;
use crate::registry::entities;

/// A student's answer to an assignment, optionally graded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: EntityId,
    pub assignment_id: EntityId,
    pub student_id: EntityId,
    pub content: Option<String>,
    pub attachments: Vec<String>,
    pub submitted_at: DateTime<Utc>,
    pub score: Option<f64>,
    pub feedback: Option<String>,
    pub graded_by_teacher_id: Option<EntityId>,
    pub graded_at: Option<DateTime<Utc>>,
}

/// Input for a new submission.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub assignment_id: EntityId,
    pub student_id: EntityId,
    pub content: Option<String>,
    pub attachments: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}

/// A grading decision, applied as an update.
#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    pub score: f64,
    pub feedback: Option<String>,
    pub grader_id: EntityId,
    pub graded_at: DateTime<Utc>,
}

impl Submission {
    pub fn is_graded(&self) -> bool {
        self.graded_at.is_some()
    }
}

impl NewSubmission {
    /// Submission stamped with the current time.
    pub fn new(assignment_id: EntityId, student_id: EntityId) -> Self {
        Self {
            assignment_id,
            student_id,
            content: None,
            attachments: Vec::new(),
            submitted_at: Utc::now(),
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

impl Grade {
    /// Grade stamped with the current time.
    pub fn new(score: f64, grader_id: EntityId) -> Self {
        Self {
            score,
            feedback: None,
            grader_id,
            graded_at: Utc::now(),
        }
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    /// Field changes that record this grade on a submission.
    pub fn into_fields(self) -> Vec<FieldValue> {
        vec![
            FieldValue::new("score", self.score),
            FieldValue::new("feedback", self.feedback),
            FieldValue::new("gradedByTeacherId", self.grader_id),
            FieldValue::new("gradedAt", timestamp_value(self.graded_at)),
        ]
    }
}

impl Entity for Submission {
    const NAME: &'static str = entities::SUBMISSION;

    fn id(&self) -> EntityId {
        self.id
    }

    fn from_row(row: &EntityRow) -> Result<Self, Error> {
        Ok(Self {
            id: row.id,
            assignment_id: row.int("assignmentId")?,
            student_id: row.int("studentId")?,
            content: row.opt_string("content")?,
            attachments: row.strings("attachments")?,
            submitted_at: from_micros(row.timestamp("submittedAt")?),
            score: row.opt_float("score")?,
            feedback: row.opt_string("feedback")?,
            graded_by_teacher_id: row.opt_int("gradedByTeacherId")?,
            graded_at: row.opt_timestamp("gradedAt")?.map(from_micros),
        })
    }

    fn to_fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::new("assignmentId", self.assignment_id),
            FieldValue::new("studentId", self.student_id),
            FieldValue::new("content", self.content.clone()),
            FieldValue::new("attachments", self.attachments.clone()),
            FieldValue::new("submittedAt", timestamp_value(self.submitted_at)),
            FieldValue::new("score", self.score),
            FieldValue::new("feedback", self.feedback.clone()),
            FieldValue::new("gradedByTeacherId", self.graded_by_teacher_id),
            FieldValue::new("gradedAt", opt_timestamp_value(self.graded_at)),
        ]
    }
}

impl NewEntity for NewSubmission {
    type Output = Submission;

    fn into_fields(self) -> Vec<FieldValue> {
        vec![
            FieldValue::new("assignmentId", self.assignment_id),
            FieldValue::new("studentId", self.student_id),
            FieldValue::new("content", self.content),
            FieldValue::new("attachments", self.attachments),
            FieldValue::new("submittedAt", timestamp_value(self.submitted_at)),
            FieldValue::new("score", Value::Null),
            FieldValue::new("gradedByTeacherId", Value::Null),
        ]
    }
}
