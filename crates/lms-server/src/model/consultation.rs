use chrono::{DateTime, Utc};
use lms_proto::{EntityId, EntityRow, FieldValue};
use serde::{Deserialize, Serialize};

use super::{from_micros, parse_enum, timestamp_value, ConsultationStatus, Entity, NewEntity};
use crate::error::Error;
use crate::registry::entities;

/// A scheduled meeting between a teacher and a student about a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consultation {
    pub id: EntityId,
    pub teacher_id: EntityId,
    pub student_id: EntityId,
    pub course_id: EntityId,
    pub scheduled_at: DateTime<Utc>,
    pub topic: String,
    pub status: ConsultationStatus,
}

/// Input for a new consultation.
#[derive(Debug, Clone)]
pub struct NewConsultation {
    pub teacher_id: EntityId,
    pub student_id: EntityId,
    pub course_id: EntityId,
    pub scheduled_at: DateTime<Utc>,
    pub topic: String,
    pub status: ConsultationStatus,
}

impl NewConsultation {
    /// A scheduled consultation.
    pub fn new(
        teacher_id: EntityId,
        student_id: EntityId,
        course_id: EntityId,
        scheduled_at: DateTime<Utc>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            teacher_id,
            student_id,
            course_id,
            scheduled_at,
            topic: topic.into(),
            status: ConsultationStatus::Scheduled,
        }
    }
}

impl Entity for Consultation {
    const NAME: &'static str = entities::CONSULTATION;

    fn id(&self) -> EntityId {
        self.id
    }

    fn from_row(row: &EntityRow) -> Result<Self, Error> {
        Ok(Self {
            id: row.id,
            teacher_id: row.int("teacherId")?,
            student_id: row.int("studentId")?,
            course_id: row.int("courseId")?,
            scheduled_at: from_micros(row.timestamp("scheduledAt")?),
            topic: row.string("topic")?,
            status: parse_enum(row, "status")?,
        })
    }

    fn to_fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::new("teacherId", self.teacher_id),
            FieldValue::new("studentId", self.student_id),
            FieldValue::new("courseId", self.course_id),
            FieldValue::new("scheduledAt", timestamp_value(self.scheduled_at)),
            FieldValue::new("topic", self.topic.as_str()),
            FieldValue::new("status", self.status),
        ]
    }
}

impl NewEntity for NewConsultation {
    type Output = Consultation;

    fn into_fields(self) -> Vec<FieldValue> {
        vec![
            FieldValue::new("teacherId", self.teacher_id),
            FieldValue::new("studentId", self.student_id),
            FieldValue::new("courseId", self.course_id),
            FieldValue::new("scheduledAt", timestamp_value(self.scheduled_at)),
            FieldValue::new("topic", self.topic),
            FieldValue::new("status", self.status),
        ]
    }
}
