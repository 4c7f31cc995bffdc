use chrono::{DateTime, Utc};
use lms_proto::{EntityId, EntityRow, FieldValue};
use serde::{Deserialize, Serialize};

use super::{from_micros, timestamp_value, Entity, NewEntity};
use crate::error::Error;
use crate::registry::entities;

/// A student's membership in a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: EntityId,
    pub student_id: EntityId,
    pub course_id: EntityId,
    pub enrolled_at: DateTime<Utc>,
}

/// Input for a new enrollment.
#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub student_id: EntityId,
    pub course_id: EntityId,
    pub enrolled_at: DateTime<Utc>,
}

impl NewEnrollment {
    /// Enrollment stamped with the current time.
    pub fn new(student_id: EntityId, course_id: EntityId) -> Self {
        Self {
            student_id,
            course_id,
            enrolled_at: Utc::now(),
        }
    }
}

impl Entity for Enrollment {
    const NAME: &'static str = entities::ENROLLMENT;

    fn id(&self) -> EntityId {
        self.id
    }

    fn from_row(row: &EntityRow) -> Result<Self, Error> {
        Ok(Self {
            id: row.id,
            student_id: row.int("studentId")?,
            course_id: row.int("courseId")?,
            enrolled_at: from_micros(row.timestamp("enrolledAt")?),
        })
    }

    fn to_fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::new("studentId", self.student_id),
            FieldValue::new("courseId", self.course_id),
            FieldValue::new("enrolledAt", timestamp_value(self.enrolled_at)),
        ]
    }
}

impl NewEntity for NewEnrollment {
    type Output = Enrollment;

    fn into_fields(self) -> Vec<FieldValue> {
        vec![
            FieldValue::new("studentId", self.student_id),
            FieldValue::new("courseId", self.course_id),
            FieldValue::new("enrolledAt", timestamp_value(self.enrolled_at)),
        ]
    }
}
