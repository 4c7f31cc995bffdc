//! Typed LMS entities and their DTO shapes.
//!
//! Each entity has a record type (a stored row, decoded), a `New*` input type
//! and a camelCase serde shape for the outer layers. Timestamps are held as
//! `chrono::DateTime<Utc>` and stored as microseconds since the Unix epoch.

mod assignment;
mod consultation;
mod course;
mod enrollment;
mod lesson;
mod submission;
mod types;
mod user;

pub use assignment::{Assignment, NewAssignment};
pub use consultation::{Consultation, NewConsultation};
pub use course::{Course, CourseDetailDto, NewCourse};
pub use enrollment::{Enrollment, NewEnrollment};
pub use lesson::{Lesson, NewLesson};
pub use submission::{Grade, NewSubmission, Submission};
pub use types::{ConsultationStatus, CourseStatus, Role, UnknownVariant};
pub use user::{NewUser, User, UserDto};

use chrono::{DateTime, Utc};
use lms_proto::{EntityId, EntityRow, FieldValue, Value};

use crate::error::Error;
use crate::registry::entities;

/// DTO aliases. Every record except [`User`] serializes directly.
pub type CourseDto = Course;
pub type LessonDto = Lesson;
pub type AssignmentDto = Assignment;
pub type SubmissionDto = Submission;
pub type EnrollmentDto = Enrollment;
pub type ConsultationDto = Consultation;

/// A stored entity with a typed record.
pub trait Entity: Sized {
    /// Entity name in the registry.
    const NAME: &'static str;

    /// Row identity.
    fn id(&self) -> EntityId;

    /// Decode a stored row.
    fn from_row(row: &EntityRow) -> Result<Self, Error>;

    /// All writable fields, for a full-record update.
    fn to_fields(&self) -> Vec<FieldValue>;
}

/// Input for creating an entity.
pub trait NewEntity {
    /// Record type produced by the insert.
    type Output: Entity;

    /// Field values for the insert.
    fn into_fields(self) -> Vec<FieldValue>;
}

/// Convert stored microseconds to a UTC timestamp.
pub fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_default()
}

/// Convert a UTC timestamp to a stored value.
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::Timestamp(at.timestamp_micros())
}

fn opt_timestamp_value(at: Option<DateTime<Utc>>) -> Value {
    at.map(timestamp_value).unwrap_or(Value::Null)
}

fn parse_enum<T>(row: &EntityRow, field: &str) -> Result<T, Error>
where
    T: std::str::FromStr<Err = UnknownVariant>,
{
    let raw = row.string(field)?;
    raw.parse().map_err(|_| {
        Error::Protocol(lms_proto::Error::UnknownVariant {
            field: field.to_string(),
            value: raw.clone(),
        })
    })
}

fn row_created(row: &EntityRow) -> DateTime<Utc> {
    from_micros(row.created_at as i64)
}

fn row_updated(row: &EntityRow) -> DateTime<Utc> {
    from_micros(row.updated_at as i64)
}

/// Render a stored row as the JSON shape of its entity's DTO.
pub fn dto_json(row: &EntityRow) -> Result<serde_json::Value, Error> {
    fn json<T: serde::Serialize>(value: T) -> Result<serde_json::Value, Error> {
        serde_json::to_value(value).map_err(|e| Error::Database(e.to_string()))
    }

    match row.entity.as_str() {
        entities::USER => json(UserDto::from(User::from_row(row)?)),
        entities::COURSE => json(Course::from_row(row)?),
        entities::LESSON => json(Lesson::from_row(row)?),
        entities::ASSIGNMENT => json(Assignment::from_row(row)?),
        entities::SUBMISSION => json(Submission::from_row(row)?),
        entities::ENROLLMENT => json(Enrollment::from_row(row)?),
        entities::CONSULTATION => json(Consultation::from_row(row)?),
        other => Err(Error::UnknownEntity(other.to_string())),
    }
}
