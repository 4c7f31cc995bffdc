//! Enumerated attribute types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Platform role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

/// Publication state of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CourseStatus {
    #[default]
    Draft,
    Published,
}

/// Lifecycle state of a consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsultationStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Teacher, Role::Student];

    /// Stored spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Teacher => "TEACHER",
            Role::Student => "STUDENT",
        }
    }

    /// Stored spellings of all variants.
    pub fn names() -> [&'static str; 3] {
        Self::ALL.map(|r| r.as_str())
    }

    /// Whether this role may teach courses, hold consultations and grade.
    pub fn can_teach(&self) -> bool {
        matches!(self, Role::Admin | Role::Teacher)
    }
}

impl CourseStatus {
    pub const ALL: [CourseStatus; 2] = [CourseStatus::Draft, CourseStatus::Published];

    /// Stored spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Draft => "DRAFT",
            CourseStatus::Published => "PUBLISHED",
        }
    }

    /// Stored spellings of all variants.
    pub fn names() -> [&'static str; 2] {
        Self::ALL.map(|s| s.as_str())
    }
}

impl ConsultationStatus {
    pub const ALL: [ConsultationStatus; 3] = [
        ConsultationStatus::Scheduled,
        ConsultationStatus::Completed,
        ConsultationStatus::Cancelled,
    ];

    /// Stored spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Scheduled => "SCHEDULED",
            ConsultationStatus::Completed => "COMPLETED",
            ConsultationStatus::Cancelled => "CANCELLED",
        }
    }

    /// Stored spellings of all variants.
    pub fn names() -> [&'static str; 3] {
        Self::ALL.map(|s| s.as_str())
    }
}

/// Error for a stored enum spelling that matches no variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! stored_enum {
    ($ty:ty) => {
        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty>::ALL
                    .into_iter()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| UnknownVariant(s.to_string()))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$ty> for lms_proto::Value {
            fn from(v: $ty) -> Self {
                lms_proto::Value::String(v.as_str().to_string())
            }
        }
    };
}

stored_enum!(Role);
stored_enum!(CourseStatus);
stored_enum!(ConsultationStatus);
