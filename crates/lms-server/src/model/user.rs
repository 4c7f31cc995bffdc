use chrono::{DateTime, Utc};
use lms_proto::{EntityId, EntityRow, FieldValue};
use serde::{Deserialize, Serialize};

use super::{parse_enum, row_created, row_updated, Entity, NewEntity, Role};
use crate::error::Error;
use crate::password::hash_password;
use crate::registry::entities;

/// A platform account.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: EntityId,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a new account. The password is hashed on construction.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

/// Outward shape of a user. Carries no credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: EntityId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Display name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl NewUser {
    /// Build a new account from a plain-text password.
    pub fn with_password(
        email: impl Into<String>,
        password: &str,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        role: Role,
    ) -> Result<Self, Error> {
        Ok(Self {
            email: email.into(),
            password_hash: hash_password(password)?,
            first_name: first_name.into(),
            last_name: last_name.into(),
            role,
        })
    }
}

impl Entity for User {
    const NAME: &'static str = entities::USER;

    fn id(&self) -> EntityId {
        self.id
    }

    fn from_row(row: &EntityRow) -> Result<Self, Error> {
        Ok(Self {
            id: row.id,
            email: row.string("email")?,
            password_hash: row.string("passwordHash")?,
            first_name: row.string("firstName")?,
            last_name: row.string("lastName")?,
            role: parse_enum(row, "role")?,
            created_at: row_created(row),
            updated_at: row_updated(row),
        })
    }

    fn to_fields(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::new("email", self.email.as_str()),
            FieldValue::new("passwordHash", self.password_hash.as_str()),
            FieldValue::new("firstName", self.first_name.as_str()),
            FieldValue::new("lastName", self.last_name.as_str()),
            FieldValue::new("role", self.role),
        ]
    }
}

impl NewEntity for NewUser {
    type Output = User;

    fn into_fields(self) -> Vec<FieldValue> {
        vec![
            FieldValue::new("email", self.email),
            FieldValue::new("passwordHash", self.password_hash),
            FieldValue::new("firstName", self.first_name),
            FieldValue::new("lastName", self.last_name),
            FieldValue::new("role", self.role),
        ]
    }
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            created_at: user.created_at,
        }
    }
}
