//! Administrator bootstrap.
//!
//! An empty store gets exactly one user: id 1, role ADMIN. The seed skips
//! check rules so fixture identities like `admin@localhost` load, but the
//! unique e-mail key still applies. An existing administrator is never
//! touched.

use tracing::{info, warn};

use lms_core::CheckMode;
use lms_proto::{EntityId, Mutation};

use crate::config::{SeedConfig, ADMIN_PASSWORD_ENV};
use crate::error::Error;
use crate::gateway::Gateway;
use crate::model::{NewEntity, NewUser, Role};
use crate::registry::entities;

/// Fixed identity of the seeded administrator.
pub const ADMIN_ID: EntityId = 1;

/// What [`ensure_seeded`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The administrator was inserted.
    Created,
    /// Users already exist; nothing was written.
    AlreadyPresent,
}

/// Insert the administrator if the store holds no users.
pub fn ensure_seeded(gateway: &Gateway, seed: &SeedConfig) -> Result<SeedOutcome, Error> {
    let storage = gateway.database().storage();

    if storage.exists(entities::USER, ADMIN_ID)? {
        return Ok(SeedOutcome::AlreadyPresent);
    }
    if storage.count_entity(entities::USER)? > 0 {
        warn!("users exist without an administrator at id 1; not seeding");
        return Ok(SeedOutcome::AlreadyPresent);
    }

    let password = seed.password.as_deref().ok_or_else(|| {
        Error::Config(format!(
            "administrator password required to seed an empty store; set {}",
            ADMIN_PASSWORD_ENV
        ))
    })?;

    let admin = NewUser::with_password(
        seed.email.as_str(),
        password,
        seed.first_name.as_str(),
        seed.last_name.as_str(),
        Role::Admin,
    )?;

    let result = gateway
        .executor()
        .with_check_mode(CheckMode::Skip)
        .execute(&Mutation::insert_with_id(
            entities::USER,
            ADMIN_ID,
            admin.into_fields(),
        ));

    match result {
        Ok(_) => {
            info!(id = ADMIN_ID, email = %seed.email, "seeded administrator");
            Ok(SeedOutcome::Created)
        }
        // A concurrent seeder won the race for id 1.
        Err(e) if e.is_unique_violation() && storage.exists(entities::USER, ADMIN_ID)? => {
            Ok(SeedOutcome::AlreadyPresent)
        }
        Err(e) => Err(e),
    }
}
