//! User registration
//!
//! Minimal identity records for the request context. Credential
//! issuance lives elsewhere; this only reserves a sequential id and the
//! unique username/email pair.

use crate::allocator::{Counter, SequentialIdAllocator};
use crate::context::Role;
use crate::db::models::User;
use crate::db::{self, queries};
use crate::{Error, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Create a user under a freshly allocated sequential id.
pub async fn register_user(
    pool: &SqlitePool,
    allocator: &SequentialIdAllocator,
    username: &str,
    email: &str,
    role: Role,
) -> Result<User> {
    let username = username.trim();
    let email = email.trim();
    if username.is_empty() || !email.contains('@') {
        return Err(Error::Validation(format!(
            "invalid username or email: {:?}, {:?}",
            username, email
        )));
    }

    loop {
        let id = allocator.next(Counter::User).await?;
        let user = User {
            id,
            username: username.to_string(),
            email: email.to_string(),
            role: role.as_str().to_string(),
        };

        match queries::insert_user(pool, &user).await {
            Ok(()) => {
                info!(id, username = %user.username, role = %user.role, "Registered user");
                return Ok(user);
            }
            Err(Error::Database(e))
                if db::unique_violation_on(&e, "users.username")
                    || db::unique_violation_on(&e, "users.email") =>
            {
                return Err(Error::Validation(format!(
                    "username or email already registered: {}",
                    username
                )));
            }
            Err(Error::Database(e)) if db::is_unique_violation(&e) => {
                debug!(id, "User id already taken, retrying");
                continue;
            }
            Err(e) => return Err(e),
        }
    }
}
