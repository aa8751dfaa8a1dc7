// 👤 User Entity - Account that owns expenses
//
// The password hash lives only in the database layer; `User` is safe to
// serialize back to clients.

use crate::error::{TrackerError, TrackerResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl NewUser {
    pub fn new(username: &str, email: &str, password: &str) -> Self {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    pub fn validate(&self) -> TrackerResult<()> {
        let username = self.username.trim();
        if !(3..=32).contains(&username.chars().count()) {
            return Err(TrackerError::Validation(
                "username must be 3 to 32 characters".to_string(),
            ));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(TrackerError::Validation(
                "username may only contain letters, digits, '_' and '-'".to_string(),
            ));
        }

        match self.email.trim().split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => {
                return Err(TrackerError::Validation(format!(
                    "invalid email address: {:?}",
                    self.email
                )))
            }
        }

        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(TrackerError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        Ok(())
    }
}

/// Login payload
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}
