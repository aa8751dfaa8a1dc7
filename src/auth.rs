// 🔐 Authentication - Password hashing and bearer sessions
//
// Passwords: Argon2id PHC strings with a random salt.
// Sessions: random opaque tokens handed to the client; only the SHA-256
// digest of a token is stored, so a leaked database holds no usable tokens.

use crate::db;
use crate::entities::{NewUser, User};
use crate::error::{TrackerError, TrackerResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Token issued at login
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

pub fn hash_password(password: &str) -> TrackerResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| TrackerError::PasswordHash(e.to_string()))
}

/// False for a wrong password and for an unparseable stored hash
pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            debug!(error = %e, "stored password hash is not a PHC string");
            false
        }
    }
}

/// SHA-256 hex digest of a bearer token (what the sessions table stores)
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn new_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

pub fn register(conn: &Connection, new_user: &NewUser) -> TrackerResult<User> {
    new_user.validate()?;
    let password_hash = hash_password(&new_user.password)?;
    create_user(conn, new_user, &password_hash)
}

/// Store an already validated user with a precomputed password hash
pub fn create_user(conn: &Connection, new_user: &NewUser, password_hash: &str) -> TrackerResult<User> {
    let user = db::insert_user(
        conn,
        new_user.username.trim(),
        new_user.email.trim(),
        password_hash,
    )?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Check credentials and open a session valid for `ttl`.
/// Unknown user and wrong password are indistinguishable to the caller.
pub fn login(
    conn: &Connection,
    username: &str,
    password: &str,
    ttl: Duration,
) -> TrackerResult<Session> {
    let (user, phc) = db::find_user_credentials(conn, username.trim())?
        .ok_or(TrackerError::Unauthorized)?;

    if !verify_password(password, &phc) {
        debug!(username = %username, "login rejected");
        return Err(TrackerError::Unauthorized);
    }

    open_session(conn, user, ttl)
}

/// Issue a fresh token for a user whose password was already checked
pub fn open_session(conn: &Connection, user: User, ttl: Duration) -> TrackerResult<Session> {
    let token = new_token();
    let expires_at = db::now() + ttl;
    db::insert_session(conn, &token_digest(&token), user.id, expires_at)?;

    info!(user_id = user.id, "session opened");
    Ok(Session {
        token,
        expires_at,
        user,
    })
}

/// Resolve a bearer token to its user
pub fn authenticate(conn: &Connection, token: &str) -> TrackerResult<User> {
    let token = token.trim();
    if token.is_empty() {
        return Err(TrackerError::Unauthorized);
    }

    db::find_session_user(conn, &token_digest(token), Utc::now())?.ok_or(TrackerError::Unauthorized)
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

pub fn logout(conn: &Connection, token: &str) -> TrackerResult<()> {
    db::delete_session(conn, &token_digest(token.trim()))?;
    Ok(())
}
