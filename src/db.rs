use crate::entities::{Expense, ExpenseInput, ExpenseQuery, ExpenseSummary, User};
use crate::error::{TrackerError, TrackerResult};
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Event for audit trail ("Every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Open (or create) the database file and make sure the schema exists
pub fn open_database(path: &Path) -> anyhow::Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {:?}", path))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> anyhow::Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("Failed to enable WAL mode")?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("Failed to enable foreign keys")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            amount REAL NOT NULL,
            category TEXT NOT NULL,
            description TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );

        -- Audit trail / event sourcing
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_expenses_user ON expenses(user_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
        CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
        CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);",
    )
    .context("Failed to create schema")?;

    Ok(())
}

// ============================================================================
// Row helpers
// ============================================================================

/// Current time at the precision we store
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

// Fixed-width UTC text so stored timestamps sort chronologically
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

const USER_COLUMNS: &str = "id, username, email, created_at";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        created_at: parse_timestamp(3, row.get(3)?)?,
    })
}

const EXPENSE_COLUMNS: &str =
    "id, title, amount, category, description, created_at, updated_at, user_id";

fn expense_from_row(row: &Row) -> rusqlite::Result<Expense> {
    Ok(Expense {
        id: row.get(0)?,
        title: row.get(1)?,
        amount: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        created_at: parse_timestamp(5, row.get(5)?)?,
        updated_at: parse_timestamp(6, row.get(6)?)?,
        user_id: row.get(7)?,
    })
}

// ============================================================================
// Users
// ============================================================================

pub fn insert_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password_hash: &str,
) -> TrackerResult<User> {
    let now = now();

    let result = conn.execute(
        "INSERT INTO users (username, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![username, email, password_hash, timestamp(&now)],
    );

    match result {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(TrackerError::Conflict(
                "username or email already registered".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    }

    let user = User {
        id: conn.last_insert_rowid(),
        username: username.to_string(),
        email: email.to_string(),
        created_at: now,
    };

    record_event(
        conn,
        &Event::new(
            "user_registered",
            "user",
            &user.id.to_string(),
            serde_json::json!({ "username": user.username }),
            &user.username,
        ),
    );

    Ok(user)
}

/// User plus stored password hash, for login
pub fn find_user_credentials(
    conn: &Connection,
    username: &str,
) -> TrackerResult<Option<(User, String)>> {
    let found = conn
        .query_row(
            &format!("SELECT {}, password_hash FROM users WHERE username = ?1", USER_COLUMNS),
            params![username],
            |row| Ok((user_from_row(row)?, row.get::<_, String>(4)?)),
        )
        .optional()?;

    Ok(found)
}

pub fn find_user_by_username(conn: &Connection, username: &str) -> TrackerResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
            params![username],
            user_from_row,
        )
        .optional()?;

    Ok(user)
}

pub fn get_user(conn: &Connection, id: i64) -> TrackerResult<User> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![id],
        user_from_row,
    )
    .optional()?
    .ok_or_else(|| TrackerError::not_found("user", id))
}

// ============================================================================
// Sessions
// ============================================================================

pub fn insert_session(
    conn: &Connection,
    token_hash: &str,
    user_id: i64,
    expires_at: DateTime<Utc>,
) -> TrackerResult<()> {
    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![token_hash, user_id, timestamp(&now()), timestamp(&expires_at)],
    )?;
    Ok(())
}

/// Owner of a session that has not expired at `now`
pub fn find_session_user(
    conn: &Connection,
    token_hash: &str,
    now: DateTime<Utc>,
) -> TrackerResult<Option<User>> {
    let found = conn
        .query_row(
            "SELECT s.user_id, s.expires_at FROM sessions s WHERE s.token_hash = ?1",
            params![token_hash],
            |row| Ok((row.get::<_, i64>(0)?, parse_timestamp(1, row.get(1)?)?)),
        )
        .optional()?;

    match found {
        Some((user_id, expires_at)) if expires_at > now => Ok(Some(get_user(conn, user_id)?)),
        Some(_) => {
            debug!("session expired");
            Ok(None)
        }
        None => Ok(None),
    }
}

pub fn delete_session(conn: &Connection, token_hash: &str) -> TrackerResult<bool> {
    let removed = conn.execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash])?;
    Ok(removed > 0)
}

pub fn purge_expired_sessions(conn: &Connection, now: DateTime<Utc>) -> TrackerResult<usize> {
    let removed = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= ?1",
        params![timestamp(&now)],
    )?;
    Ok(removed)
}

// ============================================================================
// Expenses
// ============================================================================

/// Insert an expense for `user_id`. A blank category is filled in by the
/// rule classifier.
pub fn create_expense(conn: &Connection, user_id: i64, input: &ExpenseInput) -> TrackerResult<Expense> {
    input.validate()?;

    let now = now();
    let category = input.resolve_category();
    let title = input.title.trim();

    conn.execute(
        "INSERT INTO expenses (user_id, title, amount, category, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            user_id,
            title,
            input.amount,
            category,
            input.description_or_empty(),
            timestamp(&now),
        ],
    )?;

    let expense = Expense {
        id: conn.last_insert_rowid(),
        title: title.to_string(),
        amount: input.amount,
        category,
        description: input.description_or_empty().to_string(),
        created_at: now,
        updated_at: now,
        user_id,
    };

    record_event(
        conn,
        &Event::new(
            "expense_created",
            "expense",
            &expense.id.to_string(),
            serde_json::json!({
                "title": expense.title,
                "amount": expense.amount,
                "category": expense.category,
                "auto_categorized": input.category.as_deref().map_or(true, |c| c.trim().is_empty()),
            }),
            &user_id.to_string(),
        ),
    );

    Ok(expense)
}

/// Fetch one expense. Another user's expense is reported as not found.
pub fn get_expense(conn: &Connection, user_id: i64, id: i64) -> TrackerResult<Expense> {
    conn.query_row(
        &format!("SELECT {} FROM expenses WHERE id = ?1 AND user_id = ?2", EXPENSE_COLUMNS),
        params![id, user_id],
        expense_from_row,
    )
    .optional()?
    .ok_or_else(|| TrackerError::not_found("expense", id))
}

pub fn list_expenses(
    conn: &Connection,
    user_id: i64,
    query: &ExpenseQuery,
) -> TrackerResult<Vec<Expense>> {
    query.validate()?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM expenses WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        EXPENSE_COLUMNS
    ))?;

    let expenses = stmt
        .query_map(params![user_id], expense_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(query.apply(expenses))
}

pub fn update_expense(
    conn: &Connection,
    user_id: i64,
    id: i64,
    input: &ExpenseInput,
) -> TrackerResult<Expense> {
    input.validate()?;

    let previous = get_expense(conn, user_id, id)?;
    let now = now();
    let category = input.resolve_category();
    let title = input.title.trim();

    conn.execute(
        "UPDATE expenses
         SET title = ?1, amount = ?2, category = ?3, description = ?4, updated_at = ?5
         WHERE id = ?6 AND user_id = ?7",
        params![
            title,
            input.amount,
            category,
            input.description_or_empty(),
            timestamp(&now),
            id,
            user_id,
        ],
    )?;

    let updated = Expense {
        title: title.to_string(),
        amount: input.amount,
        category,
        description: input.description_or_empty().to_string(),
        updated_at: now,
        ..previous.clone()
    };

    record_event(
        conn,
        &Event::new(
            "expense_updated",
            "expense",
            &id.to_string(),
            serde_json::json!({
                "before": { "title": previous.title, "amount": previous.amount, "category": previous.category },
                "after": { "title": updated.title, "amount": updated.amount, "category": updated.category },
            }),
            &user_id.to_string(),
        ),
    );

    Ok(updated)
}

pub fn delete_expense(conn: &Connection, user_id: i64, id: i64) -> TrackerResult<()> {
    let removed = conn.execute(
        "DELETE FROM expenses WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;

    if removed == 0 {
        return Err(TrackerError::not_found("expense", id));
    }

    record_event(
        conn,
        &Event::new(
            "expense_deleted",
            "expense",
            &id.to_string(),
            serde_json::json!({}),
            &user_id.to_string(),
        ),
    );

    Ok(())
}

pub fn expense_summary(conn: &Connection, user_id: i64) -> TrackerResult<ExpenseSummary> {
    let expenses = list_expenses(conn, user_id, &ExpenseQuery::default())?;
    Ok(ExpenseSummary::from_expenses(&expenses))
}

/// Total number of expenses across all users
pub fn verify_count(conn: &Connection) -> TrackerResult<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM expenses", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// Events
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> TrackerResult<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            timestamp(&event.timestamp),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

// The audit trail must never fail the operation it describes
fn record_event(conn: &Connection, event: &Event) {
    if let Err(e) = insert_event(conn, event) {
        warn!(error = %e, event_type = %event.event_type, "failed to record event");
    }
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> TrackerResult<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_timestamp(1, row.get(1)?)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}
