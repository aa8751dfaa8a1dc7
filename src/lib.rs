// Expense Tracker - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod rules;      // Category classifier (keyword buckets)
pub mod entities;   // Category, Expense, User
pub mod error;
pub mod config;
pub mod logging;
pub mod db;
pub mod auth;
pub mod export;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use rules::{
    classify, try_classify, ClassificationFault, ClassificationResult, ClassificationSource,
    KeywordBucket, KEYWORD_BUCKETS,
};
pub use entities::{
    Category, CategoryTotal, Credentials, Expense, ExpenseInput, ExpenseQuery, ExpenseSummary,
    NewUser, SortOrder, User,
};
pub use error::{TrackerError, TrackerResult};
pub use db::{
    Event, open_database, setup_database,
    create_expense, get_expense, list_expenses, update_expense, delete_expense,
    expense_summary, verify_count, insert_event, get_events_for_entity,
};
pub use auth::Session;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
