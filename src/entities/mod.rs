// Entity Models
//
// - Category: closed, ordered label set produced by the classifier
// - Expense: spending record, plus its input/query/summary shapes
// - User: account owning expenses

pub mod category;
pub mod expense;
pub mod user;

pub use category::Category;
pub use expense::{CategoryTotal, Expense, ExpenseInput, ExpenseQuery, ExpenseSummary, SortOrder};
pub use user::{Credentials, NewUser, User};
