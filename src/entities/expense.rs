// 💸 Expense Entity - One spending record owned by one user
//
// The category is a plain label. When the caller leaves it blank the rule
// classifier fills it in from title + description.

use crate::entities::Category;
use crate::error::{TrackerError, TrackerResult};
use crate::rules;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// EXPENSE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub title: String,
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    #[serde(default)]
    pub user_id: i64,
}

impl Expense {
    /// Month key in `YYYY-MM` form, as used by the month filter
    pub fn month_key(&self) -> String {
        self.created_at.format("%Y-%m").to_string()
    }

    /// Lowercased text searched by the free-text filter
    fn haystack(&self) -> String {
        format!("{} {} {}", self.title, self.description, self.category).to_lowercase()
    }
}

// ============================================================================
// INPUT (create / update payload)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseInput {
    pub title: String,
    pub amount: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ExpenseInput {
    pub fn new(title: &str, amount: f64) -> Self {
        ExpenseInput {
            title: title.to_string(),
            amount,
            category: None,
            description: None,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn validate(&self) -> TrackerResult<()> {
        if self.title.trim().is_empty() {
            return Err(TrackerError::Validation("Title is required.".to_string()));
        }
        if !self.amount.is_finite() {
            return Err(TrackerError::Validation("Amount must be a number.".to_string()));
        }
        Ok(())
    }

    pub fn description_or_empty(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    /// Caller's category if given, otherwise the classifier's suggestion
    pub fn resolve_category(&self) -> String {
        match self.category.as_deref().map(str::trim) {
            Some(category) if !category.is_empty() => category.to_string(),
            _ => rules::classify(&self.title, self.description.as_deref())
                .category
                .as_str()
                .to_string(),
        }
    }
}

// ============================================================================
// QUERY (list filters)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    DateDesc,
    DateAsc,
    AmountAsc,
    AmountDesc,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpenseQuery {
    /// `YYYY-MM`
    #[serde(default)]
    pub month: Option<String>,
    /// 0 = Sunday .. 6 = Saturday
    #[serde(default)]
    pub weekday: Option<u32>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: Option<SortOrder>,
}

impl ExpenseQuery {
    pub fn validate(&self) -> TrackerResult<()> {
        if let Some(month) = &self.month {
            NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d").map_err(|_| {
                TrackerError::Validation(format!("month must be YYYY-MM, got {:?}", month))
            })?;
        }
        if let Some(weekday) = self.weekday {
            if weekday > 6 {
                return Err(TrackerError::Validation(
                    "weekday must be between 0 (Sunday) and 6 (Saturday)".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn matches(&self, expense: &Expense) -> bool {
        if let Some(month) = &self.month {
            if &expense.month_key() != month {
                return false;
            }
        }

        if let Some(weekday) = self.weekday {
            if expense.created_at.weekday().num_days_from_sunday() != weekday {
                return false;
            }
        }

        if let Some(search) = &self.search {
            let needle = search.trim().to_lowercase();
            if !needle.is_empty() && !expense.haystack().contains(&needle) {
                return false;
            }
        }

        true
    }

    /// Filter then sort
    pub fn apply(&self, expenses: Vec<Expense>) -> Vec<Expense> {
        let mut filtered: Vec<Expense> = expenses.into_iter().filter(|e| self.matches(e)).collect();

        match self.sort.unwrap_or_default() {
            SortOrder::DateDesc => filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::DateAsc => filtered.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SortOrder::AmountAsc => filtered.sort_by(|a, b| a.amount.total_cmp(&b.amount)),
            SortOrder::AmountDesc => filtered.sort_by(|a, b| b.amount.total_cmp(&a.amount)),
        }

        filtered
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub count: usize,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseSummary {
    pub total: f64,
    pub count: usize,
    pub latest_title: Option<String>,
    pub latest_at: Option<DateTime<Utc>>,
    pub by_category: Vec<CategoryTotal>,
}

impl ExpenseSummary {
    pub fn from_expenses(expenses: &[Expense]) -> Self {
        let latest = expenses.iter().max_by_key(|e| e.created_at);

        let mut totals: HashMap<&str, (usize, f64)> = HashMap::new();
        for expense in expenses {
            let entry = totals.entry(expense.category.as_str()).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += expense.amount;
        }

        let mut by_category: Vec<CategoryTotal> = totals
            .into_iter()
            .map(|(category, (count, total))| CategoryTotal {
                category: category.to_string(),
                count,
                total,
            })
            .collect();

        // Known categories in priority order, custom labels after them by name
        by_category.sort_by(|a, b| {
            let rank = |label: &str| Category::from_label(label).map(|c| c.priority());
            match (rank(&a.category), rank(&b.category)) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.category.cmp(&b.category),
            }
        });

        ExpenseSummary {
            total: expenses.iter().map(|e| e.amount).sum(),
            count: expenses.len(),
            latest_title: latest.map(|e| e.title.clone()),
            latest_at: latest.map(|e| e.created_at),
            by_category,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
