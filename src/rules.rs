// 🏷️ Classification Rules - Keyword buckets as data
// Deterministic, rule-based category suggestion for expenses.
//
// Two passes over the same ordered bucket table:
// 1. whole-word: token set ∩ bucket keywords
// 2. substring: any bucket keyword inside the normalized text
// First bucket to match wins; nothing matches -> Other.

use crate::entities::Category;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{error, info};

// ============================================================================
// KEYWORD BUCKETS
// ============================================================================

/// A category and the lowercase alphanumeric keywords that select it
#[derive(Debug, Clone, Copy)]
pub struct KeywordBucket {
    pub category: Category,
    pub keywords: &'static [&'static str],
}

impl KeywordBucket {
    /// Whole-word match: some token equals some keyword
    pub fn matches_tokens(&self, tokens: &HashSet<&str>) -> bool {
        self.keywords.iter().any(|kw| tokens.contains(kw))
    }

    /// Substring match anywhere in the normalized text
    pub fn matches_substring(&self, text: &str) -> bool {
        self.keywords.iter().any(|kw| text.contains(kw))
    }
}

/// Buckets in priority order. Overlaps ("shop", "netflix") resolve to the
/// earlier bucket. Duplicate forms (run/running) are intentional: no stemming.
pub static KEYWORD_BUCKETS: [KeywordBucket; 9] = [
    KeywordBucket {
        category: Category::FoodAndDrink,
        keywords: &[
            "coffee", "tea", "restaurant", "cafe", "latte", "eat", "eating", "dinner", "lunch",
            "breakfast", "meal", "burger", "pizza", "snack", "food", "canteen", "starbucks",
        ],
    },
    KeywordBucket {
        category: Category::Groceries,
        keywords: &[
            "grocery", "supermarket", "shop", "buy", "milk", "bread", "vegetable", "fruit",
            "fruits", "groceries", "store", "bigbasket", "aldi",
        ],
    },
    KeywordBucket {
        category: Category::Transport,
        keywords: &[
            "uber", "ola", "taxi", "bus", "train", "petrol", "diesel", "fuel", "metro", "gas",
            "parking", "toll", "ride", "cab",
        ],
    },
    KeywordBucket {
        category: Category::Bills,
        keywords: &[
            "electric", "electricity", "water", "bill", "rent", "subscription", "netflix", "isp",
            "invoice", "phone", "mobile", "broadband",
        ],
    },
    KeywordBucket {
        category: Category::Shopping,
        keywords: &[
            "amazon", "flipkart", "shopping", "shirt", "pants", "shoe", "mall", "order",
            "purchase", "shop",
        ],
    },
    KeywordBucket {
        category: Category::Health,
        keywords: &[
            "pharm", "pharmacy", "doctor", "clinic", "hospital", "medicine", "med", "running",
            "run", "gym", "fitness", "exercise", "health",
        ],
    },
    KeywordBucket {
        category: Category::Entertainment,
        keywords: &[
            "movie", "cinema", "spotify", "concert", "netflix", "game", "games", "entertainment",
        ],
    },
    KeywordBucket {
        category: Category::Travel,
        keywords: &["hotel", "flight", "airline", "booking", "trip", "travel", "airbnb"],
    },
    KeywordBucket {
        category: Category::Education,
        keywords: &["course", "udemy", "education", "books", "training", "school", "college"],
    },
];

// Compiled once, shared read-only by every caller
static PUNCTUATION_RUN: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"[._/,\-:();]+"));
static ALNUM_RUN: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"[a-z0-9]+"));

// Word characters for token boundaries: letters, numbers and underscore.
// Combining marks are not word characters, so "cafe\u{301}" still yields "cafe".
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// ============================================================================
// CLASSIFICATION RESULT
// ============================================================================

/// Which classifier produced a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ClassificationSource {
    #[default]
    #[serde(rename = "rule-based")]
    RuleBased,
}

impl ClassificationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationSource::RuleBased => "rule-based",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ClassificationResult {
    pub category: Category,
    pub source: ClassificationSource,
}

impl ClassificationResult {
    pub fn rule_based(category: Category) -> Self {
        ClassificationResult {
            category,
            source: ClassificationSource::RuleBased,
        }
    }

    /// Degraded answer used when nothing matched or classification faulted
    pub fn fallback() -> Self {
        Self::rule_based(Category::Other)
    }
}

/// Unexpected failure inside normalization or matching.
/// Never crosses `classify`; it is logged and replaced by the fallback.
#[derive(Debug, thiserror::Error)]
pub enum ClassificationFault {
    #[error("text pattern unavailable: {0}")]
    Pattern(String),
}

fn pattern(lazy: &'static Lazy<Result<Regex, regex::Error>>) -> Result<&'static Regex, ClassificationFault> {
    Lazy::force(lazy)
        .as_ref()
        .map_err(|e| ClassificationFault::Pattern(e.to_string()))
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Join title and description with one space, lowercase, and collapse every
/// punctuation run from `. _ / , - : ; ( )` into a single space.
pub fn normalize(title: &str, description: Option<&str>) -> Result<String, ClassificationFault> {
    let text = format!("{} {}", title, description.unwrap_or("")).to_lowercase();
    let punctuation = pattern(&PUNCTUATION_RUN)?;
    Ok(punctuation.replace_all(&text, " ").into_owned())
}

/// Set of maximal `[a-z0-9]` runs with no word character on either side
pub fn tokenize(text: &str) -> Result<HashSet<&str>, ClassificationFault> {
    let run = pattern(&ALNUM_RUN)?;
    Ok(run
        .find_iter(text)
        .filter(|m| {
            let before = text[..m.start()].chars().next_back();
            let after = text[m.end()..].chars().next();
            !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
        })
        .map(|m| m.as_str())
        .collect())
}

// ============================================================================
// CLASSIFIER
// ============================================================================

/// Fallible core of the classifier. `Ok(Category::Other)` means no bucket
/// matched; `Err` means the classifier itself broke.
pub fn try_classify(title: &str, description: Option<&str>) -> Result<Category, ClassificationFault> {
    let text = normalize(title, description)?;
    let tokens = tokenize(&text)?;

    if let Some(bucket) = KEYWORD_BUCKETS.iter().find(|b| b.matches_tokens(&tokens)) {
        return Ok(bucket.category);
    }

    // Second chance only: substring matching is more permissive
    if let Some(bucket) = KEYWORD_BUCKETS.iter().find(|b| b.matches_substring(&text)) {
        return Ok(bucket.category);
    }

    Ok(Category::Other)
}

/// Suggest a category for an expense. Total: never fails, never panics on
/// any input. A missing description is treated as the empty string.
pub fn classify(title: &str, description: Option<&str>) -> ClassificationResult {
    match try_classify(title, description) {
        Ok(category) => {
            info!(category = %category, title = ?title, "rule-based category predicted");
            ClassificationResult::rule_based(category)
        }
        Err(fault) => {
            error!(error = %fault, title = ?title, "category prediction failed, using fallback");
            ClassificationResult::fallback()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
