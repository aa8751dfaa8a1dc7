// 🏷️ Category Entity - Fixed, ordered set of spending labels
//
// The order of `Category::ALL` is the classifier's priority order.
// Expenses store the label as a plain string; this enum is the closed set
// the classifier is allowed to produce.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ============================================================================
// CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Category {
    FoodAndDrink,
    Groceries,
    Transport,
    Bills,
    Shopping,
    Health,
    Entertainment,
    Travel,
    Education,
    /// Universal fallback
    #[default]
    Other,
}

impl Category {
    /// Every category in priority order (`Other` last)
    pub const ALL: [Category; 10] = [
        Category::FoodAndDrink,
        Category::Groceries,
        Category::Transport,
        Category::Bills,
        Category::Shopping,
        Category::Health,
        Category::Entertainment,
        Category::Travel,
        Category::Education,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::FoodAndDrink => "Food & Drink",
            Category::Groceries => "Groceries",
            Category::Transport => "Transport",
            Category::Bills => "Bills",
            Category::Shopping => "Shopping",
            Category::Health => "Health",
            Category::Entertainment => "Entertainment",
            Category::Travel => "Travel",
            Category::Education => "Education",
            Category::Other => "Other",
        }
    }

    /// Look up a category by its display label (case-insensitive, trimmed)
    pub fn from_label(label: &str) -> Option<Category> {
        let label = label.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(label))
    }

    /// Position in the priority order (0 = highest)
    pub fn priority(&self) -> usize {
        Category::ALL
            .iter()
            .position(|c| c == self)
            .unwrap_or(Category::ALL.len())
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Category::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Serialized as the display label, e.g. "Food & Drink"
impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Category::from_label(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown category: {}", label)))
    }
}

// ============================================================================
// TESTS
// ============================================================================
