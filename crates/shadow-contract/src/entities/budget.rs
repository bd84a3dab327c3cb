//! Spending budgets per category and period

use crate::repository::{EntityKind, Record};
use crate::types::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Identifier
    pub id: EntityId,
    /// Display name
    pub name: String,
    /// Spending category
    pub category: String,
    /// Allowed amount for the period
    pub amount: f64,
    /// Amount spent so far
    pub spent: f64,
    /// Period label (`"2026-10"`, `"2026-W42"`)
    pub period: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    /// Remaining allowance (negative when overspent)
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> f64 {
        self.amount - self.spent
    }
}

impl Record for Budget {
    fn id(&self) -> &EntityId {
        &self.id
    }
}

/// `list` filter for budgets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetFilter {
    /// Restrict to one category
    pub category: Option<String>,
    /// Restrict to one period
    pub period: Option<String>,
}

impl BudgetFilter {
    /// Whether `budget` passes the filter
    #[must_use]
    pub fn matches(&self, budget: &Budget) -> bool {
        self.category.as_ref().map_or(true, |c| &budget.category == c)
            && self.period.as_ref().map_or(true, |p| &budget.period == p)
    }
}

/// `create` payload for budgets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetInput {
    /// Display name
    pub name: String,
    /// Spending category
    pub category: String,
    /// Allowed amount
    pub amount: f64,
    /// Period label
    pub period: String,
}

/// `update` payload for budgets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetPatch {
    /// New allowed amount
    pub amount: Option<f64>,
    /// New spent amount
    pub spent: Option<f64>,
}

/// Budget entity kind
#[derive(Debug, Clone, Copy)]
pub struct Budgets;

impl EntityKind for Budgets {
    const NAME: &'static str = "budget";
    type Entity = Budget;
    type Filter = BudgetFilter;
    type Input = BudgetInput;
    type Patch = BudgetPatch;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(category: &str, period: &str) -> Budget {
        let now = Utc::now();
        Budget {
            id: EntityId::from("b1"),
            name: "groceries".into(),
            category: category.into(),
            amount: 400.0,
            spent: 125.5,
            period: period.into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn filter_by_category_and_period() {
        let filter = BudgetFilter {
            category: Some("food".into()),
            period: Some("2026-10".into()),
        };
        assert!(filter.matches(&budget("food", "2026-10")));
        assert!(!filter.matches(&budget("food", "2026-11")));
        assert!(BudgetFilter::default().matches(&budget("travel", "2026-11")));
    }

    #[test]
    fn remaining_allowance() {
        assert!((budget("food", "2026-10").remaining() - 274.5).abs() < f64::EPSILON);
    }
}
