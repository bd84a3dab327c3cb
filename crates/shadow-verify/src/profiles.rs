//! Comparison profiles for the shipped entity kinds
//!
//! Generated ids and backend timestamps are ignored; money and quantities
//! compare to the cent; tag and meal collections ignore order. Every
//! profile treats list results as unordered rows.

use crate::profile::{ComparisonProfile, Tolerance};
use shadow_contract::entities::{Budgets, Inventory, MealPlans, Notifications, Tasks};
use shadow_contract::EntityKind;

const CENT: Tolerance = Tolerance::Absolute(0.01);

fn base(entity: &str) -> ComparisonProfile {
    ComparisonProfile::new(entity)
        .ignore("id")
        .ignore("created_at")
        .ignore("updated_at")
        .unordered_results()
}

/// Notification profile
#[must_use]
pub fn notification() -> ComparisonProfile {
    base(Notifications::NAME)
}

/// Task profile
#[must_use]
pub fn task() -> ComparisonProfile {
    base(Tasks::NAME).unordered("tags")
}

/// Meal plan profile
#[must_use]
pub fn meal_plan() -> ComparisonProfile {
    base(MealPlans::NAME).unordered("meals")
}

/// Inventory profile
#[must_use]
pub fn inventory() -> ComparisonProfile {
    base(Inventory::NAME)
        .tolerance("quantity", CENT)
        .unordered("tags")
}

/// Budget profile
#[must_use]
pub fn budget() -> ComparisonProfile {
    base(Budgets::NAME)
        .tolerance("amount", CENT)
        .tolerance("spent", CENT)
}

/// Profiles of every shipped entity kind
#[must_use]
pub fn defaults() -> Vec<ComparisonProfile> {
    vec![notification(), task(), meal_plan(), inventory(), budget()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Verdict;
    use crate::ResultVerifier;
    use chrono::{NaiveDate, TimeZone, Utc};
    use shadow_contract::entities::{Budget, Meal, MealPlan, MealSlot};
    use shadow_contract::entities::ENTITY_NAMES;
    use shadow_contract::{Backend, EntityId, Method, OperationDescriptor};

    fn budget_row(id: &str, amount: f64, offset_secs: i64) -> Budget {
        let at = Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap()
            + chrono::Duration::seconds(offset_secs);
        Budget {
            id: EntityId::new(id),
            name: "Groceries".into(),
            category: "food".into(),
            amount,
            spent: 120.5,
            period: "2026-10".into(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn every_entity_has_a_default_profile() {
        let verifier = ResultVerifier::with_defaults();
        for name in ENTITY_NAMES {
            assert!(verifier.profile_for(name).is_some(), "{name}");
        }
    }

    #[test]
    fn budgets_from_both_backends_match() {
        let verifier = ResultVerifier::with_defaults();
        let op = OperationDescriptor::new("budget", Method::List, None);
        let legacy = vec![budget_row("l-1", 400.0, 0), budget_row("l-2", 80.004, 0)];
        let new = vec![budget_row("n-2", 80.0, 7), budget_row("n-1", 400.001, 3)];
        let record = verifier.compare(&op, Backend::Legacy, &legacy, &new);
        assert_eq!(record.verdict, Verdict::Match, "{}", record.diff);
    }

    #[test]
    fn reordered_meals_match_but_changed_recipe_diverges() {
        let verifier = ResultVerifier::with_defaults();
        let op = OperationDescriptor::new("meal_plan", Method::Get, None);
        let day = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let meal = |slot, recipe: &str| Meal {
            day,
            slot,
            recipe: recipe.into(),
            servings: 2,
        };
        let plan = |meals| MealPlan {
            id: EntityId::new("p"),
            household_id: "h-1".into(),
            week_start: day,
            meals,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let legacy = plan(vec![meal(MealSlot::Lunch, "soup"), meal(MealSlot::Dinner, "pasta")]);
        let reordered = plan(vec![meal(MealSlot::Dinner, "pasta"), meal(MealSlot::Lunch, "soup")]);
        let changed = plan(vec![meal(MealSlot::Dinner, "pizza"), meal(MealSlot::Lunch, "soup")]);

        assert_eq!(
            verifier.compare(&op, Backend::Legacy, &legacy, &reordered).verdict,
            Verdict::Match
        );
        let record = verifier.compare(&op, Backend::Legacy, &legacy, &changed);
        assert_eq!(record.verdict, Verdict::Diverged);
        assert_eq!(record.diff.paths(), vec!["meals"]);
    }
}
