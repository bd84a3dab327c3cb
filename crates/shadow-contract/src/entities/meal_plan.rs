//! Weekly meal plans

use crate::repository::{EntityKind, Record};
use crate::types::EntityId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Meal slot within a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealSlot {
    /// Morning meal
    Breakfast,
    /// Midday meal
    Lunch,
    /// Evening meal
    Dinner,
}

/// One planned meal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    /// Date the meal is planned for
    pub day: NaiveDate,
    /// Slot within the day
    pub slot: MealSlot,
    /// Recipe name
    pub recipe: String,
    /// Portions to cook
    pub servings: u32,
}

/// Stored meal plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlan {
    /// Identifier
    pub id: EntityId,
    /// Household owning the plan
    pub household_id: String,
    /// Monday of the planned week
    pub week_start: NaiveDate,
    /// Planned meals; backends may return them in any order
    pub meals: Vec<Meal>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Record for MealPlan {
    fn id(&self) -> &EntityId {
        &self.id
    }
}

/// `list` filter for meal plans
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealPlanFilter {
    /// Restrict to one household
    pub household_id: Option<String>,
    /// Plans starting on or after this date
    pub from: Option<NaiveDate>,
}

impl MealPlanFilter {
    /// Whether `plan` passes the filter
    #[must_use]
    pub fn matches(&self, plan: &MealPlan) -> bool {
        self.household_id
            .as_ref()
            .map_or(true, |h| &plan.household_id == h)
            && self.from.map_or(true, |from| plan.week_start >= from)
    }
}

/// `create` payload for meal plans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlanInput {
    /// Household owning the plan
    pub household_id: String,
    /// Monday of the planned week
    pub week_start: NaiveDate,
    /// Planned meals
    pub meals: Vec<Meal>,
}

/// `update` payload for meal plans
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealPlanPatch {
    /// Replace all meals
    pub meals: Option<Vec<Meal>>,
}

/// Meal plan entity kind
#[derive(Debug, Clone, Copy)]
pub struct MealPlans;

impl EntityKind for MealPlans {
    const NAME: &'static str = "meal_plan";
    type Entity = MealPlan;
    type Filter = MealPlanFilter;
    type Input = MealPlanInput;
    type Patch = MealPlanPatch;
}
