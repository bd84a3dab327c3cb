//! Storage semantics of the shipped entity kinds for in-memory backends

use chrono::{DateTime, NaiveDate, Utc};
use shadow_contract::entities::{
    Budget, BudgetInput, Budgets, Inventory, InventoryInput, InventoryItem, Meal, MealPlan,
    MealPlanInput, MealPlans, MealSlot, Notification, NotificationInput, Notifications, Task,
    TaskInput, Tasks,
};
use shadow_contract::{EntityId, EntityKind};

/// How an in-memory backend builds, patches and filters one entity kind
pub trait Fixture: EntityKind {
    /// Build a stored record from a create payload
    fn build(id: EntityId, input: &Self::Input, now: DateTime<Utc>) -> Self::Entity;

    /// Apply an update payload in place
    fn apply(entity: &mut Self::Entity, patch: &Self::Patch, now: DateTime<Utc>);

    /// Whether `entity` passes `filter`
    fn matches(filter: &Self::Filter, entity: &Self::Entity) -> bool;
}

impl Fixture for Notifications {
    fn build(id: EntityId, input: &NotificationInput, now: DateTime<Utc>) -> Notification {
        Notification {
            id,
            user_id: input.user_id.clone(),
            title: input.title.clone(),
            body: input.body.clone(),
            channel: input.channel.clone(),
            read: false,
            created_at: now,
        }
    }

    fn apply(entity: &mut Notification, patch: &Self::Patch, _now: DateTime<Utc>) {
        if let Some(read) = patch.read {
            entity.read = read;
        }
        if let Some(title) = &patch.title {
            entity.title.clone_from(title);
        }
    }

    fn matches(filter: &Self::Filter, entity: &Notification) -> bool {
        filter.matches(entity)
    }
}

impl Fixture for Tasks {
    fn build(id: EntityId, input: &TaskInput, now: DateTime<Utc>) -> Task {
        Task {
            id,
            title: input.title.clone(),
            assignee: input.assignee.clone(),
            due_on: input.due_on,
            done: false,
            tags: input.tags.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(entity: &mut Task, patch: &Self::Patch, now: DateTime<Utc>) {
        if let Some(title) = &patch.title {
            entity.title.clone_from(title);
        }
        if let Some(assignee) = &patch.assignee {
            entity.assignee.clone_from(assignee);
        }
        if let Some(done) = patch.done {
            entity.done = done;
        }
        if let Some(tags) = &patch.tags {
            entity.tags.clone_from(tags);
        }
        entity.updated_at = now;
    }

    fn matches(filter: &Self::Filter, entity: &Task) -> bool {
        filter.matches(entity)
    }
}

impl Fixture for MealPlans {
    fn build(id: EntityId, input: &MealPlanInput, now: DateTime<Utc>) -> MealPlan {
        MealPlan {
            id,
            household_id: input.household_id.clone(),
            week_start: input.week_start,
            meals: input.meals.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(entity: &mut MealPlan, patch: &Self::Patch, now: DateTime<Utc>) {
        if let Some(meals) = &patch.meals {
            entity.meals.clone_from(meals);
        }
        entity.updated_at = now;
    }

    fn matches(filter: &Self::Filter, entity: &MealPlan) -> bool {
        filter.matches(entity)
    }
}

impl Fixture for Inventory {
    fn build(id: EntityId, input: &InventoryInput, now: DateTime<Utc>) -> InventoryItem {
        InventoryItem {
            id,
            name: input.name.clone(),
            quantity: input.quantity,
            unit: input.unit.clone(),
            location: input.location.clone(),
            tags: input.tags.clone(),
            updated_at: now,
        }
    }

    fn apply(entity: &mut InventoryItem, patch: &Self::Patch, now: DateTime<Utc>) {
        if let Some(quantity) = patch.quantity {
            entity.quantity = quantity;
        }
        if let Some(location) = &patch.location {
            entity.location.clone_from(location);
        }
        entity.updated_at = now;
    }

    fn matches(filter: &Self::Filter, entity: &InventoryItem) -> bool {
        filter.matches(entity)
    }
}

impl Fixture for Budgets {
    fn build(id: EntityId, input: &BudgetInput, now: DateTime<Utc>) -> Budget {
        Budget {
            id,
            name: input.name.clone(),
            category: input.category.clone(),
            amount: input.amount,
            spent: 0.0,
            period: input.period.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(entity: &mut Budget, patch: &Self::Patch, now: DateTime<Utc>) {
        if let Some(amount) = patch.amount {
            entity.amount = amount;
        }
        if let Some(spent) = patch.spent {
            entity.spent = spent;
        }
        entity.updated_at = now;
    }

    fn matches(filter: &Self::Filter, entity: &Budget) -> bool {
        filter.matches(entity)
    }
}

pub fn notification_input(user_id: &str, title: &str) -> NotificationInput {
    NotificationInput {
        user_id: user_id.to_string(),
        title: title.to_string(),
        body: format!("{title} body"),
        channel: "in_app".to_string(),
    }
}

pub fn task_input(title: &str, tags: &[&str]) -> TaskInput {
    TaskInput {
        title: title.to_string(),
        assignee: None,
        due_on: None,
        tags: tags.iter().map(ToString::to_string).collect(),
    }
}

pub fn budget_input(name: &str, category: &str, amount: f64) -> BudgetInput {
    BudgetInput {
        name: name.to_string(),
        category: category.to_string(),
        amount,
        period: "2026-10".to_string(),
    }
}

pub fn inventory_input(name: &str, quantity: f64, location: &str) -> InventoryInput {
    InventoryInput {
        name: name.to_string(),
        quantity,
        unit: "pcs".to_string(),
        location: location.to_string(),
        tags: Vec::new(),
    }
}

/// Meal plan for `household_id` with one dinner per listed recipe
pub fn meal_plan_input(
    household_id: &str,
    week_start: NaiveDate,
    recipes: &[&str],
) -> MealPlanInput {
    let meals = recipes
        .iter()
        .zip(week_start.iter_days())
        .map(|(recipe, day)| Meal {
            day,
            slot: MealSlot::Dinner,
            recipe: (*recipe).to_string(),
            servings: 2,
        })
        .collect();
    MealPlanInput {
        household_id: household_id.to_string(),
        week_start,
        meals,
    }
}
