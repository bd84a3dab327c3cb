//! Entity schemas served through the migration proxy
//!
//! Each submodule defines the record, filter, input and patch types of one
//! entity kind plus its [`EntityKind`](crate::EntityKind) marker. Storage
//! adapters for both backends implement
//! [`Repository`](crate::Repository) over these types.

use crate::EntityKind;

mod budget;
mod inventory;
mod meal_plan;
mod notification;
mod task;

pub use budget::{Budget, BudgetFilter, BudgetInput, BudgetPatch, Budgets};
pub use inventory::{Inventory, InventoryFilter, InventoryInput, InventoryItem, InventoryPatch};
pub use meal_plan::{
    Meal, MealPlan, MealPlanFilter, MealPlanInput, MealPlanPatch, MealPlans, MealSlot,
};
pub use notification::{
    Notification, NotificationFilter, NotificationInput, NotificationPatch, Notifications,
};
pub use task::{Task, TaskFilter, TaskInput, TaskPatch, Tasks};

/// Names of all shipped entity kinds
pub const ENTITY_NAMES: [&str; 5] = [
    <Notifications as EntityKind>::NAME,
    <Tasks as EntityKind>::NAME,
    <MealPlans as EntityKind>::NAME,
    <Inventory as EntityKind>::NAME,
    <Budgets as EntityKind>::NAME,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityId;
    use chrono::Utc;

    #[test]
    fn entity_names_are_unique() {
        let mut names = ENTITY_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ENTITY_NAMES.len());
    }

    #[test]
    fn task_filter_matches_tag_and_state() {
        let now = Utc::now();
        let task = Task {
            id: EntityId::from("t1"),
            title: "water plants".into(),
            assignee: Some("ana".into()),
            due_on: None,
            done: false,
            tags: vec!["garden".into(), "weekly".into()],
            created_at: now,
            updated_at: now,
        };

        let filter = TaskFilter {
            assignee: Some("ana".into()),
            done: Some(false),
            tag: Some("garden".into()),
        };
        assert!(filter.matches(&task));

        let done_only = TaskFilter {
            done: Some(true),
            ..TaskFilter::default()
        };
        assert!(!done_only.matches(&task));
    }

    #[test]
    fn notification_unread_filter() {
        let mut n = Notification {
            id: EntityId::from("n1"),
            user_id: "u1".into(),
            title: "hi".into(),
            body: "there".into(),
            channel: "push".into(),
            read: false,
            created_at: Utc::now(),
        };
        let filter = NotificationFilter::unread_for("u1");
        assert!(filter.matches(&n));
        n.read = true;
        assert!(!filter.matches(&n));
    }
}
