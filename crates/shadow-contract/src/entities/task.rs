//! Household chores and to-dos

use crate::repository::{EntityKind, Record};
use crate::types::EntityId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Stored task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Identifier
    pub id: EntityId,
    /// Short description
    pub title: String,
    /// Member responsible, if assigned
    pub assignee: Option<String>,
    /// Due date
    pub due_on: Option<NaiveDate>,
    /// Completion flag
    pub done: bool,
    /// Free-form labels; order carries no meaning
    pub tags: Vec<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Record for Task {
    fn id(&self) -> &EntityId {
        &self.id
    }
}

/// `list` filter for tasks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskFilter {
    /// Restrict to one assignee
    pub assignee: Option<String>,
    /// Restrict by completion state
    pub done: Option<bool>,
    /// Require this tag
    pub tag: Option<String>,
}

impl TaskFilter {
    /// Whether `task` passes the filter
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.assignee
            .as_ref()
            .map_or(true, |who| task.assignee.as_ref() == Some(who))
            && self.done.map_or(true, |done| task.done == done)
            && self.tag.as_ref().map_or(true, |tag| task.tags.contains(tag))
    }
}

/// `create` payload for tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    /// Short description
    pub title: String,
    /// Member responsible
    pub assignee: Option<String>,
    /// Due date
    pub due_on: Option<NaiveDate>,
    /// Labels
    pub tags: Vec<String>,
}

/// `update` payload for tasks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    /// Replace description
    pub title: Option<String>,
    /// Reassign; `Some(None)` clears the assignee
    pub assignee: Option<Option<String>>,
    /// Mark done or open
    pub done: Option<bool>,
    /// Replace labels
    pub tags: Option<Vec<String>>,
}

/// Task entity kind
#[derive(Debug, Clone, Copy)]
pub struct Tasks;

impl EntityKind for Tasks {
    const NAME: &'static str = "task";
    type Entity = Task;
    type Filter = TaskFilter;
    type Input = TaskInput;
    type Patch = TaskPatch;
}
