//! Testing utilities for the shadow migration workspace
//!
//! In-memory backends with fault injection, entity payload fixtures and
//! flag fixtures.

#![allow(missing_docs)]

pub mod fixture;
pub mod flags;
pub mod memory;

pub use fixture::{
    budget_input, inventory_input, meal_plan_input, notification_input, task_input, Fixture,
};
pub use flags::{full_flag, manager_with, off_flag, shadow_flag};
pub use memory::InMemoryRepository;

use shadow_contract::CallContext;

/// Context for actor `actor` with a fixed request id
pub fn ctx(actor: &str) -> CallContext {
    CallContext::for_actor(actor).with_request_id("req-test")
}
