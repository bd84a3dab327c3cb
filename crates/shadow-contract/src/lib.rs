//! Shadow Contract
//!
//! The data-access shape every entity implements identically against the
//! legacy and the new storage backend.
//!
//! # Architecture
//!
//! ```text
//! route handler ──► Arc<dyn Repository<K>> ──► legacy adapter
//!                        (or a migration proxy holding both adapters)
//! ```
//!
//! Callers depend only on [`Repository`]; whether a proxy sits behind the
//! handle is invisible to them.
//!
//! # Example
//!
//! ```rust,ignore
//! use shadow_contract::prelude::*;
//! use shadow_contract::entities::Notifications;
//!
//! # async fn example(repo: &dyn Repository<Notifications>) -> RepoResult<()> {
//! let ctx = CallContext::for_actor("u-42");
//! let unread = repo.list(&ctx, &NotificationFilter::unread_for("u-42")).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod entities;
pub mod error;
pub mod repository;
pub mod types;

pub use error::{RepoResult, RepositoryError};
pub use repository::{CreateRequest, EntityKind, Record, Repository};
pub use types::{ActorId, Backend, CallContext, EntityId, Method, OperationDescriptor};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for implementing or calling repositories
    pub use crate::entities::{
        BudgetFilter, InventoryFilter, MealPlanFilter, NotificationFilter, TaskFilter,
    };
    pub use crate::error::{RepoResult, RepositoryError};
    pub use crate::repository::{CreateRequest, EntityKind, Record, Repository};
    pub use crate::types::{ActorId, Backend, CallContext, EntityId, Method, OperationDescriptor};
}
