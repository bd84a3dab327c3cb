//! Shadow Flags - rollout control for backend migrations
//!
//! Decides, per operation and per caller, whether a repository call runs
//! against the legacy backend, the new backend, or both, and which result
//! is authoritative.
//!
//! # Core Operations
//!
//! - **Decide**: [`FlagManager::decide`] maps an operation descriptor to a
//!   [`RolloutDecision`] using only the cached flag snapshot
//! - **Refresh**: flags are polled from a [`FlagStore`] on a timer and
//!   swapped in atomically; failures keep the last-known-good set
//! - **Bucket**: [`rollout_bucket`] assigns actors to percentage rollouts
//!   with a stable hash, so treatment never flaps mid-session
//!
//! # Example
//!
//! ```rust,ignore
//! use shadow_flags::{FlagManager, FlagManagerConfig, StaticFlagStore};
//!
//! # async fn example() {
//! let store = Arc::new(StaticFlagStore::new());
//! let manager = Arc::new(FlagManager::connect(store, FlagManagerConfig::default()).await);
//! let _refresh = manager.spawn_refresh_loop();
//!
//! let decision = manager.decide(&descriptor);
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod bucket;
pub mod decision;
pub mod error;
pub mod flag;
pub mod manager;
pub mod sampler;
pub mod store;

pub use bucket::{in_rollout, rollout_bucket};
pub use decision::{DecisionReason, RolloutDecision};
pub use error::FlagError;
pub use flag::{FeatureFlag, RolloutMode};
pub use manager::{FlagManager, FlagManagerConfig, FlagSnapshot};
pub use sampler::{FixedSampler, RandomSampler, Sampler};
pub use store::{FileFlagStore, FlagDocument, FlagStore, StaticFlagStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
