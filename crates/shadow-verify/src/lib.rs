//! Shadow Verify - result comparison for dual backend calls
//!
//! Structurally compares two results of the same logical operation and
//! classifies the outcome, tolerating backend-specific differences that
//! carry no meaning (generated ids, timestamps, ordering).
//!
//! # Verdicts
//!
//! - **MATCH**: every significant field agrees (ignored fields and values
//!   within tolerance do not count)
//! - **TOLERATED**: only soft fields differ, or a field is null on one side
//!   and absent on the other
//! - **DIVERGED**: anything else, including type mismatches and failures of
//!   the comparison itself
//!
//! # Example
//!
//! ```rust,ignore
//! use shadow_verify::{ComparisonProfile, ResultVerifier, Tolerance, Verdict};
//!
//! let verifier = ResultVerifier::new().with_profile(
//!     ComparisonProfile::new("budget")
//!         .ignore("id")
//!         .tolerance("amount", Tolerance::Absolute(0.01)),
//! );
//! let record = verifier.compare(&descriptor, Backend::Legacy, &legacy_budget, &new_budget);
//! assert_eq!(record.verdict, Verdict::Match);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod compare;
pub mod diff;
pub mod profile;
pub mod profiles;
pub mod record;
pub mod verifier;

pub use diff::{DiffKind, DiffSummary, FieldDiff};
pub use profile::{ComparisonProfile, Tolerance};
pub use record::{digest, ComparisonRecord, Verdict};
pub use verifier::ResultVerifier;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
