//! Shadow Proxy - dual execution of repository calls during a backend migration
//!
//! A [`MigrationProxy`] stands in for an entity's repository. Depending on
//! the rollout flag for the operation it calls the legacy backend, the new
//! backend, or both; the caller always receives exactly the authoritative
//! backend's outcome while the other result is verified on the side.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   decide    ┌──────────────┐
//! │ MigrationProxy│────────────►│ FlagManager  │
//! └──────┬────────┘             └──────────────┘
//!        │ authoritative call (inline)
//!        │ shadow call (pool for reads, inline with timeout for writes)
//!        ▼
//! ┌──────────────┐  record   ┌───────────┐  fan-out  ┌─────────────────────┐
//! │ResultVerifier│──────────►│ Telemetry │──────────►│ sinks (log, monitor)│
//! └──────────────┘           └───────────┘           └─────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use shadow_proxy::prelude::*;
//! use shadow_contract::entities::Budgets;
//!
//! # async fn example(legacy: Arc<LegacyBudgets>, new: Arc<NewBudgets>) -> anyhow::Result<()> {
//! let config = MigrationConfig::from_file("migration.toml")?;
//! init_tracing(LogFormat::Json)?;
//!
//! let flags = Arc::new(FlagManager::connect(store, config.flags.clone()).await);
//! let monitor = Arc::new(DivergenceMonitor::new(config.monitor.clone()));
//! let _sweeper = monitor.spawn_sweeper();
//! let services = Arc::new(ProxyServices::from_config(
//!     &config,
//!     flags,
//!     vec![Arc::new(TracingSink), monitor.clone()],
//! ));
//!
//! let budgets: Arc<dyn Repository<Budgets>> =
//!     Arc::new(MigrationProxy::new(legacy, new, services));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod counters;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod pool;
pub mod proxy;
pub mod state;
pub mod telemetry;

pub use config::{MigrationConfig, MonitorConfig, ProxyConfig};
pub use counters::{Counter, CounterSnapshot, ProxyMetrics};
pub use error::{AlertError, ConfigError, MigrationError};
pub use logging::{init_tracing, LogFormat};
pub use monitor::{AlertState, DivergenceAlert, DivergenceMonitor};
pub use pool::{PoolSaturated, ShadowPool};
pub use proxy::{MigrationProxy, ProxyServices};
pub use state::{DualCall, DualCallState};
pub use telemetry::{InfraErrorEvent, MemorySink, Telemetry, TelemetrySink, TracingSink};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Everything needed to wire a migration proxy at startup
    pub use crate::config::{MigrationConfig, MonitorConfig, ProxyConfig};
    pub use crate::error::{ConfigError, MigrationError};
    pub use crate::logging::{init_tracing, LogFormat};
    pub use crate::monitor::DivergenceMonitor;
    pub use crate::proxy::{MigrationProxy, ProxyServices};
    pub use crate::telemetry::{MemorySink, TelemetrySink, TracingSink};
    pub use shadow_contract::prelude::*;
    pub use shadow_flags::{FeatureFlag, FlagManager, RolloutMode};
    pub use shadow_verify::{ComparisonRecord, ResultVerifier, Verdict};
    pub use std::sync::Arc;
}
