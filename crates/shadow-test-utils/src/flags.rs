//! Flag fixtures

use shadow_flags::{
    FeatureFlag, FixedSampler, FlagManager, FlagManagerConfig, RolloutMode, StaticFlagStore,
};
use std::sync::Arc;

pub fn shadow_flag(key: &str) -> FeatureFlag {
    FeatureFlag::new(key, RolloutMode::Shadow)
}

pub fn full_flag(key: &str) -> FeatureFlag {
    FeatureFlag::new(key, RolloutMode::Full)
}

pub fn off_flag(key: &str) -> FeatureFlag {
    FeatureFlag::new(key, RolloutMode::Off)
}

/// Store plus a manager already loaded from it
///
/// The manager samples with a fixed value of `0.5`, so FULL flags shadow
/// legacy exactly when their sample rate is above one half.
pub async fn manager_with(flags: Vec<FeatureFlag>) -> (Arc<StaticFlagStore>, Arc<FlagManager>) {
    let store = Arc::new(StaticFlagStore::with_flags(flags));
    let manager = FlagManager::connect(store.clone(), FlagManagerConfig::default())
        .await
        .with_sampler(Arc::new(FixedSampler(0.5)));
    (store, Arc::new(manager))
}
