//! Feature flag model and the rollout mode table

use crate::bucket::rollout_bucket;
use crate::decision::{DecisionReason, RolloutDecision};
use crate::error::FlagError;
use crate::sampler::Sampler;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shadow_contract::{ActorId, Backend};
use std::collections::BTreeSet;

/// Rollout stage of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RolloutMode {
    /// Legacy backend only
    #[default]
    Off,
    /// Both backends, legacy authoritative
    Shadow,
    /// New backend authoritative for a percentage of actors
    Partial,
    /// New backend authoritative for everyone
    Full,
}

/// Persisted rollout configuration for one operation key
///
/// Written out-of-band by operator tooling; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlag {
    /// `"<entity>.<method>"` or entity wildcard `"<entity>.*"`
    pub operation_key: String,
    /// Rollout stage
    #[serde(default)]
    pub mode: RolloutMode,
    /// Share of actors (0-100) in the PARTIAL rollout
    #[serde(default)]
    pub rollout_percentage: u8,
    /// Actors always dual-called
    #[serde(default)]
    pub forced_actor_ids: BTreeSet<ActorId>,
    /// Actors always kept on the legacy backend
    #[serde(default)]
    pub excluded_actor_ids: BTreeSet<ActorId>,
    /// FULL mode probability of still shadow-calling legacy; falls back to
    /// the manager default when absent
    #[serde(default)]
    pub legacy_sample_rate: Option<f64>,
    /// Last change
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl FeatureFlag {
    /// Create flag in the given mode
    #[must_use]
    pub fn new(operation_key: impl Into<String>, mode: RolloutMode) -> Self {
        Self {
            operation_key: operation_key.into(),
            mode,
            rollout_percentage: 0,
            forced_actor_ids: BTreeSet::new(),
            excluded_actor_ids: BTreeSet::new(),
            legacy_sample_rate: None,
            updated_at: Utc::now(),
        }
    }

    /// PARTIAL flag covering `percentage` of actors
    #[must_use]
    pub fn partial(operation_key: impl Into<String>, percentage: u8) -> Self {
        Self::new(operation_key, RolloutMode::Partial).with_percentage(percentage)
    }

    /// With rollout percentage
    #[inline]
    #[must_use]
    pub fn with_percentage(mut self, percentage: u8) -> Self {
        self.rollout_percentage = percentage;
        self
    }

    /// Force an actor into dual execution
    #[inline]
    #[must_use]
    pub fn force(mut self, actor: impl Into<String>) -> Self {
        self.forced_actor_ids.insert(ActorId::new(actor));
        self
    }

    /// Exclude an actor from the migration
    #[inline]
    #[must_use]
    pub fn exclude(mut self, actor: impl Into<String>) -> Self {
        self.excluded_actor_ids.insert(ActorId::new(actor));
        self
    }

    /// With FULL mode legacy sampling probability
    #[inline]
    #[must_use]
    pub fn with_legacy_sample_rate(mut self, rate: f64) -> Self {
        self.legacy_sample_rate = Some(rate);
        self
    }

    /// Check field constraints
    ///
    /// # Errors
    /// `FlagError::InvalidFlag` for an empty key, a percentage above 100,
    /// a sample rate outside `[0, 1]`, or an actor both forced and excluded.
    pub fn validate(&self) -> Result<(), FlagError> {
        if self.operation_key.trim().is_empty() {
            return Err(FlagError::invalid("<empty>", "operation_key is empty"));
        }
        if self.rollout_percentage > 100 {
            return Err(FlagError::invalid(
                &self.operation_key,
                format!("rollout_percentage {} exceeds 100", self.rollout_percentage),
            ));
        }
        if let Some(rate) = self.legacy_sample_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(FlagError::invalid(
                    &self.operation_key,
                    format!("legacy_sample_rate {rate} outside [0, 1]"),
                ));
            }
        }
        if let Some(actor) = self
            .forced_actor_ids
            .intersection(&self.excluded_actor_ids)
            .next()
        {
            return Err(FlagError::invalid(
                &self.operation_key,
                format!("actor {actor} is both forced and excluded"),
            ));
        }
        Ok(())
    }

    /// Apply the mode table to one caller
    ///
    /// Bucketing hashes this flag's own key, so an entity wildcard flag
    /// treats an actor the same across all methods of the entity.
    pub fn evaluate(
        &self,
        actor: Option<&ActorId>,
        sampler: &dyn Sampler,
        default_sample_rate: f64,
    ) -> RolloutDecision {
        if self.mode == RolloutMode::Off {
            return RolloutDecision::legacy_only(DecisionReason::Off);
        }

        if let Some(actor) = actor {
            if self.forced_actor_ids.contains(actor) {
                let authoritative = match self.mode {
                    RolloutMode::Shadow | RolloutMode::Off => Backend::Legacy,
                    RolloutMode::Partial | RolloutMode::Full => Backend::New,
                };
                return RolloutDecision::dual(authoritative, DecisionReason::Forced);
            }
            if self.excluded_actor_ids.contains(actor) {
                return RolloutDecision::legacy_only(DecisionReason::Excluded);
            }
        }

        match self.mode {
            RolloutMode::Off => RolloutDecision::legacy_only(DecisionReason::Off),
            RolloutMode::Shadow => RolloutDecision::dual(Backend::Legacy, DecisionReason::Shadow),
            RolloutMode::Partial => match actor {
                Some(actor) => {
                    let bucket = rollout_bucket(&self.operation_key, actor.as_str());
                    if bucket < self.rollout_percentage {
                        RolloutDecision::dual(Backend::New, DecisionReason::InRollout { bucket })
                    } else {
                        RolloutDecision::legacy_only(DecisionReason::OutOfRollout { bucket })
                    }
                }
                None if self.rollout_percentage >= 100 => {
                    RolloutDecision::dual(Backend::New, DecisionReason::NoActor)
                }
                None => RolloutDecision::legacy_only(DecisionReason::NoActor),
            },
            RolloutMode::Full => {
                let rate = self.legacy_sample_rate.unwrap_or(default_sample_rate);
                if rate > 0.0 && sampler.sample() < rate {
                    RolloutDecision::dual(Backend::New, DecisionReason::FullSampled)
                } else {
                    RolloutDecision::new_only(DecisionReason::Full)
                }
            }
        }
    }
}
