//! # Timing Configuration
//!
//! Every constant that shapes a timeline, named and overridable.
//!
//! None of these values are derived from a physical model. The dampening
//! factors in particular only control how much wall time the centralized
//! strategy spends on its root bottleneck relative to the baseline transfer.

use crate::types::{CollectiveError, Permille, SimTime};
use serde::{Deserialize, Serialize};

/// Timing parameters for the timeline builder.
///
/// Deserializes from a partial document: missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Baseline duration of one intra-domain link transfer.
    pub transfer_time: SimTime,
    /// Duration of one per-node reduction compute step.
    pub compute_time: SimTime,
    /// Multiplier applied to transfers that cross a domain bridge (> 1.0).
    pub inter_domain_multiplier: Permille,
    /// Duration of one node-to-switch or switch-to-node hop.
    pub switch_link_time: SimTime,
    /// Duration of the in-switch reduction or pass-through.
    pub switch_reduce_time: SimTime,
    /// Share of `(N-1) x transfer_time` spent gathering at the root.
    pub root_gather_dampening: Permille,
    /// Share of `(N-1) x transfer_time` spent sending out from the root.
    pub root_broadcast_dampening: Permille,
    /// Share of `(N-1) x transfer_time` spent on a dense all-pairs burst.
    pub congestion_dampening: Permille,
    /// Root node for rooted operations and the centralized strategy.
    pub root: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            transfer_time: SimTime::new(1000),
            compute_time: SimTime::new(300),
            inter_domain_multiplier: Permille::new(2500),
            switch_link_time: SimTime::new(1000),
            switch_reduce_time: SimTime::new(200),
            root_gather_dampening: Permille::new(350),
            root_broadcast_dampening: Permille::new(300),
            congestion_dampening: Permille::new(350),
            root: 0,
        }
    }
}

impl TimingConfig {
    /// Check every parameter is in range.
    pub fn validate(&self) -> Result<(), CollectiveError> {
        let durations = [
            ("transfer_time", self.transfer_time),
            ("compute_time", self.compute_time),
            ("switch_link_time", self.switch_link_time),
            ("switch_reduce_time", self.switch_reduce_time),
        ];
        for (name, value) in durations {
            if value == SimTime::ZERO {
                return Err(CollectiveError::InvalidConfig(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        // Bidirectional lanes halve the baseline; keep that above zero too.
        if self.transfer_time.ticks() < 2 {
            return Err(CollectiveError::InvalidConfig(
                "transfer_time must be at least 2 ticks".to_string(),
            ));
        }

        if self.inter_domain_multiplier <= Permille::ONE {
            return Err(CollectiveError::InvalidConfig(format!(
                "inter_domain_multiplier must exceed 1000 permille, got {}",
                self.inter_domain_multiplier.value()
            )));
        }

        let dampenings = [
            ("root_gather_dampening", self.root_gather_dampening),
            ("root_broadcast_dampening", self.root_broadcast_dampening),
            ("congestion_dampening", self.congestion_dampening),
        ];
        for (name, value) in dampenings {
            if value == Permille::ZERO || value > Permille::ONE {
                return Err(CollectiveError::InvalidConfig(format!(
                    "{} must be within 1..=1000 permille, got {}",
                    name,
                    value.value()
                )));
            }
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
