//! Solver tunables.
//!
//! The iteration budget lives here rather than in the constraints: a
//! constraint only knows how to prepare once and correct once, the driver
//! decides how many corrections a step gets.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Result, SimError};

/// Configuration for the sequential-impulse solver driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// Correction passes per step over every constraint.
    /// More passes tighten constraint satisfaction at linear CPU cost.
    pub iterations: usize,

    /// Correction passes for islands at or below `small_island_threshold`.
    pub small_island_iterations: usize,

    /// An island whose `bodies + constraints` count is at most this value
    /// uses `small_island_iterations`.
    pub small_island_threshold: usize,

    /// Skip constraints whose participating bodies are all asleep.
    pub skip_inactive: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            small_island_iterations: 4,
            small_island_threshold: 3,
            skip_inactive: true,
        }
    }
}

impl SolverConfig {
    /// Cheaper configuration for crowded real-time scenes.
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            iterations: 8,
            small_island_iterations: 4,
            ..Default::default()
        }
    }

    /// Tighter configuration for stiff docking or turret rigs.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            iterations: 16,
            small_island_iterations: 8,
            ..Default::default()
        }
    }

    /// Set the iteration count.
    #[must_use]
    pub const fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the iteration count used for small islands.
    #[must_use]
    pub const fn with_small_island_iterations(mut self, iterations: usize) -> Self {
        self.small_island_iterations = iterations;
        self
    }

    /// Set the small-island size threshold.
    #[must_use]
    pub const fn with_small_island_threshold(mut self, threshold: usize) -> Self {
        self.small_island_threshold = threshold;
        self
    }

    /// Enable or disable skipping of sleeping constraints.
    #[must_use]
    pub const fn with_skip_inactive(mut self, skip: bool) -> Self {
        self.skip_inactive = skip;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(SimError::invalid_config("iterations must be at least 1"));
        }
        if self.small_island_iterations == 0 {
            return Err(SimError::invalid_config(
                "small_island_iterations must be at least 1",
            ));
        }
        Ok(())
    }

    /// Iterations to spend on an island of the given size.
    #[must_use]
    pub fn iterations_for_island(&self, bodies: usize, constraints: usize) -> usize {
        if bodies + constraints > self.small_island_threshold {
            self.iterations
        } else {
            self.small_island_iterations
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(SolverConfig::default().iterations, 10);
        assert!(SolverConfig::realtime().iterations < SolverConfig::high_accuracy().iterations);
        assert!(SolverConfig::high_accuracy().validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(SolverConfig::default().validate().is_ok());
        assert!(SolverConfig::default().with_iterations(0).validate().is_err());
        assert!(SolverConfig::default()
            .with_small_island_iterations(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_iterations_for_island() {
        let config = SolverConfig::default();
        assert_eq!(config.iterations_for_island(2, 1), 4);
        assert_eq!(config.iterations_for_island(3, 2), 10);
    }
}
