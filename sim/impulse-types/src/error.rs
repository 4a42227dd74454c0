//! Error types for constraint construction and solving.

use thiserror::Error;

use crate::BodyHandle;

/// Errors that can occur when building or solving constraints.
///
/// Only construction-time problems and invalid driver inputs are reported
/// here. Numerical degeneracies during a solve are absorbed by the
/// constraints themselves and never surface as errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// A body handle does not refer to a live body.
    #[error("invalid body handle: {0}")]
    InvalidBodyHandle(BodyHandle),

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid mass properties.
    #[error("invalid mass properties: {reason}")]
    InvalidMassProperties {
        /// Description of what's wrong.
        reason: String,
    },

    /// Geometric input that would make a constraint Jacobian degenerate.
    #[error("degenerate geometry: {reason}")]
    DegenerateGeometry {
        /// Description of the rejected input.
        reason: String,
    },
}

impl SimError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMassProperties {
            reason: reason.into(),
        }
    }

    /// Create a degenerate geometry error.
    #[must_use]
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateGeometry {
            reason: reason.into(),
        }
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. } | Self::InvalidTimestep(_))
    }

    /// Check if this error was raised while constructing a constraint.
    #[must_use]
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::DegenerateGeometry { .. } | Self::InvalidBodyHandle(_)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::InvalidBodyHandle(BodyHandle::new(4, 2));
        assert!(err.to_string().contains("Body(4v2)"));

        let err = SimError::InvalidTimestep(-0.5);
        assert!(err.to_string().contains("-0.5"));

        let err = SimError::degenerate("zero-length line direction");
        assert!(err.to_string().contains("zero-length"));
    }

    #[test]
    fn test_error_predicates() {
        let err = SimError::degenerate("test");
        assert!(err.is_construction_error());
        assert!(!err.is_config_error());

        let err = SimError::invalid_config("bad value");
        assert!(err.is_config_error());
        assert!(!err.is_construction_error());

        assert!(SimError::InvalidTimestep(0.0).is_config_error());
    }
}
