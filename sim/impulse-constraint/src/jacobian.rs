//! Single-row Jacobians shared by the scalar constraints.
//!
//! A scalar constraint `C` between two bodies has a velocity Jacobian of the
//! form
//!
//! ```text
//! dC/dt = J·v = l1·v1 + a1·ω1 + l2·v2 + a2·ω2
//! ```
//!
//! where `l` are the linear rows and `a` the angular (lever) rows.

use impulse_types::RigidBody;
use nalgebra::Vector3;
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One Jacobian row acting on two bodies.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JacobianRow {
    /// Linear row for body 1.
    pub linear1: Vector3<f64>,
    /// Angular row for body 1.
    pub angular1: Vector3<f64>,
    /// Linear row for body 2.
    pub linear2: Vector3<f64>,
    /// Angular row for body 2.
    pub angular2: Vector3<f64>,
}

impl Default for JacobianRow {
    fn default() -> Self {
        Self::zero()
    }
}

impl JacobianRow {
    /// A row that couples nothing.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            linear1: Vector3::zeros(),
            angular1: Vector3::zeros(),
            linear2: Vector3::zeros(),
            angular2: Vector3::zeros(),
        }
    }

    /// Relative velocity along this row, `J·v`.
    #[must_use]
    pub fn velocity(&self, body1: &RigidBody, body2: &RigidBody) -> f64 {
        self.linear1.dot(body1.linear_velocity())
            + self.angular1.dot(body1.angular_velocity())
            + self.linear2.dot(body2.linear_velocity())
            + self.angular2.dot(body2.angular_velocity())
    }

    /// `J·M⁻¹·Jᵀ` for this row.
    #[must_use]
    pub fn inverse_effective_mass(&self, body1: &RigidBody, body2: &RigidBody) -> f64 {
        body1.inverse_mass() * self.linear1.norm_squared()
            + body2.inverse_mass() * self.linear2.norm_squared()
            + (body1.inverse_inertia_world() * self.angular1).dot(&self.angular1)
            + (body2.inverse_inertia_world() * self.angular2).dot(&self.angular2)
    }

    /// Apply a scalar impulse along this row to both bodies.
    pub fn apply(&self, body1: &mut RigidBody, body2: &mut RigidBody, impulse: f64) {
        body1.apply_linear_impulse(&(self.linear1 * impulse));
        body1.apply_angular_impulse(&(self.angular1 * impulse));
        body2.apply_linear_impulse(&(self.linear2 * impulse));
        body2.apply_angular_impulse(&(self.angular2 * impulse));
    }
}

/// Invert `J·M⁻¹·Jᵀ + softness/dt`, or return zero if that is not possible.
///
/// A zero effective mass makes the constraint contribute nothing this step.
pub(crate) fn scalar_effective_mass(inverse_effective_mass: f64, softness_over_dt: f64) -> f64 {
    let denominator = inverse_effective_mass + softness_over_dt;
    if denominator > 0.0 && denominator.is_finite() {
        1.0 / denominator
    } else {
        trace!(denominator, "degenerate effective mass, constraint inactive this step");
        0.0
    }
}

/// Unit vector along `v`, or zero if `v` has no length.
pub(crate) fn normalize_or_zero(v: &Vector3<f64>) -> Vector3<f64> {
    let norm = v.norm();
    if norm > 0.0 && norm.is_finite() {
        v / norm
    } else {
        Vector3::zeros()
    }
}
