//! Anchor distance constraint: rigid rod, rope or strut.
//!
//! # Constraint Formulation
//!
//! ```text
//! n = normalize(p2 − p1)
//! C = ‖p2 − p1‖ − d
//! J = [ −n,  −(r1 × n),  n,  r2 × n ]
//! ```
//!
//! | Behavior               | Active when | Accumulated impulse |
//! |------------------------|-------------|---------------------|
//! | `LimitDistance`        | always      | unbounded           |
//! | `LimitMaximumDistance` | `C > 0`     | `<= 0` (pull only)  |
//! | `LimitMinimumDistance` | `C < 0`     | `>= 0` (push only)  |

use impulse_types::{BodyHandle, BodySet, Point3, Result, SimError, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constraint::{check_distinct, read_bodies, with_bodies};
use crate::jacobian::{normalize_or_zero, scalar_effective_mass, JacobianRow};
use crate::{Constraint, ConstraintParams, DebugLine};

/// Which side of the target distance is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DistanceBehavior {
    /// Hold the distance exactly (rigid rod).
    #[default]
    LimitDistance,
    /// Never exceed the distance (rope).
    LimitMaximumDistance,
    /// Never fall below the distance (strut).
    LimitMinimumDistance,
}

impl DistanceBehavior {
    /// Whether the constraint has work to do for a given length error.
    #[must_use]
    pub fn is_active(self, length_error: f64) -> bool {
        match self {
            Self::LimitDistance => true,
            Self::LimitMaximumDistance => length_error > 0.0,
            Self::LimitMinimumDistance => length_error < 0.0,
        }
    }

    /// Clamp a new accumulated impulse to the admissible sign.
    #[must_use]
    fn clamp(self, impulse: f64) -> f64 {
        match self {
            Self::LimitDistance => impulse,
            Self::LimitMaximumDistance => impulse.min(0.0),
            Self::LimitMinimumDistance => impulse.max(0.0),
        }
    }
}

/// Keeps two anchors at a fixed distance, or below/above it.
///
/// # Example
///
/// ```
/// use impulse_constraint::{DistanceBehavior, PointPointDistance};
/// use impulse_types::{BodySet, RigidBody};
/// use nalgebra::{Point3, Vector3};
///
/// let mut bodies = BodySet::new();
/// let tug = bodies.insert(RigidBody::dynamic(Point3::origin(), 50.0, Vector3::new(10.0, 10.0, 10.0))?);
/// let cargo = bodies.insert(RigidBody::dynamic(Point3::new(5.0, 0.0, 0.0), 20.0, Vector3::new(4.0, 4.0, 4.0))?);
///
/// let tow_line = PointPointDistance::from_world(
///     &bodies, tug, Some(cargo), Point3::origin(), Point3::new(5.0, 0.0, 0.0),
/// )?
/// .with_behavior(DistanceBehavior::LimitMaximumDistance);
///
/// assert_eq!(tow_line.distance(), 5.0);
/// # Ok::<(), impulse_types::SimError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointPointDistance {
    body1: BodyHandle,
    body2: Option<BodyHandle>,
    local_anchor1: Point3<f64>,
    local_anchor2: Point3<f64>,
    distance: f64,
    behavior: DistanceBehavior,
    params: ConstraintParams,
    accumulated_impulse: f64,

    jacobian: JacobianRow,
    effective_mass: f64,
    bias: f64,
    softness_over_dt: f64,
    skip: bool,
}

impl PointPointDistance {
    /// Default Baumgarte factor.
    pub const DEFAULT_BIAS_FACTOR: f64 = 0.1;
    /// Default softness.
    pub const DEFAULT_SOFTNESS: f64 = 0.01;

    /// Create from body-local anchors and a target distance.
    ///
    /// # Errors
    ///
    /// Fails if the distance is negative or not finite, or both handles name
    /// the same body.
    pub fn new(
        body1: BodyHandle,
        body2: Option<BodyHandle>,
        local_anchor1: Point3<f64>,
        local_anchor2: Point3<f64>,
        distance: f64,
    ) -> Result<Self> {
        check_distinct(body1, body2)?;
        check_distance(distance)?;

        Ok(Self {
            body1,
            body2,
            local_anchor1,
            local_anchor2,
            distance,
            behavior: DistanceBehavior::default(),
            params: ConstraintParams::new(Self::DEFAULT_BIAS_FACTOR, Self::DEFAULT_SOFTNESS),
            accumulated_impulse: 0.0,
            jacobian: JacobianRow::zero(),
            effective_mass: 0.0,
            bias: 0.0,
            softness_over_dt: 0.0,
            skip: true,
        })
    }

    /// Create from world-space anchors; the target distance is their current
    /// separation.
    ///
    /// # Errors
    ///
    /// Fails if a handle is stale or both handles name the same body.
    pub fn from_world(
        bodies: &BodySet,
        body1: BodyHandle,
        body2: Option<BodyHandle>,
        anchor1: Point3<f64>,
        anchor2: Point3<f64>,
    ) -> Result<Self> {
        check_distinct(body1, body2)?;
        let (local1, local2) = read_bodies(bodies, body1, body2, |b1, b2| {
            (b1.world_to_local_point(&anchor1), b2.world_to_local_point(&anchor2))
        })?;
        Self::new(body1, body2, local1, local2, (anchor2 - anchor1).norm())
    }

    /// Set the enforced side of the distance.
    #[must_use]
    pub fn with_behavior(mut self, behavior: DistanceBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Set the bias factor.
    #[must_use]
    pub fn with_bias_factor(mut self, bias_factor: f64) -> Self {
        self.params = self.params.with_bias_factor(bias_factor);
        self
    }

    /// Set the softness.
    #[must_use]
    pub fn with_softness(mut self, softness: f64) -> Self {
        self.params = self.params.with_softness(softness);
        self
    }

    /// Target distance.
    #[must_use]
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Change the target distance.
    ///
    /// # Errors
    ///
    /// Fails if the distance is negative or not finite; the old value is kept.
    pub fn set_distance(&mut self, distance: f64) -> Result<()> {
        check_distance(distance)?;
        self.distance = distance;
        Ok(())
    }

    /// Enforced side of the distance.
    #[must_use]
    pub fn behavior(&self) -> DistanceBehavior {
        self.behavior
    }

    /// Change the enforced side of the distance.
    pub fn set_behavior(&mut self, behavior: DistanceBehavior) {
        self.behavior = behavior;
    }

    /// Stabilization parameters.
    #[must_use]
    pub fn params(&self) -> &ConstraintParams {
        &self.params
    }

    /// Mutable stabilization parameters.
    pub fn params_mut(&mut self) -> &mut ConstraintParams {
        &mut self.params
    }

    /// Accumulated impulse along the anchor axis.
    #[must_use]
    pub fn applied_impulse(&self) -> f64 {
        self.accumulated_impulse
    }

    /// Current anchor separation.
    ///
    /// Returns `None` if a handle is stale.
    #[must_use]
    pub fn current_length(&self, bodies: &BodySet) -> Option<f64> {
        read_bodies(bodies, self.body1, self.body2, |b1, b2| {
            let p1 = b1.local_to_world_point(&self.local_anchor1);
            let p2 = b2.local_to_world_point(&self.local_anchor2);
            (p2 - p1).norm()
        })
        .ok()
    }
}

fn check_distance(distance: f64) -> Result<()> {
    if distance.is_finite() && distance >= 0.0 {
        Ok(())
    } else {
        Err(SimError::degenerate(format!(
            "distance must be finite and non-negative, got {distance}"
        )))
    }
}

impl Constraint for PointPointDistance {
    fn body1(&self) -> BodyHandle {
        self.body1
    }

    fn body2(&self) -> Option<BodyHandle> {
        self.body2
    }

    fn prepare_for_iteration(&mut self, bodies: &mut BodySet, dt: f64) {
        let active = with_bodies(bodies, self.body1, self.body2, |b1, b2| {
            let r1 = b1.local_to_world_vector(&self.local_anchor1.coords);
            let r2 = b2.local_to_world_vector(&self.local_anchor2.coords);
            let dp: Vector3<f64> = (b2.position() + r2) - (b1.position() + r1);

            let length_error = dp.norm() - self.distance;
            if !self.behavior.is_active(length_error) {
                return false;
            }

            let n = normalize_or_zero(&dp);
            self.jacobian = JacobianRow {
                linear1: -n,
                angular1: -r1.cross(&n),
                linear2: n,
                angular2: r2.cross(&n),
            };

            self.softness_over_dt = self.params.softness / dt;
            self.effective_mass = scalar_effective_mass(
                self.jacobian.inverse_effective_mass(b1, b2),
                self.softness_over_dt,
            );

            self.bias = length_error * self.params.bias_factor / dt;

            self.jacobian.apply(b1, b2, self.accumulated_impulse);
            true
        });
        self.skip = !active.unwrap_or(false);
    }

    fn iterate(&mut self, bodies: &mut BodySet) {
        if self.skip {
            return;
        }
        with_bodies(bodies, self.body1, self.body2, |b1, b2| {
            let jv = self.jacobian.velocity(b1, b2);
            let softness = self.accumulated_impulse * self.softness_over_dt;

            let lambda = -self.effective_mass * (jv + self.bias + softness);
            let previous = self.accumulated_impulse;
            self.accumulated_impulse = self.behavior.clamp(previous + lambda);

            self.jacobian.apply(b1, b2, self.accumulated_impulse - previous);
        });
    }

    fn reset(&mut self) {
        self.accumulated_impulse = 0.0;
    }

    fn debug_lines(&self, bodies: &BodySet) -> Vec<DebugLine> {
        read_bodies(bodies, self.body1, self.body2, |b1, b2| {
            vec![DebugLine::new(
                b1.local_to_world_point(&self.local_anchor1),
                b2.local_to_world_point(&self.local_anchor2),
            )]
        })
        .unwrap_or_default()
    }
}
