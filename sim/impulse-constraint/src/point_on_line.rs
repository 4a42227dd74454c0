//! Point-on-line constraint.
//!
//! # Constraint Formulation
//!
//! ```text
//! d = p1 − a                       (point relative to line anchor)
//! C = ‖l × d‖                      (distance of the point from the line)
//! t = normalize((d × l) × l)       (from the point towards the line)
//!
//! J = [ t,  r1 × t,  −t,  −(p1 − x2) × t ]
//! ```
//!
//! Sliding along the line is free; only deviation from it is corrected.

use impulse_types::{BodyHandle, BodySet, Point3, Result, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constraint::{check_distinct, checked_direction, read_bodies, with_bodies};
use crate::jacobian::{normalize_or_zero, scalar_effective_mass, JacobianRow};
use crate::{Constraint, ConstraintParams, DebugLine};

/// Length of the line segment reported by [`Constraint::debug_lines`].
const DEBUG_LINE_LENGTH: f64 = 100.0;

/// Keeps a point fixed on body 1 on a line fixed on body 2, or on a fixed
/// world line when there is no body 2.
///
/// # Example
///
/// ```
/// use impulse_constraint::PointOnLine;
/// use impulse_types::{BodySet, RigidBody};
/// use nalgebra::{Point3, Vector3};
///
/// let mut bodies = BodySet::new();
/// let turret = bodies.insert(RigidBody::dynamic(Point3::origin(), 10.0, Vector3::new(1.0, 1.0, 1.0))?);
///
/// // A rail along world X through the turret's origin.
/// let rail = PointOnLine::from_world(&bodies, turret, None, Point3::origin(), Vector3::x())?;
/// assert_eq!(rail.deviation(&bodies), Some(0.0));
///
/// // A zero-length direction is rejected up front.
/// assert!(PointOnLine::from_world(&bodies, turret, None, Point3::origin(), Vector3::zeros()).is_err());
/// # Ok::<(), impulse_types::SimError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointOnLine {
    body1: BodyHandle,
    body2: Option<BodyHandle>,
    /// Constrained point in body 1 coordinates.
    local_anchor1: Point3<f64>,
    /// A point on the line, in body 2 (or world) coordinates.
    line_anchor: Point3<f64>,
    /// Unit line direction, in body 2 (or world) coordinates.
    line_direction: Vector3<f64>,
    params: ConstraintParams,
    accumulated_impulse: f64,

    // Per-step state.
    jacobian: JacobianRow,
    effective_mass: f64,
    bias: f64,
    softness_over_dt: f64,
    skip: bool,
}

impl PointOnLine {
    /// Default Baumgarte factor.
    pub const DEFAULT_BIAS_FACTOR: f64 = 0.5;
    /// Default softness.
    pub const DEFAULT_SOFTNESS: f64 = 0.0;

    /// Create the constraint from body-local geometry.
    ///
    /// `line_anchor` and `line_direction` are in body 2 coordinates, or world
    /// coordinates when `body2` is `None`.
    ///
    /// # Errors
    ///
    /// Fails with [`SimError::DegenerateGeometry`] if the direction is zero or
    /// not finite, or both handles name the same body.
    ///
    /// [`SimError::DegenerateGeometry`]: impulse_types::SimError::DegenerateGeometry
    pub fn new(
        body1: BodyHandle,
        body2: Option<BodyHandle>,
        local_anchor1: Point3<f64>,
        line_anchor: Point3<f64>,
        line_direction: Vector3<f64>,
    ) -> Result<Self> {
        check_distinct(body1, body2)?;
        let line_direction = checked_direction(&line_direction, "line direction")?;

        Ok(Self {
            body1,
            body2,
            local_anchor1,
            line_anchor,
            line_direction,
            params: ConstraintParams::new(Self::DEFAULT_BIAS_FACTOR, Self::DEFAULT_SOFTNESS),
            accumulated_impulse: 0.0,
            jacobian: JacobianRow::zero(),
            effective_mass: 0.0,
            bias: 0.0,
            softness_over_dt: 0.0,
            skip: true,
        })
    }

    /// Create the constraint from world-space geometry at the current poses.
    ///
    /// The line passes through `point` along `direction`; `point` is also the
    /// constrained point on body 1, so the constraint starts satisfied.
    ///
    /// # Errors
    ///
    /// Fails if a handle is stale, the handles coincide, or the direction is
    /// degenerate.
    pub fn from_world(
        bodies: &BodySet,
        body1: BodyHandle,
        body2: Option<BodyHandle>,
        point: Point3<f64>,
        direction: Vector3<f64>,
    ) -> Result<Self> {
        check_distinct(body1, body2)?;
        let direction = checked_direction(&direction, "line direction")?;
        let (local_anchor1, line_anchor, line_direction) =
            read_bodies(bodies, body1, body2, |b1, b2| {
                (
                    b1.world_to_local_point(&point),
                    b2.world_to_local_point(&point),
                    b2.world_to_local_vector(&direction),
                )
            })?;
        Self::new(body1, body2, local_anchor1, line_anchor, line_direction)
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

    /// Stabilization parameters.
    #[must_use]
    pub fn params(&self) -> &ConstraintParams {
        &self.params
    }

    /// Mutable stabilization parameters.
    pub fn params_mut(&mut self) -> &mut ConstraintParams {
        &mut self.params
    }

    /// Impulse accumulated along the line normal.
    #[must_use]
    pub fn applied_impulse(&self) -> f64 {
        self.accumulated_impulse
    }

    /// Constrained point in body 1 coordinates.
    #[must_use]
    pub fn local_anchor1(&self) -> &Point3<f64> {
        &self.local_anchor1
    }

    /// Unit line direction in body 2 (or world) coordinates.
    #[must_use]
    pub fn line_direction(&self) -> &Vector3<f64> {
        &self.line_direction
    }

    /// Current distance of the constrained point from the line.
    ///
    /// Returns `None` if a handle is stale.
    #[must_use]
    pub fn deviation(&self, bodies: &BodySet) -> Option<f64> {
        read_bodies(bodies, self.body1, self.body2, |b1, b2| {
            let p1 = b1.local_to_world_point(&self.local_anchor1);
            let anchor = b2.local_to_world_point(&self.line_anchor);
            let l = b2.local_to_world_vector(&self.line_direction);
            l.cross(&(p1 - anchor)).norm()
        })
        .ok()
    }
}

impl Constraint for PointOnLine {
    fn body1(&self) -> BodyHandle {
        self.body1
    }

    fn body2(&self) -> Option<BodyHandle> {
        self.body2
    }

    fn prepare_for_iteration(&mut self, bodies: &mut BodySet, dt: f64) {
        let prepared = with_bodies(bodies, self.body1, self.body2, |b1, b2| {
            let r1 = b1.local_to_world_vector(&self.local_anchor1.coords);
            let p1 = b1.position() + r1;
            let anchor = b2.local_to_world_point(&self.line_anchor);
            let l = normalize_or_zero(&b2.local_to_world_vector(&self.line_direction));

            let d = p1 - anchor;
            let t = normalize_or_zero(&d.cross(&l)).cross(&l);
            let lever2 = p1 - b2.position();

            self.jacobian = JacobianRow {
                linear1: t,
                angular1: r1.cross(&t),
                linear2: -t,
                angular2: -lever2.cross(&t),
            };

            self.softness_over_dt = self.params.softness / dt;
            self.effective_mass = scalar_effective_mass(
                self.jacobian.inverse_effective_mass(b1, b2),
                self.softness_over_dt,
            );

            self.bias = -l.cross(&d).norm() * self.params.bias_factor / dt;

            self.jacobian.apply(b1, b2, self.accumulated_impulse);
        });
        self.skip = prepared.is_none();
    }

    fn iterate(&mut self, bodies: &mut BodySet) {
        if self.skip {
            return;
        }
        with_bodies(bodies, self.body1, self.body2, |b1, b2| {
            let jv = self.jacobian.velocity(b1, b2);
            let softness = self.accumulated_impulse * self.softness_over_dt;

            let lambda = -self.effective_mass * (jv + self.bias + softness);
            self.accumulated_impulse += lambda;

            self.jacobian.apply(b1, b2, lambda);
        });
    }

    fn reset(&mut self) {
        self.accumulated_impulse = 0.0;
    }

    fn debug_lines(&self, bodies: &BodySet) -> Vec<DebugLine> {
        read_bodies(bodies, self.body1, self.body2, |b1, b2| {
            let p1 = b1.local_to_world_point(&self.local_anchor1);
            let l = b2.local_to_world_vector(&self.line_direction);
            vec![DebugLine::new(p1, p1 + l * DEBUG_LINE_LENGTH)]
        })
        .unwrap_or_default()
    }
}
