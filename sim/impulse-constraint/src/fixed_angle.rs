//! Relative orientation lock.
//!
//! # Constraint Formulation
//!
//! ```text
//! D = R2·R2₀ᵀ·R1₀·R1ᵀ          (drift of body 2 relative to body 1)
//! C = axis_angle(D)             (3 rows, one per rotational DOF)
//! J·v = ω1 − ω2
//! K = I1⁻¹ + I2⁻¹ (+ softness/dt · 1)
//! ```
//!
//! `R1₀`, `R2₀` are the orientations recorded at creation. For the world form
//! the second body is the static world frame and `R2 = R2₀ = 1`.
//! Combine with [`PointOnLine`](crate::PointOnLine) for a prismatic slide.

use impulse_types::{BodyHandle, BodySet, Matrix3, Result, Vector3};
use nalgebra::{Rotation3, UnitQuaternion};
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constraint::{check_distinct, read_bodies, with_bodies};
use crate::{Constraint, ConstraintParams, DebugLine};

/// Below this antisymmetric magnitude, with a negative trace, the rotation is
/// treated as a half turn and its axis taken from a quaternion instead.
const HALF_TURN_EPSILON: f64 = 1e-6;

/// Keeps the relative orientation of two bodies, or a body's orientation in
/// the world, at the value it had when the constraint was created.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FixedAngle {
    body1: BodyHandle,
    body2: Option<BodyHandle>,
    initial_orientation1: Matrix3<f64>,
    initial_orientation2: Matrix3<f64>,
    params: ConstraintParams,
    accumulated_impulse: Vector3<f64>,

    // Per-step state.
    effective_mass: Matrix3<f64>,
    bias: Vector3<f64>,
    softness_over_dt: f64,
    skip: bool,
}

impl FixedAngle {
    /// Default Baumgarte factor.
    pub const DEFAULT_BIAS_FACTOR: f64 = 0.05;
    /// Default softness.
    pub const DEFAULT_SOFTNESS: f64 = 0.0;

    /// Lock the current relative orientation of `body1` and `body2`, or of
    /// `body1` against the world when `body2` is `None`.
    ///
    /// # Errors
    ///
    /// Fails if a handle is stale or both handles name the same body.
    pub fn new(bodies: &BodySet, body1: BodyHandle, body2: Option<BodyHandle>) -> Result<Self> {
        check_distinct(body1, body2)?;
        let (r1, r2) = read_bodies(bodies, body1, body2, |b1, b2| {
            (*b1.orientation(), *b2.orientation())
        })?;

        Ok(Self {
            body1,
            body2,
            initial_orientation1: r1,
            initial_orientation2: r2,
            params: ConstraintParams::new(Self::DEFAULT_BIAS_FACTOR, Self::DEFAULT_SOFTNESS),
            accumulated_impulse: Vector3::zeros(),
            effective_mass: Matrix3::zeros(),
            bias: Vector3::zeros(),
            softness_over_dt: 0.0,
            skip: true,
        })
    }

    /// Override the recorded reference orientations.
    #[must_use]
    pub fn with_initial_orientations(
        mut self,
        orientation1: Matrix3<f64>,
        orientation2: Matrix3<f64>,
    ) -> Self {
        self.initial_orientation1 = orientation1;
        self.initial_orientation2 = orientation2;
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

    /// Reference orientation of body 1.
    #[must_use]
    pub fn initial_orientation1(&self) -> &Matrix3<f64> {
        &self.initial_orientation1
    }

    /// Reference orientation of body 2 (identity for the world form).
    #[must_use]
    pub fn initial_orientation2(&self) -> &Matrix3<f64> {
        &self.initial_orientation2
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

    /// Angular impulse accumulated over the current and previous steps.
    #[must_use]
    pub fn applied_impulse(&self) -> &Vector3<f64> {
        &self.accumulated_impulse
    }

    /// Current orientation error as a rotation vector (axis × angle).
    ///
    /// Returns `None` if a handle is stale.
    #[must_use]
    pub fn orientation_error(&self, bodies: &BodySet) -> Option<Vector3<f64>> {
        read_bodies(bodies, self.body1, self.body2, |b1, b2| {
            rotation_vector(&self.drift(b1.orientation(), b2.orientation()))
        })
        .ok()
    }

    fn drift(&self, r1: &Matrix3<f64>, r2: &Matrix3<f64>) -> Matrix3<f64> {
        r2 * self.initial_orientation2.transpose() * self.initial_orientation1 * r1.transpose()
    }
}

impl Constraint for FixedAngle {
    fn body1(&self) -> BodyHandle {
        self.body1
    }

    fn body2(&self) -> Option<BodyHandle> {
        self.body2
    }

    fn prepare_for_iteration(&mut self, bodies: &mut BodySet, dt: f64) {
        let prepared = with_bodies(bodies, self.body1, self.body2, |b1, b2| {
            self.softness_over_dt = self.params.softness / dt;

            let k = b1.inverse_inertia_world()
                + b2.inverse_inertia_world()
                + Matrix3::identity() * self.softness_over_dt;
            self.effective_mass = k.try_inverse().unwrap_or_else(|| {
                trace!(body1 = %self.body1, "singular angular effective mass, constraint inactive this step");
                Matrix3::zeros()
            });

            let error = rotation_vector(&self.drift(b1.orientation(), b2.orientation()));
            self.bias = error * (-self.params.bias_factor / dt);

            b1.apply_angular_impulse(&self.accumulated_impulse);
            b2.apply_angular_impulse(&(-self.accumulated_impulse));
        });
        self.skip = prepared.is_none();
    }

    fn iterate(&mut self, bodies: &mut BodySet) {
        if self.skip {
            return;
        }
        with_bodies(bodies, self.body1, self.body2, |b1, b2| {
            let jv = b1.angular_velocity() - b2.angular_velocity();
            let softness = self.accumulated_impulse * self.softness_over_dt;

            let lambda = -(self.effective_mass * (jv + self.bias + softness));
            self.accumulated_impulse += lambda;

            b1.apply_angular_impulse(&lambda);
            b2.apply_angular_impulse(&(-lambda));
        });
    }

    fn reset(&mut self) {
        self.accumulated_impulse = Vector3::zeros();
    }

    fn debug_lines(&self, bodies: &BodySet) -> Vec<DebugLine> {
        read_bodies(bodies, self.body1, self.body2, |b1, b2| {
            match self.body2 {
                Some(_) => vec![DebugLine::new(*b1.position(), *b2.position())],
                None => {
                    let up = b1.local_to_world_vector(&Vector3::z());
                    vec![DebugLine::new(*b1.position(), b1.position() + up)]
                }
            }
        })
        .unwrap_or_default()
    }
}

/// Rotation vector (axis × angle, radians) of a rotation matrix.
///
/// Uses the antisymmetric part `(R32−R23, R13−R31, R21−R12) = 2·sin θ·axis`
/// with `θ = atan2(‖·‖, trace − 1)`. That part vanishes at a half turn, so
/// near `θ = π` the axis is recovered from the equivalent quaternion.
#[must_use]
pub fn rotation_vector(m: &Matrix3<f64>) -> Vector3<f64> {
    let axis = Vector3::new(
        m[(2, 1)] - m[(1, 2)],
        m[(0, 2)] - m[(2, 0)],
        m[(1, 0)] - m[(0, 1)],
    );
    let r = axis.norm();
    let trace_minus_one = m.trace() - 1.0;

    if r < HALF_TURN_EPSILON && trace_minus_one < 0.0 {
        let rotation = Rotation3::from_matrix_unchecked(*m);
        return UnitQuaternion::from_rotation_matrix(&rotation).scaled_axis();
    }
    if r == 0.0 {
        return Vector3::zeros();
    }

    let angle = r.atan2(trace_minus_one);
    axis * (angle / r)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use impulse_types::{Point3, RigidBody};
    use std::f64::consts::PI;

    fn reference(axis: Vector3<f64>, angle: f64) -> (Matrix3<f64>, Vector3<f64>) {
        let unit = nalgebra::Unit::new_normalize(axis);
        let rot = Rotation3::from_axis_angle(&unit, angle);
        (*rot.matrix(), UnitQuaternion::from_axis_angle(&unit, angle).scaled_axis())
    }

    #[test]
    fn test_rotation_vector_matches_reference() {
        let axes = [
            Vector3::x(),
            Vector3::new(1.0, 2.0, -0.5),
            Vector3::new(-0.3, 0.1, 0.9),
        ];
        for axis in axes {
            for angle in [0.3, 1.0, 2.0, 3.0] {
                let (m, expected) = reference(axis, angle);
                assert_relative_eq!(rotation_vector(&m), expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_rotation_vector_small_angles() {
        // trace ≈ 3: the antisymmetric part still carries the full signal.
        for angle in [1e-3, 1e-6, 1e-9] {
            let (m, expected) = reference(Vector3::new(0.0, 1.0, 1.0), angle);
            let v = rotation_vector(&m);
            assert_relative_eq!(v, expected, epsilon = 1e-15, max_relative = 1e-6);
        }
        assert_eq!(rotation_vector(&Matrix3::identity()), Vector3::zeros());
    }

    #[test]
    fn test_rotation_vector_half_turn() {
        for angle in [PI, PI - 1e-9] {
            let (m, _) = reference(Vector3::new(0.0, 0.0, 1.0), angle);
            let v = rotation_vector(&m);
            assert_relative_eq!(v.norm(), angle, epsilon = 1e-6);
            assert_relative_eq!(v.normalize().z.abs(), 1.0, epsilon = 1e-6);
        }
    }

    fn spinning_pair(w1: Vector3<f64>, w2: Vector3<f64>) -> (BodySet, BodyHandle, BodyHandle) {
        let mut bodies = BodySet::new();
        let inertia = Vector3::new(1.0, 1.0, 1.0);
        let a = bodies.insert(
            RigidBody::dynamic(Point3::origin(), 1.0, inertia)
                .unwrap()
                .with_angular_velocity(w1),
        );
        let b = bodies.insert(
            RigidBody::dynamic(Point3::new(2.0, 0.0, 0.0), 1.0, inertia)
                .unwrap()
                .with_angular_velocity(w2),
        );
        (bodies, a, b)
    }

    #[test]
    fn test_removes_relative_spin() {
        let (mut bodies, a, b) =
            spinning_pair(Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, -1.0));
        let mut c = FixedAngle::new(&bodies, a, Some(b)).unwrap();

        c.prepare_for_iteration(&mut bodies, 1.0 / 60.0);
        c.iterate(&mut bodies);

        // Equal inertia: both end at the mean angular velocity.
        assert_relative_eq!(*bodies[a].angular_velocity(), Vector3::zeros(), epsilon = 1e-12);
        assert_relative_eq!(*bodies[b].angular_velocity(), Vector3::zeros(), epsilon = 1e-12);
        assert_relative_eq!(c.applied_impulse().z, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_corrects_orientation_drift() {
        let (mut bodies, a, b) = spinning_pair(Vector3::zeros(), Vector3::zeros());
        let mut c = FixedAngle::new(&bodies, a, Some(b))
            .unwrap()
            .with_bias_factor(0.5);

        let twist = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.2);
        bodies.get_mut(b).unwrap().set_orientation(*twist.matrix());

        let error = c.orientation_error(&bodies).unwrap();
        assert_relative_eq!(error, Vector3::new(0.0, 0.0, 0.2), epsilon = 1e-12);

        c.prepare_for_iteration(&mut bodies, 0.1);
        for _ in 0..10 {
            c.iterate(&mut bodies);
        }

        // Body 2 is driven back (negative z spin), body 1 forward.
        assert!(bodies[b].angular_velocity().z < 0.0);
        assert!(bodies[a].angular_velocity().z > 0.0);
        let relative = bodies[a].angular_velocity() - bodies[b].angular_velocity();
        assert_relative_eq!(relative.z, 0.2 * 0.5 / 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_world_form_holds_static_orientation() {
        let mut bodies = BodySet::new();
        let a = bodies.insert(
            RigidBody::dynamic(Point3::origin(), 1.0, Vector3::new(2.0, 2.0, 2.0))
                .unwrap()
                .with_angular_velocity(Vector3::new(0.5, -0.5, 0.0)),
        );
        let mut c = FixedAngle::new(&bodies, a, None).unwrap();
        assert!(c.is_world_constraint());
        assert_eq!(*c.initial_orientation2(), Matrix3::identity());

        c.prepare_for_iteration(&mut bodies, 1.0 / 60.0);
        c.iterate(&mut bodies);
        assert_relative_eq!(*bodies[a].angular_velocity(), Vector3::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn test_both_static_is_noop() {
        let mut bodies = BodySet::new();
        let a = bodies.insert(RigidBody::fixed(Point3::origin()));
        let mut c = FixedAngle::new(&bodies, a, None).unwrap();
        c.prepare_for_iteration(&mut bodies, 1.0 / 60.0);
        c.iterate(&mut bodies);
        assert_eq!(*c.applied_impulse(), Vector3::zeros());
        assert!(c.applied_impulse().iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_rejects_same_body() {
        let (bodies, a, _) = spinning_pair(Vector3::zeros(), Vector3::zeros());
        assert!(FixedAngle::new(&bodies, a, Some(a)).is_err());
    }
}
