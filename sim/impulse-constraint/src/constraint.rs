//! The per-step constraint protocol.
//!
//! Every constraint is solved in two phases each step:
//!
//! 1. [`Constraint::prepare_for_iteration`] runs once. It rebuilds world-space
//!    anchors and the Jacobian from the current poses, computes the effective
//!    mass and Baumgarte bias, and re-applies last step's accumulated impulse
//!    (warm start).
//! 2. [`Constraint::iterate`] runs a fixed number of times. Each call reads the
//!    relative velocity along the Jacobian and adds an incremental impulse
//!
//!    ```text
//!    λ = -m_eff · (J·v + bias + λ_acc · softness/dt)
//!    ```
//!
//!    to the accumulated impulse and to the bodies' velocities.

use impulse_types::{BodyHandle, BodySet, Point3, Result, RigidBody, SimError, Vector3};
use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Minimum length accepted for a direction vector at construction.
pub(crate) const MIN_DIRECTION_LENGTH: f64 = 1e-12;

/// A bilateral constraint on one body (against the world) or two bodies.
///
/// Implemented by every built-in variant and by [`JointConstraint`]. External
/// constraint sources, such as a contact bridge, implement it to share the
/// solver driver.
///
/// [`JointConstraint`]: crate::JointConstraint
pub trait Constraint {
    /// The first body.
    fn body1(&self) -> BodyHandle;

    /// The second body, or `None` when constrained against the world.
    fn body2(&self) -> Option<BodyHandle>;

    /// Rebuild per-step state and warm start. Called once per step.
    ///
    /// `dt` must be positive; the solver driver checks this.
    fn prepare_for_iteration(&mut self, bodies: &mut BodySet, dt: f64);

    /// Apply one incremental velocity correction.
    fn iterate(&mut self, bodies: &mut BodySet);

    /// Forget the accumulated impulse so the next step starts cold.
    fn reset(&mut self);

    /// World-space segments describing the constraint, for debug drawing.
    fn debug_lines(&self, _bodies: &BodySet) -> Vec<DebugLine> {
        Vec::new()
    }

    /// Whether this constraint ties a body to the world frame.
    fn is_world_constraint(&self) -> bool {
        self.body2().is_none()
    }
}

impl<C: Constraint + ?Sized> Constraint for Box<C> {
    fn body1(&self) -> BodyHandle {
        (**self).body1()
    }

    fn body2(&self) -> Option<BodyHandle> {
        (**self).body2()
    }

    fn prepare_for_iteration(&mut self, bodies: &mut BodySet, dt: f64) {
        (**self).prepare_for_iteration(bodies, dt);
    }

    fn iterate(&mut self, bodies: &mut BodySet) {
        (**self).iterate(bodies);
    }

    fn reset(&mut self) {
        (**self).reset();
    }

    fn debug_lines(&self, bodies: &BodySet) -> Vec<DebugLine> {
        (**self).debug_lines(bodies)
    }
}

/// Stabilization parameters shared by all constraint variants.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintParams {
    /// Fraction of positional error corrected per step (Baumgarte factor).
    pub bias_factor: f64,
    /// Allowed violation per unit impulse; trades rigidity for stability.
    pub softness: f64,
}

impl ConstraintParams {
    /// Create parameters, clamping the bias factor to `[0, 1]` and the
    /// softness to non-negative values.
    #[must_use]
    pub fn new(bias_factor: f64, softness: f64) -> Self {
        Self::default()
            .with_bias_factor(bias_factor)
            .with_softness(softness)
    }

    /// Set the bias factor, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_bias_factor(mut self, bias_factor: f64) -> Self {
        if bias_factor.is_finite() {
            self.bias_factor = bias_factor.clamp(0.0, 1.0);
        }
        self
    }

    /// Set the softness, clamped to non-negative values.
    #[must_use]
    pub fn with_softness(mut self, softness: f64) -> Self {
        if softness.is_finite() {
            self.softness = softness.max(0.0);
        }
        self
    }
}

impl Default for ConstraintParams {
    fn default() -> Self {
        Self {
            bias_factor: 0.1,
            softness: 0.0,
        }
    }
}

/// Tag identifying a built-in constraint variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConstraintKind {
    /// Relative orientation lock.
    FixedAngle,
    /// Point kept on a line.
    PointOnLine,
    /// Point pulled onto a point.
    PointOnPoint,
    /// Anchor distance held, capped or floored.
    PointPointDistance,
}

/// A world-space segment for debug drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DebugLine {
    /// Segment start.
    pub start: Point3<f64>,
    /// Segment end.
    pub end: Point3<f64>,
}

impl DebugLine {
    /// Create a segment.
    #[must_use]
    pub fn new(start: Point3<f64>, end: Point3<f64>) -> Self {
        Self { start, end }
    }
}

/// Run `f` with mutable access to both bodies of a constraint.
///
/// World constraints receive the static world frame as their second body;
/// impulses applied to it are discarded. Returns `None` and logs a warning
/// if a handle no longer resolves.
pub(crate) fn with_bodies<R>(
    bodies: &mut BodySet,
    body1: BodyHandle,
    body2: Option<BodyHandle>,
    f: impl FnOnce(&mut RigidBody, &mut RigidBody) -> R,
) -> Option<R> {
    match body2 {
        Some(handle2) => {
            let Some((b1, b2)) = bodies.pair_mut(body1, handle2) else {
                warn!(%body1, body2 = %handle2, "constraint references a missing body, skipping");
                return None;
            };
            Some(f(b1, b2))
        }
        None => {
            let Some(b1) = bodies.get_mut(body1) else {
                warn!(%body1, "constraint references a missing body, skipping");
                return None;
            };
            let mut world = RigidBody::world();
            Some(f(b1, &mut world))
        }
    }
}

/// Borrow both bodies immutably, substituting the world frame for `None`.
pub(crate) fn read_bodies<R>(
    bodies: &BodySet,
    body1: BodyHandle,
    body2: Option<BodyHandle>,
    f: impl FnOnce(&RigidBody, &RigidBody) -> R,
) -> Result<R> {
    let b1 = bodies
        .get(body1)
        .ok_or(SimError::InvalidBodyHandle(body1))?;
    match body2 {
        Some(handle2) => {
            let b2 = bodies
                .get(handle2)
                .ok_or(SimError::InvalidBodyHandle(handle2))?;
            Ok(f(b1, b2))
        }
        None => Ok(f(b1, &RigidBody::world())),
    }
}

/// Reject constraints that would couple a body to itself.
pub(crate) fn check_distinct(body1: BodyHandle, body2: Option<BodyHandle>) -> Result<()> {
    if body2 == Some(body1) {
        return Err(SimError::degenerate(format!(
            "constraint needs two distinct bodies, got {body1} twice"
        )));
    }
    Ok(())
}

/// Normalize a construction-time direction or reject it.
pub(crate) fn checked_direction(direction: &Vector3<f64>, what: &str) -> Result<Vector3<f64>> {
    let length = direction.norm();
    if !length.is_finite() || length < MIN_DIRECTION_LENGTH {
        return Err(SimError::degenerate(format!(
            "{what} must be finite and non-zero, got {direction:?}"
        )));
    }
    Ok(direction / length)
}
