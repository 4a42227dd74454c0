//! Point-on-point constraint: an anchor on body 1 pulled onto an anchor on
//! body 2, or onto a fixed world point.
//!
//! ```text
//! n = normalize(p2 − p1)
//! J = [ −n,  −(r1 × n),  n,  r2 × n ]
//! bias = ‖p2 − p1‖ · β / dt
//! ```

use impulse_types::{BodyHandle, BodySet, Point3, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constraint::{check_distinct, read_bodies, with_bodies};
use crate::jacobian::{normalize_or_zero, scalar_effective_mass, JacobianRow};
use crate::{Constraint, ConstraintParams, DebugLine};

/// Ball-socket style constraint joining two anchor points.
///
/// # Example
///
/// ```
/// use impulse_constraint::PointOnPoint;
/// use impulse_types::{BodySet, RigidBody};
/// use nalgebra::{Point3, Vector3};
///
/// let mut bodies = BodySet::new();
/// let inertia = Vector3::new(1.0, 1.0, 1.0);
/// let a = bodies.insert(RigidBody::dynamic(Point3::origin(), 1.0, inertia)?);
/// let b = bodies.insert(RigidBody::dynamic(Point3::new(2.0, 0.0, 0.0), 1.0, inertia)?);
///
/// // Join the two bodies at the midpoint between them.
/// let joint = PointOnPoint::from_world(&bodies, a, Some(b), Point3::new(1.0, 0.0, 0.0))?;
/// assert_eq!(joint.separation(&bodies), Some(0.0));
/// # Ok::<(), impulse_types::SimError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointOnPoint {
    body1: BodyHandle,
    body2: Option<BodyHandle>,
    local_anchor1: Point3<f64>,
    /// Body 2 coordinates, or world coordinates when there is no body 2.
    local_anchor2: Point3<f64>,
    params: ConstraintParams,
    accumulated_impulse: f64,

    jacobian: JacobianRow,
    effective_mass: f64,
    bias: f64,
    softness_over_dt: f64,
    skip: bool,
}

impl PointOnPoint {
    /// Default Baumgarte factor.
    pub const DEFAULT_BIAS_FACTOR: f64 = 0.1;
    /// Default softness.
    pub const DEFAULT_SOFTNESS: f64 = 0.0;

    /// Create from body-local anchors.
    ///
    /// # Errors
    ///
    /// Fails if both handles name the same body.
    pub fn new(
        body1: BodyHandle,
        body2: Option<BodyHandle>,
        local_anchor1: Point3<f64>,
        local_anchor2: Point3<f64>,
    ) -> Result<Self> {
        check_distinct(body1, body2)?;
        Ok(Self {
            body1,
            body2,
            local_anchor1,
            local_anchor2,
            params: ConstraintParams::new(Self::DEFAULT_BIAS_FACTOR, Self::DEFAULT_SOFTNESS),
            accumulated_impulse: 0.0,
            jacobian: JacobianRow::zero(),
            effective_mass: 0.0,
            bias: 0.0,
            softness_over_dt: 0.0,
            skip: true,
        })
    }

    /// Create from a single world-space point shared by both bodies.
    ///
    /// # Errors
    ///
    /// Fails if a handle is stale or both handles name the same body.
    pub fn from_world(
        bodies: &BodySet,
        body1: BodyHandle,
        body2: Option<BodyHandle>,
        anchor: Point3<f64>,
    ) -> Result<Self> {
        Self::from_world_anchors(bodies, body1, body2, anchor, anchor)
    }

    /// Create from two world-space anchors, one per body.
    ///
    /// The constraint pulls `anchor1` onto `anchor2`; if they differ it starts
    /// violated.
    ///
    /// # Errors
    ///
    /// Fails if a handle is stale or both handles name the same body.
    pub fn from_world_anchors(
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
        Self::new(body1, body2, local1, local2)
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

    /// Accumulated impulse along the separation direction.
    #[must_use]
    pub fn applied_impulse(&self) -> f64 {
        self.accumulated_impulse
    }

    /// Anchor in body 1 coordinates.
    #[must_use]
    pub fn local_anchor1(&self) -> &Point3<f64> {
        &self.local_anchor1
    }

    /// Anchor in body 2 (or world) coordinates.
    #[must_use]
    pub fn local_anchor2(&self) -> &Point3<f64> {
        &self.local_anchor2
    }

    /// World-space anchors at the current poses.
    ///
    /// Returns `None` if a handle is stale.
    #[must_use]
    pub fn world_anchors(&self, bodies: &BodySet) -> Option<(Point3<f64>, Point3<f64>)> {
        read_bodies(bodies, self.body1, self.body2, |b1, b2| {
            (
                b1.local_to_world_point(&self.local_anchor1),
                b2.local_to_world_point(&self.local_anchor2),
            )
        })
        .ok()
    }

    /// Distance between the two world anchors.
    #[must_use]
    pub fn separation(&self, bodies: &BodySet) -> Option<f64> {
        self.world_anchors(bodies).map(|(p1, p2)| (p2 - p1).norm())
    }
}

impl Constraint for PointOnPoint {
    fn body1(&self) -> BodyHandle {
        self.body1
    }

    fn body2(&self) -> Option<BodyHandle> {
        self.body2
    }

    fn prepare_for_iteration(&mut self, bodies: &mut BodySet, dt: f64) {
        let prepared = with_bodies(bodies, self.body1, self.body2, |b1, b2| {
            let r1 = b1.local_to_world_vector(&self.local_anchor1.coords);
            let r2 = b2.local_to_world_vector(&self.local_anchor2.coords);
            let p1 = b1.position() + r1;
            let p2 = b2.position() + r2;

            let dp = p2 - p1;
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

            self.bias = dp.norm() * self.params.bias_factor / dt;

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
        self.world_anchors(bodies)
            .map(|(p1, p2)| vec![DebugLine::new(p1, p2)])
            .unwrap_or_default()
    }
}
