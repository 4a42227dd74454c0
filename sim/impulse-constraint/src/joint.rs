//! Closed sum over the built-in constraint variants.

use impulse_types::{BodyHandle, BodySet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    Constraint, ConstraintKind, DebugLine, FixedAngle, PointOnLine, PointOnPoint,
    PointPointDistance,
};

/// Any built-in constraint, dispatched without boxing.
///
/// Lets a world keep every joint in one `Vec` and hand it to
/// [`SequentialImpulseSolver::solve`](crate::SequentialImpulseSolver::solve).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JointConstraint {
    /// Relative orientation lock.
    FixedAngle(FixedAngle),
    /// Point kept on a line.
    PointOnLine(PointOnLine),
    /// Point pulled onto a point.
    PointOnPoint(PointOnPoint),
    /// Anchor distance held, capped or floored.
    PointPointDistance(PointPointDistance),
}

macro_rules! dispatch {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            JointConstraint::FixedAngle($c) => $body,
            JointConstraint::PointOnLine($c) => $body,
            JointConstraint::PointOnPoint($c) => $body,
            JointConstraint::PointPointDistance($c) => $body,
        }
    };
}

impl JointConstraint {
    /// Which variant this is.
    #[must_use]
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Self::FixedAngle(_) => ConstraintKind::FixedAngle,
            Self::PointOnLine(_) => ConstraintKind::PointOnLine,
            Self::PointOnPoint(_) => ConstraintKind::PointOnPoint,
            Self::PointPointDistance(_) => ConstraintKind::PointPointDistance,
        }
    }

    /// Magnitude of the accumulated impulse, whatever its dimension.
    #[must_use]
    pub fn applied_impulse_magnitude(&self) -> f64 {
        match self {
            Self::FixedAngle(c) => c.applied_impulse().norm(),
            Self::PointOnLine(c) => c.applied_impulse().abs(),
            Self::PointOnPoint(c) => c.applied_impulse().abs(),
            Self::PointPointDistance(c) => c.applied_impulse().abs(),
        }
    }
}

impl Constraint for JointConstraint {
    fn body1(&self) -> BodyHandle {
        dispatch!(self, c => c.body1())
    }

    fn body2(&self) -> Option<BodyHandle> {
        dispatch!(self, c => c.body2())
    }

    fn prepare_for_iteration(&mut self, bodies: &mut BodySet, dt: f64) {
        dispatch!(self, c => c.prepare_for_iteration(bodies, dt));
    }

    fn iterate(&mut self, bodies: &mut BodySet) {
        dispatch!(self, c => c.iterate(bodies));
    }

    fn reset(&mut self) {
        dispatch!(self, c => c.reset());
    }

    fn debug_lines(&self, bodies: &BodySet) -> Vec<DebugLine> {
        dispatch!(self, c => c.debug_lines(bodies))
    }
}

impl From<FixedAngle> for JointConstraint {
    fn from(c: FixedAngle) -> Self {
        Self::FixedAngle(c)
    }
}

impl From<PointOnLine> for JointConstraint {
    fn from(c: PointOnLine) -> Self {
        Self::PointOnLine(c)
    }
}

impl From<PointOnPoint> for JointConstraint {
    fn from(c: PointOnPoint) -> Self {
        Self::PointOnPoint(c)
    }
}

impl From<PointPointDistance> for JointConstraint {
    fn from(c: PointPointDistance) -> Self {
        Self::PointPointDistance(c)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use impulse_types::{Point3, RigidBody, Vector3};

    #[test]
    fn test_kinds_and_dispatch() {
        let mut bodies = BodySet::new();
        let inertia = Vector3::new(1.0, 1.0, 1.0);
        let a = bodies.insert(RigidBody::dynamic(Point3::origin(), 1.0, inertia).unwrap());
        let b = bodies.insert(
            RigidBody::dynamic(Point3::new(1.0, 0.0, 0.0), 1.0, inertia).unwrap(),
        );

        let joints: Vec<JointConstraint> = vec![
            FixedAngle::new(&bodies, a, Some(b)).unwrap().into(),
            PointOnLine::new(a, None, Point3::origin(), Point3::origin(), Vector3::x())
                .unwrap()
                .into(),
            PointOnPoint::new(a, Some(b), Point3::origin(), Point3::origin())
                .unwrap()
                .into(),
            PointPointDistance::new(a, Some(b), Point3::origin(), Point3::origin(), 1.0)
                .unwrap()
                .into(),
        ];

        let kinds: Vec<_> = joints.iter().map(JointConstraint::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ConstraintKind::FixedAngle,
                ConstraintKind::PointOnLine,
                ConstraintKind::PointOnPoint,
                ConstraintKind::PointPointDistance,
            ]
        );
        assert!(joints[1].is_world_constraint());
        assert_eq!(joints[2].body2(), Some(b));
        assert_eq!(joints[3].debug_lines(&bodies).len(), 1);
    }

    #[test]
    fn test_reset_through_enum() {
        let mut bodies = BodySet::new();
        let a = bodies.insert(
            RigidBody::dynamic(Point3::new(0.0, 2.0, 0.0), 1.0, Vector3::new(1.0, 1.0, 1.0))
                .unwrap(),
        );
        let mut joint: JointConstraint =
            PointOnPoint::new(a, None, Point3::origin(), Point3::origin())
                .unwrap()
                .into();

        joint.prepare_for_iteration(&mut bodies, 0.1);
        joint.iterate(&mut bodies);
        assert!(joint.applied_impulse_magnitude() > 0.0);

        joint.reset();
        assert_relative_eq!(joint.applied_impulse_magnitude(), 0.0);
    }
}
