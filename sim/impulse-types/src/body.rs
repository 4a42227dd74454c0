//! Rigid body motion state.
//!
//! A [`RigidBody`] is a plain record of everything the constraint solver reads
//! and writes: position, orientation, linear and angular velocity, inverse
//! mass and the world-space inverse inertia tensor. It carries no constraint
//! logic. Constraints change velocities only through
//! [`RigidBody::apply_linear_impulse`] and [`RigidBody::apply_angular_impulse`],
//! which add a correction and never overwrite the full velocity.
//!
//! # Static bodies
//!
//! A static body always reports zero inverse mass and zero inverse inertia,
//! and never accepts a velocity change. The mass properties a body had while
//! dynamic are kept so that [`RigidBody::set_static`] can be undone.

use nalgebra::{Matrix3, Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Result, SimError};

/// Stable handle to a body stored in a [`BodySet`](crate::BodySet).
///
/// The generation is bumped every time a slot is freed, so a handle to a
/// removed body never resolves to whatever body reuses its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyHandle {
    index: u32,
    generation: u32,
}

impl BodyHandle {
    /// Create a handle from its raw parts.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index in the owning arena.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot this handle was issued for.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({}v{})", self.index, self.generation)
    }
}

/// Motion state of a single rigid body.
///
/// # Example
///
/// ```
/// use impulse_types::RigidBody;
/// use nalgebra::{Point3, Vector3};
///
/// let mut body = RigidBody::dynamic(Point3::origin(), 2.0, Vector3::new(1.0, 1.0, 1.0))?;
/// body.apply_linear_impulse(&Vector3::new(4.0, 0.0, 0.0));
/// assert_eq!(body.linear_velocity().x, 2.0);
/// # Ok::<(), impulse_types::SimError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidBody {
    position: Point3<f64>,
    /// Rotation matrix, body-local to world.
    orientation: Matrix3<f64>,
    linear_velocity: Vector3<f64>,
    angular_velocity: Vector3<f64>,
    /// Inverse mass while dynamic.
    inv_mass: f64,
    /// Inverse inertia tensor in body-local coordinates.
    inv_inertia_local: Matrix3<f64>,
    /// Cached `R * I⁻¹ * Rᵀ`; zero while static.
    inv_inertia_world: Matrix3<f64>,
    is_static: bool,
    is_active: bool,
}

impl RigidBody {
    /// Create a dynamic body with a diagonal inertia tensor.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidMassProperties`] if the mass or any
    /// principal moment is not positive and finite.
    pub fn dynamic(position: Point3<f64>, mass: f64, inertia: Vector3<f64>) -> Result<Self> {
        if inertia.iter().any(|&i| !i.is_finite() || i <= 0.0) {
            return Err(SimError::invalid_mass(format!(
                "principal moments must be positive and finite, got {inertia:?}"
            )));
        }
        Self::with_inertia_tensor(position, mass, Matrix3::from_diagonal(&inertia))
    }

    /// Create a dynamic body with a full body-local inertia tensor.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidMassProperties`] if the mass is not positive
    /// and finite, or the tensor is not finite, symmetric and positive
    /// definite.
    pub fn with_inertia_tensor(
        position: Point3<f64>,
        mass: f64,
        inertia: Matrix3<f64>,
    ) -> Result<Self> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(SimError::invalid_mass(format!(
                "mass must be positive and finite, got {mass}"
            )));
        }
        if inertia.iter().any(|x| !x.is_finite()) {
            return Err(SimError::invalid_mass("inertia tensor is not finite"));
        }
        if (inertia - inertia.transpose()).amax() > 1e-9 * inertia.amax().max(1.0) {
            return Err(SimError::invalid_mass("inertia tensor must be symmetric"));
        }

        // Physical inertia is positive definite
        let eigenvalues = inertia.symmetric_eigenvalues();
        if eigenvalues.iter().any(|&e| e <= 0.0) {
            return Err(SimError::invalid_mass(format!(
                "inertia tensor must be positive definite, got eigenvalues {eigenvalues:?}"
            )));
        }
        let inv_inertia_local = inertia
            .try_inverse()
            .ok_or_else(|| SimError::invalid_mass("inertia tensor is singular"))?;

        Ok(Self {
            position,
            orientation: Matrix3::identity(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            inv_mass: 1.0 / mass,
            inv_inertia_local,
            inv_inertia_world: inv_inertia_local,
            is_static: false,
            is_active: true,
        })
    }

    /// Create a static body at the given position.
    #[must_use]
    pub fn fixed(position: Point3<f64>) -> Self {
        Self {
            position,
            orientation: Matrix3::identity(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            inv_mass: 0.0,
            inv_inertia_local: Matrix3::zeros(),
            inv_inertia_world: Matrix3::zeros(),
            is_static: true,
            is_active: true,
        }
    }

    /// The static world frame: origin, identity orientation.
    ///
    /// Single-body constraints use this as their implicit second body.
    #[must_use]
    pub fn world() -> Self {
        Self::fixed(Point3::origin())
    }

    /// Set the initial orientation.
    #[must_use]
    pub fn with_orientation(mut self, orientation: Matrix3<f64>) -> Self {
        self.set_orientation(orientation);
        self
    }

    /// Set the initial linear velocity.
    #[must_use]
    pub fn with_linear_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.set_linear_velocity(velocity);
        self
    }

    /// Set the initial angular velocity.
    #[must_use]
    pub fn with_angular_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.set_angular_velocity(velocity);
        self
    }

    /// Set whether the body starts active.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    /// Position of the center of mass in world coordinates.
    #[must_use]
    pub fn position(&self) -> &Point3<f64> {
        &self.position
    }

    /// Orientation as a body-to-world rotation matrix.
    #[must_use]
    pub fn orientation(&self) -> &Matrix3<f64> {
        &self.orientation
    }

    /// Linear velocity of the center of mass.
    #[must_use]
    pub fn linear_velocity(&self) -> &Vector3<f64> {
        &self.linear_velocity
    }

    /// Angular velocity in world coordinates.
    #[must_use]
    pub fn angular_velocity(&self) -> &Vector3<f64> {
        &self.angular_velocity
    }

    /// Inverse mass (0 for static bodies).
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        if self.is_static {
            0.0
        } else {
            self.inv_mass
        }
    }

    /// Inverse inertia tensor in world coordinates (zero for static bodies).
    #[must_use]
    pub fn inverse_inertia_world(&self) -> &Matrix3<f64> {
        &self.inv_inertia_world
    }

    /// Whether the body is static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Whether the body is awake.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Set the linear velocity. Ignored for static bodies.
    pub fn set_linear_velocity(&mut self, velocity: Vector3<f64>) {
        if !self.is_static {
            self.linear_velocity = velocity;
        }
    }

    /// Set the angular velocity. Ignored for static bodies.
    pub fn set_angular_velocity(&mut self, velocity: Vector3<f64>) {
        if !self.is_static {
            self.angular_velocity = velocity;
        }
    }

    /// Move the center of mass.
    pub fn set_position(&mut self, position: Point3<f64>) {
        self.position = position;
    }

    /// Replace the orientation and refresh the world-space inverse inertia.
    pub fn set_orientation(&mut self, orientation: Matrix3<f64>) {
        self.orientation = orientation;
        self.update_world_inertia();
    }

    /// Switch between static and dynamic.
    ///
    /// Making a body static zeroes its velocities; making it dynamic again
    /// restores the mass properties it was created with.
    pub fn set_static(&mut self, is_static: bool) {
        self.is_static = is_static;
        if is_static {
            self.linear_velocity = Vector3::zeros();
            self.angular_velocity = Vector3::zeros();
        }
        self.update_world_inertia();
    }

    /// Wake the body up or put it to sleep.
    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    /// Add `inv_mass * impulse` to the linear velocity.
    pub fn apply_linear_impulse(&mut self, impulse: &Vector3<f64>) {
        if !self.is_static {
            self.linear_velocity += impulse * self.inv_mass;
        }
    }

    /// Add `I⁻¹_world * impulse` to the angular velocity.
    pub fn apply_angular_impulse(&mut self, impulse: &Vector3<f64>) {
        if !self.is_static {
            self.angular_velocity += self.inv_inertia_world * impulse;
        }
    }

    /// Velocity of a world-space point rigidly attached to this body.
    #[must_use]
    pub fn point_velocity(&self, world_point: &Point3<f64>) -> Vector3<f64> {
        let r = world_point - self.position;
        self.linear_velocity + self.angular_velocity.cross(&r)
    }

    /// Transform a body-local point to world coordinates.
    #[must_use]
    pub fn local_to_world_point(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.orientation * local.coords
    }

    /// Transform a world point to body-local coordinates.
    #[must_use]
    pub fn world_to_local_point(&self, world: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.orientation.transpose() * (world - self.position))
    }

    /// Rotate a body-local vector into world coordinates.
    #[must_use]
    pub fn local_to_world_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.orientation * local
    }

    /// Rotate a world vector into body-local coordinates.
    #[must_use]
    pub fn world_to_local_vector(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.orientation.transpose() * world
    }

    /// Linear momentum (zero for static bodies).
    #[must_use]
    pub fn linear_momentum(&self) -> Vector3<f64> {
        if self.is_static || self.inv_mass == 0.0 {
            Vector3::zeros()
        } else {
            self.linear_velocity / self.inv_mass
        }
    }

    /// Check that no state component is `NaN` or infinite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|x| x.is_finite())
            && self.orientation.iter().all(|x| x.is_finite())
            && self.linear_velocity.iter().all(|x| x.is_finite())
            && self.angular_velocity.iter().all(|x| x.is_finite())
    }

    fn update_world_inertia(&mut self) {
        self.inv_inertia_world = if self.is_static {
            Matrix3::zeros()
        } else {
            self.orientation * self.inv_inertia_local * self.orientation.transpose()
        };
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Rotation3;

    fn unit_body() -> RigidBody {
        RigidBody::dynamic(Point3::origin(), 1.0, Vector3::new(1.0, 1.0, 1.0)).unwrap()
    }

    #[test]
    fn test_rejects_bad_mass() {
        assert!(RigidBody::dynamic(Point3::origin(), 0.0, Vector3::new(1.0, 1.0, 1.0)).is_err());
        assert!(RigidBody::dynamic(Point3::origin(), f64::NAN, Vector3::new(1.0, 1.0, 1.0)).is_err());
        assert!(RigidBody::dynamic(Point3::origin(), 1.0, Vector3::new(1.0, 0.0, 1.0)).is_err());
        assert!(
            RigidBody::with_inertia_tensor(Point3::origin(), 1.0, Matrix3::zeros()).is_err()
        );
    }

    #[test]
    fn test_rejects_non_positive_definite_tensor() {
        let indefinite = Matrix3::from_diagonal(&Vector3::new(-1.0, 1.0, 1.0));
        let err = RigidBody::with_inertia_tensor(Point3::origin(), 1.0, indefinite).unwrap_err();
        assert!(matches!(err, SimError::InvalidMassProperties { .. }));

        // Invertible with a positive diagonal, but one eigenvalue is negative
        let sheared = Matrix3::new(1.0, 2.0, 0.0, 2.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        assert!(sheared.try_inverse().is_some());
        assert!(RigidBody::with_inertia_tensor(Point3::origin(), 1.0, sheared).is_err());

        let asymmetric = Matrix3::new(2.0, 0.5, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0);
        assert!(RigidBody::with_inertia_tensor(Point3::origin(), 1.0, asymmetric).is_err());

        let tilted = Matrix3::new(2.0, 0.5, 0.0, 0.5, 2.0, 0.0, 0.0, 0.0, 1.0);
        let body = RigidBody::with_inertia_tensor(Point3::origin(), 1.0, tilted).unwrap();
        assert_relative_eq!(*body.inverse_inertia_world() * tilted, Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_static_body_invariant() {
        let mut body = RigidBody::fixed(Point3::new(1.0, 2.0, 3.0));
        assert_eq!(body.inverse_mass(), 0.0);
        assert_eq!(*body.inverse_inertia_world(), Matrix3::zeros());

        body.apply_linear_impulse(&Vector3::new(10.0, 0.0, 0.0));
        body.apply_angular_impulse(&Vector3::new(0.0, 10.0, 0.0));
        body.set_linear_velocity(Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(*body.linear_velocity(), Vector3::zeros());
        assert_eq!(*body.angular_velocity(), Vector3::zeros());
    }

    #[test]
    fn test_set_static_round_trip() {
        let mut body = unit_body().with_linear_velocity(Vector3::new(1.0, 0.0, 0.0));
        body.set_static(true);
        assert_eq!(body.inverse_mass(), 0.0);
        assert_eq!(*body.linear_velocity(), Vector3::zeros());
        assert_eq!(*body.inverse_inertia_world(), Matrix3::zeros());

        body.set_static(false);
        assert_eq!(body.inverse_mass(), 1.0);
        assert_relative_eq!(*body.inverse_inertia_world(), Matrix3::identity());
    }

    #[test]
    fn test_world_inertia_follows_orientation() {
        let mut body =
            RigidBody::dynamic(Point3::origin(), 1.0, Vector3::new(1.0, 2.0, 4.0)).unwrap();
        let rot = Rotation3::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2);
        body.set_orientation(*rot.matrix());

        // Local x (I = 1) now points along world y.
        let inv = body.inverse_inertia_world();
        assert_relative_eq!(inv[(1, 1)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(inv[(0, 0)], 0.5, epsilon = 1e-12);
        assert_relative_eq!(inv[(2, 2)], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_impulse_application() {
        let mut body =
            RigidBody::dynamic(Point3::origin(), 2.0, Vector3::new(0.5, 0.5, 0.5)).unwrap();
        body.apply_linear_impulse(&Vector3::new(2.0, 0.0, 0.0));
        body.apply_angular_impulse(&Vector3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(body.linear_velocity().x, 1.0);
        assert_relative_eq!(body.angular_velocity().z, 2.0);
        assert_relative_eq!(body.linear_momentum().x, 2.0);
    }

    #[test]
    fn test_point_transforms() {
        let rot = Rotation3::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2);
        let body = unit_body()
            .with_orientation(*rot.matrix())
            .with_angular_velocity(Vector3::new(0.0, 0.0, 1.0));

        let world = body.local_to_world_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(world, Point3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(
            body.world_to_local_point(&world),
            Point3::new(1.0, 0.0, 0.0),
            epsilon = 1e-12
        );

        // ω × r with ω = z, r = y gives -x.
        let v = body.point_velocity(&world);
        assert_relative_eq!(v, Vector3::new(-1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(BodyHandle::new(3, 1).to_string(), "Body(3v1)");
    }
}
