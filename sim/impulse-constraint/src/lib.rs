//! Sequential-impulse constraints for rigid body simulation.
//!
//! This crate corrects body velocities so that joint-style constraints hold:
//! docking clamps, turret pivots, rails and tow lines.
//!
//! # Constraint Types
//!
//! - [`FixedAngle`]: Locks relative orientation (3 rotational rows)
//! - [`PointOnLine`]: Keeps a point on a line; sliding along it is free
//! - [`PointOnPoint`]: Pulls an anchor onto another anchor (ball socket)
//! - [`PointPointDistance`]: Holds, caps or floors anchor distance (rod, rope, strut)
//!
//! Each has a two-body form and a single-body form against the static world
//! frame (`body2 = None`). [`JointConstraint`] is the closed sum over all four.
//!
//! # Solver Protocol
//!
//! Every [`Constraint`] is solved in two phases per step:
//!
//! ```text
//! prepare_for_iteration(dt)    once: Jacobian, effective mass, bias, warm start
//! iterate() × N                λ = −m_eff · (J·v + bias + λ_acc · softness/dt)
//! ```
//!
//! The accumulated impulse `λ_acc` lives on the constraint and carries over
//! between steps until [`Constraint::reset`] is called.
//! [`SequentialImpulseSolver`] drives the protocol over a slice of
//! constraints, optionally split into [`ConstraintIslands`].
//!
//! # Example
//!
//! ```
//! use impulse_constraint::{
//!     FixedAngle, JointConstraint, PointOnLine, SequentialImpulseSolver,
//! };
//! use impulse_types::{BodySet, RigidBody, SolverConfig};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut bodies = BodySet::new();
//! let station = bodies.insert(RigidBody::fixed(Point3::origin()));
//! let shuttle = bodies.insert(RigidBody::dynamic(
//!     Point3::new(0.0, 0.0, 20.0),
//!     200.0,
//!     Vector3::new(80.0, 80.0, 40.0),
//! )?);
//!
//! // Docking approach: the shuttle may only slide along the station's Z axis
//! // and must keep its attitude.
//! let mut joints: Vec<JointConstraint> = vec![
//!     PointOnLine::from_world(&bodies, shuttle, Some(station), Point3::new(0.0, 0.0, 20.0), Vector3::z())?.into(),
//!     FixedAngle::new(&bodies, shuttle, Some(station))?.into(),
//! ];
//!
//! let solver = SequentialImpulseSolver::new(SolverConfig::default());
//! let stats = solver.solve(&mut joints, &mut bodies, 1.0 / 60.0)?;
//! assert_eq!(stats.constraints_solved, 2);
//! # Ok::<(), impulse_types::SimError>(())
//! ```
//!
//! # Layer 0 Crate
//!
//! No engine or renderer dependencies. Integration of positions, collision
//! detection and world bookkeeping stay with the caller.

#![doc(html_root_url = "https://docs.rs/impulse-constraint/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod constraint;
mod distance;
mod fixed_angle;
mod islands;
mod jacobian;
mod joint;
mod point_on_line;
mod point_on_point;
mod solver;

pub use constraint::{Constraint, ConstraintKind, ConstraintParams, DebugLine};
pub use distance::{DistanceBehavior, PointPointDistance};
pub use fixed_angle::{rotation_vector, FixedAngle};
pub use islands::{ConstraintIslands, Island, IslandStatistics};
pub use jacobian::JacobianRow;
pub use joint::JointConstraint;
pub use point_on_line::PointOnLine;
pub use point_on_point::PointOnPoint;
pub use solver::{SequentialImpulseSolver, SolveStats};

// Re-export the body types constraints operate on
pub use impulse_types::{BodyHandle, BodySet, RigidBody, SimError, SolverConfig};
