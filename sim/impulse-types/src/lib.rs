//! Core types for the impulse constraint solver.
//!
//! This crate provides the motion-state side of the solver:
//!
//! - [`RigidBody`] - Position, orientation, velocities and inverse mass properties
//! - [`BodySet`] - Generational arena that owns every body
//! - [`BodyHandle`] - Stable handle constraints use to refer to a body
//! - [`SolverConfig`] - Iteration budget and island tunables
//! - [`SimError`] - Construction and configuration errors
//!
//! # Design Philosophy
//!
//! These types are **pure data**. Bodies have no constraint logic and no
//! integrator; the world that owns them advances positions, the constraint
//! crate corrects velocities.
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with no engine or renderer dependencies.
//!
//! # Example
//!
//! ```
//! use impulse_types::{BodySet, RigidBody};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut bodies = BodySet::new();
//! let hull = bodies.insert(RigidBody::dynamic(
//!     Point3::new(0.0, 0.0, 10.0),
//!     1000.0,
//!     Vector3::new(500.0, 500.0, 800.0),
//! )?);
//! let station = bodies.insert(RigidBody::fixed(Point3::origin()));
//!
//! assert!(!bodies[hull].is_static());
//! assert!(bodies[station].is_static());
//! # Ok::<(), impulse_types::SimError>(())
//! ```

#![doc(html_root_url = "https://docs.rs/impulse-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod body;
mod body_set;
mod config;
mod error;

pub use body::{BodyHandle, RigidBody};
pub use body_set::BodySet;
pub use config::SolverConfig;
pub use error::SimError;

// Re-export math types for convenience
pub use nalgebra::{Matrix3, Point3, Vector3};

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, SimError>;
