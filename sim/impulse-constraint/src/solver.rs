//! Sequential-impulse solver driver.
//!
//! One solve is a closed sequence for a single time step:
//!
//! 1. Prepare every eligible constraint once (Jacobians, effective mass,
//!    bias, warm start).
//! 2. Run a fixed number of passes, calling `iterate` on every eligible
//!    constraint in slice order.
//!
//! The driver never resets accumulated impulses; they carry over to the next
//! step on the constraint values themselves. Positions are left untouched:
//! the caller integrates the corrected velocities afterwards.

use impulse_types::{BodySet, Result, SimError, SolverConfig};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Constraint, ConstraintIslands};

/// Counters describing one solve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolveStats {
    /// Constraints that were prepared and iterated.
    pub constraints_solved: usize,
    /// Constraints left out (inactive bodies, sleeping islands, stale
    /// handles or no dynamic body).
    pub constraints_skipped: usize,
    /// Iteration passes run, summed over islands.
    pub iterations: usize,
    /// Islands solved. A plain [`SequentialImpulseSolver::solve`] counts as
    /// one island when anything was solved.
    pub islands: usize,
}

/// Drives the prepare-once, iterate-N-times protocol over a constraint set.
///
/// # Example
///
/// ```
/// use impulse_constraint::{PointOnPoint, SequentialImpulseSolver};
/// use impulse_types::{BodySet, RigidBody, SolverConfig};
/// use nalgebra::{Point3, Vector3};
///
/// let mut bodies = BodySet::new();
/// let inertia = Vector3::new(1.0, 1.0, 1.0);
/// let a = bodies.insert(RigidBody::dynamic(Point3::origin(), 1.0, inertia)?);
/// let b = bodies.insert(RigidBody::dynamic(Point3::new(3.0, 0.0, 0.0), 1.0, inertia)?);
///
/// let mut joints = vec![PointOnPoint::new(a, Some(b), Point3::origin(), Point3::origin())?];
///
/// let solver = SequentialImpulseSolver::new(SolverConfig::realtime());
/// let stats = solver.solve(&mut joints, &mut bodies, 1.0 / 60.0)?;
///
/// assert_eq!(stats.constraints_solved, 1);
/// assert!(bodies[a].linear_velocity().x > 0.0);
/// # Ok::<(), impulse_types::SimError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SequentialImpulseSolver {
    config: SolverConfig,
}

impl SequentialImpulseSolver {
    /// Create a solver with the given tunables.
    #[must_use]
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Solver tunables.
    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Mutable solver tunables.
    pub fn config_mut(&mut self) -> &mut SolverConfig {
        &mut self.config
    }

    /// Solve every eligible constraint as one group with
    /// [`SolverConfig::iterations`] passes.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTimestep`] if `dt` is not positive and
    /// finite. Nothing is touched in that case.
    pub fn solve<C: Constraint>(
        &self,
        constraints: &mut [C],
        bodies: &mut BodySet,
        dt: f64,
    ) -> Result<SolveStats> {
        validate_timestep(dt)?;

        let eligible: Vec<usize> = (0..constraints.len())
            .filter(|&i| self.is_eligible(&constraints[i], bodies))
            .collect();

        run_passes(constraints, &eligible, bodies, dt, self.config.iterations);

        let solved_any = !eligible.is_empty();
        let stats = SolveStats {
            constraints_solved: eligible.len(),
            constraints_skipped: constraints.len() - eligible.len(),
            iterations: if solved_any { self.config.iterations } else { 0 },
            islands: usize::from(solved_any),
        };
        debug!(
            solved = stats.constraints_solved,
            skipped = stats.constraints_skipped,
            iterations = stats.iterations,
            dt,
            "constraint solve complete"
        );
        Ok(stats)
    }

    /// Partition the constraints into islands and solve each one separately.
    ///
    /// Islands with `bodies + constraints <= small_island_threshold` get
    /// [`SolverConfig::small_island_iterations`] passes, larger ones
    /// [`SolverConfig::iterations`]. With `skip_inactive` set, islands whose
    /// bodies are all inactive are skipped, as are inactive constraints
    /// inside awake islands. Constraints with no dynamic body or a stale
    /// handle are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTimestep`] if `dt` is not positive and
    /// finite.
    pub fn solve_islands<C: Constraint>(
        &self,
        constraints: &mut [C],
        bodies: &mut BodySet,
        dt: f64,
    ) -> Result<SolveStats> {
        validate_timestep(dt)?;

        let islands = ConstraintIslands::build(constraints, bodies);
        let mut stats = SolveStats {
            constraints_skipped: islands.unassigned_constraints().len(),
            ..SolveStats::default()
        };

        for island in islands.islands() {
            if self.config.skip_inactive && island.is_sleeping {
                stats.constraints_skipped += island.num_constraints();
                continue;
            }

            let eligible: Vec<usize> = island
                .constraint_indices
                .iter()
                .copied()
                .filter(|&i| self.is_eligible(&constraints[i], bodies))
                .collect();
            stats.constraints_skipped += island.num_constraints() - eligible.len();
            if eligible.is_empty() {
                continue;
            }

            let iterations = self
                .config
                .iterations_for_island(island.num_bodies(), island.num_constraints());
            run_passes(constraints, &eligible, bodies, dt, iterations);

            stats.constraints_solved += eligible.len();
            stats.iterations += iterations;
            stats.islands += 1;
        }

        debug!(
            solved = stats.constraints_solved,
            skipped = stats.constraints_skipped,
            iterations = stats.iterations,
            islands = stats.islands,
            dt,
            "island solve complete"
        );
        Ok(stats)
    }

    /// A constraint is skipped only when every body it can resolve is
    /// inactive. Unresolvable constraints stay eligible and no-op themselves.
    fn is_eligible<C: Constraint + ?Sized>(&self, constraint: &C, bodies: &BodySet) -> bool {
        if !self.config.skip_inactive {
            return true;
        }
        let mut resolved = std::iter::once(constraint.body1())
            .chain(constraint.body2())
            .filter_map(|handle| bodies.get(handle))
            .peekable();
        if resolved.peek().is_none() {
            return true;
        }
        resolved.any(|body| body.is_active())
    }
}

fn validate_timestep(dt: f64) -> Result<()> {
    if dt.is_finite() && dt > 0.0 {
        Ok(())
    } else {
        Err(SimError::InvalidTimestep(dt))
    }
}

fn run_passes<C: Constraint>(
    constraints: &mut [C],
    indices: &[usize],
    bodies: &mut BodySet,
    dt: f64,
    iterations: usize,
) {
    for &i in indices {
        constraints[i].prepare_for_iteration(bodies, dt);
    }
    for _ in 0..iterations {
        for &i in indices {
            constraints[i].iterate(bodies);
        }
    }
}
