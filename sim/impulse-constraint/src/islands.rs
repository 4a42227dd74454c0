//! Constraint islands.
//!
//! An island is a group of dynamic bodies linked by constraints, together with
//! those constraints. Islands share no dynamic body, so they can be solved one
//! after another with their own iteration budget, and an island whose bodies
//! are all inactive can be skipped outright.
//!
//! # Algorithm
//!
//! Island detection uses a union-find (disjoint-set) structure:
//!
//! 1. Each dynamic body starts in its own set
//! 2. For each constraint, union the sets of its dynamic bodies
//! 3. Extract membership with path compression
//!
//! Static bodies and the world frame never join sets: a ship docked to a
//! station does not merge with every other ship docked to it.
//!
//! # Example
//!
//! ```
//! use impulse_constraint::{ConstraintIslands, PointOnPoint};
//! use impulse_types::{BodySet, RigidBody};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut bodies = BodySet::new();
//! let inertia = Vector3::new(1.0, 1.0, 1.0);
//! let mut body = |x: f64| bodies.insert(RigidBody::dynamic(Point3::new(x, 0.0, 0.0), 1.0, inertia).unwrap());
//! let (a, b, c, d) = (body(0.0), body(1.0), body(5.0), body(6.0));
//!
//! let joints = vec![
//!     PointOnPoint::new(a, Some(b), Point3::origin(), Point3::origin())?,
//!     PointOnPoint::new(c, Some(d), Point3::origin(), Point3::origin())?,
//! ];
//!
//! let islands = ConstraintIslands::build(&joints, &bodies);
//! assert_eq!(islands.num_islands(), 2);
//! assert!(!islands.same_island(a, c));
//! # Ok::<(), impulse_types::SimError>(())
//! ```

use impulse_types::{BodyHandle, BodySet};
use std::collections::HashMap;

use crate::Constraint;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Connected dynamic bodies and the constraints that link them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Island {
    /// Dynamic bodies in this island, sorted for determinism.
    pub bodies: Vec<BodyHandle>,

    /// Indices into the constraint slice the islands were built from, in
    /// slice order.
    pub constraint_indices: Vec<usize>,

    /// Every body in the island is inactive.
    pub is_sleeping: bool,
}

impl Island {
    /// Number of bodies in this island.
    #[must_use]
    pub fn num_bodies(&self) -> usize {
        self.bodies.len()
    }

    /// Number of constraints in this island.
    #[must_use]
    pub fn num_constraints(&self) -> usize {
        self.constraint_indices.len()
    }

    /// Check if this island contains a specific body.
    #[must_use]
    pub fn contains_body(&self, body: BodyHandle) -> bool {
        self.bodies.binary_search(&body).is_ok()
    }
}

/// Partition of a constraint set into independent islands.
#[derive(Debug, Clone, Default)]
pub struct ConstraintIslands {
    islands: Vec<Island>,
    body_to_island: HashMap<BodyHandle, usize>,
    /// Constraints touching no dynamic body, or naming a stale handle.
    unassigned: Vec<usize>,
    total_bodies: usize,
    total_constraints: usize,
}

impl ConstraintIslands {
    /// Partition `constraints` using the body states in `bodies`.
    ///
    /// A constraint joins the island of its dynamic bodies. Constraints that
    /// touch only static bodies or the world, or that name a body no longer
    /// in the set, are reported by [`unassigned_constraints`](Self::unassigned_constraints).
    #[must_use]
    pub fn build<C: Constraint>(constraints: &[C], bodies: &BodySet) -> Self {
        if constraints.is_empty() {
            return Self::default();
        }

        let mut body_index: HashMap<BodyHandle, usize> = HashMap::new();
        let mut handles: Vec<BodyHandle> = Vec::new();
        // Dynamic participants per constraint; `None` when a handle is stale.
        let mut participants: Vec<Option<(Option<usize>, Option<usize>)>> =
            Vec::with_capacity(constraints.len());

        // `None` when the handle is stale, `Some(None)` for static bodies.
        let dynamic = |handle: BodyHandle| -> Option<Option<BodyHandle>> {
            let body = bodies.get(handle)?;
            Some((!body.is_static()).then_some(handle))
        };
        let mut register = |handle: BodyHandle| -> usize {
            let next = handles.len();
            *body_index.entry(handle).or_insert_with(|| {
                handles.push(handle);
                next
            })
        };

        for constraint in constraints {
            let first = dynamic(constraint.body1());
            let second = match constraint.body2() {
                Some(handle) => dynamic(handle),
                None => Some(None),
            };
            // Bodies join only once both handles resolve.
            participants.push(
                first
                    .zip(second)
                    .map(|(a, b)| (a.map(&mut register), b.map(&mut register))),
            );
        }

        let mut uf = UnionFind::new(handles.len());
        for &(a, b) in participants.iter().flatten() {
            if let (Some(a), Some(b)) = (a, b) {
                uf.union(a, b);
            }
        }

        let mut root_to_island: HashMap<usize, usize> = HashMap::new();
        let mut islands: Vec<Island> = Vec::new();
        let mut body_to_island: HashMap<BodyHandle, usize> = HashMap::new();
        let mut island_of_index = vec![0; handles.len()];

        for (idx, &handle) in handles.iter().enumerate() {
            let root = uf.find(idx);
            let island_idx = *root_to_island.entry(root).or_insert_with(|| {
                islands.push(Island::default());
                islands.len() - 1
            });
            islands[island_idx].bodies.push(handle);
            body_to_island.insert(handle, island_idx);
            island_of_index[idx] = island_idx;
        }

        let mut unassigned = Vec::new();
        for (constraint_idx, participant) in participants.iter().enumerate() {
            match participant {
                Some((Some(idx), _) | (None, Some(idx))) => {
                    islands[island_of_index[*idx]]
                        .constraint_indices
                        .push(constraint_idx);
                }
                _ => unassigned.push(constraint_idx),
            }
        }

        for island in &mut islands {
            island.bodies.sort();
            island.is_sleeping = island
                .bodies
                .iter()
                .all(|&h| bodies.get(h).is_some_and(|b| !b.is_active()));
        }

        Self {
            islands,
            body_to_island,
            unassigned,
            total_bodies: handles.len(),
            total_constraints: constraints.len(),
        }
    }

    /// Number of islands.
    #[must_use]
    pub fn num_islands(&self) -> usize {
        self.islands.len()
    }

    /// Number of distinct dynamic bodies across all islands.
    #[must_use]
    pub fn total_bodies(&self) -> usize {
        self.total_bodies
    }

    /// Number of constraints the islands were built from.
    #[must_use]
    pub fn total_constraints(&self) -> usize {
        self.total_constraints
    }

    /// All islands.
    #[must_use]
    pub fn islands(&self) -> &[Island] {
        &self.islands
    }

    /// A specific island by index.
    #[must_use]
    pub fn get_island(&self, index: usize) -> Option<&Island> {
        self.islands.get(index)
    }

    /// Island index of a dynamic body.
    #[must_use]
    pub fn island_for_body(&self, body: BodyHandle) -> Option<usize> {
        self.body_to_island.get(&body).copied()
    }

    /// Whether two bodies are in the same island.
    #[must_use]
    pub fn same_island(&self, body_a: BodyHandle, body_b: BodyHandle) -> bool {
        match (
            self.body_to_island.get(&body_a),
            self.body_to_island.get(&body_b),
        ) {
            (Some(&a), Some(&b)) => a == b,
            _ => false,
        }
    }

    /// Constraints that belong to no island.
    #[must_use]
    pub fn unassigned_constraints(&self) -> &[usize] {
        &self.unassigned
    }

    /// Number of islands with at least one active body.
    #[must_use]
    pub fn num_awake_islands(&self) -> usize {
        self.islands.iter().filter(|i| !i.is_sleeping).count()
    }

    /// Islands with at least one active body.
    pub fn awake_islands(&self) -> impl Iterator<Item = (usize, &Island)> {
        self.islands
            .iter()
            .enumerate()
            .filter(|(_, i)| !i.is_sleeping)
    }

    /// Island size distribution.
    #[must_use]
    pub fn statistics(&self) -> IslandStatistics {
        if self.islands.is_empty() {
            return IslandStatistics::default();
        }

        let assigned = self.total_constraints - self.unassigned.len();
        let max_bodies = self.islands.iter().map(Island::num_bodies).max().unwrap_or(0);
        let max_constraints = self
            .islands
            .iter()
            .map(Island::num_constraints)
            .max()
            .unwrap_or(0);
        #[allow(clippy::cast_precision_loss)]
        let avg_bodies = self.total_bodies as f64 / self.islands.len() as f64;
        #[allow(clippy::cast_precision_loss)]
        let avg_constraints = assigned as f64 / self.islands.len() as f64;

        IslandStatistics {
            num_islands: self.islands.len(),
            num_sleeping_islands: self.islands.len() - self.num_awake_islands(),
            max_bodies_per_island: max_bodies,
            max_constraints_per_island: max_constraints,
            avg_bodies_per_island: avg_bodies,
            avg_constraints_per_island: avg_constraints,
        }
    }
}

/// Statistics about island distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IslandStatistics {
    /// Total number of islands.
    pub num_islands: usize,
    /// Islands whose bodies are all inactive.
    pub num_sleeping_islands: usize,
    /// Maximum bodies in any island.
    pub max_bodies_per_island: usize,
    /// Maximum constraints in any island.
    pub max_constraints_per_island: usize,
    /// Average bodies per island.
    pub avg_bodies_per_island: f64,
    /// Average constraints per island.
    pub avg_constraints_per_island: f64,
}

/// Disjoint-set forest with path compression and union by rank.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, x: usize, y: usize) {
        let root_x = self.find(x);
        let root_y = self.find(y);

        if root_x == root_y {
            return;
        }

        match self.rank[root_x].cmp(&self.rank[root_y]) {
            std::cmp::Ordering::Less => {
                self.parent[root_x] = root_y;
            }
            std::cmp::Ordering::Greater => {
                self.parent[root_y] = root_x;
            }
            std::cmp::Ordering::Equal => {
                self.parent[root_y] = root_x;
                self.rank[root_x] += 1;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::PointOnPoint;
    use impulse_types::{Point3, RigidBody, Vector3};

    fn dynamic_bodies(n: usize) -> (BodySet, Vec<BodyHandle>) {
        let mut bodies = BodySet::new();
        #[allow(clippy::cast_precision_loss)]
        let handles = (0..n)
            .map(|i| {
                bodies.insert(
                    RigidBody::dynamic(
                        Point3::new(i as f64, 0.0, 0.0),
                        1.0,
                        Vector3::new(1.0, 1.0, 1.0),
                    )
                    .unwrap(),
                )
            })
            .collect();
        (bodies, handles)
    }

    fn link(a: BodyHandle, b: Option<BodyHandle>) -> PointOnPoint {
        PointOnPoint::new(a, b, Point3::origin(), Point3::origin()).unwrap()
    }

    #[test]
    fn test_single_island_chain() {
        let (bodies, h) = dynamic_bodies(3);
        let joints = vec![link(h[0], Some(h[1])), link(h[1], Some(h[2]))];

        let islands = ConstraintIslands::build(&joints, &bodies);

        assert_eq!(islands.num_islands(), 1);
        assert_eq!(islands.total_bodies(), 3);
        assert_eq!(islands.total_constraints(), 2);

        let island = islands.get_island(0).expect("Should have island 0");
        assert_eq!(island.num_bodies(), 3);
        assert_eq!(island.constraint_indices, vec![0, 1]);
        assert!(island.contains_body(h[2]));
    }

    #[test]
    fn test_two_separate_islands() {
        let (bodies, h) = dynamic_bodies(4);
        let joints = vec![link(h[0], Some(h[1])), link(h[2], Some(h[3]))];

        let islands = ConstraintIslands::build(&joints, &bodies);

        assert_eq!(islands.num_islands(), 2);
        assert!(islands.same_island(h[0], h[1]));
        assert!(islands.same_island(h[2], h[3]));
        assert!(!islands.same_island(h[0], h[2]));
        assert_ne!(islands.island_for_body(h[0]), islands.island_for_body(h[3]));
    }

    #[test]
    fn test_cycle_structure() {
        let (bodies, h) = dynamic_bodies(3);
        let joints = vec![
            link(h[0], Some(h[1])),
            link(h[1], Some(h[2])),
            link(h[2], Some(h[0])),
        ];

        let islands = ConstraintIslands::build(&joints, &bodies);
        assert_eq!(islands.num_islands(), 1);
        assert_eq!(islands.get_island(0).unwrap().num_constraints(), 3);
    }

    #[test]
    fn test_static_body_does_not_link_islands() {
        let (mut bodies, h) = dynamic_bodies(2);
        let station = bodies.insert(RigidBody::fixed(Point3::origin()));
        let joints = vec![link(h[0], Some(station)), link(h[1], Some(station))];

        let islands = ConstraintIslands::build(&joints, &bodies);

        assert_eq!(islands.num_islands(), 2);
        assert!(!islands.same_island(h[0], h[1]));
        assert!(islands.island_for_body(station).is_none());
        assert!(islands.unassigned_constraints().is_empty());
    }

    #[test]
    fn test_world_constraint_joins_its_body() {
        let (bodies, h) = dynamic_bodies(2);
        let joints = vec![link(h[0], Some(h[1])), link(h[1], None)];

        let islands = ConstraintIslands::build(&joints, &bodies);
        assert_eq!(islands.num_islands(), 1);
        assert_eq!(islands.get_island(0).unwrap().constraint_indices, vec![0, 1]);
    }

    #[test]
    fn test_unassigned_constraints() {
        let (mut bodies, h) = dynamic_bodies(2);
        let rock = bodies.insert(RigidBody::fixed(Point3::origin()));
        let joints = vec![
            link(rock, None),
            link(h[0], Some(h[1])),
            link(h[1], Some(BodyHandle::new(40, 0))),
        ];

        let islands = ConstraintIslands::build(&joints, &bodies);
        assert_eq!(islands.unassigned_constraints(), &[0, 2]);
        assert_eq!(islands.statistics().avg_constraints_per_island, 1.0);
    }

    #[test]
    fn test_sleeping_island_detection() {
        let (mut bodies, h) = dynamic_bodies(4);
        bodies.get_mut(h[2]).unwrap().set_active(false);
        bodies.get_mut(h[3]).unwrap().set_active(false);
        let joints = vec![link(h[0], Some(h[1])), link(h[2], Some(h[3]))];

        let islands = ConstraintIslands::build(&joints, &bodies);

        assert_eq!(islands.num_islands(), 2);
        assert_eq!(islands.num_awake_islands(), 1);
        assert_eq!(islands.awake_islands().count(), 1);
        assert_eq!(islands.statistics().num_sleeping_islands, 1);
    }

    #[test]
    fn test_island_statistics() {
        let (bodies, h) = dynamic_bodies(5);
        let joints = vec![
            link(h[0], Some(h[1])),
            link(h[1], Some(h[2])),
            link(h[3], Some(h[4])),
        ];

        let stats = ConstraintIslands::build(&joints, &bodies).statistics();

        assert_eq!(stats.num_islands, 2);
        assert_eq!(stats.max_bodies_per_island, 3);
        assert_eq!(stats.max_constraints_per_island, 2);
        assert_eq!(stats.avg_bodies_per_island, 2.5);
    }

    #[test]
    fn test_stale_partner_forms_no_island() {
        let (mut bodies, h) = dynamic_bodies(4);
        assert!(bodies.remove(h[1]).is_some());
        let joints = vec![link(h[0], Some(h[1])), link(h[2], Some(h[3]))];

        let islands = ConstraintIslands::build(&joints, &bodies);

        assert_eq!(islands.num_islands(), 1);
        assert_eq!(islands.total_bodies(), 2);
        assert_eq!(islands.unassigned_constraints(), &[0]);
        assert_eq!(islands.island_for_body(h[0]), None);
        assert_eq!(islands.statistics().max_bodies_per_island, 2);
    }

    #[test]
    fn test_empty_constraints() {
        let bodies = BodySet::new();
        let joints: Vec<PointOnPoint> = Vec::new();
        let islands = ConstraintIslands::build(&joints, &bodies);

        assert_eq!(islands.num_islands(), 0);
        assert_eq!(islands.statistics(), IslandStatistics::default());
    }

    #[test]
    fn test_union_find_path_compression() {
        let mut uf = UnionFind::new(5);
        uf.union(0, 1);
        uf.union(1, 2);
        uf.union(2, 3);
        uf.union(3, 4);

        let root = uf.find(0);
        for i in 1..5 {
            assert_eq!(uf.find(i), root);
        }
    }
}
