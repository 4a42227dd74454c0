//! Arena that owns every rigid body in the simulation.
//!
//! Constraints never hold references to bodies. They store [`BodyHandle`]s
//! and borrow bodies from the set for the duration of a single prepare or
//! iterate call.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{BodyHandle, RigidBody};

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Slot {
    generation: u32,
    body: Option<RigidBody>,
}

/// Generational arena of rigid bodies.
///
/// # Example
///
/// ```
/// use impulse_types::{BodySet, RigidBody};
/// use nalgebra::Point3;
///
/// let mut bodies = BodySet::new();
/// let ground = bodies.insert(RigidBody::fixed(Point3::origin()));
/// assert!(bodies.contains(ground));
///
/// bodies.remove(ground);
/// assert!(bodies.get(ground).is_none());
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodySet {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl BodySet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty set with room for `capacity` bodies.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Insert a body and return its handle.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` slots are allocated.
    #[allow(clippy::cast_possible_truncation)]
    pub fn insert(&mut self, body: RigidBody) -> BodyHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.body = Some(body);
            return BodyHandle::new(index, slot.generation);
        }

        assert!(self.slots.len() < u32::MAX as usize, "body arena is full");
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            body: Some(body),
        });
        BodyHandle::new(index, 0)
    }

    /// Remove a body. Its handle, and every copy of it, becomes stale.
    pub fn remove(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let body = slot.body.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index());
        self.len -= 1;
        Some(body)
    }

    /// Borrow a body.
    #[must_use]
    pub fn get(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.body.as_ref())
    }

    /// Mutably borrow a body.
    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.body.as_mut())
    }

    /// Mutably borrow two distinct bodies at once.
    ///
    /// Returns `None` if either handle is stale or both name the same body.
    pub fn pair_mut(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
    ) -> Option<(&mut RigidBody, &mut RigidBody)> {
        if a.index() == b.index() || !self.contains(a) || !self.contains(b) {
            return None;
        }

        let (ia, ib) = (a.index() as usize, b.index() as usize);
        let (first, second) = if ia < ib {
            let (lo, hi) = self.slots.split_at_mut(ib);
            (&mut lo[ia], &mut hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(ia);
            (&mut hi[0], &mut lo[ib])
        };
        Some((first.body.as_mut()?, second.body.as_mut()?))
    }

    /// Check whether a handle refers to a live body.
    #[must_use]
    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the set holds no bodies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live bodies with their handles.
    #[allow(clippy::cast_possible_truncation)]
    pub fn iter(&self) -> impl Iterator<Item = (BodyHandle, &RigidBody)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.body
                .as_ref()
                .map(|body| (BodyHandle::new(i as u32, slot.generation), body))
        })
    }

    /// Iterate mutably over live bodies with their handles.
    #[allow(clippy::cast_possible_truncation)]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BodyHandle, &mut RigidBody)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            slot.body
                .as_mut()
                .map(|body| (BodyHandle::new(i as u32, generation), body))
        })
    }

    /// Handles of all live bodies.
    pub fn handles(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.iter().map(|(handle, _)| handle)
    }

    /// Sum of linear momentum over all dynamic bodies.
    #[must_use]
    pub fn total_linear_momentum(&self) -> Vector3<f64> {
        self.iter()
            .map(|(_, body)| body.linear_momentum())
            .fold(Vector3::zeros(), |acc, p| acc + p)
    }
}

impl std::ops::Index<BodyHandle> for BodySet {
    type Output = RigidBody;

    /// # Panics
    ///
    /// Panics on a stale handle. Use [`BodySet::get`] when the handle may
    /// have outlived its body.
    #[allow(clippy::panic)]
    fn index(&self, handle: BodyHandle) -> &RigidBody {
        match self.get(handle) {
            Some(body) => body,
            None => panic!("stale body handle {handle}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn body_at(x: f64) -> RigidBody {
        RigidBody::dynamic(Point3::new(x, 0.0, 0.0), 1.0, Vector3::new(1.0, 1.0, 1.0)).unwrap()
    }

    #[test]
    fn test_insert_get_remove() {
        let mut set = BodySet::new();
        let a = set.insert(body_at(1.0));
        let b = set.insert(body_at(2.0));
        assert_eq!(set.len(), 2);
        assert_eq!(set[a].position().x, 1.0);
        assert_eq!(set[b].position().x, 2.0);

        assert!(set.remove(a).is_some());
        assert!(set.remove(a).is_none());
        assert_eq!(set.len(), 1);
        assert!(!set.contains(a));
    }

    #[test]
    fn test_stale_handle_does_not_alias_reused_slot() {
        let mut set = BodySet::new();
        let a = set.insert(body_at(1.0));
        set.remove(a);
        let c = set.insert(body_at(3.0));

        assert_eq!(a.index(), c.index());
        assert_ne!(a.generation(), c.generation());
        assert!(set.get(a).is_none());
        assert_eq!(set[c].position().x, 3.0);
    }

    #[test]
    fn test_pair_mut() {
        let mut set = BodySet::new();
        let a = set.insert(body_at(1.0));
        let b = set.insert(body_at(2.0));

        {
            let (ba, bb) = set.pair_mut(b, a).unwrap();
            assert_eq!(ba.position().x, 2.0);
            assert_eq!(bb.position().x, 1.0);
            ba.apply_linear_impulse(&Vector3::new(1.0, 0.0, 0.0));
            bb.apply_linear_impulse(&Vector3::new(-1.0, 0.0, 0.0));
        }

        assert!(set.pair_mut(a, a).is_none());
        assert_eq!(set.total_linear_momentum(), Vector3::zeros());

        set.remove(b);
        assert!(set.pair_mut(a, b).is_none());
    }

    #[test]
    fn test_iter_skips_removed() {
        let mut set = BodySet::new();
        let handles: Vec<_> = (0..4).map(|i| set.insert(body_at(f64::from(i)))).collect();
        set.remove(handles[1]);

        let live: Vec<_> = set.handles().collect();
        assert_eq!(live, vec![handles[0], handles[2], handles[3]]);
    }
}
