use crate::{
    body::{Body, BodyId},
    error::SimError,
};
use ultraviolet::Vec2;

const VACANT: u32 = u32::MAX;

#[derive(Clone, Copy, Debug)]
struct Slot {
    generation: u32,
    /// Position in the dense arrays, `VACANT` when the slot is free.
    dense: u32,
}

/// Capacity-bounded owner of every live body.
///
/// Bodies live in one dense array (order not significant) so the quadtree and
/// the integrator can walk a plain slice. Stable [`BodyId`]s map to dense
/// positions through generational slots, which makes liveness checks an O(1)
/// generation compare.
#[derive(Clone, Debug)]
pub struct BodySet {
    bodies: Vec<Body>,
    ids: Vec<BodyId>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    capacity: usize,
}

impl BodySet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bodies: Vec::with_capacity(capacity),
            ids: Vec::with_capacity(capacity),
            slots: Vec::new(),
            free: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.bodies.len() >= self.capacity
    }

    /// Adds a body, failing once `capacity` bodies are live.
    pub fn insert(&mut self, body: Body) -> Result<BodyId, SimError> {
        if self.is_full() {
            return Err(SimError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let dense = self.bodies.len() as u32;
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].dense = dense;
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 1,
                    dense,
                });
                (self.slots.len() - 1) as u32
            }
        };

        let id = BodyId::new(index, self.slots[index as usize].generation);
        self.bodies.push(body);
        self.ids.push(id);
        Ok(id)
    }

    /// Removes a body. Returns `None` for stale ids.
    pub fn remove(&mut self, id: BodyId) -> Option<Body> {
        let dense = self.dense_index(id)?;

        let slot = &mut self.slots[id.index() as usize];
        slot.generation = slot.generation.wrapping_add(1).max(1);
        slot.dense = VACANT;
        self.free.push(id.index());

        let body = self.bodies.swap_remove(dense);
        self.ids.swap_remove(dense);

        // The last body moved into the hole; repoint its slot.
        if let Some(moved) = self.ids.get(dense) {
            self.slots[moved.index() as usize].dense = dense as u32;
        }

        Some(body)
    }

    /// Removes every body. All previously issued ids become stale.
    pub fn clear(&mut self) {
        for id in self.ids.drain(..) {
            let slot = &mut self.slots[id.index() as usize];
            slot.generation = slot.generation.wrapping_add(1).max(1);
            slot.dense = VACANT;
            self.free.push(id.index());
        }
        self.bodies.clear();
    }

    #[inline]
    pub fn contains(&self, id: BodyId) -> bool {
        self.dense_index(id).is_some()
    }

    /// Position of `id` in [`BodySet::as_slice`], valid until the next removal.
    #[inline]
    pub fn dense_index(&self, id: BodyId) -> Option<usize> {
        let slot = self.slots.get(id.index() as usize)?;
        if slot.generation != id.generation() || slot.dense == VACANT {
            return None;
        }
        Some(slot.dense as usize)
    }

    /// Id of the body stored at a dense position.
    #[inline]
    pub fn id_at(&self, dense: usize) -> Option<BodyId> {
        self.ids.get(dense).copied()
    }

    pub fn get(&self, id: BodyId) -> Option<&Body> {
        self.dense_index(id).map(|i| &self.bodies[i])
    }

    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.dense_index(id).map(move |i| &mut self.bodies[i])
    }

    /// Mutable access to two distinct bodies at once.
    pub fn pair_mut(&mut self, a: BodyId, b: BodyId) -> Option<(&mut Body, &mut Body)> {
        let i = self.dense_index(a)?;
        let j = self.dense_index(b)?;
        if i == j {
            return None;
        }
        if i < j {
            let (lo, hi) = self.bodies.split_at_mut(j);
            Some((&mut lo[i], &mut hi[0]))
        } else {
            let (lo, hi) = self.bodies.split_at_mut(i);
            Some((&mut hi[0], &mut lo[j]))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyId, &Body)> + '_ {
        self.ids.iter().copied().zip(self.bodies.iter())
    }

    pub fn ids(&self) -> &[BodyId] {
        &self.ids
    }

    pub fn as_slice(&self) -> &[Body] {
        &self.bodies
    }

    pub fn as_mut_slice(&mut self) -> &mut [Body] {
        &mut self.bodies
    }

    pub fn reset_forces(&mut self) {
        self.bodies.iter_mut().for_each(Body::reset_force);
    }

    pub fn integrate(&mut self, dt: f32) {
        self.bodies.iter_mut().for_each(|body| body.integrate(dt));
    }

    pub fn total_mass(&self) -> f32 {
        self.bodies.iter().map(|b| b.mass).sum()
    }

    pub fn momentum(&self, dt: f32) -> Vec2 {
        self.bodies
            .iter()
            .fold(Vec2::zero(), |acc, b| acc + b.momentum(dt))
    }
}
