use crate::{
    body::{Body, is_finite},
    force::{FieldForce, PairForce, PointMass},
};
use rayon::prelude::*;
use ultraviolet::Vec2;

/// Opening angles at or below this are clamped to it.
pub const MIN_THETA: f32 = 1e-6;

/// Past this depth, bodies that still share a cell are chained in one leaf
/// instead of subdividing further.
pub const MAX_DEPTH: usize = 48;

const NONE: u32 = u32::MAX;

/// Represents a square region in the quadtree.
/// Covers the half-open box `[center - size/2, center + size/2)` on both axes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quad {
    pub center: Vec2,
    /// Full width of the square.
    pub size: f32,
}

impl Quad {
    /// Creates a Quad centred on the mean body position, twice as wide as the
    /// largest distance from that mean. The width is padded a little so the
    /// farthest body lands strictly inside the half-open box.
    ///
    /// Bodies at non-finite positions are left out of the region.
    pub fn new_containing(bodies: &[Body]) -> Self {
        let finite = || bodies.iter().filter(|body| is_finite(body.pos));

        let count = finite().count();
        if count == 0 {
            return Self {
                center: Vec2::zero(),
                size: 1.0,
            };
        }

        let mut center = Vec2::zero();
        for body in finite() {
            center += body.pos;
        }
        center /= count as f32;

        let max_dist = finite()
            .map(|body| (body.pos - center).mag())
            .fold(0.0f32, f32::max);

        let size = (2.0 * max_dist).max(1.0) * (1.0 + 1e-4) + 1e-4;
        Self { center, size }
    }

    #[inline]
    pub fn half(&self) -> f32 {
        self.size * 0.5
    }

    /// Half-open containment test.
    pub fn contains(&self, pos: Vec2) -> bool {
        let h = self.half();
        pos.x >= self.center.x - h
            && pos.x < self.center.x + h
            && pos.y >= self.center.y - h
            && pos.y < self.center.y + h
    }

    /// Determines which quadrant a position falls into relative to the quad's center.
    /// Returns an index from 0 to 3:
    /// 0: lower-left, 1: lower-right, 2: upper-left, 3: upper-right.
    /// A point exactly on a split line belongs to the upper/right side,
    /// matching the half-open boxes of the children.
    #[inline]
    pub fn find_quadrant(&self, pos: Vec2) -> usize {
        ((pos.y >= self.center.y) as usize) << 1 | (pos.x >= self.center.x) as usize
    }

    /// Transforms the current Quad into one of its sub-quadrants.
    pub fn into_quadrant(mut self, quadrant: usize) -> Self {
        self.size *= 0.5;
        self.center.x += ((quadrant & 1) as f32 - 0.5) * self.size;
        self.center.y += ((quadrant >> 1) as f32 - 0.5) * self.size;
        self
    }

    /// Divides the quad into 4 equal sub-quadrants.
    pub fn subdivide(&self) -> [Quad; 4] {
        [0, 1, 2, 3].map(|i| self.into_quadrant(i))
    }
}

#[repr(C)]
#[derive(Clone, Debug)]
pub struct Node {
    /// Index of the first child in the nodes array (0 if leaf).
    pub children: u32,
    /// Index of the next node in depth-first order once this subtree is done
    /// (0 ends the traversal).
    pub next: u32,
    /// Center of mass of the node.
    pub pos: Vec2,
    /// Total mass of the node.
    pub mass: f32,
    /// Largest body radius anywhere in the subtree.
    pub max_radius: f32,
    /// Spatial bounds of the node.
    pub quad: Quad,
    /// First body of the leaf (`u32::MAX` for empty leaves and branches).
    pub body: u32,
}

impl Node {
    pub fn new(next: u32, quad: Quad) -> Self {
        Self {
            children: 0,
            next,
            pos: Vec2::zero(),
            mass: 0.0,
            max_radius: 0.0,
            quad,
            body: NONE,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children == 0
    }

    pub fn is_branch(&self) -> bool {
        self.children != 0
    }

    pub fn is_empty(&self) -> bool {
        self.is_leaf() && self.body == NONE
    }
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    pos: Vec2,
    mass: f32,
    radius: f32,
    placed: bool,
}

/// Barnes-Hut quadtree over one tick's body slice.
///
/// Rebuilt from scratch every tick. Bodies are referred to by their position
/// in the slice passed to [`Quadtree::build`]; every query method expects that
/// same slice. An unbuilt or empty tree answers every query with nothing:
/// no leaf, no pairs, zero force.
#[derive(Debug, Clone)]
pub struct Quadtree {
    /// Theta squared (opening angle threshold for approximation).
    t_sq: f32,
    /// Linearized tree nodes.
    pub nodes: Vec<Node>,
    /// Indices of parent nodes, used for bottom-up center of mass propagation.
    parents: Vec<usize>,
    entries: Vec<Entry>,
    /// Next body sharing the same leaf.
    chain: Vec<u32>,
    pairs: Vec<(usize, usize)>,
}

impl Default for Quadtree {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl Quadtree {
    pub const ROOT: usize = 0;

    pub fn new(theta: f32) -> Self {
        let theta = theta.max(MIN_THETA);
        Self {
            t_sq: theta * theta,
            nodes: Vec::new(),
            parents: Vec::new(),
            entries: Vec::new(),
            chain: Vec::new(),
            pairs: Vec::new(),
        }
    }

    pub fn theta(&self) -> f32 {
        self.t_sq.sqrt()
    }

    /// Smaller is more accurate and slower. Non-positive values are clamped
    /// to [`MIN_THETA`].
    pub fn set_theta(&mut self, theta: f32) {
        let theta = if theta.is_nan() { MIN_THETA } else { theta.max(MIN_THETA) };
        self.t_sq = theta * theta;
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.parents.clear();
        self.entries.clear();
        self.chain.clear();
        self.pairs.clear();
    }

    pub fn is_built(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn total_mass(&self) -> f32 {
        self.root().map_or(0.0, |root| root.mass)
    }

    /// Builds the tree over a region that encloses every body.
    pub fn build(&mut self, bodies: &[Body]) {
        self.build_in(bodies, Quad::new_containing(bodies));
    }

    /// Builds the tree over an explicit region. Bodies outside it are left
    /// out of the tree and reported by the return value.
    pub fn build_in(&mut self, bodies: &[Body], quad: Quad) -> usize {
        self.clear();
        if bodies.is_empty() {
            return 0;
        }

        self.nodes.push(Node::new(0, quad));
        self.chain.resize(bodies.len(), NONE);
        self.entries.extend(bodies.iter().map(|body| Entry {
            pos: body.pos,
            mass: body.mass,
            radius: body.radius,
            placed: false,
        }));

        let mut skipped = 0;
        for slot in 0..bodies.len() {
            if quad.contains(bodies[slot].pos) {
                self.insert(slot);
                self.entries[slot].placed = true;
            } else {
                skipped += 1;
            }
        }
        if skipped > 0 {
            log::warn!("{skipped} bodies lie outside the tree region and were skipped");
        }

        self.propagate();
        skipped
    }

    /// Subdivides a leaf node into 4 children.
    /// Returns the index of the first child.
    fn subdivide(&mut self, node: usize) -> usize {
        self.parents.push(node);
        let children = self.nodes.len() as u32;
        self.nodes[node].children = children;
        self.nodes[node].body = NONE;

        // The last child continues wherever the parent's subtree ended.
        let nexts = [
            children + 1,
            children + 2,
            children + 3,
            self.nodes[node].next,
        ];
        let quads = self.nodes[node].quad.subdivide();
        for i in 0..4 {
            self.nodes.push(Node::new(nexts[i], quads[i]));
        }

        children as usize
    }

    fn place(&mut self, node: usize, head: u32, pos: Vec2, mass: f32, max_radius: f32) {
        let n = &mut self.nodes[node];
        n.body = head;
        n.pos = pos;
        n.mass = mass;
        n.max_radius = max_radius;
    }

    /// Adds `slot` to the front of an occupied leaf's chain.
    fn chain_into(&mut self, node: usize, slot: usize) {
        let e = self.entries[slot];
        let n = &mut self.nodes[node];
        let mass = n.mass + e.mass;
        n.pos = (n.pos * n.mass + e.pos * e.mass) / mass;
        n.mass = mass;
        n.max_radius = n.max_radius.max(e.radius);
        self.chain[slot] = n.body;
        n.body = slot as u32;
    }

    fn insert(&mut self, slot: usize) {
        let Entry { pos, mass, radius, .. } = self.entries[slot];
        let mut node = Self::ROOT;
        let mut depth = 0;

        while self.nodes[node].is_branch() {
            let quadrant = self.nodes[node].quad.find_quadrant(pos);
            node = self.nodes[node].children as usize + quadrant;
            depth += 1;
        }

        if self.nodes[node].body == NONE {
            self.place(node, slot as u32, pos, mass, radius);
            return;
        }

        // Occupied leaf. Its current content moves down as one unit.
        let head = self.nodes[node].body;
        let (p, m, r) = (
            self.nodes[node].pos,
            self.nodes[node].mass,
            self.nodes[node].max_radius,
        );

        if pos == self.entries[head as usize].pos || depth >= MAX_DEPTH {
            self.chain_into(node, slot);
            return;
        }

        loop {
            let children = self.subdivide(node);
            depth += 1;

            let q1 = self.nodes[node].quad.find_quadrant(p);
            let q2 = self.nodes[node].quad.find_quadrant(pos);

            if q1 != q2 {
                self.place(children + q1, head, p, m, r);
                self.place(children + q2, slot as u32, pos, mass, radius);
                return;
            }

            node = children + q1;
            if depth >= MAX_DEPTH {
                self.place(node, head, p, m, r);
                self.chain_into(node, slot);
                return;
            }
        }
    }

    /// Calculates center of mass, total mass and largest radius for all
    /// branches, deepest first.
    fn propagate(&mut self) {
        for &node in self.parents.iter().rev() {
            let i = self.nodes[node].children as usize;

            let mut mass = 0.0;
            let mut weighted = Vec2::zero();
            let mut max_radius = 0.0f32;
            for child in &self.nodes[i..i + 4] {
                mass += child.mass;
                weighted += child.pos * child.mass;
                max_radius = max_radius.max(child.max_radius);
            }

            let n = &mut self.nodes[node];
            n.mass = mass;
            n.pos = if mass > 0.0 { weighted / mass } else { Vec2::zero() };
            n.max_radius = max_radius;
        }
    }

    /// Bodies stored in a leaf.
    pub fn leaf_members(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        let mut member = self.nodes.get(node).map_or(NONE, |n| n.body);
        std::iter::from_fn(move || {
            if member == NONE {
                return None;
            }
            let current = member as usize;
            member = self.chain[current];
            Some(current)
        })
    }

    /// Leaf whose cell contains `pos`, if the tree covers it.
    pub fn query(&self, pos: Vec2) -> Option<usize> {
        let root = self.nodes.first()?;
        if !root.quad.contains(pos) {
            return None;
        }

        let mut node = Self::ROOT;
        while self.nodes[node].is_branch() {
            let quadrant = self.nodes[node].quad.find_quadrant(pos);
            node = self.nodes[node].children as usize + quadrant;
        }
        Some(node)
    }

    /// Far-field force on `body`, which sits at `slot` of the build slice.
    /// Pass `usize::MAX` for a body that is not in the tree.
    pub fn field_force<F: FieldForce>(&self, slot: usize, body: &Body, model: &F) -> Vec2 {
        let mut force = Vec2::zero();
        if self.nodes.is_empty() {
            return force;
        }

        let mut node_idx = Self::ROOT;
        loop {
            let n = &self.nodes[node_idx];

            if n.is_branch() {
                let d_sq = (n.pos - body.pos).mag_sq();
                // Barnes-Hut criterion: s/d < theta, squared.
                if n.quad.size * n.quad.size >= d_sq * self.t_sq {
                    node_idx = n.children as usize;
                    continue;
                }
                force += model.force(body, PointMass { pos: n.pos, mass: n.mass });
            } else {
                let mut member = n.body;
                while member != NONE {
                    let m = member as usize;
                    if m != slot {
                        let e = &self.entries[m];
                        force += model.force(body, PointMass { pos: e.pos, mass: e.mass });
                    }
                    member = self.chain[m];
                }
            }

            if n.next == 0 {
                break;
            }
            node_idx = n.next as usize;
        }

        force
    }

    /// Adds the far-field force to every body of the build slice.
    pub fn compute_forces<F: FieldForce>(&self, bodies: &mut [Body], model: &F) {
        debug_assert!(self.nodes.is_empty() || bodies.len() == self.entries.len());
        for (slot, body) in bodies.iter_mut().enumerate() {
            let force = self.field_force(slot, body, model);
            body.force += force;
        }
    }

    /// Parallel [`Quadtree::compute_forces`]. The tree is read-only and each
    /// task writes only its own body.
    pub fn par_compute_forces<F: FieldForce>(&self, bodies: &mut [Body], model: &F) {
        debug_assert!(self.nodes.is_empty() || bodies.len() == self.entries.len());
        bodies.par_iter_mut().enumerate().for_each(|(slot, body)| {
            let force = self.field_force(slot, body, model);
            body.force += force;
        });
    }

    /// Finds every pair of bodies whose circles overlap.
    pub fn compute_overlapping_pairs(&mut self) -> &[(usize, usize)] {
        self.compute_neighbor_pairs(0.0)
    }

    /// Finds every pair with `distance < r1 + r2 + margin`.
    ///
    /// Each unordered pair is reported once as `(lower slot, higher slot)`.
    /// Cells are pruned with the query radius widened by the largest radius
    /// inside the cell, so no pair is missed when radii differ.
    pub fn compute_neighbor_pairs(&mut self, margin: f32) -> &[(usize, usize)] {
        self.pairs.clear();
        if self.nodes.is_empty() {
            return &self.pairs;
        }

        for i in 0..self.entries.len() {
            let e = self.entries[i];
            if !e.placed {
                continue;
            }
            let reach = e.radius + margin;

            let mut node_idx = Self::ROOT;
            loop {
                let n = &self.nodes[node_idx];
                let r = (reach + n.max_radius + n.quad.half()) * (1.0 + 1e-5);
                let d = n.quad.center - e.pos;
                let near = !n.is_empty() && d.x.abs() < r && d.y.abs() < r;

                if near && n.is_branch() {
                    node_idx = n.children as usize;
                    continue;
                }

                if near {
                    let mut member = n.body;
                    while member != NONE {
                        let j = member as usize;
                        if j > i {
                            let other = &self.entries[j];
                            if (other.pos - e.pos).mag() < reach + other.radius {
                                self.pairs.push((i, j));
                            }
                        }
                        member = self.chain[j];
                    }
                }

                if n.next == 0 {
                    break;
                }
                node_idx = n.next as usize;
            }
        }

        &self.pairs
    }

    /// Pairs found by the last overlap pass.
    pub fn overlapping_pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    /// Applies a local force model to every pair of the last overlap pass,
    /// equal and opposite.
    pub fn compute_local_forces<F: PairForce>(&self, bodies: &mut [Body], model: &F, dt: f32) {
        for &(i, j) in &self.pairs {
            let force = model.force(&bodies[i], &bodies[j], dt);
            bodies[i].force += force;
            bodies[j].force -= force;
        }
    }
}
