//! Block-structured mesh storage
//!
//! A level's fields are stored as a set of disjoint blocks (a box array),
//! each holding its valid region plus a ring of ghost cells. Every
//! dimensionality is addressed with `(i, j, k)`; axes that are not
//! simulated have a single index 0, no ghost cells and are never staggered.
//!
//! Ownership rule for staggered data: a nodal point on the face shared by
//! two blocks belongs to exactly one of them (the block above it, or the
//! block touching a non-periodic domain high edge). `fill_boundary` copies
//! owned values into everyone else's copies, `sum_boundary` folds
//! everyone else's contributions into the owner.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Spatial dimensionality of the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimensionality {
    /// z only
    OneD,
    /// x and z
    TwoD,
    #[default]
    ThreeD,
    /// r (on the x index) and z, azimuthally symmetric
    Cylindrical,
}

impl Dimensionality {
    /// Which of (x, y, z) carry more than one index
    pub fn active(&self) -> [bool; 3] {
        match self {
            Dimensionality::OneD => [false, false, true],
            Dimensionality::TwoD | Dimensionality::Cylindrical => [true, false, true],
            Dimensionality::ThreeD => [true, true, true],
        }
    }

    #[inline]
    pub fn is_active(&self, axis: usize) -> bool {
        self.active()[axis]
    }

    /// Replace entries on inactive axes with `fill`
    pub fn mask(&self, v: [i32; 3], fill: i32) -> [i32; 3] {
        let active = self.active();
        [0, 1, 2].map(|d| if active[d] { v[d] } else { fill })
    }

    /// Per-axis refinement vector for an isotropic ratio
    pub fn ratio(&self, r: i32) -> [i32; 3] {
        self.mask([r; 3], 1)
    }
}

/// Where field components live relative to the cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Staggering {
    /// Standard Yee layout (E on edges, B on faces)
    #[default]
    Yee,
    /// Every component on the nodes
    Nodal,
}

impl Staggering {
    /// Offset in cells between node-centered and cell-centered weights
    pub fn shift(&self) -> f64 {
        match self {
            Staggering::Yee => 0.5,
            Staggering::Nodal => 0.0,
        }
    }
}

/// Node (true) or cell (false) centering per axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexType {
    pub nodal: [bool; 3],
}

impl IndexType {
    pub const CELL: IndexType = IndexType { nodal: [false; 3] };
    pub const NODE: IndexType = IndexType { nodal: [true; 3] };

    pub fn new(nodal: [bool; 3]) -> Self {
        Self { nodal }
    }

    /// Drop nodality on axes that are not simulated
    pub fn masked(self, dims: Dimensionality) -> Self {
        let active = dims.active();
        Self {
            nodal: [0, 1, 2].map(|d| self.nodal[d] && active[d]),
        }
    }

    #[inline]
    pub fn is_nodal(&self, axis: usize) -> bool {
        self.nodal[axis]
    }

    fn hi_offset(&self) -> [i32; 3] {
        self.nodal.map(i32::from)
    }
}

/// Mesh quantities handled by the field core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Ex,
    Ey,
    Ez,
    Bx,
    By,
    Bz,
    Jx,
    Jy,
    Jz,
    Rho,
    F,
}

impl FieldKind {
    pub const E: [FieldKind; 3] = [FieldKind::Ex, FieldKind::Ey, FieldKind::Ez];
    pub const B: [FieldKind; 3] = [FieldKind::Bx, FieldKind::By, FieldKind::Bz];
    pub const J: [FieldKind; 3] = [FieldKind::Jx, FieldKind::Jy, FieldKind::Jz];

    /// Nodal flags on the full 3D Yee lattice
    pub fn yee_nodal(self) -> [bool; 3] {
        use FieldKind::*;
        match self {
            Ex | Jx => [false, true, true],
            Ey | Jy => [true, false, true],
            Ez | Jz => [true, true, false],
            Bx => [true, false, false],
            By => [false, true, false],
            Bz => [false, false, true],
            Rho | F => [true, true, true],
        }
    }

    pub fn index_type(self, dims: Dimensionality, staggering: Staggering) -> IndexType {
        let nodal = match staggering {
            Staggering::Yee => self.yee_nodal(),
            Staggering::Nodal => [true; 3],
        };
        IndexType::new(nodal).masked(dims)
    }

    pub fn name(self) -> &'static str {
        use FieldKind::*;
        match self {
            Ex => "Ex",
            Ey => "Ey",
            Ez => "Ez",
            Bx => "Bx",
            By => "By",
            Bz => "Bz",
            Jx => "Jx",
            Jy => "Jy",
            Jz => "Jz",
            Rho => "rho",
            F => "F",
        }
    }
}

/// Inclusive integer box `lo..=hi` on each axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexBox {
    pub lo: [i32; 3],
    pub hi: [i32; 3],
}

impl IndexBox {
    pub fn new(lo: [i32; 3], hi: [i32; 3]) -> Self {
        Self { lo, hi }
    }

    /// Box of `n` cells per axis starting at the origin
    pub fn from_size(n: [i32; 3]) -> Self {
        Self::new([0; 3], [n[0] - 1, n[1] - 1, n[2] - 1])
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|d| self.hi[d] < self.lo[d])
    }

    #[inline]
    pub fn length(&self, axis: usize) -> i32 {
        self.hi[axis] - self.lo[axis] + 1
    }

    pub fn size(&self) -> [usize; 3] {
        [0, 1, 2].map(|d| self.length(d).max(0) as usize)
    }

    pub fn num_pts(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        self.size().iter().product()
    }

    #[inline]
    pub fn contains(&self, i: i32, j: i32, k: i32) -> bool {
        i >= self.lo[0]
            && i <= self.hi[0]
            && j >= self.lo[1]
            && j <= self.hi[1]
            && k >= self.lo[2]
            && k <= self.hi[2]
    }

    pub fn contains_box(&self, other: &IndexBox) -> bool {
        (0..3).all(|d| other.lo[d] >= self.lo[d] && other.hi[d] <= self.hi[d])
    }

    pub fn intersect(&self, other: &IndexBox) -> Option<IndexBox> {
        let b = IndexBox::new(
            [0, 1, 2].map(|d| self.lo[d].max(other.lo[d])),
            [0, 1, 2].map(|d| self.hi[d].min(other.hi[d])),
        );
        (!b.is_empty()).then_some(b)
    }

    pub fn grow(&self, n: [i32; 3]) -> Self {
        Self::new(
            [0, 1, 2].map(|d| self.lo[d] - n[d]),
            [0, 1, 2].map(|d| self.hi[d] + n[d]),
        )
    }

    pub fn grow_lo(&self, axis: usize, n: i32) -> Self {
        let mut b = *self;
        b.lo[axis] -= n;
        b
    }

    pub fn grow_hi(&self, axis: usize, n: i32) -> Self {
        let mut b = *self;
        b.hi[axis] += n;
        b
    }

    pub fn shift(&self, s: [i32; 3]) -> Self {
        Self::new(
            [0, 1, 2].map(|d| self.lo[d] + s[d]),
            [0, 1, 2].map(|d| self.hi[d] + s[d]),
        )
    }

    /// Cell box to the points of the given centering
    pub fn convert(&self, index_type: IndexType) -> Self {
        self.grow_hi_by(index_type.hi_offset())
    }

    fn grow_hi_by(&self, n: [i32; 3]) -> Self {
        Self::new(self.lo, [0, 1, 2].map(|d| self.hi[d] + n[d]))
    }

    /// Refine a cell box by per-axis ratios
    pub fn refine(&self, r: [i32; 3]) -> Self {
        Self::new(
            [0, 1, 2].map(|d| self.lo[d] * r[d]),
            [0, 1, 2].map(|d| (self.hi[d] + 1) * r[d] - 1),
        )
    }

    /// Coarsen a cell box by per-axis ratios (floor division)
    pub fn coarsen(&self, r: [i32; 3]) -> Self {
        Self::new(
            [0, 1, 2].map(|d| self.lo[d].div_euclid(r[d])),
            [0, 1, 2].map(|d| self.hi[d].div_euclid(r[d])),
        )
    }

    /// Split into boxes no longer than `max_size` on each axis
    pub fn chop(&self, max_size: [i32; 3]) -> Vec<IndexBox> {
        let ranges: Vec<Vec<(i32, i32)>> = (0..3)
            .map(|d| {
                let step = max_size[d].max(1);
                let mut out = Vec::new();
                let mut lo = self.lo[d];
                while lo <= self.hi[d] {
                    let hi = (lo + step - 1).min(self.hi[d]);
                    out.push((lo, hi));
                    lo = hi + 1;
                }
                out
            })
            .collect();

        let mut boxes = Vec::new();
        for &(zlo, zhi) in &ranges[2] {
            for &(ylo, yhi) in &ranges[1] {
                for &(xlo, xhi) in &ranges[0] {
                    boxes.push(IndexBox::new([xlo, ylo, zlo], [xhi, yhi, zhi]));
                }
            }
        }
        boxes
    }

    /// Visit every point, x fastest
    #[inline]
    pub fn for_each(&self, mut f: impl FnMut(i32, i32, i32)) {
        for k in self.lo[2]..=self.hi[2] {
            for j in self.lo[1]..=self.hi[1] {
                for i in self.lo[0]..=self.hi[0] {
                    f(i, j, k);
                }
            }
        }
    }
}

/// Read access to one scalar view of a block
pub trait Sample {
    fn at(&self, i: i32, j: i32, k: i32) -> f64;
}

/// Single component of a block
#[derive(Clone, Copy)]
pub struct Comp<'a> {
    fab: &'a FieldArray,
    n: usize,
}

impl Sample for Comp<'_> {
    #[inline]
    fn at(&self, i: i32, j: i32, k: i32) -> f64 {
        self.fab.get(i, j, k, self.n)
    }
}

/// Sum over all components of a block (physical value of a split field)
#[derive(Clone, Copy)]
pub struct Total<'a> {
    fab: &'a FieldArray,
}

impl Sample for Total<'_> {
    #[inline]
    fn at(&self, i: i32, j: i32, k: i32) -> f64 {
        (0..self.fab.ncomp).map(|n| self.fab.get(i, j, k, n)).sum()
    }
}

/// Storage for one block: grown box, component count, x-fastest data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldArray {
    bx: IndexBox,
    ncomp: usize,
    data: Vec<f64>,
}

impl FieldArray {
    pub fn new(bx: IndexBox, ncomp: usize) -> Self {
        Self {
            bx,
            ncomp,
            data: vec![0.0; bx.num_pts() * ncomp],
        }
    }

    /// Box covered by the storage, ghost cells included
    pub fn bx(&self) -> IndexBox {
        self.bx
    }

    pub fn ncomp(&self) -> usize {
        self.ncomp
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Linear index from (i, j, k, n)
    #[inline]
    fn idx(&self, i: i32, j: i32, k: i32, n: usize) -> usize {
        assert!(
            self.bx.contains(i, j, k) && n < self.ncomp,
            "({i}, {j}, {k}, {n}) outside {:?} x {}",
            self.bx,
            self.ncomp
        );
        let [nx, ny, nz] = self.bx.size();
        let ii = (i - self.bx.lo[0]) as usize;
        let jj = (j - self.bx.lo[1]) as usize;
        let kk = (k - self.bx.lo[2]) as usize;
        ((n * nz + kk) * ny + jj) * nx + ii
    }

    #[inline]
    pub fn get(&self, i: i32, j: i32, k: i32, n: usize) -> f64 {
        self.data[self.idx(i, j, k, n)]
    }

    #[inline]
    pub fn set(&mut self, i: i32, j: i32, k: i32, n: usize, v: f64) {
        let idx = self.idx(i, j, k, n);
        self.data[idx] = v;
    }

    #[inline]
    pub fn add(&mut self, i: i32, j: i32, k: i32, n: usize, v: f64) {
        let idx = self.idx(i, j, k, n);
        self.data[idx] += v;
    }

    #[inline]
    pub fn scale(&mut self, i: i32, j: i32, k: i32, n: usize, factor: f64) {
        let idx = self.idx(i, j, k, n);
        self.data[idx] *= factor;
    }

    pub fn fill(&mut self, v: f64) {
        self.data.fill(v);
    }

    pub fn comp(&self, n: usize) -> Comp<'_> {
        Comp { fab: self, n }
    }

    pub fn total(&self) -> Total<'_> {
        Total { fab: self }
    }

    /// Copy all components over `region`, component-major then x-fastest
    pub fn extract(&self, region: &IndexBox) -> Vec<f64> {
        let mut out = Vec::with_capacity(region.num_pts() * self.ncomp);
        for n in 0..self.ncomp {
            region.for_each(|i, j, k| out.push(self.get(i, j, k, n)));
        }
        out
    }

    /// Overwrite `region` with values laid out as by [`FieldArray::extract`]
    pub fn insert(&mut self, region: &IndexBox, values: &[f64]) {
        let mut it = values.iter();
        for n in 0..self.ncomp {
            region.for_each(|i, j, k| {
                if let Some(&v) = it.next() {
                    self.set(i, j, k, n, v);
                }
            });
        }
    }

    /// Add into `region` values laid out as by [`FieldArray::extract`]
    pub fn add_region(&mut self, region: &IndexBox, values: &[f64]) {
        let mut it = values.iter();
        for n in 0..self.ncomp {
            region.for_each(|i, j, k| {
                if let Some(&v) = it.next() {
                    self.add(i, j, k, n, v);
                }
            });
        }
    }
}

/// Cell boxes of one level plus the domain they tile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxArray {
    pub boxes: Vec<IndexBox>,
    pub domain: IndexBox,
    pub periodic: [bool; 3],
}

impl BoxArray {
    pub fn new(boxes: Vec<IndexBox>, domain: IndexBox, periodic: [bool; 3]) -> Self {
        Self {
            boxes,
            domain,
            periodic,
        }
    }

    /// Decompose `region` into blocks of at most `max_grid_size` cells per active axis
    pub fn chop(
        region: IndexBox,
        domain: IndexBox,
        max_grid_size: i32,
        dims: Dimensionality,
        periodic: [bool; 3],
    ) -> Self {
        let max_size = dims.mask([max_grid_size; 3], 1);
        Self::new(region.chop(max_size), domain, periodic)
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn coarsen(&self, r: [i32; 3]) -> Self {
        Self::new(
            self.boxes.iter().map(|b| b.coarsen(r)).collect(),
            self.domain.coarsen(r),
            self.periodic,
        )
    }

    /// Smallest box covering every block
    pub fn minimal_box(&self) -> Option<IndexBox> {
        let first = *self.boxes.first()?;
        Some(self.boxes.iter().fold(first, |acc, b| {
            IndexBox::new(
                [0, 1, 2].map(|d| acc.lo[d].min(b.lo[d])),
                [0, 1, 2].map(|d| acc.hi[d].max(b.hi[d])),
            )
        }))
    }

    /// Index shifts mapping a point onto its periodic images (zero shift included)
    pub fn periodic_shifts(&self) -> Vec<[i32; 3]> {
        let per_axis: Vec<Vec<i32>> = (0..3)
            .map(|d| {
                if self.periodic[d] {
                    let l = self.domain.length(d);
                    vec![0, -l, l]
                } else {
                    vec![0]
                }
            })
            .collect();
        let mut shifts = Vec::new();
        for &sz in &per_axis[2] {
            for &sy in &per_axis[1] {
                for &sx in &per_axis[0] {
                    shifts.push([sx, sy, sz]);
                }
            }
        }
        shifts
    }
}

/// A field quantity over a whole box array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiField {
    index_type: IndexType,
    ncomp: usize,
    ngrow: [i32; 3],
    ba: BoxArray,
    blocks: Vec<FieldArray>,
}

impl MultiField {
    pub fn new(ba: &BoxArray, index_type: IndexType, ncomp: usize, ngrow: [i32; 3]) -> Self {
        let blocks = ba
            .boxes
            .iter()
            .map(|b| FieldArray::new(b.convert(index_type).grow(ngrow), ncomp))
            .collect();
        Self {
            index_type,
            ncomp,
            ngrow,
            ba: ba.clone(),
            blocks,
        }
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn ncomp(&self) -> usize {
        self.ncomp
    }

    pub fn ngrow(&self) -> [i32; 3] {
        self.ngrow
    }

    pub fn box_array(&self) -> &BoxArray {
        &self.ba
    }

    pub fn nblocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn cell_box(&self, b: usize) -> IndexBox {
        self.ba.boxes[b]
    }

    /// Valid points of block `b` in this field's centering
    pub fn valid_box(&self, b: usize) -> IndexBox {
        self.ba.boxes[b].convert(self.index_type)
    }

    /// Valid points of block `b` that no other block owns
    pub fn owned_box(&self, b: usize) -> IndexBox {
        let cell = self.ba.boxes[b];
        let mut owned = self.valid_box(b);
        for d in 0..3 {
            let at_open_hi = !self.ba.periodic[d] && cell.hi[d] == self.ba.domain.hi[d];
            if self.index_type.nodal[d] && !at_open_hi {
                owned.hi[d] -= 1;
            }
        }
        owned
    }

    pub fn block(&self, b: usize) -> &FieldArray {
        &self.blocks[b]
    }

    pub fn block_mut(&mut self, b: usize) -> &mut FieldArray {
        &mut self.blocks[b]
    }

    pub fn blocks(&self) -> &[FieldArray] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [FieldArray] {
        &mut self.blocks
    }

    pub fn set_val(&mut self, v: f64) {
        for fab in &mut self.blocks {
            fab.fill(v);
        }
    }

    /// True when both fields share centering, components and block layout
    pub fn same_layout(&self, other: &MultiField) -> bool {
        self.index_type == other.index_type
            && self.ncomp == other.ncomp
            && self.blocks.len() == other.blocks.len()
            && self
                .blocks
                .iter()
                .zip(&other.blocks)
                .all(|(a, b)| a.bx == b.bx)
    }

    /// Copy owned values (and their periodic images) into every other copy
    pub fn fill_boundary(&mut self) {
        let shifts = self.ba.periodic_shifts();
        let owned: Vec<IndexBox> = (0..self.blocks.len()).map(|b| self.owned_box(b)).collect();
        let mut patches = Vec::new();

        for (dst, dst_fab) in self.blocks.iter().enumerate() {
            let dst_box = dst_fab.bx;
            for (src, src_owned) in owned.iter().enumerate() {
                for s in &shifts {
                    if src == dst && *s == [0; 3] {
                        continue;
                    }
                    if let Some(region) = dst_box.intersect(&src_owned.shift(*s)) {
                        let values = self.blocks[src].extract(&region.shift(neg(*s)));
                        patches.push((dst, region, values));
                    }
                }
            }
        }

        for (dst, region, values) in patches {
            self.blocks[dst].insert(&region, &values);
        }
    }

    /// Fold every non-owned contribution into the owning block
    pub fn sum_boundary(&mut self) {
        let shifts = self.ba.periodic_shifts();
        let owned: Vec<IndexBox> = (0..self.blocks.len()).map(|b| self.owned_box(b)).collect();
        let mut patches = Vec::new();

        for (src, src_fab) in self.blocks.iter().enumerate() {
            for s in &shifts {
                let image = src_fab.bx.shift(*s);
                for (dst, dst_owned) in owned.iter().enumerate() {
                    if src == dst && *s == [0; 3] {
                        continue;
                    }
                    if let Some(region) = image.intersect(dst_owned) {
                        let values = src_fab.extract(&region.shift(neg(*s)));
                        patches.push((dst, region, values));
                    }
                }
            }
        }

        for (dst, region, values) in patches {
            self.blocks[dst].add_region(&region, &values);
        }
    }

    /// Sum of `f(block, i, j, k)` over owned points
    pub fn sum_owned(&self, f: impl Fn(&FieldArray, i32, i32, i32) -> f64) -> f64 {
        let mut total = 0.0;
        for (b, fab) in self.blocks.iter().enumerate() {
            self.owned_box(b).for_each(|i, j, k| total += f(fab, i, j, k));
        }
        total
    }

    /// Sum of squares of the component total over owned points
    pub fn sum_squares(&self) -> f64 {
        self.sum_owned(|fab, i, j, k| fab.total().at(i, j, k).powi(2))
    }

    pub fn max_abs(&self) -> f64 {
        self.blocks
            .iter()
            .flat_map(|fab| fab.data.iter())
            .fold(0.0_f64, |m, v| m.max(v.abs()))
    }
}

fn neg(s: [i32; 3]) -> [i32; 3] {
    s.map(|v| -v)
}

/// Physical description of one level's index space
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub dims: Dimensionality,
    /// Cell box of the whole domain at this level
    pub domain: IndexBox,
    pub prob_lo: Vector3<f64>,
    pub cell_size: Vector3<f64>,
    pub periodic: [bool; 3],
}

impl Geometry {
    pub fn new(
        dims: Dimensionality,
        n_cell: [i32; 3],
        prob_lo: [f64; 3],
        prob_hi: [f64; 3],
        periodic: [bool; 3],
    ) -> Self {
        let lo = Vector3::from(prob_lo);
        let hi = Vector3::from(prob_hi);
        let n = Vector3::new(n_cell[0] as f64, n_cell[1] as f64, n_cell[2] as f64);
        let active = dims.active();
        Self {
            dims,
            domain: IndexBox::from_size(n_cell),
            prob_lo: lo,
            cell_size: (hi - lo).component_div(&n),
            periodic: [0, 1, 2].map(|d| periodic[d] && active[d]),
        }
    }

    #[inline]
    pub fn dx(&self, axis: usize) -> f64 {
        self.cell_size[axis]
    }

    pub fn inv_cell_size(&self) -> Vector3<f64> {
        self.cell_size.map(|v| 1.0 / v)
    }

    /// Cell volume over the simulated axes (area in 2D/RZ, length in 1D)
    pub fn cell_volume(&self) -> f64 {
        let active = self.dims.active();
        (0..3)
            .filter(|&d| active[d])
            .map(|d| self.cell_size[d])
            .product()
    }

    pub fn refine(&self, r: [i32; 3]) -> Self {
        let rv = Vector3::new(r[0] as f64, r[1] as f64, r[2] as f64);
        Self {
            domain: self.domain.refine(r),
            cell_size: self.cell_size.component_div(&rv),
            ..self.clone()
        }
    }

    pub fn coarsen(&self, r: [i32; 3]) -> Self {
        let rv = Vector3::new(r[0] as f64, r[1] as f64, r[2] as f64);
        Self {
            domain: self.domain.coarsen(r),
            cell_size: self.cell_size.component_mul(&rv),
            ..self.clone()
        }
    }
}
