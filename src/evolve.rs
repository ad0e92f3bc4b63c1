//! Field evolution driver
//!
//! Owns the fields of every refinement level (a fine patch, plus a coarse
//! patch above level 0), advances B, E and F block by block with the
//! stencil library, pushes the absorbing layer when one exists and keeps
//! ghost cells consistent between phases. Block updates are timed for the
//! cost hook when cost tracking is on.

use std::path::Path;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::info;

use crate::cost::BlockCosts;
use crate::deposit;
use crate::error::{PicError, Result};
use crate::gather::{self, FieldRefs, InterpGrid, InterpolationParams};
use crate::mesh::{BoxArray, FieldKind, Geometry, IndexBox, IndexType, MultiField, Sample};
use crate::particles::{FieldSamples, ParticleTile};
use crate::pml::{self, exchange, push, Pml, PmlPatch};
use crate::stencil::{divergence, yee, DispersionScheme, StencilContext};
use crate::{SimulationConfig, C0, EPS0, MU0};

/// Which patch of a level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchType {
    /// The level's own grid
    Fine,
    /// The level's footprint at its parent's resolution
    Coarse,
}

impl PatchType {
    pub const ALL: [PatchType; 2] = [PatchType::Fine, PatchType::Coarse];
}

/// Which half of the step an F update belongs to
///
/// Selects the charge density: the old one (component 0) for the first
/// half, the new one (component 1) otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtType {
    Full,
    FirstHalf,
    SecondHalf,
}

impl DtType {
    pub fn rho_comp(self) -> usize {
        match self {
            DtType::FirstHalf => 0,
            DtType::Full | DtType::SecondHalf => 1,
        }
    }
}

/// All mesh fields of one patch
#[derive(Debug, Clone)]
pub struct PatchFields {
    pub geom: Geometry,
    pub e: [MultiField; 3],
    pub b: [MultiField; 3],
    pub current: [MultiField; 3],
    /// Old (0) and new (1) charge density
    pub rho: MultiField,
    pub f: Option<MultiField>,
    ctx: StencilContext,
}

impl PatchFields {
    pub fn new(config: &SimulationConfig, geom: Geometry, ba: &BoxArray, ngrow: [i32; 3]) -> Self {
        let dims = config.dims;
        let it = |k: FieldKind| k.index_type(dims, config.staggering);
        let node = IndexType::NODE.masked(dims);
        Self {
            e: FieldKind::E.map(|k| MultiField::new(ba, it(k), 1, ngrow)),
            b: FieldKind::B.map(|k| MultiField::new(ba, it(k), 1, ngrow)),
            current: FieldKind::J.map(|k| MultiField::new(ba, it(k), 1, ngrow)),
            rho: MultiField::new(ba, node, 2, ngrow),
            f: config
                .divergence_cleaning
                .then(|| MultiField::new(ba, node, 1, ngrow)),
            ctx: StencilContext::new(config.scheme, &geom),
            geom,
        }
    }

    pub fn nblocks(&self) -> usize {
        self.rho.nblocks()
    }

    pub fn box_array(&self) -> &BoxArray {
        self.rho.box_array()
    }

    fn tiles(fields: &[MultiField; 3]) -> Vec<[IndexBox; 3]> {
        (0..fields[0].nblocks())
            .map(|blk| [0, 1, 2].map(|d| fields[d].valid_box(blk)))
            .collect()
    }

    /// Wall time of each block's B update
    fn push_b(&mut self, dt: f64) -> Vec<Duration> {
        let ctx = self.ctx;
        let e = &self.e;
        let tiles = Self::tiles(&self.b);
        let [bx, by, bz] = &mut self.b;

        bx.blocks_mut()
            .par_iter_mut()
            .zip(by.blocks_mut().par_iter_mut())
            .zip(bz.blocks_mut().par_iter_mut())
            .zip(tiles.par_iter())
            .enumerate()
            .map(|(blk, (((fx, fy), fz), t))| {
                let start = Instant::now();
                let eb = [e[0].block(blk), e[1].block(blk), e[2].block(blk)];
                yee::push_b_block([fx, fy, fz], eb, *t, &ctx, dt);
                start.elapsed()
            })
            .collect()
    }

    fn push_e(&mut self, dt: f64) -> Vec<Duration> {
        let ctx = self.ctx;
        let b = &self.b;
        let j = &self.current;
        let f = self.f.as_ref();
        let tiles = Self::tiles(&self.e);
        let [ex, ey, ez] = &mut self.e;

        ex.blocks_mut()
            .par_iter_mut()
            .zip(ey.blocks_mut().par_iter_mut())
            .zip(ez.blocks_mut().par_iter_mut())
            .zip(tiles.par_iter())
            .enumerate()
            .map(|(blk, (((fx, fy), fz), t))| {
                let start = Instant::now();
                let bb = [b[0].block(blk), b[1].block(blk), b[2].block(blk)];
                let jb = [j[0].block(blk), j[1].block(blk), j[2].block(blk)];
                let fb = f.map(|mf| mf.block(blk));
                yee::push_e_block([fx, fy, fz], bb, jb, fb, *t, &ctx, dt);
                start.elapsed()
            })
            .collect()
    }

    fn push_f(&mut self, dt: f64, dt_type: DtType) -> Vec<Duration> {
        let Some(f) = self.f.as_mut() else {
            return Vec::new();
        };
        let ctx = self.ctx;
        let e = &self.e;
        let rho = &self.rho;
        let comp = dt_type.rho_comp();
        let tiles: Vec<IndexBox> = (0..f.nblocks()).map(|blk| f.valid_box(blk)).collect();

        f.blocks_mut()
            .par_iter_mut()
            .zip(tiles.par_iter())
            .enumerate()
            .map(|(blk, (fab, tile))| {
                let start = Instant::now();
                let eb = [e[0].block(blk), e[1].block(blk), e[2].block(blk)];
                divergence::push_f_block(fab, eb, rho.block(blk), comp, *tile, &ctx, dt);
                start.elapsed()
            })
            .collect()
    }

    /// Electromagnetic energy over owned points
    pub fn field_energy(&self) -> f64 {
        let e2: f64 = self.e.iter().map(MultiField::sum_squares).sum();
        let b2: f64 = self.b.iter().map(MultiField::sum_squares).sum();
        (0.5 * EPS0 * e2 + 0.5 * b2 / MU0) * self.geom.cell_volume()
    }

    /// div E on the nodes of the valid boxes
    pub fn div_e(&self) -> MultiField {
        let mut out = MultiField::new(
            self.box_array(),
            IndexType::NODE.masked(self.geom.dims),
            1,
            [0; 3],
        );
        for blk in 0..out.nblocks() {
            let tile = out.valid_box(blk);
            let eb = [self.e[0].block(blk), self.e[1].block(blk), self.e[2].block(blk)];
            divergence::compute_div_e(out.block_mut(blk), eb, tile, &self.ctx);
        }
        out
    }

    /// div B at the cell centers of the valid boxes
    pub fn div_b(&self) -> MultiField {
        let mut out = MultiField::new(self.box_array(), IndexType::CELL, 1, [0; 3]);
        for blk in 0..out.nblocks() {
            let tile = out.valid_box(blk);
            let bb = [self.b[0].block(blk), self.b[1].block(blk), self.b[2].block(blk)];
            divergence::compute_div_b(out.block_mut(blk), bb, tile, &self.ctx);
        }
        out
    }
}

/// One refinement level
#[derive(Debug, Clone)]
pub struct Level {
    pub fine: PatchFields,
    pub coarse: Option<PatchFields>,
    pub pml: Option<Pml>,
    /// Refinement ratio to the parent level (1 on level 0)
    ratio: [i32; 3],
}

impl Level {
    pub fn patch(&self, patch: PatchType) -> Option<&PatchFields> {
        match patch {
            PatchType::Fine => Some(&self.fine),
            PatchType::Coarse => self.coarse.as_ref(),
        }
    }

    /// Patch fields and the matching layer, if both exist
    fn parts_mut(&mut self, patch: PatchType) -> Option<(&mut PatchFields, Option<&mut PmlPatch>)> {
        let fields = match patch {
            PatchType::Fine => &mut self.fine,
            PatchType::Coarse => self.coarse.as_mut()?,
        };
        let layer = self.pml.as_mut().and_then(|p| p.patch_mut(patch));
        Some((fields, layer))
    }

    /// Cells a block's cost is normalized by: coarse boxes count at fine resolution
    fn cost_box(&self, patch: PatchType, blk: usize) -> IndexBox {
        let cell = match self.patch(patch) {
            Some(fields) => fields.box_array().boxes[blk],
            None => self.fine.box_array().boxes[blk],
        };
        match patch {
            PatchType::Fine => cell,
            PatchType::Coarse => cell.refine(self.ratio),
        }
    }
}

/// Time step at the Courant limit of the finest level
pub fn courant_dt(config: &SimulationConfig) -> f64 {
    let d = &config.domain;
    let active = config.dims.active();
    let refine = (config.ref_ratio as f64).powi(d.refined_regions.len() as i32);
    let dx: Vec<f64> = (0..3)
        .filter(|&a| active[a])
        .map(|a| (d.prob_hi[a] - d.prob_lo[a]) / d.n_cell[a] as f64 / refine)
        .collect();
    match config.scheme {
        DispersionScheme::Standard => {
            let s: f64 = dx.iter().map(|h| 1.0 / (h * h)).sum();
            config.cfl / (C0 * s.sqrt())
        }
        DispersionScheme::DispersionCorrected => {
            let min = dx.iter().copied().fold(f64::INFINITY, f64::min);
            config.cfl * min / C0
        }
    }
}

/// Per-level, per-patch time advance of the electromagnetic fields
#[derive(Debug, Clone)]
pub struct FieldEvolver {
    config: SimulationConfig,
    levels: Vec<Level>,
    costs: Option<BlockCosts>,
}

impl FieldEvolver {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let dims = config.dims;
        let d = &config.domain;
        let ngrow = dims.mask([config.interpolation_order.max(2) as i32; 3], 0);
        let r1 = dims.ratio(config.ref_ratio);

        let geom0 = Geometry::new(dims, d.n_cell, d.prob_lo, d.prob_hi, d.periodic);
        let ba0 = BoxArray::chop(geom0.domain, geom0.domain, d.max_grid_size, dims, geom0.periodic);
        let sides0 = config.pml_sides();
        let (ncell, delta) = config.pml.as_ref().map_or((0, 0), |p| (p.ncell, p.delta));

        let pml0 = sides0.map(|(lo, hi)| Pml::new(&config, 0, &geom0, geom0.domain, None, ncell, delta, lo, hi));
        info!(level = 0, blocks = ba0.len(), domain = ?geom0.domain, "Built level");
        let mut levels = vec![Level {
            fine: PatchFields::new(&config, geom0.clone(), &ba0, ngrow),
            coarse: None,
            pml: pml0,
            ratio: [1; 3],
        }];

        let mut geom = geom0;
        let mut total_ratio = [1; 3];
        for (n, region) in d.refined_regions.iter().enumerate() {
            let lev = n + 1;
            total_ratio = [0, 1, 2].map(|a| total_ratio[a] * r1[a]);
            let coarse_geom = geom;
            geom = coarse_geom.refine(r1);

            let masked = IndexBox::new(dims.mask(region.lo, 0), dims.mask(region.hi, 0));
            let patch = masked.refine(total_ratio);
            let periodic = [0, 1, 2].map(|a| geom.periodic[a] && patch.length(a) == geom.domain.length(a));
            let ba = BoxArray::chop(patch, patch, d.max_grid_size, dims, periodic);
            let coarse_ba = ba.coarsen(r1);

            let pml = sides0.map(|level0| {
                let (lo, hi) = pml::refined_sides(dims, patch, geom.domain, level0);
                Pml::new(
                    &config,
                    lev,
                    &geom,
                    patch,
                    Some((&coarse_geom, coarse_ba.domain)),
                    ncell,
                    delta,
                    lo,
                    hi,
                )
            });

            info!(level = lev, blocks = ba.len(), patch = ?patch, "Built level");
            levels.push(Level {
                fine: PatchFields::new(&config, geom.clone(), &ba, ngrow),
                coarse: Some(PatchFields::new(&config, coarse_geom, &coarse_ba, ngrow)),
                pml,
                ratio: r1,
            });
        }

        let costs = config.cost_tracking.then(|| {
            let nblocks: Vec<usize> = levels.iter().map(|l| l.fine.nblocks()).collect();
            BlockCosts::new(&nblocks)
        });

        Ok(Self { config, levels, costs })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn nlevels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, lev: usize) -> Result<&Level> {
        let nlevels = self.levels.len();
        self.levels.get(lev).ok_or(PicError::LevelOutOfRange { level: lev, nlevels })
    }

    pub fn level_mut(&mut self, lev: usize) -> Result<&mut Level> {
        let nlevels = self.levels.len();
        self.levels
            .get_mut(lev)
            .ok_or(PicError::LevelOutOfRange { level: lev, nlevels })
    }

    /// Fields of one patch; `None` for the coarse patch of level 0
    pub fn patch(&self, lev: usize, patch: PatchType) -> Result<Option<&PatchFields>> {
        Ok(self.level(lev)?.patch(patch))
    }

    pub fn patch_mut(&mut self, lev: usize, patch: PatchType) -> Result<Option<&mut PatchFields>> {
        Ok(self.level_mut(lev)?.parts_mut(patch).map(|(fields, _)| fields))
    }

    pub fn costs(&self) -> Option<&BlockCosts> {
        self.costs.as_ref()
    }

    pub fn costs_mut(&mut self) -> Option<&mut BlockCosts> {
        self.costs.as_mut()
    }

    fn record_costs(&mut self, lev: usize, patch: PatchType, walls: Vec<Duration>) {
        let Some(costs) = self.costs.as_mut() else {
            return;
        };
        let level = &self.levels[lev];
        for (blk, wall) in walls.into_iter().enumerate() {
            costs.record(lev, blk, wall, level.cost_box(patch, blk));
        }
    }

    pub fn evolve_b(&mut self, lev: usize, patch: PatchType, dt: f64) -> Result<()> {
        let Some((fields, layer)) = self.level_mut(lev)?.parts_mut(patch) else {
            return Ok(());
        };
        let walls = fields.push_b(dt);
        if let Some(layer) = layer {
            push::push_pml_b(layer, dt);
        }
        self.record_costs(lev, patch, walls);
        Ok(())
    }

    pub fn evolve_e(&mut self, lev: usize, patch: PatchType, dt: f64) -> Result<()> {
        let Some((fields, layer)) = self.level_mut(lev)?.parts_mut(patch) else {
            return Ok(());
        };
        let walls = fields.push_e(dt);
        if let Some(layer) = layer {
            push::push_pml_e(layer, dt);
        }
        self.record_costs(lev, patch, walls);
        Ok(())
    }

    /// Advance F on one patch and its layer
    ///
    /// The layer's F is damped by the following [`Self::evolve_e`] on the same
    /// patch, so F pushes are expected to be paired with an E push as in
    /// [`Self::one_step`].
    pub fn evolve_f(&mut self, lev: usize, patch: PatchType, dt: f64, dt_type: DtType) -> Result<()> {
        let Some((fields, layer)) = self.level_mut(lev)?.parts_mut(patch) else {
            return Ok(());
        };
        if fields.f.is_none() {
            return Ok(());
        }
        let walls = fields.push_f(dt, dt_type);
        if let Some(layer) = layer {
            push::push_pml_f(layer, dt);
        }
        self.record_costs(lev, patch, walls);
        Ok(())
    }

    pub fn evolve_b_all(&mut self, dt: f64) -> Result<()> {
        self.for_all(|ev, lev, patch| ev.evolve_b(lev, patch, dt))
    }

    pub fn evolve_e_all(&mut self, dt: f64) -> Result<()> {
        self.for_all(|ev, lev, patch| ev.evolve_e(lev, patch, dt))
    }

    pub fn evolve_f_all(&mut self, dt: f64, dt_type: DtType) -> Result<()> {
        self.for_all(|ev, lev, patch| ev.evolve_f(lev, patch, dt, dt_type))
    }

    pub fn fill_boundary_b(&mut self, lev: usize, patch: PatchType) -> Result<()> {
        if let Some((fields, mut layer)) = self.level_mut(lev)?.parts_mut(patch) {
            for d in 0..3 {
                if let Some(layer) = layer.as_deref_mut() {
                    exchange::exchange(&mut layer.b[d], &mut fields.b[d]);
                }
                fields.b[d].fill_boundary();
            }
        }
        Ok(())
    }

    pub fn fill_boundary_e(&mut self, lev: usize, patch: PatchType) -> Result<()> {
        if let Some((fields, mut layer)) = self.level_mut(lev)?.parts_mut(patch) {
            for d in 0..3 {
                if let Some(layer) = layer.as_deref_mut() {
                    exchange::exchange(&mut layer.e[d], &mut fields.e[d]);
                }
                fields.e[d].fill_boundary();
            }
        }
        Ok(())
    }

    pub fn fill_boundary_f(&mut self, lev: usize, patch: PatchType) -> Result<()> {
        if let Some((fields, layer)) = self.level_mut(lev)?.parts_mut(patch) {
            let Some(f) = fields.f.as_mut() else {
                return Ok(());
            };
            if let Some(layer_f) = layer.and_then(|l| l.f.as_mut()) {
                exchange::exchange(layer_f, f);
            }
            f.fill_boundary();
        }
        Ok(())
    }

    fn for_all(&mut self, mut op: impl FnMut(&mut Self, usize, PatchType) -> Result<()>) -> Result<()> {
        for lev in 0..self.nlevels() {
            for patch in PatchType::ALL {
                op(self, lev, patch)?;
            }
        }
        Ok(())
    }

    pub fn fill_boundary_b_all(&mut self) -> Result<()> {
        self.for_all(Self::fill_boundary_b)
    }

    pub fn fill_boundary_e_all(&mut self) -> Result<()> {
        self.for_all(Self::fill_boundary_e)
    }

    pub fn fill_boundary_f_all(&mut self) -> Result<()> {
        self.for_all(Self::fill_boundary_f)
    }

    /// Fold deposited current from ghost cells into owners, then refresh ghosts
    pub fn sync_current(&mut self, lev: usize, patch: PatchType) -> Result<()> {
        if let Some(fields) = self.patch_mut(lev, patch)? {
            for j in fields.current.iter_mut() {
                j.sum_boundary();
                j.fill_boundary();
            }
        }
        Ok(())
    }

    pub fn sync_rho(&mut self, lev: usize, patch: PatchType) -> Result<()> {
        if let Some(fields) = self.patch_mut(lev, patch)? {
            fields.rho.sum_boundary();
            fields.rho.fill_boundary();
        }
        Ok(())
    }

    /// Interpolate E and B onto the particles of block `blk`
    pub fn gather(
        &self,
        lev: usize,
        patch: PatchType,
        blk: usize,
        tile: &ParticleTile,
        samples: &mut FieldSamples,
    ) -> Result<()> {
        let Some(fields) = self.patch(lev, patch)? else {
            return Ok(());
        };
        check_block(lev, blk, fields)?;
        let refs = FieldRefs {
            e: [fields.e[0].block(blk), fields.e[1].block(blk), fields.e[2].block(blk)],
            b: [fields.b[0].block(blk), fields.b[1].block(blk), fields.b[2].block(blk)],
        };
        let grid = InterpGrid::from_geometry(&fields.geom);
        let params = InterpolationParams::from_config(&self.config);
        gather::gather_fields(tile, samples, &refs, &grid, &params);
        Ok(())
    }

    /// Deposit the charge of block `blk`'s particles into rho component `comp`
    pub fn deposit_charge(
        &mut self,
        lev: usize,
        patch: PatchType,
        blk: usize,
        tile: &ParticleTile,
        charge: f64,
        comp: usize,
    ) -> Result<()> {
        let order = self.config.interpolation_order;
        if let Some(fields) = self.patch_mut(lev, patch)? {
            check_block(lev, blk, fields)?;
            let grid = InterpGrid::from_geometry(&fields.geom);
            deposit::deposit_charge(tile, charge, fields.rho.block_mut(blk), comp, &grid, order);
        }
        Ok(())
    }

    pub fn deposit_current(
        &mut self,
        lev: usize,
        patch: PatchType,
        blk: usize,
        tile: &ParticleTile,
        charge: f64,
    ) -> Result<()> {
        let order = self.config.interpolation_order;
        let shift = self.config.staggering.shift();
        if let Some(fields) = self.patch_mut(lev, patch)? {
            check_block(lev, blk, fields)?;
            let grid = InterpGrid::from_geometry(&fields.geom);
            let [jx, jy, jz] = &mut fields.current;
            let j = [jx.block_mut(blk), jy.block_mut(blk), jz.block_mut(blk)];
            deposit::deposit_current(tile, charge, j, &grid, order, shift);
        }
        Ok(())
    }

    /// One leapfrog step of every level
    ///
    /// F(dt/2) → B(dt/2) → E(dt) → F(dt/2) → B(dt/2), with ghost exchanges
    /// in between. F calls are skipped without divergence cleaning.
    pub fn one_step(&mut self, dt: f64) -> Result<()> {
        let cleaning = self.config.divergence_cleaning;
        if cleaning {
            self.evolve_f_all(0.5 * dt, DtType::FirstHalf)?;
            self.fill_boundary_f_all()?;
        }
        self.evolve_b_all(0.5 * dt)?;
        self.fill_boundary_b_all()?;
        self.evolve_e_all(dt)?;
        self.fill_boundary_e_all()?;
        if cleaning {
            self.evolve_f_all(0.5 * dt, DtType::SecondHalf)?;
        }
        self.evolve_b_all(0.5 * dt)?;
        self.fill_boundary_b_all()?;
        self.fill_boundary_e_all()?;
        if cleaning {
            self.fill_boundary_f_all()?;
        }
        Ok(())
    }

    /// Electromagnetic energy of one patch over owned points
    pub fn field_energy(&self, lev: usize, patch: PatchType) -> Result<f64> {
        Ok(self.patch(lev, patch)?.map_or(0.0, PatchFields::field_energy))
    }

    /// Energy held in the absorbing layer of one patch
    pub fn pml_energy(&self, lev: usize, patch: PatchType) -> Result<f64> {
        let level = self.level(lev)?;
        let volume = level.patch(patch).map_or(0.0, |p| p.geom.cell_volume());
        Ok(level
            .pml
            .as_ref()
            .and_then(|p| p.patch(patch))
            .map_or(0.0, |layer| layer.field_energy(volume)))
    }

    /// Largest |div B| over the valid cells of one patch
    pub fn max_div_b(&self, lev: usize, patch: PatchType) -> Result<f64> {
        Ok(self.patch(lev, patch)?.map_or(0.0, |p| p.div_b().max_abs()))
    }

    /// Sample component 0 of `kind` at a point of the fine patch of `lev`
    pub fn probe(&self, lev: usize, kind: FieldKind, i: i32, j: i32, k: i32) -> Result<Option<f64>> {
        let fields = &self.level(lev)?.fine;
        let mf = match kind {
            FieldKind::Ex => &fields.e[0],
            FieldKind::Ey => &fields.e[1],
            FieldKind::Ez => &fields.e[2],
            FieldKind::Bx => &fields.b[0],
            FieldKind::By => &fields.b[1],
            FieldKind::Bz => &fields.b[2],
            FieldKind::Jx => &fields.current[0],
            FieldKind::Jy => &fields.current[1],
            FieldKind::Jz => &fields.current[2],
            FieldKind::Rho => &fields.rho,
            FieldKind::F => match &fields.f {
                Some(f) => f,
                None => return Ok(None),
            },
        };
        Ok((0..mf.nblocks())
            .find(|&blk| mf.valid_box(blk).contains(i, j, k))
            .map(|blk| mf.block(blk).comp(0).at(i, j, k)))
    }

    /// Write every level's absorbing layer under `dir`
    pub fn write_pml_checkpoint(&self, dir: &Path) -> Result<()> {
        for pml in self.levels.iter().filter_map(|l| l.pml.as_ref()) {
            pml.write_checkpoint(dir)?;
        }
        Ok(())
    }

    /// Restore every level's absorbing layer; `Ok(false)` if nothing was restored
    pub fn restore_pml_checkpoint(&mut self, dir: &Path) -> Result<bool> {
        let mut restored = false;
        for pml in self.levels.iter_mut().filter_map(|l| l.pml.as_mut()) {
            restored |= pml.restore_checkpoint(dir)?;
        }
        Ok(restored)
    }
}

fn check_block(level: usize, block: usize, fields: &PatchFields) -> Result<()> {
    let nblocks = fields.nblocks();
    if block < nblocks {
        Ok(())
    } else {
        Err(PicError::BlockOutOfRange { level, block, nblocks })
    }
}
