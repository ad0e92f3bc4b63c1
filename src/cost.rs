//! Per-block cost instrumentation
//!
//! Wall time of each block update, divided by the block's cell count, is
//! accumulated here for an external load balancer to read and reset.

use std::time::Duration;

use crate::mesh::IndexBox;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockCosts {
    levels: Vec<Vec<f64>>,
}

impl BlockCosts {
    /// Zeroed costs for `nblocks[lev]` blocks on each level
    pub fn new(nblocks: &[usize]) -> Self {
        Self {
            levels: nblocks.iter().map(|&n| vec![0.0; n]).collect(),
        }
    }

    /// Add `wall / cells(cost_box)` seconds to block `blk` of level `lev`
    pub fn record(&mut self, lev: usize, blk: usize, wall: Duration, cost_box: IndexBox) {
        let cells = cost_box.num_pts().max(1) as f64;
        if let Some(c) = self.levels.get_mut(lev).and_then(|l| l.get_mut(blk)) {
            *c += wall.as_secs_f64() / cells;
        }
    }

    pub fn costs(&self, lev: usize) -> &[f64] {
        self.levels.get(lev).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn reset(&mut self) {
        for l in &mut self.levels {
            l.fill(0.0);
        }
    }
}
