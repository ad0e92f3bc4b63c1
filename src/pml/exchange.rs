//! Coupling between the regular fields and the layer
//!
//! After each field update the regular ghost points that fall inside the
//! layer take the layer's physical value, and every layer point that falls
//! inside the regular domain takes the regular value (as its first part,
//! with the remaining parts cleared). The layer's own ghost exchange runs
//! last.

use crate::mesh::{IndexBox, MultiField, Sample};

/// Copy the layer's summed value into regular ghost points covered by the layer
pub fn copy_to_regular(reg: &mut MultiField, pml: &MultiField) {
    let shifts = reg.box_array().periodic_shifts();
    let pml_valid: Vec<IndexBox> = (0..pml.nblocks()).map(|b| pml.valid_box(b)).collect();

    for blk in 0..reg.nblocks() {
        let valid = reg.valid_box(blk);
        let fab = reg.block_mut(blk);
        let grown = fab.bx();
        for (src, src_valid) in pml_valid.iter().enumerate() {
            let total = pml.block(src).total();
            for s in &shifts {
                let Some(region) = grown.intersect(&src_valid.shift(*s)) else {
                    continue;
                };
                region.for_each(|i, j, k| {
                    if !valid.contains(i, j, k) {
                        fab.set(i, j, k, 0, total.at(i - s[0], j - s[1], k - s[2]));
                    }
                });
            }
        }
    }
}

/// Load regular values into every layer point (valid or ghost) inside the regular domain
pub fn copy_to_pml(pml: &mut MultiField, reg: &MultiField) {
    let shifts = reg.box_array().periodic_shifts();
    let reg_valid: Vec<IndexBox> = (0..reg.nblocks()).map(|b| reg.valid_box(b)).collect();
    let ncomp = pml.ncomp();

    for fab in pml.blocks_mut() {
        let grown = fab.bx();
        for (src, src_valid) in reg_valid.iter().enumerate() {
            let regular = reg.block(src);
            for s in &shifts {
                let Some(region) = grown.intersect(&src_valid.shift(*s)) else {
                    continue;
                };
                region.for_each(|i, j, k| {
                    fab.set(i, j, k, 0, regular.get(i - s[0], j - s[1], k - s[2], 0));
                    for n in 1..ncomp {
                        fab.set(i, j, k, n, 0.0);
                    }
                });
            }
        }
    }
}

/// Full exchange for one field component
pub fn exchange(pml: &mut MultiField, reg: &mut MultiField) {
    if pml.ngrow().iter().any(|&g| g > 0) {
        copy_to_regular(reg, pml);
    }
    copy_to_pml(pml, reg);
    pml.fill_boundary();
}
