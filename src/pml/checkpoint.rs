//! PML checkpoint and restart
//!
//! Layout, one directory per level:
//!
//! ```text
//! <dir>/pml_lev<N>/header.json   ncell, delta, side flags, timestamp
//! <dir>/pml_lev<N>/sigma.bin     tables and cached factors of both patches
//! <dir>/pml_lev<N>/fp_Ex.bin     one file per split array, fp_ or cp_
//! ```

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Pml, PmlPatch, SigmaBox};
use crate::error::{PicError, Result};
use crate::mesh::{FieldKind, MultiField};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointHeader {
    pub level: usize,
    pub ncell: i32,
    pub delta: i32,
    pub lo: [bool; 3],
    pub hi: [bool; 3],
    pub has_coarse: bool,
    pub has_f: bool,
    pub written_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct SigmaState {
    fine: SigmaBox,
    coarse: Option<SigmaBox>,
}

/// Directory holding level `level`'s layer under `dir`
pub fn level_dir(dir: &Path, level: usize) -> PathBuf {
    dir.join(format!("pml_lev{level}"))
}

fn write_bin<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|e| PicError::io(path, e))?;
    bincode::serialize_into(BufWriter::new(file), value)?;
    Ok(())
}

fn read_bin<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| PicError::io(path, e))?;
    Ok(bincode::deserialize_from(BufReader::new(file))?)
}

fn layout(mf: &MultiField) -> String {
    format!(
        "{} blocks x {} comps, ngrow {:?}",
        mf.nblocks(),
        mf.ncomp(),
        mf.ngrow()
    )
}

/// Named split arrays of one patch
fn arrays(patch: &PmlPatch) -> Vec<(&'static str, &MultiField)> {
    let mut out: Vec<(&'static str, &MultiField)> = FieldKind::E
        .iter()
        .zip(patch.e.iter())
        .chain(FieldKind::B.iter().zip(patch.b.iter()))
        .map(|(k, mf)| (k.name(), mf))
        .collect();
    if let Some(f) = &patch.f {
        out.push((FieldKind::F.name(), f));
    }
    out
}

fn arrays_mut(patch: &mut PmlPatch) -> Vec<(&'static str, &mut MultiField)> {
    let mut out: Vec<(&'static str, &mut MultiField)> = FieldKind::E
        .iter()
        .zip(patch.e.iter_mut())
        .chain(FieldKind::B.iter().zip(patch.b.iter_mut()))
        .map(|(k, mf)| (k.name(), mf))
        .collect();
    if let Some(f) = &mut patch.f {
        out.push((FieldKind::F.name(), f));
    }
    out
}

fn write_patch(dir: &Path, prefix: &str, patch: &PmlPatch) -> Result<()> {
    for (name, mf) in arrays(patch) {
        write_bin(&dir.join(format!("{prefix}_{name}.bin")), mf)?;
    }
    Ok(())
}

/// Read every split array of a patch, checking each against the live one
fn load_patch(dir: &Path, prefix: &str, patch: &PmlPatch) -> Result<Vec<MultiField>> {
    arrays(patch)
        .into_iter()
        .map(|(name, mf)| {
            let saved: MultiField = read_bin(&dir.join(format!("{prefix}_{name}.bin")))?;
            if !saved.same_layout(mf) {
                return Err(PicError::CheckpointMismatch {
                    name: format!("{prefix}_{name}"),
                    expected: layout(mf),
                    found: layout(&saved),
                });
            }
            Ok(saved)
        })
        .collect()
}

fn check_sigma(prefix: &str, live: &SigmaBox, saved: &SigmaBox) -> Result<()> {
    if live.same_layout(saved) {
        return Ok(());
    }
    let ranges = |s: &SigmaBox| {
        s.tables
            .iter()
            .map(|t| (t.lo, t.sigma.len()))
            .collect::<Vec<_>>()
    };
    Err(PicError::CheckpointMismatch {
        name: format!("{prefix}_sigma"),
        expected: format!("{:?}", ranges(live)),
        found: format!("{:?}", ranges(saved)),
    })
}

fn install(patch: &mut PmlPatch, saved: Vec<MultiField>, sigma: SigmaBox) {
    for ((_, mf), saved) in arrays_mut(patch).into_iter().zip(saved) {
        *mf = saved;
    }
    patch.sigma = sigma;
}

impl Pml {
    /// Write this level's layer under `dir`
    pub fn write_checkpoint(&self, dir: &Path) -> Result<()> {
        let ldir = level_dir(dir, self.level);
        fs::create_dir_all(&ldir).map_err(|e| PicError::io(&ldir, e))?;

        let header = CheckpointHeader {
            level: self.level,
            ncell: self.ncell,
            delta: self.delta,
            lo: self.lo,
            hi: self.hi,
            has_coarse: self.coarse.is_some(),
            has_f: self.fine.f.is_some(),
            written_at: Utc::now(),
        };
        let header_path = ldir.join("header.json");
        let json = serde_json::to_string_pretty(&header)?;
        fs::write(&header_path, json).map_err(|e| PicError::io(&header_path, e))?;

        let sigma = SigmaState {
            fine: self.fine.sigma.clone(),
            coarse: self.coarse.as_ref().map(|p| p.sigma.clone()),
        };
        write_bin(&ldir.join("sigma.bin"), &sigma)?;

        write_patch(&ldir, "fp", &self.fine)?;
        if let Some(coarse) = &self.coarse {
            write_patch(&ldir, "cp", coarse)?;
        }

        info!(level = self.level, dir = %ldir.display(), "Wrote PML checkpoint");
        Ok(())
    }

    /// Restore this level's layer from `dir`
    ///
    /// Returns `Ok(false)` when the checkpoint has no layer for this level.
    pub fn restore_checkpoint(&mut self, dir: &Path) -> Result<bool> {
        let ldir = level_dir(dir, self.level);
        if !ldir.is_dir() {
            return Ok(false);
        }

        let header_path = ldir.join("header.json");
        let text = fs::read_to_string(&header_path).map_err(|e| PicError::io(&header_path, e))?;
        let header: CheckpointHeader = serde_json::from_str(&text)?;
        let has_coarse = self.coarse.is_some();
        let has_f = self.fine.f.is_some();
        if header.ncell != self.ncell
            || header.delta != self.delta
            || header.has_coarse != has_coarse
            || header.has_f != has_f
        {
            let describe = |ncell, delta, coarse, f| {
                format!("ncell {ncell} delta {delta} coarse {coarse} F {f}")
            };
            return Err(PicError::CheckpointMismatch {
                name: "header".into(),
                expected: describe(self.ncell, self.delta, has_coarse, has_f),
                found: describe(header.ncell, header.delta, header.has_coarse, header.has_f),
            });
        }

        // Everything is read and checked before the live layer is touched
        let sigma: SigmaState = read_bin(&ldir.join("sigma.bin"))?;
        check_sigma("fp", &self.fine.sigma, &sigma.fine)?;
        let fine = load_patch(&ldir, "fp", &self.fine)?;
        let coarse = match (&self.coarse, sigma.coarse) {
            (Some(live), Some(saved_sigma)) => {
                check_sigma("cp", &live.sigma, &saved_sigma)?;
                Some((load_patch(&ldir, "cp", live)?, saved_sigma))
            }
            (None, None) => None,
            (live, saved) => {
                return Err(PicError::CheckpointMismatch {
                    name: "cp_sigma".into(),
                    expected: format!("coarse {}", live.is_some()),
                    found: format!("coarse {}", saved.is_some()),
                });
            }
        };

        install(&mut self.fine, fine, sigma.fine);
        if let (Some(patch), Some((arrays, sigma))) = (&mut self.coarse, coarse) {
            install(patch, arrays, sigma);
        }

        info!(level = self.level, written_at = %header.written_at, "Restored PML checkpoint");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Dimensionality, Geometry};
    use crate::pml::push::{push_pml_b, push_pml_e};
    use crate::{DomainConfig, PmlConfig, SimulationConfig};

    fn build() -> Pml {
        let config = SimulationConfig {
            dims: Dimensionality::TwoD,
            domain: DomainConfig {
                n_cell: [8, 1, 8],
                max_grid_size: 8,
                ..DomainConfig::default()
            },
            divergence_cleaning: true,
            pml: Some(PmlConfig {
                ncell: 3,
                delta: 2,
                ..PmlConfig::default()
            }),
            ..SimulationConfig::default()
        };
        let d = &config.domain;
        let g = Geometry::new(config.dims, d.n_cell, d.prob_lo, d.prob_hi, d.periodic);
        Pml::new(&config, 0, &g, g.domain, None, 3, 2, [true, false, true], [true, false, true])
    }

    #[test]
    fn test_missing_directory_means_inactive() {
        let tmp = tempfile::tempdir().unwrap();
        let mut pml = build();
        assert!(!pml.restore_checkpoint(tmp.path()).unwrap());
    }

    #[test]
    fn test_round_trip_files() {
        let tmp = tempfile::tempdir().unwrap();
        let mut pml = build();
        pml.fine.e[2].block_mut(0).set(-1, 0, 3, 1, 4.5);
        push_pml_b(&mut pml.fine, 1e-12);
        pml.write_checkpoint(tmp.path()).unwrap();

        let ldir = level_dir(tmp.path(), 0);
        for name in ["header.json", "sigma.bin", "fp_Ex.bin", "fp_Bz.bin", "fp_F.bin"] {
            assert!(ldir.join(name).is_file(), "{name}");
        }
        assert!(!ldir.join("cp_Ex.bin").exists());

        let mut restored = build();
        assert!(restored.restore_checkpoint(tmp.path()).unwrap());
        assert_eq!(restored.fine.e[2], pml.fine.e[2]);
        assert_eq!(restored.fine.b[0], pml.fine.b[0]);
        assert_eq!(restored.fine.sigma.cached_dt(), (Some(1e-12), None));

        // Identical subsequent updates
        push_pml_e(&mut pml.fine, 1e-12);
        push_pml_e(&mut restored.fine, 1e-12);
        for d in 0..3 {
            assert_eq!(restored.fine.e[d], pml.fine.e[d]);
        }
    }

    #[test]
    fn test_layout_mismatch_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        build().write_checkpoint(tmp.path()).unwrap();
        let ldir = level_dir(tmp.path(), 0);
        // Replace one array with a differently shaped one
        let mut other = build();
        other.fine.e[0] = other.fine.b[0].clone();
        write_bin(&ldir.join("fp_Ex.bin"), &other.fine.e[0]).unwrap();

        let err = build().restore_checkpoint(tmp.path()).unwrap_err();
        assert!(matches!(err, PicError::CheckpointMismatch { ref name, .. } if name == "fp_Ex"));
    }

    #[test]
    fn test_failed_restore_leaves_layer_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let mut saved = build();
        saved.fine.e[0].block_mut(0).set(-1, 0, 3, 1, 2.0);
        saved.write_checkpoint(tmp.path()).unwrap();

        // Ex would load fine, Bx is the wrong shape
        let ldir = level_dir(tmp.path(), 0);
        let wrong = build().fine.e[0].clone();
        write_bin(&ldir.join("fp_Bx.bin"), &wrong).unwrap();

        let mut live = build();
        live.fine.e[0].block_mut(0).set(-1, 0, 3, 1, -7.0);
        push_pml_b(&mut live.fine, 1e-12);
        let before = live.fine.clone();

        let err = live.restore_checkpoint(tmp.path()).unwrap_err();
        assert!(matches!(err, PicError::CheckpointMismatch { ref name, .. } if name == "fp_Bx"));
        for d in 0..3 {
            assert_eq!(live.fine.e[d], before.e[d]);
            assert_eq!(live.fine.b[d], before.b[d]);
        }
        assert_eq!(live.fine.f, before.f);
        assert_eq!(live.fine.sigma.cached_dt(), (Some(1e-12), None));
    }

    #[test]
    fn test_restore_rejects_missing_f() {
        let tmp = tempfile::tempdir().unwrap();
        build().write_checkpoint(tmp.path()).unwrap();

        let mut live = build();
        live.fine.f = None;
        let err = live.restore_checkpoint(tmp.path()).unwrap_err();
        assert!(matches!(err, PicError::CheckpointMismatch { ref name, .. } if name == "header"));
        assert!(live.fine.f.is_none());
    }

    #[test]
    fn test_restore_rejects_other_sigma_range() {
        let tmp = tempfile::tempdir().unwrap();
        build().write_checkpoint(tmp.path()).unwrap();
        let ldir = level_dir(tmp.path(), 0);
        let mut sigma: SigmaState = read_bin(&ldir.join("sigma.bin")).unwrap();
        sigma.fine.tables[2].lo -= 1;
        write_bin(&ldir.join("sigma.bin"), &sigma).unwrap();

        let err = build().restore_checkpoint(tmp.path()).unwrap_err();
        assert!(matches!(err, PicError::CheckpointMismatch { ref name, .. } if name == "fp_sigma"));
    }
}
