//! pic-fields: run the field core on a vacuum pulse

use anyhow::{Context, Result};
use clap::Parser;
use pic_fields::evolve::courant_dt;
use pic_fields::{FieldEvolver, PatchType, PmlConfig, SimulationConfig};
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pic-fields")]
#[command(about = "Advance electromagnetic fields on a block-structured mesh")]
#[command(version)]
struct Args {
    /// JSON simulation config; a 2D box with an absorbing layer when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of time steps
    #[arg(short, long, default_value = "200")]
    steps: usize,

    /// Log field energy every N steps
    #[arg(long, default_value = "20")]
    report_every: usize,

    /// Gaussian pulse width in cells
    #[arg(long, default_value = "4")]
    pulse_width: f64,

    /// Write the absorbing layer here after the last step
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Restore the absorbing layer from this directory before stepping
    #[arg(long)]
    restart_from: Option<PathBuf>,
}

fn default_config() -> SimulationConfig {
    let mut config = SimulationConfig {
        dims: pic_fields::Dimensionality::TwoD,
        pml: Some(PmlConfig::default()),
        ..SimulationConfig::default()
    };
    config.domain.n_cell = [64, 1, 64];
    config.domain.max_grid_size = 32;
    config
}

/// Ey pulse centered in the level-0 domain
fn seed_pulse(ev: &mut FieldEvolver, width: f64) -> Result<()> {
    let fields = ev
        .patch_mut(0, PatchType::Fine)?
        .context("Level 0 has no fine patch")?;
    let domain = fields.geom.domain;
    let active = fields.geom.dims.active();
    let center = [0, 1, 2].map(|d| 0.5 * (domain.lo[d] + domain.hi[d] + 1) as f64);

    let ey = &mut fields.e[1];
    for blk in 0..ey.nblocks() {
        let tile = ey.valid_box(blk);
        let fab = ey.block_mut(blk);
        tile.for_each(|i, j, k| {
            let r2: f64 = [i, j, k]
                .iter()
                .enumerate()
                .filter(|&(d, _)| active[d])
                .map(|(d, &n)| ((n as f64 - center[d]) / width).powi(2))
                .sum();
            fab.set(i, j, k, 0, (-r2).exp());
        });
    }
    ev.fill_boundary_e_all()?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            SimulationConfig::from_json(&json).context("Invalid config")?
        }
        None => default_config(),
    };

    let dt = courant_dt(&config);
    let mut ev = FieldEvolver::new(config).context("Failed to build field evolver")?;
    info!(levels = ev.nlevels(), dt, "Field evolver ready");

    if let Some(dir) = &args.restart_from {
        let restored = ev
            .restore_pml_checkpoint(dir)
            .with_context(|| format!("Failed to restore PML from {:?}", dir))?;
        info!(restored, "Restart");
    }

    seed_pulse(&mut ev, args.pulse_width)?;
    let start = ev.field_energy(0, PatchType::Fine)?;
    info!(energy = start, "Initial field energy");

    for step in 1..=args.steps {
        ev.one_step(dt)?;
        if args.report_every > 0 && step % args.report_every == 0 {
            info!(
                step,
                energy = ev.field_energy(0, PatchType::Fine)?,
                pml_energy = ev.pml_energy(0, PatchType::Fine)?,
                max_div_b = ev.max_div_b(0, PatchType::Fine)?,
                "Step"
            );
        }
    }

    let end = ev.field_energy(0, PatchType::Fine)?;
    info!(energy = end, ratio = end / start, "Final field energy");

    if let Some(costs) = ev.costs() {
        for lev in 0..ev.nlevels() {
            info!(lev, costs = ?costs.costs(lev), "Block costs");
        }
    }

    if let Some(dir) = &args.checkpoint_dir {
        ev.write_pml_checkpoint(dir)
            .with_context(|| format!("Failed to write PML checkpoint to {:?}", dir))?;
    }

    Ok(())
}
