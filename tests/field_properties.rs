//! End-to-end checks of the field evolution driver.

use approx::assert_relative_eq;
use pic_fields::evolve::courant_dt;
use pic_fields::{
    Dimensionality, DomainConfig, FieldEvolver, FieldKind, PatchType, PmlConfig, SimulationConfig,
};

fn config_1d(n: i32, pml: Option<PmlConfig>, periodic: bool) -> SimulationConfig {
    SimulationConfig {
        dims: Dimensionality::OneD,
        domain: DomainConfig {
            n_cell: [1, 1, n],
            prob_hi: [1.0, 1.0, n as f64 * 1e-3],
            max_grid_size: 32,
            periodic: [false, false, periodic],
            ..DomainConfig::default()
        },
        pml,
        ..SimulationConfig::default()
    }
}

/// Gaussian in component `comp` of E, over every active axis
fn seed(ev: &mut FieldEvolver, comp: usize, center: [f64; 3], width: f64) {
    let fields = ev.patch_mut(0, PatchType::Fine).unwrap().unwrap();
    let active = fields.geom.dims.active();
    let mf = &mut fields.e[comp];
    for blk in 0..mf.nblocks() {
        let tile = mf.valid_box(blk);
        let fab = mf.block_mut(blk);
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
    ev.fill_boundary_e_all().unwrap();
}

#[test]
fn test_yee_energy_bounded_2d_periodic() {
    let config = SimulationConfig {
        dims: Dimensionality::TwoD,
        domain: DomainConfig {
            n_cell: [32, 1, 32],
            max_grid_size: 16,
            periodic: [true, false, true],
            ..DomainConfig::default()
        },
        cfl: 0.99,
        ..SimulationConfig::default()
    };
    let dt = courant_dt(&config);
    let mut ev = FieldEvolver::new(config).unwrap();
    seed(&mut ev, 1, [16.0, 0.0, 16.0], 4.0);

    let start = ev.field_energy(0, PatchType::Fine).unwrap();
    let mut min = start;
    let mut max = start;
    for _ in 0..400 {
        ev.one_step(dt).unwrap();
        let energy = ev.field_energy(0, PatchType::Fine).unwrap();
        min = min.min(energy);
        max = max.max(energy);
    }
    assert!(max < 1.1 * start, "energy grew to {max} from {start}");
    assert!(min > 0.9 * start, "energy fell to {min} from {start}");
    assert!(ev.max_div_b(0, PatchType::Fine).unwrap() < 1e-6);
}

#[test]
fn test_pml_is_transparent_against_larger_domain() {
    let pml = PmlConfig {
        ncell: 12,
        delta: 12,
        lo: [false, false, true],
        hi: [false, false, true],
    };
    let small = config_1d(64, Some(pml), false);
    let large = config_1d(256, None, false);
    let dt = courant_dt(&small);
    assert_relative_eq!(dt, courant_dt(&large));

    let mut absorbed = FieldEvolver::new(small).unwrap();
    let mut reference = FieldEvolver::new(large).unwrap();
    seed(&mut absorbed, 0, [0.0, 0.0, 32.0], 4.0);
    seed(&mut reference, 0, [0.0, 0.0, 128.0], 4.0);

    // Both halves end up inside the layer; the reference edges stay out of reach
    for _ in 0..45 {
        absorbed.one_step(dt).unwrap();
        reference.one_step(dt).unwrap();
    }

    let mut worst = 0.0_f64;
    for k in 0..=64 {
        let a = absorbed.probe(0, FieldKind::Ex, 0, 0, k).unwrap().unwrap();
        let r = reference.probe(0, FieldKind::Ex, 0, 0, k + 96).unwrap().unwrap();
        worst = worst.max((a - r).abs());
    }
    assert!(worst < 2e-2, "largest deviation {worst}");
}

#[test]
fn test_pml_checkpoint_restores_layer_state() {
    let config = SimulationConfig {
        dims: Dimensionality::TwoD,
        domain: DomainConfig {
            n_cell: [24, 1, 24],
            max_grid_size: 12,
            ..DomainConfig::default()
        },
        divergence_cleaning: true,
        pml: Some(PmlConfig {
            ncell: 6,
            delta: 6,
            ..PmlConfig::default()
        }),
        ..SimulationConfig::default()
    };
    let dt = courant_dt(&config);
    let mut ev = FieldEvolver::new(config.clone()).unwrap();
    seed(&mut ev, 1, [12.0, 0.0, 12.0], 2.0);
    for _ in 0..15 {
        ev.one_step(dt).unwrap();
    }
    let layer_energy = ev.pml_energy(0, PatchType::Fine).unwrap();
    assert!(layer_energy > 0.0);

    let tmp = tempfile::tempdir().unwrap();
    ev.write_pml_checkpoint(tmp.path()).unwrap();

    let mut restarted = FieldEvolver::new(config).unwrap();
    assert_eq!(restarted.pml_energy(0, PatchType::Fine).unwrap(), 0.0);
    assert!(restarted.restore_pml_checkpoint(tmp.path()).unwrap());
    assert_relative_eq!(
        restarted.pml_energy(0, PatchType::Fine).unwrap(),
        layer_energy,
        max_relative = 1e-14
    );

    // With the regular fields carried over, both runs continue identically
    let regular = ev.patch(0, PatchType::Fine).unwrap().unwrap().clone();
    *restarted.patch_mut(0, PatchType::Fine).unwrap().unwrap() = regular;
    for _ in 0..3 {
        ev.one_step(dt).unwrap();
        restarted.one_step(dt).unwrap();
    }
    let layer = |ev: &FieldEvolver| {
        ev.level(0)
            .unwrap()
            .pml
            .as_ref()
            .unwrap()
            .patch(PatchType::Fine)
            .unwrap()
            .clone()
    };
    let (a, b) = (layer(&ev), layer(&restarted));
    for d in 0..3 {
        assert_eq!(a.e[d], b.e[d], "E part {d}");
        assert_eq!(a.b[d], b.b[d], "B part {d}");
    }
    assert_eq!(a.f, b.f);
    let (fa, fb) = (
        ev.patch(0, PatchType::Fine).unwrap().unwrap(),
        restarted.patch(0, PatchType::Fine).unwrap().unwrap(),
    );
    for d in 0..3 {
        assert_eq!(fa.e[d], fb.e[d]);
        assert_eq!(fa.b[d], fb.b[d]);
    }

    // Nothing under an empty directory
    let empty = tempfile::tempdir().unwrap();
    assert!(!restarted.restore_pml_checkpoint(empty.path()).unwrap());
}

#[test]
fn test_refined_level_steps_with_layer() {
    let mut config = config_1d(64, None, false);
    config.pml = Some(PmlConfig {
        ncell: 4,
        delta: 4,
        lo: [false, false, true],
        hi: [false, false, true],
    });
    config.domain.refined_regions = vec![pic_fields::IndexBox::new([0, 0, 16], [0, 0, 47])];
    let dt = courant_dt(&config);
    let mut ev = FieldEvolver::new(config).unwrap();
    assert_eq!(ev.nlevels(), 2);

    let level = ev.level(1).unwrap();
    let pml = level.pml.as_ref().unwrap();
    // A refined patch away from the domain edges gets a layer on both sides
    assert_eq!(pml.sides(), ([false, false, true], [false, false, true]));
    assert!(pml.patch(PatchType::Coarse).is_some());

    seed(&mut ev, 0, [0.0, 0.0, 32.0], 4.0);
    for _ in 0..10 {
        ev.one_step(dt).unwrap();
    }
    let energy = ev.field_energy(0, PatchType::Fine).unwrap();
    assert!(energy.is_finite() && energy > 0.0);
}
