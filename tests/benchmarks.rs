//! Load every shipped benchmark namelist end-to-end through the control
//! phase, on a non-coordinating rank so no directories are touched.

use pic_namelist::control;
use pic_namelist::namelist::read_toml;
use pic_namelist::profile::{SpaceProfile, SpaceShape};

fn benchmark(name: &str) -> String {
    format!("{}/benchmarks/{}", env!("CARGO_MANIFEST_DIR"), name)
}

#[test]
fn thermal_expansion_checks_out() {
    let mut namelist = read_toml(&benchmark("thermal_expansion_1d.toml")).unwrap();
    control::check(&mut namelist, 1).unwrap();

    assert_eq!(namelist.species.len(), 2);
    assert_eq!(namelist.diag_particles.len(), 2);

    // the slab profile survives normalization untouched
    let ion = &namelist.species[0];
    match ion.nb_density.as_ref().unwrap() {
        SpaceProfile::Shape(SpaceShape::Trapezoidal { max, xplateau, .. }) => {
            assert_eq!(*max, 1.0);
            assert!(xplateau.is_some());
        }
        other => panic!("unexpected density profile: {other:?}"),
    }

    // scalar temperature became a constant shape
    assert!(ion.temperature.iter().all(|p| !p.is_scalar()));

    // nothing varies at runtime
    assert!(!control::keep_interpreter_resident(&namelist));
}

#[test]
fn collisional_ionization_checks_out() {
    let mut namelist = read_toml(&benchmark("collisional_ionization_1d.toml")).unwrap();
    control::check(&mut namelist, 1).unwrap();

    assert_eq!(namelist.species.len(), 2);
    assert_eq!(namelist.collisions.len(), 1);
    assert!(namelist.collisions[0].ionizing);
    assert_eq!(namelist.species[1].atomic_number, Some(6));

    // both densities were written as bare numbers in the file
    for s in &namelist.species {
        assert_eq!(
            s.nb_density,
            Some(SpaceProfile::Shape(SpaceShape::Constant { value: 1.0 }))
        );
    }

    assert!(!control::keep_interpreter_resident(&namelist));
}

#[test]
fn particle_diagnostic_checks_out() {
    let mut namelist = read_toml(&benchmark("particle_diagnostic_1d.toml")).unwrap();
    control::check(&mut namelist, 1).unwrap();

    let diag = &namelist.diag_particles[0];
    assert_eq!(diag.time_average, 2);
    assert_eq!(diag.axes.len(), 2);
    assert_eq!(diag.axes[1].kind, "vx");
    assert_eq!(namelist.diag_probe[0].pos, vec![1.0]);
}

#[test]
fn laser_plasma_requires_resident_interpreter() {
    let mut namelist = read_toml(&benchmark("laser_plasma_1d.toml")).unwrap();
    control::check(&mut namelist, 1).unwrap();

    // the envelope is a predefined shape, so the laser alone is not enough
    assert!(!namelist.laser[0].time_envelope.needs_interpreter());

    // but the moving window re-samples the user-function density
    assert!(namelist.moving_window.is_some());
    assert!(control::keep_interpreter_resident(&namelist));
}

#[test]
fn missing_namelist_file_is_a_read_error() {
    let err = read_toml(&benchmark("no_such_run.toml")).unwrap_err();
    assert!(err.to_string().contains("no_such_run.toml"));
}
