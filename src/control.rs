//! One-shot checks run between namelist load and the engine's main loop.
//!
//! The sequence is fixed: reserved-name guard, directory validation,
//! cross-reference and schema checks, profile normalization. Each check is
//! fail-fast; nothing here is retried. After [`check`] returns, the namelist
//! is handed to the engine wholesale and never mutated again, and
//! [`keep_interpreter_resident`] tells the engine whether the expression
//! interpreter may be torn down before time stepping starts.

use regex::Regex;

use crate::{
    error::NamelistError,
    namelist::Namelist,
    profile::{SpaceProfile, TimeProfile},
};

/// The component vocabulary plus the two profile constructors. User bindings
/// in `[constants]` and `[functions]` may not take any of these names.
pub const RESERVED_NAMES: &[&str] = &[
    "Main",
    "Species",
    "Laser",
    "Collisions",
    "Antenna",
    "ExtField",
    "DumpRestart",
    "LoadBalancing",
    "MovingWindow",
    "DiagProbe",
    "DiagParticles",
    "DiagScalar",
    "DiagFields",
    "constant",
    "tconstant",
];

/// Run every load-time check and normalize all profiles, in the fixed order.
/// `rank` gates filesystem creation: only rank 0 creates the output
/// directory.
pub fn check(namelist: &mut Namelist, rank: u32) -> Result<(), NamelistError> {
    guard_reserved_names(namelist)?;
    check_directories(namelist, rank)?;
    check_references(namelist)?;
    check_schema(namelist)?;
    normalize_profiles(namelist);
    Ok(())
}

/// Verify that no user binding shadows the reserved vocabulary and that every
/// binding is a plain identifier. The comparison is case-insensitive so that
/// e.g. `main` cannot shadow `Main`.
fn guard_reserved_names(namelist: &Namelist) -> Result<(), NamelistError> {
    // NOTE: this compiles the regex internally, which is fine for a
    // run-once check.
    let identifier = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();

    let user_names = namelist.constants.keys().chain(namelist.functions.keys());
    for name in user_names {
        for reserved in RESERVED_NAMES {
            if name.eq_ignore_ascii_case(reserved) {
                return Err(NamelistError::ReservedName {
                    name: name.clone(),
                });
            }
        }
        if !identifier.is_match(name) {
            return Err(NamelistError::InvalidIdentifier {
                name: name.clone(),
            });
        }
    }
    Ok(())
}

/// Ensure the output directory exists (creating it if missing, rank 0 only)
/// and that any restart directory already exists.
fn check_directories(namelist: &Namelist, rank: u32) -> Result<(), NamelistError> {
    if rank == 0 {
        if let Some(output_dir) = &namelist.main.output_dir {
            if !output_dir.exists() {
                std::fs::create_dir_all(output_dir).map_err(|_| {
                    NamelistError::OutputDirCreate {
                        path: output_dir.display().to_string(),
                    }
                })?;
            } else if !output_dir.is_dir() {
                return Err(NamelistError::OutputDirNotDir {
                    path: output_dir.display().to_string(),
                });
            }
        }
    }

    if let Some(restart_dir) = namelist
        .dump_restart
        .as_ref()
        .and_then(|d| d.restart_dir.as_ref())
    {
        if !restart_dir.is_dir() {
            return Err(NamelistError::RestartDirMissing {
                path: restart_dir.display().to_string(),
            });
        }
    }
    Ok(())
}

/// Every species name used by collisions or particle diagnostics must be
/// declared, and every function profile must refer to an entry of
/// `[functions]`.
fn check_references(namelist: &Namelist) -> Result<(), NamelistError> {
    for (i, c) in namelist.collisions.iter().enumerate() {
        for name in c.species1.iter().chain(c.species2.iter()) {
            if !namelist.has_species(name) {
                return Err(NamelistError::UnknownSpecies {
                    name: name.clone(),
                    referrer: format!("collisions #{i}"),
                });
            }
        }
    }
    for (i, d) in namelist.diag_particles.iter().enumerate() {
        for name in &d.species {
            if !namelist.has_species(name) {
                return Err(NamelistError::UnknownSpecies {
                    name: name.clone(),
                    referrer: format!("diag_particles #{i}"),
                });
            }
        }
    }

    let mut function_names: Vec<&str> = Vec::new();
    collect_function_names(namelist, &mut function_names);
    for name in function_names {
        if !namelist.functions.contains_key(name) {
            return Err(NamelistError::UnknownFunction {
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Gather the name of every function profile in the namelist
fn collect_function_names<'a>(namelist: &'a Namelist, out: &mut Vec<&'a str>) {
    fn space<'a>(p: &'a SpaceProfile, out: &mut Vec<&'a str>) {
        if let SpaceProfile::Function(f) = p {
            out.push(&f.function);
        }
    }
    fn time<'a>(p: &'a TimeProfile, out: &mut Vec<&'a str>) {
        if let TimeProfile::Function(f) = p {
            out.push(&f.function);
        }
    }

    for s in &namelist.species {
        space(&s.n_part_per_cell, out);
        space(&s.charge, out);
        if let Some(d) = &s.nb_density {
            space(d, out);
        }
        if let Some(d) = &s.charge_density {
            space(d, out);
        }
        for p in s.mean_velocity.iter().chain(s.temperature.iter()) {
            space(p, out);
        }
    }
    for e in &namelist.ext_field {
        space(&e.profile, out);
    }
    for a in &namelist.antenna {
        space(&a.space_profile, out);
        time(&a.time_profile, out);
    }
    for l in &namelist.laser {
        time(&l.chirp_profile, out);
        time(&l.time_envelope, out);
        for p in l.space_envelope.iter().chain(l.phase.iter()) {
            space(p, out);
        }
    }
}

/// Structural sanity that does not depend on the engine: axis counts match
/// the geometry, densities are unambiguous, histogram axes are well formed.
fn check_schema(namelist: &Namelist) -> Result<(), NamelistError> {
    let dims = namelist.main.geometry.dims();
    for (field, len) in [
        ("cell_length", namelist.main.cell_length.len()),
        ("sim_length", namelist.main.sim_length.len()),
    ] {
        if len != dims {
            return Err(NamelistError::DimensionMismatch {
                geometry: namelist.main.geometry.as_str().to_string(),
                field: field.to_string(),
                expected: dims,
                got: len,
            });
        }
    }

    for s in &namelist.species {
        if s.nb_density.is_some() == s.charge_density.is_some() {
            return Err(NamelistError::AmbiguousDensity {
                name: s.species_type.clone(),
            });
        }
    }

    for d in &namelist.diag_particles {
        for axis in &d.axes {
            if axis.min >= axis.max || axis.bins == 0 {
                return Err(NamelistError::DegenerateAxis {
                    kind: axis.kind.clone(),
                    min: axis.min,
                    max: axis.max,
                });
            }
        }
    }
    Ok(())
}

/// Coerce every numeric literal on a space- or time-varying field into the
/// matching constant shape. Values that are already profiles pass through; a
/// failed coercion is the signal that no coercion was needed, not an error.
fn normalize_profiles(namelist: &mut Namelist) {
    fn space(p: &mut SpaceProfile) {
        *p = p.clone().normalized();
    }
    fn time(p: &mut TimeProfile) {
        *p = p.clone().normalized();
    }

    for s in &mut namelist.species {
        space(&mut s.n_part_per_cell);
        space(&mut s.charge);
        if let Some(d) = &mut s.nb_density {
            space(d);
        }
        if let Some(d) = &mut s.charge_density {
            space(d);
        }
        s.mean_velocity.iter_mut().for_each(space);
        s.temperature.iter_mut().for_each(space);
    }
    for e in &mut namelist.ext_field {
        space(&mut e.profile);
    }
    for a in &mut namelist.antenna {
        space(&mut a.space_profile);
        time(&mut a.time_profile);
    }
    for l in &mut namelist.laser {
        time(&mut l.chirp_profile);
        time(&mut l.time_envelope);
        l.space_envelope.iter_mut().for_each(space);
        l.phase.iter_mut().for_each(space);
    }
}

/// Decide, once per run, whether the engine must keep its expression
/// interpreter resident during the time-stepping loop.
///
/// Laser envelopes/chirps and antenna time profiles may always vary during
/// the loop. Species profiles are only re-sampled when a moving window or
/// load balancing is enabled, so they only count then; this feature coupling
/// is the engine's contract and is preserved as-is. The answer is `true` iff
/// any such profile needs the interpreter, i.e. is a user function with no
/// predefined-shape marker.
pub fn keep_interpreter_resident(namelist: &Namelist) -> bool {
    let laser_time = namelist
        .laser
        .iter()
        .flat_map(|l| [&l.time_envelope, &l.chirp_profile])
        .chain(namelist.antenna.iter().map(|a| &a.time_profile));
    if laser_time.into_iter().any(TimeProfile::needs_interpreter) {
        return true;
    }

    if namelist.moving_window.is_some() || namelist.load_balancing.is_some() {
        for s in &namelist.species {
            let profiles = [Some(&s.n_part_per_cell), Some(&s.charge)]
                .into_iter()
                .chain([s.nb_density.as_ref(), s.charge_density.as_ref()])
                .flatten()
                .chain(s.mean_velocity.iter())
                .chain(s.temperature.iter());
            if profiles.into_iter().any(SpaceProfile::needs_interpreter) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
fn minimal_namelist() -> Namelist {
    toml::from_str(
        r#"
        [main]
        geometry = "1d3v"
        timestep = 0.1
        sim_time = 10.0
        cell_length = [0.5]
        sim_length = [50.0]
    "#,
    )
    .unwrap()
}

#[test]
fn test_reserved_name_is_fatal_and_named() {
    let mut namelist = minimal_namelist();
    namelist.constants.insert("Species".to_string(), 1.0);

    let err = check(&mut namelist, 0).unwrap_err();
    match err {
        NamelistError::ReservedName { name } => assert_eq!(name, "Species"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_reserved_name_guard_is_case_insensitive() {
    let mut namelist = minimal_namelist();
    namelist
        .functions
        .insert("tconstant".to_string(), "2.0 * t".to_string());
    assert!(matches!(
        check(&mut namelist, 0),
        Err(NamelistError::ReservedName { .. })
    ));

    let mut namelist = minimal_namelist();
    namelist.constants.insert("MAIN".to_string(), 0.0);
    assert!(matches!(
        check(&mut namelist, 0),
        Err(NamelistError::ReservedName { .. })
    ));
}

#[test]
fn test_non_identifier_binding_rejected() {
    let mut namelist = minimal_namelist();
    namelist.constants.insert("2fast".to_string(), 1.0);
    assert!(matches!(
        check(&mut namelist, 0),
        Err(NamelistError::InvalidIdentifier { .. })
    ));
}

#[test]
fn test_ordinary_bindings_pass() {
    let mut namelist = minimal_namelist();
    namelist.constants.insert("Te_keV".to_string(), 1.0);
    namelist
        .functions
        .insert("my_density".to_string(), "exp(-x)".to_string());
    // the function is unreferenced, so no cross-reference error either
    check(&mut namelist, 0).unwrap();
}

#[test]
fn test_unknown_species_reference_is_fatal() {
    let src = r#"
        [main]
        geometry = "1d3v"
        timestep = 0.1
        sim_time = 10.0
        cell_length = [0.5]
        sim_length = [50.0]

        [[diag_particles]]
        output = "density"
        every = 10
        species = ["ghost"]
        axes = [{ kind = "x", min = 0.0, max = 50.0, bins = 10 }]
    "#;
    let mut namelist: Namelist = toml::from_str(src).unwrap();
    match check(&mut namelist, 0).unwrap_err() {
        NamelistError::UnknownSpecies { name, .. } => assert_eq!(name, "ghost"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unknown_function_reference_is_fatal() {
    let src = r#"
        [main]
        geometry = "1d3v"
        timestep = 0.1
        sim_time = 10.0
        cell_length = [0.5]
        sim_length = [50.0]

        [[antenna]]
        field = "Jz"
        space_profile = { function = "missing" }
        time_profile = 1.0
    "#;
    let mut namelist: Namelist = toml::from_str(src).unwrap();
    match check(&mut namelist, 0).unwrap_err() {
        NamelistError::UnknownFunction { name } => assert_eq!(name, "missing"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_dimension_mismatch_is_fatal() {
    let src = r#"
        [main]
        geometry = "2d3v"
        timestep = 0.1
        sim_time = 10.0
        cell_length = [0.5]
        sim_length = [50.0, 50.0]
    "#;
    let mut namelist: Namelist = toml::from_str(src).unwrap();
    match check(&mut namelist, 0).unwrap_err() {
        NamelistError::DimensionMismatch { field, expected, got, .. } => {
            assert_eq!(field, "cell_length");
            assert_eq!(expected, 2);
            assert_eq!(got, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_normalization_leaves_no_scalars() {
    use crate::profile::SpaceShape;

    let src = r#"
        [main]
        geometry = "1d3v"
        timestep = 0.1
        sim_time = 10.0
        cell_length = [0.5]
        sim_length = [50.0]

        [[species]]
        species_type = "eon"
        n_part_per_cell = 100.0
        mass = 1.0
        charge = -1.0
        nb_density = 10.0
        mean_velocity = [0.05, 0.0, 0.0]
        temperature = [2e-5]

        [[ext_field]]
        field = ["Bz"]
        profile = 0.1
    "#;
    let mut namelist: Namelist = toml::from_str(src).unwrap();
    check(&mut namelist, 0).unwrap();

    let eon = &namelist.species[0];
    assert_eq!(
        eon.nb_density,
        Some(SpaceProfile::Shape(SpaceShape::Constant { value: 10.0 }))
    );
    assert_eq!(eon.charge.at(12.3), Some(-1.0));
    assert!(!eon.n_part_per_cell.is_scalar());
    assert!(eon.mean_velocity.iter().all(|p| !p.is_scalar()));
    assert!(eon.temperature.iter().all(|p| !p.is_scalar()));
    assert_eq!(namelist.ext_field[0].profile.at(1.0), Some(0.1));
    assert!(!namelist.ext_field[0].profile.is_scalar());
}

#[test]
fn test_residency_false_for_static_run() {
    let src = r#"
        [main]
        geometry = "1d3v"
        timestep = 0.1
        sim_time = 10.0
        cell_length = [0.5]
        sim_length = [50.0]

        [[species]]
        species_type = "eon"
        n_part_per_cell = 100.0
        mass = 1.0
        charge = -1.0
        nb_density = 1.0
    "#;
    let mut namelist: Namelist = toml::from_str(src).unwrap();
    check(&mut namelist, 0).unwrap();
    assert!(!keep_interpreter_resident(&namelist));
}

#[test]
fn test_residency_true_for_callable_laser_envelope() {
    let src = r#"
        [main]
        geometry = "1d3v"
        timestep = 0.1
        sim_time = 10.0
        cell_length = [0.5]
        sim_length = [50.0]

        [[laser]]
        a0 = 2.0
        time_envelope = { function = "ramp" }

        [functions]
        ramp = "t / 10.0"
    "#;
    let mut namelist: Namelist = toml::from_str(src).unwrap();
    check(&mut namelist, 0).unwrap();
    assert!(keep_interpreter_resident(&namelist));
}

#[test]
fn test_residency_ignores_predefined_marker() {
    let src = r#"
        [main]
        geometry = "1d3v"
        timestep = 0.1
        sim_time = 10.0
        cell_length = [0.5]
        sim_length = [50.0]

        [[laser]]
        time_envelope = { function = "env", predefined = "tgaussian" }

        [functions]
        env = "tgaussian(duration=10.0)"
    "#;
    let mut namelist: Namelist = toml::from_str(src).unwrap();
    check(&mut namelist, 0).unwrap();
    assert!(!keep_interpreter_resident(&namelist));
}

#[test]
fn test_species_profiles_only_count_with_moving_window_or_balancing() {
    let base = r#"
        [main]
        geometry = "1d3v"
        timestep = 0.1
        sim_time = 10.0
        cell_length = [0.5]
        sim_length = [50.0]

        [[species]]
        species_type = "eon"
        n_part_per_cell = 100.0
        mass = 1.0
        charge = -1.0
        nb_density = { function = "wedge" }

        [functions]
        wedge = "exp(-x / 5.0)"
    "#;

    // Static run: the callable density is sampled once at init
    let mut namelist: Namelist = toml::from_str(base).unwrap();
    check(&mut namelist, 0).unwrap();
    assert!(!keep_interpreter_resident(&namelist));

    // A moving window re-samples it during the loop
    let with_window = format!("{base}\n[moving_window]\nvelocity_x = 1.0\n");
    let mut namelist: Namelist = toml::from_str(&with_window).unwrap();
    check(&mut namelist, 0).unwrap();
    assert!(keep_interpreter_resident(&namelist));

    // So does load balancing
    let with_balancing = format!("{base}\n[load_balancing]\nevery = 20\n");
    let mut namelist: Namelist = toml::from_str(&with_balancing).unwrap();
    check(&mut namelist, 0).unwrap();
    assert!(keep_interpreter_resident(&namelist));
}
