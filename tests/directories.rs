//! Filesystem side of the control phase: output directory creation on the
//! coordinating rank and restart directory existence.

use pic_namelist::control;
use pic_namelist::error::NamelistError;
use pic_namelist::namelist::Namelist;

fn namelist_with(extra: &str) -> Namelist {
    let src = format!(
        r#"
        [main]
        geometry = "1d3v"
        timestep = 0.1
        sim_time = 10.0
        cell_length = [0.5]
        sim_length = [50.0]
        {extra}
    "#
    );
    toml::from_str(&src).unwrap()
}

#[test]
fn output_dir_is_created_when_missing() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("results").join("run_001");

    let mut namelist = namelist_with("");
    namelist.main.output_dir = Some(out.clone());

    control::check(&mut namelist, 0).unwrap();
    assert!(out.is_dir());

    // idempotent on re-run
    control::check(&mut namelist, 0).unwrap();
    assert!(out.is_dir());
}

#[test]
fn output_dir_that_is_a_file_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("results");
    std::fs::write(&out, b"not a directory").unwrap();

    let mut namelist = namelist_with("");
    namelist.main.output_dir = Some(out);

    assert!(matches!(
        control::check(&mut namelist, 0),
        Err(NamelistError::OutputDirNotDir { .. })
    ));
}

#[test]
fn only_rank_zero_creates_the_output_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("results");

    let mut namelist = namelist_with("");
    namelist.main.output_dir = Some(out.clone());

    control::check(&mut namelist, 3).unwrap();
    assert!(!out.exists());
}

#[test]
fn missing_restart_dir_is_fatal() {
    let mut namelist = namelist_with(
        r#"
        [dump_restart]
        restart_dir = "/definitely/not/here"
        dump_step = 100
    "#,
    );
    match control::check(&mut namelist, 0) {
        Err(NamelistError::RestartDirMissing { path }) => {
            assert_eq!(path, "/definitely/not/here");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn existing_restart_dir_passes_on_every_rank() {
    let tmp = tempfile::tempdir().unwrap();
    let restart = tmp.path().join("dumps");
    std::fs::create_dir(&restart).unwrap();

    let mut namelist = namelist_with("");
    namelist.dump_restart = Some(pic_namelist::namelist::DumpRestart {
        restart_dir: Some(restart),
        dump_step: 0,
        dump_minutes: 0.0,
        exit_after_dump: true,
        dump_file_sequence: 2,
    });

    control::check(&mut namelist, 0).unwrap();
    control::check(&mut namelist, 1).unwrap();
}
