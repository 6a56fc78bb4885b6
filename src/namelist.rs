use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    error::NamelistError,
    profile::{SpaceProfile, TimeProfile},
};

/// Global run parameters. Exactly one `[main]` block per namelist.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Main {
    /// Simulation geometry, fixes the number of spatial axes
    pub geometry: Geometry,
    /// Order of the field interpolation/projection stencils
    #[serde(default = "default_interpolation_order")]
    pub interpolation_order: u32,
    /// Timestep in code units
    pub timestep: f64,
    /// Total simulated time
    pub sim_time: f64,
    /// Cell size per axis
    pub cell_length: Vec<f64>,
    /// Box length per axis
    pub sim_length: Vec<f64>,
    /// Domain decomposition per axis (consumed by the engine)
    #[serde(default)]
    pub number_of_patches: Vec<u32>,
    /// EM boundary conditions on the x edges, e.g. "silver-muller", "periodic"
    #[serde(default)]
    pub bc_em_type_x: Vec<String>,
    #[serde(default)]
    pub bc_em_type_y: Vec<String>,
    /// Time during which the fields are not updated
    #[serde(default)]
    pub time_fields_frozen: f64,
    /// Conversion factor to SI, needed by ionization and collisions
    #[serde(default)]
    pub reference_angular_frequency_si: f64,
    /// Timesteps between screen reports
    pub print_every: Option<u64>,
    pub random_seed: Option<u64>,
    /// Where the engine writes its outputs; created on the coordinating rank
    pub output_dir: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Geometry {
    #[serde(rename = "1d3v")]
    OneD3V,
    #[serde(rename = "2d3v")]
    TwoD3V,
}

impl Geometry {
    /// Number of spatial axes
    pub fn dims(&self) -> usize {
        match self {
            Geometry::OneD3V => 1,
            Geometry::TwoD3V => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Geometry::OneD3V => "1d3v",
            Geometry::TwoD3V => "2d3v",
        }
    }
}

/// One particle population. Profiles on this record accept bare numbers in
/// the namelist; the control phase turns them into constant shapes.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Species {
    /// Name used by collisions and diagnostics to refer to this population
    pub species_type: String,
    #[serde(default)]
    pub init_position: PositionInit,
    #[serde(default)]
    pub init_momentum: MomentumInit,
    pub n_part_per_cell: SpaceProfile,
    /// Safety factor used when sizing particle buffers
    #[serde(default = "default_c_part_max")]
    pub c_part_max: f64,
    /// Mass in units of the electron mass
    pub mass: f64,
    /// Charge in units of the positron charge
    pub charge: SpaceProfile,
    /// Number density; exactly one of this and `charge_density`
    #[serde(alias = "density")]
    pub nb_density: Option<SpaceProfile>,
    pub charge_density: Option<SpaceProfile>,
    /// Drift velocity per component, in units of c
    #[serde(default)]
    pub mean_velocity: Vec<SpaceProfile>,
    /// Temperature per component, in units of m_e c^2
    #[serde(default)]
    pub temperature: Vec<SpaceProfile>,
    /// Temperature seen by thermalizing boundaries
    #[serde(default)]
    pub thermal_boundary_temperature: Vec<f64>,
    #[serde(default)]
    pub thermal_boundary_velocity: Vec<f64>,
    #[serde(default)]
    pub dynamics_type: DynamicsType,
    /// Time during which this species is not pushed
    #[serde(default)]
    pub time_frozen: f64,
    pub bc_part_type_west: Option<ParticleBc>,
    pub bc_part_type_east: Option<ParticleBc>,
    pub bc_part_type_south: Option<ParticleBc>,
    pub bc_part_type_north: Option<ParticleBc>,
    #[serde(default)]
    pub ionization_model: IonizationModel,
    /// Required by the ionization and collisional-ionization models
    pub atomic_number: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PositionInit {
    #[default]
    Regular,
    Random,
    Centered,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MomentumInit {
    #[default]
    Cold,
    #[serde(rename = "maxwell-juettner", alias = "mj")]
    MaxwellJuettner,
    Rectangular,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DynamicsType {
    #[default]
    Norm,
    Radiating,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParticleBc {
    None,
    Refl,
    Supp,
    Stop,
    Thermalize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IonizationModel {
    #[default]
    None,
    Tunnel,
}

/// Binary collision (and optional collisional-ionization) pairing between
/// two groups of species
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Collisions {
    pub species1: Vec<String>,
    pub species2: Vec<String>,
    /// 0 means the engine computes the Coulomb logarithm itself
    #[serde(default)]
    pub coulomb_log: f64,
    #[serde(default)]
    pub debug_every: u64,
    #[serde(default)]
    pub ionizing: bool,
}

/// A laser injected from one side of the box
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Laser {
    #[serde(default)]
    pub boxside: Boxside,
    #[serde(default = "default_unit")]
    pub a0: f64,
    #[serde(default = "default_unit")]
    pub omega: f64,
    #[serde(default)]
    pub delay: f64,
    pub time_envelope: TimeProfile,
    #[serde(default = "default_chirp")]
    pub chirp_profile: TimeProfile,
    /// One profile per transverse field component
    #[serde(default)]
    pub space_envelope: Vec<SpaceProfile>,
    #[serde(default)]
    pub phase: Vec<SpaceProfile>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Boxside {
    #[default]
    West,
    East,
}

/// An oscillating current source applied to one field
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Antenna {
    pub field: String,
    pub space_profile: SpaceProfile,
    pub time_profile: TimeProfile,
}

/// A static field applied at initialization
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExtField {
    pub field: Vec<String>,
    pub profile: SpaceProfile,
}

/// Checkpointing singleton
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DumpRestart {
    /// Must already exist; the run restarts from its dump files
    pub restart_dir: Option<PathBuf>,
    #[serde(default)]
    pub dump_step: u64,
    #[serde(default)]
    pub dump_minutes: f64,
    #[serde(default = "default_true")]
    pub exit_after_dump: bool,
    #[serde(default = "default_dump_file_sequence")]
    pub dump_file_sequence: u32,
}

/// Dynamic load balancing singleton
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoadBalancing {
    #[serde(default = "default_lb_every")]
    pub every: u64,
    #[serde(default = "default_unit")]
    pub coef_cell: f64,
    #[serde(default = "default_coef_frozen")]
    pub coef_frozen: f64,
}

/// Moving window singleton
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MovingWindow {
    #[serde(default)]
    pub time_start: f64,
    #[serde(default)]
    pub velocity_x: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DiagScalar {
    pub every: u64,
    /// Empty means all scalars
    #[serde(default)]
    pub vars: Vec<String>,
    #[serde(default = "default_precision")]
    pub precision: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DiagFields {
    pub every: u64,
    /// Empty means all fields
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default = "default_time_average")]
    pub time_average: u32,
}

/// Projection of the particle data of one or more species onto an arbitrary
/// histogram grid
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DiagParticles {
    pub output: ParticleOutput,
    pub every: u64,
    #[serde(default = "default_time_average")]
    pub time_average: u32,
    pub species: Vec<String>,
    pub axes: Vec<HistogramAxis>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParticleOutput {
    Density,
    ChargeDensity,
    CurrentDensityX,
    CurrentDensityY,
    CurrentDensityZ,
}

/// One binning axis of a particle diagnostic
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistogramAxis {
    /// What is binned: "x", "px", "ekin", "vx", "gamma", "charge", ...
    pub kind: String,
    pub min: f64,
    pub max: f64,
    pub bins: u32,
    #[serde(default)]
    pub logscale: bool,
    /// Count particles outside [min, max] in the extremal bins
    #[serde(default)]
    pub edge_inclusive: bool,
}

/// Field interpolation on an arbitrary grid of points
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DiagProbe {
    pub every: u64,
    /// Reference point
    pub pos: Vec<f64>,
    pub pos_first: Option<Vec<f64>>,
    pub pos_second: Option<Vec<f64>>,
    /// Grid points per probe dimension
    #[serde(default)]
    pub number: Vec<u32>,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// The full namelist: every declaration of one run, collected under program
/// control. This replaces the original's module-level declaration lists.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Namelist {
    pub main: Main,
    #[serde(default)]
    pub species: Vec<Species>,
    #[serde(default)]
    pub collisions: Vec<Collisions>,
    #[serde(default)]
    pub laser: Vec<Laser>,
    #[serde(default)]
    pub antenna: Vec<Antenna>,
    #[serde(default)]
    pub ext_field: Vec<ExtField>,
    pub dump_restart: Option<DumpRestart>,
    pub load_balancing: Option<LoadBalancing>,
    pub moving_window: Option<MovingWindow>,
    #[serde(default)]
    pub diag_scalar: Vec<DiagScalar>,
    #[serde(default)]
    pub diag_fields: Vec<DiagFields>,
    #[serde(default)]
    pub diag_particles: Vec<DiagParticles>,
    #[serde(default)]
    pub diag_probe: Vec<DiagProbe>,
    /// User-defined named scalars; checked against the reserved vocabulary
    #[serde(default)]
    pub constants: BTreeMap<String, f64>,
    /// User-defined named expressions, referenced by function profiles and
    /// evaluated by the engine's resident interpreter
    #[serde(default)]
    pub functions: BTreeMap<String, String>,
}

impl Namelist {
    /// Whether `name` is declared by a `[[species]]` block
    pub fn has_species(&self, name: &str) -> bool {
        self.species.iter().any(|s| s.species_type == name)
    }
}

/// This function reads a namelist file
pub fn read_toml(path: &str) -> Result<Namelist, NamelistError> {
    // Read namelist file
    let toml_contents: &str =
        &std::fs::read_to_string(path).map_err(|_| NamelistError::ReadError {
            path: path.to_string(),
        })?;

    // Return parsed namelist from str
    toml::from_str(toml_contents).map_err(|e| NamelistError::ParseError {
        msg: format!("{e}"),
    })
}

fn default_interpolation_order() -> u32 {
    2
}

fn default_c_part_max() -> f64 {
    1.0
}

fn default_unit() -> f64 {
    1.0
}

fn default_chirp() -> TimeProfile {
    TimeProfile::Scalar(1.0)
}

fn default_true() -> bool {
    true
}

fn default_dump_file_sequence() -> u32 {
    2
}

fn default_lb_every() -> u64 {
    150
}

fn default_coef_frozen() -> f64 {
    0.1
}

fn default_precision() -> u32 {
    10
}

fn default_time_average() -> u32 {
    1
}

impl Display for Main {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n", "-".repeat(40))?;
        write!(f, "geometry            = {}\n", self.geometry.as_str())?;
        write!(f, "interpolation_order = {}\n", self.interpolation_order)?;
        write!(f, "timestep            = {}\n", self.timestep)?;
        write!(f, "sim_time            = {}\n", self.sim_time)?;
        write!(f, "cell_length         = {:?}\n", self.cell_length)?;
        write!(f, "sim_length          = {:?}\n", self.sim_length)?;
        write!(f, "number_of_patches   = {:?}\n", self.number_of_patches)?;
        write!(f, "time_fields_frozen  = {}\n", self.time_fields_frozen)?;
        write!(f, "random_seed         = {:?}\n", self.random_seed)?;
        write!(
            f,
            "output_dir          = {}\n",
            self.output_dir
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<none>".to_string())
        )?;
        write!(f, "{}\n", "-".repeat(40))?;
        Ok(())
    }
}

#[test]
fn test_parse_minimal_namelist() {
    let src = r#"
        [main]
        geometry = "1d3v"
        timestep = 0.01
        sim_time = 10.0
        cell_length = [0.0105]
        sim_length = [4.42]
        bc_em_type_x = ["silver-muller", "silver-muller"]
        random_seed = 0

        [[species]]
        species_type = "ion"
        init_momentum = "mj"
        n_part_per_cell = 10.0
        mass = 100.0
        charge = 1.0
        nb_density = { shape = "trapezoidal", max = 1.0, xplateau = 0.88 }
        temperature = [1e-6]
        bc_part_type_west = "thermalize"
        bc_part_type_east = "refl"
    "#;
    let namelist: Namelist = toml::from_str(src).unwrap();

    assert_eq!(namelist.main.geometry, Geometry::OneD3V);
    assert_eq!(namelist.main.interpolation_order, 2); // default
    assert_eq!(namelist.species.len(), 1);

    let ion = &namelist.species[0];
    assert_eq!(ion.init_momentum, MomentumInit::MaxwellJuettner);
    assert_eq!(ion.init_position, PositionInit::Regular); // default
    assert_eq!(ion.c_part_max, 1.0); // default
    assert_eq!(ion.charge, SpaceProfile::Scalar(1.0));
    assert_eq!(ion.bc_part_type_east, Some(ParticleBc::Refl));
    assert!(ion.nb_density.is_some());
    assert!(namelist.dump_restart.is_none());
}

#[test]
fn test_density_alias() {
    let src = r#"
        species_type = "eon"
        n_part_per_cell = 100.0
        mass = 1.0
        charge = -1.0
        density = 10.0
    "#;
    let s: Species = toml::from_str(src).unwrap();
    assert_eq!(s.nb_density, Some(SpaceProfile::Scalar(10.0)));
}

#[test]
fn test_parse_diagnostics_and_functions() {
    let src = r#"
        [main]
        geometry = "1d3v"
        timestep = 0.1
        sim_time = 100.0
        cell_length = [0.5]
        sim_length = [50.0]

        [[diag_particles]]
        output = "density"
        every = 50
        species = ["eon"]
        axes = [
            { kind = "x", min = 0.0, max = 50.0, bins = 100 },
            { kind = "ekin", min = 1e-4, max = 1.0, bins = 100, logscale = true, edge_inclusive = true },
        ]

        [functions]
        wedge = "exp(-x / 10.0)"

        [[antenna]]
        field = "Jz"
        space_profile = { function = "wedge" }
        time_profile = 1.0
    "#;
    let namelist: Namelist = toml::from_str(src).unwrap();

    let diag = &namelist.diag_particles[0];
    assert_eq!(diag.output, ParticleOutput::Density);
    assert_eq!(diag.time_average, 1); // default
    assert!(diag.axes[1].logscale);
    assert!(!diag.axes[0].logscale);

    assert!(namelist.antenna[0].space_profile.needs_interpreter());
    assert_eq!(namelist.antenna[0].time_profile, TimeProfile::Scalar(1.0));
    assert!(namelist.functions.contains_key("wedge"));
}
