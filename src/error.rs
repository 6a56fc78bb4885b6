use thiserror::Error;

#[derive(Debug, Error)]
pub enum NamelistError {
    #[error("Unable to load namelist: {path}")]
    ReadError { path: String },

    #[error("Unable to parse namelist: {msg}")]
    ParseError { msg: String },

    #[error("the name `{name}` is reserved and cannot be redefined")]
    ReservedName { name: String },

    #[error("`{name}` is not a valid identifier")]
    InvalidIdentifier { name: String },

    #[error("output_dir {path} does not exist and cannot be created")]
    OutputDirCreate { path: String },

    #[error("output_dir {path} exists and is not a directory")]
    OutputDirNotDir { path: String },

    #[error("restart_dir `{path}` is not a directory")]
    RestartDirMissing { path: String },

    #[error("unknown species `{name}` referenced by {referrer}")]
    UnknownSpecies { name: String, referrer: String },

    #[error("profile refers to undefined function `{name}`")]
    UnknownFunction { name: String },

    #[error("geometry {geometry} expects {expected} value(s) for {field}, got {got}")]
    DimensionMismatch {
        geometry: String,
        field: String,
        expected: usize,
        got: usize,
    },

    #[error("species `{name}` must declare exactly one of nb_density, charge_density")]
    AmbiguousDensity { name: String },

    #[error("histogram axis `{kind}` is degenerate: min {min} >= max {max} or bins == 0")]
    DegenerateAxis { kind: String, min: f64, max: f64 },
}
