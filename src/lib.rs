pub mod control;
pub mod error;
pub mod namelist;
pub mod profile;

pub use control::*;
pub use error::*;
pub use namelist::*;
pub use profile::*;
