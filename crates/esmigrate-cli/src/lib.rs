//! esmigrate command-line support: arguments, run configuration and mapping
//! loading for the `esmigrate` binary.

pub mod args;
pub mod mapping;

pub use args::{Args, RunConfig};
pub use mapping::{load_mappings, MappingError, MappingSource, DEFAULT_MAPPING_FILE};
