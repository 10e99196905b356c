//! Command line definitions for the binaries in `src/app`.

pub mod sparksteps;
