//! This crate contains modules for [scmaptool](https://crates.io/crates/scmaptool)
//! that add support for the `.scmap` map container used by Supreme Commander,
//! including the two high-level editing operations the tool is built around:
//! resizing a map and importing one map into another.

pub mod dds;
pub mod ops;
pub mod raster;
pub mod scmap;

// Prelude, for convenience
pub mod prelude;
