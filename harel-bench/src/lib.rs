//! Performance benchmarks for harel
//!
//! Criterion.rs benchmarks over representative machine shapes: flat,
//! deeply nested and parallel. The fixtures build the definitions and
//! registries the bench targets share.

pub mod fixtures;
