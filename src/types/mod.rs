//! # types
//!
//! `types` is the module containing all the public structs of the matrix model

pub mod attributes;
pub mod ecu;
pub mod errors;
pub mod frame;
pub mod matrix;
pub mod signal;
