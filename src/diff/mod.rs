//! # diff
//!
//! Structural comparison of two [`Matrix`](crate::Matrix) instances.
//!
//! [`compare`] builds a [`ResultNode`] tree: every compared entity and field becomes a node
//! classified as `Equal`, `Added`, `Deleted` or `Changed`, leaves carry the old/new
//! literal values, and a post-order pass marks every ancestor of a difference as
//! `Changed`, so checking the root is enough to know whether anything differs.
//!
//! ## Module Structure
//!
//! - `compare`: recursive comparators (matrix, frame, signal, group, ECU, maps)
//! - `result`: the result tree and its traversal helpers
//! - `ignore`: per-call [`IgnoreFilter`]

mod compare;
mod ignore;
mod result;

pub use compare::{
    compare, compare_attributes, compare_define_list, compare_ecu, compare_frame,
    compare_signal, compare_signal_group, compare_value_table,
};
pub use ignore::{IgnoreCategory, IgnoreFilter, IgnoreRule};
pub use result::{Category, Change, DiffResult, EntityRef, Field, Iter, ResultNode, Value};
