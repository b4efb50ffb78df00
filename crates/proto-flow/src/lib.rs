//! Hand-authored equivalents of the catalog-task message types of Flow's
//! `flow.proto` and `ops.proto`. Upstream these are produced by
//! `prost-build`/`pbjson-build`; this crate carries the same field shapes
//! and camelCase JSON naming by hand since no `.proto` IDL ships in this
//! tree.

pub mod connector;
pub mod flow;
pub mod ops;
