//! Column types and conversion of wire values into typed values.

pub mod datetime;
mod mapping;

pub use mapping::{AthenaType, Coercer, MissingValuePolicy, Value};
