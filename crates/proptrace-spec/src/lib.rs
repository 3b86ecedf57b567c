//! Input scanning for proptrace.
//!
//! Two lossy, never-failing scanners live here: the signature extractor,
//! which pulls callable operations out of contract source text, and the
//! property parser, which buckets temporal correctness statements into
//! invariants, safety and liveness properties.

pub mod errors;
pub mod property;
pub mod signature;

pub use errors::SpecError;
pub use property::{
    parse_properties, parse_properties_from_path, ConstraintKind, PropertySet, TemporalOp,
};
pub use signature::{extract_operations, extract_operations_from_path, Operation};
