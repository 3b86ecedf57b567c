//! Independent checks over generated traces.
//!
//! [`replay`] re-runs a structured [`proptrace_engine::Trace`] from its
//! initial state, re-validating every record and checking the active
//! invariants over the whole state after each step. [`read_trace_file`]
//! parses the rendered text format back into labelled blocks.

pub mod errors;
pub mod replay;
pub mod trace_file;

pub use errors::ReplayError;
pub use replay::{replay, ReplayReport, Violation, ViolationKind};
pub use trace_file::{read_trace_file, read_trace_path, ParsedBlock, ParsedRecord, TraceFileError};
