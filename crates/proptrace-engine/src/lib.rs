//! Property-guided trace generation.
//!
//! Given the operations a contract exposes and the rules its properties
//! activate, [`TraceGenerator`] produces a bounded, block-segmented
//! sequence of state-valid operation records. Every record is validated
//! against a [`proptrace_model::ContractState`] immediately before it is
//! applied, so replaying a trace from its initial state never re-derives a
//! violation.

pub mod config;
pub mod errors;
pub mod format;
pub mod generator;
pub mod patterns;
pub mod synth;
pub mod trace;

pub use config::GeneratorConfig;
pub use errors::GenerateError;
pub use format::{format_record, RecordSchema};
pub use generator::TraceGenerator;
pub use patterns::{ArgTemplate, BusinessPattern, PatternLibrary, PatternStep};
pub use synth::{random_param, synthesize};
pub use trace::{write_trace, GenerationStats, Trace, TraceBlock, TraceRecord};
