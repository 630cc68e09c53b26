//! Regeneration of derived rows after fact changes.
//!
//! The `Orchestrator` is the only component with side effects on derived
//! rows: it loads facts, runs the pure engines, and swaps the results in
//! atomically per entity.

pub mod fingerprint;
pub mod locks;
pub mod orchestrator;

pub use orchestrator::{
    BatchReport, EntityOutcome, FactSaveReport, OrchestrationError, Orchestrator,
    RegenerationFailure, RegenerationScope,
};
