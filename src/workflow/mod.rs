//! Command handlers and the resumable enrichment loop.
//!
//! Handlers own file I/O and config resolution; the orchestrator only sees
//! trait objects so it can be driven by fakes in tests.
mod collection;
mod enrich;
mod orchestrator;
mod remote;

pub use collection::{run_export, run_merge, run_query};
pub use enrich::run_enrich;
pub use remote::{run_fetch, run_push};
