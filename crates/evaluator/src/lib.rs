//! Drishti Evaluator - immutable first-match policy table
//!
//! Built once from the flattened policies, sorted by ascending priority, and
//! shared read-only across all workers for the lifetime of a run.

pub mod evaluator;
pub mod precheck;

pub use evaluator::{Evaluator, Verdict};
pub use precheck::{Coverage, PrecheckOutcome, PrecheckReason, PrecheckVerdict};
