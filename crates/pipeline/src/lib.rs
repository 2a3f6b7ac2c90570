//! Drishti Pipeline - producer, worker pool, and result sinks
//!
//! One producer enumerates the src x dst x port cross product, a fixed pool
//! of workers evaluates tasks against the shared read-only policy table, and
//! a single writer drains results into the two CSV sinks while publishing
//! progress through an atomic counter.

pub mod estimator;
pub mod pipeline;
pub mod producer;
pub mod progress;
pub mod worker;
pub mod writer;

pub use estimator::{axis_host_count, check_task_budget, estimate_tasks};
pub use pipeline::{run_pipeline, PipelineConfig};
pub use producer::Producer;
pub use writer::ResultWriter;
