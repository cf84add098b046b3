//! Run outputs: the decision report and redirect stubs for moved pages.

pub mod report;
pub mod stubs;

pub use report::{
    Metrics, MoveRecord, REPORT_SCHEMA_VERSION, Report, ReportEntry, ReportInputs, ReportMeta,
    RunnerUp, compute_moves,
};
pub use stubs::{StubSummary, render_stub, write_stubs};
