pub mod formatter;
pub mod report;

pub use report::BatchReport;
