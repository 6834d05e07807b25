use std::fmt;
use std::time::Duration;

use crate::batch::OutcomeRecord;
use crate::executor::OutcomeStatus;

/// Batch execution summary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub updated: usize,
    pub unchanged: usize,
    pub not_found: usize,
    pub unresolved: usize,
    pub canceled: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn from_records(records: &[OutcomeRecord]) -> Self {
        let mut report = BatchReport::default();
        for record in records {
            match record.status {
                OutcomeStatus::Updated => report.updated += 1,
                OutcomeStatus::Unchanged => report.unchanged += 1,
                OutcomeStatus::NotFound => report.not_found += 1,
                OutcomeStatus::ApiVersionUnresolved => report.unresolved += 1,
                OutcomeStatus::Canceled => report.canceled += 1,
                OutcomeStatus::Failed(_) => report.failed += 1,
            }
        }
        report
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Number of resources whose tags were changed.
    pub fn successful_updates(&self) -> usize {
        self.updated
    }

    pub fn total(&self) -> usize {
        self.updated + self.unchanged + self.not_found + self.unresolved + self.canceled + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Batch complete! Resources: {} updated, {} unchanged, {} not found",
            self.updated, self.unchanged, self.not_found
        )?;
        if self.unresolved > 0 {
            write!(f, ", {} without API version", self.unresolved)?;
        }
        if self.canceled > 0 {
            write!(f, ", {} canceled", self.canceled)?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        write!(f, ". Total time: {}.", format_elapsed(self.elapsed.as_secs()))
    }
}

fn format_elapsed(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}m{}s", secs / 60, secs % 60)
    }
}
