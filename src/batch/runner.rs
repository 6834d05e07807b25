use std::sync::Arc;

use tracing::{info, warn};

use super::rows::BatchRow;
use crate::audit::AuditSink;
use crate::executor::{DriverOptions, FailurePolicy, OutcomeStatus, ReconcileDriver};
use crate::output::report::BatchReport;
use crate::provider::ResourceProvider;
use crate::tags::TagDiff;

/// Per-row result of a batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeRecord {
    pub resource_name: String,
    pub status: OutcomeStatus,
    pub diff: TagDiff,
}

/// Applies rows one after another. A failed row is reported and the run
/// moves on; nothing is rolled back.
pub struct BatchRunner {
    driver: ReconcileDriver,
}

impl BatchRunner {
    pub fn new(
        provider: Arc<dyn ResourceProvider>,
        audit: Arc<dyn AuditSink>,
        options: DriverOptions,
    ) -> Self {
        let options = DriverOptions {
            failure_policy: FailurePolicy::ReportOnly,
            ..options
        };
        Self {
            driver: ReconcileDriver::new(provider, audit, options),
        }
    }

    pub fn driver(&self) -> &ReconcileDriver {
        &self.driver
    }

    /// Process every row in order.
    pub async fn run(&self, rows: &[BatchRow]) -> Vec<OutcomeRecord> {
        let mut records = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let record = self.run_row(row).await;
            info!(row = index + 1, resource = %record.resource_name, status = %record.status, "Processed batch row");
            records.push(record);
        }
        records
    }

    /// Run the rows and summarize them.
    pub async fn run_report(&self, rows: &[BatchRow]) -> (Vec<OutcomeRecord>, BatchReport) {
        let records = self.run(rows).await;
        let report = BatchReport::from_records(&records);
        (records, report)
    }

    async fn run_row(&self, row: &BatchRow) -> OutcomeRecord {
        let failed = |message: String| OutcomeRecord {
            resource_name: row.resource_name.clone(),
            status: OutcomeStatus::Failed(message),
            diff: TagDiff::default(),
        };

        let identity = match row.identity() {
            Ok(identity) => identity,
            Err(e) => {
                warn!(resource = %row.resource_name, error = %e, "Skipping invalid batch row");
                return failed(e.to_string());
            }
        };

        let requested = row.requested_tags().to_tag_set();
        match self.driver.reconcile(&identity, &requested).await {
            Ok(outcome) => OutcomeRecord {
                resource_name: identity.resource_name().to_string(),
                status: outcome.status,
                diff: outcome.diff,
            },
            Err(e) => failed(e.to_string()),
        }
    }
}
