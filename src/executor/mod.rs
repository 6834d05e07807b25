pub mod cancel;
pub mod driver;
pub mod operation;
pub mod orchestrator;
pub mod rollback;

pub use cancel::CancelFlag;
pub use driver::{
    DriverOptions, FailurePolicy, OutcomeStatus, ReconcileDriver, ReconcileOutcome,
    RollbackOutcome,
};
pub use operation::{Operation, OperationKind, OperationStatus};
pub use orchestrator::{OperationOutcome, UpdateOrchestrator, DEFAULT_POLL_INTERVAL};
pub use rollback::{RollbackManager, RollbackSnapshot};
