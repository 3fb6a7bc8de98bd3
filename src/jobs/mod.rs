//! Batch jobs over the ledger and the pinning service
//!
//! - [`SettlementJob`]: claim unprocessed payments, pin, extend lifespans
//! - [`ReclamationJob`]: unpin and delete objects past their retention
//! - [`Scheduler`]: drive both on independent cadences
//!
//! Both jobs receive their ledger and pinning service as injected
//! dependencies, so either side can be replaced by a test double.

pub mod error;
pub mod reclamation;
pub mod scheduler;
pub mod settlement;

pub use error::{ExtensionError, JobError};
pub use reclamation::{ReclamationJob, ReclamationReport};
pub use scheduler::Scheduler;
pub use settlement::{
    DEFAULT_BATCH_TIMEOUT, DEFAULT_RETRY_CEILING, SettlementJob, SettlementReport, extension_for,
    requested_size_gb,
};
