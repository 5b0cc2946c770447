//! Jobtrack Scanner - scan passes over the application sheet.
//!
//! A pass loads every application, drives the selected ones through the scan
//! state machine and writes the classified status back to the sheet:
//!
//! ```text
//! Pending -> PlatformDetected -> [CredentialReady] -> PageFetched
//!         -> Classified -> Reconciled | Failed
//! ```
//!
//! Failures stay local to their application. Writes the sheet keeps
//! rejecting are journaled and replayed on the next pass. Cancellation
//! defers unfinished applications without touching rows already reconciled.
//!
//! # Example
//!
//! ```ignore
//! use jobtrack_scanner::ScanOrchestrator;
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = ScanOrchestrator::new(session, sheet, resolver)
//!     .with_config(&config.scanning)
//!     .with_candidates(candidates);
//! let report = orchestrator.run_pass(CancellationToken::new()).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod filter;
#[allow(missing_docs)]
pub mod journal;
#[allow(missing_docs)]
pub mod login;
#[allow(missing_docs)]
pub mod orchestrator;
#[allow(missing_docs)]
pub mod report;
pub mod retry;
#[allow(missing_docs)]
pub mod state;

// Re-export commonly used types
pub use error::{Result, ScanError};
pub use filter::ApplicationFilter;
pub use journal::{JsonFileJournal, MemoryJournal, PendingWrite, WriteJournal};
pub use login::SessionLogin;
pub use orchestrator::{lane_key, ScanOrchestrator};
pub use report::{ApplicationOutcome, ApplicationReport, ScanReport};
pub use retry::RetryPolicy;
pub use state::{FailureReason, InvalidTransition, ScanState};
