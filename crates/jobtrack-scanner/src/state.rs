//! Per-application scan state machine.
//!
//! ```text
//! Pending → PlatformDetected → [CredentialReady] → PageFetched → Classified → Reconciled
//!                    └──────────────┴────────────────────────────────┴──────→ Failed
//! ```
//!
//! `Reconciled` and `Failed` are absorbing. A non-terminal state may fall
//! back to `Pending` when a pass is cancelled.

use jobtrack_classifier::Classification;
use jobtrack_core::{AtsPlatform, CanonicalStatus, CredentialRef, TenantId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why an application ended a pass without being reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// No candidate credential logged into the tenant
    AuthExhausted { tenant: TenantId },
    /// A login is required but no username is configured
    MissingUsername,
    /// Page load kept timing out
    FetchTimeout,
    /// Page load kept hitting an anti-bot wall
    FetchBlocked { reason: String },
    /// The portal answered with an unusable HTTP status
    HttpStatus { status: u16 },
    /// The page could not be opened at all
    Navigation { message: String },
    /// The sheet rejected every write attempt; the result is journaled
    WriteFailure { message: String },
    /// The state machine was driven out of order
    Internal { message: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthExhausted { tenant } => write!(f, "no credential logs into tenant {tenant}"),
            Self::MissingUsername => f.write_str("no login username configured"),
            Self::FetchTimeout => f.write_str("page fetch timed out"),
            Self::FetchBlocked { reason } => write!(f, "blocked: {reason}"),
            Self::HttpStatus { status } => write!(f, "HTTP {status}"),
            Self::Navigation { message } => write!(f, "navigation failed: {message}"),
            Self::WriteFailure { message } => write!(f, "sheet write failed: {message}"),
            Self::Internal { message } => write!(f, "internal error: {message}"),
        }
    }
}

/// Where one application is in its pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Pending,
    PlatformDetected(AtsPlatform),
    CredentialReady(CredentialRef),
    PageFetched,
    Classified(Classification),
    Reconciled(CanonicalStatus),
    Failed(FailureReason),
}

/// Attempted a transition the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal scan transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: &'static str,
    pub to: &'static str,
}

impl ScanState {
    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PlatformDetected(_) => "platform_detected",
            Self::CredentialReady(_) => "credential_ready",
            Self::PageFetched => "page_fetched",
            Self::Classified(_) => "classified",
            Self::Reconciled(_) => "reconciled",
            Self::Failed(_) => "failed",
        }
    }

    /// `Reconciled` or `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Reconciled(_) | Self::Failed(_))
    }

    /// Whether `self → next` is an edge of the machine.
    #[must_use]
    pub fn can_transition(&self, next: &ScanState) -> bool {
        use ScanState::{
            Classified, CredentialReady, Failed, PageFetched, Pending, PlatformDetected,
            Reconciled,
        };

        match (self, next) {
            (Reconciled(_) | Failed(_), _) => false,
            (_, Pending) => true,
            (Pending, PlatformDetected(_))
            | (PlatformDetected(_), CredentialReady(_) | PageFetched | Failed(_))
            | (CredentialReady(_), PageFetched | Failed(_))
            | (PageFetched, Classified(_))
            | (Classified(_), Reconciled(_) | Failed(_)) => true,
            _ => false,
        }
    }

    /// Move to `next`, rejecting edges the machine does not have.
    pub fn transition(self, next: ScanState) -> Result<ScanState, InvalidTransition> {
        if self.can_transition(&next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self.name(),
                to: next.name(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(states: Vec<ScanState>) -> Result<ScanState, InvalidTransition> {
        states
            .into_iter()
            .try_fold(ScanState::Pending, ScanState::transition)
    }

    #[test]
    fn test_gated_happy_path() {
        let end = walk(vec![
            ScanState::PlatformDetected(AtsPlatform::Workday),
            ScanState::CredentialReady(CredentialRef::new("WORKDAY_PASSWORD_1").unwrap()),
            ScanState::PageFetched,
            ScanState::Classified(Classification::UNKNOWN),
            ScanState::Reconciled(CanonicalStatus::Unknown),
        ])
        .unwrap();
        assert!(end.is_terminal());
    }

    #[test]
    fn test_ungated_path_skips_credentials() {
        assert!(walk(vec![
            ScanState::PlatformDetected(AtsPlatform::Lever),
            ScanState::PageFetched,
            ScanState::Classified(Classification::UNKNOWN),
            ScanState::Reconciled(CanonicalStatus::Open),
        ])
        .is_ok());
    }

    #[test]
    fn test_classification_cannot_fail() {
        let err = walk(vec![
            ScanState::PlatformDetected(AtsPlatform::Lever),
            ScanState::PageFetched,
            ScanState::Failed(FailureReason::FetchTimeout),
        ])
        .unwrap_err();
        assert_eq!(err.from, "page_fetched");
        assert_eq!(err.to, "failed");
    }

    #[test]
    fn test_cannot_skip_fetch() {
        assert!(walk(vec![
            ScanState::PlatformDetected(AtsPlatform::Generic),
            ScanState::Classified(Classification::UNKNOWN),
        ])
        .is_err());
    }

    #[test]
    fn test_terminal_states_absorb() {
        let failed = ScanState::Failed(FailureReason::FetchTimeout);
        assert!(!failed.can_transition(&ScanState::Pending));
        let reconciled = ScanState::Reconciled(CanonicalStatus::Closed);
        assert!(!reconciled.can_transition(&ScanState::Failed(FailureReason::FetchTimeout)));
    }

    #[test]
    fn test_in_flight_can_return_to_pending() {
        assert!(ScanState::PageFetched.can_transition(&ScanState::Pending));
        assert!(ScanState::Classified(Classification::UNKNOWN).can_transition(&ScanState::Pending));
    }

    #[test]
    fn test_failure_reason_serializes_tagged() {
        let json = serde_json::to_string(&FailureReason::HttpStatus { status: 401 }).unwrap();
        assert_eq!(json, r#"{"kind":"http_status","status":401}"#);
    }
}
