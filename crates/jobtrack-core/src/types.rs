//! Shared types used across jobtrack.
//!
//! This module defines the newtypes and enums that every subsystem speaks:
//! application and tenant identifiers, opaque credential references, the ATS
//! platform enum and the canonical status model with its precedence order.

use crate::error::JobtrackError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Stable identifier of one application record (a spreadsheet row key).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(String);

impl ApplicationId {
    /// Create a new `ApplicationId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is empty or longer than 128 characters.
    pub fn new(id: impl Into<String>) -> Result<Self, JobtrackError> {
        let id = id.into().trim().to_string();
        if id.is_empty() || id.len() > 128 {
            return Err(JobtrackError::Validation(format!(
                "invalid application ID: must be 1-128 characters, got {} characters",
                id.len()
            )));
        }
        Ok(Self(id))
    }

    /// Create a new random `ApplicationId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one employer tenant inside a multi-tenant ATS.
///
/// Tenant IDs are DNS labels (they come from the tenant's subdomain), so they
/// are normalized to lowercase and must be 1-63 alphanumeric characters or
/// hyphens, not starting or ending with a hyphen.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    /// Create a new `TenantId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is not a valid DNS label.
    pub fn new(id: impl Into<String>) -> Result<Self, JobtrackError> {
        let id = id.into().to_ascii_lowercase();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), JobtrackError> {
        static TENANT_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = TENANT_REGEX.get_or_init(|| {
            Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$").expect("valid regex")
        });

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(JobtrackError::Validation(format!(
                "invalid tenant ID: must be a lowercase DNS label, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a login secret.
///
/// The reference names where the secret lives (for example the environment
/// variable `WORKDAY_PASSWORD_2`); it is safe to log and persist. The secret
/// value itself never appears in this type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CredentialRef(String);

impl CredentialRef {
    /// Create a new `CredentialRef`.
    ///
    /// # Errors
    /// Returns error unless the reference is 1-128 characters of
    /// `[A-Za-z0-9_.:-]`.
    pub fn new(reference: impl Into<String>) -> Result<Self, JobtrackError> {
        let reference = reference.into();
        Self::validate(&reference)?;
        Ok(Self(reference))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(reference: &str) -> Result<(), JobtrackError> {
        static REF_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex =
            REF_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.:-]{1,128}$").expect("valid regex"));

        if regex.is_match(reference) {
            Ok(())
        } else {
            Err(JobtrackError::Validation(format!(
                "invalid credential reference '{reference}'"
            )))
        }
    }
}

impl fmt::Display for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Applicant Tracking System hosting a job posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtsPlatform {
    /// Workday (multi-tenant, `*.myworkdayjobs.com`)
    Workday,
    /// Greenhouse (`boards.greenhouse.io` or embedded boards)
    Greenhouse,
    /// Lever (`jobs.lever.co`)
    Lever,
    /// `SmartRecruiters`
    SmartRecruiters,
    /// Oracle Taleo
    Taleo,
    /// `LinkedIn` job pages and application badges
    LinkedIn,
    /// Anything else
    Generic,
}

impl AtsPlatform {
    /// Every platform, in detection-table order.
    pub const ALL: [AtsPlatform; 7] = [
        Self::LinkedIn,
        Self::Workday,
        Self::Greenhouse,
        Self::Lever,
        Self::SmartRecruiters,
        Self::Taleo,
        Self::Generic,
    ];

    /// Whether pages on this platform are gated behind a per-tenant login.
    #[must_use]
    pub fn requires_tenant_login(&self) -> bool {
        matches!(self, Self::Workday)
    }

    /// Stable machine name, as stored in the sheet's Platform column.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workday => "workday",
            Self::Greenhouse => "greenhouse",
            Self::Lever => "lever",
            Self::SmartRecruiters => "smartrecruiters",
            Self::Taleo => "taleo",
            Self::LinkedIn => "linkedin",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for AtsPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AtsPlatform {
    type Err = JobtrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        Self::ALL
            .into_iter()
            .find(|platform| platform.as_str() == normalized)
            .ok_or_else(|| JobtrackError::Validation(format!("unknown ATS platform '{s}'")))
    }
}

/// Normalized, platform-independent application state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalStatus {
    /// Posting is live and accepting applications
    Open,
    /// Application received and being processed
    UnderReview,
    /// Applicant was turned down
    Rejected,
    /// Employer closed the role
    Closed,
    /// Posting expired or disappeared
    Expired,
    /// Role was filled
    Filled,
    /// No signal matched
    Unknown,
}

/// Coarse grouping of statuses used to judge classification confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFamily {
    /// Role-level terminal outcomes: closed, filled, expired
    PostingEnded,
    /// Applicant-specific terminal outcome
    ApplicantRejected,
    /// Application is moving through the pipeline
    InProcess,
    /// Posting is open
    Open,
    /// Nothing known
    Unknown,
}

impl CanonicalStatus {
    /// Every status, lowest precedence first.
    pub const ALL: [CanonicalStatus; 7] = [
        Self::Unknown,
        Self::Open,
        Self::UnderReview,
        Self::Rejected,
        Self::Expired,
        Self::Filled,
        Self::Closed,
    ];

    /// Tie-breaking rank; the higher rank wins when signals disagree.
    ///
    /// Closed > Filled > Expired > Rejected > `UnderReview` > Open > Unknown.
    #[must_use]
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Open => 1,
            Self::UnderReview => 2,
            Self::Rejected => 3,
            Self::Expired => 4,
            Self::Filled => 5,
            Self::Closed => 6,
        }
    }

    /// Family this status belongs to.
    #[must_use]
    pub fn family(&self) -> StatusFamily {
        match self {
            Self::Closed | Self::Filled | Self::Expired => StatusFamily::PostingEnded,
            Self::Rejected => StatusFamily::ApplicantRejected,
            Self::UnderReview => StatusFamily::InProcess,
            Self::Open => StatusFamily::Open,
            Self::Unknown => StatusFamily::Unknown,
        }
    }

    /// Whether no further change is expected for this application.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.family(),
            StatusFamily::PostingEnded | StatusFamily::ApplicantRejected
        )
    }

    /// Human-readable label, as written to the sheet's Status column.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::UnderReview => "Under Review",
            Self::Rejected => "Rejected",
            Self::Closed => "Closed",
            Self::Expired => "Expired",
            Self::Filled => "Filled",
            Self::Unknown => "Unknown",
        }
    }

    /// Parse a sheet label.
    ///
    /// Accepts the canonical labels, their snake-case forms and the legacy
    /// decision strings such as `JOB CLOSED (Workday)` or
    /// `APPLICATION IN PROCESS (Workday)`. Anything starting with `ERROR`
    /// maps to `Unknown`.
    #[must_use]
    pub fn parse_label(label: &str) -> Option<Self> {
        let lowered = label.trim().to_lowercase();
        let head = lowered
            .split('(')
            .next()
            .unwrap_or_default()
            .replace(['_', '-'], " ");
        let head = head.split_whitespace().collect::<Vec<_>>().join(" ");

        if head.starts_with("error") {
            return Some(Self::Unknown);
        }

        let head = head.strip_prefix("application ").unwrap_or(&head);
        let head = head.strip_prefix("job ").unwrap_or(head);

        match head {
            "open" => Some(Self::Open),
            "under review" | "underreview" | "in process" | "in progress" | "viewed"
            | "submitted" => Some(Self::UnderReview),
            "rejected" => Some(Self::Rejected),
            "closed" => Some(Self::Closed),
            "expired" => Some(Self::Expired),
            "filled" => Some(Self::Filled),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CanonicalStatus {
    type Err = JobtrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_label(s)
            .ok_or_else(|| JobtrackError::Validation(format!("unknown status label '{s}'")))
    }
}

/// How strongly the page signals support a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// No signal matched
    Low,
    /// Conflicting signals resolved by precedence
    Medium,
    /// All matching signals agree
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// One tracked job application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobApplication {
    /// Stable record key
    pub id: ApplicationId,
    /// Posting or application-status URL
    pub url: String,
    /// Employer name
    pub company_name: String,
    /// Last reconciled status
    pub current_status: CanonicalStatus,
    /// Platform recorded for this URL
    pub platform: AtsPlatform,
    /// When the status was last checked
    pub last_checked: Option<Timestamp>,
    /// Fetch attempts spent on this application in the current pass
    pub retry_count: u32,
}

impl JobApplication {
    /// Create a never-checked application.
    #[must_use]
    pub fn new(id: ApplicationId, url: impl Into<String>, company_name: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            company_name: company_name.into(),
            current_status: CanonicalStatus::Unknown,
            platform: AtsPlatform::Generic,
            last_checked: None,
            retry_count: 0,
        }
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from a `DateTime<Utc>`.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parse a timestamp from an RFC3339 string.
    pub fn from_rfc3339(s: &str) -> Result<Self, JobtrackError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| JobtrackError::Validation(format!("invalid timestamp: {e}")))
    }

    /// Format as RFC3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get seconds since Unix epoch.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.0.timestamp()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_id_trims_and_validates() {
        let id = ApplicationId::new("  row-17 ").expect("valid application ID");
        assert_eq!(id.as_str(), "row-17");

        assert!(ApplicationId::new("").is_err());
        assert!(ApplicationId::new("   ").is_err());
        assert!(ApplicationId::new("a".repeat(129)).is_err());
    }

    #[test]
    fn test_application_id_generate() {
        assert_ne!(ApplicationId::generate(), ApplicationId::generate());
    }

    #[test]
    fn test_tenant_id_valid() {
        for id in ["acme", "spectris", "northrop-grumman", "a", "3m"] {
            assert!(TenantId::new(id).is_ok(), "Failed for: {id}");
        }
        assert_eq!(TenantId::new("ACME").expect("valid tenant").as_str(), "acme");
    }

    #[test]
    fn test_tenant_id_invalid() {
        let too_long = "a".repeat(64);
        for id in ["", "-acme", "acme-", "ac me", "ac.me", "ac_me", too_long.as_str()] {
            assert!(TenantId::new(id).is_err(), "Should fail for: {id}");
        }
    }

    #[test]
    fn test_credential_ref() {
        assert!(CredentialRef::new("WORKDAY_PASSWORD_1").is_ok());
        assert!(CredentialRef::new("vault:workday.secondary").is_ok());
        assert!(CredentialRef::new("").is_err());
        assert!(CredentialRef::new("has space").is_err());
    }

    #[test]
    fn test_platform_round_trip_names() {
        for platform in AtsPlatform::ALL {
            let parsed: AtsPlatform = platform.as_str().parse().expect("parse platform");
            assert_eq!(parsed, platform);
        }
        assert_eq!(
            "Smart_Recruiters".parse::<AtsPlatform>().expect("parse"),
            AtsPlatform::SmartRecruiters
        );
        assert!("icims".parse::<AtsPlatform>().is_err());
    }

    #[test]
    fn test_only_workday_is_gated() {
        let gated: Vec<_> = AtsPlatform::ALL
            .into_iter()
            .filter(AtsPlatform::requires_tenant_login)
            .collect();
        assert_eq!(gated, vec![AtsPlatform::Workday]);
    }

    #[test]
    fn test_status_precedence_order() {
        let ranks: Vec<u8> = CanonicalStatus::ALL.iter().map(CanonicalStatus::precedence).collect();
        let mut sorted = ranks.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ranks, sorted, "ALL must be strictly ascending by precedence");

        assert!(CanonicalStatus::Closed.precedence() > CanonicalStatus::Rejected.precedence());
        assert!(CanonicalStatus::Rejected.precedence() > CanonicalStatus::UnderReview.precedence());
        assert!(CanonicalStatus::UnderReview.precedence() > CanonicalStatus::Open.precedence());
        assert!(CanonicalStatus::Open.precedence() > CanonicalStatus::Unknown.precedence());
    }

    #[test]
    fn test_status_families() {
        assert_eq!(CanonicalStatus::Filled.family(), StatusFamily::PostingEnded);
        assert_eq!(CanonicalStatus::Expired.family(), StatusFamily::PostingEnded);
        assert_eq!(CanonicalStatus::Rejected.family(), StatusFamily::ApplicantRejected);
        assert!(CanonicalStatus::Rejected.is_terminal());
        assert!(!CanonicalStatus::UnderReview.is_terminal());
        assert!(!CanonicalStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_status_labels() {
        for status in CanonicalStatus::ALL {
            assert_eq!(CanonicalStatus::parse_label(status.label()), Some(status));
        }
        assert_eq!(
            CanonicalStatus::parse_label("JOB CLOSED (Workday)"),
            Some(CanonicalStatus::Closed)
        );
        assert_eq!(
            CanonicalStatus::parse_label("APPLICATION IN PROCESS (Workday)"),
            Some(CanonicalStatus::UnderReview)
        );
        assert_eq!(
            CanonicalStatus::parse_label("APPLICATION REJECTED (LinkedIn)"),
            Some(CanonicalStatus::Rejected)
        );
        assert_eq!(
            CanonicalStatus::parse_label("ERROR: TimeoutError"),
            Some(CanonicalStatus::Unknown)
        );
        assert_eq!(
            CanonicalStatus::parse_label("under_review"),
            Some(CanonicalStatus::UnderReview)
        );
        assert_eq!(CanonicalStatus::parse_label("ghosted"), None);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&CanonicalStatus::UnderReview).expect("serialize");
        assert_eq!(json, "\"under_review\"");
    }

    #[test]
    fn test_timestamp_rfc3339() {
        let ts = Timestamp::now();
        let parsed = Timestamp::from_rfc3339(&ts.to_rfc3339()).expect("parse RFC3339 timestamp");
        assert_eq!(ts.timestamp(), parsed.timestamp());
        assert!(Timestamp::from_rfc3339("yesterday").is_err());
    }
}
