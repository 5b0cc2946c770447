//! Which sheet rows a scan pass visits.

#![allow(clippy::must_use_candidate)]

use jobtrack_core::{ApplicationId, AtsPlatform, JobApplication};
use serde::{Deserialize, Serialize};

/// Which applications a pass visits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationFilter {
    /// Every row
    All,
    /// Rows without a terminal status yet
    #[default]
    Unresolved,
    /// Rows recorded under one platform, unless already terminal
    Platform(AtsPlatform),
    /// Exactly these rows, whatever their status
    Specific(Vec<ApplicationId>),
}

impl ApplicationFilter {
    pub fn matches(&self, application: &JobApplication) -> bool {
        match self {
            ApplicationFilter::All => true,
            ApplicationFilter::Unresolved => !application.current_status.is_terminal(),
            ApplicationFilter::Platform(platform) => {
                application.platform == *platform && !application.current_status.is_terminal()
            }
            ApplicationFilter::Specific(ids) => ids.contains(&application.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobtrack_core::CanonicalStatus;

    fn app(id: &str, platform: AtsPlatform, status: CanonicalStatus) -> JobApplication {
        let mut app = JobApplication::new(
            ApplicationId::new(id).expect("valid test id"),
            format!("https://example.com/{id}"),
            "Acme",
        );
        app.platform = platform;
        app.current_status = status;
        app
    }

    #[test]
    fn test_filter_all() {
        let closed = app("a", AtsPlatform::Lever, CanonicalStatus::Closed);
        assert!(ApplicationFilter::All.matches(&closed));
    }

    #[test]
    fn test_filter_unresolved_skips_terminal() {
        let filter = ApplicationFilter::Unresolved;
        assert!(filter.matches(&app("a", AtsPlatform::Lever, CanonicalStatus::UnderReview)));
        assert!(filter.matches(&app("b", AtsPlatform::Lever, CanonicalStatus::Unknown)));
        assert!(!filter.matches(&app("c", AtsPlatform::Lever, CanonicalStatus::Rejected)));
        assert!(!filter.matches(&app("d", AtsPlatform::Lever, CanonicalStatus::Filled)));
    }

    #[test]
    fn test_filter_platform() {
        let filter = ApplicationFilter::Platform(AtsPlatform::Workday);
        assert!(filter.matches(&app("a", AtsPlatform::Workday, CanonicalStatus::Open)));
        assert!(!filter.matches(&app("b", AtsPlatform::Taleo, CanonicalStatus::Open)));
        assert!(!filter.matches(&app("c", AtsPlatform::Workday, CanonicalStatus::Expired)));
    }

    #[test]
    fn test_filter_specific_ignores_status() {
        let filter = ApplicationFilter::Specific(vec![ApplicationId::new("b").unwrap()]);
        assert!(!filter.matches(&app("a", AtsPlatform::Lever, CanonicalStatus::Open)));
        assert!(filter.matches(&app("b", AtsPlatform::Lever, CanonicalStatus::Closed)));
    }

    #[test]
    fn test_filter_specific_empty() {
        let filter = ApplicationFilter::Specific(vec![]);
        assert!(!filter.matches(&app("a", AtsPlatform::Lever, CanonicalStatus::Open)));
    }
}
