//! URL → ATS platform detection.
//!
//! Detection is an ordered table scan over the parsed URL; the first matching
//! entry wins. Host entries come before query entries because vendors embed
//! their boards on employer domains, and redirect parameters on a known ATS
//! host must not reroute the page to another vendor.

use jobtrack_core::{AtsPlatform, TenantId};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

#[derive(Debug, Clone, Copy)]
enum UrlPart {
    /// Registered domain or any subdomain of it
    Host,
    /// Raw query string, lower-cased
    Query,
}

#[derive(Debug, Clone, Copy)]
struct PlatformPattern {
    part: UrlPart,
    needle: &'static str,
    platform: AtsPlatform,
}

const DETECTION_TABLE: &[PlatformPattern] = &[
    PlatformPattern {
        part: UrlPart::Host,
        needle: "linkedin.com",
        platform: AtsPlatform::LinkedIn,
    },
    PlatformPattern {
        part: UrlPart::Host,
        needle: "myworkdayjobs.com",
        platform: AtsPlatform::Workday,
    },
    PlatformPattern {
        part: UrlPart::Host,
        needle: "myworkday.com",
        platform: AtsPlatform::Workday,
    },
    PlatformPattern {
        part: UrlPart::Host,
        needle: "greenhouse.io",
        platform: AtsPlatform::Greenhouse,
    },
    PlatformPattern {
        part: UrlPart::Host,
        needle: "lever.co",
        platform: AtsPlatform::Lever,
    },
    PlatformPattern {
        part: UrlPart::Host,
        needle: "smartrecruiters.com",
        platform: AtsPlatform::SmartRecruiters,
    },
    PlatformPattern {
        part: UrlPart::Host,
        needle: "taleo.net",
        platform: AtsPlatform::Taleo,
    },
    PlatformPattern {
        part: UrlPart::Query,
        needle: "gh_jid=",
        platform: AtsPlatform::Greenhouse,
    },
];

/// Classify a job URL into its ATS platform.
///
/// Total: malformed URLs and the empty string map to `Generic`. URLs without a
/// scheme are read as `https://`.
#[must_use]
pub fn detect(url: &str) -> AtsPlatform {
    let Some(parsed) = parse_lenient(url) else {
        return AtsPlatform::Generic;
    };

    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    let query = parsed.query().unwrap_or_default().to_ascii_lowercase();

    DETECTION_TABLE
        .iter()
        .find(|pattern| match pattern.part {
            UrlPart::Host => host_matches(&host, pattern.needle),
            UrlPart::Query => query.contains(pattern.needle),
        })
        .map_or(AtsPlatform::Generic, |pattern| pattern.platform)
}

/// Extract the Workday tenant from a posting or login URL.
///
/// Recognizes `https://<tenant>.wd<N>.myworkdayjobs.com/...`,
/// `https://<tenant>.myworkday.com/...` and `https://wd<N>.myworkday.com/<tenant>/...`.
#[must_use]
pub fn workday_tenant(url: &str) -> Option<TenantId> {
    static JOBS_HOST: OnceLock<Regex> = OnceLock::new();
    static CORE_HOST: OnceLock<Regex> = OnceLock::new();
    static SHARED_HOST: OnceLock<Regex> = OnceLock::new();

    let jobs_host = JOBS_HOST.get_or_init(|| {
        Regex::new(r"^([a-z0-9-]+)\.wd\d+\.myworkdayjobs\.com$").expect("valid regex")
    });
    let core_host = CORE_HOST
        .get_or_init(|| Regex::new(r"^([a-z0-9-]+)\.myworkday\.com$").expect("valid regex"));
    let shared_host =
        SHARED_HOST.get_or_init(|| Regex::new(r"^wd\d+$").expect("valid regex"));

    let parsed = parse_lenient(url)?;
    let host = parsed.host_str()?.to_ascii_lowercase();

    let label = if let Some(caps) = jobs_host.captures(&host) {
        caps.get(1)?.as_str().to_string()
    } else if let Some(caps) = core_host.captures(&host) {
        let label = caps.get(1)?.as_str();
        if shared_host.is_match(label) {
            parsed.path_segments()?.find(|segment| !segment.is_empty())?.to_string()
        } else {
            label.to_string()
        }
    } else {
        return None;
    };

    TenantId::new(label).ok()
}

/// Login page for a Workday tenant.
#[must_use]
pub fn workday_login_url(tenant: &TenantId) -> String {
    format!("https://{tenant}.myworkday.com/{tenant}/login.htm")
}

fn parse_lenient(url: &str) -> Option<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    match Url::parse(trimmed) {
        Ok(parsed) if parsed.host_str().is_some() => Some(parsed),
        Ok(_) => None,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{trimmed}")).ok()
        }
        Err(_) => None,
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
