//! Rule tables mapping page signals to canonical statuses.
//!
//! Every platform has its own rule list; a shared list applies to all of them.
//! Rules are data: adding a vendor or a new phrase is a table edit, and
//! operators can append rules from a TOML file without touching the code.
//!
//! ```toml
//! [[rule]]
//! platform = "workday"
//! status = "rejected"
//! phrase = "we have decided to move forward with other candidates"
//!
//! [[marker]]
//! platform = "greenhouse"
//! name = "greenhouse.closed-notice"
//! selector = "div.closed-notice"
//! ```

use crate::error::{ClassifierError, Result};
use crate::signal::{markers, normalize_text, StatusSignal};
use jobtrack_core::{AtsPlatform, CanonicalStatus};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// What a rule looks for in a signal set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalPattern {
    /// Case-sensitive substring of a text signal
    Contains(String),
    /// Case-insensitive substring of a text signal (stored lower-cased)
    Phrase(String),
    /// Presence of a named structural marker
    Marker(String),
    /// Exact HTTP status
    HttpStatus(u16),
}

impl SignalPattern {
    /// Case-insensitive phrase pattern.
    #[must_use]
    pub fn phrase(phrase: &str) -> Self {
        Self::Phrase(normalize_text(phrase).to_lowercase())
    }

    /// Case-sensitive substring pattern.
    #[must_use]
    pub fn contains(needle: &str) -> Self {
        Self::Contains(normalize_text(needle))
    }

    /// Marker pattern.
    #[must_use]
    pub fn marker(name: impl Into<String>) -> Self {
        Self::Marker(name.into())
    }

    /// Test the pattern against one prepared signal.
    pub(crate) fn matches(&self, signal: &PreparedSignal<'_>) -> bool {
        match (self, signal) {
            (Self::Contains(needle), PreparedSignal::Text { original, .. }) => {
                original.contains(needle.as_str())
            }
            (Self::Phrase(phrase), PreparedSignal::Text { lowered, .. }) => {
                lowered.contains(phrase.as_str())
            }
            (Self::Marker(name), PreparedSignal::Marker(present)) => name == present,
            (Self::HttpStatus(code), PreparedSignal::HttpStatus(status)) => code == status,
            _ => false,
        }
    }
}

/// Signal with its text lower-cased once, shared by all rule checks.
pub(crate) enum PreparedSignal<'a> {
    Text { original: &'a str, lowered: String },
    Marker(&'a str),
    HttpStatus(u16),
}

impl<'a> From<&'a StatusSignal> for PreparedSignal<'a> {
    fn from(signal: &'a StatusSignal) -> Self {
        match signal {
            StatusSignal::Text(text) => Self::Text {
                original: text,
                lowered: text.to_lowercase(),
            },
            StatusSignal::Marker(name) => Self::Marker(name),
            StatusSignal::HttpStatus(code) => Self::HttpStatus(*code),
        }
    }
}

/// One pattern and the status it implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Pattern to look for
    pub pattern: SignalPattern,
    /// Status implied when the pattern matches
    pub status: CanonicalStatus,
}

impl Rule {
    /// Create a rule.
    #[must_use]
    pub fn new(pattern: SignalPattern, status: CanonicalStatus) -> Self {
        Self { pattern, status }
    }
}

/// A rule scoped to one platform, or to all of them when `platform` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedRule {
    /// Platform the rule applies to
    pub platform: Option<AtsPlatform>,
    /// The rule itself
    pub rule: Rule,
}

/// A named CSS selector that yields a marker signal when it matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerDefinition {
    /// Platform whose pages are checked, or every platform when `None`
    pub platform: Option<AtsPlatform>,
    /// Marker name emitted into the signal set
    pub name: String,
    /// CSS selector
    pub selector: String,
}

/// Complete set of classification rules, per platform plus shared.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    shared: Vec<Rule>,
    platforms: HashMap<AtsPlatform, Vec<Rule>>,
}

impl RuleBook {
    /// Rule book with no rules; every page classifies as `Unknown`.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in rules for every supported platform.
    #[must_use]
    pub fn builtin() -> Self {
        use CanonicalStatus::{Expired, Open, Rejected, UnderReview};

        let mut book = Self::empty();

        for (phrase, status) in SHARED_PHRASES {
            book.add_rule(None, Rule::new(SignalPattern::phrase(phrase), *status));
        }
        for code in [404, 410] {
            book.add_rule(None, Rule::new(SignalPattern::HttpStatus(code), Expired));
        }

        for phrase in WORKDAY_REJECT {
            book.add_rule(
                Some(AtsPlatform::Workday),
                Rule::new(SignalPattern::phrase(phrase), Rejected),
            );
        }
        for phrase in WORKDAY_IN_PROCESS {
            book.add_rule(
                Some(AtsPlatform::Workday),
                Rule::new(SignalPattern::phrase(phrase), UnderReview),
            );
        }

        for phrase in LINKEDIN_REJECT {
            book.add_rule(
                Some(AtsPlatform::LinkedIn),
                Rule::new(SignalPattern::phrase(phrase), Rejected),
            );
        }
        for phrase in LINKEDIN_IN_PROCESS {
            book.add_rule(
                Some(AtsPlatform::LinkedIn),
                Rule::new(SignalPattern::phrase(phrase), UnderReview),
            );
        }
        book.add_rule(
            Some(AtsPlatform::LinkedIn),
            Rule::new(SignalPattern::marker(markers::LINKEDIN_CLOSED_BANNER), Expired),
        );

        book.add_rule(
            Some(AtsPlatform::Greenhouse),
            Rule::new(SignalPattern::phrase("is no longer open"), Expired),
        );
        book.add_rule(
            Some(AtsPlatform::Lever),
            Rule::new(SignalPattern::phrase("couldn't find anything here"), Expired),
        );
        book.add_rule(
            Some(AtsPlatform::Taleo),
            Rule::new(SignalPattern::phrase("job is not available"), Expired),
        );
        book.add_rule(
            Some(AtsPlatform::SmartRecruiters),
            Rule::new(SignalPattern::phrase("job has been closed"), Expired),
        );

        for (platform, marker) in APPLY_MARKERS {
            book.add_rule(
                Some(*platform),
                Rule::new(SignalPattern::marker(*marker), Open),
            );
        }

        book
    }

    /// Append a rule for one platform, or for all platforms when `platform` is `None`.
    pub fn add_rule(&mut self, platform: Option<AtsPlatform>, rule: Rule) {
        match platform {
            Some(platform) => self.platforms.entry(platform).or_default().push(rule),
            None => self.shared.push(rule),
        }
    }

    /// Append every rule of a parsed rule file.
    pub fn extend(&mut self, rules: impl IntoIterator<Item = ScopedRule>) {
        for scoped in rules {
            self.add_rule(scoped.platform, scoped.rule);
        }
    }

    /// Rules consulted for a page on `platform`: its own, then the shared ones.
    pub fn rules_for(&self, platform: AtsPlatform) -> impl Iterator<Item = &Rule> {
        self.platforms
            .get(&platform)
            .into_iter()
            .flatten()
            .chain(self.shared.iter())
    }

    /// Total number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.len() + self.platforms.values().map(Vec::len).sum::<usize>()
    }

    /// Whether the book holds no rule.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Operator-supplied rules and markers loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFile {
    /// Additional classification rules
    pub rules: Vec<ScopedRule>,
    /// Additional structural markers for the extractor
    pub markers: Vec<MarkerDefinition>,
}

#[derive(Debug, Deserialize)]
struct RawRuleFile {
    #[serde(default)]
    rule: Vec<RawRule>,
    #[serde(default)]
    marker: Vec<RawMarker>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    platform: Option<AtsPlatform>,
    status: CanonicalStatus,
    phrase: Option<String>,
    contains: Option<String>,
    marker: Option<String>,
    http_status: Option<u16>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMarker {
    platform: Option<AtsPlatform>,
    name: String,
    selector: String,
}

impl RuleFile {
    /// Load a rule file from disk.
    ///
    /// # Errors
    /// Returns error if the file can't be read, isn't valid TOML, or holds an
    /// invalid rule.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let file = Self::parse(&contents, &path.display().to_string())?;

        debug!(
            path = %path.display(),
            rules = file.rules.len(),
            markers = file.markers.len(),
            "loaded classification rules"
        );

        Ok(file)
    }

    /// Parse rule-file contents; `origin` names the source in error messages.
    ///
    /// # Errors
    /// Returns error if the TOML is malformed or a rule is invalid.
    pub fn parse(contents: &str, origin: &str) -> Result<Self> {
        let raw: RawRuleFile =
            toml::from_str(contents).map_err(|source| ClassifierError::ParseError {
                path: origin.to_string(),
                source,
            })?;

        let rules = raw
            .rule
            .into_iter()
            .enumerate()
            .map(|(index, rule)| rule.into_scoped(index))
            .collect::<Result<Vec<_>>>()?;

        let markers = raw
            .marker
            .into_iter()
            .enumerate()
            .map(|(index, marker)| {
                if marker.name.trim().is_empty() || marker.selector.trim().is_empty() {
                    return Err(ClassifierError::InvalidRule {
                        index,
                        reason: "marker needs a name and a selector".to_string(),
                    });
                }
                Ok(MarkerDefinition {
                    platform: marker.platform,
                    name: marker.name,
                    selector: marker.selector,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules, markers })
    }
}

impl RawRule {
    fn into_scoped(self, index: usize) -> Result<ScopedRule> {
        let invalid = |reason: &str| ClassifierError::InvalidRule {
            index,
            reason: reason.to_string(),
        };

        let mut patterns = Vec::new();
        if let Some(phrase) = self.phrase {
            patterns.push(SignalPattern::phrase(&phrase));
        }
        if let Some(needle) = self.contains {
            patterns.push(SignalPattern::contains(&needle));
        }
        if let Some(name) = self.marker {
            patterns.push(SignalPattern::marker(name));
        }
        if let Some(code) = self.http_status {
            patterns.push(SignalPattern::HttpStatus(code));
        }

        if patterns.len() != 1 {
            return Err(invalid(
                "exactly one of phrase, contains, marker or http_status is required",
            ));
        }
        let pattern = patterns.remove(0);

        let empty = match &pattern {
            SignalPattern::Phrase(text)
            | SignalPattern::Contains(text)
            | SignalPattern::Marker(text) => text.trim().is_empty(),
            SignalPattern::HttpStatus(code) => !(100..=599).contains(code),
        };
        if empty {
            return Err(invalid("pattern is empty or out of range"));
        }

        Ok(ScopedRule {
            platform: self.platform,
            rule: Rule::new(pattern, self.status),
        })
    }
}

const SHARED_PHRASES: &[(&str, CanonicalStatus)] = &[
    ("no longer accepting applications", CanonicalStatus::Expired),
    ("no longer available", CanonicalStatus::Expired),
    ("job has expired", CanonicalStatus::Expired),
    ("posting has expired", CanonicalStatus::Expired),
    ("no longer posted", CanonicalStatus::Expired),
    ("no longer active", CanonicalStatus::Expired),
    ("page not found", CanonicalStatus::Expired),
    ("position has been filled", CanonicalStatus::Filled),
    ("position filled", CanonicalStatus::Filled),
    ("role has been filled", CanonicalStatus::Filled),
    ("job is closed", CanonicalStatus::Closed),
    ("posting is closed", CanonicalStatus::Closed),
    ("position is closed", CanonicalStatus::Closed),
    ("apply for this job", CanonicalStatus::Open),
];

const WORKDAY_REJECT: &[&str] = &[
    "no longer in consideration",
    "no longer under consideration",
    "no longer being considered",
    "not selected",
    "not been selected",
];

const WORKDAY_IN_PROCESS: &[&str] = &[
    "in process",
    "in progress",
    "under review",
    "under consideration",
];

const LINKEDIN_REJECT: &[&str] = &[
    "no longer being considered",
    "no longer in consideration",
    "not moving forward",
];

const LINKEDIN_IN_PROCESS: &[&str] = &[
    "under review",
    "being reviewed",
    "has been viewed",
    "was viewed",
    "resume was downloaded",
    "we received your application",
    "application submitted",
];

const APPLY_MARKERS: &[(AtsPlatform, &str)] = &[
    (AtsPlatform::Workday, markers::WORKDAY_APPLY_BUTTON),
    (AtsPlatform::Greenhouse, markers::GREENHOUSE_APPLICATION_FORM),
    (AtsPlatform::Lever, markers::LEVER_APPLY_BUTTON),
    (AtsPlatform::SmartRecruiters, markers::SMARTRECRUITERS_APPLY_BUTTON),
    (AtsPlatform::Taleo, markers::TALEO_APPLY_BUTTON),
    (AtsPlatform::LinkedIn, markers::LINKEDIN_APPLY_BUTTON),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_every_platform() {
        let book = RuleBook::builtin();
        for platform in AtsPlatform::ALL {
            assert!(
                book.rules_for(platform).next().is_some(),
                "no rules for {platform}"
            );
        }
        // Generic pages only see the shared rules.
        assert_eq!(
            book.rules_for(AtsPlatform::Generic).count(),
            SHARED_PHRASES.len() + 2
        );
    }

    #[test]
    fn test_platform_rules_come_first() {
        let book = RuleBook::builtin();
        let first = book.rules_for(AtsPlatform::Workday).next().expect("rule");
        assert_eq!(first.status, CanonicalStatus::Rejected);
    }

    #[test]
    fn test_phrase_pattern_is_case_insensitive() {
        let pattern = SignalPattern::phrase("No Longer  Accepting");
        let signal = StatusSignal::text("We are NO LONGER accepting applications");
        assert!(pattern.matches(&PreparedSignal::from(&signal)));

        let contains = SignalPattern::contains("NO LONGER");
        assert!(contains.matches(&PreparedSignal::from(&signal)));
        let contains = SignalPattern::contains("no longer");
        assert!(!contains.matches(&PreparedSignal::from(&signal)));
    }

    #[test]
    fn test_pattern_kinds_do_not_cross() {
        let marker = StatusSignal::marker("404");
        assert!(!SignalPattern::HttpStatus(404).matches(&PreparedSignal::from(&marker)));
        assert!(!SignalPattern::phrase("404").matches(&PreparedSignal::from(&marker)));
    }

    #[test]
    fn test_parse_rule_file() {
        let file = RuleFile::parse(
            r#"
            [[rule]]
            platform = "workday"
            status = "rejected"
            phrase = "move forward with other candidates"

            [[rule]]
            status = "expired"
            http_status = 451

            [[marker]]
            platform = "smartrecruiters"
            name = "sr.closed"
            selector = "div.job-closed"
            "#,
            "inline",
        )
        .expect("valid rule file");

        assert_eq!(file.rules.len(), 2);
        assert_eq!(file.rules[0].platform, Some(AtsPlatform::Workday));
        assert_eq!(
            file.rules[0].rule.pattern,
            SignalPattern::Phrase("move forward with other candidates".into())
        );
        assert_eq!(file.rules[1].platform, None);
        assert_eq!(file.markers[0].platform, Some(AtsPlatform::SmartRecruiters));
    }

    #[test]
    fn test_rule_requires_exactly_one_pattern() {
        let err = RuleFile::parse(
            r#"
            [[rule]]
            status = "open"
            phrase = "apply"
            marker = "x"
            "#,
            "inline",
        )
        .unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidRule { index: 0, .. }));

        let err = RuleFile::parse("[[rule]]\nstatus = \"open\"\n", "inline").unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidRule { .. }));
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = RuleFile::parse(
            "[[rule]]\nstatus = \"ghosted\"\nphrase = \"x\"\n",
            "inline",
        )
        .unwrap_err();
        assert!(matches!(err, ClassifierError::ParseError { .. }));
    }

    #[test]
    fn test_extend_appends_rules() {
        let mut book = RuleBook::empty();
        assert!(book.is_empty());
        let file = RuleFile::parse(
            "[[rule]]\nplatform = \"lever\"\nstatus = \"filled\"\ncontains = \"Filled\"\n",
            "inline",
        )
        .expect("valid");
        book.extend(file.rules);
        assert_eq!(book.len(), 1);
        assert_eq!(book.rules_for(AtsPlatform::Lever).count(), 1);
        assert_eq!(book.rules_for(AtsPlatform::Workday).count(), 0);
    }
}
