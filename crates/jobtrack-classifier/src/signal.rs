//! Page signals consumed by the classifier.
//!
//! A signal is a raw, platform-specific observation about one fetched page.
//! Signals are kept in an ordered set so that iterating them is deterministic
//! regardless of extraction order.

use serde::{Deserialize, Serialize};
use std::collections::btree_set;
use std::collections::BTreeSet;

/// Structural marker names shared by the extractor and the rule tables.
pub mod markers {
    /// Workday posting "Apply" button
    pub const WORKDAY_APPLY_BUTTON: &str = "workday.apply-button";
    /// Greenhouse application form
    pub const GREENHOUSE_APPLICATION_FORM: &str = "greenhouse.application-form";
    /// Lever "Apply for this job" button
    pub const LEVER_APPLY_BUTTON: &str = "lever.apply-button";
    /// `SmartRecruiters` apply button
    pub const SMARTRECRUITERS_APPLY_BUTTON: &str = "smartrecruiters.apply-button";
    /// Taleo apply button
    pub const TALEO_APPLY_BUTTON: &str = "taleo.apply-button";
    /// `LinkedIn` Easy Apply / Apply button
    pub const LINKEDIN_APPLY_BUTTON: &str = "linkedin.apply-button";
    /// `LinkedIn` "No longer accepting applications" feedback banner
    pub const LINKEDIN_CLOSED_BANNER: &str = "linkedin.closed-banner";
    /// CAPTCHA widget or anti-bot interstitial
    pub const CAPTCHA: &str = "captcha";
}

/// One observation extracted from a page.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSignal {
    /// A block of visible text, whitespace-collapsed, case preserved
    Text(String),
    /// A named structural marker (for example a specific badge or button) is present
    Marker(String),
    /// HTTP status the page was served with
    HttpStatus(u16),
}

impl StatusSignal {
    /// Build a text signal, normalizing whitespace and typographic quotes.
    #[must_use]
    pub fn text(raw: &str) -> Self {
        Self::Text(normalize_text(raw))
    }

    /// Build a marker signal.
    #[must_use]
    pub fn marker(name: impl Into<String>) -> Self {
        Self::Marker(name.into())
    }
}

/// Deterministically ordered collection of signals for one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSet(BTreeSet<StatusSignal>);

impl SignalSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a signal. Empty text signals are dropped.
    pub fn insert(&mut self, signal: StatusSignal) -> bool {
        if matches!(&signal, StatusSignal::Text(text) if text.is_empty()) {
            return false;
        }
        self.0.insert(signal)
    }

    /// Iterate signals in their canonical order.
    pub fn iter(&self) -> btree_set::Iter<'_, StatusSignal> {
        self.0.iter()
    }

    /// Number of signals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no signal was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the named marker is present.
    #[must_use]
    pub fn has_marker(&self, name: &str) -> bool {
        self.0
            .iter()
            .any(|signal| matches!(signal, StatusSignal::Marker(m) if m == name))
    }

    /// HTTP status carried by the set, if any.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        self.0.iter().find_map(|signal| match signal {
            StatusSignal::HttpStatus(code) => Some(*code),
            _ => None,
        })
    }
}

impl FromIterator<StatusSignal> for SignalSet {
    fn from_iter<I: IntoIterator<Item = StatusSignal>>(iter: I) -> Self {
        let mut set = Self::new();
        for signal in iter {
            set.insert(signal);
        }
        set
    }
}

impl<'a> IntoIterator for &'a SignalSet {
    type Item = &'a StatusSignal;
    type IntoIter = btree_set::Iter<'a, StatusSignal>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Collapse whitespace runs to single spaces, trim, and fold typographic
/// apostrophes and quotes to ASCII.
#[must_use]
pub fn normalize_text(raw: &str) -> String {
    let folded: String = raw
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{02BC}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{00A0}' => ' ',
            other => other,
        })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
