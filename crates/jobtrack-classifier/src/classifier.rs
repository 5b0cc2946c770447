//! Signal set → canonical status.

use crate::rules::{PreparedSignal, RuleBook};
use crate::signal::SignalSet;
use jobtrack_core::{AtsPlatform, CanonicalStatus, Confidence};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Result of classifying one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Winning status
    pub status: CanonicalStatus,
    /// How strongly the signals agree
    pub confidence: Confidence,
}

impl Classification {
    /// Nothing matched.
    pub const UNKNOWN: Self = Self {
        status: CanonicalStatus::Unknown,
        confidence: Confidence::Low,
    };
}

/// Pure, deterministic classifier over a [`RuleBook`].
///
/// When several rules match, the status with the highest precedence wins.
/// Confidence is `High` when every matched status falls in one family and
/// `Medium` when the matches span families.
#[derive(Debug, Clone)]
pub struct StatusClassifier {
    rules: RuleBook,
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self::new(RuleBook::builtin())
    }
}

impl StatusClassifier {
    /// Create a classifier over the given rules.
    #[must_use]
    pub fn new(rules: RuleBook) -> Self {
        Self { rules }
    }

    /// Rules in use.
    #[must_use]
    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    /// Classify a page's signals.
    #[must_use]
    pub fn classify(&self, platform: AtsPlatform, signals: &SignalSet) -> Classification {
        let prepared: Vec<PreparedSignal<'_>> = signals.iter().map(PreparedSignal::from).collect();

        let matched: BTreeMap<u8, CanonicalStatus> = self
            .rules
            .rules_for(platform)
            .filter(|rule| prepared.iter().any(|signal| rule.pattern.matches(signal)))
            .map(|rule| (rule.status.precedence(), rule.status))
            .collect();

        let Some((_, &status)) = matched.last_key_value() else {
            trace!(platform = %platform, signals = signals.len(), "no rule matched");
            return Classification::UNKNOWN;
        };

        let families: BTreeSet<_> = matched.values().map(CanonicalStatus::family).collect();
        let confidence = if families.len() == 1 {
            Confidence::High
        } else {
            Confidence::Medium
        };

        trace!(
            platform = %platform,
            status = %status,
            confidence = %confidence,
            matched = matched.len(),
            "classified page"
        );

        Classification { status, confidence }
    }
}
