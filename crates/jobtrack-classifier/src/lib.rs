//! Jobtrack Classifier - ATS detection and status classification.
//!
//! Turns a job URL into an [`AtsPlatform`](jobtrack_core::AtsPlatform) and a
//! fetched page into a [`CanonicalStatus`](jobtrack_core::CanonicalStatus).
//!
//! # Pipeline
//!
//! 1. [`detect`] maps the URL to a platform (pure, total).
//! 2. A [`SignalExtractor`] reduces the page to a finite [`SignalSet`].
//! 3. The [`StatusClassifier`] applies the platform and shared rules from a
//!    [`RuleBook`] and resolves conflicts by status precedence.
//!
//! # Example
//!
//! ```rust
//! use jobtrack_classifier::{detect, SignalSet, StatusClassifier, StatusSignal};
//! use jobtrack_core::{AtsPlatform, CanonicalStatus, Confidence};
//!
//! let platform = detect("https://acme.wd5.myworkdayjobs.com/en-US/careers/job/123");
//! assert_eq!(platform, AtsPlatform::Workday);
//!
//! let signals: SignalSet = [StatusSignal::text("In Process")].into_iter().collect();
//! let result = StatusClassifier::default().classify(platform, &signals);
//! assert_eq!(result.status, CanonicalStatus::UnderReview);
//! assert_eq!(result.confidence, Confidence::High);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod classifier;
pub mod error;
pub mod extract;
pub mod platform;
pub mod rules;
pub mod signal;

// Re-export commonly used types
pub use classifier::{Classification, StatusClassifier};
pub use error::{ClassifierError, Result};
pub use extract::{Extraction, HtmlSignalExtractor, SignalExtractor};
pub use platform::{detect, workday_login_url, workday_tenant};
pub use rules::{MarkerDefinition, Rule, RuleBook, RuleFile, ScopedRule, SignalPattern};
pub use signal::{markers, normalize_text, SignalSet, StatusSignal};

use jobtrack_core::ClassifierConfig;

/// Build the classifier and extractor, merging the operator rule file when
/// one is configured.
pub fn from_config(config: &ClassifierConfig) -> Result<(StatusClassifier, HtmlSignalExtractor)> {
    let mut rules = RuleBook::builtin();
    let mut extractor = HtmlSignalExtractor::new();

    if let Some(path) = &config.rules_path {
        let file = RuleFile::load(path)?;
        extractor = extractor.with_markers(&file.markers)?;
        rules.extend(file.rules);
    }

    Ok((StatusClassifier::new(rules), extractor))
}
