//! Page → signal extraction.

use crate::error::{ClassifierError, Result};
use crate::rules::MarkerDefinition;
use crate::signal::{markers, normalize_text, SignalSet, StatusSignal};
use jobtrack_core::AtsPlatform;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;

/// Signals extracted from one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Signals for the classifier
    pub signals: SignalSet,
    /// Set when the page is a CAPTCHA or anti-bot interstitial
    pub blocked: Option<String>,
}

/// Turns a fetched page into a finite signal set.
pub trait SignalExtractor: Send + Sync {
    /// Extract signals from a page served on `platform`.
    fn extract(&self, platform: AtsPlatform, html: &str, http_status: Option<u16>) -> Extraction;
}

#[derive(Debug, Clone)]
struct MarkerSelector {
    platform: Option<AtsPlatform>,
    name: String,
    selector: Selector,
}

/// HTML extractor backed by `scraper`.
///
/// Emits one text signal for the page title, one for the visible body text,
/// a marker for each platform selector present, and the HTTP status when
/// known.
#[derive(Debug, Clone)]
pub struct HtmlSignalExtractor {
    markers: Vec<MarkerSelector>,
    captcha: Selector,
    title: Selector,
    body: Selector,
}

const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

const CAPTCHA_SELECTOR: &str =
    "iframe[src*='recaptcha'], iframe[src*='hcaptcha'], .g-recaptcha, .h-captcha, #captcha, #challenge-form";

const BLOCKED_PHRASES: &[&str] = &[
    "verify you are human",
    "checking your browser",
    "unusual traffic",
    "access denied",
];

const BUILTIN_MARKERS: &[(AtsPlatform, &str, &str)] = &[
    (
        AtsPlatform::Workday,
        markers::WORKDAY_APPLY_BUTTON,
        "a[data-automation-id='adventureButton'], button[data-automation-id='adventureButton'], [data-automation-id='applyManually']",
    ),
    (
        AtsPlatform::Greenhouse,
        markers::GREENHOUSE_APPLICATION_FORM,
        "form#application-form, form#application_form, #application_form",
    ),
    (
        AtsPlatform::Lever,
        markers::LEVER_APPLY_BUTTON,
        "a.postings-btn[href*='/apply'], .postings-btn-wrapper a",
    ),
    (
        AtsPlatform::SmartRecruiters,
        markers::SMARTRECRUITERS_APPLY_BUTTON,
        "[data-test='apply-button'], #st-apply",
    ),
    (
        AtsPlatform::Taleo,
        markers::TALEO_APPLY_BUTTON,
        "a[id*='applyFromDetailBtn'], input[value='Apply Online']",
    ),
    (
        AtsPlatform::LinkedIn,
        markers::LINKEDIN_APPLY_BUTTON,
        "button.jobs-apply-button, .jobs-s-apply button",
    ),
    (
        AtsPlatform::LinkedIn,
        markers::LINKEDIN_CLOSED_BANNER,
        ".jobs-details-top-card__apply-error, .jobs-unified-top-card__apply-error",
    ),
];

impl Default for HtmlSignalExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlSignalExtractor {
    /// Extractor with the built-in marker selectors.
    #[must_use]
    pub fn new() -> Self {
        let markers = BUILTIN_MARKERS
            .iter()
            .map(|(platform, name, selector)| MarkerSelector {
                platform: Some(*platform),
                name: (*name).to_string(),
                selector: Selector::parse(selector).expect("valid builtin selector"),
            })
            .collect();

        Self {
            markers,
            captcha: Selector::parse(CAPTCHA_SELECTOR).expect("valid captcha selector"),
            title: Selector::parse("title").expect("valid title selector"),
            body: Selector::parse("body").expect("valid body selector"),
        }
    }

    /// Add operator-defined markers.
    ///
    /// # Errors
    /// Returns error if a selector does not parse.
    pub fn with_markers(mut self, definitions: &[MarkerDefinition]) -> Result<Self> {
        for definition in definitions {
            let selector = Selector::parse(&definition.selector).map_err(|e| {
                ClassifierError::InvalidSelector {
                    name: definition.name.clone(),
                    reason: e.to_string(),
                }
            })?;
            self.markers.push(MarkerSelector {
                platform: definition.platform,
                name: definition.name.clone(),
                selector,
            });
        }
        Ok(self)
    }

    fn visible_text(element: ElementRef<'_>, out: &mut String) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    out.push_str(text);
                    out.push(' ');
                }
                Node::Element(el) if !HIDDEN_ELEMENTS.contains(&el.name()) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        Self::visible_text(child, out);
                    }
                }
                _ => {}
            }
        }
    }
}

impl SignalExtractor for HtmlSignalExtractor {
    fn extract(&self, platform: AtsPlatform, html: &str, http_status: Option<u16>) -> Extraction {
        let document = Html::parse_document(html);
        let mut signals = SignalSet::new();

        if let Some(code) = http_status {
            signals.insert(StatusSignal::HttpStatus(code));
        }

        if let Some(title) = document.select(&self.title).next() {
            signals.insert(StatusSignal::text(&title.text().collect::<String>()));
        }

        let mut body_text = String::new();
        let root = document
            .select(&self.body)
            .next()
            .unwrap_or_else(|| document.root_element());
        Self::visible_text(root, &mut body_text);
        let body_text = normalize_text(&body_text);

        for marker in &self.markers {
            let applies = marker.platform.map_or(true, |p| p == platform);
            if applies && document.select(&marker.selector).next().is_some() {
                signals.insert(StatusSignal::marker(marker.name.clone()));
            }
        }

        let lowered = body_text.to_lowercase();
        let blocked = if document.select(&self.captcha).next().is_some() {
            Some("captcha widget present".to_string())
        } else {
            BLOCKED_PHRASES
                .iter()
                .find(|phrase| lowered.contains(*phrase))
                .map(|phrase| format!("interstitial: \"{phrase}\""))
        };
        if blocked.is_some() {
            signals.insert(StatusSignal::marker(markers::CAPTCHA));
        }

        signals.insert(StatusSignal::Text(body_text));

        debug!(
            platform = %platform,
            signals = signals.len(),
            blocked = blocked.is_some(),
            "extracted page signals"
        );

        Extraction { signals, blocked }
    }
}
