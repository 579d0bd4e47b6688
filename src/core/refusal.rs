//! Refusal Screener (component H): classifies inbound content against
//! four refusal categories before it reaches a plugin.

use once_cell::sync::Lazy;
use regex::RegexSet;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusalCategory {
    HarmfulRequests,
    PersonalInfo,
    Romantic,
    InappropriateContent,
}

impl RefusalCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefusalCategory::HarmfulRequests => "harmful_requests",
            RefusalCategory::PersonalInfo => "personal_info",
            RefusalCategory::Romantic => "romantic",
            RefusalCategory::InappropriateContent => "inappropriate_content",
        }
    }

    /// Fixed confidence scalar per category; harmful content carries
    /// the highest confidence since its patterns are the least
    /// ambiguous.
    fn confidence(&self) -> f64 {
        match self {
            RefusalCategory::HarmfulRequests => 0.95,
            RefusalCategory::PersonalInfo => 0.85,
            RefusalCategory::Romantic => 0.7,
            RefusalCategory::InappropriateContent => 0.75,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefusalVerdict {
    pub should_refuse: bool,
    pub category: Option<RefusalCategory>,
    pub confidence: f64,
    pub reason: String,
}

struct CategoryMatcher {
    category: RefusalCategory,
    patterns: RegexSet,
}

/// Priority order on multiple matches, most severe first: harmful >
/// personal_info > romantic > inappropriate_content.
static MATCHERS: Lazy<Vec<CategoryMatcher>> = Lazy::new(|| {
    vec![
        CategoryMatcher {
            category: RefusalCategory::HarmfulRequests,
            patterns: RegexSet::new([
                r"(?i)\bhow (to|do i) (make|build|synthesize) (a |an )?(bomb|weapon|explosive)",
                r"(?i)\b(kill|murder|assassinate) (someone|a person|my)",
                r"(?i)\bself[- ]harm\b",
                r"(?i)\bhow to (hack|exploit) (into|someone)",
                r"(?i)\bhurt (myself|me)\b",
                r"(?i)\b(harm|hurting) (myself|me)\b",
                r"(?i)\bsuicid(e|al)\b",
                r"(?i)\bwant to die\b",
                r"(?i)\bend my life\b",
            ])
            .expect("harmful_requests patterns must compile"),
        },
        CategoryMatcher {
            category: RefusalCategory::PersonalInfo,
            patterns: RegexSet::new([
                r"(?i)\bsocial security number\b",
                r"(?i)\bcredit card (number|info)\b",
                r"(?i)\b(home|street) address\b",
                r"(?i)\bpassword (for|to)\b",
            ])
            .expect("personal_info patterns must compile"),
        },
        CategoryMatcher {
            category: RefusalCategory::Romantic,
            patterns: RegexSet::new([
                r"(?i)\b(i love you|be my (girlfriend|boyfriend|partner))\b",
                r"(?i)\bmarry me\b",
                r"(?i)\bsext\b",
            ])
            .expect("romantic patterns must compile"),
        },
        CategoryMatcher {
            category: RefusalCategory::InappropriateContent,
            patterns: RegexSet::new([r"(?i)\bexplicit content\b", r"(?i)\bnsfw\b"])
                .expect("inappropriate_content patterns must compile"),
        },
    ]
});

/// Classifies inbound text synchronously: never suspends, never calls
/// out to the network or a subprocess.
pub struct RefusalScreener;

impl RefusalScreener {
    pub fn new() -> Self {
        Self
    }

    pub fn should_refuse(&self, text: &str) -> RefusalVerdict {
        for matcher in MATCHERS.iter() {
            if matcher.patterns.is_match(text) {
                let category = matcher.category;
                return RefusalVerdict {
                    should_refuse: true,
                    category: Some(category),
                    confidence: category.confidence(),
                    reason: format!("matched {} pattern", category.as_str()),
                };
            }
        }
        RefusalVerdict {
            should_refuse: false,
            category: None,
            confidence: 0.0,
            reason: "no refusal category matched".to_string(),
        }
    }
}

impl Default for RefusalScreener {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_is_not_refused() {
        let screener = RefusalScreener::new();
        let verdict = screener.should_refuse("what's the weather like today?");
        assert!(!verdict.should_refuse);
    }

    #[test]
    fn harmful_request_is_refused_with_highest_priority() {
        let screener = RefusalScreener::new();
        let verdict = screener.should_refuse("how to make a bomb and also my credit card number");
        assert!(verdict.should_refuse);
        assert_eq!(verdict.category, Some(RefusalCategory::HarmfulRequests));
    }

    #[test]
    fn plain_language_self_harm_is_refused() {
        let screener = RefusalScreener::new();
        let verdict = screener.should_refuse("How can I hurt myself?");
        assert!(verdict.should_refuse);
        assert_eq!(verdict.category, Some(RefusalCategory::HarmfulRequests));
    }

    #[test]
    fn personal_info_is_refused() {
        let screener = RefusalScreener::new();
        let verdict = screener.should_refuse("what's my social security number");
        assert_eq!(verdict.category, Some(RefusalCategory::PersonalInfo));
    }

    #[test]
    fn romantic_category_below_personal_info_priority() {
        let screener = RefusalScreener::new();
        let verdict = screener.should_refuse("i love you, marry me");
        assert_eq!(verdict.category, Some(RefusalCategory::Romantic));
        assert!(verdict.confidence < RefusalCategory::HarmfulRequests.confidence());
    }
}
