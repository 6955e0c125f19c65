//! Structural classification of a single block's text.
//!
//! Classifiers run in the fixed order of [`PRECEDENCE`]; the first match wins.
//! Changing that order changes how documents are chunked, so it is pinned by
//! tests below.

use once_cell::sync::Lazy;
use regex::Regex;

/// Blocks whose lowest edge is below this line sit in the footer zone.
pub const CONTENT_ZONE_MAX_Y: f32 = 0.95;

/// Longest block still accepted as a section title after a pending number.
pub const SHORT_TITLE_MAX_LEN: usize = 40;

static CHAPTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z\s]{4,}$").expect("chapter regex"));
static SECTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\s+[A-Za-z]").expect("section regex"));
static RULE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^((Rule\s+)?([1-9]|1[0-9])(\.\d+)+|Rule\s+\d+)").expect("rule regex"));
static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("numeric regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classifier {
    Chapter,
    Section,
    RuleHeader,
    NumericToken,
}

/// Evaluation order for structural classifiers. Anything unmatched is body text.
pub const PRECEDENCE: [Classifier; 4] =
    [Classifier::Chapter, Classifier::Section, Classifier::RuleHeader, Classifier::NumericToken];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Chapter,
    Section,
    /// Carries the matched rule token, e.g. `Rule 9.12` or `9.12`.
    RuleHeader(String),
    NumericToken,
    Body,
}

impl Classifier {
    fn apply(self, text: &str, in_content_zone: bool) -> Option<BlockKind> {
        match self {
            Classifier::Chapter => is_chapter(text).then_some(BlockKind::Chapter),
            Classifier::Section => SECTION_RE.is_match(text).then_some(BlockKind::Section),
            Classifier::RuleHeader => {
                if !in_content_zone {
                    return None;
                }
                rule_token(text).map(|t| BlockKind::RuleHeader(t.to_string()))
            }
            Classifier::NumericToken => is_numeric_token(text).then_some(BlockKind::NumericToken),
        }
    }
}

/// Classify trimmed block text. Rule headers only count inside the content zone.
pub fn classify(text: &str, in_content_zone: bool) -> BlockKind {
    PRECEDENCE
        .iter()
        .find_map(|c| c.apply(text, in_content_zone))
        .unwrap_or(BlockKind::Body)
}

pub fn is_chapter(text: &str) -> bool { CHAPTER_RE.is_match(text) }

pub fn is_numeric_token(text: &str) -> bool { NUMERIC_RE.is_match(text) }

/// The leading rule token, ignoring page zones.
pub fn rule_token(text: &str) -> Option<&str> {
    RULE_RE.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// `None` geometry counts as inside the zone.
pub fn in_content_zone(max_y: Option<f32>) -> bool {
    max_y.map_or(true, |y| y <= CONTENT_ZONE_MAX_Y)
}

/// A block that can complete a pending section number: short, not a sentence,
/// and not itself structural.
pub fn is_short_title(text: &str) -> bool {
    let structural = is_chapter(text) || rule_token(text).is_some() || is_numeric_token(text);
    let looks_like_content = text.chars().count() > SHORT_TITLE_MAX_LEN || text.ends_with('.');
    !structural && !looks_like_content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_order_is_pinned() {
        assert_eq!(
            PRECEDENCE,
            [Classifier::Chapter, Classifier::Section, Classifier::RuleHeader, Classifier::NumericToken]
        );
    }

    #[test]
    fn classifies_each_kind() {
        assert_eq!(classify("THE PITCH", true), BlockKind::Chapter);
        assert_eq!(classify("1 Dimensions", true), BlockKind::Section);
        assert_eq!(classify("Rule 9.12 Penalty Stroke", true), BlockKind::RuleHeader("Rule 9.12".into()));
        assert_eq!(classify("9.12 Penalty Stroke", true), BlockKind::RuleHeader("9.12".into()));
        assert_eq!(classify("rule 4 Players", true), BlockKind::RuleHeader("rule 4".into()));
        assert_eq!(classify("36", true), BlockKind::NumericToken);
        assert_eq!(classify("The ball is round.", true), BlockKind::Body);
    }

    #[test]
    fn rule_headers_outside_content_zone_are_body() {
        assert_eq!(classify("Rule 9.12 Penalty Stroke", false), BlockKind::Body);
        assert_eq!(classify("9.12", false), BlockKind::Body);
        // numeric tokens are recognised in any zone
        assert_eq!(classify("36", false), BlockKind::NumericToken);
    }

    #[test]
    fn chapter_wins_over_later_classifiers() {
        assert_eq!(classify("RULES OF PLAY", true), BlockKind::Chapter);
        assert_eq!(classify("ABC", true), BlockKind::Body);
    }

    #[test]
    fn section_wins_over_rule() {
        // "1 Dimensions" could never be a rule (no dotted part) but "10 Rule" is a section
        assert_eq!(classify("10 Rule changes", true), BlockKind::Section);
    }

    #[test]
    fn dotted_numerals_above_nineteen_are_not_rules() {
        assert_eq!(classify("20.1 apples", true), BlockKind::Body);
    }

    #[test]
    fn content_zone_boundary() {
        assert!(in_content_zone(None));
        assert!(in_content_zone(Some(0.95)));
        assert!(!in_content_zone(Some(0.951)));
    }

    #[test]
    fn short_title_rules() {
        assert!(is_short_title("Objectives"));
        assert!(!is_short_title("The ball is round."));
        assert!(!is_short_title(&"x".repeat(41)));
        assert!(is_short_title(&"x".repeat(40)));
        assert!(!is_short_title("THE PITCH"));
        assert!(!is_short_title("Rule 2.1"));
        assert!(!is_short_title("42"));
    }
}
