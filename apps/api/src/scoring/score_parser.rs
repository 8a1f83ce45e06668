//! Turns free-form rating text into a score in `[0, 100]`.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::extraction::normalize::normalize;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Which occurrence of a pattern supplies the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pick {
    First,
    Last,
}

struct ScorePattern {
    name: &'static str,
    regex: Regex,
    pick: Pick,
}

/// Ordered most-specific first. The first pattern that matches anywhere in the text decides
/// the score; later patterns are never consulted.
static SCORE_PATTERNS: Lazy<Vec<ScorePattern>> = Lazy::new(|| {
    let pattern = |name, re: &str, pick| ScorePattern {
        name,
        regex: Regex::new(re).expect("score pattern is valid"),
        pick,
    };
    vec![
        pattern(
            "score_over_100",
            r"(?i)\bscore[ \t]*:[ \t]*(\d+(?:\.\d+)?)[ \t]*/[ \t]*100\b",
            Pick::First,
        ),
        pattern(
            "final_score",
            r"(?i)\bfinal[ \t]+score[ \t]*:[ \t]*(\d+(?:\.\d+)?)",
            Pick::First,
        ),
        pattern(
            "out_of_100",
            r"(?i)\b(\d+(?:\.\d+)?)[ \t]+out[ \t]+of[ \t]+100\b",
            Pick::First,
        ),
        pattern("slash_100", r"\b(\d+(?:\.\d+)?)[ \t]*/[ \t]*100\b", Pick::First),
        pattern("last_number", r"\b(\d+(?:\.\d+)?)\b", Pick::Last),
    ]
});

/// Names of the score patterns in evaluation order.
pub fn pattern_order() -> Vec<&'static str> {
    SCORE_PATTERNS.iter().map(|p| p.name).collect()
}

pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_SCORE;
    }
    value.clamp(MIN_SCORE, MAX_SCORE)
}

/// The first matching pattern and its clamped score, or `None` when nothing matched.
pub fn match_score(text: &str) -> Option<(&'static str, f64)> {
    for pattern in SCORE_PATTERNS.iter() {
        let caps = match pattern.pick {
            Pick::First => pattern.regex.captures(text),
            Pick::Last => pattern.regex.captures_iter(text).last(),
        };
        let Some(raw) = caps.and_then(|c| c.get(1)) else {
            continue;
        };
        // A matched pattern is final even if its number fails to parse.
        let value = raw.as_str().parse::<f64>().map(clamp_score).unwrap_or(MIN_SCORE);
        return Some((pattern.name, value));
    }
    None
}

/// Score for a rating response. Unmatched text yields `0.0` and a warning, never an error.
pub fn parse_score(text: &str) -> f64 {
    match match_score(text) {
        Some((pattern, score)) => {
            debug!(pattern, score, "score parsed from rating");
            score
        }
        None => {
            warn!(
                response = %normalize(text).chars().take(120).collect::<String>(),
                "no score found in rating response, defaulting to 0"
            );
            MIN_SCORE
        }
    }
}
