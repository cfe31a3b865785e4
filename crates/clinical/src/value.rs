use regex::Regex;
use std::sync::LazyLock;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)").expect("number pattern is valid"));

/// Dash spellings that stand in for a plain hyphen, including the
/// UTF-8-read-as-Latin-1 forms that text extraction tends to produce.
const DASH_VARIANTS: [&str; 5] = ["â€“", "â€”", "\u{2013}", "\u{2014}", "\u{2212}"];

/// Closed interval of a parsed reference range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceRange {
    pub min: f64,
    pub max: f64,
}

impl ReferenceRange {
    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// First decimal number in `text`, ignoring thousands separators and any
/// surrounding units: `"1,234.5 mg/dL"` gives `1234.5`. Digit runs too long
/// to fit an `f64` count as unparseable.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned = text.replace(',', "");
    NUMBER
        .captures(&cleaned)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

/// Parse `"min-max"`, `"<max"` or `">min"` into bounds.
///
/// `">min"` has no upper bound in the text; `2 × min` is used as a
/// heuristic upper bound so the value can still be charted. It is not a
/// clinical limit.
pub fn parse_range(text: &str) -> (Option<f64>, Option<f64>) {
    let text = text.trim();
    if text.is_empty() {
        return (None, None);
    }

    if let Some(rest) = text.strip_prefix('<') {
        return (Some(0.0), parse_number(rest.trim()));
    }

    if let Some(rest) = text.strip_prefix('>') {
        return match parse_number(rest.trim()) {
            Some(min) => (Some(min), Some(min * 2.0)),
            None => (None, None),
        };
    }

    let normalized = normalize_dashes(text);
    let Some((low, high)) = normalized.split_once('-') else {
        return (None, None);
    };

    match (parse_number(low.trim()), parse_number(high.trim())) {
        (Some(min), Some(max)) => (Some(min), Some(max)),
        _ => (None, None),
    }
}

/// Both bounds of a range, or nothing.
pub fn parse_bounds(text: &str) -> Option<ReferenceRange> {
    match parse_range(text) {
        (Some(min), Some(max)) => Some(ReferenceRange { min, max }),
        _ => None,
    }
}

pub fn normalize_dashes(text: &str) -> String {
    let mut normalized = text.to_string();
    for dash in DASH_VARIANTS {
        normalized = normalized.replace(dash, "-");
    }
    normalized.replace(" - ", "-")
}
