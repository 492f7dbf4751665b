//! Height and weight, kept as both a number and a display string.
//!
//! Heights are total inches and display as `6'7"`; weights are pounds and
//! display as `230 lbs`. When both forms arrive and disagree, the number wins
//! and the display string is regenerated.

use regex::Regex;
use std::sync::OnceLock;

fn height_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    // 6'7", 6' 7", 6-7, 6 ft 7 in, 6'
    RE.get_or_init(|| {
        Regex::new(r#"^\s*(\d+)\s*(?:'|ft|-)\s*(?:(\d+(?:\.\d+)?)\s*(?:"|''|in)?)?\s*$"#).ok()
    })
    .as_ref()
}

fn weight_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)").ok()).as_ref()
}

const MAX_HEIGHT_FEET: i32 = 9;

/// `6'7"` -> 79. Anything past 9'11" is treated as garbage.
pub fn parse_height(display: &str) -> Option<i32> {
    let caps = height_regex()?.captures(display)?;
    let feet = caps
        .get(1)?
        .as_str()
        .parse::<i32>()
        .ok()
        .filter(|f| (0..=MAX_HEIGHT_FEET).contains(f))?;
    let inches = match caps.get(2) {
        Some(m) => m.as_str().parse::<f64>().ok().filter(|i| (0.0..12.0).contains(i))?,
        None => 0.0,
    };
    let total = feet.checked_mul(12)?.checked_add(inches.round() as i32)?;
    (total > 0).then_some(total)
}

pub fn format_height(inches: i32) -> String {
    format!("{}'{}\"", inches / 12, inches % 12)
}

/// Leading number of a weight string: `230 lbs` -> 230
pub fn parse_weight(display: &str) -> Option<i32> {
    let caps = weight_regex()?.captures(display)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let pounds = value.round() as i32;
    (pounds > 0).then_some(pounds)
}

pub fn format_weight(pounds: i32) -> String {
    format!("{} lbs", pounds)
}

/// Numeric + display height, each derived from the other when missing.
pub fn reconcile_height(inches: Option<f64>, display: Option<&str>) -> (Option<i32>, Option<String>) {
    reconcile(inches, display, parse_height, format_height)
}

pub fn reconcile_weight(pounds: Option<f64>, display: Option<&str>) -> (Option<i32>, Option<String>) {
    reconcile(pounds, display, parse_weight, format_weight)
}

fn reconcile(
    numeric: Option<f64>,
    display: Option<&str>,
    parse: fn(&str) -> Option<i32>,
    format: fn(i32) -> String,
) -> (Option<i32>, Option<String>) {
    let numeric = numeric
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.round() as i32);

    match (numeric, display) {
        (Some(n), Some(d)) if parse(d) == Some(n) => (Some(n), Some(d.trim().to_string())),
        (Some(n), _) => (Some(n), Some(format(n))),
        (None, Some(d)) => match parse(d) {
            Some(n) => (Some(n), Some(format(n))),
            None => (None, None),
        },
        (None, None) => (None, None),
    }
}
