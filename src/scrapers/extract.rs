//! Pure text-extraction helpers for Trade Me listing content.
//!
//! The detail pages render loosely delimited text blocks, so everything here
//! works on raw strings: monetary amounts, wire timestamps, keyword lines and
//! photo-URL rewrites.

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Trade Me's wire timestamps look like `/Date(1714000000000)/` (epoch ms).
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/Date\((\d+)\)/").expect("hard-coded regex"));

/// Currency amount: `$`, optional space, a leading digit, comma-grouped
/// digits, then an optional `K`/`M` magnitude suffix.
static MONEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s?[0-9][\d,]*(?:\s?[KM])?").expect("hard-coded regex"));

/// Variable photoserver size segment, e.g. `/photoserver/thumb/`.
static PHOTO_SEG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/photoserver/[^/]+/").expect("hard-coded regex"));

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("hard-coded regex"));

/// Parse a wire timestamp into an instant. Missing or malformed input yields
/// the minimum representable instant so such records sort last under
/// newest-first ordering.
pub fn parse_wire_date(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| DATE_RE.captures(s))
        .and_then(|caps| caps[1].parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// First monetary amount in `text`, or an empty string.
pub fn money(text: &str) -> String {
    MONEY_RE
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// First line containing `needle` case-insensitively, trimmed; empty string
/// when no line matches.
pub fn line_containing(lines: &[&str], needle: &str) -> String {
    let needle = needle.to_lowercase();
    lines
        .iter()
        .find(|line| line.to_lowercase().contains(&needle))
        .map(|line| line.trim().to_string())
        .unwrap_or_default()
}

/// First run of ASCII digits in `text`, or an empty string.
pub fn first_number(text: &str) -> String {
    NUMBER_RE
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Rewrite a thumbnail photo URL to its full-resolution equivalent by
/// swapping the photoserver size segment; the rest of the URL is untouched.
pub fn thumb_to_full(url: &str) -> String {
    PHOTO_SEG_RE
        .replace_all(url, "/photoserver/full/")
        .into_owned()
}

/// Greedy word wrap to `width` columns, capped at `max_lines` output lines.
/// Words longer than `width` are kept whole on their own line.
pub fn wrap_lines(text: &str, width: usize, max_lines: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            if lines.len() == max_lines {
                return lines.join("\n");
            }
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_extracts_first_amount() {
        assert_eq!(money("Price: $1,250,000 negotiable"), "$1,250,000");
        assert_eq!(money("Asking over $849,000 or $900,000"), "$849,000");
        assert_eq!(money("$ 725,000"), "$ 725,000");
        assert_eq!(money("around $1.2"), "$1");
    }

    #[test]
    fn money_keeps_magnitude_suffix() {
        assert_eq!(money("CV $1,130 K approx"), "$1,130 K");
        assert_eq!(money("estimate $2M"), "$2M");
    }

    #[test]
    fn money_without_currency_marker_is_empty() {
        assert_eq!(money("price by negotiation"), "");
        assert_eq!(money(""), "");
    }

    #[test]
    fn wire_date_epoch_zero() {
        let parsed = parse_wire_date(Some("/Date(0)/"));
        assert_eq!(parsed, Utc.timestamp_millis_opt(0).unwrap());
    }

    #[test]
    fn wire_date_millisecond_precision() {
        let parsed = parse_wire_date(Some("/Date(1714000000123)/"));
        assert_eq!(parsed.timestamp_millis(), 1_714_000_000_123);
    }

    #[test]
    fn wire_date_garbage_yields_sentinel_minimum() {
        assert_eq!(parse_wire_date(Some("yesterday")), DateTime::<Utc>::MIN_UTC);
        assert_eq!(parse_wire_date(None), DateTime::<Utc>::MIN_UTC);
        assert_eq!(parse_wire_date(Some("")), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn line_matching_is_case_insensitive_and_trims() {
        let lines = ["  HomesEstimate range ", "  updated 3 May  ", "4.1%"];
        assert_eq!(line_containing(&lines, "Updated"), "updated 3 May");
        assert_eq!(line_containing(&lines, "%"), "4.1%");
        assert_eq!(line_containing(&lines, "/ week"), "");
    }

    #[test]
    fn thumb_rewrite_only_touches_size_segment() {
        assert_eq!(
            thumb_to_full("https://trademe.tmcdn.co.nz/photoserver/thumb/123.jpg"),
            "https://trademe.tmcdn.co.nz/photoserver/full/123.jpg"
        );
        assert_eq!(
            thumb_to_full("https://example.com/no-photoserver/here.jpg"),
            "https://example.com/no-photoserver/here.jpg"
        );
    }

    #[test]
    fn first_number_picks_leading_digits() {
        assert_eq!(first_number("3 bedrooms"), "3");
        assert_eq!(first_number("no digits"), "");
    }

    #[test]
    fn wrap_caps_line_count() {
        let text = "one two three four five six";
        assert_eq!(wrap_lines(text, 9, 30), "one two\nthree\nfour five\nsix");
        assert_eq!(wrap_lines(text, 9, 2), "one two\nthree");
        assert_eq!(wrap_lines("", 120, 30), "");
    }
}
