//! Date-format translation and timestamp parsing
//!
//! References may attach a date format in the conventional Java token syntax
//! (`%{HTTPDATE:time_local:date;dd/MMM/yyyy:HH:mm:ss Z}`). The tokens are
//! translated once, at resolution time, into the strftime syntax chrono
//! expects; matching then parses captured text with the translated format.
//!
//! Timestamps without a zone in their format are interpreted as UTC. The
//! result of a date conversion is an integer epoch-millisecond value, or NaN
//! when the text does not parse.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::value::Value;

/// Translate a Java-style date pattern into a chrono strftime string.
///
/// Single-quoted runs are literal (`''` is an escaped quote), letter runs are
/// translated by token, everything else passes through unchanged.
pub fn to_chrono(java: &str) -> String {
    let chars: Vec<char> = java.chars().collect();
    let mut out = String::with_capacity(java.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            // quoted literal run; '' inside the run is an escaped quote
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        out.push('\'');
                        i += 2;
                        continue;
                    }
                    break;
                }
                if chars[i] == '%' {
                    out.push_str("%%");
                } else {
                    out.push(chars[i]);
                }
                i += 1;
            }
            i += 1; // closing quote
            continue;
        }
        if c.is_ascii_alphabetic() {
            let mut n = 1;
            while chars.get(i + n) == Some(&c) {
                n += 1;
            }
            out.push_str(translate_token(c, n));
            i += n;
            continue;
        }
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
        i += 1;
    }
    out
}

/// One run of a repeated pattern letter
fn translate_token(letter: char, count: usize) -> &'static str {
    match (letter, count) {
        ('y', 0..=2) => "%y",
        ('y', _) => "%Y",
        ('M', 0..=2) => "%m",
        ('M', 3) => "%b",
        ('M', _) => "%B",
        ('d', _) => "%d",
        ('D', _) => "%j",
        ('H', _) => "%H",
        ('h', _) => "%I",
        ('m', _) => "%M",
        ('s', _) => "%S",
        ('S', _) => "%3f",
        ('a', _) => "%p",
        ('E', 0..=3) => "%a",
        ('E', _) => "%A",
        ('X', 0..=1) => "%#z",
        ('X', 2) => "%z",
        ('X', _) => "%:z",
        ('Z', _) => "%z",
        ('z', _) => "%Z",
        // Tokens with no chrono equivalent are dropped rather than passed
        // through, which would corrupt the strftime string.
        _ => "",
    }
}

/// Parse captured text into epoch milliseconds.
///
/// With a translated format the text is parsed against it; without one a
/// generic fallback tries RFC 3339 and the common ISO-ish layouts. Returns
/// `Value::Int(millis)` on success and `Value::Float(NAN)` otherwise.
pub fn parse_timestamp(raw: &str, format: Option<&str>) -> Value {
    let millis = match format {
        Some(fmt) => parse_with_format(raw.trim(), fmt),
        None => parse_fallback(raw.trim()),
    };
    match millis {
        Some(ms) => Value::Int(ms),
        None => Value::Float(f64::NAN),
    }
}

fn has_zone(format: &str) -> bool {
    format.contains("%z") || format.contains("%:z") || format.contains("%#z")
}

fn parse_with_format(raw: &str, format: &str) -> Option<i64> {
    if has_zone(format) {
        return DateTime::parse_from_str(raw, format)
            .ok()
            .map(|dt| dt.timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
        return Some(dt.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(raw, format)
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
}

fn parse_fallback(raw: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    const NAIVE_LAYOUTS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S",
    ];
    for layout in NAIVE_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("yyyy-MM-dd'T'HH:mm:ssXXX", "%Y-%m-%dT%H:%M:%S%:z")]
    #[case("dd/MMM/yyyy:HH:mm:ss Z", "%d/%b/%Y:%H:%M:%S %z")]
    #[case("MM/dd/yyyy HH:mm:ss", "%m/%d/%Y %H:%M:%S")]
    #[case("yyyy-MM-dd", "%Y-%m-%d")]
    #[case("HH:mm:ss.SSS", "%H:%M:%S.%3f")]
    #[case("'at' HH:mm", "at %H:%M")]
    fn java_tokens_translate(#[case] java: &str, #[case] chrono_fmt: &str) {
        assert_eq!(to_chrono(java), chrono_fmt);
    }

    #[test]
    fn escaped_quote_is_literal() {
        assert_eq!(to_chrono("hh 'o''clock' a"), "%I o'clock %p");
    }

    #[test]
    fn zoned_parse() {
        let fmt = to_chrono("yyyy-MM-dd'T'HH:mm:ssXXX");
        assert_eq!(
            parse_timestamp("2017-08-10T16:53:20+08:00", Some(&fmt)),
            Value::Int(1502355200000)
        );
    }

    #[test]
    fn zoned_parse_offset_without_colon() {
        let fmt = to_chrono("dd/MMM/yyyy:HH:mm:ss Z");
        assert_eq!(
            parse_timestamp("21/Apr/2017:10:55:46 +0800", Some(&fmt)),
            Value::Int(1492743346000)
        );
    }

    #[test]
    fn naive_parse_is_utc() {
        let fmt = to_chrono("MM/dd/yyyy HH:mm:ss");
        assert_eq!(
            parse_timestamp("08/10/2017 16:53:20", Some(&fmt)),
            Value::Int(1502384000000)
        );
    }

    #[test]
    fn date_only_format() {
        let fmt = to_chrono("yyyy-MM-dd");
        assert_eq!(
            parse_timestamp("1970-01-02", Some(&fmt)),
            Value::Int(86_400_000)
        );
    }

    #[test]
    fn fallback_accepts_rfc3339() {
        assert_eq!(
            parse_timestamp("2015-05-13T08:04:43+10:00", None),
            Value::Int(1431468283000)
        );
        assert_eq!(
            parse_timestamp("1970-01-01T00:00:01", None),
            Value::Int(1000)
        );
    }

    #[test]
    fn unparseable_is_nan() {
        match parse_timestamp("yesterday-ish", None) {
            Value::Float(f) => assert!(f.is_nan()),
            other => panic!("expected NaN, got {:?}", other),
        }
        match parse_timestamp("2017-13-40", Some("%Y-%m-%d")) {
            Value::Float(f) => assert!(f.is_nan()),
            other => panic!("expected NaN, got {:?}", other),
        }
    }
}
