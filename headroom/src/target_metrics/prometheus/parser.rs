//! Prometheus text format parser
//!
//! A parser for the subset of the Prometheus text exposition format that
//! `mactop` produces. Comment lines, `# HELP` and `# TYPE` included, carry
//! nothing the recorder needs and are skipped. Metric names and label keys
//! are borrowed from the input; label values are borrowed unless they hold
//! escapes.
//! <https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md>

use std::borrow::Cow;

/// Label pairs in the order they appear on the line.
pub type LabelPairs<'a> = Vec<(&'a str, Cow<'a, str>)>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
/// Errors that can occur while parsing a metric line
pub enum ParseError {
    /// The line does not have the `name[{labels}] value [timestamp]` shape
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    /// The value cannot be parsed as a number
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// No value follows the name and labels
    #[error("missing value")]
    MissingValue,
    /// The line has labels or a value but no metric name
    #[error("missing metric name")]
    MissingName,
    /// A label is malformed
    #[error("invalid label: {0}")]
    InvalidLabel(String),
}

#[derive(Debug, Clone, PartialEq)]
/// One parsed sample line
pub struct ParsedMetric<'a> {
    /// The metric name
    pub name: &'a str,
    /// Label pairs, `None` when the line carries no braces
    pub labels: Option<LabelPairs<'a>>,
    /// The metric value
    pub value: f64,
    /// Optional timestamp in milliseconds since Unix epoch
    pub timestamp: Option<i64>,
}

/// Parse a complete exposition body.
///
/// Yields one result per sample line. Blank and comment lines yield nothing.
pub fn parse_text(text: &str) -> impl Iterator<Item = Result<ParsedMetric<'_>, ParseError>> {
    text.lines().filter_map(parse_line)
}

/// Parse a single line. Returns `None` for blank and comment lines.
#[must_use]
pub fn parse_line(line: &str) -> Option<Result<ParsedMetric<'_>, ParseError>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(parse_metric_line(line))
}

fn parse_metric_line(line: &str) -> Result<ParsedMetric<'_>, ParseError> {
    let (name_and_labels, value_part) = split_metric_line(line)?;
    let (name, labels) = parse_name_and_labels(name_and_labels)?;
    let (value, timestamp) = parse_value_and_timestamp(value_part)?;

    Ok(ParsedMetric {
        name,
        labels,
        value,
        timestamp,
    })
}

fn split_metric_line(line: &str) -> Result<(&str, &str), ParseError> {
    if let Some(open) = line.find('{') {
        // Values never contain a brace, label values may.
        let close = line
            .rfind('}')
            .filter(|close| *close > open)
            .ok_or_else(|| ParseError::InvalidFormat("unclosed labels bracket".to_string()))?;
        let rest = line[close + 1..].trim();
        if rest.is_empty() {
            return Err(ParseError::MissingValue);
        }
        Ok((&line[..=close], rest))
    } else {
        let (name, rest) = line
            .split_once(char::is_whitespace)
            .ok_or(ParseError::MissingValue)?;
        Ok((name, rest.trim()))
    }
}

fn parse_name_and_labels(
    name_and_labels: &str,
) -> Result<(&str, Option<LabelPairs<'_>>), ParseError> {
    match name_and_labels.split_once('{') {
        Some((name, labels)) => {
            let name = name.trim();
            if name.is_empty() {
                return Err(ParseError::MissingName);
            }
            let labels = labels.strip_suffix('}').unwrap_or(labels);
            Ok((name, Some(parse_labels(labels)?)))
        }
        None => {
            let name = name_and_labels.trim();
            if name.is_empty() {
                return Err(ParseError::MissingName);
            }
            Ok((name, None))
        }
    }
}

/// Split the label block on commas that sit outside quoted values.
fn split_labels(labels: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (idx, ch) in labels.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ',' if !quoted => {
                parts.push(&labels[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&labels[start..]);
    parts
}

fn parse_labels(labels: &str) -> Result<LabelPairs<'_>, ParseError> {
    let mut pairs = Vec::new();

    for label in split_labels(labels) {
        let label = label.trim();
        if label.is_empty() {
            continue;
        }

        let (key, value) = label
            .split_once('=')
            .ok_or_else(|| ParseError::InvalidLabel(format!("label missing '=': {label}")))?;
        let key = key.trim();

        if key.is_empty() {
            return Err(ParseError::InvalidLabel("empty label key".to_string()));
        }
        if key.starts_with("__") {
            return Err(ParseError::InvalidLabel(format!(
                "label name {key} is reserved"
            )));
        }

        pairs.push((key, parse_label_value(value)?));
    }

    Ok(pairs)
}

fn parse_label_value(value: &str) -> Result<Cow<'_, str>, ParseError> {
    let inner = value
        .trim()
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or_else(|| ParseError::InvalidLabel("label value must be quoted".to_string()))?;

    if !inner.contains(['\\', '"']) {
        return Ok(Cow::Borrowed(inner));
    }

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('n') => result.push('\n'),
                Some(c) => {
                    return Err(ParseError::InvalidLabel(format!(
                        "invalid escape sequence: \\{c}"
                    )));
                }
                None => {
                    return Err(ParseError::InvalidLabel(
                        "backslash at end of label value".to_string(),
                    ));
                }
            },
            '"' => {
                return Err(ParseError::InvalidLabel(
                    "unescaped quote in label value".to_string(),
                ));
            }
            c => result.push(c),
        }
    }

    Ok(Cow::Owned(result))
}

fn parse_value_and_timestamp(value_part: &str) -> Result<(f64, Option<i64>), ParseError> {
    let mut parts = value_part.split_whitespace();
    let raw = parts.next().ok_or(ParseError::MissingValue)?;

    let value = match raw {
        "NaN" => f64::NAN,
        "+Inf" => f64::INFINITY,
        "-Inf" => f64::NEG_INFINITY,
        _ => raw
            .parse::<f64>()
            .map_err(|_| ParseError::InvalidValue(raw.to_string()))?,
    };

    let timestamp = parts
        .next()
        .map(|ts| {
            ts.parse::<i64>()
                .map_err(|_| ParseError::InvalidFormat(format!("invalid timestamp: {ts}")))
        })
        .transpose()?;

    if let Some(extra) = parts.next() {
        return Err(ParseError::InvalidFormat(format!(
            "unexpected trailing token: {extra}"
        )));
    }

    Ok((value, timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse_one(line: &str) -> Result<ParsedMetric<'_>, ParseError> {
        parse_line(line).expect("line is not a comment")
    }

    #[test]
    fn comments_and_blank_lines_yield_nothing() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   ").is_none());
        assert!(parse_line("# HELP mactop_cpu_usage_percent CPU usage").is_none());
        assert!(parse_line("# TYPE mactop_cpu_usage_percent gauge").is_none());
        assert!(parse_line("#anything at all").is_none());
    }

    #[test]
    fn metric_without_labels() {
        let parsed = parse_one("mactop_cpu_usage_percent 12.5").unwrap();
        assert_eq!(parsed.name, "mactop_cpu_usage_percent");
        assert_eq!(parsed.value, 12.5);
        assert!(parsed.labels.is_none());
        assert!(parsed.timestamp.is_none());
    }

    #[test]
    fn metric_with_labels_and_timestamp() {
        let parsed = parse_one(r#"mactop_memory_gb{type="used",unit="gb"} 8.25 1700000000000"#)
            .unwrap();
        assert_eq!(parsed.name, "mactop_memory_gb");
        assert_eq!(parsed.value, 8.25);
        assert_eq!(parsed.timestamp, Some(1_700_000_000_000));
        let labels = parsed.labels.unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].0, "type");
        assert_eq!(labels[0].1, "used");
        assert!(matches!(labels[0].1, Cow::Borrowed(_)));
        assert_eq!(labels[1].0, "unit");
    }

    #[test]
    fn label_values_with_commas_and_braces() {
        let parsed =
            parse_one(r#"build_info{revision="745babd, 2024-09-11",note="a}b"} 1"#).unwrap();
        let labels = parsed.labels.unwrap();
        assert_eq!(labels[0], ("revision", Cow::Borrowed("745babd, 2024-09-11")));
        assert_eq!(labels[1], ("note", Cow::Borrowed("a}b")));
        assert_eq!(parsed.value, 1.0);
    }

    #[test]
    fn label_value_escaping() {
        let parsed = parse_one(r#"m{path="C:\\dir\"x\"\nend"} 1"#).unwrap();
        let labels = parsed.labels.unwrap();
        assert_eq!(labels[0].1, "C:\\dir\"x\"\nend");
        assert!(matches!(labels[0].1, Cow::Owned(_)));

        assert!(matches!(
            parse_one(r#"m{path="bad\t"} 1"#),
            Err(ParseError::InvalidLabel(_))
        ));
        assert!(matches!(
            parse_one(r#"m{path="a"b"} 1"#),
            Err(ParseError::InvalidLabel(_))
        ));
    }

    #[test]
    fn special_float_values() {
        assert!(parse_one("m NaN").unwrap().value.is_nan());
        assert_eq!(parse_one("m +Inf").unwrap().value, f64::INFINITY);
        assert_eq!(parse_one("m -Inf").unwrap().value, f64::NEG_INFINITY);
        assert_eq!(parse_one("m -3e2").unwrap().value, -300.0);
    }

    #[test]
    fn malformed_lines() {
        assert!(matches!(parse_one("m foobar"), Err(ParseError::InvalidValue(_))));
        assert!(matches!(parse_one("lonely"), Err(ParseError::MissingValue)));
        assert!(matches!(parse_one(r#"m{a="b"}"#), Err(ParseError::MissingValue)));
        assert!(matches!(parse_one(r#"{a="b"} 1"#), Err(ParseError::MissingName)));
        assert!(matches!(parse_one(r#"m{a="b" 1"#), Err(ParseError::InvalidFormat(_))));
        assert!(matches!(parse_one("m{a=b} 1"), Err(ParseError::InvalidLabel(_))));
        assert!(matches!(parse_one(r#"m{__name__="x"} 1"#), Err(ParseError::InvalidLabel(_))));
        assert!(matches!(parse_one("m 1 notatime"), Err(ParseError::InvalidFormat(_))));
        assert!(matches!(parse_one("m 1 2 3"), Err(ParseError::InvalidFormat(_))));
    }

    #[test]
    fn full_body_skips_bad_lines() {
        let body = r#"
# HELP mactop_cpu_usage_percent CPU usage
# TYPE mactop_cpu_usage_percent gauge
mactop_cpu_usage_percent 42
garbage line here
mactop_power_watts{component="cpu"} 3.5

"#;
        let results: Vec<_> = parse_text(body).collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().name, "mactop_power_watts");
    }

    proptest! {
        #[test]
        fn prop_no_panic_on_any_input(input: String) {
            for result in parse_text(&input) {
                let _ = result;
            }
        }

        #[test]
        fn prop_comment_lines_never_yield(body in "[^\n\r]*") {
            let line = format!("#{body}");
            prop_assert!(parse_line(&line).is_none());
        }

        #[test]
        fn prop_valid_metric_names_accepted(
            name in "[a-zA-Z_:][a-zA-Z0-9_:]*",
            value in prop::num::f64::NORMAL | prop::num::f64::POSITIVE | prop::num::f64::NEGATIVE,
        ) {
            let line = format!("{name} {value}");
            let parsed = parse_one(&line);
            prop_assert!(parsed.is_ok());
            let parsed = parsed.unwrap();
            prop_assert_eq!(parsed.name, name.as_str());
            prop_assert_eq!(parsed.value, value);
        }

        #[test]
        fn prop_label_escaping_roundtrip(
            name in "[a-zA-Z_][a-zA-Z0-9_]*",
            label_name in "[a-zA-Z][a-zA-Z0-9_]*",
            raw_value in ".*",
        ) {
            let escaped = raw_value
                .replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\n', "\\n");
            let line = format!("{name}{{{label_name}=\"{escaped}\"}} 1");
            let parsed = parse_one(&line);
            prop_assert!(parsed.is_ok(), "{line}: {parsed:?}");
            let labels = parsed.unwrap().labels.unwrap();
            prop_assert_eq!(labels.len(), 1);
            prop_assert_eq!(labels[0].1.as_ref(), raw_value.as_str());
        }
    }
}
