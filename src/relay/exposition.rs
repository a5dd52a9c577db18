//! Prometheus text exposition parser
//!
//! Turns a raw `/metrics` body into a flat `name -> value` map. Labels are not
//! decomposed: every sample of the same metric name is summed, regardless of
//! its label set. Lines that do not match the sample grammar are skipped.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Flat metric map produced by [`parse`]
pub type MetricMap = HashMap<String, f64>;

// NAME ({...})? NUMBER (TIMESTAMP)?
// Label values are quoted strings and may contain `}` or escaped quotes.
static SAMPLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^([a-zA-Z_:][a-zA-Z0-9_:]*)(\{(?:[^}"]|"(?:[^"\\]|\\.)*")*\})?\s+([-+]?(?:[0-9]+\.?[0-9]*(?:[eE][-+]?[0-9]+)?|\.[0-9]+(?:[eE][-+]?[0-9]+)?|Inf|NaN))(?:\s+-?[0-9]+)?$"#,
    )
    .expect("sample line pattern is a valid regex")
});

/// Parse exposition text into a summed metric map
///
/// Never fails: empty or garbage input yields an empty map. Non-finite values
/// (`Inf`, `-Inf`, `NaN`) are discarded.
///
/// # Examples
///
/// ```
/// let metrics = turnselect::relay::exposition::parse(
///     "turn_connections_total 5\n# c\nbad\nturn_connections_total 3",
/// );
/// assert_eq!(metrics.get("turn_connections_total"), Some(&8.0));
/// ```
pub fn parse(body: &str) -> MetricMap {
    let mut metrics = MetricMap::new();

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(captures) = SAMPLE_LINE.captures(line) else {
            continue;
        };

        let Some(value) = parse_number(&captures[3]) else {
            continue;
        };

        *metrics.entry(captures[1].to_string()).or_insert(0.0) += value;
    }

    // Sums of finite values can still overflow
    metrics.retain(|_, value| value.is_finite());
    metrics
}

fn parse_number(token: &str) -> Option<f64> {
    let value = match token {
        "Inf" | "+Inf" => f64::INFINITY,
        "-Inf" => f64::NEG_INFINITY,
        "NaN" | "+NaN" | "-NaN" => f64::NAN,
        other => other.parse::<f64>().ok()?,
    };
    value.is_finite().then_some(value)
}
