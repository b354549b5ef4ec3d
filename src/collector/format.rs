//! Exposition-format text rendering.

use super::families::Family;

/// Appends one metric family to the response body.
///
/// Always emits the `# HELP` and `# TYPE` header lines. The value line is
/// emitted exactly when a value is present; zero is a present value and is
/// emitted like any other.
pub fn append_family(out: &mut String, family: &Family, value: Option<f64>) {
    out.push_str("# HELP ");
    out.push_str(family.key);
    out.push(' ');
    out.push_str(family.help);
    out.push('\n');

    out.push_str("# TYPE ");
    out.push_str(family.key);
    out.push(' ');
    out.push_str(family.kind.as_str());
    out.push('\n');

    if let Some(value) = value {
        out.push_str(family.key);
        out.push(' ');
        out.push_str(&value.to_string());
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::families::MetricKind;

    const FAMILY: Family = Family {
        key: "cpu_agg_usage",
        help: "Aggregate CPU usage in nanoseconds",
        kind: MetricKind::Counter,
        source: "nsec_user",
        transform: None,
    };

    #[test]
    fn test_absent_value_emits_headers_only() {
        let mut out = String::new();
        append_family(&mut out, &FAMILY, None);

        assert_eq!(
            out,
            "# HELP cpu_agg_usage Aggregate CPU usage in nanoseconds\n\
             # TYPE cpu_agg_usage counter\n"
        );
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn test_zero_value_is_emitted() {
        let mut out = String::new();
        append_family(&mut out, &FAMILY, Some(0.0));

        assert_eq!(out.lines().count(), 3);
        assert!(out.ends_with("cpu_agg_usage 0\n"));
    }

    #[test]
    fn test_integral_value_renders_without_fraction() {
        let mut out = String::new();
        append_family(&mut out, &FAMILY, Some(1000.0));
        assert!(out.ends_with("cpu_agg_usage 1000\n"));
    }

    #[test]
    fn test_fractional_value_renders_in_full() {
        let mut out = String::new();
        append_family(&mut out, &FAMILY, Some(3.921875));
        assert!(out.ends_with("cpu_agg_usage 3.921875\n"));
    }
}
