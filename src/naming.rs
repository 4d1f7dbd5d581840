//! Name sanitization for the Graphite dotted namespace.
//!
//! Two character policies apply. Metric names may keep dots, since upstream
//! plugins already use them as path separators. Host and service names
//! become single path segments, so the identifier rule replaces dots too.
//! Disallowed characters are replaced with `_`, never removed, so segment
//! boundaries stay stable.

/// Sanitizes a metric name: keeps `[A-Za-z0-9_.-]`, replaces everything
/// else with `_`, then rewrites a trailing `_<digits>` instance suffix
/// into a `.<digits>` path segment (`disk_0` -> `disk.0`) so Graphite
/// groups indexed instances under a common prefix.
pub fn sanitize_metric(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if is_metric_char(c) { c } else { '_' })
        .collect();
    rewrite_instance_suffix(&cleaned)
}

/// Sanitizes a host or service identifier: like the metric rule, but a
/// literal dot is also replaced (`cpu.load` -> `cpu_load`).
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if is_identifier_char(c) { c } else { '_' })
        .collect()
}

fn is_metric_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-')
}

/// Rewrites the last underscore into a dot when everything after it is
/// digits running to the end of the name.
fn rewrite_instance_suffix(name: &str) -> String {
    if let Some(pos) = name.rfind('_') {
        let digits = &name[pos + 1..];
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return format!("{}.{}", &name[..pos], digits);
        }
    }
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_keeps_legal_chars() {
        assert_eq!(sanitize_metric("cpu.user-time_pct"), "cpu.user-time_pct");
    }

    #[test]
    fn test_metric_replaces_illegal_chars() {
        assert_eq!(sanitize_metric("used %"), "used__");
        assert_eq!(sanitize_metric("C:\\ used"), "C___used");
    }

    #[test]
    fn test_metric_instance_suffix_becomes_segment() {
        assert_eq!(sanitize_metric("disk_0"), "disk.0");
        assert_eq!(sanitize_metric("part_12"), "part.12");
    }

    #[test]
    fn test_metric_only_trailing_digits_rewritten() {
        assert_eq!(sanitize_metric("eth0_rx"), "eth0_rx");
        assert_eq!(sanitize_metric("a_0b"), "a_0b");
        assert_eq!(sanitize_metric("a_0_1"), "a_0.1");
    }

    #[test]
    fn test_metric_sanitization_can_create_instance_suffix() {
        // The slash becomes an underscore first, then the suffix rule fires.
        assert_eq!(sanitize_metric("disk/0"), "disk.0");
    }

    #[test]
    fn test_identifier_replaces_dot() {
        assert_eq!(sanitize_identifier("cpu.load"), "cpu_load");
        assert_eq!(sanitize_identifier("web-1.example.org"), "web-1_example_org");
    }

    #[test]
    fn test_identifier_keeps_trailing_digits() {
        // The instance rewrite only applies to metric names.
        assert_eq!(sanitize_identifier("test_host_0"), "test_host_0");
    }

    #[test]
    fn test_sanitized_names_stay_in_legal_set() {
        for raw in ["response time", "a b:c/d\\e", "temp (C)", "%$#@!"] {
            let name = sanitize_metric(raw);
            assert!(
                name.chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')),
                "illegal character survived in {name:?}"
            );
        }
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(sanitize_metric(""), "");
        assert_eq!(sanitize_identifier(""), "");
    }
}
