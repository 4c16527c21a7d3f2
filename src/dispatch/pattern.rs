const WILDCARD: &str = "*";

/// Checks if a dotted key matches a subscription pattern.
///
/// Segments are compared one by one and `*` matches any single segment. A
/// trailing `*` also matches every deeper key, so a bare `*` matches all.
///
/// * `"server.port"` matches `"server.port"`
/// * `"server.port"` matches `"server.*"` and `"*.port"`
/// * `"server.tls.cert"` matches `"server.*"` but not `"server.*.key"`
pub(crate) fn key_matches(key: &str, pattern: &str) -> bool {
    let mut key_parts = key.split('.');
    let mut pattern_parts = pattern.split('.').peekable();

    while let Some(pattern_part) = pattern_parts.next() {
        let Some(key_part) = key_parts.next() else {
            return false;
        };

        if pattern_part == WILDCARD {
            if pattern_parts.peek().is_none() {
                return true;
            }
            continue;
        }

        if key_part != pattern_part {
            return false;
        }
    }

    key_parts.next().is_none()
}
