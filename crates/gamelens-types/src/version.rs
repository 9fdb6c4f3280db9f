//! Log-version comparison.
//!
//! Log versions are dot-separated non-negative integers (`"3"`, `"1.2.10"`).
//! Components compare numerically; when one version is a prefix of the
//! other, the shorter one is older.

use core::cmp::Ordering;

/// Parse a dot-separated version into its numeric components.
fn parse_components(version: &str) -> Option<Vec<u64>> {
    version
        .trim()
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect()
}

/// Compare two log versions.
///
/// Returns `None` when either version does not parse, so callers can decide
/// how to treat versions they cannot order.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    let a_parts = parse_components(a)?;
    let b_parts = parse_components(b)?;
    Some(a_parts.cmp(&b_parts))
}
