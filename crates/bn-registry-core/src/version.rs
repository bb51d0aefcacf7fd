//! SemVer and SemVer-range handling.
//!
//! Exact versions are parsed with the `semver` crate after a light
//! normalization step (optional `v` prefix, leading zeros in numeric
//! identifiers). Range expressions follow the node-semver grammar used by mod
//! dependency declarations, which `semver::VersionReq` does not cover
//! (hyphen ranges, `||`, whitespace conjunctions).

use regex::Regex;
use semver::Version;
use std::cmp::Ordering;
use std::sync::LazyLock;

static CALVER_STAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}\.\d{2}\.\d{2}-[0-9a-f]{7}$").unwrap());

/// Parse a version string into a [`Version`] for ordering.
///
/// Accepts an optional leading `v`/`V` and tolerates leading zeros in numeric
/// identifiers (`2026.01.05` parses as `2026.1.5`), so tags and CalVer stamps
/// can be compared. Use [`is_valid_version`] to decide what may be stored.
pub fn parse_version(input: &str) -> Option<Version> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    if body.is_empty() {
        return None;
    }

    let (without_build, build) = match body.split_once('+') {
        Some((head, build)) => (head, Some(build)),
        None => (body, None),
    };
    let (core, pre) = match without_build.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (without_build, None),
    };

    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() != 3 || !parts.iter().all(|p| is_numeric(p)) {
        return None;
    }

    let mut normalized = parts
        .iter()
        .map(|p| strip_leading_zeros(p))
        .collect::<Vec<_>>()
        .join(".");

    if let Some(pre) = pre {
        let idents: Vec<&str> = pre.split('.').collect();
        if idents.iter().any(|i| !is_identifier(i)) {
            return None;
        }
        let idents: Vec<&str> = idents
            .into_iter()
            .map(|i| if is_numeric(i) { strip_leading_zeros(i) } else { i })
            .collect();
        normalized.push('-');
        normalized.push_str(&idents.join("."));
    }

    if let Some(build) = build {
        if build.split('.').any(|i| !is_identifier(i)) {
            return None;
        }
        normalized.push('+');
        normalized.push_str(build);
    }

    Version::parse(&normalized).ok()
}

/// True if the string is a storable manifest version: strict SemVer 2.0.0
/// (optionally `v`-prefixed) or a commit autoupdate stamp.
///
/// Leading zeros are rejected (`01.02.03` is not a version) except in the
/// zero-padded date of a stamp.
pub fn is_valid_version(input: &str) -> bool {
    let body = input
        .strip_prefix('v')
        .or_else(|| input.strip_prefix('V'))
        .unwrap_or(input);
    Version::parse(body).is_ok() || is_calver_stamp(input)
}

/// True for `YYYY.MM.DD-<sha7>`, the version commit autoupdate writes.
pub fn is_calver_stamp(input: &str) -> bool {
    CALVER_STAMP.is_match(input)
}

/// Compare two exact versions by SemVer precedence.
///
/// Build metadata is ignored and a prerelease sorts before its release.
/// Returns `None` if either side is not a valid version.
pub fn compare_semver(a: &str, b: &str) -> Option<Ordering> {
    let a = parse_version(a)?;
    let b = parse_version(b)?;
    Some(
        (a.major, a.minor, a.patch)
            .cmp(&(b.major, b.minor, b.patch))
            .then_with(|| a.pre.cmp(&b.pre)),
    )
}

/// Compare two version-like strings (tags, CalVer, SemVer).
///
/// Uses SemVer precedence when both sides parse; otherwise falls back to a
/// token-wise comparison splitting on `.`, `-` and `_`, where all-digit
/// tokens compare numerically and everything else lexicographically.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    if let Some(ordering) = compare_semver(a, b) {
        return ordering;
    }

    let clean_a = strip_v(a);
    let clean_b = strip_v(b);
    let tokens_a: Vec<&str> = clean_a.split(['.', '-', '_']).collect();
    let tokens_b: Vec<&str> = clean_b.split(['.', '-', '_']).collect();

    for i in 0..tokens_a.len().max(tokens_b.len()) {
        let part_a = tokens_a.get(i).copied().unwrap_or("");
        let part_b = tokens_b.get(i).copied().unwrap_or("");

        let ordering = match (part_a.parse::<u64>(), part_b.parse::<u64>()) {
            (Ok(num_a), Ok(num_b)) => num_a.cmp(&num_b),
            _ => part_a.cmp(part_b),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

/// Comparison operator in a range primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Exact,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Caret,
    Tilde,
}

/// A possibly partial version (`1`, `1.2`, `1.x`, `*`, `1.2.3-beta`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialVersion {
    pub major: Option<u64>,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
    pub pre: Option<String>,
}

/// One element of a range conjunction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparator {
    Primitive(RangeOp, PartialVersion),
    Hyphen(PartialVersion, PartialVersion),
}

/// A `||`-separated disjunction of whitespace-separated conjunctions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub alternatives: Vec<Vec<Comparator>>,
}

/// Parse a node-semver style range expression.
pub fn parse_range(input: &str) -> Option<VersionRange> {
    if input.trim().is_empty() {
        return None;
    }

    let alternatives = input
        .split("||")
        .map(parse_conjunction)
        .collect::<Option<Vec<_>>>()?;

    Some(VersionRange { alternatives })
}

/// True if the string is any accepted range form.
pub fn is_valid_range(input: &str) -> bool {
    parse_range(input).is_some()
}

fn parse_conjunction(input: &str) -> Option<Vec<Comparator>> {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    if tokens.len() == 3 && tokens[1] == "-" {
        let low = parse_partial(tokens[0])?;
        let high = parse_partial(tokens[2])?;
        return Some(vec![Comparator::Hyphen(low, high)]);
    }

    let mut comparators = Vec::new();
    let mut iter = tokens.into_iter();
    while let Some(token) = iter.next() {
        // ">= 1.0.0" is written with a space in some descriptors
        let token = if is_bare_operator(token) {
            let next = iter.next()?;
            format!("{token}{next}")
        } else {
            token.to_string()
        };
        comparators.push(parse_primitive(&token)?);
    }

    Some(comparators)
}

fn is_bare_operator(token: &str) -> bool {
    matches!(token, ">" | ">=" | "<" | "<=" | "=" | "^" | "~")
}

fn parse_primitive(token: &str) -> Option<Comparator> {
    let (op, rest) = if let Some(rest) = token.strip_prefix(">=") {
        (RangeOp::GreaterEq, rest)
    } else if let Some(rest) = token.strip_prefix("<=") {
        (RangeOp::LessEq, rest)
    } else if let Some(rest) = token.strip_prefix('>') {
        (RangeOp::Greater, rest)
    } else if let Some(rest) = token.strip_prefix('<') {
        (RangeOp::Less, rest)
    } else if let Some(rest) = token.strip_prefix('=') {
        (RangeOp::Exact, rest)
    } else if let Some(rest) = token.strip_prefix("~>") {
        (RangeOp::Tilde, rest)
    } else if let Some(rest) = token.strip_prefix('~') {
        (RangeOp::Tilde, rest)
    } else if let Some(rest) = token.strip_prefix('^') {
        (RangeOp::Caret, rest)
    } else {
        (RangeOp::Exact, token)
    };

    Some(Comparator::Primitive(op, parse_partial(rest)?))
}

fn parse_partial(input: &str) -> Option<PartialVersion> {
    let body = input
        .strip_prefix('v')
        .or_else(|| input.strip_prefix('V'))
        .unwrap_or(input);
    if body.is_empty() {
        return None;
    }

    let (without_build, build) = match body.split_once('+') {
        Some((head, build)) => (head, Some(build)),
        None => (body, None),
    };
    let (core, pre) = match without_build.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (without_build, None),
    };

    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut numbers = [None, None, None];
    let mut wildcard_seen = false;
    for (slot, part) in numbers.iter_mut().zip(parts.iter()) {
        if matches!(*part, "x" | "X" | "*") {
            wildcard_seen = true;
            continue;
        }
        // "1.x.3" is not a valid x-range
        if wildcard_seen || !is_numeric(part) {
            return None;
        }
        *slot = Some(part.parse::<u64>().ok()?);
    }

    let complete = numbers.iter().all(Option::is_some);
    if (pre.is_some() || build.is_some()) && !complete {
        return None;
    }
    if let Some(pre) = pre {
        if pre.split('.').any(|i| !is_identifier(i)) {
            return None;
        }
    }
    if let Some(build) = build {
        if build.split('.').any(|i| !is_identifier(i)) {
            return None;
        }
    }

    Some(PartialVersion {
        major: numbers[0],
        minor: numbers[1],
        patch: numbers[2],
        pre: pre.map(str::to_string),
    })
}

fn strip_v(input: &str) -> &str {
    input
        .strip_prefix('v')
        .or_else(|| input.strip_prefix('V'))
        .unwrap_or(input)
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

fn strip_leading_zeros(s: &str) -> &str {
    let stripped = s.trim_start_matches('0');
    if stripped.is_empty() {
        "0"
    } else {
        stripped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_versions() {
        assert!(is_valid_version("1.0.0"));
        assert!(is_valid_version("0.9.1"));
        assert!(is_valid_version("1.2.3-alpha.1"));
        assert!(is_valid_version("1.2.3+build.5"));
        assert!(is_valid_version("v2.0.0"));
        assert!(is_valid_version("2026.01.05-0a1b2c3"));
        assert!(is_valid_version("2026.10.19-0123456"));
        assert!(is_calver_stamp("2026.01.05-0a1b2c3"));
        assert!(!is_calver_stamp("2026.1.5-0a1b2c3"));
    }

    #[test]
    fn test_invalid_versions() {
        assert!(!is_valid_version(""));
        assert!(!is_valid_version("1.0"));
        assert!(!is_valid_version("v2.0"));
        assert!(!is_valid_version("1.0.0.0"));
        assert!(!is_valid_version("abc"));
        assert!(!is_valid_version("1.0.0-"));
        assert!(!is_valid_version("1.0.0-beta..1"));
        assert!(!is_valid_version("01.02.03"));
        assert!(!is_valid_version("1.02.3"));
        assert!(!is_valid_version("1.2.3-01"));
    }

    #[test]
    fn test_range_exact_and_comparators() {
        for range in ["1.0.0", "0.9.1", ">=1.0.0", ">1.0.0", "<=2.0.0", "<2.0.0", "=1.0.0"] {
            assert!(is_valid_range(range), "{range} should be valid");
        }
    }

    #[test]
    fn test_range_caret_and_tilde() {
        for range in ["^1.0.0", "^0.2.3", "^1.2.x", "~1.2.3", "~1.2", "~1"] {
            assert!(is_valid_range(range), "{range} should be valid");
        }
    }

    #[test]
    fn test_range_x_ranges() {
        for range in ["*", "1.x", "1.2.x", "1.X", "1.*", "x", "1", "1.2"] {
            assert!(is_valid_range(range), "{range} should be valid");
        }
    }

    #[test]
    fn test_range_hyphen_compound_and_or() {
        for range in [
            "1.0.0 - 2.0.0",
            "1.2 - 2.3.4",
            ">=1.0.0 <2.0.0",
            ">=1.2.3 <1.2.4",
            "1.2.7 || >=1.2.9 <2.0.0",
            ">=1.0.0 <2.0.0 || >=3.0.0",
            ">= 1.0.0",
        ] {
            assert!(is_valid_range(range), "{range} should be valid");
        }
    }

    #[test]
    fn test_range_prerelease() {
        assert!(is_valid_range(">=1.2.3-alpha.0"));
        assert!(is_valid_range("~1.2.3-beta.2"));
    }

    #[test]
    fn test_range_rejects_invalid() {
        for range in ["", "   ", "abc", "not-a-version", "1.x.3", ">=", "1.0.0 ||", "1.2-beta"] {
            assert!(!is_valid_range(range), "{range:?} should be invalid");
        }
    }

    #[test]
    fn test_range_structure() {
        let range = parse_range(">=1.0.0 <2.0.0 || 3.x").unwrap();
        assert_eq!(range.alternatives.len(), 2);
        assert_eq!(range.alternatives[0].len(), 2);
        assert_eq!(
            range.alternatives[1][0],
            Comparator::Primitive(
                RangeOp::Exact,
                PartialVersion {
                    major: Some(3),
                    minor: None,
                    patch: None,
                    pre: None,
                }
            )
        );
    }

    #[test]
    fn test_compare_semver_precedence() {
        assert_eq!(compare_semver("1.0.0", "2.0.0"), Some(Ordering::Less));
        assert_eq!(compare_semver("1.0.0-alpha", "1.0.0"), Some(Ordering::Less));
        assert_eq!(
            compare_semver("1.0.0-alpha.2", "1.0.0-alpha.10"),
            Some(Ordering::Less)
        );
        assert_eq!(compare_semver("1.0.0+a", "1.0.0+b"), Some(Ordering::Equal));
        assert_eq!(compare_semver("v1.2.0", "1.1.9"), Some(Ordering::Greater));
        assert_eq!(compare_semver("1.0", "1.0.0"), None);
    }

    #[test]
    fn test_compare_versions_fallback() {
        assert_eq!(compare_versions("v2.10", "v2.9"), Ordering::Greater);
        assert_eq!(compare_versions("2024-01_3", "2024-01_12"), Ordering::Less);
        assert_eq!(compare_versions("release-b", "release-a"), Ordering::Greater);
        assert_eq!(compare_versions("1.0", "1.0.1"), Ordering::Less);
        assert_eq!(compare_versions("v1.0", "1.0"), Ordering::Equal);
    }

    #[test]
    fn test_sorting_tags_descending() {
        let mut tags = vec!["v1.0.0", "v1.10.0", "v1.2.0", "v1.2.0-rc.1"];
        tags.sort_by(|a, b| compare_versions(b, a));
        assert_eq!(tags, vec!["v1.10.0", "v1.2.0", "v1.2.0-rc.1", "v1.0.0"]);
    }
}
