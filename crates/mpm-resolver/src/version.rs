//! npm-style version range matching on top of the `semver` crate.
//!
//! npm ranges differ from Cargo requirements in a few places:
//! - a bare full version (`1.2.3`) is an exact match, not a caret range
//! - comparators in a set are separated by whitespace rather than commas
//! - `A - B` hyphen ranges and `||` unions are allowed
//! - an empty range, `*` and `x` accept any release
//!
//! [`Range::parse`] rewrites each comparator set into a [`semver::VersionReq`]
//! and a range matches when any of its sets does.

use std::fmt;

use semver::{Version, VersionReq};
use thiserror::Error;

/// A range expression that could not be understood.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid version range '{range}': {reason}")]
pub struct RangeError {
    pub range: String,
    pub reason: String,
}

/// A parsed npm range: a union of comparator sets.
#[derive(Debug, Clone)]
pub struct Range {
    original: String,
    sets: Vec<VersionReq>,
}

impl Range {
    pub fn parse(input: &str) -> Result<Self, RangeError> {
        let sets = input
            .split("||")
            .map(|set| {
                let translated = translate_set(set);
                VersionReq::parse(&translated).map_err(|e| RangeError {
                    range: input.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            original: input.to_string(),
            sets,
        })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.sets.iter().any(|req| req.matches(version))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// Rewrite one whitespace-separated npm comparator set as a `VersionReq` string.
fn translate_set(set: &str) -> String {
    let tokens: Vec<&str> = set.split_whitespace().collect();

    if let [lower, "-", upper] = tokens.as_slice() {
        return format!(">={}, <={}", strip_v(lower), strip_v(upper));
    }

    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in tokens {
        if is_operator(token) {
            pending_op = Some(token);
            continue;
        }
        let comparator = match pending_op.take() {
            Some(op) => format!("{}{}", normalize_op(op), strip_v(token)),
            None => normalize_comparator(token),
        };
        comparators.push(comparator);
    }
    if let Some(op) = pending_op {
        comparators.push(op.to_string());
    }

    if comparators.is_empty() {
        "*".to_string()
    } else {
        comparators.join(", ")
    }
}

fn is_operator(token: &str) -> bool {
    matches!(token, "=" | ">" | ">=" | "<" | "<=" | "~" | "^" | "~>")
}

fn normalize_op(op: &str) -> &str {
    if op == "~>" {
        "~"
    } else {
        op
    }
}

fn strip_v(token: &str) -> &str {
    token
        .strip_prefix('v')
        .or_else(|| token.strip_prefix('V'))
        .unwrap_or(token)
}

fn normalize_comparator(token: &str) -> String {
    if matches!(token, "*" | "x" | "X") {
        return "*".to_string();
    }
    let op_len = token
        .find(|c: char| !matches!(c, '=' | '>' | '<' | '~' | '^'))
        .unwrap_or(token.len());
    let (op, version) = token.split_at(op_len);
    let version = strip_v(version);
    let op = normalize_op(op);

    if !op.is_empty() {
        return format!("{op}{version}");
    }
    let core = version.split(['-', '+']).next().unwrap_or(version);
    let is_wildcard = |part: &str| matches!(part, "x" | "X" | "*");
    if core.split('.').next().is_some_and(is_wildcard) {
        // a wildcard major accepts anything, whatever follows it
        return "*".to_string();
    }
    if core.split('.').any(is_wildcard) {
        // bare wildcards keep their wildcard meaning
        version.to_string()
    } else {
        // a bare version pins exactly; a bare partial behaves like `1.2.x`
        format!("={version}")
    }
}

/// Parse a concrete version, tolerating a leading `v`.
pub fn parse_version(version: &str) -> Option<Version> {
    Version::parse(strip_v(version.trim())).ok()
}

/// Whether `version` satisfies `constraint`. Unparsable input never matches.
pub fn satisfies(version: &str, constraint: &str) -> bool {
    match (parse_version(version), Range::parse(constraint)) {
        (Some(v), Ok(range)) => range.matches(&v),
        _ => false,
    }
}

/// The highest version in `versions` satisfying `constraint`.
pub fn max_satisfying<'a, I>(versions: I, constraint: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let range = Range::parse(constraint).ok()?;
    versions
        .into_iter()
        .filter_map(|raw| parse_version(raw).map(|v| (v, raw)))
        .filter(|(v, _)| range.matches(v))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, raw)| raw)
}

/// The highest version available when no constraint is given.
///
/// Stable releases win over pre-releases; a pre-release is only chosen when
/// nothing stable has been published.
pub fn max_version<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let parsed: Vec<(Version, &str)> = versions
        .into_iter()
        .filter_map(|raw| parse_version(raw).map(|v| (v, raw)))
        .collect();
    let stable = parsed
        .iter()
        .filter(|(v, _)| v.pre.is_empty())
        .max_by(|(a, _), (b, _)| a.cmp(b));
    stable
        .or_else(|| parsed.iter().max_by(|(a, _), (b, _)| a.cmp(b)))
        .map(|(_, raw)| *raw)
}

/// Select the version a constraint resolves to: the highest satisfying one,
/// or the highest available one when the constraint is empty.
pub fn select<'a, I>(versions: I, constraint: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    if constraint.trim().is_empty() {
        max_version(versions)
    } else {
        max_satisfying(versions, constraint)
    }
}
