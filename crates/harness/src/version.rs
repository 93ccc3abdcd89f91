//! Version extraction and constraint evaluation.
//!
//! Product versions arrive as free-form environment configuration of the
//! shape `channel/version[/headVersion]` (`head/2.13`, `alpha/2.13.1-rc1`,
//! `latest/devel/2.12`). [`VersionSpec`] splits that composite positionally;
//! [`satisfies`] normalizes the version token and checks it against a range
//! expression such as `>=2.13` or `<2.14`.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

fn shape_pattern() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| Regex::new(r"^\d+\.\d+").expect("static version pattern"))
}

/// A composite version string split into its positional segments.
///
/// The split is strictly positional and never inspects segment content:
/// `latest/devel/2.12` yields channel `latest`, version `devel`,
/// head version `2.12`. Segments beyond the third are ignored. Empty input
/// yields an empty channel and no further segments; callers validate
/// non-emptiness where they require it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpec {
    /// First segment, always present (possibly empty).
    pub channel: String,
    /// Second segment, if present.
    pub version: Option<String>,
    /// Third segment, if present.
    pub head_version: Option<String>,
}

impl VersionSpec {
    /// Split a raw `channel/version[/headVersion]` string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.split('/');
        let channel = parts.next().unwrap_or_default().to_string();
        let version = parts.next().map(ToString::to_string);
        let head_version = parts.next().map(ToString::to_string);
        Self {
            channel,
            version,
            head_version,
        }
    }

    /// The last `/`-delimited segment of the composite — the token that
    /// carries the comparable version in every channel layout seen in the
    /// wild.
    #[must_use]
    pub fn version_token(&self) -> &str {
        self.head_version
            .as_deref()
            .or(self.version.as_deref())
            .unwrap_or(&self.channel)
    }
}

/// A parsed three-component version. Pre-release suffixes are stripped
/// before parsing, so ordering is plain numeric tuple ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    /// Parse an already-normalized `MAJOR.MINOR.PATCH` string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for anything other than exactly three
    /// numeric dot-separated components.
    pub fn parse(s: &str) -> Result<Self> {
        let parse_err = || Error::Parse {
            what: "version",
            value: s.to_string(),
        };

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(parse_err());
        }

        let major = parts[0].parse::<u64>().map_err(|_| parse_err())?;
        let minor = parts[1].parse::<u64>().map_err(|_| parse_err())?;
        let patch = parts[2].parse::<u64>().map_err(|_| parse_err())?;

        Ok(Self {
            major,
            minor,
            patch,
        })
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Normalize a free-form version token into `MAJOR.MINOR.PATCH` form:
/// trim whitespace, require a `MAJOR.MINOR` prefix, strip everything from
/// the first `-` (pre-release/build metadata), and coerce `MAJOR.MINOR`
/// to `MAJOR.MINOR.0`.
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] when the token does not start with
/// `digits '.' digits`.
pub fn normalize(version: &str) -> Result<String> {
    let trimmed = version.trim();

    if !shape_pattern().is_match(trimmed) {
        return Err(Error::InvalidFormat {
            value: version.to_string(),
        });
    }

    let stripped = match trimmed.find('-') {
        Some(idx) => &trimmed[..idx],
        None => trimmed,
    };

    let mut normalized = stripped.to_string();
    if normalized.matches('.').count() == 1 {
        normalized.push_str(".0");
    }

    Ok(normalized)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, Copy)]
struct Comparator {
    op: Op,
    version: Version,
}

impl Comparator {
    fn matches(self, candidate: Version) -> bool {
        match self.op {
            Op::Eq => candidate == self.version,
            Op::Ne => candidate != self.version,
            Op::Gt => candidate > self.version,
            Op::Ge => candidate >= self.version,
            Op::Lt => candidate < self.version,
            Op::Le => candidate <= self.version,
        }
    }
}

/// A range predicate over versions: one or more comma-separated comparators,
/// all of which must hold (`>=2.13, <2.14`). A bare version means equality.
#[derive(Debug, Clone)]
pub struct Constraint {
    comparators: Vec<Comparator>,
}

impl Constraint {
    /// Parse a constraint expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for an empty expression or an unknown
    /// operator, and [`Error::InvalidFormat`]/[`Error::Parse`] for a
    /// malformed version on either side of one.
    pub fn parse(expr: &str) -> Result<Self> {
        let parse_err = || Error::Parse {
            what: "constraint",
            value: expr.to_string(),
        };

        let mut comparators = Vec::new();
        for part in expr.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(parse_err());
            }

            let (op, rest) = if let Some(rest) = part.strip_prefix(">=") {
                (Op::Ge, rest)
            } else if let Some(rest) = part.strip_prefix("<=") {
                (Op::Le, rest)
            } else if let Some(rest) = part.strip_prefix("!=") {
                (Op::Ne, rest)
            } else if let Some(rest) = part.strip_prefix('>') {
                (Op::Gt, rest)
            } else if let Some(rest) = part.strip_prefix('<') {
                (Op::Lt, rest)
            } else if let Some(rest) = part.strip_prefix('=') {
                (Op::Eq, rest)
            } else {
                (Op::Eq, part)
            };

            let version = Version::parse(&normalize(rest)?)?;
            comparators.push(Comparator { op, version });
        }

        Ok(Self { comparators })
    }

    /// Whether the candidate satisfies every comparator.
    #[must_use]
    pub fn matches(&self, candidate: Version) -> bool {
        self.comparators.iter().all(|c| c.matches(candidate))
    }
}

/// Normalize `version` and evaluate it against `constraint`.
///
/// Pre-release metadata never affects the comparison: `2.13.0-rc1` satisfies
/// `>=2.13` exactly as `2.13.0` does, and `2.14.0-alpha1` reads as `2.14.0`,
/// which does not satisfy `<2.14`.
///
/// # Errors
///
/// Malformed input propagates as [`Error::InvalidFormat`] or
/// [`Error::Parse`]; it is never silently treated as "does not satisfy".
pub fn satisfies(version: &str, constraint: &str) -> Result<bool> {
    let candidate = Version::parse(&normalize(version)?)?;
    let constraint = Constraint::parse(constraint)?;
    Ok(constraint.matches(candidate))
}
