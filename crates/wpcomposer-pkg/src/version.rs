//! Version normalization and constraint building for plugins and themes.
//!
//! Plugin authors write versions in a loose dotted style:
//!
//! ```text
//! 3.0
//! 3.0-alpha1
//! 3.12-beta2
//! 4.0-rc12
//! 1.0-unstable3
//! 1.x-dev
//! ```
//!
//! These are mapped onto `{major}.{minor}.0[-{stability}{n}]` so the
//! dependency manager can compare them, and then into a constraint string.

use regex::Regex;
use std::sync::OnceLock;

/// Legacy platform-branch prefix stripped before normalization.
const BRANCH_PREFIX: &str = "8.x-";

/// Suffix marking a development branch.
const DEV_SUFFIX: &str = "-dev";

/// Constraint used when no version could be determined.
pub const ANY_VERSION: &str = "*";

fn release_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(\d{1,2})\.(\d{0,2})(-(?:alpha|beta|rc|unstable)\d{1,2})?$")
            .expect("release pattern is valid")
    })
}

/// Normalize a plugin or theme version into a dependency-manager version.
///
/// Returns `None` when the version is not in a recognised format, in which
/// case callers treat the version as unknown or fall back to the raw value.
///
/// # Examples
///
/// ```
/// use wpcomposer_pkg::normalize_extension_version;
///
/// assert_eq!(normalize_extension_version("3.0-alpha1").as_deref(), Some("3.0.0-alpha1"));
/// assert_eq!(normalize_extension_version("8.6.11-dev").as_deref(), Some("8.6.x-dev"));
/// assert_eq!(normalize_extension_version("3.0.0"), None);
/// ```
#[must_use]
pub fn normalize_extension_version(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let version = match raw.strip_prefix(BRANCH_PREFIX) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => raw,
    };

    if let Some(base) = version.strip_suffix(DEV_SUFFIX) {
        return branch_alias(base);
    }

    let caps = release_pattern().captures(version)?;
    let mut normalized = format!("{}.{}.0", &caps[1], &caps[2]);
    if let Some(stability) = caps.get(3) {
        normalized.push_str(stability.as_str());
    }
    Some(normalized)
}

/// Turn the part before `-dev` into a `{prefix}.x-dev` branch alias.
fn branch_alias(base: &str) -> Option<String> {
    if !base.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if base.ends_with(".x") {
        return Some(format!("{base}{DEV_SUFFIX}"));
    }
    let prefix = match base.rsplit_once('.') {
        Some((head, _)) => head,
        None => base,
    };
    Some(format!("{prefix}.x{DEV_SUFFIX}"))
}

/// Build the constraint string written into the manifest for a version.
///
/// - no version: `*`
/// - development branches are never range-constrained
/// - `exact` keeps the version as-is
/// - otherwise a caret range is used
///
/// ```
/// use wpcomposer_pkg::version_constraint;
///
/// assert_eq!(version_constraint(None, false), "*");
/// assert_eq!(version_constraint(Some("3.0.0"), false), "^3.0.0");
/// assert_eq!(version_constraint(Some("3.0.0"), true), "3.0.0");
/// assert_eq!(version_constraint(Some("1.x-dev"), false), "1.x-dev");
/// ```
#[must_use]
pub fn version_constraint(version: Option<&str>, exact: bool) -> String {
    match version {
        None => ANY_VERSION.to_string(),
        Some(v) if v.contains(DEV_SUFFIX) || exact => v.to_string(),
        Some(v) => format!("^{v}"),
    }
}
