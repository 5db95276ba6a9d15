//! Detecting the installed WordPress core version.
//!
//! Core declares its version in `wp-includes/version.php`:
//!
//! ```php
//! $wp_version = '6.4.3';
//! ```

use regex::Regex;
use semver::Version;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Version declaration file, relative to the application root.
pub const VERSION_FILE: &str = "wp-includes/version.php";

/// Errors that can occur while resolving the core version.
#[derive(Error, Debug)]
pub enum CoreVersionError {
    #[error("unable to determine WordPress core version: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    #[error("WordPress core version {raw} is invalid")]
    Invalid { raw: String },
}

/// A validated WordPress core version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreVersion {
    /// The version exactly as declared.
    pub raw: String,
    /// The declared version as a semantic version.
    pub normalized: Version,
}

impl CoreVersion {
    /// Validate a version string.
    ///
    /// Accepts what the dependency manager accepts for a release: one to four
    /// numeric components, optionally followed by a stability suffix
    /// (`alpha`, `beta`, `RC`, `patch`, with an optional number) or `-dev`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreVersionError::Invalid`] when the version does not parse.
    pub fn parse(raw: &str) -> Result<Self, CoreVersionError> {
        let invalid = || CoreVersionError::Invalid {
            raw: raw.to_string(),
        };
        let trimmed = raw.trim();
        let caps = version_grammar().captures(trimmed).ok_or_else(invalid)?;

        let mut numbers = caps[1].split('.').map(|n| n.parse::<u64>().map_err(|_| invalid()));
        let mut component = || numbers.next().unwrap_or(Ok(0));
        let (major, minor, patch) = (component()?, component()?, component()?);
        let mut text = format!("{major}.{minor}.{patch}");

        let mut pre = Vec::new();
        if let Some(stability) = caps.get(2) {
            let stability = match stability.as_str().to_ascii_lowercase().as_str() {
                "a" | "alpha" => Some("alpha"),
                "b" | "beta" => Some("beta"),
                "rc" => Some("rc"),
                "pl" | "p" | "patch" => Some("patch"),
                _ => None,
            };
            if let Some(stability) = stability {
                pre.push(stability.to_string());
                let numbers = caps.get(3).map_or("", |n| n.as_str());
                for number in numbers.split(['.', '-']).filter(|n| !n.is_empty()) {
                    let number = number.parse::<u64>().map_err(|_| invalid())?;
                    pre.push(number.to_string());
                }
            }
        }
        if caps.get(4).is_some() {
            pre.push("dev".to_string());
        }
        if !pre.is_empty() {
            text.push('-');
            text.push_str(&pre.join("."));
        }

        let normalized = Version::parse(&text).map_err(|_| invalid())?;
        Ok(Self {
            raw: trimmed.to_string(),
            normalized,
        })
    }
}

impl std::fmt::Display for CoreVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn version_grammar() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)^v?(\d{1,5}(?:\.\d+){0,3})",
            r"(?:[._-]?(stable|beta|b|rc|alpha|a|patch|pl|p)((?:[.-]?\d+)*))?",
            r"([.-]?dev)?$",
        ))
        .expect("version grammar is valid")
    })
}

fn declaration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?m)^\s*\$wp_version\s*=\s*['"]([^'"]*)['"]\s*;"#)
            .expect("declaration pattern is valid")
    })
}

/// Extract the declared `$wp_version` from version file contents.
#[must_use]
pub fn extract_declared_version(content: &str) -> Option<String> {
    declaration_pattern()
        .captures(content)
        .map(|caps| caps[1].trim().to_string())
        .filter(|version| !version.is_empty())
}

/// Resolve the core version of the WordPress install at `app_root`.
///
/// # Errors
///
/// Returns [`CoreVersionError::Unavailable`] if the version file is missing or
/// declares no version, and [`CoreVersionError::Invalid`] if the declared
/// version does not parse.
pub fn resolve(app_root: &Path) -> Result<CoreVersion, CoreVersionError> {
    let path = app_root.join(VERSION_FILE);
    let content = std::fs::read_to_string(&path).map_err(|e| CoreVersionError::Unavailable {
        reason: format!("cannot read {}: {e}", path.display()),
        path: path.clone(),
    })?;

    let raw = extract_declared_version(&content).ok_or_else(|| CoreVersionError::Unavailable {
        reason: format!("no $wp_version declared in {}", path.display()),
        path: path.clone(),
    })?;

    CoreVersion::parse(&raw)
}
