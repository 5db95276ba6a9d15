//! Header parsing for plugin and theme entry-point files.
//!
//! WordPress reads plugin metadata from a comment block at the top of the
//! main file:
//!
//! ```text
//! <?php
//! /**
//!  * Plugin Name: Sample Plugin
//!  * Version: 3.0.0
//!  * Text Domain: sample-plugin
//!  */
//! ```
//!
//! The probe mirrors that lookup: only the first 8 KiB are read and each field
//! is matched on its own line, ignoring leading comment decoration.

use regex::Regex;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::OnceLock;

/// Number of bytes read from the top of a candidate file.
pub const HEADER_READ_LIMIT: u64 = 8 * 1024;

/// Header field carrying the declared version.
pub const VERSION_FIELD: &str = "Version";

/// Header field carrying the canonical machine name.
pub const TEXT_DOMAIN_FIELD: &str = "Text Domain";

/// Metadata declared in an entry-point header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginHeader {
    /// The trimmed `Text Domain` value.
    pub name: String,
    /// The trimmed `Version` value.
    pub version: String,
}

/// Why a readable file was not treated as an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No non-empty `Version` header.
    MissingVersion,
    /// No non-empty `Text Domain` header.
    MissingTextDomain,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingVersion => write!(f, "no `{VERSION_FIELD}` header"),
            Self::MissingTextDomain => write!(f, "no `{TEXT_DOMAIN_FIELD}` header"),
        }
    }
}

/// Result of probing one file.
#[derive(Debug)]
pub enum ProbeResult {
    /// The file declares both a version and a text domain.
    Header(PluginHeader),
    /// The file was read but is not an entry point.
    Skipped(SkipReason),
    /// The file could not be read.
    Unreadable(io::Error),
}

fn field_pattern(field: &str) -> Regex {
    let pattern = format!(r"(?mi)^[ \t/*#@]*{}:(.*)$", regex::escape(field));
    Regex::new(&pattern).expect("header pattern is valid")
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| field_pattern(VERSION_FIELD))
}

fn text_domain_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| field_pattern(TEXT_DOMAIN_FIELD))
}

/// Find the first non-empty value of a header field.
fn header_value(pattern: &Regex, data: &str) -> Option<String> {
    let value = pattern.captures(data)?.get(1)?.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Read the first [`HEADER_READ_LIMIT`] bytes of a file.
///
/// Carriage returns are turned into newlines so files saved with classic Mac
/// line endings still match line-anchored patterns.
fn read_header_block(path: &Path) -> io::Result<String> {
    let mut buf = Vec::new();
    File::open(path)?.take(HEADER_READ_LIMIT).read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).replace('\r', "\n"))
}

/// Parse header fields out of already-read file contents.
pub fn parse_header(data: &str) -> Result<PluginHeader, SkipReason> {
    let version = header_value(version_pattern(), data).ok_or(SkipReason::MissingVersion)?;
    let name = header_value(text_domain_pattern(), data).ok_or(SkipReason::MissingTextDomain)?;
    Ok(PluginHeader { name, version })
}

/// Probe a candidate entry-point file.
///
/// Never fails: unreadable files are reported as [`ProbeResult::Unreadable`]
/// so a scan can carry on with the next candidate.
pub fn probe(path: &Path) -> ProbeResult {
    let data = match read_header_block(path) {
        Ok(data) => data,
        Err(e) => return ProbeResult::Unreadable(e),
    };
    match parse_header(&data) {
        Ok(header) => ProbeResult::Header(header),
        Err(reason) => ProbeResult::Skipped(reason),
    }
}
