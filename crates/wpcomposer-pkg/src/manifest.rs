//! Reading the parts of a `composer.json` that locate a WordPress install.
//!
//! ```json
//! {
//!     "name": "acme/site",
//!     "extra": {
//!         "installer-paths": {
//!             "web/core": ["type:wordpress-core"],
//!             "web/wp-content/plugins/{$name}": ["type:wordpress-plugin"]
//!         }
//!     },
//!     "config": { "vendor-dir": "lib/vendor" }
//! }
//! ```
//!
//! Only `name`, `extra.installer-paths` and `config.vendor-dir` are read; the
//! rest of the document is ignored.

use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default manifest filename.
pub const MANIFEST_FILE: &str = "composer.json";

/// Environment variable overriding [`MANIFEST_FILE`].
pub const MANIFEST_ENV: &str = "COMPOSER";

/// Package name of WordPress core itself.
pub const CORE_PACKAGE_NAME: &str = "wordpress/wordpress";

/// Installer type marking where core gets installed.
pub const CORE_INSTALLER_TYPE: &str = "type:wordpress-core";

/// Errors that can occur when reading a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to decode {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to decode {path}: document is null")]
    Null { path: PathBuf },

    #[error("{path} is not a JSON object")]
    NotAnObject { path: PathBuf },
}

/// The manifest filename in effect.
///
/// Honors the `COMPOSER` environment variable the same way the dependency
/// manager does; a blank value falls back to [`MANIFEST_FILE`].
#[must_use]
pub fn manifest_file_name() -> String {
    std::env::var(MANIFEST_ENV)
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| MANIFEST_FILE.to_string())
}

/// One `extra.installer-paths` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerPath {
    /// Install location, relative to the manifest directory.
    pub path: String,
    /// Package names and `type:` selectors installed there.
    pub selectors: Vec<String>,
}

impl InstallerPath {
    /// Whether WordPress core is installed at this path.
    #[must_use]
    pub fn installs_core(&self) -> bool {
        self.selectors
            .iter()
            .any(|s| s == CORE_INSTALLER_TYPE || s == CORE_PACKAGE_NAME)
    }
}

/// The root-locating subset of a composer manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposerManifest {
    /// Declared package name.
    pub name: Option<String>,
    /// Installer paths, in document order.
    pub installer_paths: Vec<InstallerPath>,
    /// `config.vendor-dir`, if set.
    pub vendor_dir: Option<String>,
}

impl ComposerManifest {
    /// Load a manifest from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse manifest JSON. `path` is only used for error messages.
    ///
    /// A document that is valid JSON but not an object (a bare number, say)
    /// yields an empty manifest; `null` is rejected like a parse failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid JSON or is `null`.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ManifestError> {
        let json: JsonValue = serde_json::from_str(content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        match json {
            JsonValue::Null => Err(ManifestError::Null {
                path: path.to_path_buf(),
            }),
            JsonValue::Object(_) => Ok(Self::from_json(&json)),
            _ => Ok(Self::default()),
        }
    }

    fn from_json(json: &JsonValue) -> Self {
        let name = json.get("name").and_then(JsonValue::as_str).map(String::from);

        let installer_paths = json
            .get("extra")
            .and_then(|extra| extra.get("installer-paths"))
            .and_then(JsonValue::as_object)
            .map(|paths| {
                paths
                    .iter()
                    .map(|(path, selectors)| InstallerPath {
                        path: path.clone(),
                        selectors: selectors
                            .as_array()
                            .map(|items| {
                                items
                                    .iter()
                                    .filter_map(JsonValue::as_str)
                                    .map(String::from)
                                    .collect()
                            })
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let vendor_dir = json
            .get("config")
            .and_then(|config| config.get("vendor-dir"))
            .and_then(JsonValue::as_str)
            .map(String::from);

        Self {
            name,
            installer_paths,
            vendor_dir,
        }
    }

    /// The first installer path that installs WordPress core.
    #[must_use]
    pub fn core_installer_path(&self) -> Option<&InstallerPath> {
        self.installer_paths.iter().find(|p| p.installs_core())
    }

    /// Whether this manifest describes WordPress core itself.
    #[must_use]
    pub fn is_core_package(&self) -> bool {
        self.name.as_deref() == Some(CORE_PACKAGE_NAME)
    }
}
