//! The `require` section produced for a converted project.

use crate::core_version::CoreVersion;
use crate::manifest::ManifestError;
use crate::scan::MergedContrib;
use crate::version::{version_constraint, ANY_VERSION};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::path::Path;

/// Package that provides WordPress core to the dependency manager.
pub const CORE_PACKAGE: &str = "pantheon-systems/wordpress-composer";

/// Package requirements, keyed by package name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RequirementSet {
    requirements: BTreeMap<String, String>,
}

impl RequirementSet {
    /// Build requirements for core plus every merged extension.
    ///
    /// `exact` pins versions instead of using caret ranges. Entries without a
    /// declared version are required as `*`.
    #[must_use]
    pub fn build(core: Option<&CoreVersion>, contrib: &MergedContrib, exact: bool) -> Self {
        let mut set = Self::default();
        if let Some(core) = core {
            set.insert(CORE_PACKAGE, version_constraint(Some(&core.raw), exact));
        }
        for entry in contrib.entries.values() {
            let version = entry.version();
            set.insert(entry.package_name(), version_constraint(version.as_deref(), exact));
        }
        set
    }

    /// Add or replace a requirement.
    pub fn insert(&mut self, package: impl Into<String>, constraint: impl Into<String>) {
        self.requirements.insert(package.into(), constraint.into());
    }

    /// Constraint for a package, if required.
    #[must_use]
    pub fn get(&self, package: &str) -> Option<&str> {
        self.requirements.get(package).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    /// Iterate over `(package, constraint)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.requirements.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Packages required without any version constraint.
    pub fn unconstrained(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|(_, constraint)| *constraint == ANY_VERSION)
            .map(|(package, _)| package)
    }

    /// Merge these requirements into the `require` object of a manifest.
    ///
    /// A missing file is created. Other keys of the document keep their order;
    /// requirements already present for the same packages are
    /// replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the existing file cannot be read or parsed, is not
    /// a JSON object, or the result cannot be written.
    pub fn write_to_manifest(&self, path: &Path) -> Result<(), ManifestError> {
        let mut document = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::from_str::<JsonValue>(&content).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            JsonValue::Object(Map::new())
        };

        let JsonValue::Object(root) = &mut document else {
            return Err(ManifestError::NotAnObject {
                path: path.to_path_buf(),
            });
        };
        let require = root
            .entry("require")
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !require.is_object() {
            *require = JsonValue::Object(Map::new());
        }
        if let JsonValue::Object(require) = require {
            for (package, constraint) in self.iter() {
                require.insert(package.to_string(), JsonValue::String(constraint.to_string()));
            }
        }

        let mut content =
            serde_json::to_string_pretty(&document).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        content.push('\n');
        std::fs::write(path, content).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
