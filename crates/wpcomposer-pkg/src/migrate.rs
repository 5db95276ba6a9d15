//! Planning and applying the conversion of one WordPress install.
//!
//! A [`Migration`] locates the project, resolves the core version, scans
//! plugins and themes and derives the requirements. Planning never touches the
//! disk; [`MigrationPlan::reclaim`] is the only destructive step.

use crate::core_version::{self, CoreVersion, CoreVersionError};
use crate::registry::ExistenceChecker;
use crate::requirements::RequirementSet;
use crate::root::{self, ProjectRoot, RootError};
use crate::scan::{self, ContribKind, MergedContrib, ReclaimOutcome, ScanReport, PATCH_STORE_DIR};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that abort a migration.
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error(transparent)]
    Root(#[from] RootError),

    #[error(transparent)]
    CoreVersion(#[from] CoreVersionError),
}

/// Builder for a migration run.
pub struct Migration<'a> {
    checker: &'a dyn ExistenceChecker,
    exact_versions: bool,
    core_version: Option<String>,
}

impl<'a> Migration<'a> {
    /// Create a migration that checks extensions against `checker`.
    pub fn new(checker: &'a dyn ExistenceChecker) -> Self {
        Self {
            checker,
            exact_versions: false,
            core_version: None,
        }
    }

    /// Pin exact versions instead of caret ranges.
    #[must_use]
    pub fn with_exact_versions(mut self, exact: bool) -> Self {
        self.exact_versions = exact;
        self
    }

    /// Core version to use when the install does not declare one.
    #[must_use]
    pub fn with_core_version(mut self, version: Option<String>) -> Self {
        self.core_version = version;
        self
    }

    /// Work out everything the conversion needs without modifying anything.
    ///
    /// # Errors
    ///
    /// Fails if no project root is found, a manifest is malformed, or the
    /// core version is invalid or unavailable with no fallback given.
    pub fn plan(&self, start: &Path) -> Result<MigrationPlan, MigrateError> {
        let root = root::locate(start)?;
        info!(app_root = %root.app_root.display(), "found WordPress install");

        let core_version = self.resolve_core_version(&root)?;
        info!(version = %core_version, "WordPress core version");

        let reports: Vec<ScanReport> = ContribKind::ALL
            .iter()
            .map(|&kind| scan::scan(&root.app_root, kind, self.checker))
            .collect();
        let merged = scan::merge(&reports);
        let requirements = RequirementSet::build(Some(&core_version), &merged, self.exact_versions);

        Ok(MigrationPlan {
            root,
            core_version,
            reports,
            merged,
            requirements,
        })
    }

    fn resolve_core_version(&self, root: &ProjectRoot) -> Result<CoreVersion, CoreVersionError> {
        match (core_version::resolve(&root.app_root), self.core_version.as_deref()) {
            (Err(CoreVersionError::Unavailable { reason, .. }), Some(fallback)) => {
                debug!(%reason, "using supplied core version");
                CoreVersion::parse(fallback)
            }
            (result, _) => result,
        }
    }
}

/// The outcome of planning a migration.
#[derive(Debug)]
pub struct MigrationPlan {
    /// Where the project lives.
    pub root: ProjectRoot,
    /// Installed core version.
    pub core_version: CoreVersion,
    /// One report per extension kind.
    pub reports: Vec<ScanReport>,
    /// Confirmed extensions across all kinds.
    pub merged: MergedContrib,
    /// Requirements for the new manifest.
    pub requirements: RequirementSet,
}

impl MigrationPlan {
    /// Delete the directories of every confirmed extension, saving their
    /// patch files under [`PATCH_STORE_DIR`] in the manifest root.
    pub fn reclaim(&self) -> Vec<ReclaimOutcome> {
        self.reclaim_into(&self.root.manifest_root.join(PATCH_STORE_DIR))
    }

    /// Like [`reclaim`](Self::reclaim), saving patch files under
    /// `patch_store`.
    pub fn reclaim_into(&self, patch_store: &Path) -> Vec<ReclaimOutcome> {
        scan::reclaim(self.merged.entries.values(), patch_store)
    }
}
