//! Converting WordPress installs to Composer-managed projects.
//!
//! This crate provides:
//! - Locating the manifest root and WordPress root of a site
//! - Reading the installed WordPress core version
//! - Discovering installed plugins and themes from their file headers
//! - Checking extensions against the public plugin directory
//! - Normalizing extension versions into dependency constraints
//! - Reclaiming directories the dependency manager will re-install

mod core_version;
mod manifest;
mod migrate;
mod probe;
mod registry;
mod requirements;
mod root;
mod scan;
mod version;

pub use core_version::{
    extract_declared_version, resolve as resolve_core_version, CoreVersion, CoreVersionError,
    VERSION_FILE,
};
pub use manifest::{
    manifest_file_name, ComposerManifest, InstallerPath, ManifestError, CORE_INSTALLER_TYPE,
    CORE_PACKAGE_NAME, MANIFEST_ENV, MANIFEST_FILE,
};
pub use migrate::{MigrateError, Migration, MigrationPlan};
pub use probe::{parse_header, probe, PluginHeader, ProbeResult, SkipReason, HEADER_READ_LIMIT};
pub use registry::{
    interpret_response, ExistenceChecker, FixedRegistry, HttpRegistry, RegistryCheck,
    RegistryConfig, RegistryError, DEFAULT_REGISTRY_URL, REGISTRY_TIMEOUT, REGISTRY_URL_ENV,
};
pub use requirements::{RequirementSet, CORE_PACKAGE};
pub use root::{
    default_search_start, locate, validate_candidate, ProjectRoot, RootError, BOOTSTRAP_FILE,
    COMMON_WEB_ROOTS, CORE_MARKER_FILE, DEFAULT_VENDOR_DIR,
};
pub use scan::{
    find_patches, merge, reclaim, scan, Collision, ContribEntry, ContribKind, MergedContrib,
    ReclaimOutcome, ReclaimStatus, ScanOutcome, ScanReport, PATCH_STORE_DIR,
};
pub use version::{normalize_extension_version, version_constraint, ANY_VERSION};
