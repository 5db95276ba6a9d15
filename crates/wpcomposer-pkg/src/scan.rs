//! Discovery of installed plugins and themes.
//!
//! Extensions live one directory deep under `wp-content`:
//! ```text
//! wp-content/
//! ├── plugins/
//! │   ├── akismet/
//! │   │   └── akismet.php      # entry point with a metadata header
//! │   └── acme-custom/
//! │       └── acme-custom.php
//! └── themes/
//!     └── twentytwentyfour/
//!         └── functions.php
//! ```
//!
//! Scanning is read-only. Directories of extensions confirmed by the registry
//! are only deleted by [`reclaim`], since the dependency manager installs them
//! again into the same place. Patch files found in a reclaimed directory are
//! copied out first.

use crate::probe::{probe, PluginHeader, ProbeResult, SkipReason};
use crate::registry::{ExistenceChecker, RegistryCheck};
use crate::version::normalize_extension_version;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extension of candidate entry-point files.
pub const ENTRY_POINT_EXT: &str = "php";

/// Extension of patch files kept alongside an extension.
pub const PATCH_EXT: &str = "patch";

/// Directory under the manifest root that reclaimed patches are copied to.
pub const PATCH_STORE_DIR: &str = "patches";

/// The kind of extension directory being scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContribKind {
    /// `wp-content/plugins`.
    Plugin,
    /// `wp-content/themes`.
    Theme,
}

impl ContribKind {
    /// All kinds, in scan order.
    pub const ALL: [ContribKind; 2] = [ContribKind::Plugin, ContribKind::Theme];

    /// Directory holding this kind, relative to the application root.
    #[must_use]
    pub fn subdir(self) -> &'static str {
        match self {
            Self::Plugin => "wp-content/plugins",
            Self::Theme => "wp-content/themes",
        }
    }

    /// Vendor prefix used for this kind in the manifest.
    #[must_use]
    pub fn vendor(self) -> &'static str {
        match self {
            Self::Plugin => "wpackagist-plugin",
            Self::Theme => "wpackagist-theme",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plugin => "plugin",
            Self::Theme => "theme",
        }
    }
}

impl std::fmt::Display for ContribKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An installed plugin or theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContribEntry {
    /// Canonical name, taken from the `Text Domain` header.
    pub machine_name: String,
    /// Version from the `Version` header.
    pub declared_version: Option<String>,
    /// The extension's top-level directory.
    pub source_dir: PathBuf,
    /// The file the header was read from.
    pub entry_file: PathBuf,
    /// Plugin or theme.
    pub kind: ContribKind,
    /// Answer from the registry.
    pub registry: RegistryCheck,
    /// Patch files under `source_dir`, sorted.
    pub patches: Vec<PathBuf>,
}

impl ContribEntry {
    /// Whether the registry confirmed this extension can be downloaded.
    #[must_use]
    pub fn registry_confirmed(&self) -> bool {
        self.registry.exists()
    }

    /// The version to require: normalized when possible, else as declared.
    #[must_use]
    pub fn version(&self) -> Option<String> {
        self.declared_version
            .as_deref()
            .map(|raw| normalize_extension_version(raw).unwrap_or_else(|| raw.to_string()))
    }

    /// Directory name the dependency manager installs this extension under.
    #[must_use]
    pub fn install_dir(&self) -> &str {
        &self.machine_name
    }

    /// Full package name, e.g. `wpackagist-plugin/akismet`.
    #[must_use]
    pub fn package_name(&self) -> String {
        format!("{}/{}", self.kind.vendor(), self.machine_name)
    }
}

/// What happened to one candidate file.
#[derive(Debug)]
pub enum ScanOutcome {
    /// The file is an entry point; see `registry` on the entry.
    Found(ContribEntry),
    /// The file has no usable header.
    Skipped { file: PathBuf, reason: SkipReason },
    /// The file could not be read.
    Error { file: PathBuf, error: std::io::Error },
}

/// Everything a scan of one directory observed.
#[derive(Debug)]
pub struct ScanReport {
    /// Kind of directory scanned.
    pub kind: ContribKind,
    /// The scanned directory.
    pub dir: PathBuf,
    /// One outcome per candidate file, in path order.
    pub outcomes: Vec<ScanOutcome>,
}

impl ScanReport {
    fn empty(kind: ContribKind, dir: PathBuf) -> Self {
        Self {
            kind,
            dir,
            outcomes: Vec::new(),
        }
    }

    /// Every entry point found, confirmed or not.
    pub fn found(&self) -> impl Iterator<Item = &ContribEntry> {
        self.outcomes.iter().filter_map(|o| match o {
            ScanOutcome::Found(entry) => Some(entry),
            _ => None,
        })
    }

    /// Registry-confirmed entries keyed by machine name.
    ///
    /// Unconfirmed extensions are custom or private code and stay out of the
    /// mapping. Duplicate names are resolved as in [`merge`].
    #[must_use]
    pub fn entries(&self) -> BTreeMap<String, ContribEntry> {
        merge([self]).entries
    }

    /// Entry points the registry did not confirm.
    pub fn unconfirmed(&self) -> impl Iterator<Item = &ContribEntry> {
        self.found().filter(|e| !e.registry_confirmed())
    }

    /// Number of skipped candidates.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ScanOutcome::Skipped { .. }))
            .count()
    }

    /// Number of unreadable candidates.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ScanOutcome::Error { .. }))
            .count()
    }
}

/// List `*.php` files exactly one directory below `dir`, sorted.
fn candidate_files(dir: &Path) -> Vec<PathBuf> {
    let pattern = format!(
        "{}/*/*.{ENTRY_POINT_EXT}",
        glob::Pattern::escape(&dir.to_string_lossy())
    );

    match glob::glob(&pattern) {
        Ok(paths) => {
            let mut files: Vec<PathBuf> = paths
                .filter_map(Result::ok)
                .filter(|p| p.is_file())
                .collect();
            files.sort();
            files
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot list extension directory");
            Vec::new()
        }
    }
}

/// Find `*.patch` files anywhere under `dir`, sorted.
pub fn find_patches(dir: &Path) -> Vec<PathBuf> {
    let pattern = format!(
        "{}/**/*.{PATCH_EXT}",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let Ok(paths) = glob::glob(&pattern) else {
        return Vec::new();
    };
    let mut patches: Vec<PathBuf> = paths
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    patches.sort();
    patches
}

fn found_entry(
    file: &Path,
    header: PluginHeader,
    kind: ContribKind,
    checker: &dyn ExistenceChecker,
) -> ContribEntry {
    let source_dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
    let registry = checker.check(&header.name);
    debug!(
        machine_name = %header.name,
        version = %header.version,
        %registry,
        "found {kind}"
    );

    ContribEntry {
        patches: find_patches(&source_dir),
        machine_name: header.name,
        declared_version: Some(header.version),
        source_dir,
        entry_file: file.to_path_buf(),
        kind,
        registry,
    }
}

/// Scan the extensions of one kind under `app_root`.
///
/// A missing directory yields an empty report. The registry is asked about
/// every entry point found; nothing on disk is changed.
pub fn scan(app_root: &Path, kind: ContribKind, checker: &dyn ExistenceChecker) -> ScanReport {
    let dir = app_root.join(kind.subdir());
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "no {kind} directory");
        return ScanReport::empty(kind, dir);
    }

    let mut report = ScanReport::empty(kind, dir);
    for file in candidate_files(&report.dir) {
        let outcome = match probe(&file) {
            ProbeResult::Header(header) => {
                ScanOutcome::Found(found_entry(&file, header, kind, checker))
            }
            ProbeResult::Skipped(reason) => {
                debug!(file = %file.display(), %reason, "skipping candidate");
                ScanOutcome::Skipped { file, reason }
            }
            ProbeResult::Unreadable(error) => {
                warn!(file = %file.display(), %error, "cannot read candidate");
                ScanOutcome::Error { file, error }
            }
        };
        report.outcomes.push(outcome);
    }
    report
}

/// Two directories declaring the same machine name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// The shared machine name.
    pub machine_name: String,
    /// Kind of the entry that was replaced.
    pub replaced: ContribKind,
    /// Source directory of the replaced entry. It is left on disk.
    pub replaced_dir: PathBuf,
    /// Kind of the entry that was kept.
    pub kept: ContribKind,
    /// Source directory of the kept entry.
    pub kept_dir: PathBuf,
}

/// Confirmed entries from several scans.
#[derive(Debug, Clone, Default)]
pub struct MergedContrib {
    /// Entries keyed by machine name.
    pub entries: BTreeMap<String, ContribEntry>,
    /// Names declared by more than one directory.
    pub collisions: Vec<Collision>,
}

/// Whether `candidate` should replace `existing` under the same name.
///
/// Within one kind, a directory already named after the machine name sits
/// where the dependency manager installs the package, so it is kept. Otherwise
/// the later entry wins.
fn supersedes(existing: &ContribEntry, candidate: &ContribEntry) -> bool {
    if existing.kind != candidate.kind {
        return true;
    }
    let named_after = |e: &ContribEntry| {
        e.source_dir
            .file_name()
            .is_some_and(|n| n == e.machine_name.as_str())
    };
    !named_after(existing) || named_after(candidate)
}

/// Merge the confirmed entries of several reports.
///
/// On a name clash between different directories one entry is kept and the
/// clash is recorded: across kinds the later report wins, within a kind the
/// directory named after the machine name wins, else the later path. Several
/// headers in one directory count as one entry.
pub fn merge<'a>(reports: impl IntoIterator<Item = &'a ScanReport>) -> MergedContrib {
    let mut merged = MergedContrib::default();
    for entry in reports
        .into_iter()
        .flat_map(ScanReport::found)
        .filter(|e| e.registry_confirmed())
    {
        let Some(existing) = merged.entries.get(&entry.machine_name) else {
            merged
                .entries
                .insert(entry.machine_name.clone(), entry.clone());
            continue;
        };
        if existing.source_dir == entry.source_dir && existing.kind == entry.kind {
            continue;
        }

        let (kept, replaced) = if supersedes(existing, entry) {
            (entry.clone(), existing.clone())
        } else {
            (existing.clone(), entry.clone())
        };
        warn!(
            machine_name = %kept.machine_name,
            kept = %kept.source_dir.display(),
            replaced = %replaced.source_dir.display(),
            "name declared twice"
        );
        merged.collisions.push(Collision {
            machine_name: kept.machine_name.clone(),
            replaced: replaced.kind,
            replaced_dir: replaced.source_dir,
            kept: kept.kind,
            kept_dir: kept.source_dir.clone(),
        });
        merged.entries.insert(kept.machine_name.clone(), kept);
    }
    merged
}

/// How reclaiming one directory went.
#[derive(Debug)]
pub enum ReclaimStatus {
    /// The directory was deleted.
    Removed,
    /// The directory no longer existed.
    AlreadyAbsent,
    /// Patches could not be saved or deletion failed. When saving failed the
    /// directory is untouched; otherwise part of it may be left behind.
    Failed(std::io::Error),
}

/// Result of reclaiming one entry.
#[derive(Debug)]
pub struct ReclaimOutcome {
    /// The entry's machine name.
    pub machine_name: String,
    /// The directory that was targeted.
    pub dir: PathBuf,
    /// Copies of the entry's patch files made before deletion.
    pub preserved_patches: Vec<PathBuf>,
    /// What happened.
    pub status: ReclaimStatus,
}

impl ReclaimOutcome {
    /// Whether the directory is gone.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !matches!(self.status, ReclaimStatus::Failed(_))
    }
}

/// Copy an entry's patch files to `patch_store/<machine name>/`, keeping
/// their paths relative to the source directory.
fn preserve_patches(entry: &ContribEntry, patch_store: &Path) -> std::io::Result<Vec<PathBuf>> {
    let target_dir = patch_store.join(&entry.machine_name);
    let mut preserved = Vec::with_capacity(entry.patches.len());
    for patch in &entry.patches {
        let relative = match patch.strip_prefix(&entry.source_dir) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => patch.file_name().map(PathBuf::from).unwrap_or_default(),
        };
        let target = target_dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(patch, &target)?;
        debug!(from = %patch.display(), to = %target.display(), "preserved patch");
        preserved.push(target);
    }
    Ok(preserved)
}

/// Delete the source directories of registry-confirmed entries.
///
/// Patch files of each entry are first copied under `patch_store`; if that
/// fails the directory is kept. Unconfirmed entries are left alone. A failure
/// on one entry does not stop the others; each is reported in the returned
/// outcomes.
pub fn reclaim<'a>(
    entries: impl IntoIterator<Item = &'a ContribEntry>,
    patch_store: &Path,
) -> Vec<ReclaimOutcome> {
    let mut outcomes = Vec::new();
    for entry in entries {
        if !entry.registry_confirmed() {
            continue;
        }
        let dir = entry.source_dir.clone();
        let (status, preserved_patches) = if !dir.exists() {
            (ReclaimStatus::AlreadyAbsent, Vec::new())
        } else {
            match preserve_patches(entry, patch_store) {
                Ok(preserved) => (remove_source_dir(entry), preserved),
                Err(e) => {
                    warn!(
                        machine_name = %entry.machine_name,
                        dir = %dir.display(),
                        error = %e,
                        "failed to preserve patches, keeping {}",
                        entry.kind
                    );
                    (ReclaimStatus::Failed(e), Vec::new())
                }
            }
        };
        outcomes.push(ReclaimOutcome {
            machine_name: entry.machine_name.clone(),
            dir,
            preserved_patches,
            status,
        });
    }
    outcomes
}

fn remove_source_dir(entry: &ContribEntry) -> ReclaimStatus {
    let dir = &entry.source_dir;
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            info!(
                machine_name = %entry.machine_name,
                dir = %dir.display(),
                "removed {}",
                entry.kind
            );
            ReclaimStatus::Removed
        }
        Err(e) => {
            warn!(
                machine_name = %entry.machine_name,
                dir = %dir.display(),
                error = %e,
                "failed to remove {}",
                entry.kind
            );
            ReclaimStatus::Failed(e)
        }
    }
}
