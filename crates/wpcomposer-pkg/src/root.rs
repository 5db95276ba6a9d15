//! Locating the manifest root and WordPress root of a site.
//!
//! Two layouts are recognised:
//!
//! ```text
//! site/                      site/
//! ├── wp-load.php            ├── composer.json     # installer-paths: web/core
//! ├── wp-includes/           └── web/
//! │   └── class-wp-query.php     └── ...
//! └── wp-content/
//! ```
//!
//! A plain install, where the WordPress directory is both roots, and a
//! Composer-managed install, where the manifest says where core lives.

use crate::manifest::{manifest_file_name, ComposerManifest, ManifestError};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Bootstrap file present in every WordPress root.
pub const BOOTSTRAP_FILE: &str = "wp-load.php";

/// Core library file confirming a WordPress root.
pub const CORE_MARKER_FILE: &str = "wp-includes/class-wp-query.php";

/// Default dependency install directory, relative to the manifest root.
pub const DEFAULT_VENDOR_DIR: &str = "vendor";

/// Conventional web-root directory names, in lookup order.
pub const COMMON_WEB_ROOTS: &[&str] = &["docroot", "web", "htdocs", "public_html"];

/// Errors that can occur while locating roots.
#[derive(Error, Debug)]
pub enum RootError {
    #[error(
        "unable to find a WordPress root directory above {}; \
         change to a valid application or specify it with --core-root",
        .start.display()
    )]
    NotFound { start: PathBuf },

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// The anchor directories of a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRoot {
    /// Directory that holds (or will hold) the manifest.
    pub manifest_root: PathBuf,
    /// WordPress root: `manifest_root` or a descendant of it.
    pub app_root: PathBuf,
    /// Directory the dependency manager installs into.
    pub vendor_dir: PathBuf,
}

impl ProjectRoot {
    /// The application root relative to the manifest root, `""` when equal.
    #[must_use]
    pub fn app_root_relative(&self) -> PathBuf {
        self.app_root
            .strip_prefix(&self.manifest_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| self.app_root.clone())
    }
}

/// Pick the directory to start searching from.
///
/// Looks for a conventional web-root subdirectory of `cwd`, falling back to
/// `cwd` itself.
#[must_use]
pub fn default_search_start(cwd: &Path) -> PathBuf {
    COMMON_WEB_ROOTS
        .iter()
        .map(|name| cwd.join(name))
        .find(|candidate| candidate.exists())
        .unwrap_or_else(|| cwd.to_path_buf())
}

/// Find the roots by searching upward from `start`.
///
/// The search runs twice: first resolving symbolic links to their targets,
/// then on the literal paths.
///
/// # Errors
///
/// Returns [`RootError::NotFound`] if no ancestor qualifies, or
/// [`RootError::Manifest`] if a candidate has an unreadable manifest.
pub fn locate(start: impl AsRef<Path>) -> Result<ProjectRoot, RootError> {
    let start = start.as_ref();
    let manifest_name = manifest_file_name();

    for follow_symlinks in [true, false] {
        let mut current = start.to_path_buf();
        loop {
            if follow_symlinks {
                current = resolve_symlink(current);
            }
            if let Some(root) = validate_candidate(&current, &manifest_name)? {
                debug!(
                    manifest_root = %root.manifest_root.display(),
                    app_root = %root.app_root.display(),
                    "located project root"
                );
                return Ok(root);
            }
            match parent_of(&current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
    }

    Err(RootError::NotFound {
        start: start.to_path_buf(),
    })
}

fn resolve_symlink(path: PathBuf) -> PathBuf {
    let is_link = std::fs::symlink_metadata(&path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false);
    if is_link {
        std::fs::canonicalize(&path).unwrap_or(path)
    } else {
        path
    }
}

/// The parent directory, or `None` at the top of the path.
fn parent_of(path: &Path) -> Option<PathBuf> {
    let parent = path.parent()?;
    if parent.as_os_str().is_empty() || parent == Path::new(".") || parent == path {
        None
    } else {
        Some(parent.to_path_buf())
    }
}

/// Check whether `path` is a WordPress root with core files on disk.
fn is_wordpress_root(path: &Path) -> bool {
    path.join(BOOTSTRAP_FILE).exists() && path.join(CORE_MARKER_FILE).exists()
}

/// Derive the application root from a core installer path key.
///
/// Returns `None` for keys that are absolute or climb out of `base` with
/// `..`; the application root must stay inside the manifest root.
fn app_root_from_installer_path(
    base: &Path,
    install_path: &str,
    is_core_package: bool,
) -> Option<PathBuf> {
    if install_path == "core" || is_core_package {
        return Some(base.to_path_buf());
    }
    let relative = install_path.strip_suffix("/core").unwrap_or(install_path);
    let relative = Path::new(relative.trim_end_matches('/'));
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    if relative.as_os_str().is_empty() {
        Some(base.to_path_buf())
    } else {
        Some(base.join(relative))
    }
}

/// Evaluate one directory as a project root.
///
/// Returns `Ok(None)` when the directory does not qualify. No state is
/// carried between candidates.
///
/// # Errors
///
/// Returns an error if the directory has a manifest that cannot be decoded.
pub fn validate_candidate(
    path: &Path,
    manifest_name: &str,
) -> Result<Option<ProjectRoot>, ManifestError> {
    if path.as_os_str().is_empty() || !path.is_dir() {
        return Ok(None);
    }

    let mut roots = is_wordpress_root(path).then(|| (path.to_path_buf(), path.to_path_buf()));

    let manifest_path = path.join(manifest_name);
    let manifest = if manifest_path.exists() {
        Some(ComposerManifest::from_path(&manifest_path)?)
    } else {
        None
    };

    if let Some(manifest) = &manifest {
        if let Some(core_path) = manifest.core_installer_path() {
            match app_root_from_installer_path(path, &core_path.path, manifest.is_core_package()) {
                Some(app_root) => roots = Some((path.to_path_buf(), app_root)),
                None => warn!(
                    manifest = %manifest_path.display(),
                    key = %core_path.path,
                    "ignoring core installer path outside the manifest root"
                ),
            }
        }
    }

    let Some((manifest_root, app_root)) = roots else {
        return Ok(None);
    };

    let vendor_dir = match manifest.as_ref().and_then(|m| m.vendor_dir.as_deref()) {
        Some(dir) => manifest_root.join(dir),
        None => manifest_root.join(DEFAULT_VENDOR_DIR),
    };

    Ok(Some(ProjectRoot {
        manifest_root,
        app_root,
        vendor_dir,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MANIFEST: &str = "composer.json";

    fn make_wordpress(dir: &Path) {
        fs::create_dir_all(dir.join("wp-includes")).unwrap();
        fs::write(dir.join(BOOTSTRAP_FILE), "<?php").unwrap();
        fs::write(dir.join(CORE_MARKER_FILE), "<?php").unwrap();
    }

    #[test]
    fn plain_install_is_both_roots() {
        let tmp = TempDir::new().unwrap();
        make_wordpress(tmp.path());

        let root = validate_candidate(tmp.path(), MANIFEST).unwrap().unwrap();
        assert_eq!(root.manifest_root, tmp.path());
        assert_eq!(root.app_root, tmp.path());
        assert_eq!(root.vendor_dir, tmp.path().join("vendor"));
        assert_eq!(root.app_root_relative(), PathBuf::new());
    }

    #[test]
    fn bootstrap_without_marker_does_not_qualify() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(BOOTSTRAP_FILE), "<?php").unwrap();
        assert!(validate_candidate(tmp.path(), MANIFEST).unwrap().is_none());
    }

    #[test]
    fn installer_path_sets_app_root() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(MANIFEST),
            r#"{"extra":{"installer-paths":{"web/core":["type:wordpress-core"]}}}"#,
        )
        .unwrap();

        let root = validate_candidate(tmp.path(), MANIFEST).unwrap().unwrap();
        assert_eq!(root.manifest_root, tmp.path());
        assert_eq!(root.app_root, tmp.path().join("web"));
        assert_eq!(root.vendor_dir, tmp.path().join("vendor"));
        assert_eq!(root.app_root_relative(), PathBuf::from("web"));
    }

    #[test]
    fn escaping_installer_paths_do_not_qualify() {
        for key in ["/var/www/core", "../elsewhere/core", "web/../../core"] {
            let tmp = TempDir::new().unwrap();
            fs::write(
                tmp.path().join(MANIFEST),
                format!(r#"{{"extra":{{"installer-paths":{{"{key}":["type:wordpress-core"]}}}}}}"#),
            )
            .unwrap();
            assert!(
                validate_candidate(tmp.path(), MANIFEST).unwrap().is_none(),
                "{key} should be rejected"
            );
        }
    }

    #[test]
    fn escaping_installer_path_falls_back_to_core_files() {
        let tmp = TempDir::new().unwrap();
        make_wordpress(tmp.path());
        fs::write(
            tmp.path().join(MANIFEST),
            r#"{"extra":{"installer-paths":{"../elsewhere/core":["type:wordpress-core"]}}}"#,
        )
        .unwrap();

        let root = validate_candidate(tmp.path(), MANIFEST).unwrap().unwrap();
        assert_eq!(root.app_root, tmp.path());
        assert!(root.app_root.starts_with(&root.manifest_root));
    }

    #[test]
    fn core_key_means_same_root() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(MANIFEST),
            r#"{"extra":{"installer-paths":{"core":["type:wordpress-core"]}}}"#,
        )
        .unwrap();

        let root = validate_candidate(tmp.path(), MANIFEST).unwrap().unwrap();
        assert_eq!(root.app_root, tmp.path());
    }

    #[test]
    fn core_package_manifest_means_same_root() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(MANIFEST),
            concat!(
                r#"{"name":"wordpress/wordpress","#,
                r#""extra":{"installer-paths":{"wp/core":["wordpress/wordpress"]}}}"#,
            ),
        )
        .unwrap();

        let root = validate_candidate(tmp.path(), MANIFEST).unwrap().unwrap();
        assert_eq!(root.app_root, tmp.path());
    }

    #[test]
    fn vendor_dir_overrides_install_dir() {
        let tmp = TempDir::new().unwrap();
        make_wordpress(tmp.path());
        fs::write(tmp.path().join(MANIFEST), r#"{"config":{"vendor-dir":"lib/deps"}}"#).unwrap();

        let root = validate_candidate(tmp.path(), MANIFEST).unwrap().unwrap();
        assert_eq!(root.vendor_dir, tmp.path().join("lib/deps"));
    }

    #[test]
    fn manifest_without_core_path_does_not_qualify() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(MANIFEST), r#"{"name":"acme/lib"}"#).unwrap();
        assert!(validate_candidate(tmp.path(), MANIFEST).unwrap().is_none());
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        let tmp = TempDir::new().unwrap();
        make_wordpress(tmp.path());
        fs::write(tmp.path().join(MANIFEST), "{ nope").unwrap();
        assert!(validate_candidate(tmp.path(), MANIFEST).is_err());
    }

    #[test]
    fn custom_manifest_name() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("site.json"),
            r#"{"extra":{"installer-paths":{"public/core":["type:wordpress-core"]}}}"#,
        )
        .unwrap();

        assert!(validate_candidate(tmp.path(), MANIFEST).unwrap().is_none());
        let root = validate_candidate(tmp.path(), "site.json").unwrap().unwrap();
        assert_eq!(root.app_root, tmp.path().join("public"));
    }

    #[test]
    fn locate_from_subdirectory() {
        let tmp = TempDir::new().unwrap();
        make_wordpress(tmp.path());
        let nested = tmp.path().join("wp-content/plugins/akismet");
        fs::create_dir_all(&nested).unwrap();

        let root = locate(&nested).unwrap();
        assert_eq!(
            fs::canonicalize(&root.app_root).unwrap(),
            fs::canonicalize(tmp.path()).unwrap()
        );
    }

    #[test]
    fn locate_reports_malformed_manifest_on_the_way_up() {
        let tmp = TempDir::new().unwrap();
        make_wordpress(tmp.path());
        let nested = tmp.path().join("wp-content");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join(MANIFEST), "[").unwrap();

        assert!(matches!(locate(&nested), Err(RootError::Manifest(_))));
    }

    #[test]
    fn locate_not_found() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();

        match locate(&nested) {
            Err(RootError::NotFound { start }) => assert_eq!(start, nested),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn locate_follows_symlinked_start() {
        let tmp = TempDir::new().unwrap();
        let real = tmp.path().join("real");
        make_wordpress(&real);
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let root = locate(&link).unwrap();
        assert_eq!(root.app_root, fs::canonicalize(&real).unwrap());
    }

    #[test]
    fn parent_of_stops_at_top() {
        assert_eq!(parent_of(Path::new("/")), None);
        assert_eq!(parent_of(Path::new("site")), None);
        assert_eq!(parent_of(Path::new("/srv/site")), Some(PathBuf::from("/srv")));
    }

    #[test]
    fn default_start_prefers_web_root_dirs() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(default_search_start(tmp.path()), tmp.path());

        fs::create_dir(tmp.path().join("htdocs")).unwrap();
        fs::create_dir(tmp.path().join("web")).unwrap();
        assert_eq!(default_search_start(tmp.path()), tmp.path().join("web"));
    }
}
