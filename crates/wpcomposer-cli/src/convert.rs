//! Implementation of the `wpcomposer convert` command.

use crate::inspect::{inspect_with, InspectOptions, InspectReport};
use anyhow::{Context, Result};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use wpcomposer_pkg::{
    ExistenceChecker, HttpRegistry, ReclaimOutcome, ReclaimStatus, PATCH_STORE_DIR,
};

/// Options for the convert command.
#[derive(Debug, Default)]
pub struct ConvertOptions {
    /// How to plan the migration.
    pub plan: InspectOptions,
    /// Perform a dry run without writing or deleting anything.
    pub dry_run: bool,
}

/// Result of a conversion.
#[derive(Debug)]
pub struct ConvertResult {
    /// What was planned.
    pub report: InspectReport,
    /// Manifest the requirements were written to.
    pub manifest_path: PathBuf,
    /// Per-extension deletion results; empty on a dry run.
    pub reclaimed: Vec<ReclaimOutcome>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

/// Convert the site against the live plugin directory.
pub fn convert(options: &ConvertOptions) -> Result<ConvertResult> {
    let registry = HttpRegistry::new().context("Failed to create registry client")?;
    convert_with(options, &registry)
}

/// Convert the site using the given registry checker.
///
/// The manifest is written before any directory is removed, so an aborted
/// run never loses an extension without recording its requirement. Patch
/// files of removed extensions are saved next to the manifest.
pub fn convert_with(
    options: &ConvertOptions,
    checker: &dyn ExistenceChecker,
) -> Result<ConvertResult> {
    let report = inspect_with(&options.plan, checker)?;
    let manifest_path = report.manifest_path.clone();

    let reclaimed = if options.dry_run {
        Vec::new()
    } else {
        report
            .plan
            .requirements
            .write_to_manifest(&manifest_path)
            .context("Failed to write manifest")?;
        info!(path = %manifest_path.display(), "wrote requirements");
        let manifest_dir = manifest_path.parent().unwrap_or(&manifest_path);
        report.plan.reclaim_into(&manifest_dir.join(PATCH_STORE_DIR))
    };

    Ok(ConvertResult {
        report,
        manifest_path,
        reclaimed,
        dry_run: options.dry_run,
    })
}

fn status_label(status: &ReclaimStatus) -> String {
    match status {
        ReclaimStatus::Removed => "removed".to_string(),
        ReclaimStatus::AlreadyAbsent => "already absent".to_string(),
        ReclaimStatus::Failed(e) => format!("failed: {e}"),
    }
}

impl ConvertResult {
    /// Number of directories that could not be removed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.reclaimed.iter().filter(|o| !o.succeeded()).count()
    }

    /// Print the result as pretty JSON.
    pub fn print_json(&self) -> Result<()> {
        let mut document = self.report.to_json();
        let reclaimed: Vec<_> = self
            .reclaimed
            .iter()
            .map(|o| {
                json!({
                    "name": o.machine_name,
                    "dir": o.dir,
                    "status": status_label(&o.status),
                    "preserved_patches": o.preserved_patches,
                })
            })
            .collect();
        document["manifest"] = json!(self.manifest_path);
        document["dry_run"] = json!(self.dry_run);
        document["reclaimed"] = json!(reclaimed);

        let output =
            serde_json::to_string_pretty(&document).context("Failed to serialize result")?;
        println!("{output}");
        Ok(())
    }

    /// Print a human-readable summary.
    pub fn print_summary(&self) {
        self.report.print_summary();

        if self.dry_run {
            println!(
                "Dry run: {} was not written and nothing was removed.",
                self.manifest_path.display()
            );
            return;
        }

        println!("Wrote requirements to {}", self.manifest_path.display());
        if !self.reclaimed.is_empty() {
            println!("Removed (will be re-installed by Composer):");
            for outcome in &self.reclaimed {
                println!("  - {} [{}]", outcome.dir.display(), status_label(&outcome.status));
                for patch in &outcome.preserved_patches {
                    println!("    patch saved to {}", patch.display());
                }
            }
        }
        if self.failed_count() > 0 {
            println!(
                "Warning: {} director(ies) could not be fully removed; \
                 delete them by hand before running composer install.",
                self.failed_count()
            );
        }
        println!("Run `composer update` to install dependencies.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;
    use wpcomposer_pkg::FixedRegistry;

    fn site(root: &Path) {
        fs::create_dir_all(root.join("wp-includes")).unwrap();
        fs::write(root.join("wp-load.php"), "<?php\n").unwrap();
        fs::write(root.join("wp-includes/class-wp-query.php"), "<?php\n").unwrap();
        fs::write(
            root.join("wp-includes/version.php"),
            "<?php\n$wp_version = '6.4.3';\n",
        )
        .unwrap();

        let theme = root.join("wp-content/themes/twentytwentyfour");
        fs::create_dir_all(&theme).unwrap();
        fs::write(
            theme.join("functions.php"),
            "<?php\n/**\n * Version: 1.0\n * Text Domain: twentytwentyfour\n */\n",
        )
        .unwrap();
    }

    fn options(root: &Path, dry_run: bool) -> ConvertOptions {
        ConvertOptions {
            plan: InspectOptions {
                core_root: Some(root.to_path_buf()),
                ..InspectOptions::default()
            },
            dry_run,
        }
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let tmp = TempDir::new().unwrap();
        site(tmp.path());

        let registry = FixedRegistry::with_known(["twentytwentyfour"]);
        let result = convert_with(&options(tmp.path(), true), &registry).unwrap();

        assert!(result.reclaimed.is_empty());
        assert!(!result.manifest_path.exists());
        assert!(tmp.path().join("wp-content/themes/twentytwentyfour").exists());
    }

    #[test]
    fn test_convert_writes_manifest_and_reclaims() {
        let tmp = TempDir::new().unwrap();
        site(tmp.path());

        let registry = FixedRegistry::with_known(["twentytwentyfour"]);
        let result = convert_with(&options(tmp.path(), false), &registry).unwrap();

        assert_eq!(result.reclaimed.len(), 1);
        assert_eq!(result.failed_count(), 0);
        assert!(!tmp.path().join("wp-content/themes/twentytwentyfour").exists());

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&result.manifest_path).unwrap()).unwrap();
        assert_eq!(written["require"]["wpackagist-theme/twentytwentyfour"], "^1.0.0");
        assert_eq!(written["require"]["pantheon-systems/wordpress-composer"], "^6.4.3");
    }

    #[test]
    fn test_convert_writes_to_composer_root() {
        let tmp = TempDir::new().unwrap();
        let web = tmp.path().join("web");
        site(&web);
        let patches = web.join("wp-content/themes/twentytwentyfour/patches");
        fs::create_dir_all(&patches).unwrap();
        fs::write(patches.join("colors.patch"), "diff").unwrap();

        let mut split = options(&web, false);
        split.plan.composer_root = Some(tmp.path().to_path_buf());
        let registry = FixedRegistry::with_known(["twentytwentyfour"]);
        let result = convert_with(&split, &registry).unwrap();

        assert_eq!(result.manifest_path, tmp.path().join("composer.json"));
        assert!(!web.join("composer.json").exists());
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&result.manifest_path).unwrap()).unwrap();
        assert_eq!(written["require"]["wpackagist-theme/twentytwentyfour"], "^1.0.0");

        let saved = tmp.path().join("patches/twentytwentyfour/patches/colors.patch");
        assert_eq!(result.reclaimed[0].preserved_patches, vec![saved.clone()]);
        assert!(saved.exists());
        assert!(!web.join("wp-content/themes/twentytwentyfour").exists());
    }
}
