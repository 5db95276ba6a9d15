//! Implementation of the `wpcomposer inspect` command.

use crate::locate::search_start;
use anyhow::{Context, Result};
use serde_json::{json, Value as JsonValue};
use std::path::{Path, PathBuf};
use wpcomposer_pkg::{
    manifest_file_name, ContribEntry, ExistenceChecker, HttpRegistry, Migration, MigrationPlan,
    ScanOutcome,
};

/// Options for planning a migration.
#[derive(Debug, Clone, Default)]
pub struct InspectOptions {
    /// Explicit search start.
    pub core_root: Option<PathBuf>,
    /// Directory of the manifest to write, if not the located manifest root.
    pub composer_root: Option<PathBuf>,
    /// Pin exact versions.
    pub exact_versions: bool,
    /// Fallback core version.
    pub core_version: Option<String>,
    /// Print JSON instead of text.
    pub json: bool,
}

/// A planned migration, ready to print.
#[derive(Debug)]
pub struct InspectReport {
    pub plan: MigrationPlan,
    /// Manifest the requirements belong in.
    pub manifest_path: PathBuf,
}

/// Plan a migration against the live plugin directory.
pub fn inspect(options: &InspectOptions) -> Result<InspectReport> {
    let registry = HttpRegistry::new().context("Failed to create registry client")?;
    inspect_with(options, &registry)
}

/// Plan a migration using the given registry checker.
pub fn inspect_with(
    options: &InspectOptions,
    checker: &dyn ExistenceChecker,
) -> Result<InspectReport> {
    let start = search_start(options.core_root.clone())?;
    let plan = Migration::new(checker)
        .with_exact_versions(options.exact_versions)
        .with_core_version(options.core_version.clone())
        .plan(&start)?;
    let manifest_dir = match &options.composer_root {
        Some(dir) => absolute(dir)?,
        None => plan.root.manifest_root.clone(),
    };
    Ok(InspectReport {
        manifest_path: manifest_dir.join(manifest_file_name()),
        plan,
    })
}

/// Resolve `dir` against the current directory.
fn absolute(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    Ok(cwd.join(dir))
}

fn entry_json(entry: &ContribEntry) -> JsonValue {
    json!({
        "name": entry.machine_name,
        "kind": entry.kind.as_str(),
        "version": entry.version(),
        "dir": entry.install_dir(),
        "source": entry.source_dir,
        "registry": entry.registry.to_string(),
        "patches": entry.patches,
    })
}

impl InspectReport {
    /// The report as a JSON document.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let plan = &self.plan;
        let unconfirmed: Vec<JsonValue> = plan
            .reports
            .iter()
            .flat_map(|report| report.unconfirmed())
            .map(entry_json)
            .collect();
        let skipped: Vec<JsonValue> = plan
            .reports
            .iter()
            .flat_map(|report| &report.outcomes)
            .filter_map(|outcome| match outcome {
                ScanOutcome::Skipped { file, reason } => {
                    Some(json!({ "file": file, "reason": reason.to_string() }))
                }
                ScanOutcome::Error { file, error } => {
                    Some(json!({ "file": file, "reason": error.to_string() }))
                }
                ScanOutcome::Found(_) => None,
            })
            .collect();
        let collisions: Vec<JsonValue> = plan
            .merged
            .collisions
            .iter()
            .map(|c| {
                json!({
                    "name": c.machine_name,
                    "replaced": { "kind": c.replaced.as_str(), "source": c.replaced_dir },
                    "kept": { "kind": c.kept.as_str(), "source": c.kept_dir },
                })
            })
            .collect();
        let extensions: Vec<JsonValue> = plan.merged.entries.values().map(entry_json).collect();

        json!({
            "manifest_root": plan.root.manifest_root,
            "manifest": self.manifest_path,
            "app_root": plan.root.app_root,
            "vendor_dir": plan.root.vendor_dir,
            "core_version": plan.core_version.raw,
            "require": plan.requirements,
            "extensions": extensions,
            "unconfirmed": unconfirmed,
            "skipped": skipped,
            "collisions": collisions,
        })
    }

    /// Print the report as pretty JSON.
    pub fn print_json(&self) -> Result<()> {
        let output =
            serde_json::to_string_pretty(&self.to_json()).context("Failed to serialize report")?;
        println!("{output}");
        Ok(())
    }

    /// Print a human-readable summary.
    pub fn print_summary(&self) {
        let plan = &self.plan;
        println!("WordPress root: {}", plan.root.app_root.display());
        println!("Core version:   {}", plan.core_version);

        if !plan.requirements.is_empty() {
            println!("Requirements:");
            for (package, constraint) in plan.requirements.iter() {
                println!("  + {package} {constraint}");
            }
        }

        let unconstrained: Vec<&str> = plan.requirements.unconstrained().collect();
        if !unconstrained.is_empty() {
            println!("No version could be determined for:");
            for package in unconstrained {
                println!("  ? {package}");
            }
        }

        for entry in plan.merged.entries.values().filter(|e| !e.patches.is_empty()) {
            println!("Patches in {}:", entry.machine_name);
            for patch in &entry.patches {
                println!("  {}", patch.display());
            }
        }

        let unconfirmed: Vec<&ContribEntry> =
            plan.reports.iter().flat_map(|r| r.unconfirmed()).collect();
        if !unconfirmed.is_empty() {
            println!("Not found in the plugin directory (convert manually):");
            for entry in unconfirmed {
                println!("  - {} ({}, {})", entry.machine_name, entry.kind, entry.registry);
            }
        }

        for collision in &plan.merged.collisions {
            println!(
                "Warning: {} is declared by {} ({}) and {} ({}); keeping {}",
                collision.machine_name,
                collision.replaced_dir.display(),
                collision.replaced,
                collision.kept_dir.display(),
                collision.kept,
                collision.kept_dir.display(),
            );
        }

        let skipped: usize = plan.reports.iter().map(|r| r.skipped_count()).sum();
        let errors: usize = plan.reports.iter().map(|r| r.error_count()).sum();
        if skipped + errors > 0 {
            println!("Skipped {skipped} file(s) without plugin headers, {errors} unreadable.");
        }
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

        let plugin = root.join("wp-content/plugins/akismet");
        fs::create_dir_all(&plugin).unwrap();
        fs::write(
            plugin.join("akismet.php"),
            "<?php\n/*\nPlugin Name: Akismet\nVersion: 5.3\nText Domain: akismet\n*/\n",
        )
        .unwrap();

        let custom = root.join("wp-content/plugins/acme");
        fs::create_dir_all(&custom).unwrap();
        fs::write(
            custom.join("acme.php"),
            "<?php\n// Version: 1.0\n// Text Domain: acme\n",
        )
        .unwrap();
    }

    #[test]
    fn test_inspect_reports_requirements() {
        let tmp = TempDir::new().unwrap();
        site(tmp.path());

        let options = InspectOptions {
            core_root: Some(tmp.path().to_path_buf()),
            ..InspectOptions::default()
        };
        let report = inspect_with(&options, &FixedRegistry::with_known(["akismet"])).unwrap();
        let json = report.to_json();

        assert_eq!(json["core_version"], "6.4.3");
        assert_eq!(json["require"]["pantheon-systems/wordpress-composer"], "^6.4.3");
        assert_eq!(json["require"]["wpackagist-plugin/akismet"], "^5.3.0");
        assert_eq!(json["extensions"][0]["dir"], "akismet");
        assert_eq!(json["unconfirmed"][0]["name"], "acme");
        assert_eq!(
            json["manifest"],
            json!(report.plan.root.manifest_root.join("composer.json"))
        );
    }

    #[test]
    fn test_composer_root_overrides_manifest_location() {
        let tmp = TempDir::new().unwrap();
        let web = tmp.path().join("web");
        site(&web);

        let options = InspectOptions {
            core_root: Some(web.clone()),
            composer_root: Some(tmp.path().to_path_buf()),
            ..InspectOptions::default()
        };
        let report = inspect_with(&options, &FixedRegistry::with_known(["akismet"])).unwrap();

        assert!(report.plan.root.manifest_root.ends_with("web"));
        assert_eq!(report.manifest_path, tmp.path().join("composer.json"));
    }

    #[test]
    fn test_relative_composer_root_uses_current_directory() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(absolute(Path::new("site")).unwrap(), cwd.join("site"));
        assert_eq!(absolute(Path::new("/srv/site")).unwrap(), PathBuf::from("/srv/site"));
    }

    #[test]
    fn test_collisions_name_both_directories() {
        let tmp = TempDir::new().unwrap();
        site(tmp.path());
        let old = tmp.path().join("wp-content/plugins/akismet-old");
        fs::create_dir_all(&old).unwrap();
        fs::write(
            old.join("akismet.php"),
            "<?php\n/*\nVersion: 4.0\nText Domain: akismet\n*/\n",
        )
        .unwrap();

        let options = InspectOptions {
            core_root: Some(tmp.path().to_path_buf()),
            ..InspectOptions::default()
        };
        let report = inspect_with(&options, &FixedRegistry::with_known(["akismet"])).unwrap();
        let json = report.to_json();

        assert_eq!(json["collisions"][0]["name"], "akismet");
        let source = |side: &str| {
            json["collisions"][0][side]["source"]
                .as_str()
                .unwrap()
                .to_string()
        };
        assert!(source("replaced").ends_with("plugins/akismet-old"));
        assert!(source("kept").ends_with("plugins/akismet"));
    }

    #[test]
    fn test_inspect_leaves_files_in_place() {
        let tmp = TempDir::new().unwrap();
        site(tmp.path());

        let options = InspectOptions {
            core_root: Some(tmp.path().to_path_buf()),
            exact_versions: true,
            ..InspectOptions::default()
        };
        let report = inspect_with(&options, &FixedRegistry::with_known(["akismet"])).unwrap();

        assert_eq!(report.plan.requirements.get("wpackagist-plugin/akismet"), Some("5.3.0"));
        assert!(tmp.path().join("wp-content/plugins/akismet").exists());
    }
}
