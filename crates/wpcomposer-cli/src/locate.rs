//! Implementation of the `wpcomposer locate` command.

use anyhow::{Context, Result};
use std::path::PathBuf;
use wpcomposer_pkg::{default_search_start, locate, ProjectRoot};

/// Work out where the search for a project root begins.
///
/// An explicit `--core-root` wins; otherwise a conventional web-root
/// directory below the current directory, or the current directory itself.
pub fn search_start(core_root: Option<PathBuf>) -> Result<PathBuf> {
    match core_root {
        Some(path) => Ok(path),
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            Ok(default_search_start(&cwd))
        }
    }
}

/// Locate the project root.
pub fn locate_root(core_root: Option<PathBuf>) -> Result<ProjectRoot> {
    let start = search_start(core_root)?;
    let root = locate(&start)?;
    Ok(root)
}

/// Print the located directories.
pub fn print_root(root: &ProjectRoot) {
    println!("Manifest root:  {}", root.manifest_root.display());
    println!("WordPress root: {}", root.app_root.display());
    println!("Vendor dir:     {}", root.vendor_dir.display());
}
