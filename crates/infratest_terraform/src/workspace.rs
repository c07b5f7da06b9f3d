//! Copying a module tree into an isolated temporary directory.
//!
//! Parallel runs must not share `.terraform` or state files, so each run
//! applies a private copy of the whole root folder. The root is copied, not
//! only the module, so relative `source = "../../"` references still
//! resolve.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{TerraformError, TerraformResult};

/// A private copy of a module tree, removed on `close` or drop.
#[derive(Debug)]
pub struct TempModule {
    dir: TempDir,
    module_dir: PathBuf,
}

impl TempModule {
    /// Root of the copied tree.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// The module directory inside the copy.
    pub fn path(&self) -> &Path {
        &self.module_dir
    }

    /// Remove the copy, reporting failures instead of ignoring them.
    pub fn close(self) -> TerraformResult<()> {
        let root = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| {
            TerraformError::Environment(format!("failed to remove {}: {}", root.display(), e))
        })?;
        debug!("Removed temporary module copy {:?}", root);
        Ok(())
    }
}

/// Copy `root` into a fresh temp dir and return the copy of
/// `root/relative`.
pub fn copy_terraform_folder_to_temp(
    root: &Path,
    relative: impl AsRef<Path>,
) -> TerraformResult<TempModule> {
    let relative = relative.as_ref();
    if !is_confined_path(relative) {
        return Err(TerraformError::Environment(format!(
            "module path must stay inside the root: {}",
            relative.display()
        )));
    }
    let source_module = root.join(relative);
    if !source_module.is_dir() {
        return Err(TerraformError::Environment(format!(
            "module directory does not exist: {}",
            source_module.display()
        )));
    }

    let prefix = format!("{}-", temp_prefix(relative));
    let dir = tempfile::Builder::new()
        .prefix(&prefix)
        .tempdir()
        .map_err(|e| TerraformError::Environment(format!("failed to create temp dir: {}", e)))?;

    info!("Copying {:?} to {:?}", root, dir.path());
    copy_tree(root, dir.path())?;

    let module_dir = dir.path().join(relative);
    Ok(TempModule { dir, module_dir })
}

fn copy_tree(source: &Path, target: &Path) -> TerraformResult<()> {
    let walker = WalkDir::new(source).into_iter().filter_entry(|entry| {
        entry
            .path()
            .strip_prefix(source)
            .map(|rel| !should_skip(rel))
            .unwrap_or(false)
    });

    for entry in walker {
        let entry = entry.map_err(|e| TerraformError::Environment(e.to_string()))?;
        let rel = match entry.path().strip_prefix(source) {
            Ok(rel) if rel.as_os_str().is_empty() => continue,
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let dest = target.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &dest)?;
        }
    }

    Ok(())
}

/// Whether `relative` names a location inside whatever it is joined to:
/// only plain names and `.` components, never `..` or an absolute root.
pub fn is_confined_path(relative: &Path) -> bool {
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Dotfiles that pin providers and the terraform version; they travel with
/// the copy unless a hidden directory above them is skipped.
pub const KEPT_DOTFILES: [&str; 2] = [".terraform.lock.hcl", ".terraform-version"];

/// Hidden entries, provider caches, state files and the implicit
/// `terraform.tfvars` never travel with the copy.
pub fn should_skip(rel: &Path) -> bool {
    let name = match rel.file_name() {
        Some(name) => name.to_string_lossy(),
        None => return false,
    };

    let hidden_parent = rel
        .parent()
        .map(|parent| {
            parent.components().any(|c| match c {
                Component::Normal(part) => part.to_string_lossy().starts_with('.'),
                _ => false,
            })
        })
        .unwrap_or(false);
    if hidden_parent || (name.starts_with('.') && !KEPT_DOTFILES.contains(&&*name)) {
        return true;
    }

    name.ends_with(".tfstate")
        || name.ends_with(".tfstate.backup")
        || name == "terraform.tfvars"
        || name == "terraform.tfvars.json"
}

fn temp_prefix(relative: &Path) -> String {
    let joined: String = relative
        .to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let trimmed = joined.trim_matches('-');
    if trimmed.is_empty() {
        "module".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_skip() {
        assert!(should_skip(Path::new(".git/config")));
        assert!(should_skip(Path::new("examples/complete/.terraform")));
        assert!(should_skip(Path::new("examples/complete/terraform.tfstate")));
        assert!(should_skip(Path::new("terraform.tfstate.backup")));
        assert!(should_skip(Path::new("examples/complete/terraform.tfvars")));
        assert!(!should_skip(Path::new("examples/complete/main.tf")));
        assert!(!should_skip(Path::new(
            "examples/complete/fixtures.us-east-2.tfvars"
        )));
        assert!(!should_skip(Path::new("examples/complete/.terraform.lock.hcl")));
        assert!(!should_skip(Path::new(".terraform-version")));
        assert!(should_skip(Path::new(
            "examples/complete/.terraform/.terraform.lock.hcl"
        )));
        assert!(should_skip(Path::new("examples/complete/.envrc")));
    }

    #[test]
    fn test_is_confined_path() {
        assert!(is_confined_path(Path::new("examples/complete")));
        assert!(is_confined_path(Path::new("./examples/complete")));
        assert!(!is_confined_path(Path::new("../outside")));
        assert!(!is_confined_path(Path::new("examples/../../outside")));
        assert!(!is_confined_path(Path::new("/abs/module")));
    }

    #[test]
    fn test_temp_prefix() {
        assert_eq!(temp_prefix(Path::new("examples/complete")), "examples-complete");
        assert_eq!(temp_prefix(Path::new("")), "module");
    }
}
