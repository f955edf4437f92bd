use crate::error::{BootError, Result};
use std::fs;
use std::path::{Path, PathBuf};

const FORBIDDEN: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

/// Creates the boot directory when missing and returns its canonical path.
///
/// System directories are refused, as is an existing path that is not a directory.
pub fn ensure_boot_directory(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    reject_system_directory(path, path)?;

    fs::create_dir_all(path).map_err(|e| {
        BootError::Configuration(format!(
            "Cannot create boot directory '{}': {e}",
            path.display()
        ))
    })?;

    let canonical = path.canonicalize().map_err(|e| {
        BootError::Configuration(format!("Invalid boot directory '{}': {e}", path.display()))
    })?;

    if !canonical.is_dir() {
        return Err(BootError::Configuration(format!(
            "Boot directory '{}' is not a directory",
            canonical.display()
        )));
    }

    reject_system_directory(path, &canonical)?;
    Ok(canonical)
}

fn reject_system_directory(requested: &Path, resolved: &Path) -> Result<()> {
    for forbidden in FORBIDDEN {
        let forbidden_path = Path::new(forbidden);
        let canonical_forbidden = forbidden_path.canonicalize().ok();

        let inside = requested.starts_with(forbidden_path)
            || resolved.starts_with(forbidden_path)
            || canonical_forbidden.is_some_and(|f| resolved.starts_with(f));
        if inside {
            return Err(BootError::Configuration(format!(
                "Boot directory may not live under system directory '{forbidden}'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_directory() {
        let dir = tempdir().unwrap();
        let boot = dir.path().join("project/boot");

        let canonical = ensure_boot_directory(&boot).unwrap();

        assert!(canonical.is_dir());
        assert_eq!(canonical, boot.canonicalize().unwrap());
    }

    #[test]
    fn rejects_existing_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("boot");
        fs::write(&file, "not a directory").unwrap();

        let err = ensure_boot_directory(&file).unwrap_err();
        assert!(matches!(err, BootError::Configuration(_)));
    }

    #[test]
    fn rejects_system_directory() {
        let err = ensure_boot_directory("/etc/boot-update").unwrap_err();
        assert!(matches!(err, BootError::Configuration(_)));
    }
}
