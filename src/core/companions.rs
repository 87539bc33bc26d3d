// src/core/companions.rs

//! Files that have to be checked out together with the file being edited.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Companion files of `path`, whether or not they exist.
///
/// - `.vcxproj` -> `<file>.filters`
/// - `.settings`, `.resx` -> `<stem>.Designer.cs`
/// - `.cs` -> `<stem>.Designer.cs`, `<stem>.resx`
pub fn companion_paths(path: &Path) -> Vec<PathBuf> {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "vcxproj" => {
            let mut filters = OsString::from(path.as_os_str());
            filters.push(".filters");
            vec![PathBuf::from(filters)]
        }
        "settings" | "resx" => vec![path.with_extension("Designer.cs")],
        "cs" => vec![path.with_extension("Designer.cs"), path.with_extension("resx")],
        _ => Vec::new(),
    }
}

/// Companion files of `path` that exist on disk.
pub fn existing_companions(path: &Path) -> Vec<PathBuf> {
    companion_paths(path)
        .into_iter()
        .filter(|companion| companion.is_file())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_companion_rules() {
        assert_eq!(
            companion_paths(Path::new("/w/App.vcxproj")),
            vec![PathBuf::from("/w/App.vcxproj.filters")]
        );
        assert_eq!(
            companion_paths(Path::new("/w/Settings.settings")),
            vec![PathBuf::from("/w/Settings.Designer.cs")]
        );
        assert_eq!(
            companion_paths(Path::new("/w/Form1.resx")),
            vec![PathBuf::from("/w/Form1.Designer.cs")]
        );
        assert_eq!(
            companion_paths(Path::new("/w/Form1.CS")),
            vec![
                PathBuf::from("/w/Form1.Designer.cs"),
                PathBuf::from("/w/Form1.resx")
            ]
        );
        assert!(companion_paths(Path::new("/w/readme.txt")).is_empty());
        assert!(companion_paths(Path::new("/w/Makefile")).is_empty());
    }

    #[test]
    fn test_only_existing_companions_are_returned() {
        let dir = tempdir().unwrap();
        let form = dir.path().join("Form1.cs");
        fs::write(&form, "").unwrap();
        fs::write(dir.path().join("Form1.resx"), "").unwrap();

        assert_eq!(existing_companions(&form), vec![dir.path().join("Form1.resx")]);
    }
}
