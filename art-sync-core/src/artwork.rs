//! Local artwork directory listing.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{info, warn};

/// File extensions mirrored to devices, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Snapshot the set of image filenames in the artwork directory.
///
/// A missing or unreadable directory degrades to an empty set with a
/// warning; the cycle then behaves as if every tracked file was removed.
pub fn list_local_images(dir: &Path) -> BTreeSet<String> {
    let mut images = BTreeSet::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Artwork directory is not readable");
            return images;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let lower = ext.to_ascii_lowercase();
                SUPPORTED_EXTENSIONS.contains(&lower.as_str())
            })
            .unwrap_or(false);
        if !supported {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            images.insert(name.to_string());
        }
    }
    info!(dir = %dir.display(), count = images.len(), "Snapshot of local artwork directory");
    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn filters_to_supported_extensions_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.jpg", "b.PNG", "c.jpeg", "notes.txt", "d.gif"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.jpg")).unwrap();

        let images = list_local_images(dir.path());
        let names: Vec<&str> = images.iter().map(String::as_str).collect();
        assert_eq!(names, ["a.jpg", "b.PNG", "c.jpeg"]);
    }

    #[test]
    fn missing_directory_yields_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        assert!(list_local_images(&gone).is_empty());
    }
}
