//! Project directory scanning.
//!
//! Walks the project directory recursively and yields one
//! [`LocalFileEntry`] per regular file, with relative paths normalized to
//! forward slashes. Entries are sorted by file name within each directory,
//! so two scans of an unchanged tree yield the same sequence.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::SyncError;
use crate::types::{FileKind, LocalFileEntry};

/// Lazy, one-shot iterator over the files below a project root.
pub struct LocalScan {
    root: PathBuf,
    walker: walkdir::IntoIter,
}

/// Starts scanning `root`.
///
/// Nothing is read until the iterator is advanced. Symlinks are followed:
/// a linked file is listed under the link's own path.
pub fn scan(root: &Path) -> LocalScan {
    LocalScan {
        root: root.to_path_buf(),
        walker: WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter(),
    }
}

impl LocalScan {
    fn entry_for(&self, entry: walkdir::DirEntry) -> Result<LocalFileEntry, SyncError> {
        let path = entry.path();
        let metadata = entry.metadata()?;
        let modified = metadata.modified().map_err(|source| SyncError::Scan {
            path: path.to_path_buf(),
            source,
        })?;
        let mtime = match modified.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs_f64(),
            Err(e) => -e.duration().as_secs_f64(),
        };

        let rel_path = path
            .strip_prefix(&self.root)
            .map_err(|e| SyncError::Scan {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?;
        let relative_path = rel_path.to_string_lossy().replace('\\', "/");
        let kind = FileKind::of(&entry.file_name().to_string_lossy());

        debug!(path = %relative_path, size = metadata.len(), ?kind, "scanned");

        Ok(LocalFileEntry {
            absolute_path: path.to_path_buf(),
            relative_path,
            mtime,
            size: metadata.len(),
            kind,
        })
    }
}

impl Iterator for LocalScan {
    type Item = Result<LocalFileEntry, SyncError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };
            if entry.file_type().is_file() {
                return Some(self.entry_for(entry));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::write(root.join("city.qgs"), b"<qgis/>").unwrap();
        fs::write(root.join("readme.txt"), b"READ").unwrap();

        fs::create_dir_all(root.join("data").join("roads")).unwrap();
        fs::write(root.join("data").join("parcels.gpkg"), b"GPKG").unwrap();
        fs::write(
            root.join("data").join("roads").join("roads.shp"),
            b"SHAPE_DATA_HERE",
        )
        .unwrap();

        dir
    }

    fn collect(root: &Path) -> Vec<LocalFileEntry> {
        scan(root).collect::<Result<Vec<_>, _>>().unwrap()
    }

    #[test]
    fn scan_finds_all_files_in_order() {
        let dir = create_test_tree();
        let files = collect(dir.path());

        let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "city.qgs",
                "data/parcels.gpkg",
                "data/roads/roads.shp",
                "readme.txt"
            ]
        );
    }

    #[test]
    fn scan_classifies_and_sizes() {
        let dir = create_test_tree();
        let files = collect(dir.path());

        let qgs = &files[0];
        assert!(qgs.is_project());
        assert_eq!(qgs.size, 7);
        assert_eq!(qgs.absolute_path, dir.path().join("city.qgs"));

        assert!(files[1..].iter().all(|f| f.kind == FileKind::Data));
    }

    #[test]
    fn scan_reports_mtime() {
        let dir = create_test_tree();
        let files = collect(dir.path());
        let expected = fs::metadata(dir.path().join("readme.txt"))
            .unwrap()
            .modified()
            .unwrap()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        assert_eq!(files[3].mtime_secs(), expected);
    }

    #[test]
    fn scan_is_repeatable() {
        let dir = create_test_tree();
        assert_eq!(collect(dir.path()), collect(dir.path()));
    }

    #[test]
    fn scan_empty_dir() {
        let dir = TempDir::new().unwrap();
        assert!(collect(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn scan_follows_file_symlinks() {
        let dir = TempDir::new().unwrap();
        let outside = dir.path().join("outside");
        let project = dir.path().join("project");
        fs::create_dir_all(&outside).unwrap();
        fs::create_dir_all(&project).unwrap();
        fs::write(outside.join("shared.tif"), b"TIFF_DATA").unwrap();
        fs::write(project.join("a.shp"), b"SHP").unwrap();
        std::os::unix::fs::symlink(outside.join("shared.tif"), project.join("linked.tif"))
            .unwrap();

        let files = collect(&project);
        let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["a.shp", "linked.tif"]);
        assert_eq!(files[1].size, 9);
        assert_eq!(files[1].absolute_path, project.join("linked.tif"));
    }

    #[cfg(unix)]
    #[test]
    fn scan_broken_symlink_fails() {
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.tif"), dir.path().join("dangling.tif"))
            .unwrap();
        let result: Result<Vec<_>, _> = scan(dir.path()).collect();
        assert!(matches!(result, Err(SyncError::Scan { .. })));
    }

    #[test]
    fn scan_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let mut iter = scan(&dir.path().join("nope"));
        let err = iter.next().unwrap().unwrap_err();
        assert!(matches!(err, SyncError::Scan { .. }));
    }
}
