//! Selection of the files a workflow has to transfer.

use std::collections::HashMap;

use qcarta_protocol::RemoteFileEntry;

use crate::types::{ChangeEntry, ChangeReason, LocalFileEntry};

/// Files to send when updating an existing store.
///
/// A file is selected when the manifest has no entry for its path, or when
/// its whole-second local mtime is strictly newer than the manifest's. Equal
/// times count as up to date. Output keeps the order of `local`.
pub fn build_update_set(local: &[LocalFileEntry], remote: &[RemoteFileEntry]) -> Vec<ChangeEntry> {
    let remote_mtimes: HashMap<&str, i64> = remote
        .iter()
        .map(|r| (r.path.as_str(), r.mtime))
        .collect();

    local
        .iter()
        .filter_map(|file| {
            let reason = match remote_mtimes.get(file.relative_path.as_str()) {
                None => ChangeReason::Missing,
                Some(&remote_mtime) if file.mtime_secs() > remote_mtime => ChangeReason::Modified,
                Some(_) => return None,
            };
            Some(ChangeEntry {
                file: file.clone(),
                reason,
            })
        })
        .collect()
}

/// Files to send after a store was created: every non-project file.
pub fn build_create_set(local: &[LocalFileEntry]) -> Vec<ChangeEntry> {
    local
        .iter()
        .filter(|f| !f.is_project())
        .map(|file| ChangeEntry {
            file: file.clone(),
            reason: ChangeReason::New,
        })
        .collect()
}
