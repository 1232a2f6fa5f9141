//! Data types for the sync workflows.

use std::path::PathBuf;

use qcarta_protocol::ServerProfile;
use qcarta_protocol::constants::PROJECT_FILE_SUFFIX;
use qcarta_transfer::Progress;

/// Role of a local file in a project bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A `.qgs` project definition.
    Project,
    /// Any other file: data, styles, symbols.
    Data,
}

impl FileKind {
    /// Classifies a file by name.
    pub fn of(file_name: &str) -> Self {
        if file_name.ends_with(PROJECT_FILE_SUFFIX) {
            FileKind::Project
        } else {
            FileKind::Data
        }
    }
}

/// A file found by the local scan.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFileEntry {
    pub absolute_path: PathBuf,
    /// Path below the project root, `/`-separated.
    pub relative_path: String,
    /// Modification time in seconds since the epoch, with sub-second part.
    pub mtime: f64,
    pub size: u64,
    pub kind: FileKind,
}

impl LocalFileEntry {
    /// Modification time truncated to whole seconds, as the server stores it.
    pub fn mtime_secs(&self) -> i64 {
        self.mtime.floor() as i64
    }

    /// Final path component, used as the upload `source` name.
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit_once('/')
            .map_or(self.relative_path.as_str(), |(_, name)| name)
    }

    pub fn is_project(&self) -> bool {
        self.kind == FileKind::Project
    }
}

/// Why a file was selected for transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// Not in the remote manifest.
    Missing,
    /// Local copy is newer than the manifest entry.
    Modified,
    /// Part of a newly created store.
    New,
}

/// One selected file and the reason it was selected.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEntry {
    pub file: LocalFileEntry,
    pub reason: ChangeReason,
}

/// Outcome of one attempted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub relative_path: String,
    pub success: bool,
    pub bytes_sent: u64,
    pub error: Option<String>,
}

/// Which workflow produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    Create,
    Update,
}

/// Workflow state, published as it changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Init,
    Authenticated,
    /// Create only: project definitions are in the upload area.
    ProjectFilesSent,
    /// Create only: the store exists on the server.
    StoreRegistered,
    /// Update only: the remote manifest is known.
    ManifestFetched,
    SyncingFiles,
    Done,
    PartialFailure,
    NothingToDo,
}

impl SyncState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncState::Done | SyncState::PartialFailure | SyncState::NothingToDo
        )
    }
}

/// Progress event emitted during a workflow.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The workflow entered a new state.
    State(SyncState),
    /// Human-readable log line.
    Log(String),
    /// A file attempt finished.
    Progress(Progress),
    /// The workflow ended, successfully or not.
    Finished { success: bool, message: String },
}

/// Result of a workflow that ran to completion.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub workflow: Workflow,
    pub store_id: String,
    /// One of the terminal states.
    pub state: SyncState,
    pub outcomes: Vec<TransferOutcome>,
}

impl SyncReport {
    /// `true` unless at least one file failed.
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &TransferOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    /// Terminal message shown to the user.
    pub fn message(&self) -> &'static str {
        match (self.state, self.workflow) {
            (SyncState::NothingToDo, _) => "Nothing to do, store is up to date",
            (SyncState::PartialFailure, Workflow::Create) => {
                "Store created, but some files failed to upload"
            }
            (SyncState::PartialFailure, Workflow::Update) => "Some files failed to update",
            (_, Workflow::Create) => "Store created and all files synchronized",
            (_, Workflow::Update) => "All files synchronized",
        }
    }
}

/// Parameters of the create workflow.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub profile: ServerProfile,
    pub store_name: String,
    pub project_dir: PathBuf,
    pub access_group_ids: Vec<String>,
}

/// Parameters of the update workflow.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub profile: ServerProfile,
    pub store_name: String,
    pub project_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rel: &str, mtime: f64) -> LocalFileEntry {
        LocalFileEntry {
            absolute_path: PathBuf::from("/p").join(rel),
            relative_path: rel.into(),
            mtime,
            size: 0,
            kind: FileKind::of(rel),
        }
    }

    #[test]
    fn classify_by_suffix() {
        assert_eq!(FileKind::of("city.qgs"), FileKind::Project);
        assert_eq!(FileKind::of("city.qgz"), FileKind::Data);
        assert_eq!(FileKind::of("city.qgs~"), FileKind::Data);
        assert_eq!(FileKind::of("roads.shp"), FileKind::Data);
    }

    #[test]
    fn mtime_secs_floors() {
        assert_eq!(entry("a", 999.99).mtime_secs(), 999);
        assert_eq!(entry("a", 1000.0).mtime_secs(), 1000);
    }

    #[test]
    fn file_name_is_last_component() {
        assert_eq!(entry("data/roads/roads.shp", 0.0).file_name(), "roads.shp");
        assert_eq!(entry("city.qgs", 0.0).file_name(), "city.qgs");
    }

    #[test]
    fn report_messages() {
        let ok = TransferOutcome {
            relative_path: "a".into(),
            success: true,
            bytes_sent: 1,
            error: None,
        };
        let bad = TransferOutcome {
            success: false,
            error: Some("HTTP 500".into()),
            ..ok.clone()
        };

        let mut report = SyncReport {
            workflow: Workflow::Create,
            store_id: "5".into(),
            state: SyncState::Done,
            outcomes: vec![ok.clone()],
        };
        assert!(report.success());
        assert_eq!(report.message(), "Store created and all files synchronized");

        report.outcomes.push(bad);
        report.state = SyncState::PartialFailure;
        assert!(!report.success());
        assert_eq!(report.failed().count(), 1);
        assert_eq!(
            report.message(),
            "Store created, but some files failed to upload"
        );

        report.workflow = Workflow::Update;
        assert_eq!(report.message(), "Some files failed to update");

        let empty = SyncReport {
            workflow: Workflow::Update,
            store_id: "5".into(),
            state: SyncState::NothingToDo,
            outcomes: Vec::new(),
        };
        assert!(empty.success());
        assert_eq!(empty.message(), "Nothing to do, store is up to date");
    }
}
