//! Store create/update orchestration.
//!
//! Runs one workflow at a time against one server, publishes state
//! changes and per-file progress on a bounded channel, and supports
//! cooperative cancellation.

use std::path::Path;

use qcarta_protocol::constants::INITIAL_CHUNK_SIZE;
use qcarta_protocol::{ServerProfile, StoreDescriptor};
use qcarta_transfer::{ProgressCounter, chunk_size_for};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::changeset::{build_create_set, build_update_set};
use crate::error::{FileError, SyncError};
use crate::remote::{Authenticator, StoreSession};
use crate::scanner::scan;
use crate::types::{
    ChangeEntry, CreateRequest, LocalFileEntry, SyncEvent, SyncReport, SyncState,
    TransferOutcome, UpdateRequest, Workflow,
};
use crate::uploader::upload_file;

/// Orchestrates store workflows.
///
/// Events are only sent once the receiver has been taken, and never block
/// a workflow: when the receiver falls 256 events behind, newer events
/// are dropped.
pub struct StoreOrchestrator {
    events_tx: mpsc::Sender<SyncEvent>,
    events_rx: Option<mpsc::Receiver<SyncEvent>>,
    cancel: CancellationToken,
}

impl Default for StoreOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreOrchestrator {
    /// Creates a new orchestrator.
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<SyncEvent>> {
        self.events_rx.take()
    }

    /// Returns a cancellation token for this orchestrator's workflows.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Creates a store from a project directory.
    ///
    /// Project files are sent first and the store is registered from them;
    /// every other file is then uploaded and registered. A failing data
    /// file does not stop the batch.
    pub async fn create_store<A: Authenticator>(
        &self,
        auth: &A,
        request: &CreateRequest,
    ) -> Result<SyncReport, SyncError> {
        let result = self.run_create(auth, request).await;
        self.finish(&request.store_name, &result);
        result
    }

    /// Brings an existing store up to date with a project directory.
    ///
    /// Only files missing from the manifest or newer than it are sent. An
    /// up-to-date store ends in [`SyncState::NothingToDo`] without any
    /// upload.
    pub async fn update_store<A: Authenticator>(
        &self,
        auth: &A,
        request: &UpdateRequest,
    ) -> Result<SyncReport, SyncError> {
        let result = self.run_update(auth, request).await;
        self.finish(&request.store_name, &result);
        result
    }

    async fn run_create<A: Authenticator>(
        &self,
        auth: &A,
        request: &CreateRequest,
    ) -> Result<SyncReport, SyncError> {
        self.enter(SyncState::Init);
        let session = self.authenticate(auth, &request.profile).await?;

        let files = self.scan_all(&request.project_dir).await?;
        let projects: Vec<&LocalFileEntry> = files.iter().filter(|f| f.is_project()).collect();
        if projects.is_empty() {
            return Err(SyncError::StoreCreate(format!(
                "no project file in {}",
                request.project_dir.display()
            )));
        }

        // Project files go to the upload area before the store exists,
        // so there is no post_max_size to size chunks from yet.
        let mut counter = ProgressCounter::new(projects.len());
        let mut sources = Vec::with_capacity(projects.len());
        for project in projects {
            self.check_cancelled()?;
            self.log(format!("Uploading project file {}", project.relative_path));
            upload_file(&session, project, INITIAL_CHUNK_SIZE, &self.cancel, &mut counter)
                .await
                .map_err(|e| match e {
                    FileError::Cancelled => SyncError::Cancelled,
                    other => SyncError::StoreCreate(format!("{}: {other}", project.relative_path)),
                })?;
            sources.push(project.file_name().to_string());
        }
        self.enter(SyncState::ProjectFilesSent);

        self.check_cancelled()?;
        let saved_id = session
            .save_store(&request.store_name, &sources, &request.access_group_ids)
            .await
            .map_err(|e| SyncError::StoreCreate(e.detail()))?;
        info!(store = %request.store_name, id = ?saved_id, "store registered");
        self.enter(SyncState::StoreRegistered);

        let store = self.fetch_store(&session, &request.store_name).await?;
        let chunk_size = chunk_size_for(store.post_max_size)?;

        let changes = build_create_set(&files);
        self.log(format!("{} data files to upload", changes.len()));
        let outcomes = self
            .sync_files(&session, &store.id, &changes, chunk_size)
            .await?;

        Ok(self.report(Workflow::Create, store.id, outcomes))
    }

    async fn run_update<A: Authenticator>(
        &self,
        auth: &A,
        request: &UpdateRequest,
    ) -> Result<SyncReport, SyncError> {
        self.enter(SyncState::Init);
        let session = self.authenticate(auth, &request.profile).await?;

        let store = self.fetch_store(&session, &request.store_name).await?;
        self.enter(SyncState::ManifestFetched);

        let files = self.scan_all(&request.project_dir).await?;
        let changes = build_update_set(&files, &store.files);

        if changes.is_empty() {
            self.enter(SyncState::NothingToDo);
            return Ok(SyncReport {
                workflow: Workflow::Update,
                store_id: store.id,
                state: SyncState::NothingToDo,
                outcomes: Vec::new(),
            });
        }

        let chunk_size = chunk_size_for(store.post_max_size)?;
        self.log(format!(
            "{} of {} files need to be updated",
            changes.len(),
            files.len()
        ));
        let outcomes = self
            .sync_files(&session, &store.id, &changes, chunk_size)
            .await?;

        Ok(self.report(Workflow::Update, store.id, outcomes))
    }

    async fn authenticate<A: Authenticator>(
        &self,
        auth: &A,
        profile: &ServerProfile,
    ) -> Result<A::Session, SyncError> {
        self.check_cancelled()?;
        self.log(format!("Connecting to {}", profile.base_url()));
        let session = auth.authenticate(profile).await.map_err(SyncError::Auth)?;
        self.enter(SyncState::Authenticated);
        Ok(session)
    }

    async fn fetch_store<S: StoreSession>(
        &self,
        session: &S,
        store_name: &str,
    ) -> Result<StoreDescriptor, SyncError> {
        self.check_cancelled()?;
        let store = session
            .store_info(store_name)
            .await
            .map_err(|source| SyncError::Manifest {
                store: store_name.to_string(),
                source,
            })?;
        debug!(
            store = store_name,
            id = %store.id,
            remote_files = store.files.len(),
            "manifest fetched"
        );
        Ok(store)
    }

    async fn scan_all(&self, root: &Path) -> Result<Vec<LocalFileEntry>, SyncError> {
        self.check_cancelled()?;
        self.log(format!("Scanning {}", root.display()));
        let files = scan(root).collect::<Result<Vec<_>, _>>()?;
        debug!(root = %root.display(), files = files.len(), "scan complete");
        Ok(files)
    }

    /// Uploads and registers every selected file, recording one outcome
    /// per file. Only cancellation stops the loop early.
    async fn sync_files<S: StoreSession>(
        &self,
        session: &S,
        store_id: &str,
        changes: &[ChangeEntry],
        chunk_size: usize,
    ) -> Result<Vec<TransferOutcome>, SyncError> {
        self.enter(SyncState::SyncingFiles);

        let mut counter = ProgressCounter::new(changes.len());
        let mut outcomes = Vec::with_capacity(changes.len());

        for change in changes {
            self.check_cancelled()?;
            let file = &change.file;
            let before = counter.snapshot().bytes_sent;

            let result = self
                .sync_file(session, store_id, file, chunk_size, &mut counter)
                .await;
            let bytes_sent = counter.snapshot().bytes_sent - before;

            let outcome = match result {
                Ok(()) => {
                    self.log(format!("Uploaded {}", file.relative_path));
                    TransferOutcome {
                        relative_path: file.relative_path.clone(),
                        success: true,
                        bytes_sent,
                        error: None,
                    }
                }
                Err(FileError::Cancelled) => return Err(SyncError::Cancelled),
                Err(e) => {
                    warn!(path = %file.relative_path, error = %e, "file failed");
                    self.log(format!("Failed to upload {}: {e}", file.relative_path));
                    TransferOutcome {
                        relative_path: file.relative_path.clone(),
                        success: false,
                        bytes_sent,
                        error: Some(e.to_string()),
                    }
                }
            };

            let progress = counter.file_done(outcome.success);
            self.emit(SyncEvent::Progress(progress));
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    async fn sync_file<S: StoreSession>(
        &self,
        session: &S,
        store_id: &str,
        file: &LocalFileEntry,
        chunk_size: usize,
        counter: &mut ProgressCounter,
    ) -> Result<(), FileError> {
        upload_file(session, file, chunk_size, &self.cancel, counter).await?;
        session
            .register_file(store_id, &file.relative_path, file.mtime)
            .await
            .map_err(FileError::Registration)
    }

    fn report(
        &self,
        workflow: Workflow,
        store_id: String,
        outcomes: Vec<TransferOutcome>,
    ) -> SyncReport {
        let state = if outcomes.iter().all(|o| o.success) {
            SyncState::Done
        } else {
            SyncState::PartialFailure
        };
        self.enter(state);
        SyncReport {
            workflow,
            store_id,
            state,
            outcomes,
        }
    }

    fn finish(&self, store_name: &str, result: &Result<SyncReport, SyncError>) {
        let (success, message) = match result {
            Ok(report) => {
                info!(
                    store = store_name,
                    state = ?report.state,
                    files = report.outcomes.len(),
                    failed = report.failed().count(),
                    "workflow finished"
                );
                (report.success(), report.message().to_string())
            }
            Err(e) => {
                error!(store = store_name, error = %e, "workflow failed");
                (false, e.to_string())
            }
        };
        self.emit(SyncEvent::Finished { success, message });
    }

    fn check_cancelled(&self) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn enter(&self, state: SyncState) {
        debug!(?state, "state");
        self.emit(SyncEvent::State(state));
    }

    fn log(&self, line: String) {
        self.emit(SyncEvent::Log(line));
    }

    fn emit(&self, event: SyncEvent) {
        if self.events_rx.is_some() {
            return;
        }
        if let Err(TrySendError::Full(event)) = self.events_tx.try_send(event) {
            warn!(?event, "event receiver lagging, event dropped");
        }
    }
}
