use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::sleep;
use uuid::Uuid;

use crate::config::{OrchestratorOptions, PersistentConfig};
use crate::errors::AppResult;
use crate::security::InputValidator;

use super::http_client::UploadTransport;
use super::progress_tracker::{
    emit_event, progress_before, RunPhase, UploadEvent, UploadObserver,
};
use super::results::{FileUploadResult, RunReport};
use super::selection::{FileSelection, SelectedFile, TriggerState};

/// Clears the busy flag when a run ends, including a cancelled or panicking one.
struct BusyGuard<'a> {
    state: &'a Mutex<OrchestratorState>,
    run_id: Uuid,
    finished: bool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            log::warn!("Run {} stopped before finishing", self.run_id);
        }
        match self.state.lock() {
            Ok(mut state) => state.busy = false,
            Err(poisoned) => poisoned.into_inner().busy = false,
        }
    }
}

#[derive(Debug, Default)]
struct OrchestratorState {
    endpoint: String,
    selection: FileSelection,
    busy: bool,
    last_report: Option<Arc<RunReport>>,
}

/// Uploads the current selection to the current endpoint, one file at a time.
///
/// The orchestrator owns no UI. Everything a display needs arrives through
/// the [`UploadObserver`] as [`UploadEvent`]s.
pub struct UploadOrchestrator {
    transport: Arc<dyn UploadTransport>,
    config: Arc<dyn PersistentConfig>,
    observer: Arc<dyn UploadObserver>,
    options: OrchestratorOptions,
    state: Mutex<OrchestratorState>,
}

impl UploadOrchestrator {
    /// Loads the stored endpoint, falling back to `options.default_endpoint`.
    pub fn new(
        transport: Arc<dyn UploadTransport>,
        config: Arc<dyn PersistentConfig>,
        observer: Arc<dyn UploadObserver>,
        options: OrchestratorOptions,
    ) -> Self {
        let endpoint = match config.load() {
            Ok(Some(saved)) if !saved.is_empty() => saved,
            Ok(_) => options.default_endpoint.clone(),
            Err(e) => {
                log::warn!("Failed to load saved endpoint (non-critical): {}", e);
                options.default_endpoint.clone()
            }
        };

        Self {
            transport,
            config,
            observer,
            options,
            state: Mutex::new(OrchestratorState {
                endpoint,
                ..OrchestratorState::default()
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, OrchestratorState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            log::warn!("Orchestrator state lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn emit(&self, event: UploadEvent) {
        emit_event(self.observer.as_ref(), event);
    }

    pub fn endpoint(&self) -> String {
        self.lock_state().endpoint.clone()
    }

    pub fn selection(&self) -> FileSelection {
        self.lock_state().selection.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.lock_state().busy
    }

    /// Report of the most recent finished run, until the next selection or run.
    pub fn last_report(&self) -> Option<Arc<RunReport>> {
        self.lock_state().last_report.clone()
    }

    pub fn trigger(&self) -> TriggerState {
        let state = self.lock_state();
        TriggerState::evaluate(state.selection.len(), &state.endpoint, state.busy)
    }

    /// Replaces the selection and clears any shown result. Empty input is ignored.
    pub fn select_files(&self, files: Vec<SelectedFile>) {
        if files.is_empty() {
            log::debug!("Ignoring empty file selection");
            return;
        }

        let selection = FileSelection::new(files);
        let summary = selection.summary();
        log::info!(
            "Selected {} file(s), {} bytes total",
            selection.len(),
            selection.total_size()
        );

        {
            let mut state = self.lock_state();
            state.selection = selection;
            state.last_report = None;
        }

        self.emit(UploadEvent::SelectionChanged(summary));
        self.emit(UploadEvent::TriggerChanged(self.trigger()));
        self.emit(UploadEvent::ResultHidden);
        self.emit(UploadEvent::PhaseChanged(RunPhase::Idle));
    }

    /// Stores and persists the endpoint. The URL itself is not validated.
    ///
    /// The in-memory value is updated even when persisting fails; the save
    /// error is returned so the caller can report it.
    pub fn set_endpoint(&self, url: &str) -> AppResult<()> {
        let endpoint = InputValidator::normalize_endpoint(url);
        self.lock_state().endpoint = endpoint.clone();

        self.emit(UploadEvent::EndpointChanged(endpoint.clone()));
        self.emit(UploadEvent::TriggerChanged(self.trigger()));

        if let Err(e) = self.config.save(&endpoint) {
            log::warn!("Failed to persist endpoint: {}", e);
            return Err(e);
        }
        Ok(())
    }

    /// Uploads every selected file in order, stopping at the first failure.
    ///
    /// Returns `None` without touching the network when the selection or
    /// endpoint is empty, or when a run is already in progress.
    pub async fn run(&self) -> Option<Arc<RunReport>> {
        let (endpoint, files) = {
            let mut state = self.lock_state();
            if state.busy {
                log::debug!("Upload already in progress, ignoring run request");
                return None;
            }
            if state.selection.is_empty() || state.endpoint.is_empty() {
                log::debug!("Nothing to upload or no endpoint configured");
                return None;
            }

            state.busy = true;
            state.last_report = None;
            (state.endpoint.clone(), state.selection.files().to_vec())
        };

        let run_id = Uuid::new_v4();
        let mut busy = BusyGuard {
            state: &self.state,
            run_id,
            finished: false,
        };
        log::info!(
            "Run {}: uploading {} file(s) to {}",
            run_id,
            files.len(),
            endpoint
        );

        self.emit(UploadEvent::PhaseChanged(RunPhase::Busy));
        self.emit(UploadEvent::TriggerChanged(self.trigger()));
        self.emit(UploadEvent::ResultHidden);
        self.emit(UploadEvent::ProgressShown);

        let report = Arc::new(self.upload_all(run_id, endpoint, &files).await);

        self.emit(UploadEvent::Finished(Arc::clone(&report)));

        self.lock_state().last_report = Some(Arc::clone(&report));
        busy.finished = true;
        drop(busy);

        let phase = if report.is_success() {
            RunPhase::Succeeded
        } else {
            RunPhase::Failed
        };
        self.emit(UploadEvent::PhaseChanged(phase));
        self.emit(UploadEvent::TriggerChanged(self.trigger()));
        self.schedule_progress_hide();

        Some(report)
    }

    async fn upload_all(
        &self,
        run_id: Uuid,
        endpoint: String,
        files: &[SelectedFile],
    ) -> RunReport {
        let total = files.len();
        let mut results = Vec::with_capacity(total);

        for (index, file) in files.iter().enumerate() {
            self.emit(UploadEvent::Progress(progress_before(index, total)));

            match self.transport.upload(&endpoint, file).await {
                Ok(receipt) => {
                    log::info!(
                        "Run {}: uploaded {} ({}/{})",
                        run_id,
                        file.name,
                        index + 1,
                        total
                    );
                    results.push(FileUploadResult::uploaded(&file.name, receipt));
                }
                Err(e) => {
                    // Remaining files are never attempted
                    log::error!(
                        "Run {}: upload of {} failed, skipping {} remaining file(s): {}",
                        run_id,
                        file.name,
                        total - index - 1,
                        e
                    );
                    return RunReport::Failed {
                        endpoint,
                        completed: results,
                        error: e,
                    };
                }
            }
        }

        self.emit(UploadEvent::Progress(100.0));
        RunReport::Succeeded { endpoint, results }
    }

    fn schedule_progress_hide(&self) {
        let delay = self.options.progress_hide_delay;
        if delay.is_zero() {
            self.emit(UploadEvent::ProgressHidden);
            return;
        }

        let observer = Arc::clone(&self.observer);
        tokio::spawn(async move {
            sleep(delay).await;
            emit_event(observer.as_ref(), UploadEvent::ProgressHidden);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::errors::AppError;
    use crate::uploader::progress_tracker::RecordingObserver;
    use crate::uploader::results::UploadReceipt;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fails the upload whose 0-based position is `fail_at`.
    struct ScriptedTransport {
        calls: AtomicUsize,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl UploadTransport for ScriptedTransport {
        async fn upload(&self, _endpoint: &str, file: &SelectedFile) -> AppResult<UploadReceipt> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(call) == self.fail_at {
                return Err(AppError::http_status(
                    &file.name,
                    500,
                    "Internal Server Error",
                    "disk full".to_string(),
                ));
            }
            Ok(UploadReceipt::new(json!({ "fileName": format!("{}-stored", file.name) })))
        }
    }

    /// Hangs on the first upload, answers every later one immediately.
    struct StallingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl UploadTransport for StallingTransport {
        async fn upload(&self, _endpoint: &str, file: &SelectedFile) -> AppResult<UploadReceipt> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(UploadReceipt::new(json!({ "fileName": file.name.clone() })))
        }
    }

    fn setup(
        fail_at: Option<usize>,
    ) -> (UploadOrchestrator, Arc<ScriptedTransport>, Arc<RecordingObserver>) {
        let transport = Arc::new(ScriptedTransport {
            calls: AtomicUsize::new(0),
            fail_at,
        });
        let observer = Arc::new(RecordingObserver::new());
        let options = OrchestratorOptions {
            default_endpoint: String::new(),
            progress_hide_delay: Duration::ZERO,
        };
        let orchestrator = UploadOrchestrator::new(
            transport.clone(),
            Arc::new(MemoryConfig::new()),
            observer.clone(),
            options,
        );
        (orchestrator, transport, observer)
    }

    fn files(names: &[&str]) -> Vec<SelectedFile> {
        names
            .iter()
            .map(|n| SelectedFile::new(*n, n.as_bytes().to_vec()))
            .collect()
    }

    #[tokio::test]
    async fn test_run_uploads_in_order() {
        let (orchestrator, transport, observer) = setup(None);
        orchestrator.set_endpoint("https://x/upload").unwrap();
        orchestrator.select_files(files(&["a.txt", "b.txt", "c.txt", "d.txt"]));

        let report = orchestrator.run().await.unwrap();

        assert!(report.is_success());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 4);
        let names: Vec<_> = report.results().iter().map(|r| r.file.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt", "d.txt"]);
        assert_eq!(
            report.results()[2].receipt().unwrap().file_name(),
            Some("c.txt-stored")
        );
        assert_eq!(observer.progress_values(), vec![0.0, 25.0, 50.0, 75.0, 100.0]);
        assert_eq!(
            observer.phases(),
            vec![RunPhase::Idle, RunPhase::Busy, RunPhase::Succeeded]
        );
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_files() {
        let (orchestrator, transport, observer) = setup(Some(1));
        orchestrator.set_endpoint("https://x/upload").unwrap();
        orchestrator.select_files(files(&["a.txt", "b.txt", "c.txt"]));

        let report = orchestrator.run().await.unwrap();

        assert!(!report.is_success());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.results().len(), 1);
        assert!(report.error().unwrap().to_string().contains("disk full"));
        // No final 100 after a failure
        let progress = observer.progress_values();
        assert_eq!(progress.len(), 2);
        assert_eq!(progress[0], 0.0);
        assert!((progress[1] - 33.33).abs() < 0.01);
        assert_eq!(
            observer.phases(),
            vec![RunPhase::Idle, RunPhase::Busy, RunPhase::Failed]
        );
        assert_eq!(observer.count(|e| matches!(e, UploadEvent::ProgressHidden)), 1);
    }

    #[tokio::test]
    async fn test_run_without_preconditions_is_noop() {
        let (orchestrator, transport, observer) = setup(None);

        orchestrator.select_files(files(&["a.txt"]));
        assert!(orchestrator.run().await.is_none());

        orchestrator.set_endpoint("https://x/upload").unwrap();
        orchestrator.select_files(Vec::new());
        assert_eq!(orchestrator.selection().len(), 1);

        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(observer.phases(), vec![RunPhase::Idle]);

        let (no_files, transport, observer) = setup(None);
        no_files.set_endpoint("https://x/upload").unwrap();
        assert!(no_files.run().await.is_none());

        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert!(observer.phases().is_empty());
        assert!(!no_files.trigger().enabled);
    }

    #[tokio::test]
    async fn test_run_while_busy_is_noop() {
        let (orchestrator, transport, _) = setup(None);
        orchestrator.set_endpoint("https://x/upload").unwrap();
        orchestrator.select_files(files(&["a.txt"]));

        orchestrator.lock_state().busy = true;
        assert!(orchestrator.run().await.is_none());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_releases_busy_flag() {
        let transport = Arc::new(StallingTransport {
            calls: AtomicUsize::new(0),
        });
        let orchestrator = UploadOrchestrator::new(
            transport.clone(),
            Arc::new(MemoryConfig::new()),
            Arc::new(RecordingObserver::new()),
            OrchestratorOptions {
                default_endpoint: "https://x/upload".to_string(),
                progress_hide_delay: Duration::ZERO,
            },
        );
        orchestrator.select_files(files(&["a.txt"]));

        let cancelled =
            tokio::time::timeout(Duration::from_millis(50), orchestrator.run()).await;
        assert!(cancelled.is_err());
        assert!(!orchestrator.is_busy());
        assert!(orchestrator.trigger().enabled);

        let report = orchestrator.run().await.unwrap();
        assert!(report.is_success());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_new_selection_clears_last_report() {
        let (orchestrator, _, observer) = setup(None);
        orchestrator.set_endpoint("https://x/upload").unwrap();
        orchestrator.select_files(files(&["a.txt"]));
        orchestrator.run().await.unwrap();
        assert!(orchestrator.last_report().is_some());

        observer.clear();
        orchestrator.select_files(files(&["b.txt", "c.txt"]));
        assert!(orchestrator.last_report().is_none());
        assert_eq!(observer.count(|e| matches!(e, UploadEvent::ResultHidden)), 1);
        assert_eq!(observer.last_trigger().unwrap().label, "Upload 2 Files");
    }

    #[test]
    fn test_endpoint_is_trimmed_and_persisted() {
        let config = Arc::new(MemoryConfig::new());
        let orchestrator = UploadOrchestrator::new(
            Arc::new(ScriptedTransport {
                calls: AtomicUsize::new(0),
                fail_at: None,
            }),
            config.clone(),
            Arc::new(RecordingObserver::new()),
            OrchestratorOptions::default(),
        );

        orchestrator.set_endpoint("  https://x/upload  ").unwrap();
        assert_eq!(orchestrator.endpoint(), "https://x/upload");
        assert_eq!(config.load().unwrap().as_deref(), Some("https://x/upload"));
    }

    #[test]
    fn test_default_endpoint_used_when_nothing_saved() {
        let options = OrchestratorOptions {
            default_endpoint: "https://default/upload".to_string(),
            ..OrchestratorOptions::default()
        };
        let orchestrator = UploadOrchestrator::new(
            Arc::new(ScriptedTransport {
                calls: AtomicUsize::new(0),
                fail_at: None,
            }),
            Arc::new(MemoryConfig::new()),
            Arc::new(RecordingObserver::new()),
            options.clone(),
        );
        assert_eq!(orchestrator.endpoint(), "https://default/upload");

        let orchestrator = UploadOrchestrator::new(
            Arc::new(ScriptedTransport {
                calls: AtomicUsize::new(0),
                fail_at: None,
            }),
            Arc::new(MemoryConfig::with_value("https://saved/upload")),
            Arc::new(RecordingObserver::new()),
            options,
        );
        assert_eq!(orchestrator.endpoint(), "https://saved/upload");
    }

    #[test]
    fn test_empty_saved_endpoint_falls_back_to_default() {
        let orchestrator = UploadOrchestrator::new(
            Arc::new(ScriptedTransport {
                calls: AtomicUsize::new(0),
                fail_at: None,
            }),
            Arc::new(MemoryConfig::with_value("")),
            Arc::new(RecordingObserver::new()),
            OrchestratorOptions {
                default_endpoint: "https://default/upload".to_string(),
                ..OrchestratorOptions::default()
            },
        );
        assert_eq!(orchestrator.endpoint(), "https://default/upload");
    }
}
